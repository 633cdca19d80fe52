use scutils::core::data::sparse_io_h5::write_h5ad_csr;
use scutils::*;
use std::path::PathBuf;
use tempfile::TempDir;

// 40 cells x 12 peaks; cell i covers peaks j with (i + j) % 4 != 0 and
// j < 4 + i % 9
fn write_atac(dir: &TempDir) -> PathBuf {
    let (n_rows, n_cols) = (40, 12);
    let mut data = Vec::new();
    let mut indices = Vec::new();
    let mut indptr = vec![0];
    for i in 0..n_rows {
        for j in 0..n_cols {
            if (i + j) % 4 != 0 && j < 4 + i % 9 {
                data.push((1 + (i * j) % 3) as f32);
                indices.push(j);
            }
        }
        indptr.push(data.len());
    }
    let matrix = CompressedSparseData::new_csr(data, indices, indptr, (n_rows, n_cols));
    let barcodes: Vec<String> = (0..n_rows).map(|i| format!("AAAC-{:03}", i)).collect();
    let peaks: Vec<String> = (0..n_cols)
        .map(|j| format!("chr1:{}-{}", j * 1000, j * 1000 + 500))
        .collect();

    let path = dir.path().join("atac.h5ad");
    write_h5ad_csr(&path, &matrix, &barcodes, &peaks).unwrap();
    path
}

#[test]
fn full_preprocessing_run() {
    let dir = TempDir::new().unwrap();
    let path = write_atac(&dir);

    let config = PipelineConfig::from_toml_str(
        r#"
        [read_filter]
        min_genes_per_cell = 4
        max_genes_per_cell = 8
        min_cells = 2
        batch_size = 7

        [pca]
        n_components = 3
        train_ratio = 0.5
        n_batches = 4

        [scheduler]
        n_workers = 3
        threads_per_worker = 1
        "#,
    )
    .unwrap();
    let ctx = ExecutionContext::from_params(&config.scheduler).unwrap();

    let adata = read_with_filter_annotated(&ctx, &path, &config.read_filter).unwrap();
    assert!(adata.n_obs() > 0 && adata.n_obs() < 40);
    let degrees = adata.x().major_degrees();
    assert!(degrees.iter().all(|&d| (4..=8).contains(&d)));
    assert!(adata.obs_names().iter().all(|b| b.starts_with("AAAC-")));

    let (matrix, peaks) = read_with_filter(&ctx, &path, &config.read_filter).unwrap();
    assert_eq!(&matrix, adata.x());
    assert_eq!(peaks.as_slice(), adata.var_names());

    let top = filter_peaks(&adata, 6).unwrap();
    assert_eq!(top.n_vars(), 6.min(adata.n_vars()));
    let freq = peak_frequencies(top.x()).unwrap();
    assert!(freq.windows(2).all(|w| w[0] <= w[1]));

    let normalised = tf_idf(top.x()).unwrap();
    let mut normalised = AnnotatedMatrix::new(
        normalised,
        top.obs_names().to_vec(),
        top.var_names().to_vec(),
    )
    .unwrap();

    pca(&mut normalised, &config.pca).unwrap();
    let emb = normalised.obsm("X_pca").unwrap();
    assert_eq!(emb.nrows(), normalised.n_obs());
    assert_eq!(emb.ncols(), 3);
    for i in 0..emb.nrows() {
        for j in 0..emb.ncols() {
            assert!(emb[(i, j)].is_finite());
        }
    }
}

#[test]
fn reducer_sums_per_gene() {
    let dir = TempDir::new().unwrap();
    let path = write_atac(&dir);
    let ctx = ExecutionContext::new(2, 1).unwrap();
    let params = ReadFilterParams {
        min_genes_per_cell: 0,
        max_genes_per_cell: 12,
        min_cells: 0,
        num_cells: None,
        batch_size: 9,
    };

    let mut plan = IngestionPlan::build(&path, &params).unwrap();
    let rows = sum_csr_matrix(&ctx, &mut plan.graph, &plan.partitions, Axis::Rows).unwrap();
    let cols = sum_csr_matrix(&ctx, &mut plan.graph, &plan.partitions, Axis::Cols).unwrap();

    let full = scutils::core::data::sparse_io_h5::read_h5ad_x_data(&path).unwrap();
    let expected_cols = full.reduce_axis(Axis::Rows, Reduction::Sum).unwrap();
    let expected_rows = full.reduce_axis(Axis::Cols, Reduction::Sum).unwrap();

    let partial = ctx.execute(&plan.graph, rows).unwrap();
    let partial = partial.as_dense().unwrap();
    assert_eq!(partial.nrows(), plan.partitions.len());
    for j in 0..partial.ncols() {
        let total: f64 = (0..partial.nrows()).map(|i| partial[(i, j)]).sum();
        assert_eq!(total, expected_cols[j]);
    }

    let per_row = ctx.execute(&plan.graph, cols).unwrap();
    let per_row = per_row.as_dense().unwrap();
    assert_eq!(per_row.nrows(), 40);
    for i in 0..40 {
        assert_eq!(per_row[(i, 0)], expected_rows[i]);
    }

    assert!(ctx.release(&plan.graph).unwrap() > 0);
}

#[test]
fn overlap_maps_peaks_to_genes() {
    let genes = vec![
        GeneRecord::new("chr1", 2_000, 2_400, "fwd".parse().unwrap()),
        GeneRecord::new("chr1", 9_000, 9_800, "-".parse().unwrap()),
        GeneRecord::new("chr2", 0, 500, Strand::Forward),
    ];
    let params = OverlapParams {
        upstream: 600,
        downstream: 0,
    };

    let hits: Vec<Vec<usize>> = (0..12)
        .map(|j| {
            let peak = Fragment::new("chr1", j * 1000, j * 1000 + 500);
            genes_overlapping(&genes, &peak, &params)
        })
        .collect();

    // forward gene: window 1400..2400
    assert_eq!(hits[1], vec![0]);
    assert_eq!(hits[2], vec![0]);
    // reverse gene: window 9000..10400
    assert_eq!(hits[9], vec![1]);
    assert_eq!(hits[10], vec![1]);
    assert!(hits[5].is_empty());
    assert_eq!(
        overlap(&genes[2], &Fragment::new("chr1", 0, 500), 0, 0),
        OverlapResult::ChromosomeMismatch
    );
}
