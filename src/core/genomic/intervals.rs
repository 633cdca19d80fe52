use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::utils::errors::ScError;

////////////////
// Structures //
////////////////

/// Strand orientation of a gene
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Strand {
    Forward,
    Reverse,
}

impl FromStr for Strand {
    type Err = ScError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "fwd" | "+" => Ok(Strand::Forward),
            "rev" | "-" => Ok(Strand::Reverse),
            other => Err(ScError::InvalidInput(format!(
                "Unknown strand '{}'. Use 'fwd'/'+' or 'rev'/'-'",
                other
            ))),
        }
    }
}

impl fmt::Display for Strand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Strand::Forward => write!(f, "+"),
            Strand::Reverse => write!(f, "-"),
        }
    }
}

/// A gene on the reference genome
///
/// Coordinates are signed so that padded windows may run below zero.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GeneRecord {
    pub chrom: String,
    pub start: i64,
    pub end: i64,
    pub strand: Strand,
}

impl GeneRecord {
    pub fn new(chrom: &str, start: i64, end: i64, strand: Strand) -> Self {
        Self {
            chrom: chrom.to_string(),
            start,
            end,
            strand,
        }
    }

    /// The gene window widened by the padding
    ///
    /// On the reverse strand upstream lies after the gene end, so the two
    /// paddings are swapped.
    ///
    /// ### Params
    ///
    /// * `upstream` - Bases added before the transcription start.
    /// * `downstream` - Bases added after the transcription end.
    ///
    /// ### Returns
    ///
    /// `(start, end)` of the padded window, both inclusive.
    pub fn padded_window(&self, upstream: i64, downstream: i64) -> (i64, i64) {
        let (before, after) = match self.strand {
            Strand::Forward => (upstream, downstream),
            Strand::Reverse => (downstream, upstream),
        };
        (self.start - before, self.end + after)
    }
}

/// A genomic fragment, e.g. an ATAC peak
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Fragment {
    pub chrom: String,
    pub start: i64,
    pub end: i64,
}

impl Fragment {
    pub fn new(chrom: &str, start: i64, end: i64) -> Self {
        Self {
            chrom: chrom.to_string(),
            start,
            end,
        }
    }
}

/// Outcome of an overlap check
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OverlapResult {
    /// The fragment touches the padded gene window
    Match,
    /// Same chromosome, but no overlap
    NoMatch,
    /// Gene and fragment are on different chromosomes
    ChromosomeMismatch,
}

impl OverlapResult {
    pub fn is_match(&self) -> bool {
        matches!(self, OverlapResult::Match)
    }
}

/// Padding around genes for the overlap checks
///
/// ### Fields
///
/// * `upstream` - Bases upstream of the gene. Defaults to 10,000.
/// * `downstream` - Bases downstream of the gene. Defaults to 0.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct OverlapParams {
    pub upstream: i64,
    pub downstream: i64,
}

impl Default for OverlapParams {
    fn default() -> Self {
        Self {
            upstream: 10_000,
            downstream: 0,
        }
    }
}

///////////////
// Functions //
///////////////

/// Check if a fragment overlaps a gene or its padded surroundings
///
/// A fragment matches if its start or its end falls within the padded gene
/// window, or if it covers the whole window.
///
/// ### Params
///
/// * `gene` - The gene
/// * `fragment` - The fragment to test
/// * `upstream` - Upstream padding of the gene
/// * `downstream` - Downstream padding of the gene
///
/// ### Returns
///
/// The `OverlapResult`
pub fn overlap(
    gene: &GeneRecord,
    fragment: &Fragment,
    upstream: i64,
    downstream: i64,
) -> OverlapResult {
    if gene.chrom != fragment.chrom {
        return OverlapResult::ChromosomeMismatch;
    }

    let (win_start, win_end) = gene.padded_window(upstream, downstream);
    let contains = |pos: i64| win_start <= pos && pos <= win_end;

    if contains(fragment.start)
        || contains(fragment.end)
        || (win_start >= fragment.start && win_end <= fragment.end)
    {
        OverlapResult::Match
    } else {
        OverlapResult::NoMatch
    }
}

/// Indices of all genes a fragment overlaps
///
/// ### Params
///
/// * `genes` - The genes to test
/// * `fragment` - The fragment
/// * `params` - The padding to use
///
/// ### Returns
///
/// Positions in `genes` with an `OverlapResult::Match`
pub fn genes_overlapping(
    genes: &[GeneRecord],
    fragment: &Fragment,
    params: &OverlapParams,
) -> Vec<usize> {
    genes
        .iter()
        .enumerate()
        .filter(|(_, g)| overlap(g, fragment, params.upstream, params.downstream).is_match())
        .map(|(i, _)| i)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_strand_parsing() {
        assert_eq!("fwd".parse::<Strand>().unwrap(), Strand::Forward);
        assert_eq!("+".parse::<Strand>().unwrap(), Strand::Forward);
        assert_eq!("rev".parse::<Strand>().unwrap(), Strand::Reverse);
        assert_eq!("-".parse::<Strand>().unwrap(), Strand::Reverse);
        assert!("x".parse::<Strand>().is_err());
    }

    #[test]
    fn test_overlap_forward() {
        let gene = GeneRecord::new("chr1", 100, 200, Strand::Forward);

        let inside = Fragment::new("chr1", 150, 160);
        assert_eq!(overlap(&gene, &inside, 0, 0), OverlapResult::Match);

        let other_chrom = Fragment::new("chr2", 150, 160);
        assert_eq!(
            overlap(&gene, &other_chrom, 0, 0),
            OverlapResult::ChromosomeMismatch
        );

        let upstream = Fragment::new("chr1", 60, 90);
        assert_eq!(overlap(&gene, &upstream, 0, 0), OverlapResult::NoMatch);
        assert_eq!(overlap(&gene, &upstream, 50, 0), OverlapResult::Match);

        // boundaries are inclusive
        let touching = Fragment::new("chr1", 200, 210);
        assert!(overlap(&gene, &touching, 0, 0).is_match());
    }

    #[test]
    fn test_overlap_reverse_swaps_padding() {
        let gene = GeneRecord::new("chr1", 100, 200, Strand::Reverse);

        // upstream of a reverse gene lies past its end
        let before = Fragment::new("chr1", 60, 90);
        assert_eq!(overlap(&gene, &before, 50, 0), OverlapResult::NoMatch);

        let after = Fragment::new("chr1", 220, 240);
        assert_eq!(overlap(&gene, &after, 50, 0), OverlapResult::Match);
        assert_eq!(gene.padded_window(50, 0), (100, 250));
    }

    #[test]
    fn test_fragment_covering_gene() {
        let gene = GeneRecord::new("chr3", 100, 200, Strand::Forward);
        let covering = Fragment::new("chr3", 0, 1_000);
        assert!(overlap(&gene, &covering, 10, 10).is_match());
    }

    #[test]
    fn test_padding_may_go_negative() {
        let gene = GeneRecord::new("chrM", 50, 80, Strand::Forward);
        let fragment = Fragment::new("chrM", 0, 5);

        assert!(overlap(&gene, &fragment, OverlapParams::default().upstream, 0).is_match());
    }

    #[test]
    fn test_genes_overlapping() {
        let genes = vec![
            GeneRecord::new("chr1", 100, 200, Strand::Forward),
            GeneRecord::new("chr1", 5_000, 6_000, Strand::Reverse),
            GeneRecord::new("chr2", 100, 200, Strand::Forward),
            GeneRecord::new("chr1", 20_000, 30_000, Strand::Forward),
        ];
        let fragment = Fragment::new("chr1", 150, 180);
        let params = OverlapParams::default();

        assert_eq!(genes_overlapping(&genes, &fragment, &params), vec![0]);

        let fragment = Fragment::new("chr1", 12_000, 12_500);
        assert_eq!(genes_overlapping(&genes, &fragment, &params), vec![1, 3]);
    }
}
