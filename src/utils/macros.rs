//////////////////
// Input checks //
//////////////////

/// Early return with `ScError::InvalidInput` if the condition does not hold.
#[macro_export]
macro_rules! ensure_input {
    ($cond:expr, $($arg:tt)+) => {
        if !$cond {
            return Err($crate::utils::errors::ScError::InvalidInput(format!($($arg)+)));
        }
    };
}

#[cfg(test)]
mod tests {
    use crate::utils::errors::{Result, ScError};

    fn positive(x: i32) -> Result<i32> {
        ensure_input!(x > 0, "{} is not positive", x);
        Ok(x)
    }

    #[test]
    fn test_ensure_input() {
        assert_eq!(positive(3).unwrap(), 3);
        match positive(-1) {
            Err(ScError::InvalidInput(msg)) => assert_eq!(msg, "-1 is not positive"),
            other => panic!("unexpected {:?}", other),
        }
    }
}
