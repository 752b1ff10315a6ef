use std::fmt;

/// Rejected settings, reported before the simulation starts.
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum ConfigError {
    /// A size, duration or count that must be strictly positive.
    NonPositive { field: &'static str, value: f64 },
    /// A `[min, max]` pair with `min > max`.
    EmptyRange {
        field: &'static str,
        min: f64,
        max: f64,
    },
    /// A value outside the interval it is meaningful in.
    OutOfRange {
        field: &'static str,
        value: f64,
        min: f64,
        max: f64,
    },
    /// The histogram needs at least one bin.
    ZeroBins,
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::NonPositive { field, value } => {
                write!(f, "{field} must be greater than zero (got {value})")
            }
            ConfigError::EmptyRange { field, min, max } => {
                write!(f, "{field} is an empty range: min {min} > max {max}")
            }
            ConfigError::OutOfRange {
                field,
                value,
                min,
                max,
            } => write!(f, "{field} = {value} is outside [{min}, {max}]"),
            ConfigError::ZeroBins => write!(f, "histogram bin count must be at least 1"),
        }
    }
}

impl std::error::Error for ConfigError {}
