use std::fmt;

/// Errors raised by the t-digest.
#[derive(Debug, Clone, PartialEq)]
pub enum TDigestError {
    /// Construction parameters out of range.
    InvalidConfig { reason: String },
    /// A NaN value or a non-positive weight was offered to the digest.
    InvalidSample { value: f64, weight: f64 },
    /// A query argument outside of its domain.
    InvalidQuery { reason: String },
    /// A query was made before anything was inserted.
    EmptySketch,
    /// Serialized bytes could not be decoded into a valid digest.
    CorruptData { reason: String },
}

impl TDigestError {
    pub(crate) fn invalid_config(reason: impl Into<String>) -> Self {
        TDigestError::InvalidConfig {
            reason: reason.into(),
        }
    }

    pub(crate) fn invalid_query(reason: impl Into<String>) -> Self {
        TDigestError::InvalidQuery {
            reason: reason.into(),
        }
    }

    pub(crate) fn corrupt(reason: impl Into<String>) -> Self {
        TDigestError::CorruptData {
            reason: reason.into(),
        }
    }
}

impl fmt::Display for TDigestError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TDigestError::InvalidConfig { reason } => {
                write!(f, "tdigest: invalid configuration: {}", reason)
            }
            TDigestError::InvalidSample { value, weight } => write!(
                f,
                "tdigest: invalid sample (value {}, weight {}). hint: values must not be NaN and weights must be > 0",
                value, weight
            ),
            TDigestError::InvalidQuery { reason } => {
                write!(f, "tdigest: invalid query: {}", reason)
            }
            TDigestError::EmptySketch => write!(f, "tdigest: query on an empty digest"),
            TDigestError::CorruptData { reason } => {
                write!(f, "tdigest: corrupt serialized data: {}", reason)
            }
        }
    }
}

impl std::error::Error for TDigestError {}

pub type Result<T> = std::result::Result<T, TDigestError>;

#[cfg(test)]
mod test {
    use crate::error::TDigestError;

    #[test]
    fn display_carries_context() {
        let err = TDigestError::InvalidSample {
            value: f64::NAN,
            weight: 1.0,
        };
        assert!(err.to_string().contains("value NaN"));

        let err = TDigestError::corrupt("means are not sorted");
        assert_eq!(
            err.to_string(),
            "tdigest: corrupt serialized data: means are not sorted"
        );
        assert_eq!(
            TDigestError::EmptySketch.to_string(),
            "tdigest: query on an empty digest"
        );
    }
}
