//! Error type shared by every analysis step.
//!
//! ```text
//! RsaError
//! ├── StructuralMismatch  (onset/label counts, axis lengths, shapes)
//! ├── MissingCoordinate   (required coordinate not retained on the trial axis)
//! ├── MissingParameter    (quantile statistic without a quantile)
//! ├── InvalidParameter    (unknown metric, q outside [0, 1], bad grid)
//! ├── WindowOutOfRange    (baseline / peak window outside the time extent)
//! ├── LabelNotInOrder     (stimulus label absent from the canonical ordering)
//! └── Io / Json / Format  (thin file layer)
//! ```
//!
//! All errors are fatal to the operation that raised them: no step returns a
//! partial result.
use std::path::PathBuf;
use thiserror::Error;

/// `Result` alias used throughout the library.
pub type Result<T> = std::result::Result<T, RsaError>;

#[derive(Debug, Error)]
pub enum RsaError {
    /// Two inputs that must line up do not.
    #[error("structural mismatch: {what} (expected {expected}, got {actual})")]
    StructuralMismatch {
        what: &'static str,
        expected: usize,
        actual: usize,
    },

    /// A coordinate required by the operation is not present.
    #[error("missing coordinate `{0}` along the trial axis")]
    MissingCoordinate(String),

    /// A statistic needs an auxiliary value that was not supplied.
    #[error("missing parameter `{param}` required by method `{method}`")]
    MissingParameter {
        param: &'static str,
        method: &'static str,
    },

    /// A parameter value is not acceptable.
    #[error("invalid parameter `{param}`: {reason}")]
    InvalidParameter {
        param: &'static str,
        reason: String,
    },

    /// A time window does not fit inside the available relative-time extent.
    #[error("window ({start}, {end}) outside time extent [{first}, {last}]")]
    WindowOutOfRange {
        start: f64,
        end: f64,
        first: f64,
        last: f64,
    },

    /// A label in the data is missing from the caller's canonical ordering.
    #[error("stimulus `{0}` is not present in the requested ordering")]
    LabelNotInOrder(String),

    #[error("I/O error on {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// A file was readable but its content does not have the expected layout.
    #[error("malformed file {path:?}: {reason}")]
    Format { path: PathBuf, reason: String },
}

impl RsaError {
    pub(crate) fn invalid(param: &'static str, reason: impl Into<String>) -> Self {
        RsaError::InvalidParameter { param, reason: reason.into() }
    }

    pub(crate) fn mismatch(what: &'static str, expected: usize, actual: usize) -> Self {
        RsaError::StructuralMismatch { what, expected, actual }
    }
}
