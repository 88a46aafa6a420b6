// ============================================================
// Layer 3 — Pipeline Errors
// ============================================================
// One structured error type for the whole loading core.
//
// Construction-time failures (manifest, label range, element
// type) abort pipeline setup. Per-batch failures (decode,
// unknown id, bad arguments) abort only that request and leave
// the catalog and chunk store consistent.
//
// The application and CLI layers wrap these in anyhow so they
// can attach context; inside the core we keep them typed so
// callers can match on the variant.
//
// Reference: Rust Book §9 (Recoverable Errors with Result)
//            thiserror crate documentation

use std::path::PathBuf;

use thiserror::Error;

/// Every failure the loading core can report.
#[derive(Debug, Error)]
pub enum PipelineError {
    /// The manifest file could not be opened or read.
    #[error("cannot read manifest '{}': {source}", path.display())]
    ManifestUnreadable {
        path:   PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A manifest line is malformed. `line` is 1-based.
    #[error("invalid manifest line {line}: {reason}")]
    ManifestFormat { line: usize, reason: String },

    /// A record's class id does not fit the configured label dimension.
    #[error("sequence {id} has class id {class_id}, label dimension is {label_dimension}")]
    LabelOutOfRange {
        id:              usize,
        class_id:        usize,
        label_dimension: usize,
    },

    /// The configured label element type is neither 32- nor 64-bit float.
    #[error("unsupported label element type '{type_id}'")]
    UnsupportedLabelElementType { type_id: String },

    /// A sample's bytes could not be read or interpreted.
    #[error("cannot decode sample '{}': {reason}", path.display())]
    Decode { path: PathBuf, reason: String },

    /// The caller asked for a sequence id the catalog does not contain.
    #[error("unknown sequence id {id}")]
    UnknownSequenceId { id: usize },

    #[error("invalid argument: {0}")]
    InvalidArgument(String),
}

impl PipelineError {
    /// Shorthand for a decode failure with a formatted reason.
    pub fn decode(path: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        Self::Decode {
            path:   path.into(),
            reason: reason.into(),
        }
    }

    pub fn invalid(msg: impl Into<String>) -> Self {
        Self::InvalidArgument(msg.into())
    }
}

/// Result alias used throughout the core.
pub type Result<T> = std::result::Result<T, PipelineError>;
