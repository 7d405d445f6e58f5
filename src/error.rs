use std::path::PathBuf;

/// Domain failures raised by the report pipeline.
///
/// Library functions return `anyhow::Result` and wrap these where a typed
/// cause exists, so callers can still `downcast_ref::<ReportError>()`.
#[derive(Debug, thiserror::Error)]
pub enum ReportError {
    #[error("No consensus sequences found in: {}", .0.display())]
    NoConsensus(PathBuf),

    #[error("Sample '{sample}' is missing its {kind} file (strict mode)")]
    MissingCompanion { sample: String, kind: &'static str },

    #[error("No variant call files ({suffix}) found in: {}", .dir.display())]
    NoVariantFiles { dir: PathBuf, suffix: &'static str },

    #[error("A consensus subdirectory (--subdir) must be specified for iVar variant calls")]
    MissingSubdir,

    #[error("Invalid frequency/depth threshold '{0}': expected <freq>:<depth>[-<freq>:<depth>...]")]
    Threshold(String),

    #[error("Malformed {kind} file {}: {reason}", .path.display())]
    Malformed {
        kind: &'static str,
        path: PathBuf,
        reason: String,
    },

    #[error("GenBank file contains no records: {}", .0.display())]
    NoReferenceRecord(PathBuf),

    #[error("Reference sequence is empty: {0}")]
    EmptyReference(String),
}
