//! Error types for the pipeline engine.

use thiserror::Error;

/// Result type for engine operations.
pub type Result<T> = std::result::Result<T, EngineError>;

/// Result type for OCR collaborators.
pub type OcrResult<T> = std::result::Result<T, EngineError>;

/// Errors that can cross a pipeline component boundary.
///
/// Heuristic misses are not errors; components report them as the absence
/// of an effect (an empty candidate list, a `None` scope, a false return).
/// Only driver failures and collaborator transport failures surface here,
/// and the per-target runner converts whatever reaches it into an
/// `ERR_EXCEPTION` outcome rather than aborting the batch.
#[derive(Error, Debug)]
pub enum EngineError {
    /// The browser driver failed underneath a pipeline step.
    #[error("browser error: {0}")]
    Browser(#[from] toiawase_browser::BrowserError),

    /// The OCR sidecar was unreachable or answered malformed data.
    #[error("OCR error: {0}")]
    Ocr(String),

    /// The interactive challenge gate could not collect a resolution.
    #[error("challenge gate error: {0}")]
    Gate(String),
}
