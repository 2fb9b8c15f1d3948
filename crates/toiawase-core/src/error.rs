//! Error types shared across the toiawase crates.
//!
//! The browser and engine crates carry their own error enums; this module
//! provides the central hub they convert into at crate boundaries, plus the
//! config and keyword-table taxonomies used inside the core crate itself.

use thiserror::Error;

/// Central error hub for the toiawase subsystems.
///
/// One variant per concern, so callers at the outermost layer can match on
/// where a failure came from without depending on every subsystem crate.
#[derive(Error, Debug)]
pub enum ToiawaseError {
    /// Configuration could not be loaded or was invalid
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Keyword table could not be loaded or failed validation
    #[error("keyword table error: {0}")]
    Keywords(#[from] KeywordError),

    /// Browser automation failed (navigation, script evaluation)
    #[error("browser error: {0}")]
    Browser(String),

    /// Operator-supplied inputs were unusable (target lists, profile files)
    #[error("input error: {0}")]
    Input(String),

    /// OCR collaborator failed (endpoint unreachable, bad response)
    #[error("OCR error: {0}")]
    Ocr(String),

    /// Filesystem access failed
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Anything that does not fit the variants above
    #[error("internal error: {0}")]
    Internal(String),
}

/// Result type alias using [`ToiawaseError`].
pub type Result<T> = std::result::Result<T, ToiawaseError>;

/// Errors raised while loading or saving the application config.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// XDG base directories could not be resolved on this platform
    #[error("could not resolve an XDG config directory for toiawase")]
    NoConfigDir,

    /// The config file exists but is not valid TOML
    #[error("config file is not valid TOML: {0}")]
    ParseError(#[from] toml::de::Error),

    /// The config could not be rendered back to TOML
    #[error("could not render config as TOML: {0}")]
    SerializeError(#[from] toml::ser::Error),

    /// Reading or writing the config file failed
    #[error("config I/O: {0}")]
    Io(#[from] std::io::Error),

    /// A field held a value the pipeline cannot work with
    #[error("bad value for {field}: {reason}")]
    InvalidValue {
        /// Field name
        field: String,
        /// What was wrong with it
        reason: String,
    },
}

/// Result type alias for configuration operations.
pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

/// Errors raised while loading or validating a keyword table.
#[derive(Error, Debug)]
pub enum KeywordError {
    /// The table file is not valid TOML
    #[error("failed to parse keyword table in {path}: {source}")]
    ParseError {
        /// Path to the table file, or "<embedded>" for the built-in table
        path: String,
        /// Underlying TOML parse error
        #[source]
        source: toml::de::Error,
    },

    /// The table parsed but violates a structural rule
    #[error("invalid keyword table: {reason}")]
    ValidationError {
        /// Which rule was violated
        reason: String,
    },

    /// Reading a table override file failed
    #[error("keyword table I/O: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type alias for keyword table operations.
pub type KeywordResult<T> = std::result::Result<T, KeywordError>;
