//! Toiawase Core - Foundation crate for the toiawase inquiry pipeline.
//!
//! This crate provides the shared types, error handling, configuration
//! management, and keyword vocabularies that all other toiawase crates
//! depend on.
//!
//! # Modules
//!
//! - [`error`] - Central error types using thiserror
//! - [`config`] - TOML-based configuration with XDG paths
//! - [`types`] - Shared domain types (`Profile`, `Target`, `FieldType`, `Outcome`)
//! - [`keywords`] - Heuristic keyword tables loaded as ordered data
//!
//! # Example
//!
//! ```rust
//! use toiawase_core::{KeywordTable, Profile, FieldType};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let table = KeywordTable::builtin();
//! assert_eq!(table.classify_text("会社名"), Some(FieldType::Company));
//!
//! let profile = Profile {
//!     name: "山田 太郎".to_string(),
//!     company: "株式会社例".to_string(),
//!     message: "{{company}}の{{name}}と申します。".to_string(),
//!     ..Profile::default()
//! };
//! let profile = profile.with_resolved_message();
//! assert_eq!(profile.message, "株式会社例の山田 太郎と申します。");
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]

pub mod config;
pub mod error;
pub mod keywords;
pub mod types;

// Re-export commonly used types
pub use config::{AppConfig, BrowserConfig, KeywordConfig, OcrConfig, RunConfig};
pub use error::{ConfigError, ConfigResult, KeywordError, KeywordResult, Result, ToiawaseError};
pub use keywords::KeywordTable;
pub use types::{FieldType, Outcome, Profile, ReasonCode, RunSummary, Target};
