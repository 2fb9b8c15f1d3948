//! Toiawase Engine - Inquiry form pipeline.
//!
//! This crate locates an inquiry form on an arbitrary company site, fills
//! it from a sender profile, submits it, and classifies the result. Every
//! stage is keyword-driven heuristics over collected DOM metadata; the
//! planning and classification logic is pure, with thin async executors
//! replaying decisions through the browser.
//!
//! # Pipeline
//!
//! - **Resolver** ([`resolver`]): find the document scope showing form UI
//! - **Discovery** ([`discovery`]): contact-link extraction and bounded traversal
//! - **Fill** ([`fill`]): semantic field routing from profile to controls
//! - **Captcha** ([`captcha`]): OCR for image challenges, gate for widgets
//! - **Submit** ([`submit`]): tiered submit-control choice and activation
//! - **Classify** ([`classify`]): evidence polling and verdict rendering
//! - **Runner** ([`runner`]): per-target orchestration and batch loop
//!
//! # Example
//!
//! ```rust,ignore
//! use toiawase_core::{KeywordTable, Profile, Target};
//! use toiawase_engine::{NullOcr, Runner, RunnerConfig};
//!
//! let runner = Runner::new(
//!     KeywordTable::builtin().clone(),
//!     RunnerConfig::from(&config.run),
//!     Box::new(NullOcr),
//! );
//! let summary = runner.run_batch(&engine, &targets, &profile).await?;
//! println!("{} of {} succeeded", summary.succeeded(), summary.processed());
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]

pub mod captcha;
#[allow(missing_docs)]
pub mod classify;
#[allow(missing_docs)]
pub mod discovery;
pub mod error;
#[allow(missing_docs)]
pub mod fill;
pub mod ocr;
pub mod resolver;
pub mod runner;
#[allow(missing_docs)]
pub mod submit;

// Re-export commonly used types
pub use captcha::{AutoGate, CaptchaReport, ChallengeGate, StdinGate};
pub use classify::{PollSettings, Round, Verdict};
pub use error::{EngineError, Result};
pub use fill::{FillPlan, FillReport};
pub use ocr::{HttpOcrClient, NullOcr, OcrClient};
pub use runner::{Runner, RunnerConfig};
pub use submit::{Stage, SubmitChoice};
