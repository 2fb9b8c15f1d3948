//! Browser automation engine for JavaScript-heavy sites.
//!
//! Provides headless browser control with scope-relative DOM access,
//! dialog suppression, and a lightweight Japanese desktop fingerprint
//! for inquiry-form interaction.

pub mod engine;
pub mod error;
pub mod fingerprint;
pub mod scope;
pub mod session;

pub use engine::{BrowserEngine, LaunchOptions};
pub use error::{BrowserError, Result};
pub use fingerprint::FingerprintConfig;
pub use scope::{
    AnchorMeta, CaptchaScan, ClickableMeta, ClickableScan, ControlMeta, DomScope, Rect, ScopeRef,
    PICK_MARKER_SELECTOR,
};
pub use session::Session;
