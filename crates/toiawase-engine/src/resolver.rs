//! Form scope resolution.

use crate::error::Result;
use toiawase_browser::{ScopeRef, Session};
use tracing::debug;

/// Find the document scope showing inquiry-form UI: the main document
/// first, then each iframe in document order. A scope qualifies when it
/// has a visible free-text control or at least one visible input/select
/// inside a form element. Cross-origin frames probe as empty and are
/// passed over.
pub async fn resolve(session: &Session) -> Result<Option<ScopeRef>> {
    if session.scope(ScopeRef::Main).probe_form_ui().await? {
        debug!("form UI found in main document");
        return Ok(Some(ScopeRef::Main));
    }

    let frames = session.frame_count().await?;
    for index in 0..frames {
        let scope = ScopeRef::Frame(index);
        if session.scope(scope).probe_form_ui().await? {
            debug!(frame = index, "form UI found in frame");
            return Ok(Some(scope));
        }
    }

    debug!(frames, "no form UI in any scope");
    Ok(None)
}
