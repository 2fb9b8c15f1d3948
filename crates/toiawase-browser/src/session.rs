use crate::error::{BrowserError, Result};
use crate::scope::{DomScope, Rect, ScopeRef};
use chromiumoxide::cdp::browser_protocol::page::{
    AddScriptToEvaluateOnNewDocumentParams, CaptureScreenshotFormat, Viewport,
};
use chromiumoxide::page::{Page, ScreenshotParams};
use serde::de::DeserializeOwned;
use std::time::Duration;

/// Replaces the native dialog functions so alert/confirm/prompt popups
/// raised by form scripts never block the pipeline. confirm answers yes,
/// matching what an operator clicking through a submission would do.
const DIALOG_SUPPRESSION_JS: &str =
    "window.alert = () => {}; window.confirm = () => true; window.prompt = () => null;";

/// One browser page, reused across all targets of a run.
pub struct Session {
    page: Page,
    navigation_timeout: Duration,
    settle_delay: Duration,
}

impl Session {
    pub(crate) fn new(page: Page, navigation_timeout: Duration, settle_delay: Duration) -> Self {
        Self {
            page,
            navigation_timeout,
            settle_delay,
        }
    }

    /// Navigate to a URL, wait for the load to finish, then apply the settle
    /// delay that gives late-running form scripts time to render.
    pub async fn navigate(&self, url: &str) -> Result<()> {
        let navigation = async {
            self.page.goto(url).await?;
            self.page.wait_for_navigation().await?;
            Ok::<(), chromiumoxide::error::CdpError>(())
        };

        match tokio::time::timeout(self.navigation_timeout, navigation).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => return Err(BrowserError::NavigationError(format!("{url}: {e}"))),
            Err(_) => return Err(BrowserError::Timeout(format!("navigation to {url}"))),
        }

        tokio::time::sleep(self.settle_delay).await;
        Ok(())
    }

    /// The URL the page is currently on. Empty if the target reports none.
    pub async fn current_url(&self) -> Result<String> {
        Ok(self.page.url().await?.unwrap_or_default())
    }

    /// Full HTML source of the current document.
    pub async fn content(&self) -> Result<String> {
        Ok(self.page.content().await?)
    }

    /// Rendered body text, truncated in the page context to keep the
    /// round-trip bounded on very large documents.
    pub async fn body_text(&self, limit: usize) -> Result<String> {
        let js = format!(
            "(() => (document.body ? document.body.innerText : '').slice(0, {limit}))()"
        );
        self.evaluate(&js).await
    }

    /// Plain bounded wait.
    pub async fn wait_millis(&self, millis: u64) {
        tokio::time::sleep(Duration::from_millis(millis)).await;
    }

    /// Poll until the page URL differs from `previous` or the timeout
    /// elapses. Returns whether a change was observed; timing out is not an
    /// error.
    pub async fn wait_for_url_change(&self, previous: &str, timeout: Duration) -> Result<bool> {
        let deadline = tokio::time::Instant::now() + timeout;
        loop {
            let current = self.current_url().await?;
            if !current.is_empty() && current != previous {
                return Ok(true);
            }
            if tokio::time::Instant::now() >= deadline {
                return Ok(false);
            }
            tokio::time::sleep(Duration::from_millis(250)).await;
        }
    }

    /// Number of iframes in the main document.
    pub async fn frame_count(&self) -> Result<usize> {
        self.evaluate("document.querySelectorAll('iframe').length")
            .await
    }

    /// Evaluate a page-context expression and deserialize its value.
    pub async fn evaluate<T: DeserializeOwned>(&self, expression: &str) -> Result<T> {
        let result = self
            .page
            .evaluate(expression)
            .await
            .map_err(|e| BrowserError::ScriptError(e.to_string()))?;
        result
            .into_value::<T>()
            .map_err(|e| BrowserError::ScriptError(e.to_string()))
    }

    /// Evaluate a page-context expression for its side effects only.
    pub async fn run(&self, expression: &str) -> Result<()> {
        self.page
            .evaluate(expression)
            .await
            .map_err(|e| BrowserError::ScriptError(e.to_string()))?;
        Ok(())
    }

    /// Register dialog suppression for every future document on this page.
    pub async fn install_dialog_suppression(&self) -> Result<()> {
        self.page
            .execute(AddScriptToEvaluateOnNewDocumentParams::new(
                DIALOG_SUPPRESSION_JS,
            ))
            .await?;
        Ok(())
    }

    /// Apply dialog suppression to the document that is already loaded.
    pub async fn suppress_dialogs_now(&self) -> Result<()> {
        self.run(DIALOG_SUPPRESSION_JS).await
    }

    /// Screenshot a page-coordinate rectangle as PNG.
    pub async fn screenshot_clip(&self, rect: &Rect) -> Result<Vec<u8>> {
        let params = ScreenshotParams::builder()
            .format(CaptureScreenshotFormat::Png)
            .clip(Viewport {
                x: rect.x,
                y: rect.y,
                width: rect.width,
                height: rect.height,
                scale: 1.0,
            })
            .build();
        Ok(self.page.screenshot(params).await?)
    }

    /// Real-input click on the first element matching a CSS selector in the
    /// main document. Used for submit activation, where a trusted click is
    /// more reliable than a script-dispatched one.
    pub async fn click_selector(&self, selector: &str) -> Result<()> {
        let element = self
            .page
            .find_element(selector)
            .await
            .map_err(|e| BrowserError::ChromiumError(e.to_string()))?;
        element.scroll_into_view().await?;
        element.click().await?;
        Ok(())
    }

    /// A scope-bound view for DOM collection and mutation.
    #[must_use]
    pub fn scope(&self, scope: ScopeRef) -> DomScope<'_> {
        DomScope::new(self, scope)
    }

    /// Close the tab. A page wedged mid-load can hang the close command,
    /// so it is abandoned after a short grace period.
    pub async fn close(self) -> Result<()> {
        match tokio::time::timeout(Duration::from_secs(2), self.page.close()).await {
            Ok(result) => {
                result?;
                Ok(())
            }
            Err(_) => Err(BrowserError::Timeout("page close".to_string())),
        }
    }
}
