//! Browser process lifecycle.

use crate::error::{BrowserError, Result};
use crate::fingerprint::FingerprintConfig;
use crate::session::Session;
use chromiumoxide::browser::{Browser, BrowserConfig};
use chromiumoxide::cdp::browser_protocol::emulation::SetTimezoneOverrideParams;
use futures_util::StreamExt;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Options controlling the browser process and the sessions opened on it.
#[derive(Debug, Clone)]
pub struct LaunchOptions {
    pub headless: bool,
    pub window_width: u32,
    pub window_height: u32,
    /// Budget for one navigation before the page is written off.
    pub navigation_timeout: Duration,
    /// Pause after each navigation so late scripts can settle.
    pub settle_delay: Duration,
}

impl Default for LaunchOptions {
    fn default() -> Self {
        Self {
            headless: true,
            window_width: 1366,
            window_height: 900,
            navigation_timeout: Duration::from_secs(15),
            settle_delay: Duration::from_millis(1000),
        }
    }
}

/// A running browser process plus the fingerprint its sessions present.
pub struct BrowserEngine {
    browser: Browser,
    fingerprint: FingerprintConfig,
    options: LaunchOptions,
}

impl BrowserEngine {
    /// Launch a browser presenting a randomized desktop fingerprint.
    pub async fn launch(options: LaunchOptions) -> Result<Self> {
        Self::with_fingerprint(options, FingerprintConfig::randomized()).await
    }

    /// Launch a browser presenting a specific fingerprint.
    pub async fn with_fingerprint(
        options: LaunchOptions,
        fingerprint: FingerprintConfig,
    ) -> Result<Self> {
        let mut builder = BrowserConfig::builder()
            .no_sandbox()
            .window_size(options.window_width, options.window_height)
            .arg(format!("--user-agent={}", fingerprint.user_agent))
            .arg(format!("--lang={}", fingerprint.language))
            .arg("--disable-blink-features=AutomationControlled");
        if !options.headless {
            builder = builder.with_head();
        }
        let config = builder.build().map_err(BrowserError::ChromiumError)?;

        let (browser, mut handler) = Browser::launch(config).await?;
        tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                if event.is_err() {
                    break;
                }
            }
        });

        info!(headless = options.headless, "browser launched");
        Ok(Self {
            browser,
            fingerprint,
            options,
        })
    }

    /// Fingerprint presented by this engine's sessions.
    #[must_use]
    pub fn fingerprint(&self) -> &FingerprintConfig {
        &self.fingerprint
    }

    /// Open a fresh page with the timezone override applied and dialog
    /// suppression installed for every document it will load.
    pub async fn new_session(&self) -> Result<Session> {
        let page = self.browser.new_page("about:blank").await?;
        if let Err(err) = page
            .execute(SetTimezoneOverrideParams::new(
                self.fingerprint.timezone.clone(),
            ))
            .await
        {
            warn!(error = %err, "timezone override rejected");
        }
        let session = Session::new(
            page,
            self.options.navigation_timeout,
            self.options.settle_delay,
        );
        session.install_dialog_suppression().await?;
        debug!("session ready");
        Ok(session)
    }

    /// Shut the browser down and wait for the process to exit.
    pub async fn close(&mut self) -> Result<()> {
        self.browser.close().await?;
        let _ = self.browser.wait().await;
        info!("browser closed");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_launch_options() {
        let options = LaunchOptions::default();
        assert!(options.headless);
        assert_eq!(options.window_width, 1366);
        assert_eq!(options.navigation_timeout, Duration::from_secs(15));
        assert_eq!(options.settle_delay, Duration::from_millis(1000));
    }
}
