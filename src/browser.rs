use chromiumoxide::browser::{Browser as CrBrowser, BrowserConfig as CrBrowserConfig};
use futures::StreamExt;

use crate::error::{Error, Result};
use crate::page::Page;

/// Chrome flags that improve performance without affecting functionality.
const PERF_ARGS: &[&str] = &[
    "disable-gpu",
    "disable-extensions",
    "metrics-recording-only",
    "mute-audio",
    "no-default-browser-check",
    "disable-client-side-phishing-detection",
    "disable-popup-blocking",
    "disable-prompt-on-repost",
];

/// One isolated headless Chrome session. The capture loop launches a fresh
/// session per attempt and tears it down before the next, so no browser
/// state survives across attempts.
pub struct CaptureBrowser {
    browser: CrBrowser,
    handler_task: tokio::task::JoinHandle<()>,
}

impl CaptureBrowser {
    /// Launch a headless browser instance.
    pub async fn launch() -> Result<Self> {
        let mut builder = CrBrowserConfig::builder().new_headless_mode().no_sandbox();

        for arg in PERF_ARGS {
            builder = builder.arg(*arg);
        }

        let config = builder
            .build()
            .map_err(|e| Error::LaunchError(e.to_string()))?;

        let (browser, mut handler) = CrBrowser::launch(config)
            .await
            .map_err(|e| Error::LaunchError(e.to_string()))?;

        let handler_task = tokio::spawn(async move {
            while let Some(_event) = handler.next().await {}
        });

        Ok(Self {
            browser,
            handler_task,
        })
    }

    /// Open a blank page. The caller attaches its request listener here,
    /// before navigating anywhere that produces traffic worth capturing.
    pub async fn blank_page(&self) -> Result<Page> {
        let cr_page = self
            .browser
            .new_page("about:blank")
            .await
            .map_err(|e| Error::NavigationError(e.to_string()))?;
        Ok(Page::new(cr_page))
    }

    /// Close the session and stop the CDP event loop. Shutdown problems are
    /// not worth failing an attempt over.
    pub async fn close(mut self) {
        let _ = self.browser.close().await;
        let _ = self.browser.wait().await;
        self.handler_task.abort();
    }
}
