use chromiumoxide::cdp::browser_protocol::network::{Headers, SetExtraHttpHeadersParams};
use chromiumoxide::page::Page as CrPage;
use serde_json::{Map, Value};

use crate::error::{Error, Result};

/// Wrapper around a chromiumoxide Page with the small surface the capture
/// loop needs.
pub struct Page {
    inner: CrPage,
}

impl Page {
    pub(crate) fn new(inner: CrPage) -> Self {
        Self { inner }
    }

    /// Returns a reference to the underlying chromiumoxide Page.
    pub fn inner(&self) -> &CrPage {
        &self.inner
    }

    /// Apply a custom header to every request this page makes.
    pub async fn set_extra_header(&self, key: &str, value: &str) -> Result<()> {
        let mut headers = Map::new();
        headers.insert(key.to_string(), Value::String(value.to_string()));
        self.inner
            .execute(SetExtraHttpHeadersParams::new(Headers::new(Value::Object(
                headers,
            ))))
            .await
            .map_err(Error::CdpError)?;
        Ok(())
    }

    /// Navigate to the given URL and wait for the page to load.
    pub async fn goto(&self, url: &str) -> Result<()> {
        self.inner
            .goto(url)
            .await
            .map_err(|e| Error::NavigationError(e.to_string()))?;
        Ok(())
    }

    /// Get the current page URL.
    pub async fn url(&self) -> Result<String> {
        self.inner
            .url()
            .await
            .map_err(|e| Error::NavigationError(e.to_string()))?
            .ok_or_else(|| Error::NavigationError("No URL found".into()))
    }

    /// Get the current page title.
    pub async fn title(&self) -> Result<String> {
        let result = self
            .inner
            .evaluate("document.title")
            .await
            .map_err(|e| Error::JsError(e.to_string()))?;
        match result.into_value::<String>() {
            Ok(title) => Ok(title),
            Err(_) => Ok(String::new()),
        }
    }

    /// Get the full HTML content of the page.
    pub async fn html(&self) -> Result<String> {
        self.inner
            .content()
            .await
            .map_err(|e| Error::JsError(e.to_string()))
    }

    /// Click on an element matching the given CSS selector.
    pub async fn click(&self, selector: &str) -> Result<()> {
        let el = self
            .inner
            .find_element(selector)
            .await
            .map_err(|e| Error::ElementNotFound(e.to_string()))?;
        el.click().await.map_err(Error::CdpError)?;
        Ok(())
    }

    /// Wait for a navigation to complete.
    pub async fn wait_for_navigation(&self) -> Result<()> {
        self.inner
            .wait_for_navigation()
            .await
            .map_err(|e| Error::NavigationError(e.to_string()))?;
        Ok(())
    }

    /// Readiness probe issued while waiting for the target request. The
    /// result is irrelevant; callers tolerate failures.
    pub async fn probe_ready_state(&self) -> Result<()> {
        self.inner
            .evaluate("document.readyState")
            .await
            .map_err(|e| Error::JsError(e.to_string()))?;
        Ok(())
    }
}
