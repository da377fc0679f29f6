use tokio::time::timeout;
use tracing::{info, warn};

use crate::config::AGE_NAV_TIMEOUT;
use crate::error::{Error, Result};
use crate::page::Page;

/// URL fragment that identifies the age-verification interstitial.
const AGE_URL_MARKER: &str = "age_check";
/// Marker text on the interstitial (the site renders it in Japanese).
const AGE_CONTENT_MARKER: &str = "年齢認証";
/// The "I am 18 or older" confirmation link.
const CONFIRM_SELECTOR: &str = r#"a[href*="declared=yes"]"#;

/// Click through the age-verification interstitial if the page landed on
/// one. Returns `Ok(true)` when the page is usable, either because there was
/// no gate or because it was passed, and `Ok(false)` when the confirmation
/// link could not be found; the caller abandons the attempt in that case.
pub async fn resolve_age_gate(page: &Page) -> Result<bool> {
    let url = page.url().await?;
    let gated = url.contains(AGE_URL_MARKER) || page.html().await?.contains(AGE_CONTENT_MARKER);
    if !gated {
        info!("no age verification required");
        return Ok(true);
    }

    info!("age verification page detected");
    match page.click(CONFIRM_SELECTOR).await {
        Ok(()) => {}
        Err(Error::ElementNotFound(_)) => {
            warn!("age verification button not found");
            return Ok(false);
        }
        Err(e) => return Err(e),
    }

    timeout(AGE_NAV_TIMEOUT, page.wait_for_navigation())
        .await
        .map_err(|_| Error::Timeout("age gate navigation".into()))??;

    info!("age verification passed");
    Ok(true)
}
