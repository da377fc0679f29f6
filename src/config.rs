use std::env;
use std::time::Duration;

use crate::error::{Error, Result};

/// Target GraphQL operation on the detail page.
pub const OPERATION_DETAIL: &str = "ContentPageData";
/// Target GraphQL operation on the actress-search page.
pub const OPERATION_ACTRESS: &str = "AvSearch";

/// How many times a capture loop re-runs a failed attempt.
pub const MAX_RETRY: u32 = 10;
/// Pause between failed attempts.
pub const RETRY_INTERVAL: Duration = Duration::from_secs(3);
/// How long one attempt waits for the target request to fire.
pub const WAIT_GRAPHQL: Duration = Duration::from_secs(15);
/// Latch poll interval during the capture wait.
pub const POLL_INTERVAL: Duration = Duration::from_millis(500);
/// Bound on the navigation that follows the age-gate click.
pub const AGE_NAV_TIMEOUT: Duration = Duration::from_secs(30);

/// Environment-driven settings. All URL values are site-specific and kept
/// out of the source tree; see `.env.example`.
#[derive(Debug, Clone)]
pub struct Settings {
    /// Detail-page URL template containing the literal `{cid}`.
    pub detail_url: String,
    /// Actress-page URL template containing the literal `{actress_id}`.
    pub actress_url: String,
    /// Substring identifying the GraphQL endpoint URL.
    pub graphql_url: String,
    /// Optional custom header applied to every page request.
    pub extra_header: Option<(String, String)>,
}

impl Settings {
    /// Read settings from the process environment. Call `dotenv` first if a
    /// `.env` file should be honored.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build settings from an arbitrary variable source. Missing required
    /// variables are reported together rather than one at a time; empty
    /// values count as missing.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let get = |key: &str| lookup(key).filter(|v| !v.is_empty());

        let detail_url = get("TYPE_ID_URL");
        let actress_url = get("TYPE_ACTRESS_URL");
        let graphql_url = get("GRAPHQL_API_URL");

        let mut missing = Vec::new();
        if detail_url.is_none() {
            missing.push("TYPE_ID_URL");
        }
        if actress_url.is_none() {
            missing.push("TYPE_ACTRESS_URL");
        }
        if graphql_url.is_none() {
            missing.push("GRAPHQL_API_URL");
        }

        match (detail_url, actress_url, graphql_url) {
            (Some(detail_url), Some(actress_url), Some(graphql_url)) => {
                let extra_header = match (get("HEADER_KEY"), get("HEADER_VALUE")) {
                    (Some(key), Some(value)) => Some((key, value)),
                    _ => None,
                };
                Ok(Self {
                    detail_url,
                    actress_url,
                    graphql_url,
                    extra_header,
                })
            }
            _ => Err(Error::MissingConfig(missing.join(", "))),
        }
    }

    /// Detail-page URL for a concrete content id.
    pub fn detail_page_url(&self, cid: &str) -> String {
        self.detail_url.replace("{cid}", cid)
    }

    /// Actress-search URL for a concrete actress id.
    pub fn actress_page_url(&self, actress_id: &str) -> String {
        self.actress_url.replace("{actress_id}", actress_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn vars<'a>(pairs: &'a [(&'a str, &'a str)]) -> impl Fn(&str) -> Option<String> + 'a {
        move |key| {
            pairs
                .iter()
                .find(|(k, _)| *k == key)
                .map(|(_, v)| v.to_string())
        }
    }

    #[test]
    fn all_required_present() {
        let settings = Settings::from_lookup(vars(&[
            ("TYPE_ID_URL", "https://example.com/detail/{cid}/"),
            ("TYPE_ACTRESS_URL", "https://example.com/actress/{actress_id}/"),
            ("GRAPHQL_API_URL", "api.example.com/graphql"),
        ]))
        .expect("settings should parse");
        assert_eq!(settings.graphql_url, "api.example.com/graphql");
        assert!(settings.extra_header.is_none());
    }

    #[test]
    fn missing_variables_reported_together() {
        let err = Settings::from_lookup(vars(&[(
            "TYPE_ACTRESS_URL",
            "https://example.com/actress/{actress_id}/",
        )]))
        .unwrap_err();
        let message = err.to_string();
        assert!(message.contains("TYPE_ID_URL"));
        assert!(message.contains("GRAPHQL_API_URL"));
        assert!(!message.contains("TYPE_ACTRESS_URL"));
    }

    #[test]
    fn empty_value_counts_as_missing() {
        let err = Settings::from_lookup(vars(&[
            ("TYPE_ID_URL", ""),
            ("TYPE_ACTRESS_URL", "https://example.com/actress/{actress_id}/"),
            ("GRAPHQL_API_URL", "api.example.com/graphql"),
        ]))
        .unwrap_err();
        assert!(err.to_string().contains("TYPE_ID_URL"));
    }

    #[test]
    fn header_requires_both_halves() {
        let settings = Settings::from_lookup(vars(&[
            ("TYPE_ID_URL", "https://example.com/detail/{cid}/"),
            ("TYPE_ACTRESS_URL", "https://example.com/actress/{actress_id}/"),
            ("GRAPHQL_API_URL", "api.example.com/graphql"),
            ("HEADER_KEY", "x-custom"),
        ]))
        .expect("settings should parse");
        assert!(settings.extra_header.is_none());

        let settings = Settings::from_lookup(vars(&[
            ("TYPE_ID_URL", "https://example.com/detail/{cid}/"),
            ("TYPE_ACTRESS_URL", "https://example.com/actress/{actress_id}/"),
            ("GRAPHQL_API_URL", "api.example.com/graphql"),
            ("HEADER_KEY", "x-custom"),
            ("HEADER_VALUE", "1"),
        ]))
        .expect("settings should parse");
        assert_eq!(
            settings.extra_header,
            Some(("x-custom".to_string(), "1".to_string()))
        );
    }

    #[test]
    fn url_templating() {
        let settings = Settings::from_lookup(vars(&[
            ("TYPE_ID_URL", "https://example.com/detail/{cid}/"),
            ("TYPE_ACTRESS_URL", "https://example.com/actress/{actress_id}/"),
            ("GRAPHQL_API_URL", "api.example.com/graphql"),
        ]))
        .expect("settings should parse");
        assert_eq!(
            settings.detail_page_url("abc123"),
            "https://example.com/detail/abc123/"
        );
        assert_eq!(
            settings.actress_page_url("999"),
            "https://example.com/actress/999/"
        );
    }
}
