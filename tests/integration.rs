use std::time::Duration;

use serde_json::json;

use payload_capture::capture::run_with_retry;
use payload_capture::{PageTarget, PayloadTemplate, Settings};

fn settings() -> Settings {
    Settings::from_lookup(|key| {
        match key {
            "TYPE_ID_URL" => Some("https://video.example.com/av/content/?id={cid}"),
            "TYPE_ACTRESS_URL" => Some("https://video.example.com/av/list/?actress={actress_id}"),
            "GRAPHQL_API_URL" => Some("api.video.example.com/graphql"),
            _ => None,
        }
        .map(str::to_string)
    })
    .expect("settings should parse")
}

#[test]
fn detail_capture_blanks_the_content_id() {
    // Intercepted body from the worked example: the persisted template must
    // keep every variable except the blanked id.
    let mut payload = PayloadTemplate {
        operation_name: "ContentPageData".to_string(),
        query: "...".to_string(),
        variables: json!({"id": "abc123", "lang": "en"}),
    };
    let target = PageTarget::Detail {
        cid: "abc123".to_string(),
    };
    target.redact(&mut payload);

    assert_eq!(payload.variables, json!({"id": "", "lang": "en"}));
    assert_eq!(payload.operation_name, "ContentPageData");
    assert_eq!(payload.query, "...");
}

#[test]
fn actress_capture_overrides_paging_and_blanks_actress_ids() {
    let mut payload = PayloadTemplate {
        operation_name: "AvSearch".to_string(),
        query: "query AvSearch($offset: Int!) { ... }".to_string(),
        variables: json!({
            "offset": 0,
            "limit": 20,
            "filter": {"actressIds": {"ids": [{"id": "999"}]}}
        }),
    };
    let target = PageTarget::ActressSearch {
        actress_id: "999".to_string(),
        offset: 40,
        limit: 120,
    };
    target.redact(&mut payload);

    assert_eq!(
        payload.variables,
        json!({
            "offset": 40,
            "limit": 120,
            "filter": {"actressIds": {"ids": [{"id": ""}]}}
        })
    );
}

#[test]
fn persisted_template_round_trips_with_exactly_three_keys() {
    let payload = PayloadTemplate {
        operation_name: "ContentPageData".to_string(),
        query: "query {}".to_string(),
        variables: json!({"id": ""}),
    };
    let text = serde_json::to_string_pretty(&payload).expect("should serialize");

    let value: serde_json::Value = serde_json::from_str(&text).expect("should parse back");
    let obj = value.as_object().expect("should be an object");
    assert_eq!(obj.len(), 3);

    let restored: PayloadTemplate = serde_json::from_str(&text).expect("should deserialize");
    assert_eq!(restored, payload);
}

#[test]
fn page_urls_are_templated_from_settings() {
    let settings = settings();
    let detail = PageTarget::Detail {
        cid: "ipzz00780".to_string(),
    };
    assert_eq!(
        detail.url(&settings),
        "https://video.example.com/av/content/?id=ipzz00780"
    );

    let search = PageTarget::ActressSearch {
        actress_id: "1044099".to_string(),
        offset: 0,
        limit: 120,
    };
    assert_eq!(
        search.url(&settings),
        "https://video.example.com/av/list/?actress=1044099"
    );
}

#[tokio::test]
async fn retry_loop_contains_attempt_errors() {
    // Simulated flaky attempts: two errors, then a timeout, then success.
    // The loop must swallow the errors and stop at the first payload.
    let mut log = Vec::new();
    let outcome = run_with_retry(10, Duration::ZERO, |attempt| {
        log.push(attempt);
        async move {
            match attempt {
                1 | 2 => Err(payload_capture::Error::NavigationError(
                    "net::ERR_CONNECTION_RESET".to_string(),
                )),
                3 => Ok(None),
                _ => Ok(Some(PayloadTemplate {
                    operation_name: "ContentPageData".to_string(),
                    query: String::new(),
                    variables: json!({}),
                })),
            }
        }
    })
    .await;

    assert_eq!(log, vec![1, 2, 3, 4]);
    assert_eq!(outcome.map(|p| p.operation_name), Some("ContentPageData".to_string()));
}

#[tokio::test]
async fn retry_loop_returns_absent_after_exhaustion() {
    let mut attempts = 0u32;
    let outcome = run_with_retry(10, Duration::ZERO, |_| {
        attempts += 1;
        async { Ok(None) }
    })
    .await;

    assert!(outcome.is_none());
    assert_eq!(attempts, 10);
}
