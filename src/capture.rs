use std::future::Future;
use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, Instant};

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use chromiumoxide::cdp::browser_protocol::network::{EventRequestWillBeSent, Request};
use futures::StreamExt;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

use crate::age;
use crate::browser::CaptureBrowser;
use crate::config::{
    Settings, MAX_RETRY, OPERATION_ACTRESS, OPERATION_DETAIL, POLL_INTERVAL, RETRY_INTERVAL,
    WAIT_GRAPHQL,
};
use crate::error::{Error, Result};
use crate::page::Page;

/// Directory the captured templates are written to.
pub const PAYLOAD_DIR: &str = "PAYLOAD";

/// A captured GraphQL request, persisted as a reusable template. The
/// `variables` mapping is site-defined, so it stays free-form JSON.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PayloadTemplate {
    pub operation_name: String,
    pub query: String,
    pub variables: Value,
}

/// Which page a capture loop drives, and how its payload is post-processed
/// before persistence.
#[derive(Debug, Clone)]
pub enum PageTarget {
    Detail {
        cid: String,
    },
    ActressSearch {
        actress_id: String,
        offset: u64,
        limit: u64,
    },
}

impl PageTarget {
    pub fn label(&self) -> &'static str {
        match self {
            Self::Detail { .. } => "detail page",
            Self::ActressSearch { .. } => "actress search",
        }
    }

    /// The GraphQL operation this page type is expected to fire.
    pub fn operation(&self) -> &'static str {
        match self {
            Self::Detail { .. } => OPERATION_DETAIL,
            Self::ActressSearch { .. } => OPERATION_ACTRESS,
        }
    }

    pub fn url(&self, settings: &Settings) -> String {
        match self {
            Self::Detail { cid } => settings.detail_page_url(cid),
            Self::ActressSearch { actress_id, .. } => settings.actress_page_url(actress_id),
        }
    }

    pub fn output_file(&self) -> &'static str {
        match self {
            Self::Detail { .. } => "PAYLOAD_ID.json",
            Self::ActressSearch { .. } => "PAYLOAD_ACTRESS.json",
        }
    }

    /// Blank identifying variable values and, for searches, force the
    /// caller's paging. Idempotent.
    pub fn redact(&self, payload: &mut PayloadTemplate) {
        match self {
            Self::Detail { .. } => redact_detail(&mut payload.variables),
            Self::ActressSearch { offset, limit, .. } => {
                redact_actress_search(&mut payload.variables, *offset, *limit)
            }
        }
    }
}

fn redact_detail(variables: &mut Value) {
    if let Some(vars) = variables.as_object_mut() {
        if let Some(id) = vars.get_mut("id") {
            *id = Value::String(String::new());
        }
    }
}

fn redact_actress_search(variables: &mut Value, offset: u64, limit: u64) {
    let Some(vars) = variables.as_object_mut() else {
        return;
    };
    vars.insert("offset".to_string(), offset.into());
    vars.insert("limit".to_string(), limit.into());

    let ids = vars
        .get_mut("filter")
        .and_then(|f| f.get_mut("actressIds"))
        .and_then(|a| a.get_mut("ids"))
        .and_then(Value::as_array_mut);
    if let Some(ids) = ids {
        for entry in ids {
            if let Some(obj) = entry.as_object_mut() {
                if let Some(id) = obj.get_mut("id") {
                    *id = Value::String(String::new());
                }
            }
        }
    }
}

/// Best-effort parse of an intercepted POST body. Returns a payload only
/// when the body is JSON and names the target operation; everything else is
/// unrelated traffic and is ignored.
fn parse_matching_body(body: &str, operation: &str) -> Option<PayloadTemplate> {
    let value: Value = serde_json::from_str(body).ok()?;
    if value.get("operationName")?.as_str()? != operation {
        return None;
    }
    Some(PayloadTemplate {
        operation_name: operation.to_owned(),
        query: value
            .get("query")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_owned(),
        variables: value.get("variables").cloned().unwrap_or(Value::Null),
    })
}

/// Reassemble an intercepted request's POST body. CDP delivers the body as
/// base64-encoded entries; anything that fails to decode as UTF-8 text is
/// treated as absent.
fn reassemble_post_data(request: &Request) -> Option<String> {
    let entries = request.post_data_entries.as_ref()?;
    let mut bytes = Vec::new();
    for entry in entries {
        let encoded: &str = entry.bytes.as_ref()?.as_ref();
        bytes.extend(BASE64.decode(encoded).ok()?);
    }
    String::from_utf8(bytes).ok()
}

/// Single-writer latch, created fresh per attempt. The interceptor task
/// writes it at most once; the poll loop reads it.
type Latch = Arc<Mutex<Option<PayloadTemplate>>>;

/// Store `payload` unless something was already captured this attempt.
/// Returns whether the payload was stored.
async fn latch_store(latch: &Latch, payload: PayloadTemplate) -> bool {
    let mut slot = latch.lock().await;
    if slot.is_some() {
        return false;
    }
    *slot = Some(payload);
    true
}

/// Subscribe to outgoing requests on `page` and latch the first POST to the
/// GraphQL endpoint whose body names `operation`. Must run before
/// navigation, or the request can fire unobserved.
async fn attach_interceptor(
    page: &Page,
    endpoint: &str,
    operation: &'static str,
) -> Result<(Latch, JoinHandle<()>)> {
    let mut events = page
        .inner()
        .event_listener::<EventRequestWillBeSent>()
        .await
        .map_err(Error::CdpError)?;

    let latch: Latch = Arc::new(Mutex::new(None));
    let slot = Arc::clone(&latch);
    let endpoint = endpoint.to_owned();

    let task = tokio::spawn(async move {
        while let Some(event) = events.next().await {
            let request = &event.request;
            if request.method != "POST" || !request.url.contains(&endpoint) {
                continue;
            }
            let Some(body) = reassemble_post_data(request) else {
                continue;
            };
            let Some(payload) = parse_matching_body(&body, operation) else {
                continue;
            };
            if latch_store(&slot, payload).await {
                info!("captured {operation}");
            }
        }
    });

    Ok((latch, task))
}

/// Poll the latch until it holds a payload or the capture deadline passes.
/// Each tick also probes the page, which keeps the session honest; probe
/// failures are tolerated.
async fn wait_for_capture(page: &Page, latch: &Latch) -> Option<PayloadTemplate> {
    let deadline = Instant::now() + WAIT_GRAPHQL;
    loop {
        if let Some(payload) = latch.lock().await.as_ref() {
            return Some(payload.clone());
        }
        if Instant::now() >= deadline {
            return None;
        }
        let _ = page.probe_ready_state().await;
        tokio::time::sleep(POLL_INTERVAL).await;
    }
}

async fn navigate_and_wait(
    settings: &Settings,
    target: &PageTarget,
    page: &Page,
    latch: &Latch,
) -> Result<Option<PayloadTemplate>> {
    info!("visiting page...");
    page.goto(&target.url(settings)).await?;
    info!("page title: {}", page.title().await.unwrap_or_default());

    if !age::resolve_age_gate(page).await? {
        return Ok(None);
    }

    info!(
        "waiting for the GraphQL request (up to {}s)...",
        WAIT_GRAPHQL.as_secs()
    );
    let captured = wait_for_capture(page, latch).await;
    if captured.is_none() {
        warn!("timed out without capturing the target request");
    }
    Ok(captured)
}

/// One full attempt: fresh browser, interceptor, navigation, age check,
/// bounded wait, then redaction and persistence on success. The browser is
/// torn down on every path.
async fn run_attempt(settings: &Settings, target: &PageTarget) -> Result<Option<PayloadTemplate>> {
    let browser = CaptureBrowser::launch().await?;

    let outcome = async {
        let page = browser.blank_page().await?;
        if let Some((key, value)) = &settings.extra_header {
            page.set_extra_header(key, value).await?;
        }
        let (latch, interceptor) =
            attach_interceptor(&page, &settings.graphql_url, target.operation()).await?;
        let result = navigate_and_wait(settings, target, &page, &latch).await;
        interceptor.abort();
        result
    }
    .await;

    browser.close().await;

    let Some(mut payload) = outcome? else {
        return Ok(None);
    };
    target.redact(&mut payload);
    persist(&payload, target.output_file())?;
    info!("saved to: {}", target.output_file());
    Ok(Some(payload))
}

/// Drive `attempt` up to `max_retry` times, sleeping `interval` between
/// failed attempts. Attempt errors are logged and count as failures; the
/// loop itself never fails.
pub async fn run_with_retry<F, Fut>(
    max_retry: u32,
    interval: Duration,
    mut attempt: F,
) -> Option<PayloadTemplate>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<Option<PayloadTemplate>>>,
{
    for n in 1..=max_retry {
        info!("attempt {n}/{max_retry}");
        match attempt(n).await {
            Ok(Some(payload)) => return Some(payload),
            Ok(None) => {}
            Err(e) => error!("attempt failed: {e}"),
        }
        if n < max_retry {
            info!("retrying in {}s...", interval.as_secs());
            tokio::time::sleep(interval).await;
        }
    }
    None
}

/// Run one full capture loop for `target`. Returns the persisted payload,
/// or `None` once `MAX_RETRY` attempts are exhausted; failures never
/// propagate past this point.
pub async fn capture_payload(settings: &Settings, target: &PageTarget) -> Option<PayloadTemplate> {
    let started = Instant::now();
    info!("capturing {} payload", target.label());

    let captured =
        run_with_retry(MAX_RETRY, RETRY_INTERVAL, |_| run_attempt(settings, target)).await;

    let elapsed = started.elapsed().as_secs_f64();
    match &captured {
        Some(_) => info!("capture succeeded ({elapsed:.1}s)"),
        None => error!("capture failed ({elapsed:.1}s)"),
    }
    captured
}

/// Write the template as pretty-printed JSON, overwriting any prior file.
fn persist(payload: &PayloadTemplate, file_name: &str) -> Result<()> {
    let dir = Path::new(PAYLOAD_DIR);
    std::fs::create_dir_all(dir)?;
    let body = serde_json::to_string_pretty(payload)?;
    std::fs::write(dir.join(file_name), body)?;
    Ok(())
}
