//! CDP `Fetch` domain wiring for [`InterceptionPolicy`].
//!
//! Every request pauses twice: once before it leaves the browser (abort,
//! fulfil from cache, or continue) and once when its response headers arrive
//! (store the body if eligible, then continue).

use crate::error::{BrowserError, Result};
use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use chromiumoxide::cdp::browser_protocol::fetch::{
    ContinueRequestParams, EnableParams, EventRequestPaused, FailRequestParams,
    FulfillRequestParams, GetResponseBodyParams, HeaderEntry, RequestPattern, RequestStage,
};
use chromiumoxide::cdp::browser_protocol::network::{ErrorReason, ResourceType};
use chromiumoxide::Page;
use chrono::Utc;
use futures::StreamExt;
use regscope_cache::{
    CacheEntry, InterceptionPolicy, RequestDecision, RequestDescriptor, ResponseDescriptor,
    StoragePlan,
};
use regscope_core::ResourceKind;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::{debug, trace, warn};

/// Headers never replayed from the cache. Bodies are stored decoded, so the
/// wire encoding no longer applies; cookies belong to the session that
/// received them.
const DROPPED_ON_REPLAY: &[&str] = &[
    "content-encoding",
    "content-length",
    "transfer-encoding",
    "set-cookie",
];

/// Enable request interception on `page` and spawn the task answering paused
/// requests. Aborting the returned handle stops interception.
pub(crate) async fn install(
    page: &Page,
    policy: Arc<InterceptionPolicy>,
) -> Result<JoinHandle<()>> {
    let patterns = vec![
        RequestPattern::builder()
            .url_pattern("*")
            .request_stage(RequestStage::Request)
            .build(),
        RequestPattern::builder()
            .url_pattern("*")
            .request_stage(RequestStage::Response)
            .build(),
    ];

    let mut paused = page
        .event_listener::<EventRequestPaused>()
        .await
        .map_err(|e| BrowserError::ChromiumError(format!("request listener: {e}")))?;

    page.execute(EnableParams::builder().patterns(patterns).build())
        .await
        .map_err(|e| BrowserError::ChromiumError(format!("enabling interception: {e}")))?;

    let page = page.clone();
    Ok(tokio::spawn(async move {
        while let Some(event) = paused.next().await {
            let page = page.clone();
            let policy = Arc::clone(&policy);
            // A slow body read must not hold up other paused requests.
            tokio::spawn(async move {
                if let Err(e) = handle_paused(&page, &policy, &event).await {
                    debug!(url = %event.request.url, error = %e, "interception handler failed");
                }
            });
        }
        trace!("request interception stream ended");
    }))
}

async fn handle_paused(
    page: &Page,
    policy: &InterceptionPolicy,
    event: &EventRequestPaused,
) -> Result<()> {
    let kind = resource_kind(&event.resource_type);
    let is_response_stage =
        event.response_status_code.is_some() || event.response_error_reason.is_some();

    if is_response_stage {
        if let Some(status) = event.response_status_code {
            record_response(page, policy, event, kind, status).await;
        }
        return continue_request(page, event).await;
    }

    let request = RequestDescriptor {
        url: event.request.url.clone(),
        kind,
        method: event.request.method.clone(),
    };
    match policy.on_request(&request).await {
        RequestDecision::Abort => {
            page.execute(FailRequestParams::new(
                event.request_id.clone(),
                ErrorReason::BlockedByClient,
            ))
            .await
            .map_err(|e| BrowserError::ChromiumError(e.to_string()))?;
        }
        RequestDecision::Serve(entry) => fulfil(page, event, &entry).await?,
        RequestDecision::PassThrough => continue_request(page, event).await?,
    }
    Ok(())
}

async fn record_response(
    page: &Page,
    policy: &InterceptionPolicy,
    event: &EventRequestPaused,
    kind: ResourceKind,
    status: i64,
) {
    let response = ResponseDescriptor {
        url: event.request.url.clone(),
        kind,
        method: event.request.method.clone(),
        status: u16::try_from(status).unwrap_or(0),
        headers: event
            .response_headers
            .as_deref()
            .unwrap_or_default()
            .iter()
            .map(|h| (h.name.clone(), h.value.clone()))
            .collect(),
    };

    if let StoragePlan::Skip(reason) = policy.storage_plan(&response, Utc::now()) {
        trace!(url = %response.url, ?reason, "response not cached");
        return;
    }

    let body = read_body(page, event).await;
    if policy.on_response(&response, body).await {
        debug!(url = %response.url, "cached response");
    }
}

async fn read_body(page: &Page, event: &EventRequestPaused) -> Result<Vec<u8>> {
    let returned = page
        .execute(GetResponseBodyParams::new(event.request_id.clone()))
        .await
        .map_err(|e| BrowserError::ChromiumError(format!("reading body: {e}")))?;

    if returned.result.base64_encoded {
        BASE64
            .decode(returned.result.body.as_bytes())
            .map_err(|e| BrowserError::ChromiumError(format!("decoding body: {e}")))
    } else {
        Ok(returned.result.body.clone().into_bytes())
    }
}

async fn fulfil(page: &Page, event: &EventRequestPaused, entry: &CacheEntry) -> Result<()> {
    let headers: Vec<HeaderEntry> = replay_headers(&entry.headers)
        .map(|(name, value)| HeaderEntry::new(name, value))
        .collect();

    let params = FulfillRequestParams::builder()
        .request_id(event.request_id.clone())
        .response_code(i64::from(entry.status))
        .response_headers(headers)
        .body(BASE64.encode(&entry.body))
        .build()
        .map_err(BrowserError::ChromiumError)?;

    page.execute(params)
        .await
        .map_err(|e| BrowserError::ChromiumError(format!("fulfilling from cache: {e}")))?;
    Ok(())
}

async fn continue_request(page: &Page, event: &EventRequestPaused) -> Result<()> {
    page.execute(ContinueRequestParams::new(event.request_id.clone()))
        .await
        .map_err(|e| {
            warn!(url = %event.request.url, error = %e, "could not continue request");
            BrowserError::ChromiumError(e.to_string())
        })?;
    Ok(())
}

fn replay_headers(headers: &[(String, String)]) -> impl Iterator<Item = (&str, &str)> {
    headers
        .iter()
        .filter(|(name, _)| {
            !DROPPED_ON_REPLAY
                .iter()
                .any(|dropped| name.eq_ignore_ascii_case(dropped))
        })
        .map(|(name, value)| (name.as_str(), value.as_str()))
}

fn resource_kind(resource_type: &ResourceType) -> ResourceKind {
    match resource_type {
        ResourceType::Document => ResourceKind::Document,
        ResourceType::Script => ResourceKind::Script,
        ResourceType::Stylesheet => ResourceKind::Stylesheet,
        ResourceType::Image => ResourceKind::Image,
        ResourceType::Font => ResourceKind::Font,
        ResourceType::Media => ResourceKind::Media,
        ResourceType::Xhr | ResourceType::Fetch => ResourceKind::Xhr,
        _ => ResourceKind::Other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resource_kind_mapping() {
        assert_eq!(resource_kind(&ResourceType::Document), ResourceKind::Document);
        assert_eq!(resource_kind(&ResourceType::Fetch), ResourceKind::Xhr);
        assert_eq!(resource_kind(&ResourceType::Xhr), ResourceKind::Xhr);
        assert_eq!(resource_kind(&ResourceType::Font), ResourceKind::Font);
        assert_eq!(resource_kind(&ResourceType::WebSocket), ResourceKind::Other);
    }

    #[test]
    fn test_replay_drops_wire_headers() {
        let headers = vec![
            ("Content-Type".to_string(), "text/css".to_string()),
            ("Content-Encoding".to_string(), "gzip".to_string()),
            ("content-length".to_string(), "512".to_string()),
            ("Cache-Control".to_string(), "max-age=60".to_string()),
        ];

        let kept: Vec<_> = replay_headers(&headers).collect();
        assert_eq!(
            kept,
            vec![("Content-Type", "text/css"), ("Cache-Control", "max-age=60")]
        );
    }

    #[test]
    fn test_replay_never_carries_session_cookies() {
        let headers = vec![
            ("Content-Type".to_string(), "text/html".to_string()),
            ("Set-Cookie".to_string(), "JSESSIONID=abc; Path=/".to_string()),
            ("set-cookie".to_string(), "lang=th".to_string()),
        ];

        let kept: Vec<_> = replay_headers(&headers).collect();
        assert_eq!(kept, vec![("Content-Type", "text/html")]);
    }
}
