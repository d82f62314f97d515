//! `NavigationController` against a scripted session.

use async_trait::async_trait;
use regscope_browser::{
    BrowserActions, BrowserError, NavigationController, PanelState, Result, RetryPolicy,
};
use regscope_core::{CrawlQuery, PageClassification, SiteDefinition, SiteTiming};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Records every call and fails selected operations a set number of times.
#[derive(Default)]
struct ScriptedSession {
    calls: Mutex<Vec<String>>,
    failures: Mutex<HashMap<String, u32>>,
    present: Vec<String>,
    url: String,
}

impl ScriptedSession {
    fn with_url(url: &str) -> Self {
        Self {
            url: url.to_string(),
            present: vec!["#key-word".to_string(), ".page-content".to_string()],
            ..Self::default()
        }
    }

    fn fail(self, call: &str, times: u32) -> Self {
        self.failures.lock().unwrap().insert(call.to_string(), times);
        self
    }

    fn record(&self, call: String) -> Result<()> {
        self.calls.lock().unwrap().push(call.clone());
        let mut failures = self.failures.lock().unwrap();
        if let Some(left) = failures.get_mut(&call) {
            if *left > 0 {
                *left -= 1;
                return Err(BrowserError::Timeout(call));
            }
        }
        Ok(())
    }
}

/// Handle given to the controller while the test keeps its own reference.
struct Shared(Arc<ScriptedSession>);

impl std::ops::Deref for Shared {
    type Target = ScriptedSession;

    fn deref(&self) -> &ScriptedSession {
        &self.0
    }
}

#[async_trait]
impl BrowserActions for Shared {
    async fn navigate(&self, url: &str) -> Result<()> {
        self.record(format!("navigate {url}"))
    }
    async fn wait_for_navigation(&self) -> Result<()> {
        self.record("wait_for_navigation".to_string())
    }
    async fn current_url(&self) -> Result<String> {
        self.record("current_url".to_string())?;
        Ok(self.url.clone())
    }
    async fn exists(&self, selector: &str) -> Result<bool> {
        self.record(format!("exists {selector}"))?;
        Ok(self.present.iter().any(|s| s == selector))
    }
    async fn click(&self, selector: &str) -> Result<()> {
        self.record(format!("click {selector}"))
    }
    async fn hover(&self, selector: &str) -> Result<()> {
        self.record(format!("hover {selector}"))
    }
    async fn fill_field(&self, selector: &str, value: &str) -> Result<()> {
        self.record(format!("fill {selector} {value}"))
    }
    async fn press_key(&self, selector: &str, key: &str) -> Result<()> {
        self.record(format!("press {selector} {key}"))
    }
    async fn wait_for_selector(&self, selector: &str, _timeout_ms: u64) -> Result<()> {
        self.record(format!("wait {selector}"))?;
        if self.present.iter().any(|s| s == selector) {
            Ok(())
        } else {
            Err(BrowserError::Timeout(selector.to_string()))
        }
    }
    async fn element_classes(&self, selector: &str) -> Result<Option<Vec<String>>> {
        self.record(format!("classes {selector}"))?;
        Ok(None)
    }
    async fn table_rows(&self, row_selector: &str) -> Result<Vec<Vec<String>>> {
        self.record(format!("rows {row_selector}"))?;
        Ok(Vec::new())
    }
    async fn scroll_to_origin(&self) -> Result<()> {
        self.record("scroll".to_string())
    }
    async fn screenshot_element(&self, selector: &str) -> Result<Option<Vec<u8>>> {
        self.record(format!("capture {selector}"))?;
        Ok(None)
    }
    async fn close(&self) -> Result<()> {
        self.record("close".to_string())
    }
}

fn site() -> Arc<SiteDefinition> {
    Arc::new(SiteDefinition {
        timing: SiteTiming::immediate(),
        ..SiteDefinition::default()
    })
}

fn controller(session: &Arc<ScriptedSession>) -> NavigationController {
    NavigationController::new(
        Box::new(Shared(Arc::clone(session))),
        site(),
        RetryPolicy::new(3, Duration::ZERO),
        50,
    )
}

fn calls(session: &ScriptedSession) -> Vec<String> {
    session.calls.lock().unwrap().clone()
}

#[tokio::test]
async fn test_submit_query_sequence() {
    let session = Arc::new(ScriptedSession::with_url("https://example.test/index"));
    let nav = controller(&session);

    let query = CrawlQuery::new("Acme").unwrap();
    nav.submit_query(&query).await.unwrap();

    let calls = calls(&session);
    assert_eq!(calls[0], "navigate https://datawarehouse.dbd.go.th/index");
    // Interstitials are probed but absent, so never clicked.
    assert!(calls.contains(&"exists #btnWarning".to_string()));
    assert!(!calls.iter().any(|c| c.starts_with("click")));

    let fill = calls.iter().position(|c| c == "fill #key-word Acme").unwrap();
    let press = calls.iter().position(|c| c == "press #key-word Enter").unwrap();
    let nav_wait = calls.iter().position(|c| c == "wait_for_navigation").unwrap();
    assert!(fill < press && press < nav_wait);
}

#[tokio::test]
async fn test_present_interstitial_is_dismissed() {
    let mut scripted = ScriptedSession::with_url("https://example.test/index");
    scripted.present.push("#btnWarning".to_string());
    let session = Arc::new(scripted);
    let nav = controller(&session);

    nav.submit_query(&CrawlQuery::new("Acme").unwrap())
        .await
        .unwrap();
    assert!(calls(&session).contains(&"click #btnWarning".to_string()));
}

#[tokio::test]
async fn test_transient_navigation_failure_is_retried() {
    let session = Arc::new(
        ScriptedSession::with_url("https://example.test/index")
            .fail("navigate https://datawarehouse.dbd.go.th/index", 2),
    );
    let nav = controller(&session);

    nav.submit_query(&CrawlQuery::new("Acme").unwrap())
        .await
        .unwrap();

    let navigations = calls(&session)
        .iter()
        .filter(|c| c.starts_with("navigate"))
        .count();
    assert_eq!(navigations, 3);
}

#[tokio::test]
async fn test_persistent_failure_exhausts_retries() {
    let session = Arc::new(
        ScriptedSession::with_url("https://example.test/index").fail("wait_for_navigation", 10),
    );
    let nav = controller(&session);

    let err = nav
        .submit_query(&CrawlQuery::new("Acme").unwrap())
        .await
        .unwrap_err();
    match err {
        BrowserError::ExhaustedRetries { attempts, .. } => assert_eq!(attempts, 3),
        other => panic!("unexpected error: {other}"),
    }
}

#[tokio::test]
async fn test_hover_then_activate_mounted() {
    let session = Arc::new(ScriptedSession::with_url("https://example.test/profile"));
    let nav = controller(&session);

    let state = nav
        .hover_then_activate("#menu2", r##"a[href="#tab21"]"##)
        .await
        .unwrap();
    assert_eq!(state, PanelState::Mounted);

    let calls = calls(&session);
    let hover = calls.iter().position(|c| c == "hover #menu2").unwrap();
    let click = calls
        .iter()
        .position(|c| c == r##"click a[href="#tab21"]"##)
        .unwrap();
    assert!(hover < click);
}

#[tokio::test]
async fn test_hover_then_activate_missing_region() {
    let mut scripted = ScriptedSession::with_url("https://example.test/profile");
    scripted.present.clear();
    let session = Arc::new(scripted);
    let nav = controller(&session);

    let state = nav
        .hover_then_activate("#menu2", r##"a[href="#tab22"]"##)
        .await
        .unwrap();
    assert_eq!(state, PanelState::Missing);
}

#[tokio::test]
async fn test_hover_failure_is_fatal() {
    let session = Arc::new(
        ScriptedSession::with_url("https://example.test/profile").fail("hover #menu2", 10),
    );
    let nav = controller(&session);

    assert!(nav
        .hover_then_activate("#menu2", r##"a[href="#tab23"]"##)
        .await
        .is_err());
}

#[tokio::test]
async fn test_classify_result() {
    let profile = Arc::new(ScriptedSession::with_url(
        "https://datawarehouse.dbd.go.th/company/profile/5/0105536092641",
    ));
    assert_eq!(
        controller(&profile).classify_result().await.unwrap(),
        PageClassification::ProfilePage
    );

    let list = Arc::new(ScriptedSession::with_url(
        "https://datawarehouse.dbd.go.th/searchJuristicInfo",
    ));
    assert_eq!(
        controller(&list).classify_result().await.unwrap(),
        PageClassification::ListPage
    );
}
