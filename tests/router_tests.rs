/// Protocol-level tests for the message router
/// The escalation client points at an unroutable local port, so any
/// test that reaches the network exercises the degraded path.
use std::sync::Arc;
use std::time::Duration;

use phishguard::escalation::{AnalysisContext, RiskEscalationClient};
use phishguard::rate_limit::RateLimiter;
use phishguard::router::{Request, Router};
use phishguard::store::{HistoryLog, KeyValueStore, MemoryStore};

const DEAD_SERVICE: &str = "http://127.0.0.1:9";

fn fixed_clock() -> i64 {
    1_700_000_000
}

fn router_over(store: Arc<dyn KeyValueStore>) -> Router {
    Router::with_parts(
        store,
        RiskEscalationClient::with_timeout(DEAD_SERVICE, Duration::from_millis(500)),
        DEAD_SERVICE.to_string(),
        RateLimiter::new(10, 3600),
        fixed_clock,
    )
}

fn new_router() -> Router {
    router_over(Arc::new(MemoryStore::new()))
}

#[tokio::test]
async fn unknown_action_yields_typed_failure() {
    let mut router = new_router();
    let resp = router
        .dispatch_value(serde_json::json!({"action": "selfDestruct"}), "tab-1")
        .await;
    assert!(!resp.success);
    assert_eq!(resp.error_code.as_deref(), Some("unknown_action"));
}

#[tokio::test]
async fn missing_action_yields_typed_failure() {
    let mut router = new_router();
    let resp = router
        .dispatch_value(serde_json::json!({"url": "https://a.example"}), "tab-1")
        .await;
    assert!(!resp.success);
    assert_eq!(resp.error_code.as_deref(), Some("unknown_action"));
}

#[tokio::test]
async fn malformed_payload_for_known_action_is_bad_request() {
    let mut router = new_router();
    let resp = router
        .dispatch_value(
            serde_json::json!({"action": "checkWhitelist", "domain": 42}),
            "tab-1",
        )
        .await;
    assert!(!resp.success);
    assert_eq!(resp.error_code.as_deref(), Some("bad_request"));
}

#[tokio::test]
async fn whitelist_roundtrip() {
    let mut router = new_router();

    let resp = router
        .dispatch(
            Request::CheckWhitelist {
                domain: "bank.example".to_string(),
            },
            "popup",
        )
        .await;
    assert!(resp.success);
    assert_eq!(resp.whitelisted, Some(false));

    let resp = router
        .dispatch(
            Request::WhitelistDomain {
                domain: "bank.example".to_string(),
            },
            "popup",
        )
        .await;
    assert!(resp.success);

    let resp = router
        .dispatch(
            Request::CheckWhitelist {
                domain: "bank.example".to_string(),
            },
            "popup",
        )
        .await;
    assert_eq!(resp.whitelisted, Some(true));
}

#[tokio::test]
async fn settings_roundtrip_and_patch() {
    let mut router = new_router();

    let resp = router.dispatch(Request::GetSettings, "options").await;
    assert!(resp.success);
    let data = resp.data.unwrap();
    assert_eq!(data["enabled"], true);
    assert_eq!(data["sensitivity"], "medium");

    let resp = router
        .dispatch_value(
            serde_json::json!({
                "action": "updateSettings",
                "settings": {"sensitivity": "high", "show_warnings": false},
            }),
            "options",
        )
        .await;
    assert!(resp.success);

    let resp = router.dispatch(Request::GetSettings, "options").await;
    let data = resp.data.unwrap();
    assert_eq!(data["sensitivity"], "high");
    assert_eq!(data["show_warnings"], false);
    // untouched key survives the partial update
    assert_eq!(data["enabled"], true);
}

#[tokio::test]
async fn settings_patch_with_unknown_key_is_rejected() {
    let mut router = new_router();
    let resp = router
        .dispatch_value(
            serde_json::json!({
                "action": "updateSettings",
                "settings": {"enabled": false, "telemetry": true},
            }),
            "options",
        )
        .await;
    assert!(!resp.success);
    assert_eq!(resp.error_code.as_deref(), Some("bad_request"));

    // the bad patch must not have been applied at all
    let resp = router.dispatch(Request::GetSettings, "options").await;
    assert_eq!(resp.data.unwrap()["enabled"], true);
}

#[tokio::test]
async fn check_status_reports_domain_enabled_and_whitelist() {
    let mut router = new_router();

    router
        .dispatch(
            Request::WhitelistDomain {
                domain: "safe.example".to_string(),
            },
            "popup",
        )
        .await;

    let resp = router
        .dispatch(
            Request::CheckStatus {
                current_url: "https://safe.example/account?tab=1".to_string(),
            },
            "tab-3",
        )
        .await;
    assert!(resp.success);
    assert_eq!(resp.enabled, Some(true));
    assert_eq!(resp.whitelisted, Some(true));
    assert_eq!(resp.domain.as_deref(), Some("safe.example"));

    let resp = router
        .dispatch(
            Request::CheckStatus {
                current_url: "https://other.example/".to_string(),
            },
            "tab-3",
        )
        .await;
    assert_eq!(resp.whitelisted, Some(false));
}

#[tokio::test]
async fn check_status_with_malformed_url_fails_typed() {
    let mut router = new_router();
    let resp = router
        .dispatch(
            Request::CheckStatus {
                current_url: "not a url".to_string(),
            },
            "tab-1",
        )
        .await;
    assert!(!resp.success);
    assert_eq!(resp.error_code.as_deref(), Some("malformed_url"));
}

#[tokio::test]
async fn analyze_url_against_dead_service_degrades() {
    let store: Arc<dyn KeyValueStore> = Arc::new(MemoryStore::new());
    let mut router = router_over(store.clone());

    let resp = router
        .dispatch(
            Request::AnalyzeUrl {
                url: "https://sketchy.example/login".to_string(),
                context: AnalysisContext::default(),
            },
            "tab-1",
        )
        .await;
    assert!(resp.success, "degraded escalation must still succeed");
    let data = resp.data.unwrap();
    assert_eq!(data["risk_level"], "unknown");
    assert_eq!(data["action"], "warn");

    // degraded verdict recorded in history
    let history = HistoryLog::new(store).recent().await;
    assert_eq!(history.len(), 1);
    assert_eq!(history[0].entry_type, "url_analysis");
    assert_eq!(history[0].context_id, "tab-1");
}

#[tokio::test]
async fn analyze_url_for_whitelisted_domain_skips_service() {
    let mut router = new_router();
    router
        .dispatch(
            Request::WhitelistDomain {
                domain: "bank.example".to_string(),
            },
            "popup",
        )
        .await;

    let resp = router
        .dispatch(
            Request::AnalyzeUrl {
                url: "https://bank.example/login".to_string(),
                context: AnalysisContext::default(),
            },
            "tab-1",
        )
        .await;
    assert!(resp.success);
    let data = resp.data.unwrap();
    assert_eq!(data["risk_level"], "safe");
    assert_eq!(data["reasoning"], "domain whitelisted");
}

#[tokio::test]
async fn analyze_url_rate_limited_is_a_typed_denial() {
    let store: Arc<dyn KeyValueStore> = Arc::new(MemoryStore::new());
    let mut router = Router::with_parts(
        store,
        RiskEscalationClient::with_timeout(DEAD_SERVICE, Duration::from_millis(500)),
        DEAD_SERVICE.to_string(),
        RateLimiter::new(1, 3600),
        fixed_clock,
    );

    let request = || Request::AnalyzeUrl {
        url: "https://sketchy.example/".to_string(),
        context: AnalysisContext::default(),
    };

    // first call consumes the only slot (and degrades, uncached)
    let resp = router.dispatch(request(), "tab-1").await;
    assert!(resp.success);

    let resp = router.dispatch(request(), "tab-1").await;
    assert!(!resp.success);
    assert_eq!(resp.error_code.as_deref(), Some("rate_limited"));

    // another context still has budget
    let resp = router.dispatch(request(), "tab-2").await;
    assert!(resp.success);
}

#[tokio::test]
async fn analyze_page_returns_detections_and_overall_risk() {
    let mut router = new_router();
    let html = r#"
        <a href="https://evil.example/x">Login</a>
        <form action="https://evil.example/collect">
            <input type="password" name="pw">
        </form>
    "#;
    let resp = router
        .dispatch(
            Request::AnalyzePage {
                url: "https://bank.example/".to_string(),
                page_html: html.to_string(),
            },
            "tab-1",
        )
        .await;
    assert!(resp.success);
    let data = resp.data.unwrap();
    assert_eq!(data["overall_risk"], "high");
    let detections = data["detections"].as_array().unwrap();
    assert_eq!(detections.len(), 3);
    assert!(detections.iter().all(|d| d.get("element").is_none()));
}
