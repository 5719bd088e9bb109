// Message router
// The single channel between the scanning context, the coordination
// context, and the user-facing surface. Requests are a closed tagged
// set dispatched exhaustively; every request yields exactly one
// response, and handler errors become typed failure responses instead
// of crossing the message boundary.

use std::sync::Arc;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{info, warn};
use url::Url;

use crate::cache::AnalysisCache;
use crate::error::PhishguardError;
use crate::escalation::{AnalysisContext, RiskEscalationClient};
use crate::models::{AnalysisVerdict, HistoryEntry, RiskLevel, Settings, SettingsPatch, UserAction};
use crate::rate_limit::RateLimiter;
use crate::scanner;
use crate::store::{
    HistoryLog, KeyValueStore, SettingsStore, WhitelistStore, KEY_SETTINGS, KEY_WHITELIST,
};

/// Closed protocol set. Adding a variant without a handler arm is a
/// compile error, not a runtime fallthrough.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "action")]
pub enum Request {
    #[serde(rename = "analyzeUrl")]
    AnalyzeUrl {
        url: String,
        #[serde(default)]
        context: AnalysisContext,
    },
    #[serde(rename = "analyzePage")]
    AnalyzePage {
        url: String,
        #[serde(rename = "pageHtml")]
        page_html: String,
    },
    #[serde(rename = "whitelistDomain")]
    WhitelistDomain { domain: String },
    #[serde(rename = "checkWhitelist")]
    CheckWhitelist { domain: String },
    #[serde(rename = "getSettings")]
    GetSettings,
    #[serde(rename = "updateSettings")]
    UpdateSettings { settings: SettingsPatch },
    #[serde(rename = "healthCheck")]
    HealthCheck,
    #[serde(rename = "checkStatus")]
    CheckStatus {
        #[serde(rename = "currentUrl")]
        current_url: String,
    },
}

/// JSON response envelope. Per-action fields are set only where the
/// protocol table defines them.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Response {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_code: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub whitelisted: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub enabled: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub domain: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub backend_healthy: Option<bool>,
}

impl Response {
    pub fn ok() -> Self {
        Self {
            success: true,
            error: None,
            error_code: None,
            data: None,
            whitelisted: None,
            enabled: None,
            domain: None,
            backend_healthy: None,
        }
    }

    pub fn ok_with_data(data: Value) -> Self {
        Self {
            data: Some(data),
            ..Self::ok()
        }
    }

    pub fn failure(err: &PhishguardError) -> Self {
        Self {
            success: false,
            error: Some(err.to_string()),
            error_code: Some(err.code().to_string()),
            ..Self::ok()
        }
    }

    fn bad_request(message: String) -> Self {
        Self {
            success: false,
            error: Some(message),
            error_code: Some("bad_request".to_string()),
            ..Self::ok()
        }
    }
}

fn wall_clock() -> i64 {
    Utc::now().timestamp()
}

/// Coordination-context dispatcher. Owns the persisted stores, the
/// analysis cache, the escalation client, and the one piece of
/// process-local state: the rate limiter, constructed once at startup.
pub struct Router {
    store: Arc<dyn KeyValueStore>,
    settings: SettingsStore,
    whitelist: WhitelistStore,
    history: HistoryLog,
    cache: AnalysisCache,
    limiter: RateLimiter,
    client: RiskEscalationClient,
    service_url: String,
    clock: fn() -> i64,
}

impl Router {
    /// Build a router over a store, reading the service URL from the
    /// persisted settings
    pub async fn start(store: Arc<dyn KeyValueStore>) -> Self {
        let service_url = SettingsStore::new(store.clone()).load().await.service_url;
        let client = RiskEscalationClient::new(service_url.clone());
        Self::with_parts(store, client, service_url, RateLimiter::default(), wall_clock)
    }

    pub fn with_parts(
        store: Arc<dyn KeyValueStore>,
        client: RiskEscalationClient,
        service_url: String,
        limiter: RateLimiter,
        clock: fn() -> i64,
    ) -> Self {
        Self {
            settings: SettingsStore::new(store.clone()),
            whitelist: WhitelistStore::new(store.clone()),
            history: HistoryLog::new(store.clone()),
            cache: AnalysisCache::new(store.clone()),
            store,
            limiter,
            client,
            service_url,
            clock,
        }
    }

    /// Wire boundary: dispatch a raw JSON request. An unrecognized or
    /// missing action tag yields a typed UnknownAction failure, never a
    /// silent no-op.
    pub async fn dispatch_value(&mut self, value: Value, sender: &str) -> Response {
        let tag = value
            .get("action")
            .and_then(Value::as_str)
            .unwrap_or("")
            .to_string();
        match serde_json::from_value::<Request>(value) {
            Ok(request) => self.dispatch(request, sender).await,
            Err(e) if is_known_action(&tag) => Response::bad_request(e.to_string()),
            Err(_) => Response::failure(&PhishguardError::UnknownAction(tag)),
        }
    }

    /// Dispatch a typed request. Exactly one response per request;
    /// handler errors are converted here, at the boundary.
    pub async fn dispatch(&mut self, request: Request, sender: &str) -> Response {
        match self.handle(request, sender).await {
            Ok(response) => response,
            Err(e) => {
                warn!("request from {} failed: {}", sender, e);
                Response::failure(&e)
            }
        }
    }

    async fn handle(&mut self, request: Request, sender: &str) -> Result<Response, PhishguardError> {
        match request {
            Request::AnalyzeUrl { url, context } => self.analyze_url(url, context, sender).await,
            Request::AnalyzePage { url, page_html } => self.analyze_page(url, page_html, sender).await,
            Request::WhitelistDomain { domain } => {
                self.whitelist.add(&domain).await?;
                info!("whitelisted {}", domain);
                Ok(Response::ok())
            }
            Request::CheckWhitelist { domain } => Ok(Response {
                whitelisted: Some(self.whitelist.contains(&domain).await),
                ..Response::ok()
            }),
            Request::GetSettings => {
                let settings = self.settings.load().await;
                Ok(Response::ok_with_data(
                    serde_json::to_value(settings)
                        .map_err(|e| PhishguardError::StoreUnavailable(e.to_string()))?,
                ))
            }
            Request::UpdateSettings { settings } => {
                let updated = self.settings.update(&settings).await?;
                if updated.service_url != self.service_url {
                    self.service_url = updated.service_url.clone();
                    self.client = RiskEscalationClient::new(self.service_url.clone());
                }
                Ok(Response::ok())
            }
            Request::HealthCheck => Ok(Response {
                backend_healthy: Some(self.client.health_check().await),
                ..Response::ok()
            }),
            Request::CheckStatus { current_url } => self.check_status(current_url).await,
        }
    }

    async fn analyze_url(
        &mut self,
        url: String,
        context: AnalysisContext,
        sender: &str,
    ) -> Result<Response, PhishguardError> {
        let domain = host_of(&url)?;
        let settings = self.settings.load().await;
        let now = (self.clock)();

        if !settings.enabled || !settings.use_llm_analysis {
            return Ok(Response::ok_with_data(local_verdict(
                "analysis disabled in settings",
                now,
            )?));
        }
        if self.whitelist.contains(&domain).await {
            return Ok(Response::ok_with_data(local_verdict(
                "domain whitelisted",
                now,
            )?));
        }

        let verdict = self
            .client
            .analyze_url(&url, &context, &self.cache, &mut self.limiter, sender, now)
            .await?;

        let result = serde_json::to_value(&verdict)
            .map_err(|e| PhishguardError::StoreUnavailable(e.to_string()))?;
        if let Err(e) = self
            .history
            .append(HistoryEntry {
                entry_type: "url_analysis".to_string(),
                url,
                result: result.clone(),
                context_id: sender.to_string(),
                timestamp: now,
            })
            .await
        {
            warn!("failed to append history: {}", e);
        }

        Ok(Response::ok_with_data(result))
    }

    async fn analyze_page(
        &mut self,
        url: String,
        page_html: String,
        sender: &str,
    ) -> Result<Response, PhishguardError> {
        let outcome = scanner::scan_page(&page_html, &url)?;
        let overall_risk = outcome.detections.overall_risk();
        let now = (self.clock)();
        info!(
            "page scan for {}: {} detections, overall {}",
            url, outcome.detections.total, overall_risk
        );

        if let Err(e) = self
            .history
            .append(HistoryEntry {
                entry_type: "page_analysis".to_string(),
                url: url.clone(),
                result: serde_json::json!({
                    "overall_risk": overall_risk,
                    "total": outcome.detections.total,
                }),
                context_id: sender.to_string(),
                timestamp: now,
            })
            .await
        {
            warn!("failed to append history: {}", e);
        }

        Ok(Response::ok_with_data(serde_json::json!({
            "overall_risk": overall_risk,
            "detections": outcome.detections.detections,
        })))
    }

    /// Enabled + whitelisted for one page, read from a single store
    /// snapshot so the two cannot observe an interleaved update
    async fn check_status(&self, current_url: String) -> Result<Response, PhishguardError> {
        let domain = host_of(&current_url)?;
        let snapshot = self.store.get_many(&[KEY_SETTINGS, KEY_WHITELIST]).await?;

        let settings: Settings = snapshot
            .first()
            .cloned()
            .flatten()
            .and_then(|v| serde_json::from_value(v).ok())
            .unwrap_or_default();
        let whitelist: Vec<String> = snapshot
            .get(1)
            .cloned()
            .flatten()
            .and_then(|v| serde_json::from_value(v).ok())
            .unwrap_or_default();

        Ok(Response {
            enabled: Some(settings.enabled),
            whitelisted: Some(whitelist.iter().any(|d| *d == domain)),
            domain: Some(domain),
            ..Response::ok()
        })
    }
}

fn host_of(url: &str) -> Result<String, PhishguardError> {
    let parsed =
        Url::parse(url).map_err(|e| PhishguardError::MalformedUrl(format!("{}: {}", url, e)))?;
    Ok(parsed.host_str().unwrap_or("").to_lowercase())
}

/// Verdict synthesized without consulting the service, used when
/// settings or the whitelist rule out escalation
fn local_verdict(reason: &str, now: i64) -> Result<Value, PhishguardError> {
    let verdict = AnalysisVerdict {
        risk_level: RiskLevel::Safe,
        confidence: 0.0,
        reasoning: reason.to_string(),
        action: UserAction::Safe,
        indicators: Vec::new(),
        timestamp: now,
    };
    serde_json::to_value(verdict).map_err(|e| PhishguardError::StoreUnavailable(e.to_string()))
}

/// Wire tags of every `Request` variant. Kept in lockstep with the enum
/// by the `known_actions_cover_every_variant` test.
const KNOWN_ACTIONS: &[&str] = &[
    "analyzeUrl",
    "analyzePage",
    "whitelistDomain",
    "checkWhitelist",
    "getSettings",
    "updateSettings",
    "healthCheck",
    "checkStatus",
];

fn is_known_action(tag: &str) -> bool {
    KNOWN_ACTIONS.contains(&tag)
}
