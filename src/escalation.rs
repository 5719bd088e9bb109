// Risk escalation client
// Talks to the remote risk-assessment service, gated by the analysis
// cache and the rate limiter. Service failures of any kind degrade to
// a conservative local fallback verdict; they are never fatal.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::cache::AnalysisCache;
use crate::error::PhishguardError;
use crate::models::{AnalysisVerdict, Detection};
use crate::rate_limit::RateLimiter;

/// Deadline for one escalation call
pub const DEFAULT_TIMEOUT_MS: u64 = 5_000;

/// Context sent along with an escalation request. Detections carry
/// derived evidence only; credential values never appear here.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AnalysisContext {
    #[serde(default, alias = "pageContent")]
    pub page_content: String,
    #[serde(default, alias = "localDetections")]
    pub local_detections: Vec<Detection>,
    #[serde(default, alias = "userContext")]
    pub user_context: Value,
}

#[derive(Serialize)]
struct AnalyzeUrlBody<'a> {
    url: &'a str,
    page_content: &'a str,
    local_detections: &'a [Detection],
    user_context: &'a Value,
}

#[derive(Deserialize)]
struct HealthBody {
    #[serde(default)]
    status: String,
    llm_available: Option<bool>,
}

pub struct RiskEscalationClient {
    client: reqwest::Client,
    service_url: String,
    timeout: Duration,
}

impl RiskEscalationClient {
    pub fn new(service_url: impl Into<String>) -> Self {
        Self::with_timeout(service_url, Duration::from_millis(DEFAULT_TIMEOUT_MS))
    }

    pub fn with_timeout(service_url: impl Into<String>, timeout: Duration) -> Self {
        Self {
            client: reqwest::Client::new(),
            service_url: service_url.into(),
            timeout,
        }
    }

    /// Analyze a URL, in order: cache, rate limit, service call.
    ///
    /// A cache hit returns immediately and consumes no budget. A denied
    /// rate limit is the only hard error. Every service-side failure
    /// (timeout, transport, non-2xx, unparseable body) resolves to the
    /// fallback verdict, which is never cached.
    pub async fn analyze_url(
        &self,
        url: &str,
        context: &AnalysisContext,
        cache: &AnalysisCache,
        limiter: &mut RateLimiter,
        identifier: &str,
        now: i64,
    ) -> Result<AnalysisVerdict, PhishguardError> {
        if let Some(verdict) = cache.get(url, now).await {
            debug!("returning cached verdict for {}", url);
            return Ok(verdict);
        }

        if !limiter.try_acquire(identifier, now) {
            return Err(PhishguardError::RateLimited(identifier.to_string()));
        }

        match self.request_verdict(url, context).await {
            Ok(verdict) => {
                info!("risk service verdict for {}: {}", url, verdict.risk_level);
                if let Err(e) = cache.put(url, verdict.clone(), now).await {
                    warn!("failed to cache verdict for {}: {}", url, e);
                }
                Ok(verdict)
            }
            Err(e) => {
                warn!("escalation for {} degraded to fallback: {}", url, e);
                Ok(AnalysisVerdict::fallback(now))
            }
        }
    }

    async fn request_verdict(
        &self,
        url: &str,
        context: &AnalysisContext,
    ) -> Result<AnalysisVerdict, PhishguardError> {
        let body = AnalyzeUrlBody {
            url,
            page_content: &context.page_content,
            local_detections: &context.local_detections,
            user_context: &context.user_context,
        };
        let endpoint = format!("{}/api/analyze-url", self.service_url.trim_end_matches('/'));

        let send = self.client.post(endpoint.as_str()).json(&body).send();
        // First to settle wins; on expiry the in-flight request is
        // dropped, not forcibly aborted.
        let response = tokio::time::timeout(self.timeout, send)
            .await
            .map_err(|_| PhishguardError::ServiceTimeout(self.timeout.as_millis() as u64))?
            .map_err(|e| PhishguardError::ServiceUnreachable(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(PhishguardError::ServiceBadResponse(format!(
                "status {}",
                status.as_u16()
            )));
        }

        response
            .json::<AnalysisVerdict>()
            .await
            .map_err(|e| PhishguardError::ServiceBadResponse(e.to_string()))
    }

    /// Probe `GET /health`. Unreachable or unwell both read as false;
    /// a missing llm_available field counts as healthy.
    pub async fn health_check(&self) -> bool {
        let endpoint = format!("{}/health", self.service_url.trim_end_matches('/'));
        let send = self.client.get(endpoint.as_str()).send();
        let response = match tokio::time::timeout(self.timeout, send).await {
            Ok(Ok(r)) => r,
            Ok(Err(e)) => {
                debug!("health check failed: {}", e);
                return false;
            }
            Err(_) => {
                debug!("health check timed out");
                return false;
            }
        };
        if !response.status().is_success() {
            return false;
        }
        match response.json::<HealthBody>().await {
            Ok(health) => {
                debug!("health: status={} llm={:?}", health.status, health.llm_available);
                health.llm_available != Some(false)
            }
            Err(_) => false,
        }
    }
}
