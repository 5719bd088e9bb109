// Error taxonomy for phishguard
// Protocol and store failures are surfaced as typed failure responses;
// escalation failures degrade to a local fallback verdict instead.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum PhishguardError {
    /// A URL that must parse (the page URL itself) did not.
    /// Malformed hrefs/actions inside the page are absorbed by the
    /// scanner and never reach this type.
    #[error("malformed url: {0}")]
    MalformedUrl(String),

    /// Sliding-window budget exhausted for the requesting identifier
    #[error("rate limit exceeded for {0}")]
    RateLimited(String),

    /// Escalation call did not settle before the deadline
    #[error("risk service timed out after {0} ms")]
    ServiceTimeout(u64),

    /// Escalation call failed at the transport level
    #[error("risk service unreachable: {0}")]
    ServiceUnreachable(String),

    /// Service answered with a non-2xx status or an unparseable body
    #[error("risk service bad response: {0}")]
    ServiceBadResponse(String),

    /// Request carried an action tag outside the closed protocol set
    #[error("unknown action: {0}")]
    UnknownAction(String),

    /// Underlying key-value store failed
    #[error("store unavailable: {0}")]
    StoreUnavailable(String),
}

impl PhishguardError {
    /// Stable machine-readable code carried in failure responses
    pub fn code(&self) -> &'static str {
        match self {
            PhishguardError::MalformedUrl(_) => "malformed_url",
            PhishguardError::RateLimited(_) => "rate_limited",
            PhishguardError::ServiceTimeout(_) => "service_timeout",
            PhishguardError::ServiceUnreachable(_) => "service_unreachable",
            PhishguardError::ServiceBadResponse(_) => "service_bad_response",
            PhishguardError::UnknownAction(_) => "unknown_action",
            PhishguardError::StoreUnavailable(_) => "store_unavailable",
        }
    }
}
