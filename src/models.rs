// Core data models for phishguard
// Wire shapes follow the risk-assessment service schema (snake_case JSON)

use serde::{Deserialize, Serialize};
use std::fmt;

/// Ordinal severity of a single heuristic detection
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Low,
    Medium,
    High,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Severity::Low => write!(f, "low"),
            Severity::Medium => write!(f, "medium"),
            Severity::High => write!(f, "high"),
        }
    }
}

/// Risk level attached to an aggregated or remote verdict.
/// `Unknown` is the degraded fallback when analysis itself failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RiskLevel {
    Safe,
    Low,
    Medium,
    High,
    Critical,
    Unknown,
}

impl fmt::Display for RiskLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RiskLevel::Safe => write!(f, "safe"),
            RiskLevel::Low => write!(f, "low"),
            RiskLevel::Medium => write!(f, "medium"),
            RiskLevel::High => write!(f, "high"),
            RiskLevel::Critical => write!(f, "critical"),
            RiskLevel::Unknown => write!(f, "unknown"),
        }
    }
}

/// Recommended user-facing action for a verdict
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UserAction {
    Safe,
    Verify,
    Warn,
    Block,
}

/// User setting controlling which severities count toward decisions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Sensitivity {
    Low,
    Medium,
    High,
}

impl Sensitivity {
    /// Lowest severity that still counts at this sensitivity
    pub fn threshold(&self) -> Severity {
        match self {
            Sensitivity::Low => Severity::High,
            Sensitivity::Medium => Severity::Medium,
            Sensitivity::High => Severity::Low,
        }
    }
}

/// Category of a heuristic detection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DetectionKind {
    LinkMismatch,
    ExternalRedirect,
    ExternalFormAction,
    InsecurePasswordField,
}

/// Derived evidence for a detection. Strings and names only — this is
/// the sole detection payload allowed across a context boundary.
/// Field values are never captured.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Evidence {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub href: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub target_domain: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub field_names: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub has_email: Option<bool>,
}

/// A single heuristic detection. `element` is an ordinal into the scan's
/// DOM snapshot; it stays local to the scanning context and is never
/// serialized.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Detection {
    #[serde(rename = "type")]
    pub kind: DetectionKind,
    pub severity: Severity,
    #[serde(skip)]
    pub element: usize,
    pub evidence: Evidence,
}

/// Ordered set of detections from one scan. Produced fresh on every
/// scan, never cached.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DetectionSet {
    pub detections: Vec<Detection>,
    pub total: usize,
}

impl DetectionSet {
    pub fn push(&mut self, detection: Detection) {
        self.detections.push(detection);
        self.total += 1;
    }

    pub fn is_empty(&self) -> bool {
        self.detections.is_empty()
    }

    /// Highest severity across all detections, None when empty
    pub fn max_severity(&self) -> Option<Severity> {
        self.detections.iter().map(|d| d.severity).max()
    }

    /// Page-level risk: highest detection severity, Safe when empty
    pub fn overall_risk(&self) -> RiskLevel {
        match self.max_severity() {
            None => RiskLevel::Safe,
            Some(Severity::Low) => RiskLevel::Low,
            Some(Severity::Medium) => RiskLevel::Medium,
            Some(Severity::High) => RiskLevel::High,
        }
    }

    /// Count detections at or above the given severity
    pub fn count_at_least(&self, threshold: Severity) -> usize {
        self.detections
            .iter()
            .filter(|d| d.severity >= threshold)
            .count()
    }
}

/// Verdict for a URL, produced remotely by the risk-assessment service
/// or synthesized locally when the service is unreachable
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisVerdict {
    pub risk_level: RiskLevel,
    /// 0..=100
    pub confidence: f32,
    pub reasoning: String,
    pub action: UserAction,
    #[serde(rename = "phishing_indicators", default)]
    pub indicators: Vec<String>,
    #[serde(default)]
    pub timestamp: i64,
}

impl AnalysisVerdict {
    /// Degraded verdict used when escalation fails for any reason
    pub fn fallback(now: i64) -> Self {
        Self {
            risk_level: RiskLevel::Unknown,
            confidence: 0.0,
            reasoning: "service unreachable".to_string(),
            action: UserAction::Warn,
            indicators: Vec::new(),
            timestamp: now,
        }
    }
}

pub const DEFAULT_SERVICE_URL: &str = "http://localhost:8000";

/// Persisted user configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub enabled: bool,
    pub sensitivity: Sensitivity,
    pub highlight_suspicious: bool,
    pub show_warnings: bool,
    pub use_local_analysis: bool,
    pub use_llm_analysis: bool,
    pub service_url: String,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            enabled: true,
            sensitivity: Sensitivity::Medium,
            highlight_suspicious: true,
            show_warnings: true,
            use_local_analysis: true,
            use_llm_analysis: true,
            service_url: DEFAULT_SERVICE_URL.to_string(),
        }
    }
}

/// Partial settings update. Unknown keys are rejected at the protocol
/// boundary rather than silently dropped.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SettingsPatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub enabled: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sensitivity: Option<Sensitivity>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub highlight_suspicious: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub show_warnings: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub use_local_analysis: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub use_llm_analysis: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub service_url: Option<String>,
}

impl SettingsPatch {
    /// Merge this patch into an existing record, field-wise
    pub fn apply(&self, settings: &mut Settings) {
        if let Some(v) = self.enabled {
            settings.enabled = v;
        }
        if let Some(v) = self.sensitivity {
            settings.sensitivity = v;
        }
        if let Some(v) = self.highlight_suspicious {
            settings.highlight_suspicious = v;
        }
        if let Some(v) = self.show_warnings {
            settings.show_warnings = v;
        }
        if let Some(v) = self.use_local_analysis {
            settings.use_local_analysis = v;
        }
        if let Some(v) = self.use_llm_analysis {
            settings.use_llm_analysis = v;
        }
        if let Some(ref v) = self.service_url {
            settings.service_url = v.clone();
        }
    }
}

/// One entry in the bounded analysis history log
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HistoryEntry {
    #[serde(rename = "type")]
    pub entry_type: String,
    pub url: String,
    pub result: serde_json::Value,
    pub context_id: String,
    pub timestamp: i64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn severity_ordering() {
        assert!(Severity::Low < Severity::Medium);
        assert!(Severity::Medium < Severity::High);
    }

    #[test]
    fn sensitivity_thresholds() {
        assert_eq!(Sensitivity::Low.threshold(), Severity::High);
        assert_eq!(Sensitivity::Medium.threshold(), Severity::Medium);
        assert_eq!(Sensitivity::High.threshold(), Severity::Low);
    }

    #[test]
    fn empty_set_is_safe() {
        let set = DetectionSet::default();
        assert_eq!(set.total, 0);
        assert_eq!(set.max_severity(), None);
        assert_eq!(set.overall_risk(), RiskLevel::Safe);
    }

    #[test]
    fn detection_element_not_serialized() {
        let d = Detection {
            kind: DetectionKind::LinkMismatch,
            severity: Severity::Medium,
            element: 7,
            evidence: Evidence {
                text: Some("Login".to_string()),
                href: Some("https://evil.example/x".to_string()),
                ..Default::default()
            },
        };
        let json = serde_json::to_value(&d).unwrap();
        assert!(json.get("element").is_none());
        assert_eq!(json["type"], "link_mismatch");
        assert_eq!(json["severity"], "medium");
    }

    #[test]
    fn settings_patch_rejects_unknown_keys() {
        let raw = serde_json::json!({"enabled": false, "telemetry": true});
        assert!(serde_json::from_value::<SettingsPatch>(raw).is_err());
    }

    #[test]
    fn settings_patch_merges() {
        let mut settings = Settings::default();
        let patch = SettingsPatch {
            enabled: Some(false),
            sensitivity: Some(Sensitivity::High),
            ..Default::default()
        };
        patch.apply(&mut settings);
        assert!(!settings.enabled);
        assert_eq!(settings.sensitivity, Sensitivity::High);
        // untouched fields keep their defaults
        assert!(settings.show_warnings);
        assert_eq!(settings.service_url, DEFAULT_SERVICE_URL);
    }

    #[test]
    fn verdict_wire_names() {
        let v = AnalysisVerdict::fallback(1_700_000_000);
        let json = serde_json::to_value(&v).unwrap();
        assert_eq!(json["risk_level"], "unknown");
        assert_eq!(json["action"], "warn");
        assert!(json.get("phishing_indicators").is_some());
    }
}
