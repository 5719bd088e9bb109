// Detection aggregation
// Turns a scan's DetectionSet plus the user's settings into a single
// highlight/warn/escalate decision.

use serde::{Deserialize, Serialize};

use crate::models::{DetectionSet, Settings};

/// What the scanning context should do with a finished scan
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Decision {
    pub should_highlight: bool,
    pub should_warn: bool,
    pub should_escalate: bool,
}

/// Apply the sensitivity filter and the user's toggles.
///
/// Sensitivity picks the lowest severity that still counts: Low keeps
/// only High detections, Medium keeps Medium and High, High keeps all.
/// Escalation additionally requires the LLM toggle and a
/// non-whitelisted domain.
pub fn decide(set: &DetectionSet, settings: &Settings, whitelisted: bool) -> Decision {
    let counted = set.count_at_least(settings.sensitivity.threshold());
    let any = counted > 0;

    Decision {
        should_highlight: any && settings.highlight_suspicious,
        should_warn: any && settings.show_warnings,
        should_escalate: any && settings.use_llm_analysis && !whitelisted,
    }
}
