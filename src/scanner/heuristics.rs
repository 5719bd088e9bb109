// Heuristic rules for the page scanner
// Each rule is evaluated independently; a malformed URL in an href or
// form action skips that rule for that element and the scan continues.

use std::collections::HashMap;

use url::Url;

use super::dom::{DomSnapshot, PageElement};
use crate::error::PhishguardError;
use crate::models::{Detection, DetectionKind, DetectionSet, Evidence, Severity};

/// Ephemeral element-ordinal → severity map. Lives only in the
/// scanning context (no Serialize impl); used to decorate the live
/// page, never to cross a boundary.
#[derive(Debug, Clone, Default)]
pub struct HighlightIndex {
    severities: HashMap<usize, Severity>,
}

impl HighlightIndex {
    /// Record a severity for an element, keeping the highest seen
    pub fn record(&mut self, element: usize, severity: Severity) {
        let entry = self.severities.entry(element).or_insert(severity);
        if severity > *entry {
            *entry = severity;
        }
    }

    pub fn severity_of(&self, element: usize) -> Option<Severity> {
        self.severities.get(&element).copied()
    }

    pub fn len(&self) -> usize {
        self.severities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.severities.is_empty()
    }
}

/// Result of one scan: the boundary-safe detection set plus the
/// context-local highlight index.
#[derive(Debug, Clone)]
pub struct ScanOutcome {
    pub detections: DetectionSet,
    pub highlights: HighlightIndex,
}

/// Run all heuristic rules over a DOM snapshot.
/// Pure: no side effects, no network. Only the page URL itself is
/// required to parse; bad URLs inside the page are non-matches.
pub fn scan_snapshot(snapshot: &DomSnapshot, page_url: &str) -> Result<ScanOutcome, PhishguardError> {
    let page = Url::parse(page_url)
        .map_err(|e| PhishguardError::MalformedUrl(format!("{}: {}", page_url, e)))?;
    let page_host = page.host_str().unwrap_or("").to_lowercase();
    let secure = page.scheme() == "https";

    let mut detections = DetectionSet::default();
    let mut highlights = HighlightIndex::default();

    fn push(detections: &mut DetectionSet, highlights: &mut HighlightIndex, detection: Detection) {
        highlights.record(detection.element, detection.severity);
        detections.push(detection);
    }

    for (ordinal, element) in snapshot.elements.iter().enumerate() {
        match element {
            PageElement::Anchor { href, text } => {
                let href = match href {
                    Some(h) if !h.is_empty() => h,
                    _ => continue,
                };

                // LinkMismatch: first word of the visible text missing
                // from the raw href
                if let Some(first_word) = text.split_whitespace().next() {
                    if !href.to_lowercase().contains(&first_word.to_lowercase()) {
                        push(
                            &mut detections,
                            &mut highlights,
                            Detection {
                                kind: DetectionKind::LinkMismatch,
                                severity: Severity::Medium,
                                element: ordinal,
                                evidence: Evidence {
                                    text: Some(text.clone()),
                                    href: Some(href.clone()),
                                    ..Default::default()
                                },
                            },
                        );
                    }
                }

                // ExternalRedirect: absolute link to a host that does
                // not contain the page host. Relative or malformed
                // hrefs are non-matches.
                if let Ok(target) = Url::parse(href) {
                    if let Some(host) = target.host_str() {
                        if !host.to_lowercase().contains(&page_host) {
                            push(
                                &mut detections,
                                &mut highlights,
                                Detection {
                                    kind: DetectionKind::ExternalRedirect,
                                    severity: Severity::Low,
                                    element: ordinal,
                                    evidence: Evidence {
                                        href: Some(href.clone()),
                                        target_domain: Some(host.to_lowercase()),
                                        ..Default::default()
                                    },
                                },
                            );
                        }
                    }
                }
            }

            PageElement::Form { action, fields } => {
                let action = match action {
                    Some(a) if !a.is_empty() => a,
                    _ => continue,
                };
                // Resolve relative to the page; failure is a non-match
                let resolved = match page.join(action) {
                    Ok(u) => u,
                    Err(_) => continue,
                };
                let host = match resolved.host_str() {
                    Some(h) => h.to_lowercase(),
                    None => continue,
                };
                if host.contains(&page_host) {
                    continue;
                }
                let has_password = fields.iter().any(|f| f.is_password());
                let has_email = fields.iter().any(|f| f.is_email());
                let severity = if has_password {
                    Severity::High
                } else {
                    Severity::Medium
                };
                push(
                    &mut detections,
                    &mut highlights,
                    Detection {
                        kind: DetectionKind::ExternalFormAction,
                        severity,
                        element: ordinal,
                        evidence: Evidence {
                            target_domain: Some(host),
                            field_names: Some(fields.iter().map(|f| f.label()).collect()),
                            has_email: Some(has_email),
                            ..Default::default()
                        },
                    },
                );
            }

            PageElement::PasswordInput {
                name,
                form_has_action,
                ..
            } => {
                let severity = if !secure {
                    Severity::High
                } else if !form_has_action {
                    Severity::Low
                } else {
                    continue;
                };
                push(
                    &mut detections,
                    &mut highlights,
                    Detection {
                        kind: DetectionKind::InsecurePasswordField,
                        severity,
                        element: ordinal,
                        evidence: Evidence {
                            field_names: name.clone().map(|n| vec![n]),
                            ..Default::default()
                        },
                    },
                );
            }
        }
    }

    Ok(ScanOutcome {
        detections,
        highlights,
    })
}
