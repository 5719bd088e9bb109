// Heuristic page scanner
//
// PURE layer of the pipeline: raw HTML in, detections out.
// dom.rs builds a snapshot of the scannable elements; heuristics.rs
// runs the four rules over it. Detections carry derived evidence only;
// the element ordinals and the HighlightIndex stay in this context.

pub mod dom;
pub mod heuristics;

pub use dom::{DomSnapshot, FormField, PageElement};
pub use heuristics::{scan_snapshot, HighlightIndex, ScanOutcome};

use crate::error::PhishguardError;

/// Scan a page in one step: snapshot the HTML, then run every rule
pub fn scan_page(html: &str, page_url: &str) -> Result<ScanOutcome, PhishguardError> {
    scan_snapshot(&dom::snapshot(html), page_url)
}
