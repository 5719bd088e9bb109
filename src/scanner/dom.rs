// DOM snapshot extraction for the heuristic scanner
// Pulls anchors, forms, and password inputs out of raw HTML with
// precompiled regexes. No DOM library, no network, no page mutation.

use lazy_static::lazy_static;
use regex::Regex;

lazy_static! {
    static ref ANCHOR_RE: Regex = Regex::new(r"(?is)<a\b([^>]*)>(.*?)</a>").unwrap();
    static ref FORM_RE: Regex = Regex::new(r"(?is)<form\b([^>]*)>(.*?)</form>").unwrap();
    static ref INPUT_RE: Regex = Regex::new(r"(?is)<input\b[^>]*>").unwrap();
    static ref HREF_RE: Regex = Regex::new(r#"(?i)href\s*=\s*["']([^"']*)["']"#).unwrap();
    static ref ACTION_RE: Regex = Regex::new(r#"(?i)action\s*=\s*["']([^"']*)["']"#).unwrap();
    static ref TYPE_RE: Regex = Regex::new(r#"(?i)type\s*=\s*["']([^"']*)["']"#).unwrap();
    static ref NAME_RE: Regex = Regex::new(r#"(?i)name\s*=\s*["']([^"']*)["']"#).unwrap();
    static ref TAG_RE: Regex = Regex::new(r"(?s)<[^>]+>").unwrap();
}

/// One input inside a form. Only the name and type attribute are kept;
/// values never enter the snapshot.
#[derive(Debug, Clone, PartialEq)]
pub struct FormField {
    pub name: Option<String>,
    pub input_type: String,
}

impl FormField {
    pub fn is_password(&self) -> bool {
        self.input_type == "password"
    }

    pub fn is_email(&self) -> bool {
        self.input_type == "email"
            || self
                .name
                .as_deref()
                .map(|n| n.to_lowercase().contains("email"))
                .unwrap_or(false)
    }

    /// Label used in evidence: the field name when present, else the type
    pub fn label(&self) -> String {
        self.name.clone().unwrap_or_else(|| self.input_type.clone())
    }
}

/// One scannable element from the page. The element's position in
/// `DomSnapshot::elements` is the ordinal that detections and the
/// highlight index refer to.
#[derive(Debug, Clone, PartialEq)]
pub enum PageElement {
    Anchor {
        href: Option<String>,
        text: String,
    },
    Form {
        action: Option<String>,
        fields: Vec<FormField>,
    },
    PasswordInput {
        name: Option<String>,
        within_form: bool,
        form_has_action: bool,
    },
}

/// Flat snapshot of the scannable parts of a page
#[derive(Debug, Clone, Default)]
pub struct DomSnapshot {
    pub elements: Vec<PageElement>,
}

fn attr(re: &Regex, tag: &str) -> Option<String> {
    re.captures(tag).map(|c| c[1].trim().to_string())
}

fn visible_text(inner_html: &str) -> String {
    let stripped = TAG_RE.replace_all(inner_html, " ");
    stripped.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn parse_input(tag: &str) -> FormField {
    FormField {
        name: attr(&NAME_RE, tag),
        input_type: attr(&TYPE_RE, tag)
            .map(|t| t.to_lowercase())
            .unwrap_or_else(|| "text".to_string()),
    }
}

/// Extract a snapshot from raw HTML. Order: anchors, then forms, then
/// password inputs (document order within each group).
pub fn snapshot(html: &str) -> DomSnapshot {
    let mut elements = Vec::new();

    for cap in ANCHOR_RE.captures_iter(html) {
        elements.push(PageElement::Anchor {
            href: attr(&HREF_RE, &cap[1]),
            text: visible_text(&cap[2]),
        });
    }

    // Form body spans, used below to tie inputs to their enclosing form
    let mut form_spans: Vec<(usize, usize, bool)> = Vec::new();
    for cap in FORM_RE.captures_iter(html) {
        let body = cap.get(2).unwrap();
        let action = attr(&ACTION_RE, &cap[1]);
        form_spans.push((body.start(), body.end(), action.is_some()));
        let fields = INPUT_RE
            .find_iter(body.as_str())
            .map(|m| parse_input(m.as_str()))
            .collect();
        elements.push(PageElement::Form { action, fields });
    }

    for m in INPUT_RE.find_iter(html) {
        let field = parse_input(m.as_str());
        if !field.is_password() {
            continue;
        }
        let enclosing = form_spans
            .iter()
            .find(|(start, end, _)| m.start() >= *start && m.end() <= *end);
        elements.push(PageElement::PasswordInput {
            name: field.name,
            within_form: enclosing.is_some(),
            form_has_action: enclosing.map(|(_, _, has)| *has).unwrap_or(false),
        });
    }

    DomSnapshot { elements }
}
