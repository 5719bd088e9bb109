// Main CLI entry point for phishguard
// Scans a saved HTML page for phishing signals, and optionally
// escalates to the risk-assessment service through the message router.

use std::sync::Arc;

use clap::{Arg, Command};
use phishguard::aggregator;
use phishguard::escalation::AnalysisContext;
use phishguard::models::{Sensitivity, SettingsPatch};
use phishguard::router::{Request, Router};
use phishguard::scanner::scan_page;
use phishguard::store::{FileStore, KeyValueStore, SettingsStore};

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("phishguard=info")),
        )
        .init();

    let matches = Command::new("phishguard")
        .version("1.0.0")
        .about("Client-side phishing-signal pipeline with LLM-backed risk escalation")
        .after_help("EXAMPLES:\n  phishguard --input page.html --url https://bank.example/login\n  phishguard -i page.html -u https://bank.example --no-llm-analysis --sensitivity high\n  phishguard --whitelist-domain bank.example\n  phishguard --health-check --service-url http://localhost:8000")
        .arg(Arg::new("input")
            .short('i')
            .long("input")
            .num_args(1)
            .help("Path to a saved HTML page to scan"))
        .arg(Arg::new("url")
            .short('u')
            .long("url")
            .num_args(1)
            .help("URL the page was loaded from (required with --input)"))
        .arg(Arg::new("store")
            .long("store")
            .num_args(1)
            .default_value(".phishguard.json")
            .help("Path of the persisted state file (settings, whitelist, cache, history)"))
        .arg(Arg::new("service_url")
            .long("service-url")
            .num_args(1)
            .help("Override the risk-assessment service URL"))
        .arg(Arg::new("sensitivity")
            .long("sensitivity")
            .num_args(1)
            .value_parser(["low", "medium", "high"])
            .help("Override detection sensitivity"))
        .arg(Arg::new("no_llm_analysis")
            .long("no-llm-analysis")
            .action(clap::ArgAction::SetTrue)
            .help("Disable escalation to the risk-assessment service"))
        .arg(Arg::new("whitelist_domain")
            .long("whitelist-domain")
            .num_args(1)
            .help("Add a domain to the whitelist and exit"))
        .arg(Arg::new("check_whitelist")
            .long("check-whitelist")
            .num_args(1)
            .help("Check whether a domain is whitelisted and exit"))
        .arg(Arg::new("health_check")
            .long("health-check")
            .action(clap::ArgAction::SetTrue)
            .help("Probe the risk-assessment service health and exit"))
        .arg(Arg::new("context")
            .long("context")
            .num_args(1)
            .default_value("cli")
            .help("Requesting context identifier (rate-limit key)"))
        .get_matches();

    let store_path = matches.get_one::<String>("store").expect("has default");
    let store: Arc<dyn KeyValueStore> = match FileStore::open(store_path) {
        Ok(s) => Arc::new(s),
        Err(e) => {
            eprintln!("Failed to open state file {}: {}", store_path, e);
            std::process::exit(1);
        }
    };
    let sender = matches.get_one::<String>("context").expect("has default").clone();

    // Apply one-shot settings overrides before building the router so
    // the service URL change is picked up at startup
    let patch = SettingsPatch {
        sensitivity: matches.get_one::<String>("sensitivity").map(|s| match s.as_str() {
            "low" => Sensitivity::Low,
            "high" => Sensitivity::High,
            _ => Sensitivity::Medium,
        }),
        use_llm_analysis: matches.get_flag("no_llm_analysis").then_some(false),
        service_url: matches.get_one::<String>("service_url").cloned(),
        ..Default::default()
    };
    if patch.sensitivity.is_some() || patch.use_llm_analysis.is_some() || patch.service_url.is_some()
    {
        if let Err(e) = SettingsStore::new(store.clone()).update(&patch).await {
            eprintln!("Failed to update settings: {}", e);
            std::process::exit(1);
        }
    }

    let mut router = Router::start(store.clone()).await;

    if let Some(domain) = matches.get_one::<String>("whitelist_domain") {
        let resp = router
            .dispatch(Request::WhitelistDomain { domain: domain.clone() }, &sender)
            .await;
        if resp.success {
            println!("Whitelisted {}", domain);
        } else {
            eprintln!("Failed: {}", resp.error.unwrap_or_default());
            std::process::exit(1);
        }
        return;
    }

    if let Some(domain) = matches.get_one::<String>("check_whitelist") {
        let resp = router
            .dispatch(Request::CheckWhitelist { domain: domain.clone() }, &sender)
            .await;
        println!(
            "{}: {}",
            domain,
            if resp.whitelisted == Some(true) { "whitelisted" } else { "not whitelisted" }
        );
        return;
    }

    if matches.get_flag("health_check") {
        let resp = router.dispatch(Request::HealthCheck, &sender).await;
        match resp.backend_healthy {
            Some(true) => println!("Risk service: healthy"),
            _ => {
                println!("Risk service: unavailable");
                std::process::exit(1);
            }
        }
        return;
    }

    let (input, url) = match (matches.get_one::<String>("input"), matches.get_one::<String>("url")) {
        (Some(i), Some(u)) => (i, u),
        _ => {
            eprintln!("Nothing to do: pass --input with --url, or one of --whitelist-domain/--check-whitelist/--health-check.");
            std::process::exit(2);
        }
    };

    let html = match std::fs::read_to_string(input) {
        Ok(h) => h,
        Err(e) => {
            eprintln!("Failed to read {}: {}", input, e);
            std::process::exit(1);
        }
    };

    // The scanning-context half of the pipeline runs locally: scan,
    // aggregate, then escalate through the router if warranted
    let outcome = match scan_page(&html, url) {
        Ok(o) => o,
        Err(e) => {
            eprintln!("Scan failed: {}", e);
            std::process::exit(1);
        }
    };

    println!(
        "Scanned {}: {} detection(s), overall risk {}",
        url,
        outcome.detections.total,
        outcome.detections.overall_risk()
    );
    for d in &outcome.detections.detections {
        println!(
            "  [{}] {:?}: {}",
            d.severity,
            d.kind,
            serde_json::to_string(&d.evidence).unwrap_or_default()
        );
    }

    let settings = SettingsStore::new(store.clone()).load().await;
    let status = router
        .dispatch(Request::CheckStatus { current_url: url.clone() }, &sender)
        .await;
    let whitelisted = status.whitelisted == Some(true);

    let decision = aggregator::decide(&outcome.detections, &settings, whitelisted);
    println!(
        "Decision: highlight={} warn={} escalate={}",
        decision.should_highlight, decision.should_warn, decision.should_escalate
    );

    if !decision.should_escalate {
        return;
    }

    let context = AnalysisContext {
        page_content: html.chars().take(5000).collect(),
        local_detections: outcome.detections.detections.clone(),
        user_context: serde_json::json!({ "source": "cli" }),
    };
    let resp = router
        .dispatch(Request::AnalyzeUrl { url: url.clone(), context }, &sender)
        .await;

    match resp.data {
        Some(data) if resp.success => {
            println!(
                "Risk service verdict: {} (confidence {}, action {})",
                data.get("risk_level").and_then(|v| v.as_str()).unwrap_or("unknown"),
                data.get("confidence").and_then(|v| v.as_f64()).unwrap_or(0.0),
                data.get("action").and_then(|v| v.as_str()).unwrap_or("warn"),
            );
            if let Some(reasoning) = data.get("reasoning").and_then(|v| v.as_str()) {
                println!("  {}", reasoning);
            }
        }
        _ => {
            eprintln!(
                "Escalation failed: {}",
                resp.error.unwrap_or_else(|| "no response data".to_string())
            );
            std::process::exit(1);
        }
    }
}
