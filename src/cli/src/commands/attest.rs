//! `pixelprops attest` command - Simulate a key attestation request.
//!
//! Starts the given packages in one simulated process, in order, then asks
//! the attestation guard whether a certificate chain may be handed out.

use clap::Args;
use pixelprops_core::config::PropsConfig;
use pixelprops_core::event::PropsEvent;
use pixelprops_runtime::gatekeeper::account_linking_activity;
use pixelprops_runtime::{CallerSnapshot, ProcessContext};

use super::{simulated_process, Simulation};
use crate::output;

#[derive(Args)]
pub struct AttestArgs {
    /// Packages started in the process before the request (repeatable)
    #[arg(long = "package", default_value = "com.google.android.gms")]
    pub packages: Vec<String>,

    /// Call stack frames of the requesting thread (repeatable)
    #[arg(long = "stack")]
    pub stack: Vec<String>,

    /// Process name
    #[arg(long, default_value = "com.google.android.gms.unstable")]
    pub process: String,

    /// Codename of the simulated device
    #[arg(long, default_value = "")]
    pub device: String,

    /// Put the account linking activity on top before the request
    #[arg(long)]
    pub account_on_top: bool,

    /// Only report events whose key starts with this prefix
    #[arg(long = "events", default_value = "")]
    pub event_prefix: String,

    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

#[derive(Debug, serde::Serialize)]
struct AttestOutput {
    process: String,
    callers: CallerSnapshot,
    blocked: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
    events: Vec<PropsEvent>,
}

async fn run(args: &AttestArgs, config: &PropsConfig) -> AttestOutput {
    let mut process = simulated_process(config, &args.process, &args.device);
    for frame in &args.stack {
        process = process.with_frame(frame.as_str());
    }
    let sim = Simulation::new(config, process);
    let prefix = args.event_prefix.clone();
    let mut stream = sim
        .engine
        .events()
        .subscribe_filtered(move |event| event.key.starts_with(&prefix));
    let ctx = ProcessContext::new();

    for package in &args.packages {
        sim.engine.set_props(&ctx, package);
    }
    if args.account_on_top {
        sim.observer.set_top_silently(Some(account_linking_activity()));
    }

    let result = sim.engine.on_get_certificate_chain(&ctx);

    // Dropping the engine closes the channel, so the stream ends after the
    // buffered events.
    drop(sim);
    let mut events = Vec::new();
    while let Some(event) = stream.recv().await {
        events.push(event);
    }

    AttestOutput {
        process: args.process.clone(),
        callers: ctx.caller.snapshot(),
        blocked: result.is_err(),
        error: result.err().map(|e| e.to_string()),
        events,
    }
}

pub async fn execute(
    args: AttestArgs,
    config: &PropsConfig,
) -> Result<(), Box<dyn std::error::Error>> {
    let result = run(&args, config).await;

    if args.json {
        return output::print_json(&result);
    }

    let mut table = output::new_table(&["PROCESS", "GMS", "STORE", "SETUP WIZARD", "ATTESTATION"]);
    table.add_row(vec![
        result.process.clone(),
        result.callers.gms.to_string(),
        result.callers.store.to_string(),
        result.callers.setup_wizard.to_string(),
        if result.blocked { "blocked" } else { "allowed" }.to_string(),
    ]);
    println!("{table}");

    if let Some(error) = &result.error {
        eprintln!("{error}");
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use pixelprops_core::event::events;

    fn certified_config() -> PropsConfig {
        let mut props = vec![String::new(); 11];
        props[2] = "Google".to_string();
        props[3] = "google".to_string();
        props[4] = "Pixel 5a".to_string();
        props[5] =
            "google/barbet/barbet:14/UP1A.231005.007/10754064:user/release-keys".to_string();
        PropsConfig {
            certified_props: props,
            ..PropsConfig::default()
        }
    }

    fn args(packages: &[&str], stack: &[&str]) -> AttestArgs {
        AttestArgs {
            packages: packages.iter().map(|p| p.to_string()).collect(),
            stack: stack.iter().map(|s| s.to_string()).collect(),
            process: "com.google.android.gms.unstable".to_string(),
            device: "beryllium".to_string(),
            account_on_top: false,
            event_prefix: String::new(),
            json: false,
        }
    }

    #[tokio::test]
    async fn test_droidguard_request_blocked() {
        let result = run(
            &args(&["com.google.android.gms"], &["com.google.ccc.abuse.droidguard.DroidGuard"]),
            &certified_config(),
        )
        .await;
        assert!(result.blocked);
        assert!(result.callers.gms);
        assert!(result.events.iter().any(|e| e.key == events::ATTESTATION_BLOCKED));
    }

    #[tokio::test]
    async fn test_plain_gms_request_allowed() {
        let result = run(&args(&["com.google.android.gms"], &[]), &certified_config()).await;
        assert!(!result.blocked);
        assert!(result.error.is_none());
    }

    #[tokio::test]
    async fn test_setup_wizard_allows() {
        let result = run(
            &args(
                &["com.google.android.gms", "com.google.android.setupwizard"],
                &["com.google.ccc.abuse.droidguard.DroidGuard"],
            ),
            &certified_config(),
        )
        .await;
        assert!(!result.blocked);
        assert!(result.callers.setup_wizard);
    }

    #[tokio::test]
    async fn test_event_prefix_filters_report() {
        let mut attest = args(&["com.google.android.gms"], &["droidguard"]);
        attest.event_prefix = "gatekeeper.".to_string();
        let result = run(&attest, &certified_config()).await;
        assert!(result.blocked);
        assert!(!result.events.is_empty());
        assert!(result.events.iter().all(|e| e.key.starts_with("gatekeeper.")));
    }
}
