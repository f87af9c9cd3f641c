//! `pixelprops classify` command - Show the identity a package would get.
//!
//! Starts the package in a simulated process and reports the decision and
//! every identity field that ended up written.

use clap::Args;
use pixelprops_core::config::PropsConfig;
use pixelprops_core::field::BuildField;
use pixelprops_runtime::{Decision, ProcessContext, PropsOutcome};

use super::{simulated_process, Simulation};
use crate::output;

#[derive(Args)]
pub struct ClassifyArgs {
    /// Package identifier, e.g. com.google.android.apps.photos
    pub package: String,

    /// Codename of the simulated device
    #[arg(long, default_value = "")]
    pub device: String,

    /// Process name (defaults to the package identifier)
    #[arg(long)]
    pub process: Option<String>,

    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

#[derive(Debug, serde::Serialize)]
struct ClassifyOutput {
    #[serde(flatten)]
    outcome: PropsOutcome,
    profile: Option<String>,
    fields: std::collections::BTreeMap<BuildField, pixelprops_core::field::FieldValue>,
}

fn run(args: &ClassifyArgs, config: &PropsConfig) -> ClassifyOutput {
    let process_name = args.process.as_deref().unwrap_or(&args.package);
    let sim = Simulation::new(config, simulated_process(config, process_name, &args.device));
    let ctx = ProcessContext::new();

    let outcome = sim.engine.set_props(&ctx, &args.package);
    let profile = match &outcome.decision {
        Decision::Apply(plan) => Some(sim.engine.catalog().get(plan.profile).name.clone()),
        Decision::Certify => sim
            .engine
            .gatekeeper()
            .certified_profile()
            .map(|p| p.name.clone()),
        Decision::Skip { .. } => None,
    };
    let fields = sim
        .store
        .snapshot()
        .into_iter()
        .filter(|(field, _)| *field != BuildField::Incremental)
        .collect();

    ClassifyOutput {
        outcome,
        profile,
        fields,
    }
}

fn describe(decision: &Decision) -> String {
    match decision {
        Decision::Skip { reason } => format!("skip ({})", reason.as_str()),
        Decision::Certify => "certify".to_string(),
        Decision::Apply(_) => "apply".to_string(),
    }
}

pub async fn execute(
    args: ClassifyArgs,
    config: &PropsConfig,
) -> Result<(), Box<dyn std::error::Error>> {
    let result = run(&args, config);

    if args.json {
        return output::print_json(&result);
    }

    let mut table = output::new_table(&["PACKAGE", "DECISION", "PROFILE"]);
    table.add_row(vec![
        result.outcome.package.clone(),
        describe(&result.outcome.decision),
        result.profile.clone().unwrap_or_else(|| "-".to_string()),
    ]);
    println!("{table}\n");
    println!("{}", output::fields_table(result.fields.iter().map(|(f, v)| (*f, v))));

    for (field, reason) in &result.outcome.report.failed {
        eprintln!("Warning: {field} not written: {reason}");
    }
    Ok(())
}
