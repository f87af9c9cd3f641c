//! `pixelprops fingerprint` command - Parse a build fingerprint.

use clap::Args;
use pixelprops_runtime::{build_id, device_name};

use crate::output;

#[derive(Args)]
pub struct FingerprintArgs {
    /// Build fingerprint, e.g. google/husky/husky:14/UD1A.230803.041/10808477:user/release-keys
    pub fingerprint: String,

    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

#[derive(Debug, serde::Serialize)]
struct FingerprintOutput {
    device: String,
    build_id: String,
}

fn parse(fingerprint: &str) -> FingerprintOutput {
    FingerprintOutput {
        device: device_name(fingerprint),
        build_id: build_id(fingerprint),
    }
}

pub async fn execute(args: FingerprintArgs) -> Result<(), Box<dyn std::error::Error>> {
    let parsed = parse(&args.fingerprint);

    if args.json {
        return output::print_json(&parsed);
    }

    let mut table = output::new_table(&["DEVICE", "BUILD ID"]);
    table.add_row(vec![
        output::or_dash(&parsed.device),
        output::or_dash(&parsed.build_id),
    ]);
    println!("{table}");
    Ok(())
}
