//! CLI command definitions and dispatch.

mod attest;
mod classify;
mod fingerprint;
mod version;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use clap::{Parser, Subcommand};
use pixelprops_core::config::{PropsConfig, DEFAULT_DEVICE_PROPERTY};
use pixelprops_core::event::EventEmitter;
use pixelprops_core::field::BuildField;
use pixelprops_runtime::{
    ManualTaskObserver, MemoryIdentityStore, Platform, PropsEngine, StaticProcessInfo,
};

/// Build incremental seeded into the simulated store.
const SIMULATED_INCREMENTAL: &str = "eng.pixelprops";

/// PixelProps - Pixel device identity spoofing decisions.
#[derive(Parser)]
#[command(name = "pixelprops", version, about)]
pub struct Cli {
    /// Configuration file (YAML or JSON)
    #[arg(long, short, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

/// Available commands.
#[derive(Subcommand)]
pub enum Command {
    /// Extract device name and build ID from a fingerprint
    Fingerprint(fingerprint::FingerprintArgs),
    /// Show which identity a package would be given
    Classify(classify::ClassifyArgs),
    /// Simulate a key attestation request after packages have started
    Attest(attest::AttestArgs),
    /// Show version information
    Version(version::VersionArgs),
}

/// Load configuration, or defaults when no file is given.
pub fn load_config(path: Option<&Path>) -> Result<PropsConfig, Box<dyn std::error::Error>> {
    match path {
        Some(path) => Ok(PropsConfig::load(path)?),
        None => Ok(PropsConfig::default()),
    }
}

/// A dry-run engine over the in-memory platform.
pub(crate) struct Simulation {
    pub store: Arc<MemoryIdentityStore>,
    pub observer: Arc<ManualTaskObserver>,
    pub engine: PropsEngine,
}

impl Simulation {
    pub fn new(config: &PropsConfig, process: StaticProcessInfo) -> Self {
        let store = Arc::new(
            MemoryIdentityStore::new().with_field(BuildField::Incremental, SIMULATED_INCREMENTAL),
        );
        let observer = Arc::new(ManualTaskObserver::new());
        let platform = Platform {
            store: store.clone(),
            observer: observer.clone(),
            process: Arc::new(process),
        };
        Self {
            store,
            observer,
            engine: PropsEngine::new(config, platform, EventEmitter::default()),
        }
    }
}

/// Process info for a simulated device.
pub(crate) fn simulated_process(
    config: &PropsConfig,
    process_name: &str,
    device: &str,
) -> StaticProcessInfo {
    let property = if config.device_property.is_empty() {
        DEFAULT_DEVICE_PROPERTY
    } else {
        config.device_property.as_str()
    };
    StaticProcessInfo::new(process_name).with_property(property, device)
}

/// Dispatch a parsed CLI to the appropriate command handler.
pub async fn dispatch(cli: Cli, config: PropsConfig) -> Result<(), Box<dyn std::error::Error>> {
    match cli.command {
        Command::Fingerprint(args) => fingerprint::execute(args).await,
        Command::Classify(args) => classify::execute(args, &config).await,
        Command::Attest(args) => attest::execute(args, &config).await,
        Command::Version(args) => version::execute(args).await,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_global_config_flag() {
        let cli = Cli::try_parse_from([
            "pixelprops",
            "classify",
            "com.android.chrome",
            "--config",
            "props.yaml",
        ])
        .unwrap();
        assert_eq!(cli.config, Some(PathBuf::from("props.yaml")));
        assert!(matches!(cli.command, Command::Classify(_)));
    }

    #[test]
    fn test_load_config_defaults_without_path() {
        let config = load_config(None).unwrap();
        assert!(config.certified_props.is_empty());
        assert_eq!(config.device_property, DEFAULT_DEVICE_PROPERTY);
    }

    #[test]
    fn test_simulated_process_uses_configured_property() {
        let config = PropsConfig {
            device_property: "ro.custom.device".to_string(),
            ..PropsConfig::default()
        };
        let sim = Simulation::new(&config, simulated_process(&config, "app", "raven"));
        assert_eq!(sim.engine.device_codename(), "raven");
    }
}
