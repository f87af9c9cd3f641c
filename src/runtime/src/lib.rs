//! PixelProps Runtime - the spoof decision engine.
//!
//! Profile catalog, package classifier, certification gatekeeper and field
//! applier, plus an in-memory platform for dry runs and tests.

pub mod applier;
pub mod catalog;
pub mod classifier;
pub mod context;
pub mod engine;
pub mod gatekeeper;
pub mod simulate;

// Re-export common types
pub use applier::{Applier, ApplyReport};
pub use catalog::{
    build_id, certified_profile, device_name, load_profile, PackageRules, ProfileCatalog,
    ProfileKind, SpoofProfile,
};
pub use classifier::{
    ApplyPlan, CertificationGate, Classification, Classifier, Decision, SkipReason,
};
pub use context::{CallerSnapshot, CallerState, ProcessContext};
pub use engine::{Platform, PropsEngine, PropsOutcome};
pub use gatekeeper::{
    Certification, Gatekeeper, GatekeeperEvent, GatekeeperSession, GatekeeperState, Verdict,
};
pub use simulate::{ManualTaskObserver, MemoryIdentityStore, StaticProcessInfo};

/// PixelProps Runtime version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
