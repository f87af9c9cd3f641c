//! Package classification.
//!
//! Maps a package identifier to what its process should see: nothing
//! changed, the certified identity, or one of the reference profiles.

use std::collections::BTreeSet;

use pixelprops_core::field::BuildField;
use serde::Serialize;

use crate::applier::ApplyReport;
use crate::catalog::{packages, PackageRules, ProfileKind};
use crate::context::ProcessContext;
use crate::gatekeeper::{Certification, Gatekeeper};

/// Why a package was left untouched.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SkipReason {
    EmptyPackage,
    Exempt,
    Camera,
    NotEligible,
    GenuineDevice,
}

impl SkipReason {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::EmptyPackage => "empty_package",
            Self::Exempt => "exempt",
            Self::Camera => "camera",
            Self::NotEligible => "not_eligible",
            Self::GenuineDevice => "genuine_device",
        }
    }
}

/// Profile application plan for one package.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ApplyPlan {
    pub profile: ProfileKind,
    /// Fields withheld for this package
    pub exclusions: BTreeSet<BuildField>,
    /// Rewrite FINGERPRINT with the real build incremental after applying
    pub index_override: bool,
}

/// Classification result.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "decision", rename_all = "snake_case")]
pub enum Decision {
    Skip { reason: SkipReason },
    Certify,
    Apply(ApplyPlan),
}

impl Decision {
    fn skip(reason: SkipReason) -> Self {
        Decision::Skip { reason }
    }
}

/// Decision for a package plus whatever the certification probe wrote.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Classification {
    pub decision: Decision,
    pub report: ApplyReport,
}

/// Source of certification verdicts.
pub trait CertificationGate {
    fn certify(&self, ctx: &ProcessContext) -> Certification;
}

impl CertificationGate for Gatekeeper {
    fn certify(&self, ctx: &ProcessContext) -> Certification {
        Gatekeeper::certify(self, ctx)
    }
}

/// Package classifier over a fixed rule set.
#[derive(Debug, Clone, Default)]
pub struct Classifier {
    rules: PackageRules,
}

impl Classifier {
    pub fn new(rules: PackageRules) -> Self {
        Self { rules }
    }

    pub fn rules(&self) -> &PackageRules {
        &self.rules
    }

    /// Full classification for a starting package.
    ///
    /// Latches the caller flags first, then lets the gate claim the process
    /// for certification, then falls back to the static rules. The probe's
    /// writes are reported whatever the verdict.
    pub fn classify(
        &self,
        ctx: &ProcessContext,
        package: &str,
        device_codename: &str,
        gate: &dyn CertificationGate,
    ) -> Classification {
        if package.is_empty() {
            return Classification {
                decision: Decision::skip(SkipReason::EmptyPackage),
                report: ApplyReport::default(),
            };
        }

        ctx.caller.observe(package);
        let certification = gate.certify(ctx);
        let decision = if certification.verdict.is_certified() {
            Decision::Certify
        } else {
            self.classify_static(package, device_codename)
        };
        Classification {
            decision,
            report: certification.report,
        }
    }

    /// Rule-only classification. Pure: same inputs, same decision.
    pub fn classify_static(&self, package: &str, device_codename: &str) -> Decision {
        if package.is_empty() {
            return Decision::skip(SkipReason::EmptyPackage);
        }
        if self.rules.is_exempt(package) {
            return Decision::skip(SkipReason::Exempt);
        }
        if self.rules.is_camera(package) {
            return Decision::skip(SkipReason::Camera);
        }
        if !self.rules.is_eligible(package) {
            return Decision::skip(SkipReason::NotEligible);
        }

        let profile = if package == packages::PHOTOS {
            ProfileKind::Oldest
        } else if self.rules.is_reference_device(device_codename) {
            return Decision::skip(SkipReason::GenuineDevice);
        } else if self.rules.is_flagship_target(package) {
            ProfileKind::Flagship
        } else {
            ProfileKind::Baseline
        };

        Decision::Apply(ApplyPlan {
            profile,
            exclusions: self.rules.exclusions_for(package),
            index_override: package == packages::SETTINGS_INTELLIGENCE,
        })
    }
}
