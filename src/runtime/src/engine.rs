//! Engine facade wiring catalog, classifier, gatekeeper and applier to the
//! platform.

use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;

use pixelprops_core::config::PropsConfig;
use pixelprops_core::error::Result;
use pixelprops_core::event::{events, EventEmitter, PropsEvent};
use pixelprops_core::field::BuildField;
use pixelprops_core::platform::{IdentityStore, ProcessInfo, TaskObserver};
use serde::Serialize;

use crate::applier::{Applier, ApplyReport};
use crate::catalog::{certified_profile, PackageRules, ProfileCatalog};
use crate::classifier::{Classification, Classifier, Decision};
use crate::context::ProcessContext;
use crate::gatekeeper::Gatekeeper;

/// Platform collaborators supplied by the host process.
#[derive(Clone)]
pub struct Platform {
    pub store: Arc<dyn IdentityStore>,
    pub observer: Arc<dyn TaskObserver>,
    pub process: Arc<dyn ProcessInfo>,
}

/// Result of [`PropsEngine::set_props`].
#[derive(Debug, Clone, Serialize)]
pub struct PropsOutcome {
    pub package: String,
    pub decision: Decision,
    pub report: ApplyReport,
}

/// The decision engine.
pub struct PropsEngine {
    platform: Platform,
    device_property: String,
    catalog: ProfileCatalog,
    classifier: Classifier,
    gatekeeper: Gatekeeper,
    applier: Applier,
    events: EventEmitter,
}

impl PropsEngine {
    /// Build the engine from configuration. Profiles are constructed here,
    /// once.
    pub fn new(config: &PropsConfig, platform: Platform, events: EventEmitter) -> Self {
        let certified = certified_profile(&config.certified());
        if certified.is_none() {
            tracing::debug!("No certified properties configured, certification writes nothing");
        }
        let gatekeeper = Gatekeeper::new(
            Arc::clone(&platform.store),
            Arc::clone(&platform.observer),
            Arc::clone(&platform.process),
            certified,
            events.clone(),
        );
        Self {
            platform,
            device_property: config.device_property.clone(),
            catalog: ProfileCatalog::default(),
            classifier: Classifier::new(PackageRules::default()),
            gatekeeper,
            applier: Applier,
            events,
        }
    }

    pub fn events(&self) -> &EventEmitter {
        &self.events
    }

    pub fn catalog(&self) -> &ProfileCatalog {
        &self.catalog
    }

    pub fn gatekeeper(&self) -> &Gatekeeper {
        &self.gatekeeper
    }

    /// Codename of the device we are running on, empty if unknown.
    pub fn device_codename(&self) -> String {
        self.platform
            .process
            .system_property(&self.device_property)
            .unwrap_or_default()
    }

    /// Decide and apply the identity for a starting package.
    ///
    /// The generic TYPE/TAGS override is always written first, whatever the
    /// package turns out to be.
    pub fn set_props(&self, ctx: &ProcessContext, package: &str) -> PropsOutcome {
        let store = self.platform.store.as_ref();
        let rules = self.classifier.rules();

        let mut report = self
            .applier
            .apply(store, rules.generic_override(), &BTreeSet::new());
        self.events.emit(PropsEvent::with_string(
            events::PROPS_GENERIC_APPLIED,
            package,
        ));

        let codename = self.device_codename();
        let Classification {
            decision,
            report: probe_report,
        } = self
            .classifier
            .classify(ctx, package, &codename, &self.gatekeeper);
        report.merge(probe_report);

        match &decision {
            Decision::Skip { reason } => {
                tracing::debug!(package, ?reason, "Not spoofing package");
                self.events
                    .emit(PropsEvent::with_string(events::PROPS_SKIPPED, package));
            }
            Decision::Certify => {
                tracing::debug!(package, "Process claimed for certification");
            }
            Decision::Apply(plan) => {
                let profile = self.catalog.get(plan.profile);
                tracing::debug!(package, profile = %profile.name, "Defining props");
                report.merge(self.applier.apply(store, &profile.fields, &plan.exclusions));

                if plan.index_override {
                    match store.get(BuildField::Incremental) {
                        Some(incremental) => report.merge(self.applier.apply_field(
                            store,
                            BuildField::Fingerprint,
                            incremental,
                        )),
                        None => tracing::warn!(package, "Build incremental unavailable"),
                    }
                }

                let mut payload = HashMap::new();
                payload.insert("package".to_string(), serde_json::json!(package));
                payload.insert("profile".to_string(), serde_json::json!(profile.name));
                self.events
                    .emit(PropsEvent::with_map(events::PROPS_PROFILE_APPLIED, payload));
            }
        }

        for (field, reason) in &report.failed {
            self.events.emit(PropsEvent::with_string(
                events::PROPS_FIELD_FAILED,
                format!("{}: {}", field, reason),
            ));
        }

        PropsOutcome {
            package: package.to_string(),
            decision,
            report,
        }
    }

    /// Guard for key attestation certificate chain requests.
    pub fn on_get_certificate_chain(&self, ctx: &ProcessContext) -> Result<()> {
        self.gatekeeper.guard_certificate_chain(ctx)
    }

    pub fn should_bypass_task_permission(&self, calling_uid: u32) -> bool {
        self.gatekeeper.should_bypass_task_permission(calling_uid)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{packages, ProfileKind, PIXEL_5A_FINGERPRINT, PIXEL_8_PRO_FINGERPRINT};
    use crate::classifier::SkipReason;
    use crate::simulate::{ManualTaskObserver, MemoryIdentityStore, StaticProcessInfo};
    use pixelprops_core::config::DEFAULT_DEVICE_PROPERTY;
    use pixelprops_core::field::FieldValue;

    fn fixture(device: &str, process: &str) -> (PropsEngine, Arc<MemoryIdentityStore>) {
        let store = Arc::new(MemoryIdentityStore::new().with_field(BuildField::Incremental, "9999"));
        let platform = Platform {
            store: store.clone(),
            observer: Arc::new(ManualTaskObserver::new()),
            process: Arc::new(
                StaticProcessInfo::new(process).with_property(DEFAULT_DEVICE_PROPERTY, device),
            ),
        };
        (
            PropsEngine::new(&PropsConfig::default(), platform, EventEmitter::new(32)),
            store,
        )
    }

    #[test]
    fn test_generic_override_always_applied() {
        let (engine, store) = fixture("beryllium", "org.mozilla.firefox");
        let ctx = ProcessContext::new();
        let outcome = engine.set_props(&ctx, "org.mozilla.firefox");
        assert_eq!(outcome.decision, Decision::Skip { reason: SkipReason::NotEligible });
        assert_eq!(store.get(BuildField::Type), Some(FieldValue::from("user")));
        assert_eq!(store.get(BuildField::Tags), Some(FieldValue::from("release-keys")));
        assert!(store.get(BuildField::Model).is_none());
    }

    #[test]
    fn test_generic_override_with_empty_package() {
        let (engine, store) = fixture("beryllium", "app");
        let outcome = engine.set_props(&ProcessContext::new(), "");
        assert_eq!(outcome.decision, Decision::Skip { reason: SkipReason::EmptyPackage });
        assert_eq!(store.get(BuildField::Tags), Some(FieldValue::from("release-keys")));
    }

    #[test]
    fn test_flagship_profile_written() {
        let (engine, store) = fixture("beryllium", "com.google.android.apps.wallpaper");
        let outcome = engine.set_props(&ProcessContext::new(), "com.google.android.apps.wallpaper");
        match outcome.decision {
            Decision::Apply(ref plan) => assert_eq!(plan.profile, ProfileKind::Flagship),
            ref other => panic!("unexpected decision: {:?}", other),
        }
        assert_eq!(
            store.get(BuildField::Fingerprint),
            Some(FieldValue::from(PIXEL_8_PRO_FINGERPRINT))
        );
        assert!(outcome.report.is_complete());
    }

    #[test]
    fn test_index_override_uses_real_incremental() {
        let (engine, store) = fixture("beryllium", packages::SETTINGS_INTELLIGENCE);
        let outcome = engine.set_props(&ProcessContext::new(), packages::SETTINGS_INTELLIGENCE);
        assert_eq!(store.get(BuildField::Fingerprint), Some(FieldValue::from("9999")));
        assert_eq!(store.get(BuildField::Model), Some(FieldValue::from("Pixel 5a")));
        assert!(outcome.report.excluded.contains(&BuildField::Fingerprint));
    }

    #[test]
    fn test_failed_fields_reported_and_emitted() {
        let (engine, store) = fixture("beryllium", "com.android.chrome");
        store.reject(BuildField::Brand);
        let mut rx = engine.events().subscribe();
        let outcome = engine.set_props(&ProcessContext::new(), "com.android.chrome");
        assert_eq!(outcome.report.failed.len(), 1);
        assert_eq!(
            store.get(BuildField::Fingerprint),
            Some(FieldValue::from(PIXEL_5A_FINGERPRINT))
        );
        let keys: Vec<String> = std::iter::from_fn(|| rx.try_recv().ok())
            .map(|e| e.key)
            .collect();
        assert!(keys.contains(&events::PROPS_FIELD_FAILED.to_string()));
        assert!(keys.contains(&events::PROPS_PROFILE_APPLIED.to_string()));
    }

    #[test]
    fn test_certify_outcome_reports_certified_writes() {
        let store = Arc::new(MemoryIdentityStore::new());
        store.reject(BuildField::Manufacturer);
        let platform = Platform {
            store: store.clone(),
            observer: Arc::new(ManualTaskObserver::new()),
            process: Arc::new(StaticProcessInfo::new("com.google.android.gms.unstable")),
        };
        let mut certified_props = vec![String::new(); 11];
        certified_props[2] = "Google".to_string();
        certified_props[4] = "Pixel 5a".to_string();
        certified_props[5] = PIXEL_5A_FINGERPRINT.to_string();
        let config = PropsConfig {
            certified_props,
            ..PropsConfig::default()
        };
        let engine = PropsEngine::new(&config, platform, EventEmitter::new(32));

        let outcome = engine.set_props(&ProcessContext::new(), packages::GMS);
        assert_eq!(outcome.decision, Decision::Certify);
        for field in [BuildField::Type, BuildField::Time, BuildField::Model, BuildField::Fingerprint] {
            assert!(outcome.report.applied.contains(&field), "{field} missing");
        }
        assert_eq!(outcome.report.failed.len(), 1);
        assert_eq!(outcome.report.failed[0].0, BuildField::Manufacturer);
    }

    #[test]
    fn test_device_codename_from_property() {
        let (engine, _) = fixture("raven", "x");
        assert_eq!(engine.device_codename(), "raven");
    }
}
