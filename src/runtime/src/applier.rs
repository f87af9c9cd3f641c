//! Writes resolved field sets into the platform identity store.
//!
//! Every field is written on its own. A rejected field is logged and
//! recorded; the remaining fields are still attempted and nothing is rolled
//! back.

use std::collections::BTreeSet;

use pixelprops_core::field::{BuildField, FieldValue, IdentityFieldSet};
use pixelprops_core::platform::IdentityStore;
use serde::Serialize;

/// Outcome of one [`Applier::apply`] call.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ApplyReport {
    /// Fields written successfully
    pub applied: Vec<BuildField>,
    /// Fields withheld by a package exclusion
    pub excluded: Vec<BuildField>,
    /// Fields the store rejected, with the reason
    pub failed: Vec<(BuildField, String)>,
}

impl ApplyReport {
    pub fn is_complete(&self) -> bool {
        self.failed.is_empty()
    }

    /// Fold another report into this one.
    pub fn merge(&mut self, other: ApplyReport) {
        self.applied.extend(other.applied);
        self.excluded.extend(other.excluded);
        self.failed.extend(other.failed);
    }
}

/// Stateless field writer.
#[derive(Debug, Default, Clone, Copy)]
pub struct Applier;

impl Applier {
    /// Write every field of `set` not listed in `exclusions`.
    pub fn apply(
        &self,
        store: &dyn IdentityStore,
        set: &IdentityFieldSet,
        exclusions: &BTreeSet<BuildField>,
    ) -> ApplyReport {
        let mut report = ApplyReport::default();
        for (field, value) in set.iter() {
            if exclusions.contains(&field) {
                tracing::debug!(field = %field, "Field excluded, not defining");
                report.excluded.push(field);
                continue;
            }
            self.write(store, field, value.clone(), &mut report);
        }
        report
    }

    /// Write a single field, recording the outcome.
    pub fn apply_field(
        &self,
        store: &dyn IdentityStore,
        field: BuildField,
        value: FieldValue,
    ) -> ApplyReport {
        let mut report = ApplyReport::default();
        self.write(store, field, value, &mut report);
        report
    }

    fn write(
        &self,
        store: &dyn IdentityStore,
        field: BuildField,
        value: FieldValue,
        report: &mut ApplyReport,
    ) {
        tracing::trace!(field = %field, value = %value, "Defining field");
        match store.set(field, value) {
            Ok(()) => report.applied.push(field),
            Err(e) => {
                tracing::warn!(field = %field, error = %e, "Failed to define field");
                report.failed.push((field, e.to_string()));
            }
        }
    }
}
