//! Simulated platform for development and testing.
//!
//! In-memory stand-ins for the identity store, the foreground task observer
//! and the process info source. The CLI uses them to dry-run decisions and
//! the test suites use them to drive the gatekeeper deterministically.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::{Mutex, RwLock};
use pixelprops_core::error::{PropsError, Result};
use pixelprops_core::field::{BuildField, FieldValue};
use pixelprops_core::platform::{
    ComponentName, ForegroundChange, IdentityStore, ListenerAction, ProcessInfo, SubscriptionId,
    TaskListener, TaskObserver,
};

/// Identity store backed by a map. `INCREMENTAL` is read-only.
#[derive(Debug, Default)]
pub struct MemoryIdentityStore {
    fields: RwLock<HashMap<BuildField, FieldValue>>,
    rejected: RwLock<HashSet<BuildField>>,
}

impl MemoryIdentityStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a field without going through the write checks.
    pub fn with_field(self, field: BuildField, value: impl Into<FieldValue>) -> Self {
        self.fields.write().insert(field, value.into());
        self
    }

    /// Make every future write to `field` fail.
    pub fn reject(&self, field: BuildField) {
        self.rejected.write().insert(field);
    }

    /// Copy of all current values.
    pub fn snapshot(&self) -> HashMap<BuildField, FieldValue> {
        self.fields.read().clone()
    }
}

impl IdentityStore for MemoryIdentityStore {
    fn get(&self, field: BuildField) -> Option<FieldValue> {
        self.fields.read().get(&field).cloned()
    }

    fn set(&self, field: BuildField, value: FieldValue) -> Result<()> {
        if field == BuildField::Incremental {
            return Err(PropsError::ReadOnlyField(field));
        }
        if self.rejected.read().contains(&field) {
            return Err(PropsError::FieldRejected {
                field,
                reason: "rejected by simulated store".to_string(),
            });
        }
        self.fields.write().insert(field, value);
        Ok(())
    }
}

/// Task observer driven by hand.
///
/// [`ManualTaskObserver::move_to_front`] changes the top activity and
/// notifies every registered listener on the calling thread.
#[derive(Default)]
pub struct ManualTaskObserver {
    top: Mutex<Option<ComponentName>>,
    listeners: Mutex<Vec<(SubscriptionId, Arc<TaskListener>)>>,
    next_id: AtomicU64,
    fail_register: AtomicBool,
    fail_top_activity: AtomicBool,
}

impl ManualTaskObserver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make `register` fail from now on.
    pub fn fail_registration(&self, fail: bool) {
        self.fail_register.store(fail, Ordering::SeqCst);
    }

    /// Make `top_activity` fail from now on.
    pub fn fail_top_activity(&self, fail: bool) {
        self.fail_top_activity.store(fail, Ordering::SeqCst);
    }

    /// Set the top activity without notifying anyone.
    pub fn set_top_silently(&self, top: Option<ComponentName>) {
        *self.top.lock() = top;
    }

    /// Change the top activity and deliver one notification per listener.
    pub fn move_to_front(&self, top: Option<ComponentName>) {
        *self.top.lock() = top.clone();
        let change = ForegroundChange { top_activity: top };

        // Call listeners outside the lock so they may touch the observer.
        let listeners: Vec<(SubscriptionId, Arc<TaskListener>)> = self.listeners.lock().clone();
        let mut finished = Vec::new();
        for (id, listener) in listeners {
            if (**listener)(&change) == ListenerAction::Unsubscribe {
                finished.push(id);
            }
        }
        if !finished.is_empty() {
            self.listeners.lock().retain(|(id, _)| !finished.contains(id));
        }
    }

    pub fn listener_count(&self) -> usize {
        self.listeners.lock().len()
    }
}

impl TaskObserver for ManualTaskObserver {
    fn register(&self, listener: TaskListener) -> Result<SubscriptionId> {
        if self.fail_register.load(Ordering::SeqCst) {
            return Err(PropsError::ObserverError(
                "task stack listener registration refused".to_string(),
            ));
        }
        let id = SubscriptionId(self.next_id.fetch_add(1, Ordering::SeqCst));
        self.listeners.lock().push((id, Arc::new(listener)));
        Ok(id)
    }

    fn unregister(&self, id: SubscriptionId) -> Result<()> {
        self.listeners.lock().retain(|(existing, _)| *existing != id);
        Ok(())
    }

    fn top_activity(&self) -> Result<Option<ComponentName>> {
        if self.fail_top_activity.load(Ordering::SeqCst) {
            return Err(PropsError::ObserverError(
                "focused task unavailable".to_string(),
            ));
        }
        Ok(self.top.lock().clone())
    }
}

/// Process info with fixed answers.
#[derive(Debug, Clone, Default)]
pub struct StaticProcessInfo {
    pub process_name: String,
    pub call_stack: Vec<String>,
    pub uid_names: HashMap<u32, String>,
    pub properties: HashMap<String, String>,
}

impl StaticProcessInfo {
    pub fn new(process_name: impl Into<String>) -> Self {
        Self {
            process_name: process_name.into(),
            ..Default::default()
        }
    }

    pub fn with_property(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.properties.insert(key.into(), value.into());
        self
    }

    pub fn with_frame(mut self, class: impl Into<String>) -> Self {
        self.call_stack.push(class.into());
        self
    }

    pub fn with_uid(mut self, uid: u32, name: impl Into<String>) -> Self {
        self.uid_names.insert(uid, name.into());
        self
    }
}

impl ProcessInfo for StaticProcessInfo {
    fn process_name(&self) -> String {
        self.process_name.clone()
    }

    fn name_for_uid(&self, uid: u32) -> Option<String> {
        self.uid_names.get(&uid).cloned()
    }

    fn call_stack(&self) -> Vec<String> {
        self.call_stack.clone()
    }

    fn system_property(&self, key: &str) -> Option<String> {
        self.properties.get(key).cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_store_seed_and_read_only_incremental() {
        let store = MemoryIdentityStore::new().with_field(BuildField::Incremental, "10754064");
        assert_eq!(
            store.get(BuildField::Incremental),
            Some(FieldValue::from("10754064"))
        );
        assert!(matches!(
            store.set(BuildField::Incremental, FieldValue::from("1")),
            Err(PropsError::ReadOnlyField(BuildField::Incremental))
        ));
    }

    #[test]
    fn test_store_reject() {
        let store = MemoryIdentityStore::new();
        store.reject(BuildField::Model);
        assert!(store.set(BuildField::Model, FieldValue::from("x")).is_err());
        assert!(store.set(BuildField::Brand, FieldValue::from("x")).is_ok());
        assert_eq!(store.snapshot().len(), 1);
    }

    #[test]
    fn test_observer_notifies_and_drops_finished_listeners() {
        let observer = ManualTaskObserver::new();
        let hits = Arc::new(AtomicU64::new(0));
        let counter = Arc::clone(&hits);
        observer
            .register(Box::new(move |_| {
                counter.fetch_add(1, Ordering::SeqCst);
                ListenerAction::Unsubscribe
            }))
            .unwrap();
        assert_eq!(observer.listener_count(), 1);

        observer.move_to_front(Some(ComponentName::new("a", "a.Main")));
        observer.move_to_front(None);
        assert_eq!(hits.load(Ordering::SeqCst), 1);
        assert_eq!(observer.listener_count(), 0);
    }

    #[test]
    fn test_observer_unregister_and_failures() {
        let observer = ManualTaskObserver::new();
        let id = observer.register(Box::new(|_| ListenerAction::Keep)).unwrap();
        observer.unregister(id).unwrap();
        assert_eq!(observer.listener_count(), 0);

        observer.fail_registration(true);
        assert!(observer.register(Box::new(|_| ListenerAction::Keep)).is_err());

        observer.set_top_silently(Some(ComponentName::new("a", "a.Main")));
        assert!(observer.top_activity().unwrap().is_some());
        observer.fail_top_activity(true);
        assert!(observer.top_activity().is_err());
    }

    #[test]
    fn test_static_process_info() {
        let info = StaticProcessInfo::new("com.google.android.gms.unstable")
            .with_property("org.pixelexperience.device", "raven")
            .with_frame("com.google.ccc.abuse.droidguard.DroidGuard")
            .with_uid(10_100, "com.google.android.gms");
        assert_eq!(info.process_name(), "com.google.android.gms.unstable");
        assert_eq!(
            info.system_property("org.pixelexperience.device").as_deref(),
            Some("raven")
        );
        assert_eq!(info.call_stack().len(), 1);
        assert_eq!(info.name_for_uid(10_100).as_deref(), Some("com.google.android.gms"));
        assert!(info.name_for_uid(1).is_none());
    }
}
