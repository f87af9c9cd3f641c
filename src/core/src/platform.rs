//! Seams to the platform that hosts the engine.
//!
//! None of these are implemented here. The host process supplies an
//! identity store, a foreground task observer and a process info source;
//! `pixelprops_runtime::simulate` carries in-memory versions for tests.

use crate::error::{PropsError, Result};
use crate::field::{BuildField, FieldValue};
use serde::{Deserialize, Serialize};

/// Process-global, mutable device identity store.
pub trait IdentityStore: Send + Sync {
    /// Current value of a field, if the platform exposes one.
    fn get(&self, field: BuildField) -> Option<FieldValue>;

    /// Overwrite a field. Errors stay local to that field.
    fn set(&self, field: BuildField, value: FieldValue) -> Result<()>;
}

/// Fully qualified activity component (`package/class`).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ComponentName {
    pub package: String,
    pub class: String,
}

impl ComponentName {
    pub fn new(package: impl Into<String>, class: impl Into<String>) -> Self {
        Self {
            package: package.into(),
            class: class.into(),
        }
    }

    /// Parse the flattened `package/class` form. A class starting with `.`
    /// is relative to the package.
    pub fn unflatten(s: &str) -> Option<Self> {
        let (package, class) = s.split_once('/')?;
        if package.is_empty() || class.is_empty() {
            return None;
        }
        let class = if class.starts_with('.') {
            format!("{}{}", package, class)
        } else {
            class.to_string()
        };
        Some(Self::new(package, class))
    }
}

impl std::fmt::Display for ComponentName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.package, self.class)
    }
}

impl std::str::FromStr for ComponentName {
    type Err = PropsError;

    fn from_str(s: &str) -> Result<Self> {
        Self::unflatten(s)
            .ok_or_else(|| PropsError::Other(format!("invalid component name: '{}'", s)))
    }
}

/// Handle returned by [`TaskObserver::register`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SubscriptionId(pub u64);

/// Foreground task change delivered to listeners.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ForegroundChange {
    /// Top activity of the focused task after the change
    pub top_activity: Option<ComponentName>,
}

/// What the observer should do with a listener after invoking it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ListenerAction {
    Keep,
    Unsubscribe,
}

/// Callback invoked on the observer's own notification thread.
pub type TaskListener = Box<dyn Fn(&ForegroundChange) -> ListenerAction + Send + Sync>;

/// Foreground task notification source.
pub trait TaskObserver: Send + Sync {
    /// Register a listener, invoked at most once per foreground change.
    fn register(&self, listener: TaskListener) -> Result<SubscriptionId>;

    /// Drop a listener. Unknown ids are ignored.
    fn unregister(&self, id: SubscriptionId) -> Result<()>;

    /// Top activity of the focused task right now.
    fn top_activity(&self) -> Result<Option<ComponentName>>;
}

/// Identity of the running process and its callers.
pub trait ProcessInfo: Send + Sync {
    /// Name of the current process (e.g. `com.google.android.gms.unstable`).
    fn process_name(&self) -> String;

    /// Package name registered for a uid.
    fn name_for_uid(&self, uid: u32) -> Option<String>;

    /// Class names on the current call stack, innermost first.
    fn call_stack(&self) -> Vec<String>;

    /// Read a system property.
    fn system_property(&self, key: &str) -> Option<String>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unflatten_relative_class() {
        let name = ComponentName::unflatten(
            "com.google.android.gms/.auth.uiflows.minutemaid.MinuteMaidActivity",
        )
        .unwrap();
        assert_eq!(name.package, "com.google.android.gms");
        assert_eq!(
            name.class,
            "com.google.android.gms.auth.uiflows.minutemaid.MinuteMaidActivity"
        );
    }

    #[test]
    fn test_unflatten_absolute_class() {
        let name = ComponentName::unflatten("com.example/org.other.Main").unwrap();
        assert_eq!(name.class, "org.other.Main");
        assert_eq!(name.to_string(), "com.example/org.other.Main");
    }

    #[test]
    fn test_unflatten_rejects_malformed() {
        assert!(ComponentName::unflatten("no-slash").is_none());
        assert!(ComponentName::unflatten("/.Main").is_none());
        assert!(ComponentName::unflatten("pkg/").is_none());
        assert!("pkg".parse::<ComponentName>().is_err());
    }

    #[test]
    fn test_relative_and_absolute_forms_compare_equal() {
        let a = ComponentName::unflatten("com.example/.Main").unwrap();
        let b = ComponentName::unflatten("com.example/com.example.Main").unwrap();
        assert_eq!(a, b);
    }
}
