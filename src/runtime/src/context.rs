//! Per-process caller context.
//!
//! One [`ProcessContext`] is built when the process starts and passed by
//! reference into every engine operation. The caller flags latch the first
//! time the matching package is seen and are never cleared.

use std::sync::atomic::{AtomicBool, Ordering};

use serde::Serialize;

use crate::catalog::packages;

/// Latched flags naming the privileged package running in this process.
#[derive(Debug, Default)]
pub struct CallerState {
    gms: AtomicBool,
    store: AtomicBool,
    setup_wizard: AtomicBool,
}

impl CallerState {
    /// Latch the flag matching `package`, if any. Returns true when a flag matched.
    pub fn observe(&self, package: &str) -> bool {
        let flag = match package {
            packages::STORE => &self.store,
            packages::GMS => &self.gms,
            packages::SETUP_WIZARD => &self.setup_wizard,
            _ => return false,
        };
        flag.store(true, Ordering::Release);
        true
    }

    pub fn is_gms(&self) -> bool {
        self.gms.load(Ordering::Acquire)
    }

    pub fn is_store(&self) -> bool {
        self.store.load(Ordering::Acquire)
    }

    pub fn is_setup_wizard(&self) -> bool {
        self.setup_wizard.load(Ordering::Acquire)
    }

    pub fn snapshot(&self) -> CallerSnapshot {
        CallerSnapshot {
            gms: self.is_gms(),
            store: self.is_store(),
            setup_wizard: self.is_setup_wizard(),
        }
    }
}

/// Point-in-time copy of [`CallerState`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CallerSnapshot {
    pub gms: bool,
    pub store: bool,
    pub setup_wizard: bool,
}

/// Process-lifetime context shared by every engine call.
#[derive(Debug, Default)]
pub struct ProcessContext {
    pub caller: CallerState,
}

impl ProcessContext {
    pub fn new() -> Self {
        Self::default()
    }
}
