//! PixelProps Core - Identity Field Model and Platform Seams
//!
//! This crate provides the field model, configuration, error type, decision
//! events and the traits the host platform implements for the engine in
//! `pixelprops-runtime`.

pub mod config;
pub mod error;
pub mod event;
pub mod field;
pub mod platform;

// Re-export commonly used types
pub use config::{CertifiedProps, LogLevel, PropsConfig};
pub use error::{PropsError, Result};
pub use event::{EventEmitter, PropsEvent};
pub use field::{BuildField, FieldValue, IdentityFieldSet};
pub use platform::{
    ComponentName, ForegroundChange, IdentityStore, ListenerAction, ProcessInfo, SubscriptionId,
    TaskListener, TaskObserver,
};

/// PixelProps version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
