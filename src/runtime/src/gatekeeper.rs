//! Certification gatekeeper.
//!
//! Decides whether the certified reference identity may stand in for the
//! real one while an attestation-sensitive caller runs, and whether key
//! attestation must be refused outright.
//!
//! Each check runs a fresh probe session:
//!
//! ```text
//! Idle --begin--> Probing --finish--> Certified
//!                    |                   |
//!                    +--flip--> Declined <--flip--+
//! ```
//!
//! A "flip" is a foreground change after which the account-linking activity
//! is on top when it was not at probe time, or the reverse. `Declined` is
//! absorbing. Verdicts are per call; the next check starts from `Idle` again.

use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use pixelprops_core::error::{PropsError, Result};
use pixelprops_core::event::{events, EventEmitter, PropsEvent};
use pixelprops_core::field::{BuildField, FieldValue};
use pixelprops_core::platform::{
    ComponentName, IdentityStore, ListenerAction, ProcessInfo, SubscriptionId, TaskListener,
    TaskObserver,
};
use serde::Serialize;
use uuid::Uuid;

use crate::applier::{Applier, ApplyReport};
use crate::catalog::SpoofProfile;
use crate::context::ProcessContext;

/// Account-linking activity whose presence on top disables certification.
pub const ACCOUNT_LINKING_ACTIVITY: &str =
    "com.google.android.gms/.auth.uiflows.minutemaid.MinuteMaidActivity";

/// [`ACCOUNT_LINKING_ACTIVITY`] as a component.
pub fn account_linking_activity() -> ComponentName {
    ComponentName::new(
        "com.google.android.gms",
        "com.google.android.gms.auth.uiflows.minutemaid.MinuteMaidActivity",
    )
}

/// Process name fragments marking an attestation-capable GMS process.
pub const ATTESTATION_PROCESS_MARKERS: &[&str] = &["unstable", "pixelmigrate", "instrumentation"];

/// Call stack fragment identifying the integrity attestation library.
pub const INTEGRITY_STACK_MARKER: &str = "droidguard";

/// Probe session state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
#[repr(u8)]
pub enum GatekeeperState {
    Idle = 0,
    Probing = 1,
    Certified = 2,
    Declined = 3,
}

/// Inputs to the session state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GatekeeperEvent {
    /// Probe preconditions met, session starts
    Begin,
    /// Foreground task changed
    ForegroundChanged { was: bool, is_now: bool },
    /// Caller proceeds with the decision
    Finish,
}

impl GatekeeperState {
    fn from_u8(value: u8) -> Self {
        match value {
            0 => Self::Idle,
            1 => Self::Probing,
            2 => Self::Certified,
            _ => Self::Declined,
        }
    }

    /// Pure transition function.
    pub fn next(self, event: GatekeeperEvent) -> Self {
        use GatekeeperEvent::*;
        use GatekeeperState::*;

        match (self, event) {
            (Declined, _) => Declined,
            (Idle, Begin) => Probing,
            (Probing | Certified, ForegroundChanged { was, is_now }) if was != is_now => Declined,
            (Probing, Finish) => Certified,
            (state, _) => state,
        }
    }
}

/// Answer to a certification check.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Verdict {
    Certified,
    Declined,
}

impl Verdict {
    pub fn is_certified(self) -> bool {
        self == Verdict::Certified
    }
}

/// Verdict of one probe plus the identity writes it made.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Certification {
    pub verdict: Verdict,
    /// TIME and certified field writes, including failures
    pub report: ApplyReport,
}

/// State shared between a session and its foreground listener.
#[derive(Debug)]
struct SessionShared {
    state: AtomicU8,
}

impl SessionShared {
    fn state(&self) -> GatekeeperState {
        GatekeeperState::from_u8(self.state.load(Ordering::Acquire))
    }

    /// Apply `event` atomically, returning (before, after).
    fn advance(&self, event: GatekeeperEvent) -> (GatekeeperState, GatekeeperState) {
        let mut current = self.state.load(Ordering::Acquire);
        loop {
            let before = GatekeeperState::from_u8(current);
            let after = before.next(event);
            match self.state.compare_exchange_weak(
                current,
                after as u8,
                Ordering::AcqRel,
                Ordering::Acquire,
            ) {
                Ok(_) => return (before, after),
                Err(actual) => current = actual,
            }
        }
    }
}

/// One certification probe.
///
/// Created by [`Gatekeeper::begin_probe`] in `Probing`; consumed by
/// [`GatekeeperSession::finish`]. Dropping an unfinished session cancels its
/// foreground subscription.
pub struct GatekeeperSession {
    id: Uuid,
    was_on_top: bool,
    shared: Arc<SessionShared>,
    subscription: Mutex<Option<SubscriptionId>>,
    observer: Arc<dyn TaskObserver>,
    report: ApplyReport,
}

impl GatekeeperSession {
    pub fn id(&self) -> Uuid {
        self.id
    }

    /// Whether the account-linking activity was on top when probing began.
    pub fn was_on_top(&self) -> bool {
        self.was_on_top
    }

    pub fn state(&self) -> GatekeeperState {
        self.shared.state()
    }

    /// Whether the foreground listener is still registered by this session.
    pub fn is_subscribed(&self) -> bool {
        self.subscription.lock().is_some()
    }

    /// Writes made while starting the probe.
    pub fn report(&self) -> &ApplyReport {
        &self.report
    }

    fn cancel(&self) {
        if let Some(id) = self.subscription.lock().take() {
            if let Err(e) = self.observer.unregister(id) {
                tracing::debug!(session = %self.id, error = %e, "Failed to unregister task listener");
            }
        }
    }

    /// Settle the session. A still-probing session becomes `Certified` and
    /// its foreground subscription is cancelled.
    pub fn finish(self) -> Verdict {
        let (_, after) = self.shared.advance(GatekeeperEvent::Finish);
        self.cancel();
        match after {
            GatekeeperState::Certified => Verdict::Certified,
            _ => Verdict::Declined,
        }
    }
}

impl Drop for GatekeeperSession {
    fn drop(&mut self) {
        self.cancel();
    }
}

impl std::fmt::Debug for GatekeeperSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GatekeeperSession")
            .field("id", &self.id)
            .field("was_on_top", &self.was_on_top)
            .field("state", &self.state())
            .finish()
    }
}

/// Certification gatekeeper.
pub struct Gatekeeper {
    store: Arc<dyn IdentityStore>,
    observer: Arc<dyn TaskObserver>,
    process: Arc<dyn ProcessInfo>,
    certified: Option<SpoofProfile>,
    account_activity: ComponentName,
    applier: Applier,
    events: EventEmitter,
}

impl Gatekeeper {
    pub fn new(
        store: Arc<dyn IdentityStore>,
        observer: Arc<dyn TaskObserver>,
        process: Arc<dyn ProcessInfo>,
        certified: Option<SpoofProfile>,
        events: EventEmitter,
    ) -> Self {
        Self {
            store,
            observer,
            process,
            certified,
            account_activity: account_linking_activity(),
            applier: Applier,
            events,
        }
    }

    /// The certified profile in use, if configured.
    pub fn certified_profile(&self) -> Option<&SpoofProfile> {
        self.certified.as_ref()
    }

    fn is_attestation_process(&self) -> bool {
        let name = self.process.process_name().to_lowercase();
        ATTESTATION_PROCESS_MARKERS.iter().any(|m| name.contains(m))
    }

    fn is_account_activity_on_top(&self) -> bool {
        match self.observer.top_activity() {
            Ok(top) => top.as_ref() == Some(&self.account_activity),
            Err(e) => {
                tracing::error!(error = %e, "Unable to get top activity");
                false
            }
        }
    }

    /// Write the certified profile into the identity store.
    ///
    /// Does nothing when no certified values are configured.
    pub fn certify_device(&self) -> ApplyReport {
        match &self.certified {
            Some(profile) => {
                tracing::debug!(profile = %profile.name, "Applying certified profile");
                self.applier
                    .apply(self.store.as_ref(), &profile.fields, &Default::default())
            }
            None => {
                tracing::debug!("No certified properties configured");
                ApplyReport::default()
            }
        }
    }

    /// Start a probe session, or `None` when this process is not eligible
    /// for certification at all.
    pub fn begin_probe(&self, ctx: &ProcessContext) -> Option<GatekeeperSession> {
        if !ctx.caller.is_gms() || !self.is_attestation_process() {
            return None;
        }

        let shared = Arc::new(SessionShared {
            state: AtomicU8::new(GatekeeperState::Idle as u8),
        });
        shared.advance(GatekeeperEvent::Begin);
        let id = Uuid::new_v4();

        let mut report = self.applier.apply_field(
            self.store.as_ref(),
            BuildField::Time,
            FieldValue::Int(chrono::Utc::now().timestamp_millis()),
        );

        let was = self.is_account_activity_on_top();
        if !was {
            report.merge(self.certify_device());
        } else {
            tracing::debug!(session = %id, "Account linking activity on top, not certifying");
        }
        self.events.emit(PropsEvent::with_string(
            events::GATEKEEPER_PROBING,
            self.process.process_name(),
        ));

        let listener = self.foreground_listener(id, was, Arc::clone(&shared));
        let subscription = match self.observer.register(listener) {
            Ok(sub) => Some(sub),
            Err(e) => {
                tracing::error!(session = %id, error = %e, "Failed to register task stack listener");
                report.merge(self.certify_device());
                None
            }
        };

        Some(GatekeeperSession {
            id,
            was_on_top: was,
            shared,
            subscription: Mutex::new(subscription),
            observer: Arc::clone(&self.observer),
            report,
        })
    }

    fn foreground_listener(&self, id: Uuid, was: bool, shared: Arc<SessionShared>) -> TaskListener {
        let target = self.account_activity.clone();
        let emitter = self.events.clone();
        Box::new(move |change| {
            let is_now = change.top_activity.as_ref() == Some(&target);
            let (before, after) = shared.advance(GatekeeperEvent::ForegroundChanged { was, is_now });
            if after != GatekeeperState::Declined {
                return ListenerAction::Keep;
            }
            if before != GatekeeperState::Declined {
                tracing::debug!(session = %id, is_now, was, "Account linking activity changed, declining");
                emitter.emit(PropsEvent::with_string(
                    events::GATEKEEPER_DECLINED,
                    id.to_string(),
                ));
            }
            ListenerAction::Unsubscribe
        })
    }

    /// Run a full probe and settle it.
    pub fn certify(&self, ctx: &ProcessContext) -> Certification {
        let Some(session) = self.begin_probe(ctx) else {
            return Certification {
                verdict: Verdict::Declined,
                report: ApplyReport::default(),
            };
        };
        let id = session.id();
        let report = session.report().clone();
        let verdict = session.finish();
        if verdict.is_certified() {
            self.events.emit(PropsEvent::with_string(
                events::GATEKEEPER_CERTIFIED,
                id.to_string(),
            ));
        }
        Certification { verdict, report }
    }

    /// Verdict of a full probe.
    pub fn should_certify(&self, ctx: &ProcessContext) -> Verdict {
        self.certify(ctx).verdict
    }

    fn is_integrity_caller(&self, ctx: &ProcessContext) -> bool {
        ctx.caller.is_gms()
            && self
                .process
                .call_stack()
                .iter()
                .any(|frame| frame.to_lowercase().contains(INTEGRITY_STACK_MARKER))
    }

    /// Guard run before the key store hands out a certificate chain.
    ///
    /// Returns [`PropsError::AttestationBlocked`] when an integrity check or
    /// the store is asking while certification is in effect. Callers must
    /// propagate the error and abort the attestation.
    pub fn guard_certificate_chain(&self, ctx: &ProcessContext) -> Result<()> {
        let caller = ctx.caller.snapshot();
        let sensitive = self.is_integrity_caller(ctx) || caller.store;
        if sensitive && !caller.setup_wizard && self.should_certify(ctx).is_certified() {
            tracing::debug!(gms = caller.gms, store = caller.store, "Blocked key attestation");
            self.events.emit(PropsEvent::with_string(
                events::ATTESTATION_BLOCKED,
                self.process.process_name(),
            ));
            return Err(PropsError::AttestationBlocked {
                gms: caller.gms,
                store: caller.store,
            });
        }
        Ok(())
    }

    /// Whether the calling uid may read the focused task without holding
    /// the task management permission. Google packages only.
    pub fn should_bypass_task_permission(&self, calling_uid: u32) -> bool {
        let caller = self.process.name_for_uid(calling_uid);
        tracing::debug!(uid = calling_uid, caller = ?caller, "Checking task permission bypass");
        caller
            .map(|name| name.to_lowercase().contains("google"))
            .unwrap_or(false)
    }
}
