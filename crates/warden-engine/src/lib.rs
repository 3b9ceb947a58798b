//! Warden Engine - the guard's decision and repair logic
//!
//! For every observed mutation the engine:
//!
//! 1. **Attributes** it to an actor through the most recent audit entry
//! 2. **Counts** the offense against the actor's strike window
//! 3. **Punishes** the actor once tolerance runs out (jail or ban)
//! 4. **Reverses** the mutation, independently of whether anyone was punished
//!
//! Role deletions are special: the role is recreated under a new ID and its
//! former holders are re-granted it in small batches from the
//! [`ContinuityQueue`], using the role snapshots to remember who they were.
//!
//! All platform access goes through the [`Platform`] trait so the engine can
//! run against the real API or against [`MemoryPlatform`].

#![deny(unsafe_code)]

pub mod attribution;
pub mod config;
pub mod continuity;
pub mod error;
pub mod guard;
pub mod notify;
pub mod platform;
pub mod punish;
pub mod reconcile;
pub mod snapshot;
pub mod strikes;

pub use attribution::{AttributionResolver, AttributionResult, Verdict};
pub use config::GuardConfig;
pub use continuity::{ContinuityQueue, RoleContinuityEntry};
pub use error::{NotifyError, PlatformError, PlatformResult};
pub use guard::{BatchReport, Guard, GuardState, GuardStatus, HandleReport, Ignored};
pub use notify::{MemorySink, NoopSink, NotificationSink, PunishmentAction, PunishmentRecord};
pub use platform::{MemoryPlatform, Platform, PlatformCall};
pub use punish::Punisher;
pub use reconcile::{OutcomeStatus, ReconcileReport, Reconciler, ReversalOutcome};
pub use snapshot::{
    ChannelOverwrite, RoleChannelPermissionSnapshot, RoleHolders, RoleMembershipSnapshot,
    SnapshotCache,
};
pub use strikes::{StrikeDecision, StrikeRecord, StrikeTracker};
