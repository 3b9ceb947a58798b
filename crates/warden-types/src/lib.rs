//! Warden Types - core types for the guild guard
//!
//! Warden watches administrative mutations on a guild, attributes them to an
//! actor through the audit trail, sanctions unauthorized actors and reverses
//! the damage. This crate holds the vocabulary shared by the engine and the
//! daemon.
//!
//! ## Key Concepts
//!
//! - **Snowflake IDs**: typed 64-bit identifiers for guilds, users, roles,
//!   channels and webhooks
//! - **MutationEvent**: one observed change with its before/after state
//! - **EventKind**: the fixed table mapping each kind to its audit action and
//!   reason label
//! - **AuditEntry**: the most recent audit record used for attribution
//! - **Models**: guild settings, channels, roles, members, overwrites

#![deny(unsafe_code)]
#![cfg_attr(feature = "strict-docs", warn(missing_docs))]
#![cfg_attr(not(feature = "strict-docs"), allow(missing_docs))]

pub mod audit;
pub mod events;
pub mod ids;
pub mod models;

pub use audit::{AuditAction, AuditEntry};
pub use events::{EventKind, Mutation, MutationEvent};
pub use ids::{ChannelId, GuildId, IdParseError, RoleId, Snowflake, UserId, WebhookId};
pub use models::{
    Channel, ChannelKind, GuildField, GuildSettings, Member, OverwriteKind, PermissionOverwrite,
    Permissions, Role,
};
