//! # checkop-checkly
//!
//! External sync adapter for the Checkly monitoring service.
//!
//! - [`mapping`]: pure translation of check, group and alert channel
//!   definitions into API payloads (defaults, tags, JSON body
//!   canonicalization, the should-fail heuristic)
//! - [`MonitoringApi`]: the create/update/delete surface, implemented over
//!   HTTP by [`ChecklyClient`]
//! - [`SyncAdapter`]: validation before any call, per-call timeout and
//!   cancellation, idempotent deletes

mod adapter;
mod client;
mod error;
pub mod mapping;
pub mod types;

pub use adapter::{DEFAULT_TIMEOUT, SyncAdapter};
pub use client::{ChecklyClient, DEFAULT_BASE_URL, MonitoringApi, classify_status};
pub use error::ApiError;
pub use mapping::{
    AlertChannelDefinition, CheckDefinition, GroupDefinition, OpsGenieTarget, WebhookTarget,
};
pub use types::{AlertChannelPayload, AlertChannelSubscription, CheckPayload, GroupPayload};
