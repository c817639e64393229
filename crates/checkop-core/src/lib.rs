//! # checkop-core
//!
//! Record types and shared primitives for the checkop controller.
//!
//! The controller keeps externally hosted monitoring checks in sync with
//! locally declared records. This crate holds everything the other crates
//! agree on:
//!
//! - the declared record kinds ([`ManagedCheck`], [`CheckGroup`],
//!   [`AlertChannel`], [`Route`], [`Secret`]) and their [`ObjectMeta`]
//! - the [`Record`] trait used by typed storage access
//! - the [`ControllerDomain`] that namespaces finalizer and annotation keys
//! - the pure default-resolution helpers in [`defaults`]

pub mod defaults;
pub mod domain;
pub mod error;
pub mod kind;
pub mod meta;
pub mod records;

pub use domain::{AnnotationKey, ControllerDomain};
pub use error::{CoreError, Result};
pub use kind::{RecordKey, RecordKind};
pub use meta::{ObjectMeta, OwnerReference};
pub use records::{
    AlertChannel, AlertChannelSpec, AlertChannelStatus, Assertion, AssertionComparison,
    AssertionSource, CheckGroup, CheckSpec, CheckStatus, EmailChannel, GroupSpec, GroupStatus,
    KeyValue, ManagedCheck, OpsGenieChannel, Record, Route, RouteRule, RouteSpec, Secret,
    SecretKeyRef, WebhookChannel,
};
