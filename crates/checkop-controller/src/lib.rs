//! # checkop-controller
//!
//! Reconciliation engine keeping external monitoring checks in sync with
//! declared records.
//!
//! - [`route`]: derives checks from a route's rules and annotations and
//!   converges the checks it owns
//! - [`checks`], [`groups`], [`alert_channels`]: one external resource per
//!   record, guarded by a finalizer
//! - [`scheduler`]: work queue, retries and the controller run loop

pub mod alert_channels;
pub mod checks;
pub mod config;
pub mod dependency;
pub mod derive;
pub mod diff;
pub mod error;
pub mod groups;
pub mod lifecycle;
pub mod manifest;
pub mod observability;
pub mod route;
pub mod scheduler;

pub use alert_channels::AlertChannelReconciler;
pub use checks::CheckReconciler;
pub use config::OperatorConfig;
pub use error::{ReconcileError, ReconcileOutcome, ReconcileResult};
pub use groups::GroupReconciler;
pub use observability::init_tracing;
pub use route::{RouteReconciler, RouteSyncSummary};
pub use scheduler::{Controller, SchedulerOptions, WorkQueue};
