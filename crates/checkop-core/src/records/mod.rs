//! Typed declared records.
//!
//! A record serializes to `{ "metadata", "spec", "status" }`; the `kind`
//! discriminator is owned by the storage layer and is not part of the
//! typed structs.

use serde::Serialize;
use serde::de::DeserializeOwned;

use crate::kind::{RecordKey, RecordKind};
use crate::meta::ObjectMeta;

macro_rules! impl_record {
    ($ty:ty, $kind:expr) => {
        impl $crate::records::Record for $ty {
            const KIND: $crate::kind::RecordKind = $kind;

            fn meta(&self) -> &$crate::meta::ObjectMeta {
                &self.metadata
            }

            fn meta_mut(&mut self) -> &mut $crate::meta::ObjectMeta {
                &mut self.metadata
            }
        }
    };
}

mod alert_channel;
mod check;
mod group;
mod route;
mod secret;

pub use alert_channel::{
    AlertChannel, AlertChannelSpec, AlertChannelStatus, EmailChannel, KeyValue, OpsGenieChannel,
    SecretKeyRef, WebhookChannel,
};
pub use check::{
    Assertion, AssertionComparison, AssertionSource, CheckSpec, CheckStatus, ManagedCheck,
};
pub use group::{CheckGroup, GroupSpec, GroupStatus};
pub use route::{Route, RouteRule, RouteSpec};
pub use secret::Secret;

/// A typed record that can be stored and reconciled.
pub trait Record: Serialize + DeserializeOwned + Clone + Send + Sync + 'static {
    const KIND: RecordKind;

    fn meta(&self) -> &ObjectMeta;

    fn meta_mut(&mut self) -> &mut ObjectMeta;

    fn key(&self) -> RecordKey {
        let meta = self.meta();
        RecordKey::new(Self::KIND, meta.namespace.as_deref(), meta.name.clone())
    }
}
