//! Type-erased kind access
//!
//! Generic callers (graph traversal across heterogeneous kinds, garbage
//! collection of orphaned children) cannot be statically typed per kind.
//! They obtain an `AnonymousApi` for a Group/Version/Kind and work with
//! JSON values at the boundary; the concrete type check happens exactly
//! once, when an externally supplied value is decoded into the kind the
//! accessor was obtained for.

use async_trait::async_trait;
use kube::api::Patch;
use serde::de::DeserializeOwned;
use serde::Serialize;

use shoal_common::{Error, Result};

use crate::kinds::ObjectKind;
use crate::mod_client::ModClient;
use crate::snapshot::KindView;

/// Capability-erased access to one cached kind.
#[async_trait]
pub trait AnonymousApi: Send + Sync {
    /// The kind this accessor serves.
    fn kind(&self) -> ObjectKind;

    /// Read one cached object by name, serialized to JSON.
    fn get(&self, name: &str) -> Result<serde_json::Value>;

    /// Names of every cached object of this kind.
    fn names(&self) -> Vec<String>;

    /// Create an object from its JSON form.
    async fn create(&self, obj: serde_json::Value) -> Result<serde_json::Value>;

    /// Replace an object from its JSON form.
    async fn update(&self, obj: serde_json::Value) -> Result<serde_json::Value>;

    /// Replace an object's status subresource from its JSON form.
    async fn update_status(&self, obj: serde_json::Value) -> Result<serde_json::Value>;

    /// Patch an object by patch-type and payload.
    async fn patch(&self, name: &str, patch: &Patch<serde_json::Value>)
        -> Result<serde_json::Value>;

    /// Delete an object, optionally with an explicit grace period.
    async fn delete(&self, name: &str, grace_period_seconds: Option<u32>) -> Result<()>;
}

/// The typed backing of one anonymous accessor.
pub(crate) struct AnonymousFor<K> {
    view: KindView<K>,
    client: ModClient<K>,
}

impl<K> AnonymousFor<K>
where
    K: Serialize + DeserializeOwned + Send + Sync,
{
    pub(crate) fn new(view: KindView<K>, client: ModClient<K>) -> Self {
        Self { view, client }
    }

    fn encode(&self, obj: &K) -> Result<serde_json::Value> {
        serde_json::to_value(obj).map_err(|e| {
            Error::serialization_for_kind(self.view.kind().kind_str(), e.to_string())
        })
    }

    /// Decode an externally supplied value into this accessor's kind. The
    /// single place a concrete-type mismatch can surface.
    fn decode(&self, obj: serde_json::Value) -> Result<K> {
        serde_json::from_value(obj)
            .map_err(|e| Error::invalid_type(self.view.kind().kind_str(), e.to_string()))
    }
}

#[async_trait]
impl<K> AnonymousApi for AnonymousFor<K>
where
    K: Serialize + DeserializeOwned + Send + Sync,
{
    fn kind(&self) -> ObjectKind {
        self.view.kind()
    }

    fn get(&self, name: &str) -> Result<serde_json::Value> {
        let obj = self.view.get_simple(name)?;
        self.encode(&obj)
    }

    fn names(&self) -> Vec<String> {
        self.view.names()
    }

    async fn create(&self, obj: serde_json::Value) -> Result<serde_json::Value> {
        let obj = self.decode(obj)?;
        let created = self.client.create(&obj).await?;
        self.encode(&created)
    }

    async fn update(&self, obj: serde_json::Value) -> Result<serde_json::Value> {
        let obj = self.decode(obj)?;
        let updated = self.client.update(&obj).await?;
        self.encode(&updated)
    }

    async fn update_status(&self, obj: serde_json::Value) -> Result<serde_json::Value> {
        let obj = self.decode(obj)?;
        let updated = self.client.update_status(&obj).await?;
        self.encode(&updated)
    }

    async fn patch(
        &self,
        name: &str,
        patch: &Patch<serde_json::Value>,
    ) -> Result<serde_json::Value> {
        let patched = self.client.patch(name, patch).await?;
        self.encode(&patched)
    }

    async fn delete(&self, name: &str, grace_period_seconds: Option<u32>) -> Result<()> {
        self.client.delete(name, grace_period_seconds).await
    }
}
