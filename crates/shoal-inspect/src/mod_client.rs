//! Typed mutation client
//!
//! One `ModClient` per kind wraps the remote mutation verbs. Every call
//! records a mutation metric keyed by kind and verb, and a successful
//! mutation invalidates the kind's throttle so the next refresh observes
//! the change.

use std::sync::{Arc, Mutex};

use kube::api::Patch;
use tracing::debug;

use shoal_common::metrics::{record_mutation, Verb};
use shoal_common::{Error, Result};

use crate::api::KindApi;
use crate::kinds::ObjectKind;
use crate::throttle::ThrottleSet;

/// Mutation surface for one kind.
pub struct ModClient<K> {
    kind: ObjectKind,
    api: Arc<dyn KindApi<K>>,
    throttles: Arc<Mutex<ThrottleSet>>,
}

impl<K> Clone for ModClient<K> {
    fn clone(&self) -> Self {
        Self {
            kind: self.kind,
            api: self.api.clone(),
            throttles: self.throttles.clone(),
        }
    }
}

impl<K: Send + Sync> ModClient<K> {
    pub(crate) fn new(
        kind: ObjectKind,
        api: Arc<dyn KindApi<K>>,
        throttles: Arc<Mutex<ThrottleSet>>,
    ) -> Self {
        Self {
            kind,
            api,
            throttles,
        }
    }

    /// The kind this client mutates.
    pub fn kind(&self) -> ObjectKind {
        self.kind
    }

    /// Create an object.
    pub async fn create(&self, obj: &K) -> Result<K> {
        let result = self.api.create(obj).await;
        self.finish(Verb::Create, result)
    }

    /// Replace an object.
    pub async fn update(&self, obj: &K) -> Result<K> {
        let result = self.api.update(obj).await;
        self.finish(Verb::Update, result)
    }

    /// Replace an object's status subresource.
    ///
    /// Kinds without a status subresource fail with a not-implemented error
    /// carrying the kind's identity, without touching the remote API.
    pub async fn update_status(&self, obj: &K) -> Result<K> {
        if !self.kind.has_status_subresource() {
            let err = Error::not_implemented(self.kind.kind_str(), Verb::UpdateStatus.as_str());
            return self.finish(Verb::UpdateStatus, Err(err));
        }
        let result = self.api.update_status(obj).await;
        self.finish(Verb::UpdateStatus, result)
    }

    /// Patch an object by patch-type and payload.
    pub async fn patch(&self, name: &str, patch: &Patch<serde_json::Value>) -> Result<K> {
        let result = self.api.patch(name, patch).await;
        self.finish(Verb::Patch, result)
    }

    /// Delete an object.
    ///
    /// A zero grace period is recorded under the distinct force-delete verb.
    pub async fn delete(&self, name: &str, grace_period_seconds: Option<u32>) -> Result<()> {
        let verb = match grace_period_seconds {
            Some(0) => Verb::ForceDelete,
            _ => Verb::Delete,
        };
        let result = self.api.delete(name, grace_period_seconds).await;
        self.finish(verb, result)
    }

    fn finish<T>(&self, verb: Verb, result: Result<T>) -> Result<T> {
        record_mutation(self.kind.kind_str(), verb, result.is_ok());
        if result.is_ok() {
            debug!(kind = self.kind.kind_str(), verb = verb.as_str(), "mutation applied");
            self.lock_throttles().invalidate(&[self.kind]);
        }
        result
    }

    fn lock_throttles(&self) -> std::sync::MutexGuard<'_, ThrottleSet> {
        self.throttles.lock().unwrap_or_else(|e| e.into_inner())
    }
}
