//! Point-in-time cache state
//!
//! A `Snapshot` is the complete, immutable set of per-kind cached data,
//! replaced wholesale on each refresh. A per-kind entry is either a
//! name-indexed map of objects or the load error encountered for that kind;
//! the type makes both-or-neither unrepresentable.

use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use k8s_openapi::api::core::v1::{ConfigMap, Endpoints, Node, PersistentVolumeClaim, Pod, Secret};
use k8s_openapi::api::policy::v1::PodDisruptionBudget;

use shoal_common::crd::{ShoalMember, ShoalTask};
use shoal_common::{Error, Result};

use crate::api::ServerVersion;
use crate::kinds::ObjectKind;

/// Cached data for one kind: items or the load error, plus the refresh time.
#[derive(Debug, Clone)]
pub struct KindData<K> {
    /// Name-indexed objects on success, the first load error otherwise.
    pub result: std::result::Result<BTreeMap<String, Arc<K>>, Error>,
    /// When this entry was loaded.
    pub last_refresh: DateTime<Utc>,
}

impl<K> KindData<K> {
    /// Entry holding successfully listed objects.
    pub fn loaded(items: BTreeMap<String, Arc<K>>) -> Self {
        Self {
            result: Ok(items),
            last_refresh: Utc::now(),
        }
    }

    /// Entry holding the load error.
    pub fn failed(err: Error) -> Self {
        Self {
            result: Err(err),
            last_refresh: Utc::now(),
        }
    }

    /// Build from a listed item set, indexing by name.
    pub fn from_items(items: Vec<K>, name_of: impl Fn(&K) -> Option<String>) -> Self {
        let map = items
            .into_iter()
            .filter_map(|item| name_of(&item).map(|name| (name, Arc::new(item))))
            .collect();
        Self::loaded(map)
    }

    /// The load error, if the listing failed.
    pub fn error(&self) -> Option<&Error> {
        self.result.as_ref().err()
    }
}

/// Negotiated API version for kinds served under several versions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PdbVersion {
    /// policy/v1, servers 1.21 and newer.
    V1,
}

impl PdbVersion {
    /// Version string for error and log construction.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::V1 => "v1",
        }
    }
}

/// The complete, immutable, point-in-time set of per-kind cached data.
///
/// Exclusively owned by the inspector and replaced wholesale on each
/// refresh; readers hold an `Arc` to it and never observe a partially
/// built state.
#[derive(Default)]
pub struct Snapshot {
    pub(crate) pods: Option<Arc<KindData<Pod>>>,
    pub(crate) secrets: Option<Arc<KindData<Secret>>>,
    pub(crate) config_maps: Option<Arc<KindData<ConfigMap>>>,
    pub(crate) pvcs: Option<Arc<KindData<PersistentVolumeClaim>>>,
    pub(crate) pdbs: Option<Arc<KindData<PodDisruptionBudget>>>,
    pub(crate) nodes: Option<Arc<KindData<Node>>>,
    pub(crate) endpoints: Option<Arc<KindData<Endpoints>>>,
    pub(crate) members: Option<Arc<KindData<ShoalMember>>>,
    pub(crate) tasks: Option<Arc<KindData<ShoalTask>>>,

    /// API version negotiated for PodDisruptionBudget on the last load.
    pub(crate) pdb_version: Option<PdbVersion>,

    /// Server version probed at the start of the refresh that built this
    /// snapshot, when the probe succeeded.
    pub(crate) server_version: Option<ServerVersion>,

    pub(crate) last_refresh: Option<DateTime<Utc>>,
}

impl Snapshot {
    /// Server version recorded when this snapshot was built.
    pub fn server_version(&self) -> Option<&ServerVersion> {
        self.server_version.as_ref()
    }

    /// Negotiated PodDisruptionBudget API version.
    pub fn pdb_version(&self) -> Option<PdbVersion> {
        self.pdb_version
    }

    /// When this snapshot was published.
    pub fn last_refresh(&self) -> Option<DateTime<Utc>> {
        self.last_refresh
    }

    /// Typed view over one kind's entry.
    pub fn pods(&self) -> KindView<Pod> {
        KindView::new(ObjectKind::Pod, self.pods.clone())
    }

    /// Typed view over the Secret entry.
    pub fn secrets(&self) -> KindView<Secret> {
        KindView::new(ObjectKind::Secret, self.secrets.clone())
    }

    /// Typed view over the ConfigMap entry.
    pub fn config_maps(&self) -> KindView<ConfigMap> {
        KindView::new(ObjectKind::ConfigMap, self.config_maps.clone())
    }

    /// Typed view over the PersistentVolumeClaim entry.
    pub fn pvcs(&self) -> KindView<PersistentVolumeClaim> {
        KindView::new(ObjectKind::PersistentVolumeClaim, self.pvcs.clone())
    }

    /// Typed view over the PodDisruptionBudget entry.
    pub fn pdbs(&self) -> KindView<PodDisruptionBudget> {
        KindView::new(ObjectKind::PodDisruptionBudget, self.pdbs.clone())
    }

    /// Typed view over the Node entry.
    pub fn nodes(&self) -> KindView<Node> {
        KindView::new(ObjectKind::Node, self.nodes.clone())
    }

    /// Typed view over the Endpoints entry.
    pub fn endpoints(&self) -> KindView<Endpoints> {
        KindView::new(ObjectKind::Endpoints, self.endpoints.clone())
    }

    /// Typed view over the ShoalMember entry.
    pub fn members(&self) -> KindView<ShoalMember> {
        KindView::new(ObjectKind::ShoalMember, self.members.clone())
    }

    /// Typed view over the ShoalTask entry.
    pub fn tasks(&self) -> KindView<ShoalTask> {
        KindView::new(ObjectKind::ShoalTask, self.tasks.clone())
    }

    /// Whether a kind's entry is populated and currently error-free.
    pub fn kind_healthy(&self, kind: ObjectKind) -> bool {
        match kind {
            ObjectKind::Pod => entry_healthy(&self.pods),
            ObjectKind::Secret => entry_healthy(&self.secrets),
            ObjectKind::ConfigMap => entry_healthy(&self.config_maps),
            ObjectKind::PersistentVolumeClaim => entry_healthy(&self.pvcs),
            ObjectKind::PodDisruptionBudget => entry_healthy(&self.pdbs),
            ObjectKind::Node => entry_healthy(&self.nodes),
            ObjectKind::Endpoints => entry_healthy(&self.endpoints),
            ObjectKind::ShoalMember => entry_healthy(&self.members),
            ObjectKind::ShoalTask => entry_healthy(&self.tasks),
        }
    }
}

fn entry_healthy<K>(entry: &Option<Arc<KindData<K>>>) -> bool {
    entry.as_ref().is_some_and(|data| data.result.is_ok())
}

/// A filter over one kind's items.
pub type FilterFn<K> = dyn Fn(&K) -> bool;

/// Read accessors over one kind's entry in a snapshot.
///
/// Holds an `Arc` to the entry, so reads stay valid while a refresh
/// publishes a newer snapshot.
pub struct KindView<K> {
    kind: ObjectKind,
    data: Option<Arc<KindData<K>>>,
}

impl<K> KindView<K> {
    pub(crate) fn new(kind: ObjectKind, data: Option<Arc<KindData<K>>>) -> Self {
        Self { kind, data }
    }

    /// The kind this view reads.
    pub fn kind(&self) -> ObjectKind {
        self.kind
    }

    /// The entry's load error, if its last listing failed.
    pub fn error(&self) -> Option<&Error> {
        self.data.as_ref().and_then(|d| d.error())
    }

    /// When this kind was last refreshed.
    pub fn last_refresh(&self) -> Option<DateTime<Utc>> {
        self.data.as_ref().map(|d| d.last_refresh)
    }

    fn items(&self) -> Option<&BTreeMap<String, Arc<K>>> {
        self.data.as_ref().and_then(|d| d.result.as_ref().ok())
    }

    /// Names of every cached object of this kind, in map order.
    pub fn names(&self) -> Vec<String> {
        self.items()
            .map(|m| m.keys().cloned().collect())
            .unwrap_or_default()
    }

    /// Every cached object of this kind.
    pub fn list_simple(&self) -> Vec<Arc<K>> {
        self.items()
            .map(|m| m.values().cloned().collect())
            .unwrap_or_default()
    }

    /// One cached object by name.
    ///
    /// Absence is reported with the kind's resource identity, so callers
    /// can pattern-match it the same way they would a remote 404.
    pub fn get_simple(&self, name: &str) -> Result<Arc<K>> {
        self.items()
            .and_then(|m| m.get(name).cloned())
            .ok_or_else(|| Error::not_found(self.kind.group(), self.kind.resource(), name))
    }

    /// Every item for which all filters return true. An empty filter list
    /// accepts everything.
    pub fn filter(&self, filters: &[&FilterFn<K>]) -> Vec<Arc<K>> {
        self.items()
            .map(|m| {
                m.values()
                    .filter(|item| filters.iter().all(|f| f(item)))
                    .cloned()
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Invoke `action` on each item, skipping an item at the first filter
    /// that rejects it. A `None` filter is ignored.
    pub fn iterate(&self, mut action: impl FnMut(&Arc<K>), filters: &[Option<&FilterFn<K>>]) {
        let Some(items) = self.items() else {
            return;
        };
        'items: for item in items.values() {
            for filter in filters.iter().flatten() {
                if !filter(item) {
                    continue 'items;
                }
            }
            action(item);
        }
    }
}
