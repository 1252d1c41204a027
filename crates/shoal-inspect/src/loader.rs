//! Per-kind fetch, verify and carry-forward logic
//!
//! One `Loader` per cached kind. `load` performs the full paginated listing
//! into a finished entry, `verify` is a post-load invariant check that can
//! fail the whole refresh, and `copy` carries a kind's entry by reference
//! from the previous snapshot when the kind is not being refreshed this
//! pass.
//!
//! Loaders live in an explicit registry constructed once at startup and
//! passed into the inspector; registering two loaders under one name is a
//! configuration error surfaced at construction time.

use std::sync::Arc;

use async_trait::async_trait;
use k8s_openapi::api::core::v1::{ConfigMap, Endpoints, Node, PersistentVolumeClaim, Pod, Secret};
use k8s_openapi::api::policy::v1::PodDisruptionBudget;
use tracing::debug;

use shoal_common::crd::{ShoalMember, ShoalTask};
use shoal_common::{Error, Result};

use crate::api::{list_all_pages, ApiSet, KindApi, ServerVersion};
use crate::kinds::ObjectKind;
use crate::snapshot::{KindData, PdbVersion, Snapshot};

/// Minimum server version serving `policy/v1` PodDisruptionBudgets.
const PDB_MINIMUM_SERVER: (u32, u32) = (1, 21);

/// A finished per-kind load, ready to install into the snapshot being built.
pub enum LoadedKind {
    /// Loaded Pod entry.
    Pods(KindData<Pod>),
    /// Loaded Secret entry.
    Secrets(KindData<Secret>),
    /// Loaded ConfigMap entry.
    ConfigMaps(KindData<ConfigMap>),
    /// Loaded PersistentVolumeClaim entry.
    Pvcs(KindData<PersistentVolumeClaim>),
    /// Loaded PodDisruptionBudget entry with its negotiated version.
    Pdbs(KindData<PodDisruptionBudget>, Option<PdbVersion>),
    /// Loaded Node entry.
    Nodes(KindData<Node>),
    /// Loaded Endpoints entry.
    Endpoints(KindData<Endpoints>),
    /// Loaded ShoalMember entry.
    Members(KindData<ShoalMember>),
    /// Loaded ShoalTask entry.
    Tasks(KindData<ShoalTask>),
}

impl LoadedKind {
    /// Install this entry into a snapshot under construction.
    pub fn install(self, next: &mut Snapshot) {
        match self {
            Self::Pods(data) => next.pods = Some(Arc::new(data)),
            Self::Secrets(data) => next.secrets = Some(Arc::new(data)),
            Self::ConfigMaps(data) => next.config_maps = Some(Arc::new(data)),
            Self::Pvcs(data) => next.pvcs = Some(Arc::new(data)),
            Self::Pdbs(data, version) => {
                next.pdbs = Some(Arc::new(data));
                next.pdb_version = version;
            }
            Self::Nodes(data) => next.nodes = Some(Arc::new(data)),
            Self::Endpoints(data) => next.endpoints = Some(Arc::new(data)),
            Self::Members(data) => next.members = Some(Arc::new(data)),
            Self::Tasks(data) => next.tasks = Some(Arc::new(data)),
        }
    }
}

/// Per-kind fetch/verify/carry-forward behavior.
#[async_trait]
pub trait Loader: Send + Sync {
    /// Unique loader name; duplicate names are rejected at registration.
    fn name(&self) -> &'static str;

    /// The kind this loader populates.
    fn kind(&self) -> ObjectKind;

    /// Perform the full paginated listing for this kind, recording either
    /// the populated mapping or the first encountered error in the returned
    /// entry. Never fails the refresh by itself.
    async fn load(&self, server: Option<&ServerVersion>) -> LoadedKind;

    /// Post-load invariant check; an error here fails the whole refresh
    /// even when the listing itself succeeded.
    fn verify(&self, next: &Snapshot) -> Result<()> {
        let _ = next;
        Ok(())
    }

    /// Carry this kind's entry by reference from `from` into `to`, only
    /// overwriting an already-populated destination when `overwrite` is set.
    fn copy(&self, from: &Snapshot, to: &mut Snapshot, overwrite: bool);
}

async fn load_entry<K>(api: &dyn KindApi<K>, batch_size: u32) -> KindData<K>
where
    K: kube::Resource + Send,
{
    match list_all_pages(api, batch_size).await {
        Ok(items) => KindData::from_items(items, |item| item.meta().name.clone()),
        Err(err) => KindData::failed(err),
    }
}

macro_rules! simple_loader {
    ($loader:ident, $obj:ty, $kind:expr, $variant:ident, $field:ident, $name:literal) => {
        struct $loader {
            api: Arc<dyn KindApi<$obj>>,
            batch_size: u32,
        }

        #[async_trait]
        impl Loader for $loader {
            fn name(&self) -> &'static str {
                $name
            }

            fn kind(&self) -> ObjectKind {
                $kind
            }

            async fn load(&self, _server: Option<&ServerVersion>) -> LoadedKind {
                LoadedKind::$variant(load_entry(&*self.api, self.batch_size).await)
            }

            fn copy(&self, from: &Snapshot, to: &mut Snapshot, overwrite: bool) {
                if to.$field.is_some() && !overwrite {
                    return;
                }
                to.$field = from.$field.clone();
            }
        }
    };
}

simple_loader!(PodsLoader, Pod, ObjectKind::Pod, Pods, pods, "pods");
simple_loader!(SecretsLoader, Secret, ObjectKind::Secret, Secrets, secrets, "secrets");
simple_loader!(
    ConfigMapsLoader,
    ConfigMap,
    ObjectKind::ConfigMap,
    ConfigMaps,
    config_maps,
    "configMaps"
);
simple_loader!(
    PvcsLoader,
    PersistentVolumeClaim,
    ObjectKind::PersistentVolumeClaim,
    Pvcs,
    pvcs,
    "persistentVolumeClaims"
);
simple_loader!(NodesLoader, Node, ObjectKind::Node, Nodes, nodes, "nodes");
simple_loader!(
    EndpointsLoader,
    Endpoints,
    ObjectKind::Endpoints,
    Endpoints,
    endpoints,
    "endpoints"
);
simple_loader!(
    MembersLoader,
    ShoalMember,
    ObjectKind::ShoalMember,
    Members,
    members,
    "shoalMembers"
);
simple_loader!(TasksLoader, ShoalTask, ObjectKind::ShoalTask, Tasks, tasks, "shoalTasks");

/// PodDisruptionBudget loader with server-version negotiation.
///
/// The supported version set is `policy/v1`; servers older than 1.21 fail
/// `verify` with a distinguishable unsupported-version error carrying the
/// detected version.
struct PdbsLoader {
    api: Arc<dyn KindApi<PodDisruptionBudget>>,
    batch_size: u32,
}

impl PdbsLoader {
    fn unsupported(server: &ServerVersion) -> Error {
        Error::unsupported_version(
            ObjectKind::PodDisruptionBudget.kind_str(),
            server.to_string(),
            format!("{}.{}", PDB_MINIMUM_SERVER.0, PDB_MINIMUM_SERVER.1),
        )
    }
}

#[async_trait]
impl Loader for PdbsLoader {
    fn name(&self) -> &'static str {
        "podDisruptionBudgets"
    }

    fn kind(&self) -> ObjectKind {
        ObjectKind::PodDisruptionBudget
    }

    async fn load(&self, server: Option<&ServerVersion>) -> LoadedKind {
        if let Some(server) = server {
            if !server.at_least(PDB_MINIMUM_SERVER.0, PDB_MINIMUM_SERVER.1) {
                debug!(server = %server, "server below policy/v1 support, skipping PDB listing");
                return LoadedKind::Pdbs(KindData::failed(Self::unsupported(server)), None);
            }
        }
        let entry = load_entry(&*self.api, self.batch_size).await;
        LoadedKind::Pdbs(entry, Some(PdbVersion::V1))
    }

    fn verify(&self, next: &Snapshot) -> Result<()> {
        if let Some(server) = next.server_version() {
            if !server.at_least(PDB_MINIMUM_SERVER.0, PDB_MINIMUM_SERVER.1) {
                return Err(Self::unsupported(server));
            }
        }
        Ok(())
    }

    fn copy(&self, from: &Snapshot, to: &mut Snapshot, overwrite: bool) {
        if to.pdbs.is_some() && !overwrite {
            return;
        }
        to.pdbs = from.pdbs.clone();
        to.pdb_version = from.pdb_version;
    }
}

/// Explicit registry of loaders, constructed once at startup and handed to
/// the inspector.
#[derive(Default)]
pub struct LoaderRegistry {
    loaders: Vec<Arc<dyn Loader>>,
}

impl LoaderRegistry {
    /// Empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register one loader. Registration is idempotent in intent: a second
    /// loader under an already-taken name is a startup configuration error.
    pub fn register(&mut self, loader: Arc<dyn Loader>) -> Result<()> {
        if self.loaders.iter().any(|l| l.name() == loader.name()) {
            return Err(Error::internal(
                "registry",
                format!("loader {:?} already registered", loader.name()),
            ));
        }
        self.loaders.push(loader);
        Ok(())
    }

    /// Loader for one kind, if registered.
    pub fn get(&self, kind: ObjectKind) -> Option<Arc<dyn Loader>> {
        self.loaders.iter().find(|l| l.kind() == kind).cloned()
    }

    /// All registered loaders, in registration order.
    pub fn iter(&self) -> impl Iterator<Item = &Arc<dyn Loader>> {
        self.loaders.iter()
    }

    /// Number of registered loaders.
    pub fn len(&self) -> usize {
        self.loaders.len()
    }

    /// Whether the registry is empty.
    pub fn is_empty(&self) -> bool {
        self.loaders.is_empty()
    }

    /// Registry covering every cached kind, built over the given API set.
    pub fn standard(apis: &ApiSet, batch_size: u32) -> Result<Self> {
        let mut registry = Self::new();
        registry.register(Arc::new(PodsLoader {
            api: apis.pods.clone(),
            batch_size,
        }))?;
        registry.register(Arc::new(SecretsLoader {
            api: apis.secrets.clone(),
            batch_size,
        }))?;
        registry.register(Arc::new(ConfigMapsLoader {
            api: apis.config_maps.clone(),
            batch_size,
        }))?;
        registry.register(Arc::new(PvcsLoader {
            api: apis.pvcs.clone(),
            batch_size,
        }))?;
        registry.register(Arc::new(PdbsLoader {
            api: apis.pdbs.clone(),
            batch_size,
        }))?;
        registry.register(Arc::new(NodesLoader {
            api: apis.nodes.clone(),
            batch_size,
        }))?;
        registry.register(Arc::new(EndpointsLoader {
            api: apis.endpoints.clone(),
            batch_size,
        }))?;
        registry.register(Arc::new(MembersLoader {
            api: apis.members.clone(),
            batch_size,
        }))?;
        registry.register(Arc::new(TasksLoader {
            api: apis.tasks.clone(),
            batch_size,
        }))?;
        Ok(registry)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct NamedLoader(&'static str);

    #[async_trait]
    impl Loader for NamedLoader {
        fn name(&self) -> &'static str {
            self.0
        }
        fn kind(&self) -> ObjectKind {
            ObjectKind::Pod
        }
        async fn load(&self, _server: Option<&ServerVersion>) -> LoadedKind {
            LoadedKind::Pods(KindData::loaded(Default::default()))
        }
        fn copy(&self, _from: &Snapshot, _to: &mut Snapshot, _overwrite: bool) {}
    }

    #[test]
    fn duplicate_registration_is_rejected() {
        let mut registry = LoaderRegistry::new();
        registry
            .register(Arc::new(NamedLoader("pods")))
            .expect("first registration");
        let err = registry
            .register(Arc::new(NamedLoader("pods")))
            .expect_err("duplicate must fail");
        assert!(err.to_string().contains("already registered"));
        assert_eq!(registry.len(), 1);
    }

    #[tokio::test]
    async fn pdb_loader_refuses_old_servers_without_listing() {
        struct PanicApi;
        #[async_trait]
        impl KindApi<PodDisruptionBudget> for PanicApi {
            async fn list_page(
                &self,
                _page: crate::api::PageRequest,
            ) -> Result<crate::api::Page<PodDisruptionBudget>> {
                panic!("must not list against an unsupported server");
            }
            async fn get(&self, name: &str) -> Result<PodDisruptionBudget> {
                Err(Error::not_found("policy", "poddisruptionbudgets", name))
            }
            async fn create(&self, obj: &PodDisruptionBudget) -> Result<PodDisruptionBudget> {
                Ok(obj.clone())
            }
            async fn update(&self, obj: &PodDisruptionBudget) -> Result<PodDisruptionBudget> {
                Ok(obj.clone())
            }
            async fn update_status(&self, obj: &PodDisruptionBudget) -> Result<PodDisruptionBudget> {
                Ok(obj.clone())
            }
            async fn patch(
                &self,
                name: &str,
                _patch: &kube::api::Patch<serde_json::Value>,
            ) -> Result<PodDisruptionBudget> {
                Err(Error::not_found("policy", "poddisruptionbudgets", name))
            }
            async fn delete(&self, _name: &str, _grace: Option<u32>) -> Result<()> {
                Ok(())
            }
        }

        let loader = PdbsLoader {
            api: Arc::new(PanicApi),
            batch_size: 16,
        };
        let old = ServerVersion::parse("1", "19", "v1.19.3").expect("parses");
        let loaded = loader.load(Some(&old)).await;
        match loaded {
            LoadedKind::Pdbs(data, version) => {
                assert!(version.is_none());
                assert!(data.error().is_some_and(|e| e.is_unsupported_version()));
            }
            _ => panic!("expected a PDB entry"),
        }

        let mut next = Snapshot::default();
        next.server_version = Some(old);
        let err = loader.verify(&next).expect_err("verify must fail");
        assert!(err.is_unsupported_version());
    }

    #[test]
    fn copy_respects_populated_destination() {
        let from_entry: KindData<Pod> = KindData::loaded(Default::default());
        let mut from = Snapshot::default();
        from.pods = Some(Arc::new(from_entry));

        let loader = PodsLoader {
            api: Arc::new(EmptyPodApi),
            batch_size: 16,
        };

        // Empty destination is filled regardless of overwrite.
        let mut to = Snapshot::default();
        loader.copy(&from, &mut to, false);
        assert!(to.pods.is_some());

        // Populated destination only changes when overwrite is set.
        let newer: KindData<Pod> = KindData::failed(Error::internal("test", "marker"));
        let marker = Arc::new(newer);
        to.pods = Some(marker.clone());
        loader.copy(&from, &mut to, false);
        assert!(Arc::ptr_eq(to.pods.as_ref().expect("present"), &marker));

        loader.copy(&from, &mut to, true);
        assert!(!Arc::ptr_eq(to.pods.as_ref().expect("present"), &marker));
    }

    struct EmptyPodApi;

    #[async_trait]
    impl KindApi<Pod> for EmptyPodApi {
        async fn list_page(
            &self,
            _page: crate::api::PageRequest,
        ) -> Result<crate::api::Page<Pod>> {
            Ok(crate::api::Page {
                items: Vec::new(),
                continue_token: None,
                remaining: None,
            })
        }
        async fn get(&self, name: &str) -> Result<Pod> {
            Err(Error::not_found("", "pods", name))
        }
        async fn create(&self, obj: &Pod) -> Result<Pod> {
            Ok(obj.clone())
        }
        async fn update(&self, obj: &Pod) -> Result<Pod> {
            Ok(obj.clone())
        }
        async fn update_status(&self, obj: &Pod) -> Result<Pod> {
            Ok(obj.clone())
        }
        async fn patch(
            &self,
            name: &str,
            _patch: &kube::api::Patch<serde_json::Value>,
        ) -> Result<Pod> {
            Err(Error::not_found("", "pods", name))
        }
        async fn delete(&self, _name: &str, _grace: Option<u32>) -> Result<()> {
            Ok(())
        }
    }
}
