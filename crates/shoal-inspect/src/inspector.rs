//! Inspector cache orchestration
//!
//! The inspector owns the current snapshot and the per-kind throttles. A
//! refresh forks the throttle set, probes the server version, runs every
//! due loader in parallel, carries the rest forward from the previous
//! snapshot, runs all verify hooks, and only then swaps the snapshot
//! pointer and stores the forked throttles. Any listing or verify error
//! aborts publication: readers keep seeing the previous snapshot and the
//! discarded fork means aborted kinds are due again immediately.
//!
//! Reads never take a lock longer than the snapshot pointer load.

use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Instant;

use chrono::Utc;
use futures::future::join_all;
use k8s_openapi::api::core::v1::{ConfigMap, Endpoints, Node, PersistentVolumeClaim, Pod, Secret};
use k8s_openapi::api::policy::v1::PodDisruptionBudget;
use kube::core::GroupVersionKind;
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::{debug, warn};

use shoal_common::crd::{ShoalMember, ShoalTask};
use shoal_common::metrics::{record_refresh, record_refresh_error};
use shoal_common::{Error, Result};

use crate::anonymous::{AnonymousApi, AnonymousFor};
use crate::api::{ApiSet, ClusterInfo, KindApi};
use crate::config::InspectConfig;
use crate::kinds::ObjectKind;
use crate::loader::{Loader, LoaderRegistry};
use crate::mod_client::ModClient;
use crate::snapshot::{KindView, Snapshot};
use crate::throttle::ThrottleSet;

struct Inner {
    loaders: LoaderRegistry,
    apis: ApiSet,
    cluster: Arc<dyn ClusterInfo>,
    current: Mutex<Arc<Snapshot>>,
    throttles: Arc<Mutex<ThrottleSet>>,
    refresh_gate: tokio::sync::Mutex<()>,
}

/// The throttled cache over the remote object store.
///
/// Cheap to clone; all clones share the same snapshot and throttles.
#[derive(Clone)]
pub struct Inspector {
    inner: Arc<Inner>,
}

impl Inspector {
    /// Build an inspector over an explicit loader registry and API set.
    pub fn new(
        loaders: LoaderRegistry,
        apis: ApiSet,
        cluster: Arc<dyn ClusterInfo>,
        throttles: ThrottleSet,
    ) -> Self {
        Self {
            inner: Arc::new(Inner {
                loaders,
                apis,
                cluster,
                current: Mutex::new(Arc::new(Snapshot::default())),
                throttles: Arc::new(Mutex::new(throttles)),
                refresh_gate: tokio::sync::Mutex::new(()),
            }),
        }
    }

    /// Build an inspector with the standard loader registry over a kube
    /// client, for one workload namespace.
    pub fn standard(
        client: &kube::Client,
        namespace: &str,
        config: &InspectConfig,
    ) -> Result<Self> {
        let apis = ApiSet::from_client(client, namespace);
        let loaders = LoaderRegistry::standard(&apis, config.batch_size)?;
        Ok(Self::new(
            loaders,
            apis,
            Arc::new(client.clone()),
            config.throttles(),
        ))
    }

    /// The currently published snapshot.
    pub fn snapshot(&self) -> Arc<Snapshot> {
        self.lock_current().clone()
    }

    /// Force the named kinds due on the next refresh.
    pub fn invalidate(&self, kinds: &[ObjectKind]) {
        self.lock_throttles().invalidate(kinds);
    }

    /// Per-kind refresh counts, for observability.
    pub fn refresh_counts(&self) -> std::collections::HashMap<ObjectKind, u64> {
        self.lock_throttles().counts()
    }

    /// Refresh every kind whose throttle is due, carrying the rest forward
    /// from the previous snapshot.
    pub async fn refresh(&self) -> Result<()> {
        let _gate = self.inner.refresh_gate.lock().await;
        let started = Instant::now();
        let result = self.refresh_locked().await;
        record_refresh(started.elapsed().as_secs_f64(), result.is_ok());
        result
    }

    /// Force one kind due, then refresh.
    pub async fn refresh_kind(&self, kind: ObjectKind) -> Result<()> {
        self.invalidate(&[kind]);
        self.refresh().await
    }

    async fn refresh_locked(&self) -> Result<()> {
        let prev = self.snapshot();
        let throttles = self.lock_throttles().copy();

        // The version probe is advisory; on failure the previous probe
        // result stands and version-sensitive verify hooks decide.
        let server = match self.inner.cluster.server_version().await {
            Ok(version) => Some(version),
            Err(err) => {
                warn!(error = %err, "server version probe failed");
                prev.server_version().cloned()
            }
        };

        let mut next = Snapshot::default();
        for loader in self.inner.loaders.iter() {
            loader.copy(&prev, &mut next, false);
        }

        let due: Vec<&Arc<dyn Loader>> = self
            .inner
            .loaders
            .iter()
            .filter(|l| throttles.get(l.kind()).throttle())
            .collect();

        let loads = join_all(due.iter().map(|l| l.load(server.as_ref()))).await;
        for (loader, loaded) in due.iter().zip(loads) {
            loaded.install(&mut next);
            throttles.get(loader.kind()).delay();
        }

        next.server_version = server;
        next.last_refresh = Some(Utc::now());

        let mut first_error = None;
        for loader in &due {
            if let Some(err) = entry_error(&next, loader.kind()) {
                record_refresh_error(loader.kind().kind_str());
                first_error.get_or_insert(err);
            }
        }
        if let Some(err) = first_error {
            return Err(err);
        }

        for loader in self.inner.loaders.iter() {
            if let Err(err) = loader.verify(&next) {
                record_refresh_error(loader.kind().kind_str());
                return Err(err);
            }
        }

        debug!(refreshed = due.len(), "publishing refreshed snapshot");
        *self.lock_current() = Arc::new(next);
        *self.lock_throttles() = throttles;
        Ok(())
    }

    fn lock_current(&self) -> MutexGuard<'_, Arc<Snapshot>> {
        self.inner.current.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn lock_throttles(&self) -> MutexGuard<'_, ThrottleSet> {
        self.inner
            .throttles
            .lock()
            .unwrap_or_else(|e| e.into_inner())
    }

    fn mod_client<K: Send + Sync>(
        &self,
        kind: ObjectKind,
        api: Arc<dyn KindApi<K>>,
    ) -> ModClient<K> {
        ModClient::new(kind, api, self.inner.throttles.clone())
    }

    /// Mutation client for Pods.
    pub fn pods_mod(&self) -> ModClient<Pod> {
        self.mod_client(ObjectKind::Pod, self.inner.apis.pods.clone())
    }

    /// Mutation client for Secrets.
    pub fn secrets_mod(&self) -> ModClient<Secret> {
        self.mod_client(ObjectKind::Secret, self.inner.apis.secrets.clone())
    }

    /// Mutation client for ConfigMaps.
    pub fn config_maps_mod(&self) -> ModClient<ConfigMap> {
        self.mod_client(ObjectKind::ConfigMap, self.inner.apis.config_maps.clone())
    }

    /// Mutation client for PersistentVolumeClaims.
    pub fn pvcs_mod(&self) -> ModClient<PersistentVolumeClaim> {
        self.mod_client(
            ObjectKind::PersistentVolumeClaim,
            self.inner.apis.pvcs.clone(),
        )
    }

    /// Mutation client for PodDisruptionBudgets.
    pub fn pdbs_mod(&self) -> ModClient<PodDisruptionBudget> {
        self.mod_client(ObjectKind::PodDisruptionBudget, self.inner.apis.pdbs.clone())
    }

    /// Mutation client for Nodes.
    pub fn nodes_mod(&self) -> ModClient<Node> {
        self.mod_client(ObjectKind::Node, self.inner.apis.nodes.clone())
    }

    /// Mutation client for Endpoints.
    pub fn endpoints_mod(&self) -> ModClient<Endpoints> {
        self.mod_client(ObjectKind::Endpoints, self.inner.apis.endpoints.clone())
    }

    /// Mutation client for ShoalMembers.
    pub fn members_mod(&self) -> ModClient<ShoalMember> {
        self.mod_client(ObjectKind::ShoalMember, self.inner.apis.members.clone())
    }

    /// Mutation client for ShoalTasks.
    pub fn tasks_mod(&self) -> ModClient<ShoalTask> {
        self.mod_client(ObjectKind::ShoalTask, self.inner.apis.tasks.clone())
    }

    /// Type-erased accessor for one Group/Version/Kind.
    ///
    /// Not-found when the kind is unregistered or its current cache entry
    /// holds a load error.
    pub fn anonymous(&self, gvk: &GroupVersionKind) -> Result<Box<dyn AnonymousApi>> {
        let kind = ObjectKind::from_gvk(gvk).ok_or_else(|| {
            Error::not_found(&gvk.group, gvk.kind.to_lowercase(), &gvk.kind)
        })?;
        if self.inner.loaders.get(kind).is_none() {
            return Err(Error::not_found(kind.group(), kind.resource(), kind.kind_str()));
        }
        let snapshot = self.snapshot();
        let apis = &self.inner.apis;
        match kind {
            ObjectKind::Pod => self.anonymous_for(snapshot.pods(), apis.pods.clone()),
            ObjectKind::Secret => self.anonymous_for(snapshot.secrets(), apis.secrets.clone()),
            ObjectKind::ConfigMap => {
                self.anonymous_for(snapshot.config_maps(), apis.config_maps.clone())
            }
            ObjectKind::PersistentVolumeClaim => {
                self.anonymous_for(snapshot.pvcs(), apis.pvcs.clone())
            }
            ObjectKind::PodDisruptionBudget => {
                self.anonymous_for(snapshot.pdbs(), apis.pdbs.clone())
            }
            ObjectKind::Node => self.anonymous_for(snapshot.nodes(), apis.nodes.clone()),
            ObjectKind::Endpoints => {
                self.anonymous_for(snapshot.endpoints(), apis.endpoints.clone())
            }
            ObjectKind::ShoalMember => self.anonymous_for(snapshot.members(), apis.members.clone()),
            ObjectKind::ShoalTask => self.anonymous_for(snapshot.tasks(), apis.tasks.clone()),
        }
    }

    fn anonymous_for<K>(
        &self,
        view: KindView<K>,
        api: Arc<dyn KindApi<K>>,
    ) -> Result<Box<dyn AnonymousApi>>
    where
        K: Serialize + DeserializeOwned + Send + Sync + 'static,
    {
        if view.error().is_some() {
            let kind = view.kind();
            return Err(Error::not_found(kind.group(), kind.resource(), kind.kind_str()));
        }
        let kind = view.kind();
        let client = self.mod_client(kind, api);
        Ok(Box::new(AnonymousFor::new(view, client)))
    }
}

fn entry_error(next: &Snapshot, kind: ObjectKind) -> Option<Error> {
    match kind {
        ObjectKind::Pod => next.pods().error().cloned(),
        ObjectKind::Secret => next.secrets().error().cloned(),
        ObjectKind::ConfigMap => next.config_maps().error().cloned(),
        ObjectKind::PersistentVolumeClaim => next.pvcs().error().cloned(),
        ObjectKind::PodDisruptionBudget => next.pdbs().error().cloned(),
        ObjectKind::Node => next.nodes().error().cloned(),
        ObjectKind::Endpoints => next.endpoints().error().cloned(),
        ObjectKind::ShoalMember => next.members().error().cloned(),
        ObjectKind::ShoalTask => next.tasks().error().cloned(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::collections::HashMap;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use std::time::Duration;

    use async_trait::async_trait;
    use kube::api::Patch;

    use crate::api::{Page, PageRequest, ServerVersion};

    struct FakeApi<K> {
        items: Mutex<Vec<K>>,
        list_calls: AtomicUsize,
        fail: AtomicBool,
    }

    impl<K> FakeApi<K> {
        fn new(items: Vec<K>) -> Arc<Self> {
            Arc::new(Self {
                items: Mutex::new(items),
                list_calls: AtomicUsize::new(0),
                fail: AtomicBool::new(false),
            })
        }

        fn set_items(&self, items: Vec<K>) {
            *self.items.lock().expect("items lock") = items;
        }

        fn set_fail(&self, fail: bool) {
            self.fail.store(fail, Ordering::SeqCst);
        }

        fn calls(&self) -> usize {
            self.list_calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl<K: Clone + Send + Sync> KindApi<K> for FakeApi<K> {
        async fn list_page(&self, _page: PageRequest) -> Result<Page<K>> {
            self.list_calls.fetch_add(1, Ordering::SeqCst);
            if self.fail.load(Ordering::SeqCst) {
                return Err(Error::internal("test", "listing unavailable"));
            }
            Ok(Page {
                items: self.items.lock().expect("items lock").clone(),
                continue_token: None,
                remaining: None,
            })
        }

        async fn get(&self, name: &str) -> Result<K> {
            Err(Error::not_found("", "objects", name))
        }
        async fn create(&self, obj: &K) -> Result<K> {
            Ok(obj.clone())
        }
        async fn update(&self, obj: &K) -> Result<K> {
            Ok(obj.clone())
        }
        async fn update_status(&self, obj: &K) -> Result<K> {
            Ok(obj.clone())
        }
        async fn patch(&self, name: &str, _patch: &Patch<serde_json::Value>) -> Result<K> {
            Err(Error::not_found("", "objects", name))
        }
        async fn delete(&self, _name: &str, _grace: Option<u32>) -> Result<()> {
            Ok(())
        }
    }

    struct FixedCluster(ServerVersion);

    #[async_trait]
    impl ClusterInfo for FixedCluster {
        async fn server_version(&self) -> Result<ServerVersion> {
            Ok(self.0.clone())
        }
    }

    fn named_pod(name: &str) -> Pod {
        let mut pod = Pod::default();
        pod.metadata.name = Some(name.to_string());
        pod
    }

    struct Fixture {
        inspector: Inspector,
        pods: Arc<FakeApi<Pod>>,
    }

    fn fixture(pod_interval: Duration, server: ServerVersion) -> Fixture {
        let pods = FakeApi::new(vec![named_pod("shard-1"), named_pod("shard-2")]);
        let apis = ApiSet {
            pods: pods.clone(),
            secrets: FakeApi::<Secret>::new(Vec::new()),
            config_maps: FakeApi::<ConfigMap>::new(Vec::new()),
            pvcs: FakeApi::<PersistentVolumeClaim>::new(Vec::new()),
            pdbs: FakeApi::<PodDisruptionBudget>::new(Vec::new()),
            nodes: FakeApi::<Node>::new(Vec::new()),
            endpoints: FakeApi::<Endpoints>::new(Vec::new()),
            members: FakeApi::<ShoalMember>::new(Vec::new()),
            tasks: FakeApi::<ShoalTask>::new(Vec::new()),
        };
        let loaders = LoaderRegistry::standard(&apis, 64).expect("registry");
        let mut intervals = HashMap::new();
        intervals.insert(ObjectKind::Pod, pod_interval);
        let inspector = Inspector::new(
            loaders,
            apis,
            Arc::new(FixedCluster(server)),
            ThrottleSet::new(&intervals),
        );
        Fixture { inspector, pods }
    }

    fn recent_server() -> ServerVersion {
        ServerVersion::parse("1", "32", "v1.32.0").expect("parses")
    }

    #[tokio::test]
    async fn refresh_publishes_every_kind() {
        let fx = fixture(Duration::ZERO, recent_server());
        fx.inspector.refresh().await.expect("refresh");

        let snap = fx.inspector.snapshot();
        assert_eq!(snap.pods().list_simple().len(), 2);
        assert!(snap.last_refresh().is_some());
        assert_eq!(snap.server_version().map(|v| v.minor), Some(32));
        assert_eq!(snap.pdb_version(), Some(crate::snapshot::PdbVersion::V1));
        for kind in crate::kinds::ALL_KINDS {
            assert!(snap.kind_healthy(*kind), "{kind:?} must be healthy");
        }
    }

    #[tokio::test]
    async fn throttled_kind_is_carried_forward_by_reference() {
        let fx = fixture(Duration::from_secs(3600), recent_server());
        fx.inspector.refresh().await.expect("first refresh");
        assert_eq!(fx.pods.calls(), 1);

        fx.pods.set_items(vec![named_pod("shard-9")]);
        fx.inspector.refresh().await.expect("second refresh");

        // Pod throttle is armed, so the entry comes from the previous
        // snapshot untouched.
        assert_eq!(fx.pods.calls(), 1);
        let names = fx.inspector.snapshot().pods().names();
        assert_eq!(names, vec!["shard-1", "shard-2"]);
    }

    #[tokio::test]
    async fn invalidate_forces_a_reload() {
        let fx = fixture(Duration::from_secs(3600), recent_server());
        fx.inspector.refresh().await.expect("first refresh");

        fx.pods.set_items(vec![named_pod("shard-9")]);
        fx.inspector.invalidate(&[ObjectKind::Pod]);
        fx.inspector.refresh().await.expect("second refresh");

        assert_eq!(fx.pods.calls(), 2);
        assert_eq!(fx.inspector.snapshot().pods().names(), vec!["shard-9"]);
    }

    #[tokio::test]
    async fn failed_listing_aborts_publication_and_retries_next_call() {
        let fx = fixture(Duration::from_secs(3600), recent_server());
        fx.inspector.refresh().await.expect("first refresh");

        fx.inspector.invalidate(&[ObjectKind::Pod]);
        fx.pods.set_fail(true);
        let err = fx.inspector.refresh().await.expect_err("must fail");
        assert!(err.is_retryable());

        // Previous snapshot remains visible.
        let names = fx.inspector.snapshot().pods().names();
        assert_eq!(names, vec!["shard-1", "shard-2"]);

        // The throttle fork was discarded with the aborted snapshot, so the
        // kind is still due and recovers without a fresh invalidation.
        fx.pods.set_fail(false);
        fx.pods.set_items(vec![named_pod("shard-3")]);
        fx.inspector.refresh().await.expect("recovery refresh");
        assert_eq!(fx.inspector.snapshot().pods().names(), vec!["shard-3"]);
    }

    #[tokio::test]
    async fn old_server_fails_verify_without_publication() {
        let old = ServerVersion::parse("1", "19", "v1.19.3").expect("parses");
        let fx = fixture(Duration::ZERO, old);

        let err = fx.inspector.refresh().await.expect_err("must fail verify");
        assert!(err.is_unsupported_version());
        assert!(fx.inspector.snapshot().last_refresh().is_none());
    }

    #[tokio::test]
    async fn refresh_kind_forces_one_kind_due() {
        let fx = fixture(Duration::from_secs(3600), recent_server());
        fx.inspector.refresh().await.expect("first refresh");

        fx.pods.set_items(vec![named_pod("shard-7")]);
        fx.inspector
            .refresh_kind(ObjectKind::Pod)
            .await
            .expect("kind refresh");
        assert_eq!(fx.inspector.snapshot().pods().names(), vec!["shard-7"]);
    }

    #[tokio::test]
    async fn mod_client_invalidation_feeds_the_next_refresh() {
        let fx = fixture(Duration::from_secs(3600), recent_server());
        fx.inspector.refresh().await.expect("first refresh");

        fx.pods.set_items(vec![named_pod("shard-1")]);
        fx.inspector
            .pods_mod()
            .delete("shard-2", None)
            .await
            .expect("delete");

        fx.inspector.refresh().await.expect("second refresh");
        assert_eq!(fx.inspector.snapshot().pods().names(), vec!["shard-1"]);
    }

    #[tokio::test]
    async fn anonymous_accessor_reads_cache_and_rejects_unknown_kinds() {
        let fx = fixture(Duration::ZERO, recent_server());
        fx.inspector.refresh().await.expect("refresh");

        let gvk = ObjectKind::Pod.gvk();
        let anon = fx.inspector.anonymous(&gvk).expect("pod accessor");
        assert_eq!(anon.kind(), ObjectKind::Pod);
        let value = anon.get("shard-1").expect("cached pod");
        assert_eq!(
            value.pointer("/metadata/name").and_then(|v| v.as_str()),
            Some("shard-1")
        );
        assert_eq!(anon.names().len(), 2);

        let unknown = GroupVersionKind::gvk("apps", "v1", "Deployment");
        let err = fx
            .inspector
            .anonymous(&unknown)
            .err()
            .expect("unknown kind must be rejected");
        assert!(err.is_not_found());
    }

    mockall::mock! {
        Cluster {}

        #[async_trait]
        impl ClusterInfo for Cluster {
            async fn server_version(&self) -> Result<ServerVersion>;
        }
    }

    #[tokio::test]
    async fn probe_failure_keeps_the_previous_server_version() {
        let mut cluster = MockCluster::new();
        let mut probes = 0;
        cluster.expect_server_version().returning(move || {
            probes += 1;
            if probes == 1 {
                Ok(recent_server())
            } else {
                Err(Error::internal("test", "version endpoint unavailable"))
            }
        });

        let pods = FakeApi::new(vec![named_pod("shard-1")]);
        let apis = ApiSet {
            pods: pods.clone(),
            secrets: FakeApi::<Secret>::new(Vec::new()),
            config_maps: FakeApi::<ConfigMap>::new(Vec::new()),
            pvcs: FakeApi::<PersistentVolumeClaim>::new(Vec::new()),
            pdbs: FakeApi::<PodDisruptionBudget>::new(Vec::new()),
            nodes: FakeApi::<Node>::new(Vec::new()),
            endpoints: FakeApi::<Endpoints>::new(Vec::new()),
            members: FakeApi::<ShoalMember>::new(Vec::new()),
            tasks: FakeApi::<ShoalTask>::new(Vec::new()),
        };
        let loaders = LoaderRegistry::standard(&apis, 64).expect("registry");
        let inspector = Inspector::new(
            loaders,
            apis,
            Arc::new(cluster),
            ThrottleSet::always_due(),
        );

        inspector.refresh().await.expect("first refresh");
        inspector.refresh().await.expect("second refresh");
        let snap = inspector.snapshot();
        assert_eq!(snap.server_version().map(|v| v.minor), Some(32));
    }

    #[tokio::test]
    async fn anonymous_accessor_rejects_a_foreign_payload() {
        let fx = fixture(Duration::ZERO, recent_server());
        fx.inspector.refresh().await.expect("refresh");

        let anon = fx
            .inspector
            .anonymous(&ObjectKind::Pod.gvk())
            .expect("pod accessor");
        let err = anon
            .create(serde_json::json!({"spec": {"containers": "not-a-list"}}))
            .await
            .expect_err("must reject");
        assert!(matches!(err, Error::InvalidType { .. }));
    }
}
