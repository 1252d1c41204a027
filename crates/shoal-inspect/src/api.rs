//! Remote object-store boundary
//!
//! `KindApi<K>` is the async seam between the cache and the remote typed
//! object-store API. Production code gets one blanket implementation over
//! `kube::Api<K>`; tests substitute in-memory fakes, so neither the
//! inspector nor the mod clients ever assume a transport.

use std::fmt::Debug;
use std::sync::Arc;

use async_trait::async_trait;
use k8s_openapi::api::core::v1::{ConfigMap, Endpoints, Node, PersistentVolumeClaim, Pod, Secret};
use k8s_openapi::api::policy::v1::PodDisruptionBudget;
use kube::api::{Api, DeleteParams, ListParams, Patch, PatchParams, PostParams};
use serde::de::DeserializeOwned;
use serde::Serialize;

use shoal_common::crd::{ShoalMember, ShoalTask};
use shoal_common::{Error, Result};

/// One page worth of a listing request.
#[derive(Debug, Clone, Default)]
pub struct PageRequest {
    /// Maximum number of items in the response; bounds single-page cost.
    pub limit: u32,
    /// Continuation token from the previous page, if any.
    pub continue_token: Option<String>,
}

/// One page of listed objects.
#[derive(Debug, Clone)]
pub struct Page<K> {
    /// Items in this page.
    pub items: Vec<K>,
    /// Token for the next page; None when this page is the last.
    pub continue_token: Option<String>,
    /// Server estimate of items remaining after this page.
    pub remaining: Option<i64>,
}

/// Typed access to the remote object store for one kind.
#[async_trait]
pub trait KindApi<K>: Send + Sync {
    /// List one page of objects.
    async fn list_page(&self, page: PageRequest) -> Result<Page<K>>;

    /// Fetch one object by name.
    async fn get(&self, name: &str) -> Result<K>;

    /// Create an object.
    async fn create(&self, obj: &K) -> Result<K>;

    /// Replace an object.
    async fn update(&self, obj: &K) -> Result<K>;

    /// Replace an object's status subresource.
    async fn update_status(&self, obj: &K) -> Result<K>;

    /// Patch an object by patch-type and payload.
    async fn patch(&self, name: &str, patch: &Patch<serde_json::Value>) -> Result<K>;

    /// Delete an object, optionally with an explicit grace period.
    async fn delete(&self, name: &str, grace_period_seconds: Option<u32>) -> Result<()>;
}

#[async_trait]
impl<K> KindApi<K> for Api<K>
where
    K: kube::Resource + Clone + DeserializeOwned + Serialize + Debug + Send + Sync,
{
    async fn list_page(&self, page: PageRequest) -> Result<Page<K>> {
        let mut params = ListParams::default().limit(page.limit);
        if let Some(token) = &page.continue_token {
            params = params.continue_token(token);
        }
        let list = self.list(&params).await?;
        Ok(Page {
            continue_token: list.metadata.continue_.clone().filter(|c| !c.is_empty()),
            remaining: list.metadata.remaining_item_count,
            items: list.items,
        })
    }

    async fn get(&self, name: &str) -> Result<K> {
        Ok(Api::get(self, name).await?)
    }

    async fn create(&self, obj: &K) -> Result<K> {
        Ok(Api::create(self, &PostParams::default(), obj).await?)
    }

    async fn update(&self, obj: &K) -> Result<K> {
        let name = object_name(obj)?;
        Ok(Api::replace(self, &name, &PostParams::default(), obj).await?)
    }

    async fn update_status(&self, obj: &K) -> Result<K> {
        let name = object_name(obj)?;
        let data = serde_json::to_vec(obj)
            .map_err(|e| Error::serialization(format!("encoding status update: {e}")))?;
        Ok(Api::replace_status(self, &name, &PostParams::default(), data).await?)
    }

    async fn patch(&self, name: &str, patch: &Patch<serde_json::Value>) -> Result<K> {
        Ok(Api::patch(self, name, &PatchParams::default(), patch).await?)
    }

    async fn delete(&self, name: &str, grace_period_seconds: Option<u32>) -> Result<()> {
        let mut params = DeleteParams::default();
        params.grace_period_seconds = grace_period_seconds;
        let _ = Api::delete(self, name, &params).await?;
        Ok(())
    }
}

fn object_name<K: kube::Resource>(obj: &K) -> Result<String> {
    obj.meta()
        .name
        .clone()
        .ok_or_else(|| Error::internal("api", "object has no name"))
}

/// List every page of a kind, accumulating until the continuation token runs
/// out, and hand back the full item set.
pub async fn list_all_pages<K>(api: &dyn KindApi<K>, batch_size: u32) -> Result<Vec<K>> {
    let mut items: Vec<K> = Vec::new();
    let mut token: Option<String> = None;

    loop {
        let page = api
            .list_page(PageRequest {
                limit: batch_size,
                continue_token: token.take(),
            })
            .await?;

        if items.is_empty() {
            if let Some(remaining) = page.remaining {
                items.reserve(page.items.len() + remaining.max(0) as usize);
            }
        }
        items.extend(page.items);

        match page.continue_token {
            Some(next) => token = Some(next),
            None => return Ok(items),
        }
    }
}

/// Detected remote server version.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerVersion {
    /// Major version number.
    pub major: u32,
    /// Minor version number.
    pub minor: u32,
    /// Raw version string as reported by the server.
    pub raw: String,
}

impl ServerVersion {
    /// Parse from major/minor strings as reported by the version endpoint.
    ///
    /// Some distributions report minors like `"21+"`; trailing non-digits
    /// are ignored.
    pub fn parse(major: &str, minor: &str, raw: impl Into<String>) -> Option<Self> {
        let digits = |s: &str| -> Option<u32> {
            let trimmed: String = s.chars().take_while(|c| c.is_ascii_digit()).collect();
            trimmed.parse().ok()
        };
        Some(Self {
            major: digits(major)?,
            minor: digits(minor)?,
            raw: raw.into(),
        })
    }

    /// Whether the server is at least the given version.
    pub fn at_least(&self, major: u32, minor: u32) -> bool {
        (self.major, self.minor) >= (major, minor)
    }
}

impl std::fmt::Display for ServerVersion {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.raw)
    }
}

/// Probe of the remote server's version, taken once per refresh.
#[async_trait]
pub trait ClusterInfo: Send + Sync {
    /// Detect the server version.
    async fn server_version(&self) -> Result<ServerVersion>;
}

#[async_trait]
impl ClusterInfo for kube::Client {
    async fn server_version(&self) -> Result<ServerVersion> {
        let info = self.apiserver_version().await?;
        ServerVersion::parse(&info.major, &info.minor, info.git_version.clone())
            .ok_or_else(|| Error::internal("api", format!("unparsable server version {info:?}")))
    }
}

/// Shared handles to the remote API for every cached kind.
///
/// Built once at startup; loaders, mod clients and anonymous accessors all
/// clone from here so tests can substitute any kind's backend.
#[derive(Clone)]
pub struct ApiSet {
    /// Pod API handle.
    pub pods: Arc<dyn KindApi<Pod>>,
    /// Secret API handle.
    pub secrets: Arc<dyn KindApi<Secret>>,
    /// ConfigMap API handle.
    pub config_maps: Arc<dyn KindApi<ConfigMap>>,
    /// PersistentVolumeClaim API handle.
    pub pvcs: Arc<dyn KindApi<PersistentVolumeClaim>>,
    /// PodDisruptionBudget API handle.
    pub pdbs: Arc<dyn KindApi<PodDisruptionBudget>>,
    /// Node API handle (cluster scoped).
    pub nodes: Arc<dyn KindApi<Node>>,
    /// Endpoints API handle.
    pub endpoints: Arc<dyn KindApi<Endpoints>>,
    /// ShoalMember API handle.
    pub members: Arc<dyn KindApi<ShoalMember>>,
    /// ShoalTask API handle.
    pub tasks: Arc<dyn KindApi<ShoalTask>>,
}

impl ApiSet {
    /// Build handles over a kube client for one workload namespace.
    pub fn from_client(client: &kube::Client, namespace: &str) -> Self {
        Self {
            pods: Arc::new(Api::<Pod>::namespaced(client.clone(), namespace)),
            secrets: Arc::new(Api::<Secret>::namespaced(client.clone(), namespace)),
            config_maps: Arc::new(Api::<ConfigMap>::namespaced(client.clone(), namespace)),
            pvcs: Arc::new(Api::<PersistentVolumeClaim>::namespaced(
                client.clone(),
                namespace,
            )),
            pdbs: Arc::new(Api::<PodDisruptionBudget>::namespaced(
                client.clone(),
                namespace,
            )),
            nodes: Arc::new(Api::<Node>::all(client.clone())),
            endpoints: Arc::new(Api::<Endpoints>::namespaced(client.clone(), namespace)),
            members: Arc::new(Api::<ShoalMember>::namespaced(client.clone(), namespace)),
            tasks: Arc::new(Api::<ShoalTask>::namespaced(client.clone(), namespace)),
        }
    }
}
