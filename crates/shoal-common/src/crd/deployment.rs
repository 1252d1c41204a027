//! Deployment-wide configuration model
//!
//! The subset of the `ShoalDeployment` spec the reconciliation core needs:
//! deployment mode, per-group policies, and member propagation behavior.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Topology of the managed deployment
#[derive(Clone, Copy, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub enum DeploymentMode {
    /// One standalone member
    Single,
    /// Full cluster: keepers, shards and routers
    #[default]
    Cluster,
}

impl DeploymentMode {
    /// Server groups participating in this mode
    pub fn groups(&self) -> &'static [ServerGroup] {
        match self {
            Self::Single => &[ServerGroup::Solo],
            Self::Cluster => &[ServerGroup::Keeper, ServerGroup::Shard, ServerGroup::Router],
        }
    }
}

/// A class of workload members with a shared role
#[derive(Clone, Copy, Debug, Deserialize, Serialize, JsonSchema, PartialEq, Eq, Hash)]
#[serde(rename_all = "camelCase")]
pub enum ServerGroup {
    /// Standalone member (Single mode only)
    Solo,
    /// Consensus keeper
    Keeper,
    /// Data shard server
    Shard,
    /// Client-facing router
    Router,
}

impl ServerGroup {
    /// Role string used in object names and labels
    pub fn as_role(&self) -> &'static str {
        match self {
            Self::Solo => "solo",
            Self::Keeper => "keeper",
            Self::Shard => "shard",
            Self::Router => "router",
        }
    }

    /// Whether this group serves external client traffic
    ///
    /// Externally-serving members never silently adopt timezone volume
    /// changes, since a mount flip is visible to connected clients.
    pub fn is_externally_serving(&self) -> bool {
        matches!(self, Self::Router)
    }
}

/// How member-level spec changes propagate to running pods
#[derive(Clone, Copy, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub enum MemberPropagationMode {
    /// Wait for the member to restart for another reason
    #[default]
    OnRestart,
    /// Restart immediately whenever a change is pending
    Always,
}

/// Policy for diffs in init containers
#[derive(Clone, Copy, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub enum InitContainerMode {
    /// Any init container diff is adopted without restart
    Ignore,
    /// Only reserved (operator-managed) init containers may be adopted
    #[default]
    Update,
}

/// Per-group configuration
#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ServerGroupSpec {
    /// Requested member count
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub count: Option<i32>,

    /// Init container diff policy; `Update` when unset
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub init_container_mode: Option<InitContainerMode>,
}

impl ServerGroupSpec {
    /// Effective init container policy
    pub fn init_container_mode(&self) -> InitContainerMode {
        self.init_container_mode.unwrap_or_default()
    }
}

/// Deployment-wide configuration consumed by the reconciliation core
#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ShoalDeploymentSpec {
    /// Deployment topology; `Cluster` when unset
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mode: Option<DeploymentMode>,

    /// Member propagation behavior; `OnRestart` when unset
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub member_propagation_mode: Option<MemberPropagationMode>,

    /// Standalone member configuration
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub solo: Option<ServerGroupSpec>,

    /// Keeper group configuration
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub keepers: Option<ServerGroupSpec>,

    /// Shard group configuration
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub shards: Option<ServerGroupSpec>,

    /// Router group configuration
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub routers: Option<ServerGroupSpec>,
}

impl ShoalDeploymentSpec {
    /// Effective deployment mode
    pub fn mode(&self) -> DeploymentMode {
        self.mode.unwrap_or_default()
    }

    /// Effective member propagation mode
    pub fn member_propagation_mode(&self) -> MemberPropagationMode {
        self.member_propagation_mode.unwrap_or_default()
    }

    /// Configuration of one server group, defaulted when absent
    pub fn group_spec(&self, group: ServerGroup) -> ServerGroupSpec {
        let spec = match group {
            ServerGroup::Solo => &self.solo,
            ServerGroup::Keeper => &self.keepers,
            ServerGroup::Shard => &self.shards,
            ServerGroup::Router => &self.routers,
        };
        spec.clone().unwrap_or_default()
    }
}
