//! ShoalMember and ShoalTask Custom Resource Definitions
//!
//! A `ShoalMember` tracks one workload participant: the desired pod template
//! (spec) and the last-applied pod template (status), each with a content
//! checksum. The rotation engine diffs the two. `ShoalTask` represents a
//! one-shot maintenance job attached to a member.

use k8s_openapi::api::core::v1::PodTemplateSpec;
use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use super::deployment::ServerGroup;

/// Lifecycle phase of one member
#[derive(Clone, Copy, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub enum MemberPhase {
    /// Created but not yet scheduled
    #[default]
    Pending,
    /// Running and serving
    Ready,
    /// Shutdown in progress
    Terminating,
    /// Shutdown finished
    Terminated,
    /// Unrecoverable
    Failed,
}

impl MemberPhase {
    /// Whether rotation is possible at all in this phase
    pub fn rotation_possible(&self) -> bool {
        matches!(self, Self::Ready)
    }
}

/// Boolean condition types tracked per member
#[derive(Clone, Copy, Debug, Deserialize, Serialize, JsonSchema, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub enum MemberConditionType {
    /// A restart has been requested and not yet performed
    PendingRestart,
    /// Member serving certificates await rotation
    PendingTlsRotation,
    /// Member is shutting down
    Terminating,
    /// Member has shut down
    Terminated,
}

/// One boolean condition on a member
#[derive(Clone, Debug, Deserialize, Serialize, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct MemberCondition {
    /// Condition type
    #[serde(rename = "type")]
    pub condition_type: MemberConditionType,
    /// Condition value
    pub status: bool,
}

/// Set of member conditions with absent-means-false lookup
#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq)]
pub struct MemberConditionSet(pub Vec<MemberCondition>);

impl MemberConditionSet {
    /// Whether a condition is present and true
    pub fn is_true(&self, condition_type: MemberConditionType) -> bool {
        self.0
            .iter()
            .any(|c| c.condition_type == condition_type && c.status)
    }

    /// Set or replace a condition
    pub fn set(&mut self, condition_type: MemberConditionType, status: bool) {
        if let Some(c) = self
            .0
            .iter_mut()
            .find(|c| c.condition_type == condition_type)
        {
            c.status = status;
        } else {
            self.0.push(MemberCondition {
                condition_type,
                status,
            });
        }
    }
}

/// Runtime state of one member, recorded on the deployment status
#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct MemberState {
    /// Stable member identity
    pub id: String,

    /// Lifecycle phase
    #[serde(default)]
    pub phase: MemberPhase,

    /// Boolean conditions
    #[serde(default)]
    pub conditions: MemberConditionSet,

    /// Name of the member's pod, if one exists
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pod_name: Option<String>,

    /// UID of the member's pod as last observed
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pod_uid: Option<String>,

    /// Checksum of the pod spec version currently applied to the member
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pod_spec_version: Option<String>,

    /// Name of the member's persistent volume claim, if any
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pvc_name: Option<String>,
}

/// A checksummed pod template: one side of a rotation decision
#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct MemberTemplate {
    /// Full pod template specification
    pub pod_template: PodTemplateSpec,

    /// Deterministic content checksum over the canonicalized pod spec
    pub checksum: String,
}

/// Specification for a ShoalMember
///
/// `group` has no default on purpose: a member without an explicit server
/// group is a configuration error, not a shard.
#[derive(CustomResource, Clone, Debug, Deserialize, Serialize, JsonSchema, PartialEq)]
#[kube(
    group = "shoal.dev",
    version = "v1alpha1",
    kind = "ShoalMember",
    plural = "shoalmembers",
    namespaced,
    status = "ShoalMemberStatus",
    printcolumn = r#"{"name":"Group","type":"string","jsonPath":".spec.group"}"#,
    printcolumn = r#"{"name":"Age","type":"date","jsonPath":".metadata.creationTimestamp"}"#
)]
#[serde(rename_all = "camelCase")]
pub struct ShoalMemberSpec {
    /// Owning deployment name
    pub deployment_name: String,

    /// Server group this member belongs to
    pub group: ServerGroup,

    /// Desired pod template with checksum
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub template: Option<MemberTemplate>,
}

/// Status of a ShoalMember
#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ShoalMemberStatus {
    /// Last-applied pod template with checksum
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub template: Option<MemberTemplate>,
}

/// Specification for a ShoalTask
#[derive(CustomResource, Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq)]
#[kube(
    group = "shoal.dev",
    version = "v1alpha1",
    kind = "ShoalTask",
    plural = "shoaltasks",
    namespaced,
    status = "ShoalTaskStatus",
    printcolumn = r#"{"name":"Type","type":"string","jsonPath":".spec.taskType"}"#
)]
#[serde(rename_all = "camelCase")]
pub struct ShoalTaskSpec {
    /// Task type (e.g. "resync", "compact")
    pub task_type: String,

    /// Member the task targets, when member-scoped
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub member: Option<String>,
}

/// Status of a ShoalTask
#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ShoalTaskStatus {
    /// Current task state
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub state: Option<String>,
}
