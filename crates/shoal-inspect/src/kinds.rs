//! Object kind identities cached by the inspector
//!
//! Closed enum of every kind the cache knows about, with the group/version/
//! kind and group/version/resource identities used for error construction
//! and type-erased dispatch.

use kube::core::GroupVersionKind;

/// Kinds cached by the inspector.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ObjectKind {
    /// core/v1 Pod
    Pod,
    /// core/v1 Secret
    Secret,
    /// core/v1 ConfigMap
    ConfigMap,
    /// core/v1 PersistentVolumeClaim
    PersistentVolumeClaim,
    /// policy PodDisruptionBudget (version negotiated per server)
    PodDisruptionBudget,
    /// core/v1 Node (cluster scoped)
    Node,
    /// core/v1 Endpoints
    Endpoints,
    /// shoal.dev ShoalMember
    ShoalMember,
    /// shoal.dev ShoalTask
    ShoalTask,
}

/// All ObjectKind variants for iteration.
pub const ALL_KINDS: &[ObjectKind] = &[
    ObjectKind::Pod,
    ObjectKind::Secret,
    ObjectKind::ConfigMap,
    ObjectKind::PersistentVolumeClaim,
    ObjectKind::PodDisruptionBudget,
    ObjectKind::Node,
    ObjectKind::Endpoints,
    ObjectKind::ShoalMember,
    ObjectKind::ShoalTask,
];

impl ObjectKind {
    /// API group.
    pub fn group(&self) -> &'static str {
        match self {
            Self::Pod
            | Self::Secret
            | Self::ConfigMap
            | Self::PersistentVolumeClaim
            | Self::Node
            | Self::Endpoints => "",
            Self::PodDisruptionBudget => "policy",
            Self::ShoalMember | Self::ShoalTask => "shoal.dev",
        }
    }

    /// API version within the group.
    ///
    /// For PodDisruptionBudget this is the preferred version; the snapshot
    /// records the version actually negotiated against the live server.
    pub fn version(&self) -> &'static str {
        match self {
            Self::ShoalMember | Self::ShoalTask => "v1alpha1",
            _ => "v1",
        }
    }

    /// Kubernetes Kind string.
    pub fn kind_str(&self) -> &'static str {
        match self {
            Self::Pod => "Pod",
            Self::Secret => "Secret",
            Self::ConfigMap => "ConfigMap",
            Self::PersistentVolumeClaim => "PersistentVolumeClaim",
            Self::PodDisruptionBudget => "PodDisruptionBudget",
            Self::Node => "Node",
            Self::Endpoints => "Endpoints",
            Self::ShoalMember => "ShoalMember",
            Self::ShoalTask => "ShoalTask",
        }
    }

    /// Plural resource name, used for not-found error construction.
    pub fn resource(&self) -> &'static str {
        match self {
            Self::Pod => "pods",
            Self::Secret => "secrets",
            Self::ConfigMap => "configmaps",
            Self::PersistentVolumeClaim => "persistentvolumeclaims",
            Self::PodDisruptionBudget => "poddisruptionbudgets",
            Self::Node => "nodes",
            Self::Endpoints => "endpoints",
            Self::ShoalMember => "shoalmembers",
            Self::ShoalTask => "shoaltasks",
        }
    }

    /// Whether the kind exposes a status subresource.
    ///
    /// Kinds without one surface `update_status` as a not-implemented error
    /// so callers can distinguish "kind has no status" from a transport
    /// failure.
    pub fn has_status_subresource(&self) -> bool {
        !matches!(self, Self::Secret | Self::ConfigMap | Self::Endpoints)
    }

    /// Whether the kind is namespaced.
    pub fn namespaced(&self) -> bool {
        !matches!(self, Self::Node)
    }

    /// Group/version/kind identity.
    pub fn gvk(&self) -> GroupVersionKind {
        GroupVersionKind::gvk(self.group(), self.version(), self.kind_str())
    }

    /// Whether a GVK names this kind.
    ///
    /// The version is intentionally ignored for PodDisruptionBudget, whose
    /// served version is negotiated per server.
    pub fn matches(&self, gvk: &GroupVersionKind) -> bool {
        if gvk.group != self.group() || gvk.kind != self.kind_str() {
            return false;
        }
        matches!(self, Self::PodDisruptionBudget) || gvk.version == self.version()
    }

    /// Find the kind a GVK refers to.
    pub fn from_gvk(gvk: &GroupVersionKind) -> Option<ObjectKind> {
        ALL_KINDS.iter().copied().find(|k| k.matches(gvk))
    }
}
