//! Field-group comparators over pod templates
//!
//! Each comparator is a pure function of the deployment configuration, the
//! workload group and the desired template, plus a mutable working copy of
//! the status template. A comparator silently adopts the field groups it
//! judges safe by writing them into the working copy; anything it cannot
//! resolve it leaves in place for the engine's checksum safety net to
//! escalate. Comparators never see the caller's original status template.

use k8s_openapi::api::core::v1::{Container, PodSpec, PodTemplateSpec};

use shoal_common::crd::{ServerGroup, ShoalDeploymentSpec};
use shoal_common::Result;

use crate::mode::Mode;
use crate::plan::Plan;

pub mod containers;
pub mod env;
pub mod init_containers;
pub mod pod;
pub mod probes;
pub mod volumes;

/// Read-only inputs shared by every comparator.
pub struct CompareContext<'a> {
    /// Deployment-wide configuration.
    pub deployment: &'a ShoalDeploymentSpec,
    /// Workload group of the member under decision.
    pub group: ServerGroup,
    /// Desired pod template.
    pub desired: &'a PodTemplateSpec,
}

/// One comparator's verdict: a severity and any planned in-place actions.
#[derive(Debug, Clone, Default)]
pub struct Outcome {
    /// Severity this field group demands.
    pub mode: Mode,
    /// In-place actions, only populated for `Mode::InPlace`.
    pub plan: Plan,
}

impl Outcome {
    /// Nothing to do for this field group.
    pub fn unchanged() -> Self {
        Self::default()
    }

    /// Field group adopted into the working copy without a restart.
    pub fn silent() -> Self {
        Self {
            mode: Mode::Silent,
            plan: Plan::new(),
        }
    }

    /// Field group requires an orderly rotation.
    pub fn graceful() -> Self {
        Self {
            mode: Mode::Graceful,
            plan: Plan::new(),
        }
    }

    /// Field group resolved by in-place actions on the running pod.
    pub fn in_place(plan: Plan) -> Self {
        Self {
            mode: Mode::InPlace,
            plan,
        }
    }

    /// Combine with another verdict: max severity, concatenated plans.
    pub fn merge(mut self, other: Outcome) -> Self {
        self.mode = self.mode.and(other.mode);
        self.plan.extend(other.plan);
        self
    }
}

/// A field-group comparator over (context, working status copy).
pub type Comparator = fn(&CompareContext<'_>, &mut PodTemplateSpec) -> Result<Outcome>;

/// Every comparator the engine runs, in evaluation order.
pub const COMPARATORS: &[Comparator] = &[
    containers::server_containers,
    containers::container_ports,
    containers::container_lifecycle,
    init_containers::init_containers,
    pod::scheduler_name,
    pod::termination_grace,
    pod::affinity,
    pod::security_context,
    env::environment,
    volumes::volumes,
    volumes::volume_mounts,
    probes::probes,
];

/// Both pod specs, or nothing to compare when either side lacks one.
pub(crate) fn both_specs<'d, 's>(
    desired: &'d PodTemplateSpec,
    status: &'s mut PodTemplateSpec,
) -> Option<(&'d PodSpec, &'s mut PodSpec)> {
    match (desired.spec.as_ref(), status.spec.as_mut()) {
        (Some(d), Some(s)) => Some((d, s)),
        _ => None,
    }
}

/// Whether two container lists can be compared pairwise: same count, same
/// names in the same order.
pub(crate) fn containers_aligned(desired: &[Container], status: &[Container]) -> bool {
    desired.len() == status.len()
        && desired.iter().zip(status).all(|(d, s)| d.name == s.name)
}
