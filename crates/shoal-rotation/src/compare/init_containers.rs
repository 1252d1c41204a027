//! Init container comparator
//!
//! Policy-gated per group: `Ignore` mode adopts any init container
//! difference silently; the default `Update` mode only adopts differences
//! in reserved (operator-managed) init containers, and only when count and
//! order already match.

use k8s_openapi::api::core::v1::PodTemplateSpec;

use shoal_common::crd::InitContainerMode;
use shoal_common::{Result, RESERVED_INIT_CONTAINER_NAMES};

use crate::compare::{both_specs, containers_aligned, CompareContext, Outcome};

/// Compare init containers under the group's policy.
pub fn init_containers(ctx: &CompareContext<'_>, status: &mut PodTemplateSpec) -> Result<Outcome> {
    let Some((desired, status)) = both_specs(ctx.desired, status) else {
        return Ok(Outcome::unchanged());
    };
    if desired.init_containers == status.init_containers {
        return Ok(Outcome::unchanged());
    }

    match ctx
        .deployment
        .group_spec(ctx.group)
        .init_container_mode()
    {
        InitContainerMode::Ignore => {
            status.init_containers = desired.init_containers.clone();
            Ok(Outcome::silent())
        }
        InitContainerMode::Update => {
            let (Some(d), Some(s)) = (
                desired.init_containers.as_deref(),
                status.init_containers.as_deref_mut(),
            ) else {
                return Ok(Outcome::unchanged());
            };
            if !containers_aligned(d, s) {
                return Ok(Outcome::unchanged());
            }

            let mut outcome = Outcome::unchanged();
            for (d, s) in d.iter().zip(s.iter_mut()) {
                if d == s {
                    continue;
                }
                if RESERVED_INIT_CONTAINER_NAMES.contains(&d.name.as_str()) {
                    *s = d.clone();
                    outcome = outcome.merge(Outcome::silent());
                }
            }
            Ok(outcome)
        }
    }
}
