//! Runtime container comparators
//!
//! An image-only change on any container becomes an in-place image update
//! naming that container. A command change restricted to the log-level
//! argument on the server container becomes an in-place args update.
//! Lifecycle handlers on the server container only run at container start
//! and stop, so their changes are adopted silently. Any other container
//! difference is left unresolved for the checksum safety net.

use k8s_openapi::api::core::v1::PodTemplateSpec;

use shoal_common::{Result, LOG_LEVEL_ARG_PREFIX, SERVER_CONTAINER_NAME};

use crate::compare::{both_specs, containers_aligned, CompareContext, Outcome};
use crate::plan::{Action, ActionType, PARAM_CONTAINER_NAME, PARAM_IMAGE};

/// Compare runtime containers pairwise.
pub fn server_containers(
    ctx: &CompareContext<'_>,
    status: &mut PodTemplateSpec,
) -> Result<Outcome> {
    let Some((desired, status)) = both_specs(ctx.desired, status) else {
        return Ok(Outcome::unchanged());
    };
    if !containers_aligned(&desired.containers, &status.containers) {
        return Ok(Outcome::unchanged());
    }

    let mut outcome = Outcome::unchanged();
    for (d, s) in desired.containers.iter().zip(status.containers.iter_mut()) {
        if d == s {
            continue;
        }

        let mut image_probe = s.clone();
        image_probe.image = d.image.clone();
        if image_probe == *d {
            outcome = outcome.merge(Outcome::in_place(vec![Action::new(
                ActionType::RuntimeContainerImageUpdate,
            )
            .with_param(PARAM_CONTAINER_NAME, &d.name)
            .with_param(PARAM_IMAGE, d.image.clone().unwrap_or_default())]));
            s.image = d.image.clone();
            continue;
        }

        if d.name == SERVER_CONTAINER_NAME {
            let mut d_stripped = d.clone();
            let mut s_stripped = s.clone();
            d_stripped.command = strip_log_level(d.command.as_deref());
            s_stripped.command = strip_log_level(s.command.as_deref());
            if d_stripped == s_stripped {
                outcome = outcome.merge(Outcome::in_place(vec![Action::new(
                    ActionType::RuntimeContainerArgsLogLevelUpdate,
                )
                .with_param(PARAM_CONTAINER_NAME, &d.name)]));
                s.command = d.command.clone();
            }
        }
    }
    Ok(outcome)
}

/// Silently adopt container port changes when ports are the only
/// difference on a container.
pub fn container_ports(ctx: &CompareContext<'_>, status: &mut PodTemplateSpec) -> Result<Outcome> {
    let Some((desired, status)) = both_specs(ctx.desired, status) else {
        return Ok(Outcome::unchanged());
    };
    if !containers_aligned(&desired.containers, &status.containers) {
        return Ok(Outcome::unchanged());
    }

    let mut outcome = Outcome::unchanged();
    for (d, s) in desired.containers.iter().zip(status.containers.iter_mut()) {
        if d == s {
            continue;
        }
        let mut probe = s.clone();
        probe.ports = d.ports.clone();
        if probe == *d {
            s.ports = d.ports.clone();
            outcome = outcome.merge(Outcome::silent());
        }
    }
    Ok(outcome)
}

/// Silently adopt lifecycle handler changes on the server container.
pub fn container_lifecycle(
    ctx: &CompareContext<'_>,
    status: &mut PodTemplateSpec,
) -> Result<Outcome> {
    let Some((desired, status)) = both_specs(ctx.desired, status) else {
        return Ok(Outcome::unchanged());
    };
    if !containers_aligned(&desired.containers, &status.containers) {
        return Ok(Outcome::unchanged());
    }

    let mut outcome = Outcome::unchanged();
    for (d, s) in desired.containers.iter().zip(status.containers.iter_mut()) {
        if d.name == SERVER_CONTAINER_NAME && d.lifecycle != s.lifecycle {
            s.lifecycle = d.lifecycle.clone();
            outcome = outcome.merge(Outcome::silent());
        }
    }
    Ok(outcome)
}

fn strip_log_level(command: Option<&[String]>) -> Option<Vec<String>> {
    command.map(|args| {
        args.iter()
            .filter(|arg| !arg.starts_with(LOG_LEVEL_ARG_PREFIX))
            .cloned()
            .collect()
    })
}
