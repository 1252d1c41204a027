//! Volume and volume mount comparators
//!
//! Diffs are classified per volume name. The lifecycle-support volume is
//! adopted silently. The timezone volume is adopted silently unless it is
//! being removed entirely or the member serves external clients; both of
//! those rotate gracefully. Any other differing volume rotates gracefully.
//! Adoption only happens when every differing name classified as silent.

use std::collections::BTreeMap;

use k8s_openapi::api::core::v1::{PodTemplateSpec, Volume, VolumeMount};

use shoal_common::crd::ServerGroup;
use shoal_common::{Result, LIFECYCLE_VOLUME_NAME, TIMEZONE_VOLUME_NAME};

use crate::compare::{both_specs, containers_aligned, CompareContext, Outcome};
use crate::mode::Mode;

/// Compare pod volumes.
pub fn volumes(ctx: &CompareContext<'_>, status: &mut PodTemplateSpec) -> Result<Outcome> {
    let Some((desired, status)) = both_specs(ctx.desired, status) else {
        return Ok(Outcome::unchanged());
    };
    if desired.volumes == status.volumes {
        return Ok(Outcome::unchanged());
    }

    let d: BTreeMap<&str, &Volume> = index_volumes(desired.volumes.as_deref());
    let s: BTreeMap<&str, &Volume> = index_volumes(status.volumes.as_deref());

    let mut outcome = Outcome::unchanged();
    for name in differing_names(&d, &s) {
        let removed = s.contains_key(name.as_str()) && !d.contains_key(name.as_str());
        outcome = outcome.merge(classify(&name, removed, ctx.group));
    }

    if outcome.mode == Mode::Silent {
        status.volumes = desired.volumes.clone();
    }
    Ok(outcome)
}

/// Compare container volume mounts, under the same per-name policy as the
/// volumes themselves.
pub fn volume_mounts(ctx: &CompareContext<'_>, status: &mut PodTemplateSpec) -> Result<Outcome> {
    let Some((desired, status)) = both_specs(ctx.desired, status) else {
        return Ok(Outcome::unchanged());
    };
    if !containers_aligned(&desired.containers, &status.containers) {
        return Ok(Outcome::unchanged());
    }

    let mut outcome = Outcome::unchanged();
    for (d, s) in desired.containers.iter().zip(status.containers.iter_mut()) {
        if d.volume_mounts == s.volume_mounts {
            continue;
        }

        let dm: BTreeMap<&str, &VolumeMount> = index_mounts(d.volume_mounts.as_deref());
        let sm: BTreeMap<&str, &VolumeMount> = index_mounts(s.volume_mounts.as_deref());

        let mut container_outcome = Outcome::unchanged();
        for name in differing_names(&dm, &sm) {
            let removed = sm.contains_key(name.as_str()) && !dm.contains_key(name.as_str());
            container_outcome = container_outcome.merge(classify(&name, removed, ctx.group));
        }

        if container_outcome.mode == Mode::Silent {
            s.volume_mounts = d.volume_mounts.clone();
        }
        outcome = outcome.merge(container_outcome);
    }
    Ok(outcome)
}

fn classify(name: &str, removed: bool, group: ServerGroup) -> Outcome {
    if name == LIFECYCLE_VOLUME_NAME {
        return Outcome::silent();
    }
    if name == TIMEZONE_VOLUME_NAME {
        if removed || group.is_externally_serving() {
            return Outcome::graceful();
        }
        return Outcome::silent();
    }
    Outcome::graceful()
}

fn index_volumes(volumes: Option<&[Volume]>) -> BTreeMap<&str, &Volume> {
    volumes
        .unwrap_or_default()
        .iter()
        .map(|v| (v.name.as_str(), v))
        .collect()
}

fn index_mounts(mounts: Option<&[VolumeMount]>) -> BTreeMap<&str, &VolumeMount> {
    mounts
        .unwrap_or_default()
        .iter()
        .map(|m| (m.name.as_str(), m))
        .collect()
}

fn differing_names<T: PartialEq>(
    desired: &BTreeMap<&str, &T>,
    status: &BTreeMap<&str, &T>,
) -> Vec<String> {
    let mut names: Vec<String> = Vec::new();
    for (name, item) in desired {
        if status.get(name) != Some(item) {
            names.push((*name).to_string());
        }
    }
    for name in status.keys() {
        if !desired.contains_key(name) {
            names.push((*name).to_string());
        }
    }
    names
}
