//! Environment comparator
//!
//! Environment variables are diffed per container by name. A diff confined
//! to the allow-listed lifecycle keys is adopted silently; any other
//! differing key forces a graceful rotation. `envFrom` references are
//! adopted silently only when the diff is confined to the deployment's
//! managed ConfigMap reference; a changed Secret or foreign ConfigMap
//! reference must rotate the pod onto the new source.

use std::collections::BTreeMap;

use k8s_openapi::api::core::v1::{EnvFromSource, EnvVar, PodTemplateSpec};

use shoal_common::{Result, MANAGED_CONFIGMAP_NAME, SAFE_ENV_KEYS};

use crate::compare::{both_specs, containers_aligned, CompareContext, Outcome};

/// Compare environment variables and envFrom references per container.
pub fn environment(ctx: &CompareContext<'_>, status: &mut PodTemplateSpec) -> Result<Outcome> {
    let Some((desired, status)) = both_specs(ctx.desired, status) else {
        return Ok(Outcome::unchanged());
    };
    if !containers_aligned(&desired.containers, &status.containers) {
        return Ok(Outcome::unchanged());
    }

    let mut outcome = Outcome::unchanged();
    for (d, s) in desired.containers.iter().zip(status.containers.iter_mut()) {
        if d.env != s.env {
            if differing_keys(d.env.as_deref(), s.env.as_deref())
                .iter()
                .all(|key| SAFE_ENV_KEYS.contains(&key.as_str()))
            {
                s.env = d.env.clone();
                outcome = outcome.merge(Outcome::silent());
            } else {
                outcome = outcome.merge(Outcome::graceful());
            }
        }

        if d.env_from != s.env_from
            && env_from_equal_ignoring_managed(d.env_from.as_deref(), s.env_from.as_deref())
        {
            s.env_from = d.env_from.clone();
            outcome = outcome.merge(Outcome::silent());
        }
    }
    Ok(outcome)
}

fn index(vars: Option<&[EnvVar]>) -> BTreeMap<&str, &EnvVar> {
    vars.unwrap_or_default()
        .iter()
        .map(|v| (v.name.as_str(), v))
        .collect()
}

fn differing_keys(desired: Option<&[EnvVar]>, status: Option<&[EnvVar]>) -> Vec<String> {
    let d = index(desired);
    let s = index(status);

    let mut keys: Vec<String> = Vec::new();
    for (name, var) in &d {
        if s.get(name) != Some(var) {
            keys.push((*name).to_string());
        }
    }
    for name in s.keys() {
        if !d.contains_key(name) {
            keys.push((*name).to_string());
        }
    }
    keys
}

/// Whether two envFrom lists are equal once references to the deployment's
/// managed ConfigMap are removed from both sides.
fn env_from_equal_ignoring_managed(
    desired: Option<&[EnvFromSource]>,
    status: Option<&[EnvFromSource]>,
) -> bool {
    strip_managed(desired) == strip_managed(status)
}

fn strip_managed(sources: Option<&[EnvFromSource]>) -> Vec<&EnvFromSource> {
    sources
        .unwrap_or_default()
        .iter()
        .filter(|source| {
            !source
                .config_map_ref
                .as_ref()
                .is_some_and(|r| r.name == MANAGED_CONFIGMAP_NAME)
        })
        .collect()
}
