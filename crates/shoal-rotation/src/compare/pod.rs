//! Pod-level field comparators
//!
//! Scheduler name, termination grace period and affinity are adopted
//! silently. The pod security context only needs reconciling when one side
//! is nil and the other a zero value; a real difference stays unresolved.

use k8s_openapi::api::core::v1::PodTemplateSpec;

use shoal_common::Result;

use crate::checksum::affinity_checksum;
use crate::compare::{both_specs, CompareContext, Outcome};

/// Silently adopt a scheduler name change.
pub fn scheduler_name(ctx: &CompareContext<'_>, status: &mut PodTemplateSpec) -> Result<Outcome> {
    let Some((desired, status)) = both_specs(ctx.desired, status) else {
        return Ok(Outcome::unchanged());
    };
    if desired.scheduler_name == status.scheduler_name {
        return Ok(Outcome::unchanged());
    }
    status.scheduler_name = desired.scheduler_name.clone();
    Ok(Outcome::silent())
}

/// Silently adopt a termination grace period change.
pub fn termination_grace(
    ctx: &CompareContext<'_>,
    status: &mut PodTemplateSpec,
) -> Result<Outcome> {
    let Some((desired, status)) = both_specs(ctx.desired, status) else {
        return Ok(Outcome::unchanged());
    };
    if desired.termination_grace_period_seconds == status.termination_grace_period_seconds {
        return Ok(Outcome::unchanged());
    }
    status.termination_grace_period_seconds = desired.termination_grace_period_seconds;
    Ok(Outcome::silent())
}

/// Silently adopt an affinity change, keyed on a content hash so two
/// structurally equal stanzas never register as a change.
pub fn affinity(ctx: &CompareContext<'_>, status: &mut PodTemplateSpec) -> Result<Outcome> {
    let Some((desired, status)) = both_specs(ctx.desired, status) else {
        return Ok(Outcome::unchanged());
    };
    let desired_sum = affinity_checksum(desired.affinity.as_ref())?;
    let status_sum = affinity_checksum(status.affinity.as_ref())?;
    if desired_sum == status_sum {
        return Ok(Outcome::unchanged());
    }
    status.affinity = desired.affinity.clone();
    Ok(Outcome::silent())
}

/// Reconcile nil-vs-zero pod security contexts.
///
/// A nil security context and an empty one are the same configuration; when
/// only the representation differs, the desired form is adopted silently.
/// Any substantive difference is left unresolved.
pub fn security_context(ctx: &CompareContext<'_>, status: &mut PodTemplateSpec) -> Result<Outcome> {
    let Some((desired, status)) = both_specs(ctx.desired, status) else {
        return Ok(Outcome::unchanged());
    };
    if desired.security_context == status.security_context {
        return Ok(Outcome::unchanged());
    }
    let d = desired.security_context.clone().unwrap_or_default();
    let s = status.security_context.clone().unwrap_or_default();
    if d == s {
        status.security_context = desired.security_context.clone();
        return Ok(Outcome::silent());
    }
    Ok(Outcome::unchanged())
}
