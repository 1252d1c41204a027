//! Probe comparators
//!
//! Startup probe content is adopted silently. Readiness and liveness
//! probes are only adopted when the difference is confined to a managed
//! probe's script body (and, for liveness, its failure threshold); this is
//! verified structurally by normalizing the permitted fields on both sides
//! and requiring the derivatives to match exactly.

use k8s_openapi::api::core::v1::{PodTemplateSpec, Probe};

use shoal_common::Result;

use crate::compare::{both_specs, containers_aligned, CompareContext, Outcome};

/// Path prefix of the operator-managed probe helper inside member pods.
const MANAGED_PROBE_PREFIX: &str = "/lifecycle/";

/// Compare startup, readiness and liveness probes per container.
pub fn probes(ctx: &CompareContext<'_>, status: &mut PodTemplateSpec) -> Result<Outcome> {
    let Some((desired, status)) = both_specs(ctx.desired, status) else {
        return Ok(Outcome::unchanged());
    };
    if !containers_aligned(&desired.containers, &status.containers) {
        return Ok(Outcome::unchanged());
    }

    let mut outcome = Outcome::unchanged();
    for (d, s) in desired.containers.iter().zip(status.containers.iter_mut()) {
        if d.startup_probe != s.startup_probe {
            s.startup_probe = d.startup_probe.clone();
            outcome = outcome.merge(Outcome::silent());
        }

        if d.readiness_probe != s.readiness_probe
            && derivative_equal(
                d.readiness_probe.as_ref(),
                s.readiness_probe.as_ref(),
                false,
            )
        {
            s.readiness_probe = d.readiness_probe.clone();
            outcome = outcome.merge(Outcome::silent());
        }

        if d.liveness_probe != s.liveness_probe
            && derivative_equal(d.liveness_probe.as_ref(), s.liveness_probe.as_ref(), true)
        {
            s.liveness_probe = d.liveness_probe.clone();
            outcome = outcome.merge(Outcome::silent());
        }
    }
    Ok(outcome)
}

/// Whether two probes are equal after normalizing the fields a managed
/// probe may legitimately differ in.
fn derivative_equal(desired: Option<&Probe>, status: Option<&Probe>, liveness: bool) -> bool {
    let (Some(d), Some(s)) = (desired, status) else {
        return false;
    };
    if !is_managed(d) || !is_managed(s) {
        return false;
    }

    let normalize = |probe: &Probe| -> Probe {
        let mut probe = probe.clone();
        if let Some(exec) = probe.exec.as_mut() {
            exec.command = None;
        }
        if liveness {
            probe.failure_threshold = None;
        }
        probe
    };
    normalize(d) == normalize(s)
}

fn is_managed(probe: &Probe) -> bool {
    probe
        .exec
        .as_ref()
        .and_then(|e| e.command.as_ref())
        .and_then(|c| c.first())
        .is_some_and(|binary| binary.starts_with(MANAGED_PROBE_PREFIX))
}

#[cfg(test)]
mod tests {
    use super::*;

    use k8s_openapi::api::core::v1::{Container, ExecAction, PodSpec};

    use shoal_common::crd::{ServerGroup, ShoalDeploymentSpec};

    use crate::mode::Mode;

    fn exec_probe(command: &[&str], failure_threshold: Option<i32>) -> Probe {
        Probe {
            exec: Some(ExecAction {
                command: Some(command.iter().map(|s| s.to_string()).collect()),
            }),
            failure_threshold,
            ..Probe::default()
        }
    }

    fn template(container: Container) -> PodTemplateSpec {
        PodTemplateSpec {
            spec: Some(PodSpec {
                containers: vec![container],
                ..PodSpec::default()
            }),
            ..PodTemplateSpec::default()
        }
    }

    fn server() -> Container {
        Container {
            name: "server".to_string(),
            ..Container::default()
        }
    }

    fn run(desired: &PodTemplateSpec, status: &mut PodTemplateSpec) -> Outcome {
        let deployment = ShoalDeploymentSpec::default();
        let ctx = CompareContext {
            deployment: &deployment,
            group: ServerGroup::Shard,
            desired,
        };
        probes(&ctx, status).expect("compare")
    }

    #[test]
    fn startup_probe_change_is_silent() {
        let mut d = server();
        d.startup_probe = Some(exec_probe(&["/lifecycle/shoal-ops", "probe", "--fast"], None));
        let mut s = server();
        s.startup_probe = Some(exec_probe(&["/lifecycle/shoal-ops", "probe"], None));
        let desired = template(d);
        let mut status = template(s);

        let out = run(&desired, &mut status);
        assert_eq!(out.mode, Mode::Silent);
        assert_eq!(status, desired);
    }

    #[test]
    fn managed_readiness_script_change_is_silent() {
        let mut d = server();
        d.readiness_probe = Some(exec_probe(&["/lifecycle/shoal-ops", "probe", "--ssl"], None));
        let mut s = server();
        s.readiness_probe = Some(exec_probe(&["/lifecycle/shoal-ops", "probe"], None));
        let desired = template(d);
        let mut status = template(s);

        let out = run(&desired, &mut status);
        assert_eq!(out.mode, Mode::Silent);
        assert_eq!(status, desired);
    }

    #[test]
    fn readiness_timing_change_stays_unresolved() {
        let mut probe = exec_probe(&["/lifecycle/shoal-ops", "probe"], None);
        probe.period_seconds = Some(5);
        let mut d = server();
        d.readiness_probe = Some(probe);
        let mut s = server();
        s.readiness_probe = Some(exec_probe(&["/lifecycle/shoal-ops", "probe"], None));
        let desired = template(d);
        let mut status = template(s);

        let out = run(&desired, &mut status);
        assert_eq!(out.mode, Mode::Skipped);
        assert_ne!(status, desired);
    }

    #[test]
    fn liveness_failure_threshold_change_is_silent() {
        let mut d = server();
        d.liveness_probe = Some(exec_probe(&["/lifecycle/shoal-ops", "probe"], Some(10)));
        let mut s = server();
        s.liveness_probe = Some(exec_probe(&["/lifecycle/shoal-ops", "probe"], Some(3)));
        let desired = template(d);
        let mut status = template(s);

        let out = run(&desired, &mut status);
        assert_eq!(out.mode, Mode::Silent);
        assert_eq!(status, desired);
    }

    #[test]
    fn unmanaged_probe_change_stays_unresolved() {
        let mut d = server();
        d.readiness_probe = Some(exec_probe(&["/bin/sh", "-c", "curl localhost"], None));
        let mut s = server();
        s.readiness_probe = Some(exec_probe(&["/bin/sh", "-c", "wget localhost"], None));
        let desired = template(d);
        let mut status = template(s);

        let out = run(&desired, &mut status);
        assert_eq!(out.mode, Mode::Skipped);
        assert_ne!(status, desired);
    }
}
