//! Rotation decision engine
//!
//! One stateless evaluation per call: precondition gates first, then the
//! checksum fast path, then the comparator sweep over an owned working
//! copy of the status template. The working copy is re-checksummed after
//! the sweep; a remaining mismatch escalates to at least Graceful no
//! matter what the comparators concluded, so unanticipated field diffs can
//! never slip through as Silent or InPlace.

use k8s_openapi::api::core::v1::{PersistentVolumeClaim, Pod};
use tracing::debug;

use shoal_common::crd::{
    MemberConditionType, MemberPropagationMode, MemberState, MemberTemplate, ServerGroup,
    ShoalDeploymentSpec,
};
use shoal_common::{Result, ROTATE_NOW_ANNOTATION};

use crate::checksum::new_template;
use crate::compare::{CompareContext, COMPARATORS};
use crate::mode::Mode;
use crate::plan::Plan;

/// Live-cluster inputs for one rotation decision.
pub struct RotationInput<'a> {
    /// Deployment-wide configuration.
    pub deployment: &'a ShoalDeploymentSpec,
    /// Workload group of the member.
    pub group: ServerGroup,
    /// Member state as recorded on the deployment status.
    pub member: &'a MemberState,
    /// The member's live pod, when one exists.
    pub pod: Option<&'a Pod>,
    /// The member's persistent volume claim, when one exists.
    pub pvc: Option<&'a PersistentVolumeClaim>,
}

/// The outcome of one rotation decision.
#[derive(Debug, Clone)]
pub struct Decision {
    /// Graded severity.
    pub mode: Mode,
    /// In-place actions; only meaningful when `mode` is `InPlace`.
    pub plan: Plan,
    /// Human-readable grounds for the decision.
    pub reason: String,
    /// The comparator-merged status template with its recomputed checksum,
    /// present when the field comparison ran. For Silent decisions the
    /// caller stores this template instead of restarting the member.
    pub adopted: Option<MemberTemplate>,
}

impl Decision {
    fn gate(mode: Mode, reason: impl Into<String>) -> Self {
        Self {
            mode,
            plan: Plan::new(),
            reason: reason.into(),
            adopted: None,
        }
    }
}

/// Decide whether and how to rotate one member.
///
/// An error means the decision is Skipped: callers must not act on any
/// partially computed severity.
pub fn evaluate(
    input: &RotationInput<'_>,
    desired: &MemberTemplate,
    status: &MemberTemplate,
) -> Result<Decision> {
    if let Some(decision) = entry_gates(input) {
        debug!(
            member = input.member.id,
            mode = ?decision.mode,
            reason = decision.reason,
            "rotation decided by precondition gate"
        );
        return Ok(decision);
    }

    if desired.checksum == status.checksum {
        return Ok(Decision::gate(Mode::Skipped, "templates are identical"));
    }

    let ctx = CompareContext {
        deployment: input.deployment,
        group: input.group,
        desired: &desired.pod_template,
    };
    let mut working = status.pod_template.clone();
    let mut mode = Mode::Skipped;
    let mut plan = Plan::new();
    for comparator in COMPARATORS {
        let outcome = comparator(&ctx, &mut working)?;
        mode = mode.and(outcome.mode);
        plan.extend(outcome.plan);
    }

    let adopted = new_template(working)?;
    let mut reason = "template changes resolved by comparators".to_string();
    if adopted.checksum != desired.checksum {
        // Safety net for field groups no comparator covers.
        if mode < Mode::Graceful {
            reason = "unresolved template change".to_string();
        }
        mode = mode.and(Mode::Graceful);
    }

    debug!(
        member = input.member.id,
        mode = ?mode,
        actions = plan.len(),
        "rotation decided by comparison"
    );
    Ok(Decision {
        mode,
        plan,
        reason,
        adopted: Some(adopted),
    })
}

fn entry_gates(input: &RotationInput<'_>) -> Option<Decision> {
    let member = input.member;

    if !member.phase.rotation_possible()
        || member.conditions.is_true(MemberConditionType::Terminating)
        || member.conditions.is_true(MemberConditionType::Terminated)
    {
        return Some(Decision::gate(Mode::Skipped, "member cannot rotate"));
    }

    if input.deployment.member_propagation_mode() == MemberPropagationMode::Always
        && member.conditions.is_true(MemberConditionType::PendingRestart)
    {
        return Some(Decision::gate(
            Mode::Enforced,
            "restart is pending and propagation is immediate",
        ));
    }

    if let (Some(pod), Some(recorded_uid)) = (input.pod, member.pod_uid.as_deref()) {
        if let Some(live_uid) = pod.metadata.uid.as_deref() {
            if live_uid != recorded_uid {
                return Some(Decision::gate(Mode::Enforced, "live pod uid changed"));
            }
        }
    }

    if input.pod.is_some_and(|pod| {
        pod.metadata
            .annotations
            .as_ref()
            .is_some_and(|a| a.contains_key(ROTATE_NOW_ANNOTATION))
    }) {
        return Some(Decision::gate(Mode::Enforced, "rotation requested by annotation"));
    }

    if member.pod_spec_version.as_deref().unwrap_or("").is_empty() {
        return Some(Decision::gate(
            Mode::Enforced,
            "no recorded pod spec checksum",
        ));
    }

    if member
        .conditions
        .is_true(MemberConditionType::PendingTlsRotation)
    {
        return Some(Decision::gate(Mode::Enforced, "tls rotation pending"));
    }

    if pvc_resize_pending(input.pvc) {
        return Some(Decision::gate(
            Mode::Enforced,
            "filesystem resize pending on bound volume",
        ));
    }

    None
}

fn pvc_resize_pending(pvc: Option<&PersistentVolumeClaim>) -> bool {
    let Some(status) = pvc.and_then(|p| p.status.as_ref()) else {
        return false;
    };
    if status.phase.as_deref() != Some("Bound") {
        return false;
    }
    status.conditions.as_ref().is_some_and(|conditions| {
        conditions
            .iter()
            .any(|c| c.type_ == "FileSystemResizePending" && c.status == "True")
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::collections::BTreeMap;

    use k8s_openapi::api::core::v1::{
        Container, PersistentVolumeClaimCondition, PersistentVolumeClaimStatus, PodSpec,
        PodTemplateSpec,
    };

    use shoal_common::crd::MemberPhase;

    fn pod_template(image: &str) -> PodTemplateSpec {
        PodTemplateSpec {
            spec: Some(PodSpec {
                containers: vec![Container {
                    name: "server".to_string(),
                    image: Some(image.to_string()),
                    ..Container::default()
                }],
                ..PodSpec::default()
            }),
            ..PodTemplateSpec::default()
        }
    }

    fn ready_member() -> MemberState {
        MemberState {
            id: "SHRD-0001".to_string(),
            phase: MemberPhase::Ready,
            pod_spec_version: Some("abc123".to_string()),
            ..MemberState::default()
        }
    }

    fn decide(
        deployment: &ShoalDeploymentSpec,
        member: &MemberState,
        pod: Option<&Pod>,
        pvc: Option<&PersistentVolumeClaim>,
    ) -> Decision {
        let template = new_template(pod_template("shoal/server:1.2")).expect("template");
        evaluate(
            &RotationInput {
                deployment,
                group: ServerGroup::Shard,
                member,
                pod,
                pvc,
            },
            &template,
            &template.clone(),
        )
        .expect("evaluate")
    }

    #[test]
    fn unready_member_is_skipped_even_with_enforced_conditions() {
        let deployment = ShoalDeploymentSpec::default();
        let mut member = ready_member();
        member.phase = MemberPhase::Pending;
        member
            .conditions
            .set(MemberConditionType::PendingTlsRotation, true);

        let decision = decide(&deployment, &member, None, None);
        assert_eq!(decision.mode, Mode::Skipped);
    }

    #[test]
    fn terminating_condition_skips() {
        let deployment = ShoalDeploymentSpec::default();
        let mut member = ready_member();
        member.conditions.set(MemberConditionType::Terminating, true);

        let decision = decide(&deployment, &member, None, None);
        assert_eq!(decision.mode, Mode::Skipped);
    }

    #[test]
    fn pending_restart_with_immediate_propagation_enforces() {
        let deployment = ShoalDeploymentSpec {
            member_propagation_mode: Some(MemberPropagationMode::Always),
            ..ShoalDeploymentSpec::default()
        };
        let mut member = ready_member();
        member
            .conditions
            .set(MemberConditionType::PendingRestart, true);

        let decision = decide(&deployment, &member, None, None);
        assert_eq!(decision.mode, Mode::Enforced);
    }

    #[test]
    fn pending_restart_with_on_restart_propagation_does_not_enforce() {
        let deployment = ShoalDeploymentSpec::default();
        let mut member = ready_member();
        member
            .conditions
            .set(MemberConditionType::PendingRestart, true);

        let decision = decide(&deployment, &member, None, None);
        assert_eq!(decision.mode, Mode::Skipped, "identical templates, no gate");
    }

    #[test]
    fn pod_uid_mismatch_enforces() {
        let deployment = ShoalDeploymentSpec::default();
        let mut member = ready_member();
        member.pod_uid = Some("uid-recorded".to_string());

        let mut pod = Pod::default();
        pod.metadata.uid = Some("uid-live".to_string());

        let decision = decide(&deployment, &member, Some(&pod), None);
        assert_eq!(decision.mode, Mode::Enforced);
    }

    #[test]
    fn rotate_now_annotation_enforces() {
        let deployment = ShoalDeploymentSpec::default();
        let member = ready_member();

        let mut pod = Pod::default();
        pod.metadata.annotations = Some(BTreeMap::from([(
            ROTATE_NOW_ANNOTATION.to_string(),
            "true".to_string(),
        )]));

        let decision = decide(&deployment, &member, Some(&pod), None);
        assert_eq!(decision.mode, Mode::Enforced);
    }

    #[test]
    fn missing_checksum_enforces() {
        let deployment = ShoalDeploymentSpec::default();
        let mut member = ready_member();
        member.pod_spec_version = None;

        let decision = decide(&deployment, &member, None, None);
        assert_eq!(decision.mode, Mode::Enforced);
    }

    #[test]
    fn pending_tls_rotation_enforces() {
        let deployment = ShoalDeploymentSpec::default();
        let mut member = ready_member();
        member
            .conditions
            .set(MemberConditionType::PendingTlsRotation, true);

        let decision = decide(&deployment, &member, None, None);
        assert_eq!(decision.mode, Mode::Enforced);
    }

    #[test]
    fn bound_pvc_with_pending_resize_enforces() {
        let deployment = ShoalDeploymentSpec::default();
        let member = ready_member();

        let mut pvc = PersistentVolumeClaim::default();
        pvc.status = Some(PersistentVolumeClaimStatus {
            phase: Some("Bound".to_string()),
            conditions: Some(vec![PersistentVolumeClaimCondition {
                type_: "FileSystemResizePending".to_string(),
                status: "True".to_string(),
                ..PersistentVolumeClaimCondition::default()
            }]),
            ..PersistentVolumeClaimStatus::default()
        });

        let decision = decide(&deployment, &member, None, Some(&pvc));
        assert_eq!(decision.mode, Mode::Enforced);
    }

    #[test]
    fn unbound_pvc_resize_condition_does_not_enforce() {
        let deployment = ShoalDeploymentSpec::default();
        let member = ready_member();

        let mut pvc = PersistentVolumeClaim::default();
        pvc.status = Some(PersistentVolumeClaimStatus {
            phase: Some("Pending".to_string()),
            conditions: Some(vec![PersistentVolumeClaimCondition {
                type_: "FileSystemResizePending".to_string(),
                status: "True".to_string(),
                ..PersistentVolumeClaimCondition::default()
            }]),
            ..PersistentVolumeClaimStatus::default()
        });

        let decision = decide(&deployment, &member, None, Some(&pvc));
        assert_eq!(decision.mode, Mode::Skipped);
    }

    #[test]
    fn equal_checksums_skip_without_running_comparators() {
        let deployment = ShoalDeploymentSpec::default();
        let member = ready_member();

        let decision = decide(&deployment, &member, None, None);
        assert_eq!(decision.mode, Mode::Skipped);
        assert!(decision.plan.is_empty());
        assert!(decision.adopted.is_none());
    }
}
