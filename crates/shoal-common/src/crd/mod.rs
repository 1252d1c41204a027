//! CRD and workload model types shared across the reconciliation core

pub mod deployment;
pub mod member;

pub use deployment::{
    DeploymentMode, InitContainerMode, MemberPropagationMode, ServerGroup, ServerGroupSpec,
    ShoalDeploymentSpec,
};
pub use member::{
    MemberCondition, MemberConditionSet, MemberConditionType, MemberPhase, MemberState,
    MemberTemplate, ShoalMember, ShoalMemberSpec, ShoalMemberStatus, ShoalTask, ShoalTaskSpec,
    ShoalTaskStatus,
};
