//! Rotation decision engine for Shoal members
//!
//! Diffs a member's desired pod template against its last-applied one and
//! grades the result: adopt silently, mutate the pod in place following an
//! action plan, rotate gracefully, or rotate immediately. Precondition
//! gates (member phase, pod identity, pending restarts, TLS rotation,
//! volume resizes) can decide before any field is compared.

#![deny(missing_docs)]

pub mod checksum;
pub mod compare;
pub mod engine;
pub mod mode;
pub mod plan;

pub use checksum::{new_template, template_checksum};
pub use compare::{CompareContext, Comparator, Outcome, COMPARATORS};
pub use engine::{evaluate, Decision, RotationInput};
pub use mode::Mode;
pub use plan::{Action, ActionType, Plan, PARAM_CONTAINER_NAME, PARAM_IMAGE};
