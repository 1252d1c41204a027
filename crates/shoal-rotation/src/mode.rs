//! Rotation severity grading

use serde::{Deserialize, Serialize};

/// Graded severity of a rotation decision, ascending.
///
/// The derived ordering is load-bearing: combining decisions takes the
/// numerically higher variant.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "camelCase")]
pub enum Mode {
    /// No rotation: impossible in the member's current state, or nothing to
    /// do.
    #[default]
    Skipped,
    /// Adopt the change into the recorded template without touching the pod.
    Silent,
    /// Mutate the running pod in place, following the action plan.
    InPlace,
    /// Rotate the member through an orderly drain and restart.
    Graceful,
    /// Rotate the member immediately, preconditions notwithstanding.
    Enforced,
}

impl Mode {
    /// Combine two severities into the more severe one.
    ///
    /// Associative and commutative, with `Skipped` as identity.
    pub fn and(self, other: Mode) -> Mode {
        self.max(other)
    }
}
