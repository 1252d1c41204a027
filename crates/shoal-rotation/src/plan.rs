//! In-place remediation planning
//!
//! An action plan is only meaningful for `Mode::InPlace` decisions; it
//! names what to change on the running pod, container by container.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Parameter key naming the container an action targets.
pub const PARAM_CONTAINER_NAME: &str = "containerName";

/// Parameter key carrying a container's new image.
pub const PARAM_IMAGE: &str = "image";

/// Kinds of in-place remediation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ActionType {
    /// Update one runtime container's image in place.
    RuntimeContainerImageUpdate,
    /// Update the log-level arguments of the server container in place.
    RuntimeContainerArgsLogLevelUpdate,
}

/// One planned action with named parameters.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Action {
    /// What to do.
    pub action_type: ActionType,
    /// Named parameters, e.g. container name and new image.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub params: BTreeMap<String, String>,
}

impl Action {
    /// An action with no parameters.
    pub fn new(action_type: ActionType) -> Self {
        Self {
            action_type,
            params: BTreeMap::new(),
        }
    }

    /// Attach one named parameter.
    pub fn with_param(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.params.insert(key.into(), value.into());
        self
    }

    /// Read one named parameter.
    pub fn param(&self, key: &str) -> Option<&str> {
        self.params.get(key).map(String::as_str)
    }
}

/// Ordered sequence of in-place actions.
pub type Plan = Vec<Action>;
