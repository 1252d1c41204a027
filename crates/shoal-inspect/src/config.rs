//! Inspector configuration
//!
//! Deserialized from the operator's config file; every field has a default
//! so an empty document is a valid configuration.

use std::collections::HashMap;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::kinds::ObjectKind;
use crate::throttle::ThrottleSet;

/// Inspector cache tuning.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct InspectConfig {
    /// Single-page listing limit.
    pub batch_size: u32,
    /// Per-kind refresh intervals, in seconds. Zero means refresh on every
    /// pass.
    pub refresh_intervals: RefreshIntervals,
}

impl Default for InspectConfig {
    fn default() -> Self {
        Self {
            batch_size: 256,
            refresh_intervals: RefreshIntervals::default(),
        }
    }
}

impl InspectConfig {
    /// Build the throttle set these intervals describe.
    pub fn throttles(&self) -> ThrottleSet {
        ThrottleSet::new(&self.refresh_intervals.as_map())
    }
}

/// Per-kind refresh intervals, in seconds.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RefreshIntervals {
    /// Pod refresh interval.
    pub pods: u64,
    /// Secret refresh interval.
    pub secrets: u64,
    /// ConfigMap refresh interval.
    pub config_maps: u64,
    /// PersistentVolumeClaim refresh interval.
    pub persistent_volume_claims: u64,
    /// PodDisruptionBudget refresh interval.
    pub pod_disruption_budgets: u64,
    /// Node refresh interval.
    pub nodes: u64,
    /// Endpoints refresh interval.
    pub endpoints: u64,
    /// ShoalMember refresh interval.
    pub members: u64,
    /// ShoalTask refresh interval.
    pub tasks: u64,
}

impl Default for RefreshIntervals {
    fn default() -> Self {
        Self {
            pods: 15,
            secrets: 15,
            config_maps: 15,
            persistent_volume_claims: 15,
            pod_disruption_budgets: 60,
            nodes: 60,
            endpoints: 15,
            members: 10,
            tasks: 10,
        }
    }
}

impl RefreshIntervals {
    fn as_map(&self) -> HashMap<ObjectKind, Duration> {
        HashMap::from([
            (ObjectKind::Pod, Duration::from_secs(self.pods)),
            (ObjectKind::Secret, Duration::from_secs(self.secrets)),
            (ObjectKind::ConfigMap, Duration::from_secs(self.config_maps)),
            (
                ObjectKind::PersistentVolumeClaim,
                Duration::from_secs(self.persistent_volume_claims),
            ),
            (
                ObjectKind::PodDisruptionBudget,
                Duration::from_secs(self.pod_disruption_budgets),
            ),
            (ObjectKind::Node, Duration::from_secs(self.nodes)),
            (ObjectKind::Endpoints, Duration::from_secs(self.endpoints)),
            (ObjectKind::ShoalMember, Duration::from_secs(self.members)),
            (ObjectKind::ShoalTask, Duration::from_secs(self.tasks)),
        ])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_document_yields_defaults() {
        let config: InspectConfig = serde_json::from_str("{}").expect("parses");
        assert_eq!(config, InspectConfig::default());
        assert_eq!(config.batch_size, 256);
    }

    #[test]
    fn partial_override_keeps_remaining_defaults() {
        let config: InspectConfig = serde_json::from_str(
            r#"{"batchSize": 32, "refreshIntervals": {"nodes": 300}}"#,
        )
        .expect("parses");
        assert_eq!(config.batch_size, 32);
        assert_eq!(config.refresh_intervals.nodes, 300);
        assert_eq!(config.refresh_intervals.pods, 15);
    }

    #[test]
    fn zero_interval_means_always_due() {
        let config: InspectConfig =
            serde_json::from_str(r#"{"refreshIntervals": {"pods": 0}}"#).expect("parses");
        let throttles = config.throttles();
        throttles.get(ObjectKind::Pod).delay();
        assert!(throttles.get(ObjectKind::Pod).throttle());
    }
}
