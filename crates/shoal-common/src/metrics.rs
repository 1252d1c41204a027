//! Metrics registry for Shoal observability
//!
//! Provides OpenTelemetry metrics for:
//! - Object mutations issued by mod clients (kind, verb, success)
//! - Inspector refresh timings and errors

use once_cell::sync::Lazy;
use opentelemetry::global;
use opentelemetry::metrics::{Counter, Histogram, Meter};
use opentelemetry::KeyValue;

/// Global meter for Shoal metrics
static METER: Lazy<Meter> = Lazy::new(|| global::meter("shoal"));

/// Counter of object mutations issued against the remote API
///
/// Labels:
/// - `kind`: object kind (Pod, Secret, ...)
/// - `verb`: create, update, update_status, patch, delete, force_delete
/// - `success`: true, false
pub static OBJECT_MUTATIONS: Lazy<Counter<u64>> = Lazy::new(|| {
    METER
        .u64_counter("shoal_object_mutations_total")
        .with_description("Total number of object mutations by kind and verb")
        .with_unit("{mutations}")
        .build()
});

/// Histogram of inspector refresh duration
///
/// Labels:
/// - `result`: success, error
pub static REFRESH_DURATION: Lazy<Histogram<f64>> = Lazy::new(|| {
    METER
        .f64_histogram("shoal_inspector_refresh_duration_seconds")
        .with_description("Duration of inspector refresh calls in seconds")
        .with_unit("s")
        .build()
});

/// Counter of inspector refresh errors
///
/// Labels:
/// - `kind`: object kind whose load or verify failed
pub static REFRESH_ERRORS: Lazy<Counter<u64>> = Lazy::new(|| {
    METER
        .u64_counter("shoal_inspector_refresh_errors_total")
        .with_description("Total number of inspector refresh errors")
        .with_unit("{errors}")
        .build()
});

/// Mutation verb label values
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verb {
    /// Object creation
    Create,
    /// Full object update
    Update,
    /// Status subresource update
    UpdateStatus,
    /// Patch by patch-type and payload
    Patch,
    /// Delete with default grace period
    Delete,
    /// Delete with a zero grace period
    ForceDelete,
}

impl Verb {
    /// Convert to label value
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Create => "create",
            Self::Update => "update",
            Self::UpdateStatus => "update_status",
            Self::Patch => "patch",
            Self::Delete => "delete",
            Self::ForceDelete => "force_delete",
        }
    }
}

/// Record one object mutation outcome
pub fn record_mutation(kind: &str, verb: Verb, success: bool) {
    OBJECT_MUTATIONS.add(
        1,
        &[
            KeyValue::new("kind", kind.to_string()),
            KeyValue::new("verb", verb.as_str()),
            KeyValue::new("success", success),
        ],
    );
}

/// Record one refresh duration
pub fn record_refresh(duration_seconds: f64, success: bool) {
    REFRESH_DURATION.record(
        duration_seconds,
        &[KeyValue::new(
            "result",
            if success { "success" } else { "error" },
        )],
    );
}

/// Record one refresh error attributed to a kind
pub fn record_refresh_error(kind: &str) {
    REFRESH_ERRORS.add(1, &[KeyValue::new("kind", kind.to_string())]);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn verb_as_str() {
        assert_eq!(Verb::Create.as_str(), "create");
        assert_eq!(Verb::UpdateStatus.as_str(), "update_status");
        assert_eq!(Verb::ForceDelete.as_str(), "force_delete");
    }

    #[test]
    fn recording_does_not_panic() {
        record_mutation("Pod", Verb::Delete, true);
        record_refresh(0.25, true);
        record_refresh_error("Secret");
    }
}
