//! Common types for Shoal: CRDs, workload model, errors, and metrics

#![deny(missing_docs)]

pub mod crd;
pub mod error;
pub mod metrics;

pub use error::Error;

/// Result type alias using our custom Error type
pub type Result<T> = std::result::Result<T, Error>;

/// Name of the reserved server container in every member pod
pub const SERVER_CONTAINER_NAME: &str = "server";

/// Reserved (operator-managed) init container names
pub const RESERVED_INIT_CONTAINER_NAMES: &[&str] = &["init-lifecycle", "init-uuid", "init-upgrade"];

/// Volume carrying the lifecycle helper binary into member pods
pub const LIFECYCLE_VOLUME_NAME: &str = "lifecycle";

/// Volume carrying timezone data into member pods
pub const TIMEZONE_VOLUME_NAME: &str = "tz-data";

/// Pod annotation requesting an immediate member rotation
pub const ROTATE_NOW_ANNOTATION: &str = "shoal.dev/rotate";

/// Name of the deployment-managed ConfigMap referenced via envFrom
pub const MANAGED_CONFIGMAP_NAME: &str = "shoal-runtime-config";

/// Environment variable keys that may change without a member restart
///
/// Deployment-mode/version override markers plus pod-identity, node-identity
/// and zone lifecycle variables. A diff restricted to these keys is adopted
/// silently; any other differing key forces a graceful rotation.
pub const SAFE_ENV_KEYS: &[&str] = &[
    "SHOAL_OVERRIDE_DEPLOYMENT_MODE",
    "SHOAL_OVERRIDE_VERSION",
    "SHOAL_POD_NAME",
    "SHOAL_POD_NAMESPACE",
    "SHOAL_NODE_NAME",
    "SHOAL_ZONE",
];

/// Prefix of the server log-level command-line argument
pub const LOG_LEVEL_ARG_PREFIX: &str = "--log.level";
