//! Throttled inspector cache over the Kubernetes API
//!
//! The inspector maintains one immutable snapshot of every object kind the
//! operator cares about, refreshed through per-kind loaders gated by
//! per-kind throttles. Reconciliation logic reads the snapshot through
//! typed views, mutates objects through mod clients (which invalidate the
//! relevant throttle), and reaches heterogeneous kinds through type-erased
//! anonymous accessors.

#![deny(missing_docs)]

pub mod anonymous;
pub mod api;
pub mod config;
pub mod inspector;
pub mod kinds;
pub mod loader;
pub mod mod_client;
pub mod snapshot;
pub mod throttle;

pub use anonymous::AnonymousApi;
pub use api::{ApiSet, ClusterInfo, KindApi, Page, PageRequest, ServerVersion};
pub use config::{InspectConfig, RefreshIntervals};
pub use inspector::Inspector;
pub use kinds::{ObjectKind, ALL_KINDS};
pub use loader::{LoadedKind, Loader, LoaderRegistry};
pub use mod_client::ModClient;
pub use snapshot::{FilterFn, KindData, KindView, PdbVersion, Snapshot};
pub use throttle::{Throttle, ThrottleSet};
