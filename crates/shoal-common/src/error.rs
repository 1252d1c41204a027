//! Error types for the Shoal operator core
//!
//! Errors are structured with fields to aid debugging in production.
//! Each variant carries the context reconciliation logic needs to make a
//! policy decision: the resource identity for not-found, the detected
//! server version for unsupported-version, the kind and verb for
//! not-implemented.

use thiserror::Error;

/// Main error type for Shoal operations
#[derive(Debug, Error)]
pub enum Error {
    /// Kubernetes API error, propagated verbatim from the remote boundary
    #[error("kubernetes error: {source}")]
    Kube {
        /// The underlying kube-rs error
        #[from]
        source: kube::Error,
    },

    /// Requested object absent from the current snapshot
    ///
    /// Carries the kind's resource identity so callers can pattern-match it
    /// the same way they would a remote 404.
    #[error("{resource}.{group} \"{name}\" not found")]
    NotFound {
        /// API group of the missing object's kind
        group: String,
        /// Plural resource name of the missing object's kind
        resource: String,
        /// Name of the missing object
        name: String,
    },

    /// Server version below the oldest version a kind supports
    #[error("unsupported server version {version} for {kind}: minimum is {minimum}")]
    UnsupportedVersion {
        /// Kind whose verification failed
        kind: String,
        /// Detected server version
        version: String,
        /// Oldest supported server version
        minimum: String,
    },

    /// Concrete object does not match the kind an accessor was obtained for
    #[error("invalid type for {kind}: {message}")]
    InvalidType {
        /// Kind the accessor was obtained for
        kind: String,
        /// Description of the mismatch
        message: String,
    },

    /// Verb not supported by a kind (e.g. status update on a kind without a
    /// status subresource)
    #[error("{verb} is not implemented for {kind}")]
    NotImplemented {
        /// Kind the verb was invoked on
        kind: String,
        /// The unsupported verb
        verb: String,
    },

    /// Serialization/canonicalization error
    #[error("serialization error: {message}")]
    Serialization {
        /// Description of what failed
        message: String,
        /// The resource kind being serialized (if known)
        kind: Option<String>,
    },

    /// Internal/operational error
    #[error("internal error [{context}]: {message}")]
    Internal {
        /// Description of what failed
        message: String,
        /// Context where the error occurred (e.g. "inspector", "rotation")
        context: String,
    },
}

impl Error {
    /// Create a not-found error carrying a kind's resource identity
    pub fn not_found(
        group: impl Into<String>,
        resource: impl Into<String>,
        name: impl Into<String>,
    ) -> Self {
        Self::NotFound {
            group: group.into(),
            resource: resource.into(),
            name: name.into(),
        }
    }

    /// Create an unsupported-server-version error for a kind
    pub fn unsupported_version(
        kind: impl Into<String>,
        version: impl Into<String>,
        minimum: impl Into<String>,
    ) -> Self {
        Self::UnsupportedVersion {
            kind: kind.into(),
            version: version.into(),
            minimum: minimum.into(),
        }
    }

    /// Create an invalid-type error for a kind
    pub fn invalid_type(kind: impl Into<String>, msg: impl Into<String>) -> Self {
        Self::InvalidType {
            kind: kind.into(),
            message: msg.into(),
        }
    }

    /// Create a not-implemented error for a (kind, verb) pair
    pub fn not_implemented(kind: impl Into<String>, verb: impl Into<String>) -> Self {
        Self::NotImplemented {
            kind: kind.into(),
            verb: verb.into(),
        }
    }

    /// Create a serialization error with the given message
    pub fn serialization(msg: impl Into<String>) -> Self {
        Self::Serialization {
            message: msg.into(),
            kind: None,
        }
    }

    /// Create a serialization error with resource kind context
    pub fn serialization_for_kind(kind: impl Into<String>, msg: impl Into<String>) -> Self {
        Self::Serialization {
            message: msg.into(),
            kind: Some(kind.into()),
        }
    }

    /// Create an internal error with context
    pub fn internal(context: impl Into<String>, msg: impl Into<String>) -> Self {
        Self::Internal {
            message: msg.into(),
            context: context.into(),
        }
    }

    /// Check whether this error means "object does not exist"
    ///
    /// Matches both the cache's own not-found and a remote 404, so callers
    /// can treat a cache miss and an API miss uniformly.
    pub fn is_not_found(&self) -> bool {
        match self {
            Error::NotFound { .. } => true,
            Error::Kube {
                source: kube::Error::Api(ae),
            } => ae.code == 404,
            _ => false,
        }
    }

    /// Check whether this error is the distinguishable unsupported-version
    /// failure raised by version-sensitive loaders
    pub fn is_unsupported_version(&self) -> bool {
        matches!(self, Error::UnsupportedVersion { .. })
    }

    /// Check if this error is retryable
    ///
    /// Transport errors are retried on transient failures only. Invalid-type
    /// and not-implemented indicate caller error and must not be retried.
    pub fn is_retryable(&self) -> bool {
        match self {
            Error::Kube { source } => {
                !matches!(
                    source,
                    kube::Error::Api(ae) if (400..500).contains(&ae.code)
                )
            }
            Error::NotFound { .. } => false,
            Error::UnsupportedVersion { .. } => false,
            Error::InvalidType { .. } => false,
            Error::NotImplemented { .. } => false,
            Error::Serialization { .. } => false,
            Error::Internal { .. } => true,
        }
    }
}

impl Clone for Error {
    fn clone(&self) -> Self {
        // kube::Error is not Clone; per-kind snapshot entries hold their load
        // error for the lifetime of the snapshot. API status responses are
        // rebuilt so a cloned remote 404 still classifies as not-found and a
        // cloned 4xx stays non-retryable; other transport errors carry the
        // message.
        match self {
            Error::Kube {
                source: kube::Error::Api(response),
            } => Error::Kube {
                source: kube::Error::Api(response.clone()),
            },
            Error::Kube { source } => Error::Internal {
                message: source.to_string(),
                context: "kube".to_string(),
            },
            Error::NotFound {
                group,
                resource,
                name,
            } => Error::NotFound {
                group: group.clone(),
                resource: resource.clone(),
                name: name.clone(),
            },
            Error::UnsupportedVersion {
                kind,
                version,
                minimum,
            } => Error::UnsupportedVersion {
                kind: kind.clone(),
                version: version.clone(),
                minimum: minimum.clone(),
            },
            Error::InvalidType { kind, message } => Error::InvalidType {
                kind: kind.clone(),
                message: message.clone(),
            },
            Error::NotImplemented { kind, verb } => Error::NotImplemented {
                kind: kind.clone(),
                verb: verb.clone(),
            },
            Error::Serialization { message, kind } => Error::Serialization {
                message: message.clone(),
                kind: kind.clone(),
            },
            Error::Internal { message, context } => Error::Internal {
                message: message.clone(),
                context: context.clone(),
            },
        }
    }
}
