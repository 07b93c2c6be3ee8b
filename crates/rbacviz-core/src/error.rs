//! Error types for the RBAC visualizer
//!
//! Fatal errors (configuration, cancellation) abort an invocation. Fetch
//! failures are recoverable: the pipeline degrades the graph and reports
//! them as warnings instead.

use thiserror::Error;

use crate::fetch::FetchFailure;

/// Main error type for visualizer operations
#[derive(Debug, Error)]
pub enum Error {
    /// Kubernetes API error from a single list call
    #[error("kubernetes error: {source}")]
    Kube {
        /// The underlying kube-rs error
        #[from]
        source: kube::Error,
    },

    /// Invalid options, detected before any cluster I/O
    #[error("configuration error: {message}")]
    Configuration {
        /// Description of what's invalid
        message: String,
        /// The offending option (e.g., "outformat")
        field: Option<String>,
    },

    /// One or more resource kinds could not be listed
    #[error("failed to fetch {}", join_failures(.failures))]
    Fetch {
        /// Every per-kind failure, in fetch order
        failures: Vec<FetchFailure>,
    },

    /// The caller cancelled the invocation
    #[error("operation cancelled")]
    Cancelled,

    /// Rendering the output document failed
    #[error("render error: {message}")]
    Render {
        /// Description of what failed
        message: String,
    },

    /// Writing the output failed
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

fn join_failures(failures: &[FetchFailure]) -> String {
    failures
        .iter()
        .map(|f| f.to_string())
        .collect::<Vec<_>>()
        .join("; ")
}

impl Error {
    /// Create a configuration error with the given message
    pub fn configuration(msg: impl Into<String>) -> Self {
        Self::Configuration {
            message: msg.into(),
            field: None,
        }
    }

    /// Create a configuration error for a specific option
    pub fn configuration_for_field(field: impl Into<String>, msg: impl Into<String>) -> Self {
        Self::Configuration {
            message: msg.into(),
            field: Some(field.into()),
        }
    }

    /// Create a render error with the given message
    pub fn render(msg: impl Into<String>) -> Self {
        Self::Render {
            message: msg.into(),
        }
    }

    /// Whether this error must abort the whole invocation
    ///
    /// Fetch failures only degrade the graph; everything else is fatal.
    pub fn is_fatal(&self) -> bool {
        !matches!(self, Error::Fetch { .. } | Error::Kube { .. })
    }

    /// Get the offending option if this is a configuration error
    pub fn field(&self) -> Option<&str> {
        match self {
            Error::Configuration { field, .. } => field.as_deref(),
            _ => None,
        }
    }
}

impl From<minijinja::Error> for Error {
    fn from(e: minijinja::Error) -> Self {
        Error::render(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fetch::ResourceKind;

    /// Story: a bad option is reported with the flag that caused it
    #[test]
    fn story_configuration_error_names_the_option() {
        let err = Error::configuration_for_field("outformat", "unsupported format 'bogus'");
        assert!(err.to_string().contains("configuration error"));
        assert!(err.to_string().contains("bogus"));
        assert_eq!(err.field(), Some("outformat"));
        assert!(err.is_fatal());

        let err = Error::configuration("no namespaces");
        assert_eq!(err.field(), None);
    }

    /// Story: fetch failures for several kinds are joined into one message
    #[test]
    fn story_fetch_error_joins_every_failed_kind() {
        let err = Error::Fetch {
            failures: vec![
                FetchFailure::new(ResourceKind::Pods, "forbidden"),
                FetchFailure::new(ResourceKind::Roles, "timeout"),
            ],
        };
        let msg = err.to_string();
        assert!(msg.contains("pods: forbidden"));
        assert!(msg.contains("roles: timeout"));
        assert!(!err.is_fatal());
    }

    #[test]
    fn test_cancelled_is_fatal() {
        assert!(Error::Cancelled.is_fatal());
        assert_eq!(Error::Cancelled.to_string(), "operation cancelled");
    }
}
