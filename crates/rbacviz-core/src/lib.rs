//! Core of the RBAC visualizer: fetch, graph building, filtering, rendering

#![deny(missing_docs)]

pub mod error;
pub mod fetch;
pub mod filter;
pub mod graph;
pub mod options;
pub mod pipeline;
pub mod render;
pub mod rules;
pub mod warning;

pub use error::Error;
pub use fetch::{KubeRbacSource, RbacSource};
pub use options::{NamespaceFilter, OutputFormat, VisualizeOptions};
pub use pipeline::{visualize, Summary, Visualization};
pub use warning::Warning;

/// Result type alias using our custom Error type
pub type Result<T> = std::result::Result<T, Error>;

/// Include-set entry meaning "every namespace"
pub const ALL_NAMESPACES: &str = "*";

/// Namespaces excluded when the caller does not say otherwise
pub const DEFAULT_EXCLUDED_NAMESPACES: &str = "kube-system";

/// Output format used when the caller does not say otherwise
pub const DEFAULT_OUTFORMAT: &str = "html";
