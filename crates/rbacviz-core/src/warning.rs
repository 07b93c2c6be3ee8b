//! Non-fatal problems reported alongside the rendered graph

use std::fmt;

use crate::fetch::FetchFailure;

/// A recoverable problem: the graph was produced but is missing something
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Warning {
    /// A resource kind could not be listed; its objects are absent
    FetchFailed(FetchFailure),
    /// A binding references a role or subject that does not exist
    UnresolvedReference {
        /// The binding, e.g. `RoleBinding team-a/readers`
        binding: String,
        /// What could not be resolved, e.g. `Role team-a/reader`
        reference: String,
        /// Why the reference was dropped
        reason: String,
    },
}

impl Warning {
    /// Create an unresolved reference warning
    pub fn unresolved(
        binding: impl Into<String>,
        reference: impl Into<String>,
        reason: impl Into<String>,
    ) -> Self {
        Warning::UnresolvedReference {
            binding: binding.into(),
            reference: reference.into(),
            reason: reason.into(),
        }
    }
}

impl fmt::Display for Warning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Warning::FetchFailed(failure) => {
                write!(f, "could not list {}: {}", failure.kind, failure.message)
            }
            Warning::UnresolvedReference {
                binding,
                reference,
                reason,
            } => write!(f, "{}: {} {}, edge dropped", binding, reference, reason),
        }
    }
}

impl From<FetchFailure> for Warning {
    fn from(failure: FetchFailure) -> Self {
        Warning::FetchFailed(failure)
    }
}
