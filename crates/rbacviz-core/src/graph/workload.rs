//! Workload resolution
//!
//! Maps a running pod to its top-level controller by walking controller
//! owner references through the intermediate objects that were fetched
//! (ReplicaSet → Deployment, Job → CronJob). When an intermediate object is
//! missing the walk stops at the last owner that is known.

use std::collections::HashMap;

use k8s_openapi::api::apps::v1::ReplicaSet;
use k8s_openapi::api::batch::v1::Job;
use k8s_openapi::api::core::v1::Pod;
use k8s_openapi::apimachinery::pkg::apis::meta::v1::{ObjectMeta, OwnerReference};

/// ServiceAccount a pod runs as when its spec names none
pub const DEFAULT_SERVICE_ACCOUNT: &str = "default";

/// Upper bound on owner hops, guards against malformed reference loops
const MAX_OWNER_DEPTH: usize = 8;

const TERMINAL_POD_PHASES: [&str; 2] = ["Succeeded", "Failed"];

/// A top-level controller
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct WorkloadRef {
    /// Controller kind (Deployment, StatefulSet, CronJob, Pod, ...)
    pub kind: String,
    /// Controller name
    pub name: String,
}

impl WorkloadRef {
    /// Name used as the node identity, e.g. `Deployment/web`
    pub fn qualified_name(&self) -> String {
        format!("{}/{}", self.kind, self.name)
    }
}

/// (kind, namespace, name) of an intermediate owner
type OwnerKey = (String, String, String);

/// Controller owner of each fetched intermediate object
#[derive(Debug, Default)]
pub struct OwnerIndex {
    parents: HashMap<OwnerKey, WorkloadRef>,
}

/// The owner reference marked as controller, or the first one
fn controller_of(metadata: &ObjectMeta) -> Option<&OwnerReference> {
    let refs = metadata.owner_references.as_ref()?;
    refs.iter()
        .find(|r| r.controller == Some(true))
        .or_else(|| refs.first())
}

impl OwnerIndex {
    /// Index the controllers of the given ReplicaSets and Jobs
    pub fn new(replica_sets: &[ReplicaSet], jobs: &[Job]) -> Self {
        let mut index = Self::default();
        for rs in replica_sets {
            index.record("ReplicaSet", &rs.metadata);
        }
        for job in jobs {
            index.record("Job", &job.metadata);
        }
        index
    }

    fn record(&mut self, kind: &str, metadata: &ObjectMeta) {
        let (Some(namespace), Some(name)) = (&metadata.namespace, &metadata.name) else {
            return;
        };
        if let Some(owner) = controller_of(metadata) {
            self.parents.insert(
                (kind.to_string(), namespace.clone(), name.clone()),
                WorkloadRef {
                    kind: owner.kind.clone(),
                    name: owner.name.clone(),
                },
            );
        }
    }

    /// Top-level controller of `pod`; a bare pod is its own workload
    pub fn top_level(&self, namespace: &str, pod: &Pod) -> WorkloadRef {
        let Some(owner) = controller_of(&pod.metadata) else {
            return WorkloadRef {
                kind: "Pod".to_string(),
                name: pod.metadata.name.clone().unwrap_or_default(),
            };
        };

        let mut current = WorkloadRef {
            kind: owner.kind.clone(),
            name: owner.name.clone(),
        };
        for _ in 0..MAX_OWNER_DEPTH {
            let key = (current.kind.clone(), namespace.to_string(), current.name.clone());
            match self.parents.get(&key) {
                Some(parent) => current = parent.clone(),
                None => break,
            }
        }
        current
    }
}

/// Whether the pod is still running (not Succeeded or Failed)
///
/// Pending pods and pods without a reported phase count: their
/// ServiceAccount is in use as soon as they start.
pub fn is_running(pod: &Pod) -> bool {
    let phase = pod.status.as_ref().and_then(|s| s.phase.as_deref());
    !matches!(phase, Some(p) if TERMINAL_POD_PHASES.contains(&p))
}

/// ServiceAccount the pod runs as
pub fn service_account_of(pod: &Pod) -> &str {
    pod.spec
        .as_ref()
        .and_then(|spec| {
            spec.service_account_name
                .as_deref()
                .or(spec.service_account.as_deref())
        })
        .filter(|name| !name.is_empty())
        .unwrap_or(DEFAULT_SERVICE_ACCOUNT)
}
