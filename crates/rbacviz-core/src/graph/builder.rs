//! Builds the RBAC graph from a fetched snapshot
//!
//! Role nodes come from ClusterRoles and Roles, ServiceAccount nodes from
//! ServiceAccounts. Bindings are then resolved against those nodes: a
//! binding whose role (or ServiceAccount subject) does not exist produces a
//! warning and no edge. Users and Groups have no backing objects and are
//! created the first time a binding names them.

use k8s_openapi::api::rbac::v1::{RoleRef, Subject};
use tracing::{debug, warn};

use super::workload::{is_running, service_account_of, OwnerIndex};
use super::{EdgeKind, GrantScope, NodeData, NodeId, NodeKey, NodeKind, RbacGraph, Usage};
use crate::fetch::Snapshot;
use crate::rules::RuleSet;
use crate::warning::Warning;

/// Graph plus the problems found while building it
#[derive(Debug, Default)]
pub struct BuildOutput {
    /// The assembled graph
    pub graph: RbacGraph,
    /// Unresolved references
    pub warnings: Vec<Warning>,
}

/// A RoleBinding or ClusterRoleBinding, viewed uniformly
struct BindingView<'s> {
    /// `RoleBinding ns/name` or `ClusterRoleBinding name`
    label: String,
    name: &'s str,
    /// Set for RoleBindings only
    namespace: Option<&'s str>,
    role_ref: &'s RoleRef,
    subjects: &'s [Subject],
}

/// Assembles an [`RbacGraph`] from a [`Snapshot`]
pub struct GraphBuilder<'s> {
    snapshot: &'s Snapshot,
    graph: RbacGraph,
    warnings: Vec<Warning>,
}

impl<'s> GraphBuilder<'s> {
    /// Create a builder over `snapshot`
    pub fn new(snapshot: &'s Snapshot) -> Self {
        Self {
            snapshot,
            graph: RbacGraph::new(),
            warnings: Vec::new(),
        }
    }

    /// Build the graph
    pub fn build(mut self) -> BuildOutput {
        self.add_roles();
        self.add_service_accounts();
        self.add_bindings();
        self.add_workloads();
        self.mark_usage();

        debug!(
            nodes = self.graph.node_count(),
            edges = self.graph.edge_count(),
            warnings = self.warnings.len(),
            "built rbac graph"
        );

        BuildOutput {
            graph: self.graph,
            warnings: self.warnings,
        }
    }

    fn add_roles(&mut self) {
        for cr in self.snapshot.cluster_roles.iter().flatten() {
            let Some(name) = &cr.metadata.name else {
                continue;
            };
            self.graph.upsert(
                NodeKey::cluster(NodeKind::ClusterRole, name),
                NodeData::Role {
                    rules: RuleSet::from_policy_rules(cr.rules.as_ref()),
                },
            );
        }

        for role in self.snapshot.roles.iter().flatten() {
            let (Some(ns), Some(name)) = (&role.metadata.namespace, &role.metadata.name) else {
                continue;
            };
            self.graph.upsert(
                NodeKey::namespaced(NodeKind::Role, ns, name),
                NodeData::Role {
                    rules: RuleSet::from_policy_rules(role.rules.as_ref()),
                },
            );
        }
    }

    fn add_service_accounts(&mut self) {
        for sa in self.snapshot.service_accounts.iter().flatten() {
            let (Some(ns), Some(name)) = (&sa.metadata.namespace, &sa.metadata.name) else {
                continue;
            };
            self.graph.upsert(
                NodeKey::namespaced(NodeKind::ServiceAccount, ns, name),
                NodeData::Subject {
                    declared: true,
                    usage: Usage::Unknown,
                },
            );
        }
    }

    fn add_bindings(&mut self) {
        let snapshot = self.snapshot;

        for crb in snapshot.cluster_role_bindings.iter().flatten() {
            let Some(name) = &crb.metadata.name else {
                continue;
            };
            self.bind(BindingView {
                label: format!("ClusterRoleBinding {}", name),
                name,
                namespace: None,
                role_ref: &crb.role_ref,
                subjects: crb.subjects.as_deref().unwrap_or_default(),
            });
        }

        for rb in snapshot.role_bindings.iter().flatten() {
            let (Some(ns), Some(name)) = (&rb.metadata.namespace, &rb.metadata.name) else {
                continue;
            };
            self.bind(BindingView {
                label: format!("RoleBinding {}/{}", ns, name),
                name,
                namespace: Some(ns),
                role_ref: &rb.role_ref,
                subjects: rb.subjects.as_deref().unwrap_or_default(),
            });
        }
    }

    fn unresolved(&mut self, binding: &str, reference: String, reason: impl Into<String>) {
        let reason = reason.into();
        warn!(
            binding = %binding,
            reference = %reference,
            reason = %reason,
            "unresolved rbac reference"
        );
        self.warnings.push(Warning::unresolved(binding, reference, reason));
    }

    fn bind(&mut self, binding: BindingView<'_>) {
        let Some(role) = self.resolve_role(&binding) else {
            return;
        };

        if binding.subjects.is_empty() {
            self.unresolved(&binding.label, "subjects".to_string(), "are empty");
            return;
        }

        let scope = match binding.namespace {
            Some(ns) => GrantScope::Namespace(ns.to_string()),
            None => GrantScope::Cluster,
        };

        for subject in binding.subjects {
            let Some(subject_id) = self.resolve_subject(&binding, subject) else {
                continue;
            };
            self.graph.add_edge(
                subject_id,
                role,
                EdgeKind::Binding {
                    name: binding.name.to_string(),
                    scope: scope.clone(),
                },
            );
        }
    }

    fn resolve_role(&mut self, binding: &BindingView<'_>) -> Option<NodeId> {
        let role_ref = binding.role_ref;
        let key = match (role_ref.kind.as_str(), binding.namespace) {
            ("ClusterRole", _) => NodeKey::cluster(NodeKind::ClusterRole, &role_ref.name),
            ("Role", Some(ns)) => NodeKey::namespaced(NodeKind::Role, ns, &role_ref.name),
            ("Role", None) => {
                self.unresolved(
                    &binding.label,
                    format!("Role {}", role_ref.name),
                    "cannot be granted by a ClusterRoleBinding",
                );
                return None;
            }
            (kind, _) => {
                self.unresolved(
                    &binding.label,
                    format!("{} {}", kind, role_ref.name),
                    "is not a supported roleRef kind",
                );
                return None;
            }
        };

        match self.graph.id_of(&key) {
            Some(id) => Some(id),
            None => {
                let listed = match key.kind {
                    NodeKind::ClusterRole => self.snapshot.cluster_roles.is_some(),
                    _ => self.snapshot.roles.is_some(),
                };
                let reason = if listed {
                    "not found"
                } else {
                    "not found (role kind could not be listed)"
                };
                self.unresolved(&binding.label, key.to_string(), reason);
                None
            }
        }
    }

    fn resolve_subject(&mut self, binding: &BindingView<'_>, subject: &Subject) -> Option<NodeId> {
        let declared_subject = NodeData::Subject {
            declared: true,
            usage: Usage::Unknown,
        };

        match subject.kind.as_str() {
            "User" => Some(
                self.graph
                    .upsert(NodeKey::cluster(NodeKind::User, &subject.name), declared_subject),
            ),
            "Group" => Some(
                self.graph
                    .upsert(NodeKey::cluster(NodeKind::Group, &subject.name), declared_subject),
            ),
            "ServiceAccount" => {
                let namespace = subject
                    .namespace
                    .as_deref()
                    .filter(|ns| !ns.is_empty())
                    .or(binding.namespace);
                let Some(namespace) = namespace else {
                    self.unresolved(
                        &binding.label,
                        format!("ServiceAccount {}", subject.name),
                        "has no namespace",
                    );
                    return None;
                };
                if binding.namespace.is_some_and(|ns| ns != namespace) {
                    self.unresolved(
                        &binding.label,
                        format!("ServiceAccount {}/{}", namespace, subject.name),
                        "is outside the binding's namespace",
                    );
                    return None;
                }

                let key = NodeKey::namespaced(NodeKind::ServiceAccount, namespace, &subject.name);
                if let Some(id) = self.graph.id_of(&key) {
                    return Some(id);
                }
                if self.snapshot.service_accounts.is_some() {
                    self.unresolved(&binding.label, key.to_string(), "not found");
                    return None;
                }
                // ServiceAccounts could not be listed, so existence is unknown
                Some(self.graph.upsert(
                    key,
                    NodeData::Subject {
                        declared: false,
                        usage: Usage::Unknown,
                    },
                ))
            }
            kind => {
                self.unresolved(
                    &binding.label,
                    format!("{} {}", kind, subject.name),
                    "is not a supported subject kind",
                );
                None
            }
        }
    }

    fn add_workloads(&mut self) {
        let Some(pods) = &self.snapshot.pods else {
            return;
        };
        let index = OwnerIndex::new(
            self.snapshot.replica_sets.as_deref().unwrap_or_default(),
            self.snapshot.jobs.as_deref().unwrap_or_default(),
        );

        for pod in pods.iter().filter(|p| is_running(p)) {
            let Some(ns) = &pod.metadata.namespace else {
                continue;
            };
            let workload = index.top_level(ns, pod);
            let workload_id = self.graph.upsert(
                NodeKey::namespaced(NodeKind::Workload, ns, workload.qualified_name()),
                NodeData::Workload {
                    controller_kind: workload.kind.clone(),
                    controller_name: workload.name.clone(),
                    pods: 1,
                },
            );
            let sa_id = self.graph.upsert(
                NodeKey::namespaced(NodeKind::ServiceAccount, ns, service_account_of(pod)),
                NodeData::Subject {
                    declared: false,
                    usage: Usage::Unknown,
                },
            );
            self.graph.add_edge(workload_id, sa_id, EdgeKind::Usage);
        }
    }

    fn mark_usage(&mut self) {
        if self.snapshot.pods.is_none() {
            return;
        }

        let mut used = vec![false; self.graph.node_count()];
        for edge in self.graph.edges() {
            if edge.kind == EdgeKind::Usage {
                used[edge.to.index()] = true;
            }
        }

        let ids: Vec<NodeId> = self.graph.nodes().map(|(id, _)| id).collect();
        for id in ids {
            let node = self.graph.node_mut(id);
            if node.key.kind != NodeKind::ServiceAccount {
                continue;
            }
            if let NodeData::Subject { usage, .. } = &mut node.data {
                *usage = if used[id.index()] {
                    Usage::Active
                } else {
                    Usage::Dormant
                };
            }
        }
    }
}
