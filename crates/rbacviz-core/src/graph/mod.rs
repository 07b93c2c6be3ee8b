//! RBAC graph for the visualizer
//!
//! Nodes live in an arena keyed by identity `(kind, namespace, name)`;
//! edges are pairs of indices into that arena. Two objects with the same
//! identity always collapse into one node. Pruning compacts the arena and
//! remaps every edge, so an edge can never point at a removed node.
//!
//! The grant scope of a binding is carried on the edge, not on the role:
//! a ClusterRole granted by a RoleBinding and the same ClusterRole granted
//! by a ClusterRoleBinding share one node but have different edges.

pub mod builder;
#[cfg(test)]
pub(crate) mod fixtures;
pub mod workload;

use std::collections::{HashMap, HashSet};
use std::fmt;

use crate::rules::RuleSet;

pub use builder::GraphBuilder;

/// Kind of node in the graph
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum NodeKind {
    /// User subject (no backing object)
    User,
    /// Group subject (no backing object)
    Group,
    /// ServiceAccount subject
    ServiceAccount,
    /// Namespaced Role
    Role,
    /// Cluster-scoped ClusterRole
    ClusterRole,
    /// Top-level controller of running pods
    Workload,
}

impl NodeKind {
    /// Kind name as it appears in Kubernetes objects
    pub fn as_str(&self) -> &'static str {
        match self {
            NodeKind::User => "User",
            NodeKind::Group => "Group",
            NodeKind::ServiceAccount => "ServiceAccount",
            NodeKind::Role => "Role",
            NodeKind::ClusterRole => "ClusterRole",
            NodeKind::Workload => "Workload",
        }
    }

    /// Cluster-scoped kinds are never pruned by namespace directly
    pub fn is_cluster_scoped(&self) -> bool {
        matches!(self, NodeKind::User | NodeKind::Group | NodeKind::ClusterRole)
    }
}

impl fmt::Display for NodeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Node identity: (kind, namespace, name)
///
/// Cluster-scoped nodes have an empty namespace.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeKey {
    /// Node kind
    pub kind: NodeKind,
    /// Namespace, empty for cluster-scoped kinds
    pub namespace: String,
    /// Object name
    pub name: String,
}

impl NodeKey {
    /// Key for a cluster-scoped node
    pub fn cluster(kind: NodeKind, name: impl Into<String>) -> Self {
        Self {
            kind,
            namespace: String::new(),
            name: name.into(),
        }
    }

    /// Key for a namespace-scoped node
    pub fn namespaced(
        kind: NodeKind,
        namespace: impl Into<String>,
        name: impl Into<String>,
    ) -> Self {
        Self {
            kind,
            namespace: namespace.into(),
            name: name.into(),
        }
    }

    /// Namespace of the node, `None` when cluster-scoped
    pub fn namespace(&self) -> Option<&str> {
        if self.namespace.is_empty() {
            None
        } else {
            Some(&self.namespace)
        }
    }
}

impl fmt::Display for NodeKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.namespace() {
            Some(ns) => write!(f, "{} {}/{}", self.kind, ns, self.name),
            None => write!(f, "{} {}", self.kind, self.name),
        }
    }
}

/// Whether a subject is exercised by running workloads
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Usage {
    /// At least one running workload uses the ServiceAccount
    Active,
    /// A ServiceAccount no running workload uses
    Dormant,
    /// Not known (Users, Groups, or pods could not be fetched)
    Unknown,
}

/// Per-kind node payload
#[derive(Clone, Debug, PartialEq)]
pub enum NodeData {
    /// User, Group or ServiceAccount
    Subject {
        /// A backing object was fetched (always true for Users and Groups)
        declared: bool,
        /// Runtime usage of the identity
        usage: Usage,
    },
    /// Role or ClusterRole
    Role {
        /// Access rules granted by the role
        rules: RuleSet,
    },
    /// Top-level pod controller
    Workload {
        /// Controller kind (Deployment, StatefulSet, Pod, ...)
        controller_kind: String,
        /// Controller name
        controller_name: String,
        /// Number of running pods owned by the controller
        pods: u32,
    },
}

impl NodeData {
    /// Merge another payload for the same identity into this one
    fn absorb(&mut self, other: NodeData) {
        match (self, other) {
            (
                NodeData::Subject { declared, .. },
                NodeData::Subject {
                    declared: other_declared,
                    ..
                },
            ) => *declared |= other_declared,
            (NodeData::Role { rules }, NodeData::Role { rules: other }) => rules.merge(other),
            (NodeData::Workload { pods, .. }, NodeData::Workload { pods: other, .. }) => {
                *pods += other
            }
            _ => {}
        }
    }
}

/// A node in the graph
#[derive(Clone, Debug, PartialEq)]
pub struct Node {
    /// Identity
    pub key: NodeKey,
    /// Payload
    pub data: NodeData,
}

impl Node {
    /// Rules of a role node
    pub fn rules(&self) -> Option<&RuleSet> {
        match &self.data {
            NodeData::Role { rules } => Some(rules),
            _ => None,
        }
    }

    /// Usage of a subject node
    pub fn usage(&self) -> Option<Usage> {
        match &self.data {
            NodeData::Subject { usage, .. } => Some(*usage),
            _ => None,
        }
    }
}

/// Index of a node in the arena
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(usize);

impl NodeId {
    /// Position in the arena
    pub fn index(&self) -> usize {
        self.0
    }
}

/// Where a binding grants its role's rules
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum GrantScope {
    /// Granted cluster-wide by a ClusterRoleBinding
    Cluster,
    /// Granted within one namespace by a RoleBinding
    Namespace(String),
}

impl GrantScope {
    /// Namespace of a namespace-local grant
    pub fn namespace(&self) -> Option<&str> {
        match self {
            GrantScope::Cluster => None,
            GrantScope::Namespace(ns) => Some(ns),
        }
    }
}

/// Kind of edge in the graph
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum EdgeKind {
    /// Subject → Role, created by a (Cluster)RoleBinding
    Binding {
        /// Name of the binding object
        name: String,
        /// Scope of the grant
        scope: GrantScope,
    },
    /// Workload → ServiceAccount
    Usage,
}

/// A directed edge between two arena nodes
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct Edge {
    /// Source node
    pub from: NodeId,
    /// Target node
    pub to: NodeId,
    /// Edge kind
    pub kind: EdgeKind,
}

/// Arena-backed RBAC graph
#[derive(Clone, Debug, Default)]
pub struct RbacGraph {
    nodes: Vec<Node>,
    index: HashMap<NodeKey, NodeId>,
    edges: Vec<Edge>,
    edge_set: HashSet<Edge>,
}

impl RbacGraph {
    /// Create a new empty graph
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a node, or merge into the node with the same identity
    pub fn upsert(&mut self, key: NodeKey, data: NodeData) -> NodeId {
        if let Some(&id) = self.index.get(&key) {
            self.nodes[id.0].data.absorb(data);
            return id;
        }
        let id = NodeId(self.nodes.len());
        self.index.insert(key.clone(), id);
        self.nodes.push(Node { key, data });
        id
    }

    /// Look up a node id by identity
    pub fn id_of(&self, key: &NodeKey) -> Option<NodeId> {
        self.index.get(key).copied()
    }

    /// Look up a node by identity
    pub fn get(&self, key: &NodeKey) -> Option<&Node> {
        self.id_of(key).map(|id| &self.nodes[id.0])
    }

    /// Node at `id`
    pub fn node(&self, id: NodeId) -> &Node {
        &self.nodes[id.0]
    }

    /// Mutable node at `id`
    pub fn node_mut(&mut self, id: NodeId) -> &mut Node {
        &mut self.nodes[id.0]
    }

    /// Add an edge; returns false if an identical edge already exists
    pub fn add_edge(&mut self, from: NodeId, to: NodeId, kind: EdgeKind) -> bool {
        let edge = Edge { from, to, kind };
        if self.edge_set.contains(&edge) {
            return false;
        }
        self.edge_set.insert(edge.clone());
        self.edges.push(edge);
        true
    }

    /// All nodes in insertion order
    pub fn nodes(&self) -> impl Iterator<Item = (NodeId, &Node)> {
        self.nodes.iter().enumerate().map(|(i, n)| (NodeId(i), n))
    }

    /// All edges in insertion order
    pub fn edges(&self) -> &[Edge] {
        &self.edges
    }

    /// Number of nodes
    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    /// Number of edges
    pub fn edge_count(&self) -> usize {
        self.edges.len()
    }

    /// Number of edges touching each node, indexed by `NodeId::index`
    pub fn degrees(&self) -> Vec<usize> {
        let mut degrees = vec![0; self.nodes.len()];
        for edge in &self.edges {
            degrees[edge.from.0] += 1;
            degrees[edge.to.0] += 1;
        }
        degrees
    }

    /// Node ids sorted by identity, for deterministic output
    pub fn sorted_ids(&self) -> Vec<NodeId> {
        let mut ids: Vec<NodeId> = (0..self.nodes.len()).map(NodeId).collect();
        ids.sort_by(|a, b| self.nodes[a.0].key.cmp(&self.nodes[b.0].key));
        ids
    }

    /// Edges between two identities
    pub fn edges_between(&self, from: &NodeKey, to: &NodeKey) -> Vec<&Edge> {
        let (Some(from), Some(to)) = (self.id_of(from), self.id_of(to)) else {
            return vec![];
        };
        self.edges
            .iter()
            .filter(|e| e.from == from && e.to == to)
            .collect()
    }

    /// Keep only the edges for which `keep` returns true
    pub fn retain_edges(&mut self, mut keep: impl FnMut(&Edge, &Node, &Node) -> bool) {
        let nodes = &self.nodes;
        self.edges
            .retain(|e| keep(e, &nodes[e.from.0], &nodes[e.to.0]));
        self.edge_set = self.edges.iter().cloned().collect();
    }

    /// Keep only the nodes for which `keep` returns true
    ///
    /// Edges touching a removed node are dropped before the arena is
    /// compacted and the remaining edges are remapped.
    pub fn retain_nodes(&mut self, mut keep: impl FnMut(NodeId, &Node) -> bool) {
        let mut remap: Vec<Option<NodeId>> = Vec::with_capacity(self.nodes.len());
        let mut kept = Vec::with_capacity(self.nodes.len());
        for (i, node) in std::mem::take(&mut self.nodes).into_iter().enumerate() {
            if keep(NodeId(i), &node) {
                remap.push(Some(NodeId(kept.len())));
                kept.push(node);
            } else {
                remap.push(None);
            }
        }

        let edges = std::mem::take(&mut self.edges);
        self.edges = edges
            .into_iter()
            .filter_map(|e| {
                Some(Edge {
                    from: remap[e.from.0]?,
                    to: remap[e.to.0]?,
                    kind: e.kind,
                })
            })
            .collect();

        self.nodes = kept;
        self.index = self
            .nodes
            .iter()
            .enumerate()
            .map(|(i, n)| (n.key.clone(), NodeId(i)))
            .collect();
        self.edge_set = self.edges.iter().cloned().collect();
    }
}
