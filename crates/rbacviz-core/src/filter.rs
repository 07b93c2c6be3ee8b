//! Namespace filtering of a built graph

use tracing::debug;

use crate::graph::{EdgeKind, RbacGraph};
use crate::options::NamespaceFilter;

/// What a filter pass removed
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct FilterStats {
    /// Nodes removed
    pub nodes_removed: usize,
    /// Edges removed
    pub edges_removed: usize,
}

/// Restrict `graph` to the namespaces allowed by `filter`
///
/// Namespaced nodes outside the filter are removed together with their
/// edges, as are binding edges that grant into a filtered-out namespace.
/// Cluster-scoped nodes left without any edge are then pruned. Applying
/// the same filter twice changes nothing the second time.
pub fn apply(graph: &mut RbacGraph, filter: &NamespaceFilter) -> FilterStats {
    let (nodes_before, edges_before) = (graph.node_count(), graph.edge_count());

    graph.retain_nodes(|_, node| match node.key.namespace() {
        Some(ns) => filter.allows(ns),
        None => true,
    });

    graph.retain_edges(|edge, _, _| match &edge.kind {
        EdgeKind::Binding { scope, .. } => scope.namespace().map_or(true, |ns| filter.allows(ns)),
        EdgeKind::Usage => true,
    });

    let degrees = graph.degrees();
    graph.retain_nodes(|id, node| !node.key.kind.is_cluster_scoped() || degrees[id.index()] > 0);

    let stats = FilterStats {
        nodes_removed: nodes_before - graph.node_count(),
        edges_removed: edges_before - graph.edge_count(),
    };
    debug!(
        nodes_removed = stats.nodes_removed,
        edges_removed = stats.edges_removed,
        "applied namespace filter"
    );
    stats
}
