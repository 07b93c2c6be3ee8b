//! End-to-end visualization: validate, fetch, build, filter, render

use std::collections::BTreeSet;
use std::fmt;
use std::io::Write;

use serde::Serialize;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::fetch::{fetch_snapshot, RbacSource};
use crate::filter;
use crate::graph::{GraphBuilder, RbacGraph};
use crate::options::{OutputFormat, VisualizeOptions};
use crate::render::{self, RenderOptions};
use crate::warning::Warning;
use crate::{Error, Result};

/// Size of the rendered graph
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
pub struct Summary {
    /// Nodes after filtering
    pub nodes: usize,
    /// Edges after filtering
    pub edges: usize,
    /// Distinct namespaces of the remaining namespaced nodes
    pub namespaces: usize,
    /// Warnings raised while fetching and building
    pub warnings: usize,
}

impl Summary {
    fn of(graph: &RbacGraph, warnings: usize) -> Self {
        let namespaces: BTreeSet<&str> = graph
            .nodes()
            .filter_map(|(_, node)| node.key.namespace())
            .collect();
        Self {
            nodes: graph.node_count(),
            edges: graph.edge_count(),
            namespaces: namespaces.len(),
            warnings,
        }
    }
}

impl fmt::Display for Summary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} nodes, {} edges across {} namespaces",
            self.nodes, self.edges, self.namespaces
        )
    }
}

/// A rendered graph and everything reported while producing it
#[derive(Clone, Debug)]
pub struct Visualization {
    /// DOT text or HTML document
    pub content: String,
    /// Format of `content`
    pub format: OutputFormat,
    /// Non-fatal problems, fetch failures first
    pub warnings: Vec<Warning>,
    /// Graph size
    pub summary: Summary,
}

impl Visualization {
    /// Write the rendered content to `sink`
    pub fn write_to<W: Write>(&self, mut sink: W) -> Result<()> {
        sink.write_all(self.content.as_bytes())?;
        sink.flush()?;
        Ok(())
    }
}

/// Produce a visualization of the RBAC state behind `source`
///
/// Options are validated before any list call is made. Kinds that fail to
/// list only degrade the graph and are reported as warnings. Cancelling
/// `cancel` at any point yields [`Error::Cancelled`] and no output.
pub async fn visualize<S>(
    source: &S,
    options: &VisualizeOptions,
    cancel: &CancellationToken,
) -> Result<Visualization>
where
    S: RbacSource + ?Sized,
{
    let resolved = options.validate()?;
    info!(
        format = %resolved.format,
        include = %options.included_namespaces,
        exclude = %options.excluded_namespaces,
        "generating RBAC graph"
    );

    let outcome = fetch_snapshot(source, cancel).await?;
    if let Some(err) = outcome.joined_error() {
        warn!(error = %err, "continuing with a partial snapshot");
    }

    let built = GraphBuilder::new(&outcome.snapshot).build();
    let mut warnings: Vec<Warning> = outcome.failures.into_iter().map(Warning::from).collect();
    warnings.extend(built.warnings);

    let mut graph = built.graph;
    filter::apply(&mut graph, &resolved.filter);

    let summary = Summary::of(&graph, warnings.len());
    let render_options = RenderOptions {
        show_legend: resolved.show_legend,
        show_rules: resolved.show_rules,
    };
    let content = render::render(&graph, resolved.format, &render_options, &summary)?;

    if cancel.is_cancelled() {
        return Err(Error::Cancelled);
    }

    info!(
        nodes = summary.nodes,
        edges = summary.edges,
        warnings = summary.warnings,
        "rendered RBAC graph"
    );
    Ok(Visualization {
        content,
        format: resolved.format,
        warnings,
        summary,
    })
}
