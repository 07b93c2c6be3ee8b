//! Graph rendering
//!
//! The graph is always serialized to Graphviz DOT first. The HTML format
//! wraps that DOT text in a page that lays it out in the browser.

pub mod dot;
pub mod html;

use crate::graph::RbacGraph;
use crate::options::OutputFormat;
use crate::pipeline::Summary;
use crate::Result;

/// Presentation switches
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RenderOptions {
    /// Emit a legend subgraph
    pub show_legend: bool,
    /// Emit a rules note for each role
    pub show_rules: bool,
}

impl Default for RenderOptions {
    fn default() -> Self {
        Self {
            show_legend: false,
            show_rules: true,
        }
    }
}

/// Render `graph` in the requested format
pub fn render(
    graph: &RbacGraph,
    format: OutputFormat,
    options: &RenderOptions,
    summary: &Summary,
) -> Result<String> {
    let dot = dot::render(graph, options)?;
    match format {
        OutputFormat::Dot => Ok(dot),
        OutputFormat::Html => html::render(&dot, summary),
    }
}
