//! Graphviz DOT serialization
//!
//! Output is deterministic: nodes are written in identity order and edges in
//! (source, target, kind) order, so the same cluster state always produces
//! byte-identical text. Namespaced nodes are grouped in one
//! `cluster_ns_<namespace>` subgraph per namespace.

use std::collections::BTreeMap;
use std::fmt::{self, Write};

use super::RenderOptions;
use crate::graph::{
    Edge, EdgeKind, GrantScope, Node, NodeData, NodeId, NodeKey, NodeKind, RbacGraph, Usage,
};
use crate::{Error, Result};

const FONT: &str = "Helvetica";

const CLUSTER_GRANT: &str = "style=bold";
const LOCAL_CLUSTER_ROLE_GRANT: &str = "style=dashed";
const USAGE_EDGE: &str = r##"style=dotted, arrowhead=open, color="#7b5ea7""##;
const RULES_LINK: &str = r##"style=dotted, arrowhead=none, color="#9e9e9e""##;

/// Visual class of a node
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Style {
    User,
    Group,
    ServiceAccount,
    DormantServiceAccount,
    UndeclaredServiceAccount,
    Role,
    ClusterRole,
    Workload,
    Rules,
}

impl Style {
    fn of(node: &Node) -> Self {
        match (node.key.kind, &node.data) {
            (NodeKind::User, _) => Style::User,
            (NodeKind::Group, _) => Style::Group,
            (NodeKind::ServiceAccount, NodeData::Subject { declared: false, .. }) => {
                Style::UndeclaredServiceAccount
            }
            (
                NodeKind::ServiceAccount,
                NodeData::Subject {
                    usage: Usage::Dormant,
                    ..
                },
            ) => Style::DormantServiceAccount,
            (NodeKind::ServiceAccount, _) => Style::ServiceAccount,
            (NodeKind::Role, _) => Style::Role,
            (NodeKind::ClusterRole, _) => Style::ClusterRole,
            (NodeKind::Workload, _) => Style::Workload,
        }
    }

    fn attributes(&self) -> &'static str {
        match self {
            Style::User => r##"shape=box, style="rounded,filled", fillcolor="#ffe08a""##,
            Style::Group => r##"shape=box3d, style=filled, fillcolor="#ffc870""##,
            Style::ServiceAccount => r##"shape=box, style="rounded,filled", fillcolor="#bfe0ff""##,
            Style::DormantServiceAccount => {
                r##"shape=box, style="rounded,filled", fillcolor="#ececec", fontcolor="#616161""##
            }
            Style::UndeclaredServiceAccount => {
                r##"shape=box, style="rounded,filled,dashed", fillcolor="#ffd6d6""##
            }
            Style::Role => r##"shape=octagon, style=filled, fillcolor="#d4f2d4""##,
            Style::ClusterRole => r##"shape=doubleoctagon, style=filled, fillcolor="#a9e2a9""##,
            Style::Workload => r##"shape=component, style=filled, fillcolor="#ead9ff""##,
            Style::Rules => {
                r##"shape=note, style=filled, fillcolor="#fffbe6", fontname="Courier", fontsize=9"##
            }
        }
    }
}

/// Serialize `graph` to DOT
pub fn render(graph: &RbacGraph, options: &RenderOptions) -> Result<String> {
    let mut out = String::with_capacity(4096);
    write_graph(&mut out, graph, options)
        .map_err(|e| Error::render(format!("failed to write DOT: {}", e)))?;
    Ok(out)
}

fn write_graph(out: &mut String, graph: &RbacGraph, options: &RenderOptions) -> fmt::Result {
    writeln!(out, "digraph rbac {{")?;
    writeln!(out, "  rankdir=LR;")?;
    writeln!(out, "  node [fontname=\"{FONT}\", fontsize=10];")?;
    writeln!(out, "  edge [fontname=\"{FONT}\", fontsize=8];")?;

    if options.show_legend {
        write_legend(out)?;
    }

    writeln!(out)?;
    let mut namespaces: BTreeMap<&str, Vec<NodeId>> = BTreeMap::new();
    for id in graph.sorted_ids() {
        let node = graph.node(id);
        match node.key.namespace() {
            Some(ns) => namespaces.entry(ns).or_default().push(id),
            None => write_node(out, "  ", node, options)?,
        }
    }

    for (ns, ids) in &namespaces {
        writeln!(out)?;
        writeln!(out, "  subgraph {} {{", quote(&format!("cluster_ns_{ns}")))?;
        writeln!(out, "    label={};", quote(&format!("namespace: {ns}")))?;
        writeln!(out, "    style=\"rounded,dashed\";")?;
        writeln!(out, "    color=\"#9e9e9e\";")?;
        for id in ids {
            write_node(out, "    ", graph.node(*id), options)?;
        }
        writeln!(out, "  }}")?;
    }

    writeln!(out)?;
    let mut edges: Vec<&Edge> = graph.edges().iter().collect();
    edges.sort_by(|a, b| {
        let key = |e: &Edge| (&graph.node(e.from).key, &graph.node(e.to).key, e.kind.clone());
        key(a).cmp(&key(b))
    });
    for edge in edges {
        write_edge(out, graph, edge)?;
    }

    writeln!(out, "}}")
}

fn write_node(out: &mut String, indent: &str, node: &Node, options: &RenderOptions) -> fmt::Result {
    let id = quote(&node_id(&node.key));
    let style = Style::of(node);
    writeln!(
        out,
        "{indent}{id} [{}, label={}];",
        style.attributes(),
        centered(&node_label(node, style))
    )?;

    if !options.show_rules {
        return Ok(());
    }
    let Some(rules) = node.rules().filter(|r| !r.is_empty()) else {
        return Ok(());
    };
    let note = quote(&format!("rules:{}", node_id(&node.key)));
    writeln!(
        out,
        "{indent}{note} [{}, label={}];",
        Style::Rules.attributes(),
        left_aligned(&rules.render_lines())
    )?;
    writeln!(out, "{indent}{id} -> {note} [{RULES_LINK}];")
}

fn write_edge(out: &mut String, graph: &RbacGraph, edge: &Edge) -> fmt::Result {
    let from = quote(&node_id(&graph.node(edge.from).key));
    let target = &graph.node(edge.to).key;
    let to = quote(&node_id(target));

    let attributes = match &edge.kind {
        EdgeKind::Binding {
            name,
            scope: GrantScope::Cluster,
        } => format!("label={}, {CLUSTER_GRANT}", quote(name)),
        EdgeKind::Binding {
            name,
            scope: GrantScope::Namespace(ns),
        } if target.kind == NodeKind::ClusterRole => format!(
            "label={}, {LOCAL_CLUSTER_ROLE_GRANT}",
            centered(&[name.clone(), format!("(in {ns})")])
        ),
        EdgeKind::Binding { name, .. } => format!("label={}", quote(name)),
        EdgeKind::Usage => USAGE_EDGE.to_string(),
    };
    writeln!(out, "  {from} -> {to} [{attributes}];")
}

fn write_legend(out: &mut String) -> fmt::Result {
    const NODES: [(&str, Style, &[&str]); 8] = [
        ("legend:user", Style::User, &["User"]),
        ("legend:group", Style::Group, &["Group"]),
        ("legend:sa", Style::ServiceAccount, &["ServiceAccount"]),
        ("legend:sa-dormant", Style::DormantServiceAccount, &["ServiceAccount", "(dormant)"]),
        ("legend:sa-missing", Style::UndeclaredServiceAccount, &["ServiceAccount", "(not found)"]),
        ("legend:role", Style::Role, &["Role"]),
        ("legend:clusterrole", Style::ClusterRole, &["ClusterRole"]),
        ("legend:workload", Style::Workload, &["Workload"]),
    ];

    writeln!(out)?;
    writeln!(out, "  subgraph cluster_legend {{")?;
    writeln!(out, "    label=\"Legend\";")?;
    writeln!(out, "    style=rounded;")?;
    writeln!(out, "    color=\"#bdbdbd\";")?;
    for (id, style, label) in NODES {
        let label: Vec<String> = label.iter().map(|l| l.to_string()).collect();
        writeln!(
            out,
            "    {} [{}, label={}];",
            quote(id),
            style.attributes(),
            centered(&label)
        )?;
    }
    writeln!(
        out,
        "    \"legend:rules\" [{}, label={}];",
        Style::Rules.attributes(),
        left_aligned(&["<verbs> <resources>".to_string()])
    )?;
    writeln!(
        out,
        "    \"legend:user\" -> \"legend:clusterrole\" [label=\"ClusterRoleBinding\", {CLUSTER_GRANT}];"
    )?;
    writeln!(
        out,
        "    \"legend:group\" -> \"legend:clusterrole\" [label={}, {LOCAL_CLUSTER_ROLE_GRANT}];",
        centered(&["RoleBinding".to_string(), "(in namespace)".to_string()])
    )?;
    writeln!(out, "    \"legend:sa\" -> \"legend:role\" [label=\"RoleBinding\"];")?;
    writeln!(out, "    \"legend:workload\" -> \"legend:sa\" [{USAGE_EDGE}];")?;
    writeln!(out, "    \"legend:role\" -> \"legend:rules\" [{RULES_LINK}];")?;
    writeln!(out, "  }}")
}

/// Stable DOT identifier of a node
fn node_id(key: &NodeKey) -> String {
    match key.namespace() {
        Some(ns) => format!("{}:{}:{}", key.kind, ns, key.name),
        None => format!("{}:{}", key.kind, key.name),
    }
}

fn node_label(node: &Node, style: Style) -> Vec<String> {
    match &node.data {
        NodeData::Workload {
            controller_kind,
            controller_name,
            pods,
        } => vec![
            controller_kind.clone(),
            controller_name.clone(),
            match pods {
                1 => "1 pod".to_string(),
                n => format!("{n} pods"),
            },
        ],
        _ => {
            let mut lines = vec![node.key.kind.to_string(), node.key.name.clone()];
            match style {
                Style::DormantServiceAccount => lines.push("(dormant)".to_string()),
                Style::UndeclaredServiceAccount => lines.push("(not found)".to_string()),
                _ => {}
            }
            lines
        }
    }
}

/// Escape a value for use inside a double-quoted DOT string
fn escape(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\r' => {}
            _ => out.push(c),
        }
    }
    out
}

fn quote(s: &str) -> String {
    format!("\"{}\"", escape(s))
}

/// Quoted label with centered lines
fn centered(lines: &[String]) -> String {
    let escaped: Vec<String> = lines.iter().map(|l| escape(l)).collect();
    format!("\"{}\"", escaped.join("\\n"))
}

/// Quoted label with left-justified lines
fn left_aligned(lines: &[String]) -> String {
    let mut label = String::from("\"");
    for line in lines {
        label.push_str(&escape(line));
        label.push_str("\\l");
    }
    label.push('"');
    label
}
