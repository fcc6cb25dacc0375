//! Export a package graph as DOT (Graphviz), Mermaid flowchart, or JSON.

use crate::RenderError;
use packgraph_core::config::StyleConfig;
use packgraph_core::graph::{Edge, EdgeKind, Graph, Node};
use std::collections::HashMap;
use std::fmt::Write;

/// Export format for graph visualization.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExportFormat {
    Dot,
    Mermaid,
    Json,
}

/// Export the graph as a DOT (Graphviz) string.
pub fn export_dot(graph: &Graph, style: &StyleConfig) -> String {
    let mut out = String::new();
    writeln!(out, "digraph packages {{").unwrap();
    writeln!(out, "  dpi={};", style.dpi).unwrap();
    writeln!(
        out,
        "  node [shape=box, style=\"filled, rounded\", fontcolor=\"{}\", height=1.0];",
        escape(&style.font_color)
    )
    .unwrap();
    writeln!(out).unwrap();

    for node in &graph.nodes {
        write_dot_node(node, style, &mut out);
    }

    writeln!(out).unwrap();

    for edge in &graph.edges {
        write_dot_edge(edge, style, &mut out);
    }

    writeln!(out, "}}").unwrap();
    out
}

fn write_dot_node(node: &Node, style: &StyleConfig, out: &mut String) {
    let fill = escape(style.fill_color(node.primary));
    let font_size = style.font_size * node.tier.font_scale();
    write!(
        out,
        "  \"{}\" [label=\"{}\", fontsize={}, fillcolor=\"{}\", color=\"{}\"",
        escape(&node.id),
        escape(&node.label),
        font_size,
        fill,
        fill
    )
    .unwrap();
    if let Some(margin) = node.tier.margin() {
        write!(out, ", margin={}", margin).unwrap();
    }
    writeln!(out, "];").unwrap();
}

fn write_dot_edge(edge: &Edge, style: &StyleConfig, out: &mut String) {
    write!(
        out,
        "  \"{}\" -> \"{}\"",
        escape(&edge.source),
        escape(&edge.target)
    )
    .unwrap();
    match edge.kind {
        EdgeKind::Dependency => {
            writeln!(out, " [color=\"{}\"];", escape(&style.dependency_edge)).unwrap();
        }
        EdgeKind::DeprecatedReference => {
            write!(
                out,
                " [color=\"{}\", penwidth={}",
                escape(&style.deprecated_reference_edge),
                edge.weight.unwrap_or(1)
            )
            .unwrap();
            if !style.deprecated_reference_ranking {
                write!(out, ", constraint=false").unwrap();
            }
            writeln!(out, "];").unwrap();
        }
    }
}

/// Escape a string for use inside a double-quoted DOT or Mermaid literal.
fn escape(s: &str) -> String {
    s.replace('\\', "\\\\").replace('"', "\\\"")
}

/// Export the graph as a Mermaid flowchart string.
pub fn export_mermaid(graph: &Graph, style: &StyleConfig) -> String {
    let mut out = String::new();
    writeln!(out, "flowchart LR").unwrap();

    // Identities contain `/` and `.`, so nodes get positional ids.
    let ids: HashMap<&str, String> = graph
        .nodes
        .iter()
        .enumerate()
        .map(|(i, n)| (n.id.as_str(), format!("n{}", i)))
        .collect();

    for node in &graph.nodes {
        let class = if node.primary { "primary" } else { "secondary" };
        writeln!(
            out,
            "  {}[\"{}\"]:::{}",
            ids[node.id.as_str()],
            mermaid_label(&node.label),
            class
        )
        .unwrap();
    }

    writeln!(out).unwrap();

    for edge in &graph.edges {
        let (Some(src), Some(tgt)) = (ids.get(edge.source.as_str()), ids.get(edge.target.as_str()))
        else {
            continue;
        };
        match edge.kind {
            EdgeKind::Dependency => writeln!(out, "  {} --> {}", src, tgt).unwrap(),
            EdgeKind::DeprecatedReference => writeln!(
                out,
                "  {} -.->|{}| {}",
                src,
                edge.violations.unwrap_or(0),
                tgt
            )
            .unwrap(),
        }
    }

    writeln!(out).unwrap();
    writeln!(
        out,
        "  classDef primary fill:{},color:{}",
        style.fill_color(true),
        style.font_color
    )
    .unwrap();
    writeln!(
        out,
        "  classDef secondary fill:{},color:{}",
        style.fill_color(false),
        style.font_color
    )
    .unwrap();

    out
}

fn mermaid_label(label: &str) -> String {
    label.replace('"', "#quot;")
}

/// Export the graph model as pretty-printed JSON.
pub fn export_json(graph: &Graph) -> Result<String, RenderError> {
    Ok(serde_json::to_string_pretty(graph)?)
}

/// Export the graph in the specified format.
pub fn export(graph: &Graph, style: &StyleConfig, format: ExportFormat) -> Result<String, RenderError> {
    match format {
        ExportFormat::Dot => Ok(export_dot(graph, style)),
        ExportFormat::Mermaid => Ok(export_mermaid(graph, style)),
        ExportFormat::Json => export_json(graph),
    }
}
