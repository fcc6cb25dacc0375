//! Package dependency graph: nodes, typed edges, and the builder that derives
//! them from a [`PackageRegistry`].

use crate::config::GraphConfig;
use crate::manifest::ROOT_PACKAGE;
use crate::package::{Package, PackageRegistry};
use crate::size::SourceVolume;
use serde::Serialize;
use std::collections::{HashMap, HashSet};
use tracing::{debug, warn};

/// Upper bound of the deprecated-reference edge weight scale.
pub const MAX_EDGE_WEIGHT: u8 = 5;
/// Violations per weight step.
const VIOLATIONS_PER_WEIGHT: usize = 5;

/// The kind of relationship between two packages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EdgeKind {
    /// Declared in the consumer's dependency manifest.
    Dependency,
    /// Recorded boundary violation against the provider.
    DeprecatedReference,
}

/// Display emphasis bucket derived from a package's source volume.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SizeTier {
    /// Under 10 kB.
    Tiny,
    /// Under 100 kB.
    Small,
    /// Under 1000 kB.
    Medium,
    /// Under 10000 kB.
    Large,
    Huge,
}

impl SizeTier {
    pub fn from_kilobytes(kb: u64) -> Self {
        match kb {
            0..10 => Self::Tiny,
            10..100 => Self::Small,
            100..1_000 => Self::Medium,
            1_000..10_000 => Self::Large,
            _ => Self::Huge,
        }
    }

    /// Multiplier applied to the base font size.
    pub fn font_scale(self) -> f64 {
        match self {
            Self::Tiny => 1.0,
            Self::Small => 2.0,
            Self::Medium => 4.0,
            Self::Large => 8.0,
            Self::Huge => 16.0,
        }
    }

    /// Extra node margin, if any.
    pub fn margin(self) -> Option<f64> {
        match self {
            Self::Tiny => None,
            Self::Small => Some(0.2),
            Self::Medium => Some(0.4),
            Self::Large => Some(0.8),
            Self::Huge => Some(1.0),
        }
    }
}

/// Weight of a deprecated-reference edge: one step per five violations,
/// at least 1 and saturating at [`MAX_EDGE_WEIGHT`].
pub fn edge_weight(violations: usize) -> u8 {
    (violations / VIOLATIONS_PER_WEIGHT).clamp(1, MAX_EDGE_WEIGHT as usize) as u8
}

/// A package as drawn.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Node {
    pub id: String,
    pub label: String,
    pub primary: bool,
    pub enforce_privacy: bool,
    /// Measured source volume, when sizes were requested.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub size_kb: Option<u64>,
    pub tier: SizeTier,
}

/// A directed relation between two packages.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Edge {
    /// Consumer package.
    pub source: String,
    /// Provider package.
    pub target: String,
    pub kind: EdgeKind,
    /// Only set for deprecated references.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub weight: Option<u8>,
    /// Raw violation count behind `weight`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub violations: Option<usize>,
}

/// Aggregate counts for a built graph.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct GraphStats {
    pub nodes: usize,
    pub primary_nodes: usize,
    pub dependency_edges: usize,
    pub deprecated_reference_edges: usize,
    pub suppressed_edges: usize,
}

/// Nodes and edges in creation order, ready for a renderer.
#[derive(Debug, Clone, Default, Serialize)]
pub struct Graph {
    pub nodes: Vec<Node>,
    pub edges: Vec<Edge>,
    /// Edges dropped by partial-view filtering.
    pub suppressed_edges: usize,
    #[serde(skip)]
    node_index: HashMap<String, usize>,
    #[serde(skip)]
    edge_keys: HashSet<(String, String, EdgeKind)>,
}

impl Graph {
    pub fn node(&self, id: &str) -> Option<&Node> {
        self.node_index.get(id).map(|&i| &self.nodes[i])
    }

    pub fn edge(&self, source: &str, target: &str, kind: EdgeKind) -> Option<&Edge> {
        self.edges
            .iter()
            .find(|e| e.kind == kind && e.source == source && e.target == target)
    }

    pub fn edges_of_kind(&self, kind: EdgeKind) -> impl Iterator<Item = &Edge> {
        self.edges.iter().filter(move |e| e.kind == kind)
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn stats(&self) -> GraphStats {
        GraphStats {
            nodes: self.nodes.len(),
            primary_nodes: self.nodes.iter().filter(|n| n.primary).count(),
            dependency_edges: self.edges_of_kind(EdgeKind::Dependency).count(),
            deprecated_reference_edges: self
                .edges_of_kind(EdgeKind::DeprecatedReference)
                .count(),
            suppressed_edges: self.suppressed_edges,
        }
    }

    fn has_node(&self, id: &str) -> bool {
        self.node_index.contains_key(id)
    }

    fn push_node(&mut self, node: Node) {
        if self.has_node(&node.id) {
            return;
        }
        self.node_index.insert(node.id.clone(), self.nodes.len());
        self.nodes.push(node);
    }

    /// Add an edge unless one of the same kind already joins the same pair.
    fn push_edge(&mut self, edge: Edge) -> bool {
        let key = (edge.source.clone(), edge.target.clone(), edge.kind);
        if !self.edge_keys.insert(key) {
            return false;
        }
        self.edges.push(edge);
        true
    }
}

/// Options controlling how a registry becomes a graph.
#[derive(Debug, Clone)]
pub struct GraphOptions {
    /// Label used for the root package.
    pub default_package: String,
    /// Prefix removed from identities when building labels.
    pub package_prefix: String,
    /// Suppress secondary fan-out on partial scans.
    pub focus_primary: bool,
    pub analyze_sizes: bool,
    pub privacy_marker: String,
}

impl Default for GraphOptions {
    fn default() -> Self {
        GraphConfig::default().into()
    }
}

impl From<GraphConfig> for GraphOptions {
    fn from(config: GraphConfig) -> Self {
        Self {
            default_package: config.default_package,
            package_prefix: config.package_prefix,
            focus_primary: config.focus_primary,
            analyze_sizes: config.analyze_sizes,
            privacy_marker: config.privacy_marker,
        }
    }
}

impl From<&GraphConfig> for GraphOptions {
    fn from(config: &GraphConfig) -> Self {
        config.clone().into()
    }
}

/// Walks a registry and emits nodes and edges in traversal order.
pub struct GraphBuilder<'a> {
    options: GraphOptions,
    meter: Option<&'a dyn SourceVolume>,
}

impl<'a> GraphBuilder<'a> {
    pub fn new(options: GraphOptions) -> Self {
        Self {
            options,
            meter: None,
        }
    }

    /// Source volume capability used when `analyze_sizes` is set.
    pub fn measure_with(mut self, meter: &'a dyn SourceVolume) -> Self {
        self.meter = Some(meter);
        self
    }

    /// Display name for a package identity.
    pub fn display_name(&self, name: &str) -> String {
        if name == ROOT_PACKAGE {
            return self.options.default_package.clone();
        }
        let stripped = if self.options.package_prefix.is_empty() {
            name
        } else {
            name.strip_prefix(self.options.package_prefix.as_str())
                .unwrap_or(name)
        };
        let stripped = stripped.trim_start_matches('/');
        if stripped.is_empty() {
            name.to_string()
        } else {
            stripped.to_string()
        }
    }

    pub fn build(&self, registry: &PackageRegistry) -> Graph {
        if self.options.analyze_sizes && self.meter.is_none() {
            warn!("size analysis requested without a source meter, using default node size");
        }
        let filter = registry.is_partial() && self.options.focus_primary;
        let mut graph = Graph::default();

        for package in registry {
            self.ensure_node(&mut graph, registry, &package.name);

            for dependency in &package.dependencies {
                if filter && Self::suppressed(registry, package, dependency) {
                    graph.suppressed_edges += 1;
                    continue;
                }
                self.ensure_node(&mut graph, registry, dependency);
                graph.push_edge(Edge {
                    source: package.name.clone(),
                    target: dependency.clone(),
                    kind: EdgeKind::Dependency,
                    weight: None,
                    violations: None,
                });
            }

            for reference in &package.deprecated_references {
                if filter && Self::suppressed(registry, package, &reference.provider) {
                    graph.suppressed_edges += 1;
                    continue;
                }
                self.ensure_node(&mut graph, registry, &reference.provider);
                graph.push_edge(Edge {
                    source: package.name.clone(),
                    target: reference.provider.clone(),
                    kind: EdgeKind::DeprecatedReference,
                    weight: Some(edge_weight(reference.count)),
                    violations: Some(reference.count),
                });
            }
        }

        debug!(
            nodes = graph.nodes.len(),
            edges = graph.edges.len(),
            suppressed = graph.suppressed_edges,
            "built package graph"
        );
        graph
    }

    /// Partial views keep secondary packages as leaves: their edges survive
    /// only when they lead back into a primary package.
    fn suppressed(registry: &PackageRegistry, source: &Package, target: &str) -> bool {
        !source.primary && !registry.get(target).is_some_and(|p| p.primary)
    }

    fn ensure_node(&self, graph: &mut Graph, registry: &PackageRegistry, name: &str) {
        if graph.has_node(name) {
            return;
        }
        let node = match registry.get(name) {
            Some(package) => self.make_node(package),
            None => {
                let path = if name == ROOT_PACKAGE {
                    registry.root().to_path_buf()
                } else {
                    registry.root().join(name)
                };
                self.make_node(&Package::secondary(name, path))
            }
        };
        graph.push_node(node);
    }

    fn make_node(&self, package: &Package) -> Node {
        let size_kb = match self.meter {
            Some(meter) if self.options.analyze_sizes => Some(meter.kilobytes(&package.path)),
            _ => None,
        };
        let mut label = self.display_name(&package.name);
        if package.enforce_privacy {
            label.push_str(&self.options.privacy_marker);
        }
        Node {
            id: package.name.clone(),
            label,
            primary: package.primary,
            enforce_privacy: package.enforce_privacy,
            size_kb,
            tier: size_kb.map_or(SizeTier::Tiny, SizeTier::from_kilobytes),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_edge_weight_clamps() {
        assert_eq!(edge_weight(0), 1);
        assert_eq!(edge_weight(1), 1);
        assert_eq!(edge_weight(9), 1);
        assert_eq!(edge_weight(10), 2);
        assert_eq!(edge_weight(24), 4);
        assert_eq!(edge_weight(25), 5);
        assert_eq!(edge_weight(10_000), 5);
    }

    #[test]
    fn test_edge_weight_matches_formula() {
        for n in 0..60usize {
            let expected = (n / 5).clamp(1, 5) as u8;
            assert_eq!(edge_weight(n), expected, "count {}", n);
        }
    }

    #[test]
    fn test_size_tiers() {
        assert_eq!(SizeTier::from_kilobytes(0), SizeTier::Tiny);
        assert_eq!(SizeTier::from_kilobytes(9), SizeTier::Tiny);
        assert_eq!(SizeTier::from_kilobytes(10), SizeTier::Small);
        assert_eq!(SizeTier::from_kilobytes(999), SizeTier::Medium);
        assert_eq!(SizeTier::from_kilobytes(1_000), SizeTier::Large);
        assert_eq!(SizeTier::from_kilobytes(10_000), SizeTier::Huge);
        assert!(SizeTier::Tiny < SizeTier::Huge);
        assert_eq!(SizeTier::Huge.font_scale(), 16.0);
        assert_eq!(SizeTier::Tiny.margin(), None);
    }

    #[test]
    fn test_display_name() {
        let builder = GraphBuilder::new(GraphOptions {
            default_package: "Monolith".to_string(),
            package_prefix: "packs".to_string(),
            ..GraphOptions::default()
        });
        assert_eq!(builder.display_name("."), "Monolith");
        assert_eq!(builder.display_name("packs/billing"), "billing");
        assert_eq!(builder.display_name("components/auth"), "components/auth");
        assert_eq!(builder.display_name("packs"), "packs");
    }

    #[test]
    fn test_edges_deduplicated_per_kind() {
        let mut graph = Graph::default();
        let edge = Edge {
            source: "a".to_string(),
            target: "b".to_string(),
            kind: EdgeKind::Dependency,
            weight: None,
            violations: None,
        };
        assert!(graph.push_edge(edge.clone()));
        assert!(!graph.push_edge(edge.clone()));
        assert!(graph.push_edge(Edge {
            kind: EdgeKind::DeprecatedReference,
            weight: Some(1),
            violations: Some(1),
            ..edge
        }));
        assert_eq!(graph.edges.len(), 2);
    }
}
