//! CLI binary for packgraph: visualize package dependencies and boundary violations.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use packgraph_core::config::PackgraphConfig;
use packgraph_core::graph::{Graph, GraphBuilder};
use packgraph_core::manifest::ManifestStore;
use packgraph_core::package::PackageRegistry;
use packgraph_core::size::FileSizeMeter;
use packgraph_render::export::{self, ExportFormat};
use packgraph_render::graphviz;
use std::path::{Path, PathBuf};

#[derive(Parser)]
#[command(name = "packgraph", about = "Package dependency graph visualizer")]
struct Cli {
    /// Project root directory (defaults to current directory)
    #[arg(short, long, global = true)]
    project: Option<PathBuf>,

    /// Restrict the scan to these sub-paths of the project (repeatable)
    #[arg(long = "path", global = true)]
    paths: Vec<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Build the package graph and export or render it
    Graph {
        /// Output format: png, dot, mermaid, json
        #[arg(short, long, default_value = "png")]
        format: String,

        /// Output file (defaults to packgraph.png for png, stdout otherwise)
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Scale nodes by the size of their source code
        #[arg(long)]
        analyze_sizes: bool,

        /// Display name for the root package
        #[arg(long)]
        default_package: Option<String>,

        /// Keep edges leaving secondary packages on partial scans
        #[arg(long)]
        full_view: bool,
    },

    /// List resolved packages
    List {
        /// Only show packages discovered through their own manifests
        #[arg(long)]
        primary_only: bool,
    },

    /// Show package and graph statistics
    Info,
}

fn get_project_root(cli: &Cli) -> Result<PathBuf> {
    match &cli.project {
        Some(p) => Ok(p.clone()),
        None => std::env::current_dir().context("failed to get current directory"),
    }
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    let project_root = get_project_root(&cli)?;

    let mut config = PackgraphConfig::load(&project_root)
        .with_context(|| format!("failed to load config for {}", project_root.display()))?;
    if !cli.paths.is_empty() {
        config.scan.package_paths = cli.paths.clone();
    }

    match cli.command {
        Commands::Graph {
            format,
            output,
            analyze_sizes,
            default_package,
            full_view,
        } => {
            if analyze_sizes {
                config.graph.analyze_sizes = true;
            }
            if let Some(name) = default_package {
                config.graph.default_package = name;
            }
            if full_view {
                config.graph.focus_primary = false;
            }
            cmd_graph(&project_root, &config, &format, output.as_deref())
        }
        Commands::List { primary_only } => cmd_list(&project_root, &config, primary_only),
        Commands::Info => cmd_info(&project_root, &config),
    }
}

/// Discover manifests and resolve packages, failing when nothing was found.
fn resolve_packages(project_root: &Path, config: &PackgraphConfig) -> Result<PackageRegistry> {
    use indicatif::{ProgressBar, ProgressStyle};

    config.validate()?;

    let spinner = ProgressBar::new_spinner();
    spinner.set_style(
        ProgressStyle::default_spinner()
            .template("{spinner:.green} {msg}")
            .context("invalid spinner template")?,
    );
    spinner.set_message("Scanning manifests...");
    spinner.enable_steady_tick(std::time::Duration::from_millis(100));

    let mut store = ManifestStore::discover(project_root, &config.scan);
    let registry = PackageRegistry::resolve(&mut store);
    spinner.finish_and_clear();

    if store.is_empty() {
        let scope = if config.scan.package_paths.is_empty() {
            project_root.display().to_string()
        } else {
            config.scan.package_paths.join(", ")
        };
        anyhow::bail!(
            "No {} or {} files found under {}.",
            config.scan.dependencies_filename,
            config.scan.deprecated_references_filename,
            scope
        );
    }
    Ok(registry)
}

fn build_graph(registry: &PackageRegistry, config: &PackgraphConfig) -> Result<Graph> {
    let builder = GraphBuilder::new((&config.graph).into());
    if config.graph.analyze_sizes {
        let meter = FileSizeMeter::new(&config.size)?;
        Ok(builder.measure_with(&meter).build(registry))
    } else {
        Ok(builder.build(registry))
    }
}

fn cmd_graph(
    project_root: &Path,
    config: &PackgraphConfig,
    format: &str,
    output: Option<&Path>,
) -> Result<()> {
    let export_format = match format {
        "png" => None,
        "dot" | "graphviz" => Some(ExportFormat::Dot),
        "mermaid" | "md" => Some(ExportFormat::Mermaid),
        "json" => Some(ExportFormat::Json),
        _ => anyhow::bail!(
            "Unknown format: {}. Use 'png', 'dot', 'mermaid', or 'json'.",
            format
        ),
    };

    let registry = resolve_packages(project_root, config)?;
    let graph = build_graph(&registry, config)?;

    match export_format {
        None => {
            let output = output.unwrap_or(Path::new("packgraph.png"));
            let dot = export::export_dot(&graph, &config.style);
            graphviz::render_png(&dot, output)?;
            let stats = graph.stats();
            tracing::info!(
                nodes = stats.nodes,
                edges = stats.dependency_edges + stats.deprecated_reference_edges,
                "wrote {}",
                output.display()
            );
        }
        Some(export_format) => {
            let text = export::export(&graph, &config.style, export_format)?;
            match output {
                Some(path) => graphviz::write_text(&text, path)?,
                None => print!("{}", text),
            }
        }
    }

    Ok(())
}

fn cmd_list(project_root: &Path, config: &PackgraphConfig, primary_only: bool) -> Result<()> {
    let registry = resolve_packages(project_root, config)?;

    for package in registry.iter().filter(|p| p.primary || !primary_only) {
        let kind = if package.primary { "primary" } else { "secondary" };
        let privacy = if package.enforce_privacy {
            " [private]"
        } else {
            ""
        };
        println!(
            "{} ({}){}: {} dependencies, {} violations",
            package.name,
            kind,
            privacy,
            package.dependencies.len(),
            package.violation_count()
        );
    }

    Ok(())
}

fn cmd_info(project_root: &Path, config: &PackgraphConfig) -> Result<()> {
    let registry = resolve_packages(project_root, config)?;
    let graph = build_graph(&registry, config)?;
    let packages = registry.stats();
    let edges = graph.stats();

    println!("Root: {}", registry.root().display());
    if registry.is_partial() {
        println!("Scope: {}", config.scan.package_paths.join(", "));
    }
    println!();
    println!("Primary packages: {}", packages.primary_packages);
    println!("Secondary packages: {}", packages.secondary_packages);
    println!("Declared dependencies: {}", packages.declared_dependencies);
    println!(
        "Deprecated references: {} providers, {} violations",
        packages.deprecated_reference_providers, packages.total_violations
    );
    println!();
    println!("Nodes: {}", edges.nodes);
    println!("Dependency edges: {}", edges.dependency_edges);
    println!(
        "Deprecated reference edges: {}",
        edges.deprecated_reference_edges
    );
    if edges.suppressed_edges > 0 {
        println!("Hidden by partial view: {}", edges.suppressed_edges);
    }

    Ok(())
}
