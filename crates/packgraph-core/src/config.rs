//! Configuration for package discovery, graph construction, and rendering.
//!
//! Load order: `.packgraph/config.toml` → environment variables → defaults.
//! Callers apply their own overrides (CLI flags) afterwards and call
//! [`PackgraphConfig::validate`] once before building.

use serde::{Deserialize, Serialize};
use std::path::{Component, Path, PathBuf};

/// Errors raised while loading or validating configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("invalid config: {0}")]
    Invalid(String),
}

/// Top-level packgraph configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct PackgraphConfig {
    pub scan: ScanConfig,
    pub graph: GraphConfig,
    pub style: StyleConfig,
    pub size: SizeConfig,
}

/// Where and how manifests are discovered.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ScanConfig {
    /// Sub-paths of the root to restrict the scan to. Empty scans the whole root.
    pub package_paths: Vec<String>,
    /// File name of the dependency manifest.
    pub dependencies_filename: String,
    /// File name of the deprecated-reference manifest.
    pub deprecated_references_filename: String,
    /// Skip files matched by `.gitignore` while walking.
    pub respect_gitignore: bool,
}

/// Graph construction options.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GraphConfig {
    /// Display name for the root package (identity ".").
    pub default_package: String,
    /// Prefix stripped from package identities when building labels.
    pub package_prefix: String,
    /// On partial scans, hide edges leaving secondary packages unless they
    /// point at a primary package.
    pub focus_primary: bool,
    /// Measure source volume per package and scale nodes accordingly.
    pub analyze_sizes: bool,
    /// Appended to the label of packages that enforce privacy.
    pub privacy_marker: String,
}

/// Visual styling handed to the renderer.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StyleConfig {
    pub dpi: u32,
    /// Base font size; size tiers multiply it.
    pub font_size: f64,
    pub font_color: String,
    pub package_color: String,
    /// Fill color for secondary packages. Falls back to `package_color`.
    pub secondary_package_color: Option<String>,
    pub dependency_edge: String,
    pub deprecated_reference_edge: String,
    /// When false, deprecated-reference edges do not influence node ranking.
    pub deprecated_reference_ranking: bool,
}

/// Which files count towards a package's source volume.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SizeConfig {
    /// Globs (relative to the measured directory) of files to count.
    pub include: Vec<String>,
    /// Globs of files to skip even if included.
    pub exclude: Vec<String>,
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            package_paths: Vec::new(),
            dependencies_filename: "package.yml".to_string(),
            deprecated_references_filename: "deprecated_references.yml".to_string(),
            respect_gitignore: true,
        }
    }
}

impl Default for GraphConfig {
    fn default() -> Self {
        Self {
            default_package: "root".to_string(),
            package_prefix: String::new(),
            focus_primary: true,
            analyze_sizes: false,
            privacy_marker: " (Þ)".to_string(),
        }
    }
}

impl Default for StyleConfig {
    fn default() -> Self {
        Self {
            dpi: 100,
            font_size: 26.0,
            font_color: "white".to_string(),
            package_color: "#5CC8FF".to_string(),
            secondary_package_color: None,
            dependency_edge: "darkgreen".to_string(),
            deprecated_reference_edge: "black".to_string(),
            deprecated_reference_ranking: true,
        }
    }
}

impl Default for SizeConfig {
    fn default() -> Self {
        Self {
            include: vec!["**/*.rb".to_string()],
            exclude: vec!["**/*spec.rb".to_string()],
        }
    }
}

impl StyleConfig {
    /// Fill color for a node, depending on whether its package is primary.
    pub fn fill_color(&self, primary: bool) -> &str {
        if primary {
            &self.package_color
        } else {
            self.secondary_package_color
                .as_deref()
                .unwrap_or(&self.package_color)
        }
    }
}

/// Helper to parse an env var and apply it to a config field.
fn env_override<T: std::str::FromStr>(var: &str, target: &mut T) {
    if let Ok(v) = std::env::var(var)
        && let Ok(n) = v.parse()
    {
        *target = n;
    }
}

impl PackgraphConfig {
    /// Load config from `.packgraph/config.toml` in the project root, with env var overrides.
    /// Falls back to defaults if no config file exists.
    pub fn load(project_root: &Path) -> Result<Self, ConfigError> {
        let config_path = project_root.join(".packgraph").join("config.toml");

        let mut config = if config_path.exists() {
            let content =
                std::fs::read_to_string(&config_path).map_err(|source| ConfigError::Read {
                    path: config_path.clone(),
                    source,
                })?;
            toml::from_str(&content)?
        } else {
            Self::default()
        };

        env_override(
            "PACKGRAPH_DEFAULT_PACKAGE",
            &mut config.graph.default_package,
        );
        env_override("PACKGRAPH_ANALYZE_SIZES", &mut config.graph.analyze_sizes);
        env_override("PACKGRAPH_FOCUS_PRIMARY", &mut config.graph.focus_primary);
        env_override("PACKGRAPH_DPI", &mut config.style.dpi);

        Ok(config)
    }

    /// Check invariants the builder relies on.
    pub fn validate(&self) -> Result<(), ConfigError> {
        for (key, name) in [
            ("scan.dependencies_filename", &self.scan.dependencies_filename),
            (
                "scan.deprecated_references_filename",
                &self.scan.deprecated_references_filename,
            ),
        ] {
            if name.trim().is_empty() || name.contains(['/', '\\']) {
                return Err(ConfigError::Invalid(format!(
                    "{} must be a plain file name, got {:?}",
                    key, name
                )));
            }
        }
        if self.scan.dependencies_filename == self.scan.deprecated_references_filename {
            return Err(ConfigError::Invalid(
                "dependency and deprecated-reference manifests must use different file names"
                    .to_string(),
            ));
        }
        if let Some(path) = self
            .scan
            .package_paths
            .iter()
            .find(|p| !stays_under_root(p))
        {
            return Err(ConfigError::Invalid(format!(
                "scan.package_paths entries must be relative paths inside the project, got {:?}",
                path
            )));
        }
        if self.graph.default_package.trim().is_empty() {
            return Err(ConfigError::Invalid(
                "graph.default_package must not be empty".to_string(),
            ));
        }
        if self.style.dpi == 0 {
            return Err(ConfigError::Invalid("style.dpi must be positive".to_string()));
        }
        if self.style.font_size <= 0.0 {
            return Err(ConfigError::Invalid(format!(
                "style.font_size must be positive, got {}",
                self.style.font_size
            )));
        }
        for pattern in self.size.include.iter().chain(&self.size.exclude) {
            globset::Glob::new(pattern).map_err(|e| {
                ConfigError::Invalid(format!("invalid size glob {:?}: {}", pattern, e))
            })?;
        }
        Ok(())
    }
}

/// True for a relative path with no `..` or root components.
pub(crate) fn stays_under_root(path: &str) -> bool {
    Path::new(path)
        .components()
        .all(|c| matches!(c, Component::Normal(_) | Component::CurDir))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = PackgraphConfig::default();
        assert!(config.scan.package_paths.is_empty());
        assert_eq!(config.scan.dependencies_filename, "package.yml");
        assert_eq!(
            config.scan.deprecated_references_filename,
            "deprecated_references.yml"
        );
        assert_eq!(config.graph.default_package, "root");
        assert!(config.graph.focus_primary);
        assert!(!config.graph.analyze_sizes);
        assert_eq!(config.style.dpi, 100);
        assert_eq!(config.style.font_size, 26.0);
        assert_eq!(config.style.package_color, "#5CC8FF");
        assert!(config.style.deprecated_reference_ranking);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_from_toml() {
        let toml_str = r##"
[scan]
package_paths = ["packs/billing"]

[graph]
default_package = "Monolith"
analyze_sizes = true

[style]
secondary_package_color = "#CCCCCC"
deprecated_reference_ranking = false
"##;
        let config: PackgraphConfig = toml::from_str(toml_str).unwrap();
        assert_eq!(config.scan.package_paths, vec!["packs/billing"]);
        assert_eq!(config.graph.default_package, "Monolith");
        assert!(config.graph.analyze_sizes);
        assert!(!config.style.deprecated_reference_ranking);
        assert_eq!(config.style.fill_color(false), "#CCCCCC");
        assert_eq!(config.style.fill_color(true), "#5CC8FF");
        // Defaults for unspecified fields
        assert_eq!(config.scan.dependencies_filename, "package.yml");
        assert_eq!(config.style.dpi, 100);
    }

    #[test]
    fn test_secondary_color_falls_back() {
        let style = StyleConfig::default();
        assert_eq!(style.fill_color(false), style.package_color);
    }

    #[test]
    fn test_config_load_nonexistent() {
        let config = PackgraphConfig::load(Path::new("/nonexistent/path")).unwrap();
        assert_eq!(config.scan.dependencies_filename, "package.yml");
    }

    #[test]
    fn test_load_reads_project_file() {
        let tmp = tempfile::tempdir().unwrap();
        let dir = tmp.path().join(".packgraph");
        std::fs::create_dir_all(&dir).unwrap();
        std::fs::write(
            dir.join("config.toml"),
            "[scan]\ndependencies_filename = \"pack.yml\"\n",
        )
        .unwrap();

        let config = PackgraphConfig::load(tmp.path()).unwrap();
        assert_eq!(config.scan.dependencies_filename, "pack.yml");
    }

    #[test]
    fn test_load_rejects_malformed_toml() {
        let tmp = tempfile::tempdir().unwrap();
        let dir = tmp.path().join(".packgraph");
        std::fs::create_dir_all(&dir).unwrap();
        std::fs::write(dir.join("config.toml"), "[scan\n").unwrap();

        let err = PackgraphConfig::load(tmp.path()).unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        let mut config = PackgraphConfig::default();
        config.scan.dependencies_filename = "nested/package.yml".to_string();
        assert!(config.validate().is_err());

        let mut config = PackgraphConfig::default();
        config.scan.deprecated_references_filename = "package.yml".to_string();
        assert!(config.validate().is_err());

        let mut config = PackgraphConfig::default();
        config.graph.default_package = "  ".to_string();
        assert!(config.validate().is_err());

        let mut config = PackgraphConfig::default();
        config.style.dpi = 0;
        assert!(config.validate().is_err());

        let mut config = PackgraphConfig::default();
        config.size.include = vec!["[".to_string()];
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_paths_outside_root() {
        for path in ["../shared", "packs/../../shared", "/srv/shared"] {
            let mut config = PackgraphConfig::default();
            config.scan.package_paths = vec![path.to_string()];
            let err = config.validate().unwrap_err();
            assert!(matches!(err, ConfigError::Invalid(_)), "{path}");
        }

        let mut config = PackgraphConfig::default();
        config.scan.package_paths = vec!["packs/a".to_string(), "./lib".to_string()];
        assert!(config.validate().is_ok());
    }
}
