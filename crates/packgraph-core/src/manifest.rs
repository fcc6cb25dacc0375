//! Manifest discovery and parsing.
//!
//! A [`ManifestStore`] walks the project root (or a set of restricted
//! sub-paths) once, remembers every dependency manifest and
//! deprecated-reference manifest it finds, and parses them on demand with a
//! per-store cache. Missing, empty, or malformed manifests read as "nothing
//! declared" and never fail the build.

use crate::config::{ScanConfig, stays_under_root};
use serde::Serialize;
use serde_yaml::{Mapping, Value};
use std::collections::{HashMap, HashSet};
use std::path::{Component, Path, PathBuf};
use tracing::{debug, warn};

/// Identity of the package rooted at the project root.
pub const ROOT_PACKAGE: &str = ".";

/// Contents of a dependency manifest that the graph cares about.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DependencyManifest {
    pub dependencies: Vec<String>,
    pub enforce_privacy: bool,
}

/// Aggregated violations recorded against one provider package.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DeprecatedReference {
    pub provider: String,
    pub count: usize,
}

/// Discovered manifest files plus a parse cache, scoped to one build.
#[derive(Debug)]
pub struct ManifestStore {
    root: PathBuf,
    partial: bool,
    dependencies_filename: String,
    deprecated_references_filename: String,
    dependency_files: Vec<PathBuf>,
    deprecated_reference_files: Vec<PathBuf>,
    cache: HashMap<PathBuf, Option<Mapping>>,
}

impl ManifestStore {
    /// Walk `root` (or each of `scan.package_paths` below it) and record every
    /// manifest file found, at any depth.
    pub fn discover(root: impl Into<PathBuf>, scan: &ScanConfig) -> Self {
        let root = root.into();
        let search_roots: Vec<PathBuf> = if scan.package_paths.is_empty() {
            vec![root.clone()]
        } else {
            scan.package_paths
                .iter()
                .filter(|p| {
                    let inside = stays_under_root(p);
                    if !inside {
                        warn!(path = %p, "scan path leaves the project root, skipping");
                    }
                    inside
                })
                .map(|p| root.join(p))
                .collect()
        };

        let dependency_files = find_files(
            &search_roots,
            &scan.dependencies_filename,
            scan.respect_gitignore,
        );
        let deprecated_reference_files = find_files(
            &search_roots,
            &scan.deprecated_references_filename,
            scan.respect_gitignore,
        );
        debug!(
            root = %root.display(),
            dependency_manifests = dependency_files.len(),
            reference_manifests = deprecated_reference_files.len(),
            respect_gitignore = scan.respect_gitignore,
            "discovered manifests"
        );

        Self {
            root,
            partial: !scan.package_paths.is_empty(),
            dependencies_filename: scan.dependencies_filename.clone(),
            deprecated_references_filename: scan.deprecated_references_filename.clone(),
            dependency_files,
            deprecated_reference_files,
            cache: HashMap::new(),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Whether discovery was restricted to a subset of the root.
    pub fn is_partial(&self) -> bool {
        self.partial
    }

    pub fn dependency_files(&self) -> &[PathBuf] {
        &self.dependency_files
    }

    pub fn deprecated_reference_files(&self) -> &[PathBuf] {
        &self.deprecated_reference_files
    }

    /// True when no manifest of either kind was found.
    pub fn is_empty(&self) -> bool {
        self.dependency_files.is_empty() && self.deprecated_reference_files.is_empty()
    }

    /// Package identity for a manifest path: its directory relative to the root.
    pub fn package_name(&self, manifest: &Path) -> String {
        let dir = manifest.parent().unwrap_or(Path::new(""));
        match dir.strip_prefix(&self.root) {
            Ok(rel) => path_identity(rel),
            Err(_) => normalize_identity(&dir.to_string_lossy()),
        }
    }

    /// Directory a package identity lives in.
    pub fn package_dir(&self, identity: &str) -> PathBuf {
        if identity == ROOT_PACKAGE {
            self.root.clone()
        } else {
            self.root.join(identity)
        }
    }

    /// Parse a manifest into a mapping, caching the result. Returns `None` for
    /// absent, empty, unreadable, or non-mapping files.
    pub fn load(&mut self, path: &Path) -> Option<&Mapping> {
        if !self.cache.contains_key(path) {
            let parsed = read_mapping(path);
            self.cache.insert(path.to_path_buf(), parsed);
        }
        self.cache.get(path).and_then(Option::as_ref)
    }

    /// Declared dependencies and privacy flag for a package.
    pub fn dependency_manifest(&mut self, identity: &str) -> DependencyManifest {
        let path = self
            .package_dir(identity)
            .join(&self.dependencies_filename);
        self.load(&path)
            .map(parse_dependency_manifest)
            .unwrap_or_default()
    }

    /// Recorded deprecated references for a package, one entry per provider.
    pub fn deprecated_references(&mut self, identity: &str) -> Vec<DeprecatedReference> {
        let path = self
            .package_dir(identity)
            .join(&self.deprecated_references_filename);
        self.load(&path)
            .map(parse_deprecated_references)
            .unwrap_or_default()
    }
}

/// Normalize a package identity as written in a manifest: trims whitespace,
/// a leading `./` or `/`, and trailing `/`. An empty result is the root.
pub fn normalize_identity(raw: &str) -> String {
    let mut name = raw.trim();
    while let Some(rest) = name.strip_prefix("./") {
        name = rest;
    }
    let name = name.trim_start_matches('/').trim_end_matches('/');
    if name.is_empty() || name == "." {
        ROOT_PACKAGE.to_string()
    } else {
        name.to_string()
    }
}

fn path_identity(rel: &Path) -> String {
    let parts: Vec<&str> = rel
        .components()
        .filter_map(|c| match c {
            Component::Normal(s) => s.to_str(),
            _ => None,
        })
        .collect();
    if parts.is_empty() {
        ROOT_PACKAGE.to_string()
    } else {
        parts.join("/")
    }
}

fn find_files(search_roots: &[PathBuf], file_name: &str, respect_gitignore: bool) -> Vec<PathBuf> {
    let mut seen = HashSet::new();
    let mut found = Vec::new();

    for search_root in search_roots {
        if !search_root.exists() {
            warn!(path = %search_root.display(), "scan path does not exist, skipping");
            continue;
        }
        let walker = ignore::WalkBuilder::new(search_root)
            .hidden(true)
            .git_ignore(respect_gitignore)
            .sort_by_file_name(|a, b| a.cmp(b))
            .build();

        for entry in walker {
            let entry = match entry {
                Ok(entry) => entry,
                Err(e) => {
                    warn!("skipping unreadable entry: {}", e);
                    continue;
                }
            };
            if entry.file_type().is_some_and(|t| t.is_file())
                && entry.file_name().to_str() == Some(file_name)
                && seen.insert(entry.path().to_path_buf())
            {
                found.push(entry.into_path());
            }
        }
    }
    found
}

fn read_mapping(path: &Path) -> Option<Mapping> {
    let content = match std::fs::read_to_string(path) {
        Ok(content) => content,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return None,
        Err(e) => {
            warn!(path = %path.display(), "failed to read manifest: {}", e);
            return None;
        }
    };
    if content.trim().is_empty() {
        return None;
    }
    match serde_yaml::from_str::<Value>(&content) {
        Ok(Value::Mapping(mapping)) => Some(mapping),
        Ok(Value::Null) => None,
        Ok(_) => {
            warn!(path = %path.display(), "manifest is not a mapping, ignoring");
            None
        }
        Err(e) => {
            warn!(path = %path.display(), "malformed manifest, ignoring: {}", e);
            None
        }
    }
}

fn parse_dependency_manifest(mapping: &Mapping) -> DependencyManifest {
    let dependencies = mapping
        .get("dependencies")
        .and_then(Value::as_sequence)
        .map(|deps| {
            let mut names: Vec<String> = Vec::with_capacity(deps.len());
            for name in deps.iter().filter_map(Value::as_str).map(normalize_identity) {
                if !names.contains(&name) {
                    names.push(name);
                }
            }
            names
        })
        .unwrap_or_default();

    // packwerk also accepts a list of constants here; anything set counts.
    let enforce_privacy = !matches!(
        mapping.get("enforce_privacy"),
        None | Some(Value::Null | Value::Bool(false))
    );

    DependencyManifest {
        dependencies,
        enforce_privacy,
    }
}

fn parse_deprecated_references(mapping: &Mapping) -> Vec<DeprecatedReference> {
    let mut references: Vec<DeprecatedReference> = Vec::new();
    for (key, records) in mapping {
        let Some(provider) = key.as_str().map(normalize_identity) else {
            debug!("skipping non-string provider key {:?}", key);
            continue;
        };
        let count = record_count(records);
        match references.iter_mut().find(|r| r.provider == provider) {
            Some(existing) => existing.count += count,
            None => references.push(DeprecatedReference { provider, count }),
        }
    }
    references
}

fn record_count(records: &Value) -> usize {
    match records {
        Value::Null => 0,
        Value::Sequence(seq) => seq.len(),
        Value::Mapping(map) => map.len(),
        Value::Tagged(tagged) => record_count(&tagged.value),
        _ => 1,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn write(root: &Path, rel: &str, content: &str) {
        let path = root.join(rel);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, content).unwrap();
    }

    #[test]
    fn test_normalize_identity() {
        assert_eq!(normalize_identity("packs/a"), "packs/a");
        assert_eq!(normalize_identity("/packs/a/"), "packs/a");
        assert_eq!(normalize_identity("./packs/a"), "packs/a");
        assert_eq!(normalize_identity(" packs/a "), "packs/a");
        assert_eq!(normalize_identity("."), ".");
        assert_eq!(normalize_identity(""), ".");
        assert_eq!(normalize_identity("./"), ".");
    }

    #[test]
    fn test_package_name_from_manifest_path() {
        let tmp = tempfile::tempdir().unwrap();
        let store = ManifestStore::discover(tmp.path(), &ScanConfig::default());
        assert_eq!(
            store.package_name(&tmp.path().join("packs/a/package.yml")),
            "packs/a"
        );
        assert_eq!(store.package_name(&tmp.path().join("package.yml")), ".");
    }

    #[test]
    fn test_discover_finds_nested_manifests() {
        let tmp = tempfile::tempdir().unwrap();
        write(tmp.path(), "package.yml", "");
        write(tmp.path(), "packs/a/package.yml", "dependencies: []\n");
        write(tmp.path(), "packs/a/deep/b/package.yml", "");
        write(tmp.path(), "packs/c/deprecated_references.yml", "");
        write(tmp.path(), "packs/c/other.yml", "");

        let store = ManifestStore::discover(tmp.path(), &ScanConfig::default());
        let names: Vec<String> = store
            .dependency_files()
            .iter()
            .map(|f| store.package_name(f))
            .collect();
        assert_eq!(names.len(), 3);
        assert!(names.contains(&".".to_string()));
        assert!(names.contains(&"packs/a".to_string()));
        assert!(names.contains(&"packs/a/deep/b".to_string()));
        assert_eq!(store.deprecated_reference_files().len(), 1);
        assert!(!store.is_partial());
    }

    #[test]
    fn test_discover_confined_to_package_paths() {
        let tmp = tempfile::tempdir().unwrap();
        write(tmp.path(), "package.yml", "");
        write(tmp.path(), "packs/a/package.yml", "");
        write(tmp.path(), "packs/b/package.yml", "");

        let scan = ScanConfig {
            package_paths: vec!["packs/a".to_string(), "packs/a".to_string()],
            ..ScanConfig::default()
        };
        let store = ManifestStore::discover(tmp.path(), &scan);
        assert!(store.is_partial());
        assert_eq!(store.dependency_files().len(), 1);
        assert_eq!(store.package_name(&store.dependency_files()[0]), "packs/a");
    }

    #[test]
    fn test_discover_missing_package_path_is_skipped() {
        let tmp = tempfile::tempdir().unwrap();
        let scan = ScanConfig {
            package_paths: vec!["nope".to_string()],
            ..ScanConfig::default()
        };
        let store = ManifestStore::discover(tmp.path(), &scan);
        assert!(store.is_empty());
    }

    #[test]
    fn test_empty_and_malformed_manifests_read_as_empty() {
        let tmp = tempfile::tempdir().unwrap();
        write(tmp.path(), "empty/package.yml", "");
        write(tmp.path(), "broken/package.yml", "dependencies: [unterminated\n");
        write(tmp.path(), "list/package.yml", "- a\n- b\n");

        let mut store = ManifestStore::discover(tmp.path(), &ScanConfig::default());
        for name in ["empty", "broken", "list", "missing"] {
            assert_eq!(
                store.dependency_manifest(name),
                DependencyManifest::default(),
                "{} should read as empty",
                name
            );
        }
    }

    #[test]
    fn test_dependency_manifest_fields() {
        let tmp = tempfile::tempdir().unwrap();
        write(
            tmp.path(),
            "a/package.yml",
            "enforce_privacy: true\ndependencies:\n  - b\n  - ./c\n  - b\n  - 42\n",
        );
        write(
            tmp.path(),
            "d/package.yml",
            "enforce_privacy:\n  - \"::D::Thing\"\n",
        );
        write(tmp.path(), "e/package.yml", "enforce_privacy: false\n");

        let mut store = ManifestStore::discover(tmp.path(), &ScanConfig::default());
        let a = store.dependency_manifest("a");
        assert_eq!(a.dependencies, vec!["b", "c"]);
        assert!(a.enforce_privacy);
        assert!(store.dependency_manifest("d").enforce_privacy);
        assert!(!store.dependency_manifest("e").enforce_privacy);
    }

    #[test]
    fn test_deprecated_reference_counts() {
        let tmp = tempfile::tempdir().unwrap();
        write(
            tmp.path(),
            "a/deprecated_references.yml",
            r#"
b: [v1, v2, v3]
".":
  "::Foo":
    violations: [dependency]
    files: [a/x.rb]
  "::Bar":
    violations: [privacy]
    files: [a/y.rb]
./b: [v4]
c:
"#,
        );

        let mut store = ManifestStore::discover(tmp.path(), &ScanConfig::default());
        let refs = store.deprecated_references("a");
        assert_eq!(
            refs,
            vec![
                DeprecatedReference {
                    provider: "b".to_string(),
                    count: 4
                },
                DeprecatedReference {
                    provider: ".".to_string(),
                    count: 2
                },
                DeprecatedReference {
                    provider: "c".to_string(),
                    count: 0
                },
            ]
        );
    }

    #[test]
    fn test_load_is_cached() {
        let tmp = tempfile::tempdir().unwrap();
        write(tmp.path(), "a/package.yml", "dependencies: [b]\n");
        let mut store = ManifestStore::discover(tmp.path(), &ScanConfig::default());
        assert_eq!(store.dependency_manifest("a").dependencies, vec!["b"]);

        // Later edits on disk are not observed within the same store.
        write(tmp.path(), "a/package.yml", "dependencies: [c]\n");
        assert_eq!(store.dependency_manifest("a").dependencies, vec!["b"]);
    }

    #[test]
    fn test_discover_skips_paths_outside_root() {
        let tmp = tempfile::tempdir().unwrap();
        let root = tmp.path().join("app");
        write(&root, "packs/a/package.yml", "");
        write(
            tmp.path(),
            "shared/a/package.yml",
            "enforce_privacy: true\ndependencies: [packs/b]\n",
        );

        let scan = ScanConfig {
            package_paths: vec!["../shared".to_string(), "packs".to_string()],
            ..ScanConfig::default()
        };
        let store = ManifestStore::discover(&root, &scan);
        assert_eq!(store.dependency_files(), &[root.join("packs/a/package.yml")]);
        assert!(store.is_partial());
    }

    #[test]
    fn test_gitignored_manifests_follow_scan_setting() {
        let tmp = tempfile::tempdir().unwrap();
        fs::create_dir_all(tmp.path().join(".git")).unwrap();
        write(tmp.path(), ".gitignore", "generated/\n");
        write(tmp.path(), "packs/a/package.yml", "");
        write(tmp.path(), "generated/b/package.yml", "");

        let store = ManifestStore::discover(tmp.path(), &ScanConfig::default());
        assert_eq!(store.dependency_files().len(), 1);

        let scan = ScanConfig {
            respect_gitignore: false,
            ..ScanConfig::default()
        };
        let store = ManifestStore::discover(tmp.path(), &scan);
        assert_eq!(store.dependency_files().len(), 2);
    }
}
