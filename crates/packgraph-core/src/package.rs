//! Package entities and the registry that resolves them from manifests.

use crate::config::ScanConfig;
use crate::manifest::{DeprecatedReference, ManifestStore, ROOT_PACKAGE};
use serde::Serialize;
use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use tracing::debug;

/// A path-identified unit of the scanned codebase.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Package {
    /// Directory relative to the project root, `"."` for the root itself.
    pub name: String,
    pub path: PathBuf,
    pub dependencies: Vec<String>,
    pub enforce_privacy: bool,
    /// Violation counts per provider, in manifest order.
    pub deprecated_references: Vec<DeprecatedReference>,
    /// Discovered through its own manifest rather than only referenced.
    pub primary: bool,
}

impl Package {
    /// A package known only because something references it.
    pub fn secondary(name: impl Into<String>, path: impl Into<PathBuf>) -> Self {
        Self {
            name: name.into(),
            path: path.into(),
            dependencies: Vec::new(),
            enforce_privacy: false,
            deprecated_references: Vec::new(),
            primary: false,
        }
    }

    /// Load a primary package's manifests through the store.
    fn load(name: &str, store: &mut ManifestStore) -> Self {
        let manifest = store.dependency_manifest(name);
        Self {
            name: name.to_string(),
            path: store.package_dir(name),
            dependencies: manifest.dependencies,
            enforce_privacy: manifest.enforce_privacy,
            deprecated_references: store.deprecated_references(name),
            primary: true,
        }
    }

    pub fn is_root(&self) -> bool {
        self.name == ROOT_PACKAGE
    }

    /// Recorded violations against `provider`, if any were recorded.
    pub fn deprecated_reference_count(&self, provider: &str) -> Option<usize> {
        self.deprecated_references
            .iter()
            .find(|r| r.provider == provider)
            .map(|r| r.count)
    }

    /// Total recorded violations across all providers.
    pub fn violation_count(&self) -> usize {
        self.deprecated_references.iter().map(|r| r.count).sum()
    }

    /// Every package this one points at: dependencies first, then providers.
    pub fn referenced_packages(&self) -> impl Iterator<Item = &str> {
        self.dependencies
            .iter()
            .map(String::as_str)
            .chain(self.deprecated_references.iter().map(|r| r.provider.as_str()))
    }
}

/// Aggregate counts over a registry.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct RegistryStats {
    pub primary_packages: usize,
    pub secondary_packages: usize,
    pub declared_dependencies: usize,
    pub deprecated_reference_providers: usize,
    pub total_violations: usize,
}

/// Ordered, identity-indexed set of packages for one graph build.
///
/// Iteration yields primary packages in manifest-discovery order, then
/// secondary packages in the order they were first referenced.
#[derive(Debug, Clone, Default)]
pub struct PackageRegistry {
    root: PathBuf,
    partial: bool,
    packages: Vec<Package>,
    index: HashMap<String, usize>,
}

impl PackageRegistry {
    /// Empty registry for the given root.
    pub fn new(root: impl Into<PathBuf>, partial: bool) -> Self {
        Self {
            root: root.into(),
            partial,
            packages: Vec::new(),
            index: HashMap::new(),
        }
    }

    /// Discover manifests under `root` and resolve them in one step.
    pub fn scan(root: impl Into<PathBuf>, scan: &ScanConfig) -> Self {
        let mut store = ManifestStore::discover(root, scan);
        Self::resolve(&mut store)
    }

    /// Resolve every package the store's manifests declare or reference.
    pub fn resolve(store: &mut ManifestStore) -> Self {
        let mut registry = Self::new(store.root(), store.is_partial());

        // Primary pass: one package per manifest directory.
        let manifests: Vec<PathBuf> = store
            .dependency_files()
            .iter()
            .chain(store.deprecated_reference_files())
            .cloned()
            .collect();
        for manifest in &manifests {
            let name = store.package_name(manifest);
            if !registry.contains(&name) {
                let package = Package::load(&name, store);
                registry.insert(package);
            }
        }
        let primary_count = registry.len();

        // Secondary pass: referenced packages, never expanded further.
        let mut secondary: Vec<Package> = Vec::new();
        let mut seen: HashSet<&str> = HashSet::new();
        for package in &registry.packages {
            for name in package.referenced_packages() {
                if !registry.contains(name) && seen.insert(name) {
                    secondary.push(Package::secondary(name, store.package_dir(name)));
                }
            }
        }
        for package in secondary {
            registry.insert(package);
        }

        debug!(
            primary = primary_count,
            secondary = registry.len() - primary_count,
            partial = registry.partial,
            "resolved packages"
        );
        registry
    }

    /// Add a package unless its identity is already present. Returns whether
    /// it was inserted; an existing entry always wins.
    pub fn insert(&mut self, package: Package) -> bool {
        if self.index.contains_key(&package.name) {
            return false;
        }
        self.index.insert(package.name.clone(), self.packages.len());
        self.packages.push(package);
        true
    }

    pub fn get(&self, name: &str) -> Option<&Package> {
        self.index.get(name).map(|&i| &self.packages[i])
    }

    pub fn contains(&self, name: &str) -> bool {
        self.index.contains_key(name)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Package> {
        self.packages.iter()
    }

    pub fn primary(&self) -> impl Iterator<Item = &Package> {
        self.packages.iter().filter(|p| p.primary)
    }

    pub fn secondary(&self) -> impl Iterator<Item = &Package> {
        self.packages.iter().filter(|p| !p.primary)
    }

    pub fn len(&self) -> usize {
        self.packages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.packages.is_empty()
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Whether the packages came from a scan restricted to sub-paths.
    pub fn is_partial(&self) -> bool {
        self.partial
    }

    pub fn stats(&self) -> RegistryStats {
        let mut stats = RegistryStats::default();
        for package in &self.packages {
            if package.primary {
                stats.primary_packages += 1;
            } else {
                stats.secondary_packages += 1;
            }
            stats.declared_dependencies += package.dependencies.len();
            stats.deprecated_reference_providers += package.deprecated_references.len();
            stats.total_violations += package.violation_count();
        }
        stats
    }
}

impl<'a> IntoIterator for &'a PackageRegistry {
    type Item = &'a Package;
    type IntoIter = std::slice::Iter<'a, Package>;

    fn into_iter(self) -> Self::IntoIter {
        self.packages.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_insert_keeps_existing_entry() {
        let mut registry = PackageRegistry::new("/repo", false);
        let mut primary = Package::secondary("a", "/repo/a");
        primary.primary = true;
        assert!(registry.insert(primary));
        assert!(!registry.insert(Package::secondary("a", "/repo/a")));

        assert_eq!(registry.len(), 1);
        assert!(registry.get("a").unwrap().primary);
    }

    #[test]
    fn test_referenced_packages_order() {
        let mut package = Package::secondary("a", "/repo/a");
        package.dependencies = vec!["b".to_string(), "c".to_string()];
        package.deprecated_references = vec![DeprecatedReference {
            provider: "d".to_string(),
            count: 3,
        }];
        let refs: Vec<&str> = package.referenced_packages().collect();
        assert_eq!(refs, vec!["b", "c", "d"]);
        assert_eq!(package.deprecated_reference_count("d"), Some(3));
        assert_eq!(package.deprecated_reference_count("b"), None);
        assert_eq!(package.violation_count(), 3);
    }

    #[test]
    fn test_root_package() {
        assert!(Package::secondary(".", "/repo").is_root());
        assert!(!Package::secondary("a", "/repo/a").is_root());
    }
}
