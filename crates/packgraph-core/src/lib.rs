//! Package discovery, resolution, and dependency graph model.
//!
//! Finds dependency manifests ([`manifest::ManifestStore`]), resolves them into
//! primary and secondary packages ([`package::PackageRegistry`]), and derives
//! a weighted, optionally size-annotated graph ([`graph::GraphBuilder`]).

pub mod config;
pub mod graph;
pub mod manifest;
pub mod package;
pub mod size;
