//! Test utilities for fleet-collector
//!
//! Fixture builders shared by the unit tests.

#![cfg(test)]

use std::fs;
use std::path::Path;

use crate::config::{HardFilter, SoftFilter};
use crate::nodes::{Node, NodeRegistry};

/// A ready, online node in cluster 1 at `10.0.0.<id>`
pub fn test_node(id: u64, roles: &[&str], os_platform: &str) -> Node {
    let mut node = Node::new(
        id,
        &format!("10.0.0.{}", id),
        roles.iter().map(|role| role.to_string()).collect(),
        os_platform,
    );
    node.cluster = 1;
    node
}

/// Registry with the default soft filter, no cluster scope and no hard filter
pub fn registry_of(nodes: Vec<Node>) -> NodeRegistry {
    let mut registry = NodeRegistry::new("9.0", None, SoftFilter::default());
    for node in nodes {
        registry.admit(node, &HardFilter::default());
    }
    registry
}

/// Write `(relative path, content)` pairs under `root`, creating parents
pub fn write_files(root: &Path, files: &[(&str, &str)]) {
    for (relative, content) in files {
        let path = root.join(relative);
        fs::create_dir_all(path.parent().expect("relative path has a parent")).unwrap();
        fs::write(path, content).unwrap();
    }
}
