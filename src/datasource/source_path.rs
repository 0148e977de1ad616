use std::cmp::Ordering;
use std::path::{Path, PathBuf};

use crate::constants::*;
use crate::models::Category;

/// Layer of the data-source tree a source was resolved from
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Layer {
    ByRole(String),
    Release { version: String, role: String },
    ByOs(String),
    Default,
    OnceByRole(String),
}

impl Layer {
    /// Layer directory name under the category
    pub fn dir_name(&self) -> String {
        match self {
            Layer::ByRole(_) => LAYER_BY_ROLE.to_string(),
            Layer::Release { version, .. } => format!("{}{}", LAYER_RELEASE_PREFIX, version),
            Layer::ByOs(_) => LAYER_BY_OS.to_string(),
            Layer::Default => LAYER_DEFAULT.to_string(),
            Layer::OnceByRole(_) => LAYER_ONCE_BY_ROLE.to_string(),
        }
    }

    /// Key directory name under the layer
    pub fn key(&self) -> &str {
        match self {
            Layer::ByRole(role) | Layer::OnceByRole(role) => role,
            Layer::Release { role, .. } => role,
            Layer::ByOs(platform) => platform,
            Layer::Default => LAYER_DEFAULT,
        }
    }
}

/// A resolved data-source file, `<category>/<layer>/<key>/<file>` under the tree root.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SourcePath {
    pub category: Category,
    pub layer: Layer,
    pub file_name: String,
}

impl SourcePath {
    pub fn new(category: Category, layer: Layer, file_name: &str) -> Self {
        Self {
            category,
            layer,
            file_name: file_name.to_string(),
        }
    }

    pub fn relative(&self) -> PathBuf {
        PathBuf::from(self.category.dir_name())
            .join(self.layer.dir_name())
            .join(self.layer.key())
            .join(&self.file_name)
    }

    pub fn absolute(&self, root: &Path) -> PathBuf {
        root.join(self.relative())
    }

    /// `<layer>-<key>-<file>`, unique across a node's sources of one category
    pub fn qualified_name(&self) -> String {
        format!("{}-{}-{}", self.layer.dir_name(), self.layer.key(), self.file_name)
    }

    /// Whether the file is restricted to some platforms by a leading `.`
    pub fn os_marker(&self) -> bool {
        self.file_name.starts_with(OS_MARKER_PREFIX)
    }

    /// OS-marked files apply only to platforms named in the file name;
    /// a node with no known platform gets none of them
    pub fn applies_to(&self, os_platform: &str) -> bool {
        !self.os_marker() || (!os_platform.is_empty() && self.file_name.contains(os_platform))
    }
}

impl Ord for SourcePath {
    fn cmp(&self, other: &Self) -> Ordering {
        self.relative().cmp(&other.relative())
    }
}

impl PartialOrd for SourcePath {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// Where a node's outputs for one category land locally
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputLocation {
    pub root: PathBuf,
    pub category: Category,
    pub cluster: u64,
    pub node_id: u64,
}

impl OutputLocation {
    pub fn new(root: &Path, category: Category, cluster: u64, node_id: u64) -> Self {
        Self {
            root: root.to_path_buf(),
            category,
            cluster,
            node_id,
        }
    }

    /// `<root>/<category>/cluster-<c>/node-<n>`
    pub fn dir(&self) -> PathBuf {
        self.root
            .join(self.category.dir_name())
            .join(format!("cluster-{}", self.cluster))
            .join(format!("node-{}", self.node_id))
    }

    pub fn file_name(&self, address: &str, source: &str) -> String {
        format!("node-{}-{}-{}", self.node_id, address, source)
    }

    pub fn file(&self, address: &str, source: &str) -> PathBuf {
        self.dir().join(self.file_name(address, source))
    }
}
