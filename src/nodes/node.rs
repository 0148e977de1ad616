use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};

use crate::constants::*;
use crate::datasource::{OutputLocation, SourcePath};
use crate::models::{Category, NodeStatus};

/// One member of the fleet and everything collected about it during a run.
///
/// The admin address is the identity; display markers never change it.
#[derive(Debug, Clone, PartialEq)]
pub struct Node {
    pub id: u64,
    pub mac: String,
    pub cluster: u64,
    pub roles: Vec<String>,
    pub os_platform: String,
    pub online: bool,
    pub status: NodeStatus,
    pub address: String,
    /// Release reported by the node itself, when detected
    pub release: Option<String>,
    pub sources: BTreeMap<Category, Vec<SourcePath>>,
    /// Concatenated source contents (remote paths for files and logs)
    pub content: BTreeMap<Category, String>,
    /// Bytes measured by `du` over the node's log sources
    pub log_size: u64,
    pub filtered_logs: BTreeMap<String, u64>,
    /// Command script name to the local file holding its output
    pub command_outputs: BTreeMap<String, PathBuf>,
    pub archive: Option<PathBuf>,
}

impl Node {
    pub fn new(id: u64, address: &str, roles: Vec<String>, os_platform: &str) -> Self {
        let roles = if roles.is_empty() { vec![NO_ROLE.to_string()] } else { roles };
        Self {
            id,
            mac: String::new(),
            cluster: 0,
            roles,
            os_platform: os_platform.to_string(),
            online: true,
            status: NodeStatus::Ready,
            address: address.to_string(),
            release: None,
            sources: BTreeMap::new(),
            content: BTreeMap::new(),
            log_size: 0,
            filtered_logs: BTreeMap::new(),
            command_outputs: BTreeMap::new(),
            archive: None,
        }
    }

    /// The orchestrator host, always node 0 in cluster 0
    pub fn orchestrator(address: &str) -> Self {
        let mut node = Self::new(
            ORCHESTRATOR_NODE_ID,
            address,
            vec![ORCHESTRATOR_ROLE.to_string()],
            ORCHESTRATOR_OS,
        );
        node.mac = "n/a".to_string();
        node.cluster = ORCHESTRATOR_CLUSTER_ID;
        node
    }

    pub fn is_orchestrator(&self) -> bool {
        self.id == ORCHESTRATOR_NODE_ID
    }

    pub fn sources(&self, category: Category) -> &[SourcePath] {
        self.sources.get(&category).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn content(&self, category: Category) -> &str {
        self.content.get(&category).map(String::as_str).unwrap_or("")
    }

    /// Remote paths listed in a category's content, one per line
    pub fn content_paths(&self, category: Category) -> Vec<String> {
        self.content(category)
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty())
            .map(str::to_string)
            .collect()
    }

    pub fn output_location(&self, root: &Path, category: Category) -> OutputLocation {
        OutputLocation::new(root, category, self.cluster, self.id)
    }

    /// Sum of the sizes kept by the log filter
    pub fn filtered_log_bytes(&self) -> u64 {
        self.filtered_logs.values().sum()
    }
}

impl fmt::Display for Node {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let active = matches!(self.status, NodeStatus::Ready | NodeStatus::Discover) && self.online;
        let id = if active { self.id.to_string() } else { format!("#{}", self.id) };
        write!(
            f,
            "{} {} {} {} {} {} {} {}",
            id,
            self.cluster,
            self.address,
            self.mac,
            self.os_platform,
            self.roles.join(","),
            self.online,
            self.status
        )
    }
}
