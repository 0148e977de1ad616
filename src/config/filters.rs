use serde::{Deserialize, Serialize};

use crate::models::NodeStatus;

/// A node id as written in the configuration, either `3` or `"3"`.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(untagged)]
pub enum NodeIdMatch {
    Number(u64),
    Text(String),
}

impl NodeIdMatch {
    pub fn matches(&self, id: u64) -> bool {
        match self {
            NodeIdMatch::Number(n) => *n == id,
            NodeIdMatch::Text(s) => s.trim() == id.to_string(),
        }
    }
}

/// Load-time admission predicate; rejected nodes never take part in a run.
///
/// Empty lists impose no restriction.
#[derive(Debug, Serialize, Deserialize, Clone, Default, PartialEq)]
pub struct HardFilter {
    #[serde(default)]
    pub status: Vec<NodeStatus>,

    #[serde(default)]
    pub online: Option<bool>,

    #[serde(default)]
    pub node_ids: Vec<NodeIdMatch>,

    #[serde(default)]
    pub roles: Vec<String>,
}

/// Per-phase admission predicate, combined with the node's own online flag
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct SoftFilter {
    #[serde(default)]
    pub status: Vec<NodeStatus>,
}

impl Default for SoftFilter {
    fn default() -> Self {
        Self {
            status: vec![NodeStatus::Ready, NodeStatus::Discover],
        }
    }
}

impl SoftFilter {
    pub fn admits_status(&self, status: &NodeStatus) -> bool {
        self.status.is_empty() || self.status.contains(status)
    }
}
