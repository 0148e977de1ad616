use std::fmt;

use serde::{Deserialize, Serialize};

/// Diagnostic class collected from the fleet.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Category {
    #[serde(rename = "cmds")]
    Commands,
    #[serde(rename = "files")]
    Files,
    #[serde(rename = "logs")]
    Logs,
}

impl Category {
    pub const ALL: [Category; 3] = [Category::Commands, Category::Files, Category::Logs];

    /// Directory name of this category in the data-source tree and output root
    pub fn dir_name(&self) -> &'static str {
        match self {
            Category::Commands => "cmds",
            Category::Files => "files",
            Category::Logs => "logs",
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.dir_name())
    }
}

/// Provisioning status reported by the inventory.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum NodeStatus {
    Ready,
    Discover,
    Provisioning,
    Provisioned,
    Deploying,
    Error,
    Offline,
    Removing,
    Stopped,
    #[serde(other)]
    Unknown,
}

impl fmt::Display for NodeStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            NodeStatus::Ready => "ready",
            NodeStatus::Discover => "discover",
            NodeStatus::Provisioning => "provisioning",
            NodeStatus::Provisioned => "provisioned",
            NodeStatus::Deploying => "deploying",
            NodeStatus::Error => "error",
            NodeStatus::Offline => "offline",
            NodeStatus::Removing => "removing",
            NodeStatus::Stopped => "stopped",
            NodeStatus::Unknown => "unknown",
        };
        f.write_str(s)
    }
}
