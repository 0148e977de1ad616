use std::fs;
use std::path::Path;

use serde::Deserialize;

use crate::errors::FatalError;
use crate::models::NodeStatus;
use crate::nodes::Node;

/// Roles as the inventory spells them: a list or a comma-joined string
#[derive(Debug, Deserialize, Clone, PartialEq)]
#[serde(untagged)]
pub enum RolesField {
    List(Vec<String>),
    Joined(String),
}

/// One node entry of the inventory document
#[derive(Debug, Deserialize, Clone, PartialEq)]
pub struct InventoryRecord {
    pub id: u64,
    #[serde(default)]
    pub roles: Option<RolesField>,
    #[serde(alias = "address")]
    pub ip: String,
    #[serde(default)]
    pub cluster: Option<u64>,
    #[serde(default)]
    pub mac: Option<String>,
    #[serde(default)]
    pub os_platform: Option<String>,
    pub status: NodeStatus,
    #[serde(default)]
    pub online: bool,
}

impl InventoryRecord {
    pub fn roles(&self) -> Vec<String> {
        match &self.roles {
            None => Vec::new(),
            Some(RolesField::List(roles)) => roles.clone(),
            Some(RolesField::Joined(joined)) => joined
                .split(',')
                .map(str::trim)
                .filter(|role| !role.is_empty())
                .map(str::to_string)
                .collect(),
        }
    }
}

impl From<InventoryRecord> for Node {
    fn from(record: InventoryRecord) -> Self {
        let mut node = Node::new(
            record.id,
            &record.ip,
            record.roles(),
            record.os_platform.as_deref().unwrap_or_default(),
        );
        node.mac = record.mac.unwrap_or_default();
        node.cluster = record.cluster.unwrap_or(0);
        node.status = record.status;
        node.online = record.online;
        node
    }
}

/// Decode an inventory JSON document
pub fn parse_inventory(json: &str, origin: &str) -> Result<Vec<InventoryRecord>, FatalError> {
    serde_json::from_str(json).map_err(|e| FatalError::InventoryDecode {
        origin: origin.to_string(),
        reason: e.to_string(),
    })
}

/// Read and decode an inventory file
pub fn read_inventory_file(path: &Path) -> Result<Vec<InventoryRecord>, FatalError> {
    let origin = path.display().to_string();
    let json = fs::read_to_string(path).map_err(|e| FatalError::InventoryDecode {
        origin: origin.clone(),
        reason: e.to_string(),
    })?;
    parse_inventory(&json, &origin)
}
