use std::path::PathBuf;

use log::{debug, error, info, warn};

use crate::config::{Conf, HardFilter, SoftFilter};
use crate::errors::FatalError;
use crate::nodes::inventory::{parse_inventory, read_inventory_file, InventoryRecord};
use crate::nodes::Node;
use crate::transport::{ExecRequest, RemoteExec};

/// Where the node inventory comes from
#[derive(Debug, Clone, PartialEq)]
pub enum InventorySource {
    /// A pre-serialized inventory document
    File(PathBuf),
    /// Live query on the orchestrator host
    Orchestrator,
}

/// The fleet for one run.
///
/// Nodes are kept in load order (orchestrator first) and addressed by slot
/// index; the admin address is unique across the set. Nodes rejected by the
/// hard filter are kept aside for listing only.
#[derive(Debug, Clone)]
pub struct NodeRegistry {
    nodes: Vec<Node>,
    excluded: Vec<Node>,
    release: String,
    cluster: Option<u64>,
    soft_filter: SoftFilter,
}

impl NodeRegistry {
    pub fn new(release: &str, cluster: Option<u64>, soft_filter: SoftFilter) -> Self {
        Self {
            nodes: Vec::new(),
            excluded: Vec::new(),
            release: release.to_string(),
            cluster,
            soft_filter,
        }
    }

    /// Build a registry from an already-decoded inventory
    pub fn from_records(
        orchestrator: Node,
        records: Vec<InventoryRecord>,
        hard_filter: &HardFilter,
        release: &str,
        cluster: Option<u64>,
        soft_filter: SoftFilter,
    ) -> Self {
        let mut registry = Self::new(release, cluster, soft_filter);
        registry.admit(orchestrator, hard_filter);
        for record in records {
            registry.admit(record.into(), hard_filter);
        }
        info!(
            "loaded {} nodes ({} excluded by hard filter), release: {}",
            registry.nodes.len(),
            registry.excluded.len(),
            registry.release
        );
        registry
    }

    /// Detect the release, read the inventory and apply the hard filter
    pub fn load(
        conf: &Conf,
        source: &InventorySource,
        cluster: Option<u64>,
        exec: &dyn RemoteExec,
    ) -> Result<Self, FatalError> {
        let release = detect_release(conf, exec)?;
        let records = match source {
            InventorySource::File(path) => read_inventory_file(path)?,
            InventorySource::Orchestrator => {
                let json = fetch_inventory(conf, exec)?;
                parse_inventory(&json, &conf.orchestrator_address)?
            }
        };
        Ok(Self::from_records(
            Node::orchestrator(&conf.orchestrator_address),
            records,
            &conf.hard_filter,
            &release,
            cluster,
            conf.soft_filter.clone(),
        ))
    }

    /// Add a node if it passes the hard filter; a repeated address replaces the earlier node
    pub fn admit(&mut self, node: Node, hard_filter: &HardFilter) -> bool {
        if !passes_hard_filter(&node, hard_filter) {
            self.excluded.push(node);
            return false;
        }
        match self.nodes.iter().position(|n| n.address == node.address) {
            Some(slot) => {
                warn!(
                    "node-{} and node-{} share address {}, keeping node-{}",
                    self.nodes[slot].id, node.id, node.address, node.id
                );
                self.nodes[slot] = node;
            }
            None => self.nodes.push(node),
        }
        true
    }

    /// Fleet-wide release detected at load
    pub fn release(&self) -> &str {
        &self.release
    }

    pub fn nodes(&self) -> &[Node] {
        &self.nodes
    }

    pub fn nodes_mut(&mut self) -> &mut [Node] {
        &mut self.nodes
    }

    pub fn excluded(&self) -> &[Node] {
        &self.excluded
    }

    pub fn get(&self, address: &str) -> Option<&Node> {
        self.nodes.iter().find(|n| n.address == address)
    }

    pub fn node_mut(&mut self, slot: usize) -> Option<&mut Node> {
        self.nodes.get_mut(slot)
    }

    /// In the active cluster scope; the cluster-agnostic orchestrator always is
    pub fn in_scope(&self, node: &Node) -> bool {
        match self.cluster {
            Some(cluster) => node.cluster == cluster || node.cluster == 0,
            None => true,
        }
    }

    /// Soft filter, online flag and cluster scope combined
    pub fn is_eligible(&self, node: &Node) -> bool {
        self.in_scope(node) && node.online && self.soft_filter.admits_status(&node.status)
    }

    /// Eligible nodes with their slot index, in load order
    pub fn eligible(&self) -> Vec<(usize, &Node)> {
        self.nodes
            .iter()
            .enumerate()
            .filter(|(_, node)| self.is_eligible(node))
            .collect()
    }

    /// Node listing, out-of-scope and hard-filtered nodes marked with `#`
    pub fn listing(&self) -> Vec<String> {
        let mut lines = vec!["#node-id, cluster, admin-ip, mac, os, roles, online, status".to_string()];

        let mut nodes: Vec<&Node> = self.nodes.iter().collect();
        nodes.sort_by_key(|n| n.id);
        for node in nodes {
            if self.in_scope(node) {
                lines.push(node.to_string());
            } else {
                lines.push(format!("#{}", node));
            }
        }

        let mut excluded: Vec<&Node> = self.excluded.iter().collect();
        excluded.sort_by_key(|n| n.id);
        lines.extend(excluded.into_iter().map(|node| format!("#{}", node)));
        lines
    }
}

/// Load-time admission check, logging the first reason a node is rejected
pub fn passes_hard_filter(node: &Node, filter: &HardFilter) -> bool {
    if !filter.status.is_empty() && !filter.status.contains(&node.status) {
        info!("hard filter by status: excluding node-{}", node.id);
        return false;
    }
    if let Some(online) = filter.online {
        if node.online != online {
            info!("hard filter by online: excluding node-{}", node.id);
            return false;
        }
    }
    if !filter.node_ids.is_empty() && !filter.node_ids.iter().any(|m| m.matches(node.id)) {
        info!("hard filter by ids: excluding node-{}", node.id);
        return false;
    }
    if !filter.roles.is_empty() && !node.roles.iter().any(|r| filter.roles.contains(r)) {
        info!("hard filter by roles: excluding node-{}", node.id);
        return false;
    }
    true
}

/// Ask the orchestrator for the deployed release
pub fn detect_release(conf: &Conf, exec: &dyn RemoteExec) -> Result<String, FatalError> {
    let request = ExecRequest::inline(&conf.orchestrator_address, &conf.release_command, conf.timeout());
    let output = exec.exec(&request);
    if !output.is_success() {
        error!("Can't get release: {}", output.stderr);
        return Err(FatalError::Release {
            address: conf.orchestrator_address.clone(),
            stderr: output.stderr,
        });
    }
    let release = clean_release(&output.stdout);
    info!("release: {}", release);
    Ok(release)
}

fn fetch_inventory(conf: &Conf, exec: &dyn RemoteExec) -> Result<String, FatalError> {
    let request = ExecRequest::inline(&conf.orchestrator_address, &conf.inventory_command, conf.timeout())
        .with_env(&conf.ssh.env);
    let output = exec.exec(&request);
    if !output.is_success() {
        error!("Can't get node list: {}", output.stderr);
        return Err(FatalError::InventoryFetch {
            address: conf.orchestrator_address.clone(),
            stderr: output.stderr,
        });
    }
    debug!("inventory: {}", output.stdout);
    Ok(output.stdout)
}

/// Strip whitespace and quotes around a release string
pub fn clean_release(raw: &str) -> String {
    raw.trim_matches(|c: char| c.is_whitespace() || c == '"' || c == '\'')
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::NodeIdMatch;
    use crate::models::NodeStatus;
    use crate::transport::{CommandOutput, MockRemoteExec, RemoteCommand};

    fn node(id: u64, address: &str, roles: &[&str], cluster: u64) -> Node {
        let mut node = Node::new(id, address, roles.iter().map(|r| r.to_string()).collect(), "ubuntu");
        node.cluster = cluster;
        node
    }

    #[test]
    fn test_hard_filter_by_status_online_ids_roles() {
        let mut compute = node(2, "10.0.0.2", &["compute"], 1);

        assert!(passes_hard_filter(&compute, &HardFilter::default()));

        let by_status = HardFilter { status: vec![NodeStatus::Discover], ..Default::default() };
        assert!(!passes_hard_filter(&compute, &by_status));

        let online_only = HardFilter { online: Some(true), ..Default::default() };
        compute.online = false;
        assert!(!passes_hard_filter(&compute, &online_only));
        compute.online = true;
        assert!(passes_hard_filter(&compute, &online_only));

        let by_id = HardFilter {
            node_ids: vec![NodeIdMatch::Text("2".to_string())],
            ..Default::default()
        };
        assert!(passes_hard_filter(&compute, &by_id));
        let other_id = HardFilter { node_ids: vec![NodeIdMatch::Number(3)], ..Default::default() };
        assert!(!passes_hard_filter(&compute, &other_id));

        let by_role = HardFilter {
            roles: vec!["controller".to_string(), "compute".to_string()],
            ..Default::default()
        };
        assert!(passes_hard_filter(&compute, &by_role));
        let other_role = HardFilter { roles: vec!["mongo".to_string()], ..Default::default() };
        assert!(!passes_hard_filter(&compute, &other_role));
    }

    #[test]
    fn test_excluded_nodes_stay_listed() {
        let filter = HardFilter { roles: vec!["compute".to_string()], ..Default::default() };
        let mut registry = NodeRegistry::new("9.0", None, SoftFilter::default());

        assert!(registry.admit(node(2, "10.0.0.2", &["compute"], 1), &filter));
        assert!(!registry.admit(node(3, "10.0.0.3", &["controller"], 1), &filter));

        assert_eq!(registry.nodes().len(), 1);
        assert_eq!(registry.excluded().len(), 1);

        let listing = registry.listing();
        assert_eq!(listing.len(), 3);
        assert!(listing[1].starts_with("2 "));
        assert!(listing[2].starts_with("#3 "));
    }

    #[test]
    fn test_address_is_unique() {
        let mut registry = NodeRegistry::new("9.0", None, SoftFilter::default());
        registry.admit(node(2, "10.0.0.2", &["compute"], 1), &HardFilter::default());
        registry.admit(node(7, "10.0.0.2", &["compute"], 1), &HardFilter::default());

        assert_eq!(registry.nodes().len(), 1);
        assert_eq!(registry.get("10.0.0.2").unwrap().id, 7);
    }

    #[test]
    fn test_eligibility_combines_scope_soft_filter_and_online() {
        let mut registry = NodeRegistry::new("9.0", Some(1), SoftFilter::default());
        let filter = HardFilter::default();
        registry.admit(Node::orchestrator("10.0.0.1"), &filter);
        registry.admit(node(2, "10.0.0.2", &["compute"], 1), &filter);
        registry.admit(node(3, "10.0.0.3", &["compute"], 2), &filter);
        let mut offline = node(4, "10.0.0.4", &["compute"], 1);
        offline.online = false;
        registry.admit(offline, &filter);
        let mut broken = node(5, "10.0.0.5", &["compute"], 1);
        broken.status = NodeStatus::Error;
        registry.admit(broken, &filter);

        let ids: Vec<u64> = registry.eligible().iter().map(|(_, n)| n.id).collect();
        assert_eq!(ids, vec![0, 2]);

        let listing = registry.listing();
        assert!(listing.iter().any(|l| l.starts_with("#3 ")));
    }

    #[test]
    fn test_load_from_orchestrator() {
        let mut exec = MockRemoteExec::new();
        exec.expect_exec().returning(|request| match &request.command {
            RemoteCommand::Inline(cmd) if cmd.contains("version.yaml") => CommandOutput::success(" \"9.0\"\n"),
            RemoteCommand::Inline(cmd) if cmd.contains("node list") => CommandOutput::success(
                r#"[{"id": 1, "roles": "controller", "ip": "10.0.0.3", "cluster": 1,
                     "mac": "aa", "os_platform": "ubuntu", "status": "ready", "online": true}]"#,
            ),
            _ => CommandOutput::failure(1, "unexpected"),
        });

        let conf = Conf { orchestrator_address: "10.0.0.1".to_string(), ..Conf::default() };
        let registry = NodeRegistry::load(&conf, &InventorySource::Orchestrator, None, &exec).unwrap();

        assert_eq!(registry.release(), "9.0");
        assert_eq!(registry.nodes().len(), 2);
        assert!(registry.nodes()[0].is_orchestrator());
        assert_eq!(registry.nodes()[1].roles, vec!["controller"]);
    }

    #[test]
    fn test_release_failure_is_fatal() {
        let mut exec = MockRemoteExec::new();
        exec.expect_exec().returning(|_| CommandOutput::failure(1, "no such file"));

        let err = NodeRegistry::load(&Conf::default(), &InventorySource::Orchestrator, None, &exec).unwrap_err();
        assert_eq!(err.exit_code(), 3);
    }

    #[test]
    fn test_inventory_fetch_failure_is_fatal() {
        let mut exec = MockRemoteExec::new();
        exec.expect_exec().returning(|request| match &request.command {
            RemoteCommand::Inline(cmd) if cmd.contains("version.yaml") => CommandOutput::success("9.0"),
            _ => CommandOutput::timed_out("slow"),
        });

        let err = NodeRegistry::load(&Conf::default(), &InventorySource::Orchestrator, None, &exec).unwrap_err();
        assert_eq!(err.exit_code(), 4);
    }

    #[test]
    fn test_clean_release() {
        assert_eq!(clean_release(" \"9.0\"\n"), "9.0");
        assert_eq!(clean_release("'8.0'"), "8.0");
    }
}
