use std::collections::{BTreeSet, HashSet};
use std::fs;

use log::{debug, error, info};

use crate::datasource::{DataSourceTree, Layer, SourcePath};
use crate::errors::FatalError;
use crate::models::Category;
use crate::nodes::{Node, NodeRegistry};

/// Decides which data-source files apply to each node
pub struct DataSourceResolver<'a> {
    tree: &'a DataSourceTree,
    release: String,
    extended: bool,
}

impl<'a> DataSourceResolver<'a> {
    pub fn new(tree: &'a DataSourceTree, release: &str, extended: bool) -> Self {
        Self {
            tree,
            release: release.to_string(),
            extended,
        }
    }

    /// Sources of one category for a node, sorted and deduplicated.
    ///
    /// Every role contributes its by-role and release entries; the node's
    /// platform set and the default set are merged in once. OS-marked files
    /// for other platforms are dropped last.
    pub fn resolve(&self, node: &Node, category: Category) -> Vec<SourcePath> {
        let mut merged = BTreeSet::new();
        for role in &node.roles {
            self.merge(&mut merged, category, Layer::ByRole(role.clone()));
            self.merge(
                &mut merged,
                category,
                Layer::Release {
                    version: self.release.clone(),
                    role: role.clone(),
                },
            );
        }
        if !node.roles.is_empty() {
            self.merge(&mut merged, category, Layer::ByOs(node.os_platform.clone()));
            self.merge(&mut merged, category, Layer::Default);
        }
        finish(node, merged)
    }

    /// Resolve every category for every node, attaching once-by-role
    /// commands to the first eligible node of each role in extended mode
    pub fn resolve_fleet(&self, registry: &mut NodeRegistry) -> Result<(), FatalError> {
        if let Some(category) = self.tree.empty_categories().first() {
            return Err(FatalError::EmptyCategory(category.to_string()));
        }

        let eligible: Vec<bool> = registry.nodes().iter().map(|n| registry.is_eligible(n)).collect();
        for category in self.tree.categories().collect::<Vec<_>>() {
            let mut claimed_roles = HashSet::new();
            for (slot, node) in registry.nodes_mut().iter_mut().enumerate() {
                let mut sources: BTreeSet<SourcePath> = self.resolve(node, category).into_iter().collect();

                if self.extended && category == Category::Commands && eligible[slot] {
                    for role in &node.roles {
                        if claimed_roles.insert(role.clone()) {
                            debug!("role {} claimed by node-{}", role, node.id);
                            self.merge(&mut sources, category, Layer::OnceByRole(role.clone()));
                        }
                    }
                }

                let sources = finish(node, sources);
                if category == Category::Commands {
                    info!(
                        "node-{}, os: {}, {}: {:?}",
                        node.id,
                        node.os_platform,
                        category,
                        sources.iter().map(|s| s.file_name.as_str()).collect::<Vec<_>>()
                    );
                }
                node.sources.insert(category, sources);
            }

            if matches!(category, Category::Files | Category::Logs) {
                for node in registry.nodes_mut() {
                    self.load_contents(node, category);
                }
            }
        }
        Ok(())
    }

    /// Concatenate a node's sources into its content, skipping blank and `#` lines
    pub fn load_contents(&self, node: &mut Node, category: Category) {
        let mut content = String::new();
        for source in node.sources(category) {
            let path = source.absolute(self.tree.root());
            match fs::read_to_string(&path) {
                Ok(text) => {
                    for line in text.lines() {
                        if line.trim().is_empty() || line.starts_with('#') {
                            continue;
                        }
                        content.push_str(line);
                        content.push('\n');
                    }
                }
                Err(e) => error!("could not read file {}: {}", path.display(), e),
            }
        }
        debug!("node-{}, {} content:\n{}", node.id, category, content);
        node.content.insert(category, content);
    }

    fn merge(&self, merged: &mut BTreeSet<SourcePath>, category: Category, layer: Layer) {
        for file_name in self.tree.files(category, &layer) {
            merged.insert(SourcePath::new(category, layer.clone(), file_name));
        }
    }
}

fn finish(node: &Node, merged: BTreeSet<SourcePath>) -> Vec<SourcePath> {
    merged
        .into_iter()
        .filter(|source| source.applies_to(&node.os_platform))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{HardFilter, SoftFilter};
    use crate::test_utils::{test_node, write_files};
    use proptest::prelude::*;
    use std::path::Path;
    use tempfile::TempDir;

    fn sample_tree() -> DataSourceTree {
        let mut tree = DataSourceTree::new(Path::new("/rq"));
        tree.insert(Category::Commands, "by-role", "controller", "ovs-vsctl");
        tree.insert(Category::Commands, "by-role", "compute", "virsh-list");
        tree.insert(Category::Commands, "release-9.0", "controller", "nova-manage");
        tree.insert(Category::Commands, "release-8.0", "controller", "old-nova-manage");
        tree.insert(Category::Commands, "by-os", "ubuntu", "dpkg-list");
        tree.insert(Category::Commands, "by-os", "centos", "rpm-list");
        tree.insert(Category::Commands, "default", "default", "uptime");
        tree.insert(Category::Commands, "default", "default", ".debian-only-check");
        tree.insert(Category::Commands, "once-by-role", "controller", "cluster-status");
        tree
    }

    fn names(sources: &[SourcePath]) -> Vec<&str> {
        sources.iter().map(|s| s.file_name.as_str()).collect()
    }

    #[test]
    fn test_resolve_merges_layers_for_each_role() {
        let tree = sample_tree();
        let resolver = DataSourceResolver::new(&tree, "9.0", false);

        let sources = resolver.resolve(&test_node(1, &["controller", "compute"], "ubuntu"), Category::Commands);
        assert_eq!(
            names(&sources),
            vec!["dpkg-list", "virsh-list", "ovs-vsctl", "uptime", "nova-manage"]
        );
        assert!(sources.windows(2).all(|w| w[0].relative() < w[1].relative()));
    }

    #[test]
    fn test_os_marked_files_follow_platform() {
        let tree = sample_tree();
        let resolver = DataSourceResolver::new(&tree, "9.0", false);

        let centos = resolver.resolve(&test_node(1, &["compute"], "centos"), Category::Commands);
        assert!(!names(&centos).contains(&".debian-only-check"));

        let debian = resolver.resolve(&test_node(2, &["compute"], "debian"), Category::Commands);
        assert!(names(&debian).contains(&".debian-only-check"));
    }

    #[test]
    fn test_node_without_platform_gets_no_os_marked_files() {
        let mut tree = sample_tree();
        tree.insert(Category::Commands, "default", "default", ".centos-only-check");
        let records = crate::nodes::inventory::parse_inventory(
            r#"[{"id": 9, "roles": ["compute"], "ip": "10.0.0.9", "status": "ready", "online": true}]"#,
            "test",
        )
        .unwrap();
        let mut registry = NodeRegistry::new("9.0", None, SoftFilter::default());
        for record in records {
            registry.admit(record.into(), &HardFilter::default());
        }

        DataSourceResolver::new(&tree, "9.0", false).resolve_fleet(&mut registry).unwrap();

        let node = &registry.nodes()[0];
        assert_eq!(node.os_platform, "");
        assert_eq!(names(node.sources(Category::Commands)), vec!["virsh-list", "uptime"]);
    }

    #[test]
    fn test_once_by_role_attaches_to_first_eligible_node() {
        let tree = sample_tree();
        let mut registry = NodeRegistry::new("9.0", None, SoftFilter::default());
        let mut offline = test_node(1, &["controller"], "ubuntu");
        offline.online = false;
        registry.admit(offline, &HardFilter::default());
        for id in 2..5 {
            registry.admit(test_node(id, &["controller"], "ubuntu"), &HardFilter::default());
        }

        DataSourceResolver::new(&tree, "9.0", true).resolve_fleet(&mut registry).unwrap();

        let holders: Vec<u64> = registry
            .nodes()
            .iter()
            .filter(|n| names(n.sources(Category::Commands)).contains(&"cluster-status"))
            .map(|n| n.id)
            .collect();
        assert_eq!(holders, vec![2]);
    }

    #[test]
    fn test_once_by_role_needs_extended_mode() {
        let tree = sample_tree();
        let mut registry = NodeRegistry::new("9.0", None, SoftFilter::default());
        registry.admit(test_node(1, &["controller"], "ubuntu"), &HardFilter::default());

        DataSourceResolver::new(&tree, "9.0", false).resolve_fleet(&mut registry).unwrap();
        assert!(!names(registry.nodes()[0].sources(Category::Commands)).contains(&"cluster-status"));
    }

    #[test]
    fn test_empty_category_aborts_resolution() {
        let temp_dir = TempDir::new().unwrap();
        std::fs::create_dir_all(temp_dir.path().join("files/default/default")).unwrap();
        let tree = DataSourceTree::load(temp_dir.path()).unwrap();
        let mut registry = NodeRegistry::new("9.0", None, SoftFilter::default());

        let err = DataSourceResolver::new(&tree, "9.0", false)
            .resolve_fleet(&mut registry)
            .unwrap_err();
        assert_eq!(err.exit_code(), 7);
    }

    #[test]
    fn test_load_contents_skips_comments_and_blank_lines() {
        let temp_dir = TempDir::new().unwrap();
        write_files(
            temp_dir.path(),
            &[("files/default/default/etc", "# config files\n/etc/nova\n\n   \n/etc/hosts\n")],
        );
        let tree = DataSourceTree::load(temp_dir.path()).unwrap();

        let mut registry = NodeRegistry::new("9.0", None, SoftFilter::default());
        registry.admit(test_node(1, &["compute"], "ubuntu"), &HardFilter::default());
        DataSourceResolver::new(&tree, "9.0", false).resolve_fleet(&mut registry).unwrap();

        assert_eq!(registry.nodes()[0].content(Category::Files), "/etc/nova\n/etc/hosts\n");
    }

    fn layer_strategy() -> impl Strategy<Value = (&'static str, &'static str)> {
        prop_oneof![
            Just(("by-role", "controller")),
            Just(("by-role", "compute")),
            Just(("release-9.0", "compute")),
            Just(("by-os", "ubuntu")),
            Just(("by-os", "centos")),
            Just(("default", "default")),
        ]
    }

    proptest! {
        #[test]
        fn test_resolution_is_sorted_unique_and_idempotent(
            entries in prop::collection::vec(
                (layer_strategy(), prop::sample::select(vec!["a", "b", ".ubuntu-c", ".centos-d", "e"])),
                0..30,
            ),
            roles in prop::sample::subsequence(vec!["controller", "compute", "mongo"], 0..3),
        ) {
            let mut tree = DataSourceTree::new(Path::new("/rq"));
            for ((layer, key), file) in &entries {
                tree.insert(Category::Commands, layer, key, file);
            }
            let resolver = DataSourceResolver::new(&tree, "9.0", false);
            let node = test_node(7, &roles, "ubuntu");

            let first = resolver.resolve(&node, Category::Commands);
            let second = resolver.resolve(&node, Category::Commands);
            prop_assert_eq!(&first, &second);
            prop_assert!(first.windows(2).all(|w| w[0].relative() < w[1].relative()));
            prop_assert!(first.iter().all(|s| s.applies_to("ubuntu")));
        }
    }
}
