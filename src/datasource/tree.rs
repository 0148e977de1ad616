use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};

use log::{debug, info, warn};
use walkdir::WalkDir;

use crate::datasource::Layer;
use crate::errors::FatalError;
use crate::models::Category;

/// layer dir -> key dir -> file names
type LayerMap = BTreeMap<String, BTreeMap<String, BTreeSet<String>>>;

/// Read-only snapshot of the bundled data-source definitions.
///
/// The tree is laid out as `<root>/<category>/<layer>/<key>/<file>` and is
/// scanned once per run.
#[derive(Debug, Clone, Default)]
pub struct DataSourceTree {
    root: PathBuf,
    categories: BTreeMap<Category, LayerMap>,
}

impl DataSourceTree {
    /// An empty tree rooted at `root`, filled with [`DataSourceTree::insert`]
    pub fn new(root: &Path) -> Self {
        Self {
            root: root.to_path_buf(),
            categories: BTreeMap::new(),
        }
    }

    /// Scan a data-source directory
    pub fn load(root: &Path) -> Result<Self, FatalError> {
        if !root.is_dir() {
            return Err(FatalError::MissingDataSourceDir(root.to_path_buf()));
        }

        let mut tree = Self::new(root);
        for category in Category::ALL {
            let category_dir = root.join(category.dir_name());
            if !category_dir.is_dir() {
                warn!("data-source category {} not found in {}", category, root.display());
                continue;
            }
            tree.categories.entry(category).or_default();

            let walker = WalkDir::new(&category_dir)
                .min_depth(3)
                .max_depth(3)
                .follow_links(true)
                .sort_by_file_name();
            for entry in walker {
                let entry = match entry {
                    Ok(entry) => entry,
                    Err(e) => {
                        warn!("skipping unreadable data-source entry: {}", e);
                        continue;
                    }
                };
                if !entry.file_type().is_file() {
                    continue;
                }
                let Ok(relative) = entry.path().strip_prefix(&category_dir) else {
                    continue;
                };
                let parts: Vec<String> = relative
                    .components()
                    .map(|c| c.as_os_str().to_string_lossy().into_owned())
                    .collect();
                if let [layer, key, file] = parts.as_slice() {
                    tree.insert(category, layer, key, file);
                }
            }
            info!(
                "data-source category {}: {} files",
                category,
                tree.file_count(category)
            );
        }
        Ok(tree)
    }

    pub fn insert(&mut self, category: Category, layer: &str, key: &str, file_name: &str) {
        debug!("data source: {}/{}/{}/{}", category, layer, key, file_name);
        self.categories
            .entry(category)
            .or_default()
            .entry(layer.to_string())
            .or_default()
            .entry(key.to_string())
            .or_default()
            .insert(file_name.to_string());
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Categories whose directory exists in the tree
    pub fn categories(&self) -> impl Iterator<Item = Category> + '_ {
        self.categories.keys().copied()
    }

    pub fn has_category(&self, category: Category) -> bool {
        self.categories.contains_key(&category)
    }

    /// Present categories holding no source file at all
    pub fn empty_categories(&self) -> Vec<Category> {
        self.categories()
            .filter(|category| self.file_count(*category) == 0)
            .collect()
    }

    pub fn file_count(&self, category: Category) -> usize {
        self.categories
            .get(&category)
            .map(|layers| layers.values().flat_map(|keys| keys.values()).map(BTreeSet::len).sum())
            .unwrap_or(0)
    }

    /// File names under one layer key; missing layers and keys are empty
    pub fn files(&self, category: Category, layer: &Layer) -> impl Iterator<Item = &str> + '_ {
        self.categories
            .get(&category)
            .and_then(|layers| layers.get(&layer.dir_name()))
            .and_then(|keys| keys.get(layer.key()))
            .into_iter()
            .flat_map(|files| files.iter().map(String::as_str))
    }
}
