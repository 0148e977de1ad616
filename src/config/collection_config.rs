use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use log::{debug, info};
use serde::{Deserialize, Serialize};

use crate::config::filters::{HardFilter, SoftFilter};
use crate::config::log_filter::LogFilesConf;
use crate::constants::*;
use crate::models::Category;

/// SSH connection settings shared by every remote call
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(default)]
pub struct SshConf {
    pub user: String,
    pub port: u16,
    /// Private key used for authentication; the SSH agent is used when unset
    pub private_key: Option<PathBuf>,
    /// Environment exported in front of every remote command
    pub env: BTreeMap<String, String>,
}

impl Default for SshConf {
    fn default() -> Self {
        Self {
            user: SSH_DEFAULT_USER.to_string(),
            port: SSH_DEFAULT_PORT,
            private_key: None,
            env: BTreeMap::new(),
        }
    }
}

/// Run configuration loaded from YAML
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(default)]
pub struct Conf {
    /// Admin address of the orchestrator host (node 0)
    pub orchestrator_address: String,
    pub ssh: SshConf,
    /// Per-call timeout for remote commands, in seconds
    pub timeout: u64,
    /// Timeout for local archive and compression tools, in seconds
    pub archive_timeout: u64,
    /// Root of the bundled data-source tree
    pub data_source_dir: PathBuf,
    /// Root of the per-category output directories
    pub outdir: PathBuf,
    /// Directory receiving the per-node log archives
    pub archives: PathBuf,
    pub lock_dir: PathBuf,
    /// Worker pool cap; one worker per node when unset
    pub max_workers: Option<usize>,
    pub space_coefficient: f64,
    pub release_command: String,
    pub node_release_command: String,
    pub inventory_command: String,
    pub hard_filter: HardFilter,
    pub soft_filter: SoftFilter,
    pub log_files: LogFilesConf,
}

impl Default for Conf {
    fn default() -> Self {
        let root = PathBuf::from(DEFAULT_OUTPUT_ROOT);
        Self {
            orchestrator_address: "127.0.0.1".to_string(),
            ssh: SshConf::default(),
            timeout: DEFAULT_TIMEOUT_SECS,
            archive_timeout: DEFAULT_ARCHIVE_TIMEOUT_SECS,
            data_source_dir: PathBuf::from(DEFAULT_DATA_SOURCE_DIR),
            outdir: root.join("info"),
            archives: root.join("archives"),
            lock_dir: PathBuf::from(DEFAULT_LOCK_DIR),
            max_workers: None,
            space_coefficient: DEFAULT_SPACE_COEFFICIENT,
            release_command: DEFAULT_RELEASE_COMMAND.to_string(),
            node_release_command: DEFAULT_NODE_RELEASE_COMMAND.to_string(),
            inventory_command: DEFAULT_INVENTORY_COMMAND.to_string(),
            hard_filter: HardFilter::default(),
            soft_filter: SoftFilter::default(),
            log_files: LogFilesConf::default(),
        }
    }
}

impl Conf {
    /// Load configuration from a YAML file
    pub fn from_yaml_file(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .context(format!("Failed to read config file: {}", path.display()))?;

        let conf: Conf = serde_yaml::from_str(&content)
            .context("Failed to parse YAML config")?;

        debug!("Loaded configuration from {}", path.display());
        Ok(conf)
    }

    /// Save configuration to a YAML file
    pub fn save_to_yaml_file(&self, path: &Path) -> Result<()> {
        let yaml = serde_yaml::to_string(self)
            .context("Failed to serialize config to YAML")?;

        fs::write(path, yaml)
            .context(format!("Failed to write config to {}", path.display()))?;

        info!("Saved configuration to {}", path.display());
        Ok(())
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout)
    }

    pub fn archive_timeout(&self) -> Duration {
        Duration::from_secs(self.archive_timeout)
    }

    /// Lock file guarding overlapping runs of a category; logs have none
    pub fn lock_path(&self, category: Category) -> Option<PathBuf> {
        match category {
            Category::Commands | Category::Files => Some(
                self.lock_dir
                    .join(format!("{}-{}.lock", LOCK_FILE_PREFIX, category.dir_name())),
            ),
            Category::Logs => None,
        }
    }
}

/// Load a configuration file or create a default one.
///
/// With a path that exists the file is parsed; with a path that doesn't, the
/// default configuration is written there and returned. Without a path the
/// default configuration is used as is.
pub fn load_or_create_conf(path: Option<&Path>) -> Result<Conf> {
    match path {
        Some(path) if path.exists() => Conf::from_yaml_file(path),
        Some(path) => {
            info!("Creating default config at {}", path.display());
            let conf = Conf::default();
            conf.save_to_yaml_file(path)?;
            Ok(conf)
        }
        None => {
            info!("No config path provided, using default configuration");
            Ok(Conf::default())
        }
    }
}
