//! # fleet-collector
//!
//! Collects diagnostic data (command output, configuration files, logs) from
//! every node of a deployed multi-role cluster.
//!
//! ## Overview
//!
//! A run loads the fleet inventory from the orchestrator host, decides per
//! node what to collect from a layered data-source tree (by role, by release,
//! by OS, default, once per role), runs the collection concurrently under a
//! per-category file lock, and packages logs into per-node archives after
//! checking there is room for them.
//!
//! ## Usage
//!
//! ```no_run
//! use fleet_collector::archive::MountedDisks;
//! use fleet_collector::collector::Collector;
//! use fleet_collector::config::Conf;
//! use fleet_collector::datasource::{DataSourceResolver, DataSourceTree};
//! use fleet_collector::nodes::{InventorySource, NodeRegistry};
//! use fleet_collector::transport::{LocalShell, SshTransport};
//!
//! # fn main() -> anyhow::Result<()> {
//! let conf = Conf::default();
//! let ssh = SshTransport::new(conf.ssh.clone());
//! let shell = LocalShell::new()?;
//!
//! let tree = DataSourceTree::load(&conf.data_source_dir)?;
//! let mut registry = NodeRegistry::load(&conf, &InventorySource::Orchestrator, None, &ssh)?;
//! DataSourceResolver::new(&tree, registry.release(), false).resolve_fleet(&mut registry)?;
//!
//! let collector = Collector::new(&conf, &tree, &ssh, &shell, &MountedDisks);
//! collector.run(&mut registry, None)?;
//! # Ok(())
//! # }
//! ```
//!
//! ## Module Organization
//!
//! - [`cli`]: Command-line interface definitions
//! - [`config`]: YAML configuration, filters and log filter spec
//! - [`nodes`]: Fleet inventory and the node registry
//! - [`datasource`]: Data-source tree scan and per-node resolution
//! - [`logs`]: Remote log inventory and the include/exclude filter
//! - [`dispatch`]: Per-node fan-out and file locks
//! - [`archive`]: Free-space admission and log archives
//! - [`transport`]: SSH and local process execution
//! - [`collector`]: The phases of a run
//!
//! ## Safety
//!
//! The only `unsafe` code is the `flock(2)` call behind [`dispatch::FileLock`].

/// Command-line interface definitions and argument parsing
pub mod cli;

/// Core data models shared by every module
pub mod models;

/// Configuration management
pub mod config;

/// Application constants and configuration values
pub mod constants;

/// Fatal errors and their exit statuses
pub mod errors;

pub mod nodes;

pub mod datasource;

pub mod logs;

pub mod dispatch;

pub mod archive;

/// Remote and local command execution
pub mod transport;

pub mod collector;

/// Test utilities and helpers
#[cfg(test)]
pub mod test_utils;
