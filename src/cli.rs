use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Command-line arguments for the fleet collector.
///
/// Values given here override the matching configuration file settings.
#[derive(Parser, Debug)]
#[clap(name = "fleet-collector", about = "Collect diagnostics from every node of a cluster")]
pub struct Args {
    /// Path to configuration YAML file
    #[clap(short = 'c', long)]
    pub config: Option<PathBuf>,

    /// Local output directory (default: outdir from the configuration)
    #[clap(short, long)]
    pub output: Option<PathBuf>,

    /// Only collect from this cluster (plus the orchestrator); 0 means every cluster
    #[clap(short = 'e', long)]
    pub cluster: Option<u64>,

    /// Read the node inventory from a JSON file instead of the orchestrator
    #[clap(short = 'n', long)]
    pub nodes: Option<PathBuf>,

    /// Run once-by-role commands on the first eligible node of each role
    #[clap(short = 'x', long)]
    pub extended: bool,

    /// Collect, filter and archive logs
    #[clap(short = 'l', long)]
    pub logs: bool,

    /// Resolve and log commands without running them
    #[clap(short = 'd', long)]
    pub dry_run: bool,

    /// Print the node list and exit
    #[clap(long)]
    pub list: bool,

    /// Cap on concurrent per-node workers
    #[clap(long)]
    pub maxthreads: Option<usize>,

    /// Verbose logging
    #[clap(short, long)]
    pub verbose: bool,

    /// Also write the log to this file
    #[clap(long)]
    pub log_file: Option<PathBuf>,

    /// Subcommands
    #[clap(subcommand)]
    pub command: Option<Commands>,
}

impl Args {
    /// Cluster scope of the run; cluster 0 selects no scope
    pub fn cluster_scope(&self) -> Option<u64> {
        self.cluster.filter(|cluster| *cluster != 0)
    }
}

/// Available subcommands for the collector.
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Create a default configuration file
    InitConfig {
        /// Path to output configuration file
        #[clap(default_value = "config.yaml")]
        path: PathBuf,
    },
}
