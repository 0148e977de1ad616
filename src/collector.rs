//! Phase driver for one collection run.
//!
//! Each phase picks its targets from the registry, fans the per-node work out
//! through the [`Dispatcher`], then folds the slot-indexed results back into
//! the registry on the calling thread.

use std::collections::BTreeMap;
use std::fs;
use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use chrono::Local;
use log::{debug, error, info, warn};

use crate::archive::{ArchivePipeline, FreeSpace, SpaceGuard};
use crate::config::Conf;
use crate::constants::LOG_INVENTORY_TIMEOUT_SECS;
use crate::datasource::DataSourceTree;
use crate::dispatch::{Dispatch, Dispatcher};
use crate::logs::{parse_du_output, total_size, LogEntry, LogFilter};
use crate::models::{Category, NodeStatus};
use crate::nodes::registry::clean_release;
use crate::nodes::{Node, NodeRegistry};
use crate::transport::{shell_quote, ExecRequest, RemoteExec, Shell, SyncRequest};

/// Result of a size measurement on one node
#[derive(Debug, Clone, PartialEq)]
pub enum Measured<T> {
    Done(T),
    /// The call timed out; the node is taken offline
    Offline,
}

/// What a run did, for the final log line and for callers that script us
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RunReport {
    pub commands_workers: usize,
    pub commands_skipped: bool,
    pub files_workers: usize,
    pub files_skipped: bool,
    pub general_archive: Option<PathBuf>,
    pub logs_admitted: Option<bool>,
    pub log_archives: usize,
}

pub struct Collector<'a> {
    conf: &'a Conf,
    tree: &'a DataSourceTree,
    exec: &'a dyn RemoteExec,
    shell: &'a dyn Shell,
    space: &'a dyn FreeSpace,
    dispatcher: Dispatcher,
    outdir: PathBuf,
    dry_run: bool,
}

impl<'a> Collector<'a> {
    pub fn new(
        conf: &'a Conf,
        tree: &'a DataSourceTree,
        exec: &'a dyn RemoteExec,
        shell: &'a dyn Shell,
        space: &'a dyn FreeSpace,
    ) -> Self {
        Self {
            conf,
            tree,
            exec,
            shell,
            space,
            dispatcher: Dispatcher::new(conf.max_workers),
            outdir: conf.outdir.clone(),
            dry_run: false,
        }
    }

    /// Resolve and log commands without executing anything remotely
    pub fn with_dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }

    pub fn with_dispatcher(mut self, dispatcher: Dispatcher) -> Self {
        self.dispatcher = dispatcher;
        self
    }

    fn pipeline(&self) -> ArchivePipeline<'_> {
        ArchivePipeline::new(
            self.exec,
            self.shell,
            self.dispatcher,
            &self.conf.archives,
            self.conf.archive_timeout(),
        )
    }

    /// All phases in order; the logs phase only when asked for
    pub fn run(&self, registry: &mut NodeRegistry, logs: Option<&LogFilter>) -> Result<RunReport> {
        let mut report = RunReport::default();
        fs::create_dir_all(&self.outdir)
            .context(format!("Failed to create output directory {}", self.outdir.display()))?;

        if !self.dry_run {
            self.detect_node_releases(registry);
        }

        let commands = self.run_commands(registry);
        report.commands_workers = commands.started;
        report.commands_skipped = commands.lock_skipped;

        if self.dry_run {
            info!("dry run: skipping files and logs");
            return Ok(report);
        }

        let files = self.sync_files(registry);
        report.files_workers = files.started;
        report.files_skipped = files.lock_skipped;

        let general = self.conf.archives.join(format!(
            "general-{}.tar.bz2",
            Local::now().format("%Y-%m-%d_%H-%M-%S")
        ));
        if self.pipeline().create_general_archive(&self.outdir, &general) {
            report.general_archive = Some(general);
        }

        if let Some(filter) = logs {
            let (admitted, archives) = self.collect_logs(registry, filter);
            report.logs_admitted = Some(admitted);
            report.log_archives = archives;
        }

        info!("run finished: {:?}", report);
        Ok(report)
    }

    /// Execute every resolved command script on each eligible node
    pub fn run_commands(&self, registry: &mut NodeRegistry) -> Dispatch<()> {
        let lock = self.conf.lock_path(Category::Commands);
        let dispatch = self.dispatcher.dispatch(
            Category::Commands,
            registry.eligible(),
            lock.as_deref(),
            |node| self.commands_on(node),
        );

        let Dispatch { started, lock_skipped, results } = dispatch;
        for (slot, outputs) in results {
            if let Some(node) = registry.node_mut(slot) {
                node.command_outputs = outputs;
            }
        }
        Dispatch { started, lock_skipped, results: Vec::new() }
    }

    fn commands_on(&self, node: &Node) -> BTreeMap<String, PathBuf> {
        let location = node.output_location(&self.outdir, Category::Commands);
        let mut outputs = BTreeMap::new();
        if let Err(e) = fs::create_dir_all(location.dir()) {
            error!("node-{}: can't create {}: {}", node.id, location.dir().display(), e);
            return outputs;
        }

        let sources = node.sources(Category::Commands);
        for source in sources {
            // Same script name from two layers: keep both outputs apart
            let shared = sources.iter().filter(|s| s.file_name == source.file_name).count() > 1;
            let label = if shared { source.qualified_name() } else { source.file_name.clone() };
            let script = source.absolute(self.tree.root());
            let output_file = location.file(&node.address, &label);
            info!("node-{} ({}), exec: {}", node.id, node.address, script.display());

            if !self.dry_run {
                let request = ExecRequest::script(&node.address, &script, self.conf.timeout())
                    .with_env(&self.conf.ssh.env)
                    .with_output(&output_file);
                let output = self.exec.exec(&request);
                if !output.is_success() {
                    error!(
                        "node: {}, ip: {}, cmdfile: {}, code: {}, error message: {}",
                        node.id,
                        node.address,
                        source.file_name,
                        output.code,
                        output.stderr
                    );
                }
            }
            debug!("outfile: {}", output_file.display());
            outputs.insert(label, output_file);
        }
        outputs
    }

    /// Copy each eligible node's configuration files under the files output dir
    pub fn sync_files(&self, registry: &NodeRegistry) -> Dispatch<bool> {
        if !self.tree.has_category(Category::Files) {
            warn!("sync_files: {} directory does not exist", Category::Files);
            return Dispatch { started: 0, lock_skipped: false, results: Vec::new() };
        }
        let lock = self.conf.lock_path(Category::Files);
        self.dispatcher.dispatch(
            Category::Files,
            registry.eligible(),
            lock.as_deref(),
            |node| self.sync_category(node, Category::Files),
        )
    }

    /// Copy each eligible node's listed log files; the orchestrator is skipped
    pub fn sync_logs(&self, registry: &NodeRegistry) -> Dispatch<bool> {
        if !self.tree.has_category(Category::Logs) {
            warn!("sync_logs: {} directory does not exist", Category::Logs);
            return Dispatch { started: 0, lock_skipped: false, results: Vec::new() };
        }
        let targets = registry
            .eligible()
            .into_iter()
            .filter(|(_, node)| !node.is_orchestrator())
            .collect();
        self.dispatcher.dispatch(Category::Logs, targets, None, |node| {
            self.sync_category(node, Category::Logs)
        })
    }

    fn sync_category(&self, node: &Node, category: Category) -> bool {
        let sources = node.content_paths(category);
        if sources.is_empty() {
            debug!("node-{}: nothing to sync for {}", node.id, category);
            return true;
        }
        let destination = node.output_location(&self.outdir, category).dir();
        if let Err(e) = fs::create_dir_all(&destination) {
            error!("node-{}: can't create {}: {}", node.id, destination.display(), e);
            return false;
        }

        info!("node-{} ({}), sync {}: {} paths", node.id, node.address, category, sources.len());
        let output = self.exec.sync(&SyncRequest {
            address: node.address.clone(),
            sources,
            destination,
            timeout: self.conf.timeout(),
        });
        if !output.is_success() {
            warn!(
                "sync: node: {}, ip: {}, label: {}, code: {}, error message: {}",
                node.id, node.address, category, output.code, output.stderr
            );
        }
        output.is_success()
    }

    /// `du -b` over the log paths listed for each node
    pub fn measure_log_sources(&self, registry: &mut NodeRegistry) -> u64 {
        let dispatch = self.dispatcher.dispatch(Category::Logs, registry.eligible(), None, |node| {
            let paths = node.content_paths(Category::Logs);
            if paths.is_empty() {
                return Measured::Done(0);
            }
            let command = format!(
                "du -b {}",
                paths.iter().map(|p| shell_quote(p)).collect::<Vec<_>>().join(" ")
            );
            let output = self
                .exec
                .exec(&ExecRequest::inline(&node.address, command, self.conf.timeout()));
            if output.is_timeout() {
                error!("node: {}, ip: {}, du timed out: {}", node.id, node.address, output.stderr);
                return Measured::Offline;
            }
            if !output.is_success() {
                warn!(
                    "node: {}, ip: {}, du code: {}, error message: {}",
                    node.id, node.address, output.code, output.stderr
                );
            }
            Measured::Done(total_size(&output.stdout))
        });

        let mut total = 0;
        for (slot, measured) in dispatch.results {
            let Some(node) = registry.node_mut(slot) else {
                continue;
            };
            match measured {
                Measured::Done(size) => {
                    info!("node: {}, ip: {}, size: {}", node.id, node.address, size);
                    node.log_size = size;
                    total += size;
                }
                Measured::Offline => node.online = false,
            }
        }
        total
    }

    /// List every file under the configured log path on each eligible node
    pub fn inventory_logs(&self, registry: &mut NodeRegistry) -> BTreeMap<usize, Vec<LogEntry>> {
        let command = format!(
            "find {} -type f -exec du -b {{}} +",
            shell_quote(&self.conf.log_files.path)
        );
        let timeout = Duration::from_secs(LOG_INVENTORY_TIMEOUT_SECS);
        let dispatch = self.dispatcher.dispatch(Category::Logs, registry.eligible(), None, |node| {
            info!("node: {}, logs du-cmd: {}", node.id, command);
            let output = self
                .exec
                .exec(&ExecRequest::inline(&node.address, command.as_str(), timeout));
            if output.is_timeout() {
                error!("node: {}, ip: {}, log inventory timed out: {}", node.id, node.address, output.stderr);
                return Measured::Offline;
            }
            if !output.is_success() {
                warn!("can't get log file list from node {}: {}", node.id, output.stderr);
                return Measured::Done(Vec::new());
            }
            Measured::Done(parse_du_output(&output.stdout))
        });

        let mut inventories = BTreeMap::new();
        for (slot, measured) in dispatch.results {
            match measured {
                Measured::Done(entries) => {
                    inventories.insert(slot, entries);
                }
                Measured::Offline => {
                    if let Some(node) = registry.node_mut(slot) {
                        node.online = false;
                    }
                }
            }
        }
        inventories
    }

    /// Narrow each inventoried node's logs into its filtered map
    pub fn filter_logs(
        &self,
        registry: &mut NodeRegistry,
        filter: &LogFilter,
        inventories: &BTreeMap<usize, Vec<LogEntry>>,
    ) {
        let slots: Vec<usize> = registry.eligible().into_iter().map(|(slot, _)| slot).collect();
        for slot in slots {
            let Some(node) = registry.node_mut(slot) else {
                continue;
            };
            let inventory = inventories.get(&slot).map(Vec::as_slice).unwrap_or(&[]);
            filter.apply(&node.roles, inventory, &mut node.filtered_logs);
            debug!("filter logs: node-{}: filtered logs: {:?}", node.id, node.filtered_logs);
        }
    }

    /// Ask each ready node in scope for its own release; fall back to the fleet release
    pub fn detect_node_releases(&self, registry: &mut NodeRegistry) {
        let fleet_release = registry.release().to_string();
        let targets: Vec<(usize, &Node)> = registry
            .nodes()
            .iter()
            .enumerate()
            .filter(|(_, node)| {
                !node.is_orchestrator()
                    && node.status == NodeStatus::Ready
                    && node.online
                    && registry.in_scope(node)
            })
            .collect();

        let dispatch = self.dispatcher.dispatch(Category::Commands, targets, None, |node| {
            let request =
                ExecRequest::inline(&node.address, self.conf.node_release_command.as_str(), self.conf.timeout());
            let output = self.exec.exec(&request);
            if output.is_success() {
                Some(clean_release(&output.stdout))
            } else {
                warn!("node: {}: can't get node release", node.id);
                None
            }
        });

        let mut detected: BTreeMap<usize, Option<String>> = dispatch.results.into_iter().collect();
        for (slot, node) in registry.nodes_mut().iter_mut().enumerate() {
            if node.is_orchestrator() {
                node.release = Some(fleet_release.clone());
            } else if let Some(release) = detected.remove(&slot) {
                node.release = Some(release.unwrap_or_else(|| fleet_release.clone()));
                info!("node: {}, release: {:?}", node.id, node.release);
            }
        }
    }

    /// Logs phase: listed logs, inventory, filter, then space-gated archives.
    ///
    /// Returns whether archiving was admitted and how many archives exist.
    pub fn collect_logs(&self, registry: &mut NodeRegistry, filter: &LogFilter) -> (bool, usize) {
        let guard = SpaceGuard::new(self.space, &self.conf.archives);

        let listed_kb = self.measure_log_sources(registry) / 1024;
        if listed_kb > 0 {
            if guard.admit(listed_kb, self.conf.space_coefficient) {
                self.sync_logs(registry);
                let listed_archive = self.conf.archives.join("logs-listed.tar");
                if let Err(e) = fs::create_dir_all(&self.conf.archives) {
                    error!("Can't create archive directory {}: {}", self.conf.archives.display(), e);
                } else {
                    self.pipeline()
                        .append(&self.outdir, Category::Logs.dir_name(), &listed_archive);
                }
            } else {
                warn!("not enough space for listed logs, skipping their sync");
            }
        }

        let inventories = self.inventory_logs(registry);
        self.filter_logs(registry, filter, &inventories);

        let estimate = SpaceGuard::estimate(registry);
        if !guard.admit(estimate, self.conf.space_coefficient) {
            return (false, 0);
        }

        let pipeline = self.pipeline();
        let archives = pipeline.create_log_archives(registry);
        pipeline.compress_logs(registry);
        (true, archives)
    }
}
