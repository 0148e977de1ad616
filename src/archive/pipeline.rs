use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use log::{debug, error, info, warn};

use crate::constants::{MANIFEST_SUFFIX, TAR_FILES_DIFFER_EXIT_CODE};
use crate::dispatch::Dispatcher;
use crate::models::Category;
use crate::nodes::{Node, NodeRegistry};
use crate::transport::{shell_quote, ExecRequest, RemoteExec, Shell};

/// Streams each node's filtered logs into a local tar archive, then
/// compresses the archives one at a time.
pub struct ArchivePipeline<'a> {
    exec: &'a dyn RemoteExec,
    shell: &'a dyn Shell,
    dispatcher: Dispatcher,
    archives: PathBuf,
    timeout: Duration,
}

impl<'a> ArchivePipeline<'a> {
    pub fn new(
        exec: &'a dyn RemoteExec,
        shell: &'a dyn Shell,
        dispatcher: Dispatcher,
        archives: &Path,
        timeout: Duration,
    ) -> Self {
        Self {
            exec,
            shell,
            dispatcher,
            archives: archives.to_path_buf(),
            timeout,
        }
    }

    /// `<archives>/logs-node-<id>.tar`
    pub fn archive_path(&self, node: &Node) -> PathBuf {
        self.archives.join(format!("logs-node-{}.tar", node.id))
    }

    pub fn manifest_path(&self, node: &Node) -> PathBuf {
        let mut name = self.archive_path(node).into_os_string();
        name.push(MANIFEST_SUFFIX);
        PathBuf::from(name)
    }

    /// Archive every eligible node's filtered logs; returns how many archives were written
    pub fn create_log_archives(&self, registry: &mut NodeRegistry) -> usize {
        if let Err(e) = fs::create_dir_all(&self.archives) {
            error!("Can't create archive directory {}: {}", self.archives.display(), e);
            return 0;
        }

        let mut manifests = Vec::new();
        let outcome = {
            let mut targets = Vec::new();
            for (slot, node) in registry.eligible() {
                let manifest = self.manifest_path(node);
                match write_manifest(&manifest, node.filtered_logs.keys()) {
                    Ok(()) => {
                        manifests.push(manifest);
                        targets.push((slot, node));
                    }
                    Err(e) => error!("create_log_archives: node-{}: {:#}", node.id, e),
                }
            }

            self.dispatcher.dispatch(Category::Logs, targets, None, |node| {
                let archive = self.archive_path(node);
                let request = ExecRequest::inline(
                    &node.address,
                    "tar --create --file - --null --files-from -",
                    self.timeout,
                )
                .with_input(self.manifest_path(node))
                .with_output(&archive);

                info!("node-{} ({}): archiving logs to {}", node.id, node.address, archive.display());
                let output = self.exec.exec(&request);
                if output.is_success() {
                    Some(archive)
                } else {
                    warn!(
                        "node-{} ({}): log archive failed, code: {}, error message: {}",
                        node.id, node.address, output.code, output.stderr
                    );
                    None
                }
            })
        };

        let mut written = 0;
        for (slot, archive) in outcome.results {
            if let (Some(node), Some(archive)) = (registry.node_mut(slot), archive) {
                node.archive = Some(archive);
                written += 1;
            }
        }

        for manifest in manifests {
            if let Err(e) = fs::remove_file(&manifest) {
                warn!("Can't remove manifest {}: {}", manifest.display(), e);
            }
        }
        written
    }

    /// Compress the archives one by one; failures leave the `.tar` in place
    pub fn compress_logs(&self, registry: &mut NodeRegistry) {
        let slots: Vec<usize> = registry.eligible().into_iter().map(|(slot, _)| slot).collect();
        for slot in slots {
            let Some(node) = registry.node_mut(slot) else {
                continue;
            };
            let Some(archive) = node.archive.clone() else {
                continue;
            };
            let output = self
                .shell
                .run(&format!("bzip2 -f {}", shell_quote(&archive.to_string_lossy())), self.timeout);
            if output.is_success() {
                let mut compressed = archive.into_os_string();
                compressed.push(".bz2");
                node.archive = Some(PathBuf::from(compressed));
                debug!("node-{}: compressed archive {:?}", node.id, node.archive);
            } else {
                warn!("Can't compress archive {}: {}", archive.display(), output.stderr);
            }
        }
    }

    /// Append `<directory>/<key>` to an existing archive
    pub fn append(&self, directory: &Path, key: &str, archive: &Path) -> bool {
        let command = format!(
            "tar --append --file={} --directory {} {}",
            shell_quote(&archive.to_string_lossy()),
            shell_quote(&directory.to_string_lossy()),
            shell_quote(key)
        );
        let output = self.shell.run(&command, self.timeout);
        if output.code != 0 && output.code != TAR_FILES_DIFFER_EXIT_CODE {
            warn!("stderr from tar: {}", output.stderr);
            return false;
        }
        true
    }

    /// bzip2 tarball of a whole output directory
    pub fn create_general_archive(&self, directory: &Path, outfile: &Path) -> bool {
        if let Some(parent) = outfile.parent() {
            if let Err(e) = fs::create_dir_all(parent) {
                error!("Can't create archive directory {}: {}", parent.display(), e);
                return false;
            }
        }
        let command = format!(
            "tar jcf {} -C {} .",
            shell_quote(&outfile.to_string_lossy()),
            shell_quote(&directory.to_string_lossy())
        );
        debug!("create_general_archive: {}", command);
        let output = self.shell.run(&command, self.timeout);
        if !output.is_success() {
            error!("Can't create archive {}: {}", outfile.display(), output.stderr);
            return false;
        }
        info!("created archive {}", outfile.display());
        true
    }
}

/// NUL-terminated path list for `tar --null --files-from`
fn write_manifest<'p>(path: &Path, paths: impl Iterator<Item = &'p String>) -> Result<()> {
    let mut file = fs::File::create(path).context(format!("Can't write to file {}", path.display()))?;
    for log_path in paths {
        file.write_all(log_path.as_bytes())?;
        file.write_all(b"\0")?;
    }
    file.flush()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{HardFilter, SoftFilter};
    use crate::transport::{CommandOutput, MockRemoteExec, MockShell};
    use tempfile::TempDir;

    fn registry_with_logs(ids: &[u64]) -> NodeRegistry {
        let mut registry = NodeRegistry::new("9.0", None, SoftFilter::default());
        for id in ids {
            let mut node = Node::new(*id, &format!("10.0.0.{}", id), vec!["compute".into()], "ubuntu");
            node.filtered_logs.insert("/var/log/nova/nova-api.log".into(), 100);
            node.filtered_logs.insert("/var/log/messages".into(), 50);
            registry.admit(node, &HardFilter::default());
        }
        registry
    }

    #[test]
    fn test_archives_recorded_and_manifests_removed() {
        let temp_dir = TempDir::new().unwrap();

        let mut exec = MockRemoteExec::new();
        exec.expect_exec().returning(|request| {
            let manifest = fs::read(request.input.as_ref().unwrap()).unwrap();
            assert_eq!(manifest, b"/var/log/messages\0/var/log/nova/nova-api.log\0");
            if request.address == "10.0.0.2" {
                CommandOutput::failure(2, "tar: Exiting with failure status")
            } else {
                CommandOutput::success("")
            }
        });
        let shell = MockShell::new();

        let mut registry = registry_with_logs(&[1, 2]);
        let pipeline = ArchivePipeline::new(&exec, &shell, Dispatcher::new(None), temp_dir.path(), Duration::from_secs(5));
        let manifests: Vec<PathBuf> = registry.nodes().iter().map(|n| pipeline.manifest_path(n)).collect();

        assert_eq!(pipeline.create_log_archives(&mut registry), 1);
        assert_eq!(
            registry.nodes()[0].archive,
            Some(temp_dir.path().join("logs-node-1.tar"))
        );
        assert_eq!(registry.nodes()[1].archive, None);
        for manifest in &manifests {
            assert!(!manifest.exists());
        }
    }

    #[test]
    fn test_compression_failure_does_not_stop_later_nodes() {
        let mut registry = registry_with_logs(&[1, 2, 3]);
        for node in registry.nodes_mut() {
            node.archive = Some(PathBuf::from(format!("/archives/logs-node-{}.tar", node.id)));
        }

        let exec = MockRemoteExec::new();
        let mut shell = MockShell::new();
        shell.expect_run().times(3).returning(|command, _| {
            if command.contains("logs-node-1.tar") {
                CommandOutput::failure(1, "bzip2: No space left on device")
            } else {
                CommandOutput::success("")
            }
        });

        let pipeline = ArchivePipeline::new(&exec, &shell, Dispatcher::new(None), Path::new("/archives"), Duration::from_secs(5));
        pipeline.compress_logs(&mut registry);

        let archives: Vec<Option<PathBuf>> = registry.nodes().iter().map(|n| n.archive.clone()).collect();
        assert_eq!(
            archives,
            vec![
                Some(PathBuf::from("/archives/logs-node-1.tar")),
                Some(PathBuf::from("/archives/logs-node-2.tar.bz2")),
                Some(PathBuf::from("/archives/logs-node-3.tar.bz2")),
            ]
        );
    }

    #[test]
    fn test_append_tolerates_files_differ() {
        let exec = MockRemoteExec::new();
        let mut shell = MockShell::new();
        let mut codes = vec![0, 2, 1].into_iter();
        shell
            .expect_run()
            .times(3)
            .returning(move |_, _| CommandOutput::failure(codes.next().unwrap(), ""));

        let pipeline = ArchivePipeline::new(&exec, &shell, Dispatcher::new(None), Path::new("/archives"), Duration::from_secs(5));
        let archive = Path::new("/archives/general.tar");
        assert!(pipeline.append(Path::new("/tmp/out"), "cmds", archive));
        assert!(pipeline.append(Path::new("/tmp/out"), "cmds", archive));
        assert!(!pipeline.append(Path::new("/tmp/out"), "cmds", archive));
    }

    #[test]
    fn test_general_archive_command() {
        let temp_dir = TempDir::new().unwrap();
        let outfile = temp_dir.path().join("archives/general.tar.bz2");
        let expected = format!("tar jcf '{}' -C '/tmp/out' .", outfile.display());

        let exec = MockRemoteExec::new();
        let mut shell = MockShell::new();
        shell
            .expect_run()
            .withf(move |command, _| *command == expected)
            .returning(|_, _| CommandOutput::success(""));

        let pipeline = ArchivePipeline::new(&exec, &shell, Dispatcher::new(None), temp_dir.path(), Duration::from_secs(5));
        assert!(pipeline.create_general_archive(Path::new("/tmp/out"), &outfile));
        assert!(temp_dir.path().join("archives").is_dir());
    }
}
