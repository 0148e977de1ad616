use std::path::{Path, PathBuf};

use anyhow::{anyhow, Context, Result};
use log::{debug, error, info};
use sysinfo::{DiskExt, System, SystemExt};

use crate::nodes::NodeRegistry;

/// Free space on the filesystem holding a path
#[cfg_attr(test, mockall::automock)]
pub trait FreeSpace: Send + Sync {
    fn free_kilobytes(&self, path: &Path) -> Result<u64>;
}

/// [`FreeSpace`] backed by the mounted disks list
#[derive(Debug, Default)]
pub struct MountedDisks;

impl FreeSpace for MountedDisks {
    fn free_kilobytes(&self, path: &Path) -> Result<u64> {
        // The destination may not exist yet; measure its closest existing ancestor
        let existing = path
            .ancestors()
            .find(|p| p.exists())
            .ok_or_else(|| anyhow!("no existing ancestor for {}", path.display()))?;
        let canonical = existing
            .canonicalize()
            .context(format!("Failed to resolve {}", existing.display()))?;

        let mut system = System::new();
        system.refresh_disks_list();

        let disk = system
            .disks()
            .iter()
            .filter(|disk| canonical.starts_with(disk.mount_point()))
            .max_by_key(|disk| disk.mount_point().as_os_str().len())
            .ok_or_else(|| anyhow!("no mounted disk holds {}", canonical.display()))?;

        debug!(
            "{} is on {} ({} bytes available)",
            canonical.display(),
            disk.mount_point().display(),
            disk.available_space()
        );
        Ok(disk.available_space() / 1024)
    }
}

/// Gate archiving on the space the filtered logs will need
pub struct SpaceGuard<'a> {
    space: &'a dyn FreeSpace,
    destination: PathBuf,
}

impl<'a> SpaceGuard<'a> {
    pub fn new(space: &'a dyn FreeSpace, destination: &Path) -> Self {
        Self {
            space,
            destination: destination.to_path_buf(),
        }
    }

    /// Filtered log size over eligible nodes, in KB
    pub fn estimate(registry: &NodeRegistry) -> u64 {
        let bytes: u64 = registry
            .eligible()
            .iter()
            .map(|(_, node)| node.filtered_log_bytes())
            .sum();
        info!("Full log size on nodes (with orchestrator): {} bytes", bytes);
        bytes / 1024
    }

    /// Whether `estimate_kb * coefficient` fits in the free space
    pub fn admit(&self, estimate_kb: u64, coefficient: f64) -> bool {
        let free = match self.space.free_kilobytes(&self.destination) {
            Ok(free) => free,
            Err(e) => {
                error!("Can't get free space: {:#}", e);
                return false;
            }
        };
        info!("logsize: {} Kb, free space: {} Kb", estimate_kb, free);
        if estimate_kb as f64 * coefficient > free as f64 {
            error!("Not enough space on device");
            return false;
        }
        true
    }
}
