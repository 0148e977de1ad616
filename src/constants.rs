//! Global constants for the fleet collector.
//!
//! This module centralizes all hardcoded values to improve maintainability
//! and make configuration changes easier.

// Remote execution constants
/// Exit code reported when a remote or local call exceeds its timeout
pub const TIMEOUT_EXIT_CODE: i32 = 124;

/// Process exit status for failures outside the classified fatal causes
pub const UNCLASSIFIED_FAILURE_EXIT_CODE: i32 = 8;

/// Exit code reported when the transport itself fails (connect, auth, channel)
pub const TRANSPORT_FAILURE_EXIT_CODE: i32 = 255;

/// Default per-call timeout in seconds
pub const DEFAULT_TIMEOUT_SECS: u64 = 15;

/// Timeout for the remote log inventory (`find ... du`) in seconds
pub const LOG_INVENTORY_TIMEOUT_SECS: u64 = 5;

/// Default timeout for local archive tools in seconds
pub const DEFAULT_ARCHIVE_TIMEOUT_SECS: u64 = 3600;

/// Default SSH port
pub const SSH_DEFAULT_PORT: u16 = 22;

/// Default SSH user
pub const SSH_DEFAULT_USER: &str = "root";

// Orchestrator host
/// Node id reserved for the orchestrator host
pub const ORCHESTRATOR_NODE_ID: u64 = 0;

/// Cluster id of the orchestrator host (in scope for every cluster)
pub const ORCHESTRATOR_CLUSTER_ID: u64 = 0;

/// Role label given to the orchestrator host
pub const ORCHESTRATOR_ROLE: &str = "fuel";

/// Platform of the orchestrator host
pub const ORCHESTRATOR_OS: &str = "centos";

/// Role used when the inventory carries none
pub const NO_ROLE: &str = "None";

/// Command printing the fleet release on the orchestrator
pub const DEFAULT_RELEASE_COMMAND: &str = "awk -F ':' '/release/ {print $2}' /etc/nailgun/version.yaml";

/// Command printing a node's own release
pub const DEFAULT_NODE_RELEASE_COMMAND: &str = "awk -F ':' '/fuel_version/ {print $2}' /etc/astute.yaml";

/// Command printing the node inventory as JSON on the orchestrator
pub const DEFAULT_INVENTORY_COMMAND: &str = "fuel node list --json";

// Data-source tree layers
pub const LAYER_BY_ROLE: &str = "by-role";
pub const LAYER_BY_OS: &str = "by-os";
pub const LAYER_DEFAULT: &str = "default";
pub const LAYER_ONCE_BY_ROLE: &str = "once-by-role";
pub const LAYER_RELEASE_PREFIX: &str = "release-";

/// Leading character marking an OS-specific source file
pub const OS_MARKER_PREFIX: char = '.';

// Space and archives
/// Safety margin applied to the estimated log size before archiving
pub const DEFAULT_SPACE_COEFFICIENT: f64 = 1.2;

/// Suffix of the per-node manifest file listing paths to archive
pub const MANIFEST_SUFFIX: &str = ".txt";

/// tar exit status meaning "some files differ", tolerated when appending
pub const TAR_FILES_DIFFER_EXIT_CODE: i32 = 2;

// Locks
/// Default directory for the per-category lock files
pub const DEFAULT_LOCK_DIR: &str = "/tmp";

/// Prefix of the lock file names
pub const LOCK_FILE_PREFIX: &str = "fleet-collector";

// Default output locations
pub const DEFAULT_OUTPUT_ROOT: &str = "/tmp/fleet-collector";
pub const DEFAULT_DATA_SOURCE_DIR: &str = "rq";
pub const DEFAULT_LOG_PATH: &str = "/var/log";

// Error messages
pub const ERROR_FAILED_TO_CREATE_SESSION: &str = "Failed to create SSH session";
pub const ERROR_FAILED_TO_CREATE_SFTP: &str = "Failed to create SFTP subsystem";
pub const ERROR_AUTHENTICATION_FAILED: &str = "Authentication failed";
