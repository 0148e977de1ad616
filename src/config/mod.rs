// Re-export all items from the submodules
mod collection_config;
mod filters;
mod log_filter;

pub use collection_config::{Conf, SshConf, load_or_create_conf};

pub use filters::{HardFilter, NodeIdMatch, SoftFilter};

pub use log_filter::{FilterBlock, LogFilesConf, LogFilterSpec};
