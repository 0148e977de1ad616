//! Data-source bundle: the on-disk definitions of what to collect.
//!
//! [`DataSourceTree`] scans the bundle once, [`DataSourceResolver`] turns it
//! into a per-node, per-category list of [`SourcePath`] values.

mod resolver;
mod source_path;
mod tree;

pub use resolver::DataSourceResolver;
pub use source_path::{Layer, OutputLocation, SourcePath};
pub use tree::DataSourceTree;
