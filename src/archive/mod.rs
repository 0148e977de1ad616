//! Space admission and log archive packaging.

mod pipeline;
mod space;

pub use pipeline::ArchivePipeline;
pub use space::{FreeSpace, MountedDisks, SpaceGuard};

#[cfg(test)]
pub use space::MockFreeSpace;
