//! Fleet inventory and node lifecycle.
//!
//! Nodes are created once from an inventory snapshot, admitted through the
//! hard filter, then mutated in place by each phase of the run through the
//! [`NodeRegistry`]. Workers never touch the registry directly; they return
//! per-node results that the coordinator applies by slot index.

mod node;
pub mod inventory;
pub mod registry;

pub use inventory::{InventoryRecord, RolesField};
pub use node::Node;
pub use registry::{InventorySource, NodeRegistry, passes_hard_filter};
