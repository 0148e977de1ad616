//! Remote log inventory and the include/exclude filter applied to it.

pub mod filter;
pub mod inventory;

pub use filter::LogFilter;
pub use inventory::{parse_du_output, total_size, LogEntry};
