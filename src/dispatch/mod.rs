//! Concurrent per-node fan-out under an optional category lock.

mod dispatcher;
mod lock;

pub use dispatcher::{Dispatch, Dispatcher};
pub use lock::FileLock;
