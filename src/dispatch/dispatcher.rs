use std::path::Path;

use crossbeam::channel::unbounded;
use log::{debug, error, info, warn};

use crate::dispatch::FileLock;
use crate::models::Category;
use crate::nodes::Node;

/// Outcome of one fan-out
#[derive(Debug)]
pub struct Dispatch<T> {
    /// Worker threads started
    pub started: usize,
    /// The category lock was held elsewhere and nothing ran
    pub lock_skipped: bool,
    /// Per-node results, sorted by registry slot
    pub results: Vec<(usize, T)>,
}

impl<T> Dispatch<T> {
    fn empty(lock_skipped: bool) -> Self {
        Self {
            started: 0,
            lock_skipped,
            results: Vec::new(),
        }
    }
}

/// Bounded worker pool running one operation per node.
///
/// Workers only read their node and return a value; the caller applies the
/// results to the registry once every worker has joined.
#[derive(Debug, Clone, Copy, Default)]
pub struct Dispatcher {
    max_workers: Option<usize>,
}

impl Dispatcher {
    /// `None` starts one worker per target node
    pub fn new(max_workers: Option<usize>) -> Self {
        Self {
            max_workers: max_workers.filter(|n| *n > 0),
        }
    }

    pub fn worker_count(&self, targets: usize) -> usize {
        match self.max_workers {
            Some(cap) => cap.min(targets),
            None => targets,
        }
    }

    pub fn dispatch<T, F>(
        &self,
        category: Category,
        targets: Vec<(usize, &Node)>,
        lock: Option<&Path>,
        op: F,
    ) -> Dispatch<T>
    where
        T: Send,
        F: Fn(&Node) -> T + Sync,
    {
        if targets.is_empty() {
            debug!("{}: no eligible nodes", category);
            return Dispatch::empty(false);
        }

        let _guard = match lock {
            Some(path) => match FileLock::try_acquire(path) {
                Ok(Some(guard)) => Some(guard),
                Ok(None) => {
                    warn!("Unable to obtain lock {}, skipping \"{}\"-part", path.display(), category);
                    return Dispatch::empty(true);
                }
                Err(e) => {
                    warn!("Unable to open lock {}: {}, skipping \"{}\"-part", path.display(), e, category);
                    return Dispatch::empty(true);
                }
            },
            None => None,
        };

        let worker_count = self.worker_count(targets.len());
        let (job_tx, job_rx) = unbounded::<(usize, &Node)>();
        let (result_tx, result_rx) = unbounded::<(usize, T)>();
        for job in targets {
            // The receiver is alive until the scope below ends
            let _ = job_tx.send(job);
        }
        drop(job_tx);

        let op = &op;
        let mut started = 0;
        let scope_result = crossbeam::scope(|scope| {
            for i in 0..worker_count {
                let jobs = job_rx.clone();
                let results = result_tx.clone();
                let spawned = scope
                    .builder()
                    .name(format!("{}-{}", category, i))
                    .spawn(move |_| {
                        for (slot, node) in jobs.iter() {
                            let _ = results.send((slot, op(node)));
                        }
                    });
                match spawned {
                    Ok(_) => started += 1,
                    Err(e) => error!("Failed to start {} worker {}: {}", category, i, e),
                }
            }
        });
        if scope_result.is_err() {
            error!("a {} worker panicked; its node has no result", category);
        }
        drop(result_tx);

        let mut results: Vec<(usize, T)> = result_rx.try_iter().collect();
        results.sort_by_key(|(slot, _)| *slot);
        info!("{}: {} workers finished, {} results", category, started, results.len());

        Dispatch {
            started,
            lock_skipped: false,
            results,
        }
    }
}
