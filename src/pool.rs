use std::{
    sync::Arc,
    thread::{self, JoinHandle},
};

use log::{error, info};

use crate::{
    backend::Backend,
    packet::Category,
    queue_range::QueueRange,
    worker::{QueueWorker, ShutdownFlag, WorkerReport, WorkerShared, WorkerStats},
};

// 默认区间会拉起几千个线程，栈开小一点
const WORKER_STACK_SIZE: usize = 256 * 1024;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PoolReport {
    pub category: Category,
    pub range: QueueRange,
    pub spawned: usize,
    pub subscribed: usize,
    pub stats: WorkerStats,
}

/// One worker thread per queue id of a category's range.
pub struct WorkerPool {
    category: Category,
    range: QueueRange,
    handles: Vec<(u16, JoinHandle<WorkerReport>)>,
}

impl WorkerPool {
    pub fn spawn<B: Backend>(
        category: Category,
        range: QueueRange,
        backend: &Arc<B>,
        shared: &Arc<WorkerShared>,
        shutdown: &ShutdownFlag,
        seed: u64,
    ) -> Self {
        let mut handles = Vec::with_capacity(range.count());

        for queue_num in range.ids() {
            let worker = QueueWorker::new(
                queue_num,
                category,
                Arc::clone(backend),
                Arc::clone(shared),
                Arc::clone(shutdown),
                seed,
            );
            let spawned = thread::Builder::new()
                .name(format!("{category}-{queue_num}"))
                .stack_size(WORKER_STACK_SIZE)
                .spawn(move || worker.run());

            match spawned {
                Ok(handle) => handles.push((queue_num, handle)),
                Err(e) => error!("[{category}] cannot spawn worker for queue {queue_num}: {e}"),
            }
        }

        info!("[{category}] {} workers on queues {range}", handles.len());
        Self {
            category,
            range,
            handles,
        }
    }

    pub fn len(&self) -> usize {
        self.handles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handles.is_empty()
    }

    /// Blocks until every worker has closed its queue.
    pub fn join(self) -> PoolReport {
        let mut report = PoolReport {
            category: self.category,
            range: self.range,
            spawned: self.handles.len(),
            subscribed: 0,
            stats: WorkerStats::default(),
        };

        for (queue_num, handle) in self.handles {
            match handle.join() {
                Ok(worker) => {
                    if worker.subscribed {
                        report.subscribed += 1;
                    }
                    report.stats.merge(&worker.stats);
                }
                Err(_) => error!("[{}] worker for queue {} panicked", self.category, queue_num),
            }
        }
        report
    }
}
