//! Shared-memory worker pool
//!
//! The pool runs the partition-level regime on OS threads. Each worker pulls
//! item indices from its share of the [`WorkSchedule`], reduces every item
//! it owns with the [`LocalReducer`](crate::reduce::LocalReducer) and places
//! the finished result into a per-item [`ResultCollector`]. Workers never
//! combine results with each other: every entity is owned by exactly one
//! worker.
//!
//! The work-item list and the record source are shared read-only through
//! `Arc`. Joining every worker handle is the barrier after which the
//! collector is read on the calling thread.
//!
//! # Example
//!
//! ```
//! use wxreduce::partition::{PartitionPlanner, PartitionPolicy};
//! use wxreduce::source::memory::MemorySource;
//! use wxreduce::source::Record;
//! use wxreduce::worker::WorkerPool;
//! use std::sync::Arc;
//!
//! let (source, items) = MemorySource::with_entities(vec![
//!     ("Oslo", vec![Record::new(Some(3.0), None, Some(0))]),
//!     ("Rome", vec![Record::new(Some(18.0), Some(1.0), Some(0))]),
//! ]);
//!
//! let pool = WorkerPool::new(PartitionPlanner::new(PartitionPolicy::Dynamic, 2, 1));
//! let outcome = pool.run(Arc::new(items), Arc::new(source))?;
//!
//! assert_eq!(outcome.results[0].entity, "Oslo");
//! assert_eq!(outcome.results[1].stats.max, 18.0);
//! # Ok::<(), anyhow::Error>(())
//! ```

use crate::collector::{EntityResult, ResultCollector};
use crate::error::ReduceError;
use crate::partition::{Assignment, PartitionPlanner, WorkSchedule};
use crate::reduce::reduce_item;
use crate::source::{RecordSource, WorkItem};
use crate::Result;
use anyhow::anyhow;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info};

/// One pool worker
pub struct Worker<S: ?Sized> {
    id: usize,
    items: Arc<Vec<WorkItem>>,
    source: Arc<S>,
}

/// What one worker did
#[derive(Debug, Clone)]
pub struct WorkerReport {
    pub worker_id: usize,
    /// Item indices in the order this worker processed them
    pub items: Vec<usize>,
    pub records: u64,
    pub elapsed: Duration,
}

impl<S: RecordSource + ?Sized> Worker<S> {
    pub fn new(id: usize, items: Arc<Vec<WorkItem>>, source: Arc<S>) -> Self {
        Self { id, items, source }
    }

    pub fn id(&self) -> usize {
        self.id
    }

    /// Reduce every item of `indices` and place it into `collector`
    ///
    /// The collector must have one source per item, so the slot of an item is
    /// its index.
    pub fn run<I>(&self, indices: I, collector: &ResultCollector) -> std::result::Result<WorkerReport, ReduceError>
    where
        I: IntoIterator<Item = usize>,
    {
        let start = Instant::now();
        let mut processed = Vec::new();
        let mut records = 0;

        for index in indices {
            let Some(item) = self.items.get(index) else {
                return Err(ReduceError::UnknownSource {
                    source_id: index,
                    sources: self.items.len(),
                });
            };
            let stats = reduce_item(self.source.as_ref(), item);
            records += stats.total_records;
            collector.place(index, 0, EntityResult::new(item.entity.clone(), stats))?;
            processed.push(index);
        }

        Ok(WorkerReport {
            worker_id: self.id,
            items: processed,
            records,
            elapsed: start.elapsed(),
        })
    }
}

/// Result of one pool run
#[derive(Debug)]
pub struct PoolOutcome {
    /// Results in work-item order
    pub results: Vec<EntityResult>,
    /// Per-worker reports, indexed by worker id
    pub reports: Vec<WorkerReport>,
}

impl PoolOutcome {
    /// Which worker actually processed which items
    ///
    /// For pull-based policies this is only known after the run.
    pub fn assignment(&self) -> Assignment {
        Assignment::from_workers(self.reports.iter().map(|r| r.items.clone()).collect())
    }
}

/// Thread pool running the partition-level regime
#[derive(Debug, Clone, Copy)]
pub struct WorkerPool {
    planner: PartitionPlanner,
}

impl WorkerPool {
    pub fn new(planner: PartitionPlanner) -> Self {
        Self { planner }
    }

    pub fn threads(&self) -> usize {
        self.planner.workers()
    }

    /// Reduce every work item on the pool
    ///
    /// # Returns
    ///
    /// One result per item, in item order, whatever the policy and however
    /// the threads were scheduled.
    pub fn run<S>(&self, items: Arc<Vec<WorkItem>>, source: Arc<S>) -> Result<PoolOutcome>
    where
        S: RecordSource + ?Sized + 'static,
    {
        let threads = self.planner.workers();
        let schedule = Arc::new(self.planner.plan(items.len()));
        let collector = Arc::new(ResultCollector::per_item(items.len())?);

        info!(
            items = items.len(),
            threads,
            policy = %self.planner.policy(),
            "starting worker pool"
        );

        let mut handles = Vec::with_capacity(threads);
        for worker_id in 0..threads {
            let worker = Worker::new(worker_id, Arc::clone(&items), Arc::clone(&source));
            let schedule = Arc::clone(&schedule);
            let collector = Arc::clone(&collector);

            let handle = std::thread::Builder::new()
                .name(format!("wxreduce-worker-{worker_id}"))
                .spawn(move || worker.run(schedule.worker_iter(worker_id), &collector))?;
            handles.push(handle);
        }

        let mut reports = Vec::with_capacity(threads);
        for handle in handles {
            let report = handle
                .join()
                .map_err(|_| anyhow!("Worker thread panicked"))??;
            debug!(
                worker = report.worker_id,
                items = report.items.len(),
                records = report.records,
                elapsed_ms = report.elapsed.as_millis() as u64,
                "worker finished"
            );
            reports.push(report);
        }

        let collector = Arc::try_unwrap(collector)
            .map_err(|_| anyhow!("Result collector still shared after all workers joined"))?;
        let results = collector.finish()?;

        if let WorkSchedule::Static(assignment) = schedule.as_ref() {
            debug_assert!(assignment.is_partition(items.len()));
        }

        Ok(PoolOutcome { results, reports })
    }
}
