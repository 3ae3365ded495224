//! Fixed-size worker pool running whole queries.
//!
//! Workers share one bounded job receiver behind a mutex. Each job runs the
//! complete pipeline on its worker thread; finished jobs are sent back on an
//! unbounded result channel tagged with the caller's job id.

use std::sync::mpsc::{self, Receiver, Sender, SyncSender};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use parking_lot::Mutex;
use tracing::{debug, warn};

use crate::engine::FusionEngine;
use crate::progress::CancellationToken;
use crate::request::{QueryOutcome, Request};
use crate::types::{FusionError, FusionResult};

/// Caller-assigned job identifier
pub type JobId = u64;

/// A query waiting for a worker.
#[derive(Debug, Clone)]
pub struct Job {
    pub id: JobId,
    pub request: Request,
    pub cancel: CancellationToken,
}

impl Job {
    pub fn new(id: JobId, request: Request) -> Self {
        Self {
            id,
            request,
            cancel: CancellationToken::new(),
        }
    }
}

/// What a worker produced for one job.
#[derive(Debug)]
pub struct JobResult {
    pub id: JobId,
    pub outcome: FusionResult<QueryOutcome>,
}

/// Worker threads sharing one [`FusionEngine`].
///
/// # Examples
///
/// ```rust
/// use std::sync::Arc;
/// use netfuse_core::data::InMemoryDataset;
/// use netfuse_core::engine::FusionEngine;
/// use netfuse_core::pool::{Job, QueryPool};
/// use netfuse_core::request::Request;
/// use netfuse_core::types::{NetworkInfo, OrganismRef};
///
/// let org = OrganismRef::core(1);
/// let dataset = InMemoryDataset::new()
///     .with_nodes(&org, vec![1, 2, 3])
///     .with_network(&org, NetworkInfo::new(1, 1, "n").with_default(), vec![(1, 2, 1.0)]);
/// let engine = Arc::new(FusionEngine::new(Arc::new(dataset)));
///
/// let pool = QueryPool::new(engine, 2, 4)?;
/// pool.submit(Job::new(7, Request::new(org, vec![1])))?;
/// let results = pool.finish();
/// assert_eq!(results[0].id, 7);
/// # Ok::<(), netfuse_core::types::FusionError>(())
/// ```
pub struct QueryPool {
    jobs: Option<SyncSender<Job>>,
    results: Receiver<JobResult>,
    workers: Vec<JoinHandle<()>>,
}

impl QueryPool {
    /// Start `workers` threads with room for `queue_depth` pending jobs.
    ///
    /// # Errors
    ///
    /// Returns [`FusionError::Config`] for zero workers and
    /// [`FusionError::Io`] if a thread cannot be spawned.
    pub fn new(engine: Arc<FusionEngine>, workers: usize, queue_depth: usize) -> FusionResult<Self> {
        if workers == 0 {
            return Err(FusionError::Config("query pool needs at least one worker".to_string()));
        }

        let (job_tx, job_rx) = mpsc::sync_channel::<Job>(queue_depth);
        let (result_tx, result_rx) = mpsc::channel::<JobResult>();
        let job_rx = Arc::new(Mutex::new(job_rx));

        let handles = (0..workers)
            .map(|worker| {
                let engine = Arc::clone(&engine);
                let jobs = Arc::clone(&job_rx);
                let results = result_tx.clone();
                thread::Builder::new()
                    .name(format!("netfuse-worker-{worker}"))
                    .spawn(move || run_worker(worker, &engine, &jobs, &results))
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self {
            jobs: Some(job_tx),
            results: result_rx,
            workers: handles,
        })
    }

    #[must_use]
    pub fn worker_count(&self) -> usize {
        self.workers.len()
    }

    /// Queue a job, blocking while the queue is full.
    ///
    /// # Errors
    ///
    /// Returns [`FusionError::InvalidRequest`] if every worker has exited.
    pub fn submit(&self, job: Job) -> FusionResult<()> {
        let id = job.id;
        self.jobs
            .as_ref()
            .ok_or_else(|| FusionError::InvalidRequest("query pool is shut down".to_string()))?
            .send(job)
            .map_err(|_| FusionError::InvalidRequest(format!("no worker left to run job {id}")))
    }

    /// Next finished job, blocking until one arrives.
    ///
    /// Returns `None` once the pool has no workers left.
    pub fn recv(&self) -> Option<JobResult> {
        self.results.recv().ok()
    }

    /// Stop accepting jobs, wait for the queue to drain and return every
    /// result not yet received, ordered by job id.
    #[must_use]
    pub fn finish(mut self) -> Vec<JobResult> {
        self.shutdown();
        let mut results: Vec<JobResult> = self.results.try_iter().collect();
        results.sort_by_key(|result| result.id);
        results
    }

    fn shutdown(&mut self) {
        self.jobs = None;
        for handle in self.workers.drain(..) {
            if handle.join().is_err() {
                warn!("query worker panicked");
            }
        }
    }
}

impl Drop for QueryPool {
    fn drop(&mut self) {
        self.shutdown();
    }
}

impl std::fmt::Debug for QueryPool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("QueryPool")
            .field("workers", &self.workers.len())
            .field("open", &self.jobs.is_some())
            .finish()
    }
}

fn run_worker(worker: usize, engine: &FusionEngine, jobs: &Mutex<Receiver<Job>>, results: &Sender<JobResult>) {
    loop {
        // hold the lock only while waiting for the next job
        let next = jobs.lock().recv();
        let Ok(job) = next else {
            break;
        };
        debug!(worker, job = job.id, "job started");
        let outcome = engine.execute(&job.request, &job.cancel);
        if results.send(JobResult { id: job.id, outcome }).is_err() {
            break;
        }
    }
    debug!(worker, "worker exiting");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::InMemoryDataset;
    use crate::types::{NetworkInfo, OrganismRef};

    fn engine() -> (OrganismRef, Arc<FusionEngine>) {
        let org = OrganismRef::core(1);
        let dataset = InMemoryDataset::new()
            .with_nodes(&org, (1..=5).collect())
            .with_network(
                &org,
                NetworkInfo::new(1, 1, "chain").with_default(),
                vec![(1, 2, 1.0), (2, 3, 1.0), (3, 4, 1.0), (4, 5, 1.0)],
            );
        (org, Arc::new(FusionEngine::new(Arc::new(dataset))))
    }

    #[test]
    fn test_every_job_reports_once() {
        let (org, engine) = engine();
        let pool = QueryPool::new(engine, 3, 2).unwrap();
        for id in 0..20 {
            let positive = (id % 5) as i64 + 1;
            pool.submit(Job::new(id, Request::new(org.clone(), vec![positive]))).unwrap();
        }
        let results = pool.finish();
        let ids: Vec<JobId> = results.iter().map(|r| r.id).collect();
        assert_eq!(ids, (0..20).collect::<Vec<_>>());
        assert!(results.iter().all(|r| matches!(r.outcome, Ok(QueryOutcome::Completed(_)))));
    }

    #[test]
    fn test_errors_and_cancellation_are_per_job() {
        let (org, engine) = engine();
        let pool = QueryPool::new(engine, 2, 4).unwrap();
        let cancelled = Job::new(1, Request::new(org.clone(), vec![1]));
        cancelled.cancel.cancel();
        pool.submit(cancelled).unwrap();
        pool.submit(Job::new(2, Request::new(org.clone(), vec![404]))).unwrap();
        pool.submit(Job::new(3, Request::new(org.clone(), vec![2]))).unwrap();
        let combine = Request::new(org, vec![2]).with_task(crate::request::QueryTask::CombineNetworks);
        pool.submit(Job::new(4, combine)).unwrap();

        let results = pool.finish();
        assert!(matches!(results[0].outcome, Ok(QueryOutcome::Cancelled)));
        assert!(matches!(results[1].outcome, Err(FusionError::InvalidRequest(_))));
        assert!(matches!(results[2].outcome, Ok(QueryOutcome::Completed(_))));
        assert!(matches!(&results[3].outcome, Ok(QueryOutcome::Combined(network)) if network.interactions.len() == 4));
    }

    #[test]
    fn test_recv_streams_results() {
        let (org, engine) = engine();
        let pool = QueryPool::new(engine, 1, 1).unwrap();
        pool.submit(Job::new(9, Request::new(org, vec![3]))).unwrap();
        let result = pool.recv().unwrap();
        assert_eq!(result.id, 9);
        assert!(pool.finish().is_empty());
    }

    #[test]
    fn test_zero_workers_rejected() {
        let (_, engine) = engine();
        assert!(matches!(QueryPool::new(engine, 0, 1), Err(FusionError::Config(_))));
    }
}
