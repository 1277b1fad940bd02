//! Run dispatching
//!
//! Callers submit crawl requests and get a run id back immediately. A single
//! supervised worker drains the queue in submission order, so runs never
//! overlap; a run that panics is recorded as failed and the worker moves on.

use crate::crawler::Orchestrator;
use crate::output::RunSummary;
use crate::CrawlError;
use async_trait::async_trait;
use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};
use thiserror::Error;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use uuid::Uuid;

/// A crawl to run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunRequest {
    pub retailer: String,
    pub category_url: Option<String>,
}

impl RunRequest {
    pub fn new(retailer: impl Into<String>) -> Self {
        Self {
            retailer: retailer.into(),
            category_url: None,
        }
    }

    pub fn with_category(mut self, category_url: impl Into<String>) -> Self {
        self.category_url = Some(category_url.into());
        self
    }
}

/// Receipt for a submitted run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RunHandle {
    pub id: Uuid,
}

#[derive(Debug, Clone)]
pub enum RunStatus {
    Queued,
    Running,
    Completed(RunSummary),
    Failed(String),
}

impl RunStatus {
    pub fn is_finished(&self) -> bool {
        matches!(self, RunStatus::Completed(_) | RunStatus::Failed(_))
    }
}

#[derive(Debug, Error)]
pub enum DispatchError {
    #[error("Run dispatcher has shut down")]
    Closed,
}

/// Something able to carry out a run request
#[async_trait]
pub trait RunExecutor: Send + Sync + 'static {
    async fn execute(&self, request: &RunRequest) -> Result<RunSummary, CrawlError>;
}

#[async_trait]
impl RunExecutor for Orchestrator {
    async fn execute(&self, request: &RunRequest) -> Result<RunSummary, CrawlError> {
        self.run(&request.retailer, request.category_url.as_deref())
            .await
    }
}

/// Finished runs whose status stays available by default
pub const DEFAULT_RETAINED_RUNS: usize = 64;

/// Run statuses; only the most recent finished runs are kept
struct Statuses {
    entries: HashMap<Uuid, RunStatus>,
    finished: VecDeque<Uuid>,
    retained: usize,
}

impl Statuses {
    fn new(retained: usize) -> Self {
        Self {
            entries: HashMap::new(),
            finished: VecDeque::new(),
            retained,
        }
    }

    fn set(&mut self, id: Uuid, status: RunStatus) {
        let finished = status.is_finished();
        self.entries.insert(id, status);

        if finished {
            self.finished.push_back(id);
            while self.finished.len() > self.retained {
                if let Some(evicted) = self.finished.pop_front() {
                    self.entries.remove(&evicted);
                }
            }
        }
    }
}

type StatusTable = Arc<Mutex<Statuses>>;

/// Queue-backed run dispatcher
pub struct RunDispatcher {
    sender: Mutex<Option<mpsc::UnboundedSender<(Uuid, RunRequest)>>>,
    worker: Mutex<Option<JoinHandle<()>>>,
    statuses: StatusTable,
}

impl RunDispatcher {
    /// Starts the worker task on the current runtime
    pub fn start(executor: Arc<dyn RunExecutor>) -> Self {
        Self::with_retention(executor, DEFAULT_RETAINED_RUNS)
    }

    /// Starts the worker, remembering the statuses of the last `retained` finished runs
    ///
    /// Queued and running entries are never evicted.
    pub fn with_retention(executor: Arc<dyn RunExecutor>, retained: usize) -> Self {
        let (sender, receiver) = mpsc::unbounded_channel();
        let statuses: StatusTable = Arc::new(Mutex::new(Statuses::new(retained)));
        let worker = tokio::spawn(run_worker(executor, receiver, Arc::clone(&statuses)));

        Self {
            sender: Mutex::new(Some(sender)),
            worker: Mutex::new(Some(worker)),
            statuses,
        }
    }

    /// Queues a run and returns without waiting for it
    pub fn submit(&self, request: RunRequest) -> Result<RunHandle, DispatchError> {
        let id = Uuid::new_v4();
        let sender = self.sender.lock().unwrap_or_else(|e| e.into_inner());
        let sender = sender.as_ref().ok_or(DispatchError::Closed)?;

        // Recorded before sending so the worker never sees an unknown id
        set_status(&self.statuses, id, RunStatus::Queued);
        if sender.send((id, request)).is_err() {
            self.statuses
                .lock()
                .unwrap_or_else(|e| e.into_inner())
                .entries
                .remove(&id);
            return Err(DispatchError::Closed);
        }

        tracing::info!(run_id = %id, "Run queued");
        Ok(RunHandle { id })
    }

    pub fn status(&self, id: Uuid) -> Option<RunStatus> {
        self.statuses
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .entries
            .get(&id)
            .cloned()
    }

    /// Stops accepting runs and waits for the queued ones to finish
    pub async fn shutdown(&self) {
        drop(self.sender.lock().unwrap_or_else(|e| e.into_inner()).take());
        let worker = self.worker.lock().unwrap_or_else(|e| e.into_inner()).take();
        if let Some(worker) = worker {
            if let Err(e) = worker.await {
                tracing::error!("Run dispatcher worker terminated abnormally: {}", e);
            }
        }
    }
}

async fn run_worker(
    executor: Arc<dyn RunExecutor>,
    mut receiver: mpsc::UnboundedReceiver<(Uuid, RunRequest)>,
    statuses: StatusTable,
) {
    while let Some((id, request)) = receiver.recv().await {
        set_status(&statuses, id, RunStatus::Running);
        tracing::info!(run_id = %id, retailer = %request.retailer, "Run started");

        // Each run gets its own task so a panic only fails that run
        let executor = Arc::clone(&executor);
        let outcome = tokio::spawn(async move { executor.execute(&request).await }).await;

        let status = match outcome {
            Ok(Ok(summary)) => {
                tracing::info!(
                    run_id = %id,
                    succeeded = summary.succeeded,
                    failed = summary.failed,
                    "Run completed"
                );
                RunStatus::Completed(summary)
            }
            Ok(Err(e)) => {
                tracing::error!(run_id = %id, "Run failed: {}", e);
                RunStatus::Failed(e.to_string())
            }
            Err(e) => {
                tracing::error!(run_id = %id, "Run aborted: {}", e);
                RunStatus::Failed(format!("run aborted: {}", e))
            }
        };
        set_status(&statuses, id, status);
    }

    tracing::debug!("Run dispatcher queue closed");
}

fn set_status(statuses: &StatusTable, id: Uuid, status: RunStatus) {
    statuses
        .lock()
        .unwrap_or_else(|e| e.into_inner())
        .set(id, status);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::output::sample_summary;
    use std::time::Duration;
    use tokio::sync::Semaphore;

    /// Executor that waits for a permit per run and fails or panics on request
    struct GatedExecutor {
        gate: Semaphore,
        order: Mutex<Vec<String>>,
    }

    impl GatedExecutor {
        fn new(permits: usize) -> Arc<Self> {
            Arc::new(Self {
                gate: Semaphore::new(permits),
                order: Mutex::new(Vec::new()),
            })
        }
    }

    #[async_trait]
    impl RunExecutor for GatedExecutor {
        async fn execute(&self, request: &RunRequest) -> Result<RunSummary, CrawlError> {
            self.gate.acquire().await.unwrap().forget();
            self.order.lock().unwrap().push(request.retailer.clone());

            match request.retailer.as_str() {
                "broken" => Err(CrawlError::Worker("browser crashed".to_string())),
                "panicky" => panic!("adapter bug"),
                retailer => {
                    let mut summary = sample_summary();
                    summary.retailer = retailer.to_string();
                    summary.category_url = request.category_url.clone().unwrap_or_default();
                    Ok(summary)
                }
            }
        }
    }

    async fn wait_until<F: Fn() -> bool>(condition: F) {
        for _ in 0..200 {
            if condition() {
                return;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        panic!("condition not reached");
    }

    #[tokio::test]
    async fn test_submit_returns_before_run_finishes() {
        let executor = GatedExecutor::new(0);
        let dispatcher = RunDispatcher::start(executor.clone());

        let first = dispatcher.submit(RunRequest::new("ikea")).unwrap();
        let second = dispatcher.submit(RunRequest::new("wayfair")).unwrap();
        assert_ne!(first.id, second.id);

        wait_until(|| matches!(dispatcher.status(first.id), Some(RunStatus::Running))).await;
        assert!(matches!(dispatcher.status(second.id), Some(RunStatus::Queued)));

        executor.gate.add_permits(2);
        dispatcher.shutdown().await;

        match dispatcher.status(first.id) {
            Some(RunStatus::Completed(summary)) => assert_eq!(summary.retailer, "ikea"),
            other => panic!("unexpected status {:?}", other),
        }
        assert!(dispatcher.status(second.id).unwrap().is_finished());
        assert_eq!(*executor.order.lock().unwrap(), vec!["ikea", "wayfair"]);
    }

    #[tokio::test]
    async fn test_category_is_passed_through() {
        let dispatcher = RunDispatcher::start(GatedExecutor::new(1));
        let handle = dispatcher
            .submit(RunRequest::new("ikea").with_category("https://www.ikea.com/us/en/cat/beds-bm003/"))
            .unwrap();
        dispatcher.shutdown().await;

        match dispatcher.status(handle.id) {
            Some(RunStatus::Completed(summary)) => {
                assert_eq!(summary.category_url, "https://www.ikea.com/us/en/cat/beds-bm003/")
            }
            other => panic!("unexpected status {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_failed_and_panicking_runs_do_not_stop_worker() {
        let dispatcher = RunDispatcher::start(GatedExecutor::new(3));

        let broken = dispatcher.submit(RunRequest::new("broken")).unwrap();
        let panicky = dispatcher.submit(RunRequest::new("panicky")).unwrap();
        let healthy = dispatcher.submit(RunRequest::new("ikea")).unwrap();
        dispatcher.shutdown().await;

        match dispatcher.status(broken.id) {
            Some(RunStatus::Failed(message)) => assert!(message.contains("browser crashed")),
            other => panic!("unexpected status {:?}", other),
        }
        assert!(matches!(dispatcher.status(panicky.id), Some(RunStatus::Failed(_))));
        assert!(matches!(dispatcher.status(healthy.id), Some(RunStatus::Completed(_))));
    }

    #[tokio::test]
    async fn test_old_finished_runs_are_forgotten() {
        let dispatcher = RunDispatcher::with_retention(GatedExecutor::new(3), 2);

        let handles: Vec<RunHandle> = ["ikea", "wayfair", "ikea"]
            .into_iter()
            .map(|retailer| dispatcher.submit(RunRequest::new(retailer)).unwrap())
            .collect();
        dispatcher.shutdown().await;

        assert!(dispatcher.status(handles[0].id).is_none());
        assert!(matches!(dispatcher.status(handles[1].id), Some(RunStatus::Completed(_))));
        assert!(matches!(dispatcher.status(handles[2].id), Some(RunStatus::Completed(_))));
    }

    #[tokio::test]
    async fn test_queued_runs_survive_retention_limit() {
        let executor = GatedExecutor::new(1);
        let dispatcher = RunDispatcher::with_retention(executor.clone(), 1);

        let done = dispatcher.submit(RunRequest::new("ikea")).unwrap();
        wait_until(|| matches!(dispatcher.status(done.id), Some(RunStatus::Completed(_)))).await;

        let running = dispatcher.submit(RunRequest::new("wayfair")).unwrap();
        let queued = dispatcher.submit(RunRequest::new("ikea")).unwrap();
        wait_until(|| matches!(dispatcher.status(running.id), Some(RunStatus::Running))).await;

        assert!(matches!(dispatcher.status(done.id), Some(RunStatus::Completed(_))));
        assert!(matches!(dispatcher.status(queued.id), Some(RunStatus::Queued)));

        executor.gate.add_permits(2);
        dispatcher.shutdown().await;
        assert!(dispatcher.status(done.id).is_none());
        assert!(dispatcher.status(running.id).is_none());
        assert!(dispatcher.status(queued.id).unwrap().is_finished());
    }

    #[tokio::test]
    async fn test_submit_after_shutdown_is_rejected() {
        let dispatcher = RunDispatcher::start(GatedExecutor::new(0));
        dispatcher.shutdown().await;

        assert!(matches!(
            dispatcher.submit(RunRequest::new("ikea")),
            Err(DispatchError::Closed)
        ));
        assert!(dispatcher.status(Uuid::new_v4()).is_none());
    }
}
