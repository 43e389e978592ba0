use crate::error::FailureClass;
use crate::metrics::MetricsCollector;
use crate::repository::MatchRepository;
use crate::retry::ShutdownTrigger;
use crate::types::{IngestResult, MatchPayload};
use crate::worker::IngestionWorker;
use serde::Serialize;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock};
use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinHandle;
use tracing::{debug, error, info};

pub type TaskId = u64;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "state", rename_all = "lowercase")]
pub enum TaskStatus {
    Pending,
    Running,
    Succeeded(IngestResult),
    Failed { class: FailureClass, message: String },
}

impl TaskStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, TaskStatus::Succeeded(_) | TaskStatus::Failed { .. })
    }
}

/// A message the pipeline gave up on, with everything an operator needs.
#[derive(Debug, Clone, Serialize)]
pub struct DeadLetter {
    pub task_id: TaskId,
    pub payload: MatchPayload,
    pub class: FailureClass,
    pub message: String,
}

#[derive(Debug, thiserror::Error)]
pub enum QueueError {
    #[error("ingestion queue is closed")]
    Closed,
}

struct Envelope {
    task_id: TaskId,
    payload: MatchPayload,
}

type StatusTable = Arc<RwLock<HashMap<TaskId, TaskStatus>>>;

#[derive(Debug, Clone)]
pub struct QueueSettings {
    pub workers: usize,
    pub capacity: usize,
}

impl Default for QueueSettings {
    fn default() -> Self {
        Self {
            workers: 4,
            capacity: 256,
        }
    }
}

/// Bounded queue drained by a fixed pool of tasks sharing one worker.
pub struct IngestQueue {
    sender: Option<mpsc::Sender<Envelope>>,
    statuses: StatusTable,
    next_id: AtomicU64,
    handles: Vec<JoinHandle<()>>,
    metrics: MetricsCollector,
    shutdown: Option<ShutdownTrigger>,
}

impl IngestQueue {
    pub fn start<R>(
        worker: Arc<IngestionWorker<R>>,
        settings: QueueSettings,
        dead_letters: Option<mpsc::UnboundedSender<DeadLetter>>,
    ) -> Self
    where
        R: MatchRepository + ?Sized + 'static,
    {
        let (sender, receiver) = mpsc::channel::<Envelope>(settings.capacity.max(1));
        let receiver = Arc::new(Mutex::new(receiver));
        let statuses: StatusTable = Arc::new(RwLock::new(HashMap::new()));
        let metrics = MetricsCollector::new();

        let handles = (0..settings.workers.max(1))
            .map(|n| {
                let worker = Arc::clone(&worker);
                let receiver = Arc::clone(&receiver);
                let statuses = Arc::clone(&statuses);
                let metrics = metrics.clone();
                let dead_letters = dead_letters.clone();
                tokio::spawn(async move {
                    loop {
                        let next = receiver.lock().await.recv().await;
                        let Some(envelope) = next else {
                            debug!("Ingestion task {} exiting, queue drained", n);
                            break;
                        };
                        run_one(&worker, envelope, &statuses, &metrics, dead_letters.as_ref()).await;
                    }
                })
            })
            .collect();

        info!(
            "Started ingestion queue with {} workers (capacity {})",
            settings.workers.max(1),
            settings.capacity.max(1)
        );

        Self {
            sender: Some(sender),
            statuses,
            next_id: AtomicU64::new(1),
            handles,
            metrics,
            shutdown: None,
        }
    }

    /// Registers a trigger fired by [`IngestQueue::shutdown`] so in-flight
    /// backoff sleeps end early.
    pub fn with_shutdown(mut self, trigger: ShutdownTrigger) -> Self {
        self.shutdown = Some(trigger);
        self
    }

    pub async fn submit(&self, payload: MatchPayload) -> Result<TaskId, QueueError> {
        let sender = self.sender.as_ref().ok_or(QueueError::Closed)?;
        let task_id = self.next_id.fetch_add(1, Ordering::Relaxed);
        self.set_status(task_id, TaskStatus::Pending);
        if sender.send(Envelope { task_id, payload }).await.is_err() {
            self.statuses.write().unwrap().remove(&task_id);
            return Err(QueueError::Closed);
        }
        Ok(task_id)
    }

    pub fn status(&self, task_id: TaskId) -> Option<TaskStatus> {
        self.statuses.read().unwrap().get(&task_id).cloned()
    }

    pub fn statuses(&self) -> HashMap<TaskId, TaskStatus> {
        self.statuses.read().unwrap().clone()
    }

    /// Removes and returns a finished task's status. Pending and running tasks
    /// stay tracked and yield `None`.
    pub fn forget(&self, task_id: TaskId) -> Option<TaskStatus> {
        let mut statuses = self.statuses.write().unwrap();
        if statuses.get(&task_id).map_or(false, TaskStatus::is_terminal) {
            statuses.remove(&task_id)
        } else {
            None
        }
    }

    pub fn metrics(&self) -> &MetricsCollector {
        &self.metrics
    }

    fn set_status(&self, task_id: TaskId, status: TaskStatus) {
        self.statuses.write().unwrap().insert(task_id, status);
    }

    /// Stops accepting messages and waits for queued ones to finish.
    pub async fn drain(mut self) -> HashMap<TaskId, TaskStatus> {
        self.sender.take();
        let results = futures::future::join_all(self.handles.drain(..)).await;
        for joined in results {
            if let Err(e) = joined {
                error!("Ingestion task panicked: {}", e);
            }
        }
        self.statuses()
    }

    /// Fires the shutdown signal, then drains. Messages waiting on a backoff
    /// fail as cancelled instead of sleeping out their delay.
    pub async fn shutdown(mut self) -> HashMap<TaskId, TaskStatus> {
        if let Some(trigger) = self.shutdown.take() {
            trigger.trigger();
        }
        self.drain().await
    }
}

async fn run_one<R>(
    worker: &IngestionWorker<R>,
    envelope: Envelope,
    statuses: &StatusTable,
    metrics: &MetricsCollector,
    dead_letters: Option<&mpsc::UnboundedSender<DeadLetter>>,
) where
    R: MatchRepository + ?Sized,
{
    let Envelope { task_id, payload } = envelope;
    statuses.write().unwrap().insert(task_id, TaskStatus::Running);
    let tracker = metrics.record_start();

    let status = match worker.process(&payload).await {
        Ok(result) => {
            tracker.succeeded(result.outcome);
            TaskStatus::Succeeded(result)
        }
        Err(err) => {
            let class = err.class();
            let message = err.to_string();
            error!(
                task_id,
                class = %class,
                payload = %serde_json::to_string(&payload).unwrap_or_default(),
                "Ingestion failed: {}",
                message
            );
            tracker.failed(class, message.clone());
            if let Some(dead_letters) = dead_letters {
                let letter = DeadLetter {
                    task_id,
                    payload,
                    class,
                    message: message.clone(),
                };
                if dead_letters.send(letter).is_err() {
                    error!(task_id, "Dead-letter channel closed, failure only logged");
                }
            }
            TaskStatus::Failed { class, message }
        }
    };

    statuses.write().unwrap().insert(task_id, status);
}
