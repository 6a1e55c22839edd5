//! In-memory payment job queue.
//!
//! Requests accepted on the async endpoint are pushed onto a bounded channel and
//! processed one at a time by [`PaymentJobWorker`]. Job state lives in a
//! [`JobTracker`] shared with the status endpoint and is lost on restart.

use crate::payments::error::PaymentError;
use crate::payments::types::{CreatePaymentRequest, GatewayKind};
use crate::services::create_payment::{CreatePaymentError, PaymentService};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, watch, RwLock};
use tracing::{error, info, instrument, warn};
use uuid::Uuid;

// ---------------------------------------------------------------------------
// Error Types
// ---------------------------------------------------------------------------

#[derive(Debug, thiserror::Error)]
pub enum JobError {
    #[error("job {job_id} not found")]
    NotFound { job_id: String },

    #[error("payment job queue is closed")]
    QueueClosed,

    #[error("payment job queue stayed full for {timeout_ms}ms")]
    EnqueueTimeout { timeout_ms: u64 },

    #[error("job {job_id} cannot move from {from} to {to}")]
    InvalidTransition {
        job_id: String,
        from: JobStatus,
        to: JobStatus,
    },
}

// ---------------------------------------------------------------------------
// State Machine
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    Queued,
    Processing,
    Done,
    Error,
}

impl JobStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobStatus::Queued => "queued",
            JobStatus::Processing => "processing",
            JobStatus::Done => "done",
            JobStatus::Error => "error",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, JobStatus::Done | JobStatus::Error)
    }

    /// Queued -> Processing -> {Done, Error}. Terminal states never move.
    pub fn can_transition_to(&self, next: &JobStatus) -> bool {
        match (self, next) {
            (JobStatus::Queued, JobStatus::Processing) => true,
            (JobStatus::Processing, JobStatus::Done) => true,
            (JobStatus::Processing, JobStatus::Error) => true,
            _ => false,
        }
    }
}

impl std::fmt::Display for JobStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Job {
    pub id: String,
    pub gateway: GatewayKind,
    pub status: JobStatus,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<JsonValue>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Job {
    fn queued(id: String, gateway: GatewayKind) -> Self {
        let now = Utc::now();
        Self {
            id,
            gateway,
            status: JobStatus::Queued,
            message: "payment request queued".to_string(),
            data: None,
            error: None,
            created_at: now,
            updated_at: now,
        }
    }
}

/// Outcome written when a job leaves `Processing`.
#[derive(Debug, Clone)]
pub enum JobUpdate {
    Processing,
    Done { data: JsonValue },
    Failed { error: String },
}

impl JobUpdate {
    fn status(&self) -> JobStatus {
        match self {
            JobUpdate::Processing => JobStatus::Processing,
            JobUpdate::Done { .. } => JobStatus::Done,
            JobUpdate::Failed { .. } => JobStatus::Error,
        }
    }
}

// ---------------------------------------------------------------------------
// Tracker
// ---------------------------------------------------------------------------

#[derive(Debug, Default)]
pub struct JobTracker {
    jobs: RwLock<HashMap<String, Job>>,
}

impl JobTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn insert(&self, job: Job) {
        self.jobs.write().await.insert(job.id.clone(), job);
    }

    pub async fn get(&self, job_id: &str) -> Option<Job> {
        self.jobs.read().await.get(job_id).cloned()
    }

    pub async fn remove(&self, job_id: &str) -> Option<Job> {
        self.jobs.write().await.remove(job_id)
    }

    pub async fn len(&self) -> usize {
        self.jobs.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.jobs.read().await.is_empty()
    }

    pub async fn apply(&self, job_id: &str, update: JobUpdate) -> Result<Job, JobError> {
        let mut jobs = self.jobs.write().await;
        let job = jobs.get_mut(job_id).ok_or_else(|| JobError::NotFound {
            job_id: job_id.to_string(),
        })?;

        let next = update.status();
        if !job.status.can_transition_to(&next) {
            return Err(JobError::InvalidTransition {
                job_id: job_id.to_string(),
                from: job.status,
                to: next,
            });
        }

        match update {
            JobUpdate::Processing => {
                job.message = "payment request is being processed".to_string();
            }
            JobUpdate::Done { data } => {
                job.message = "payment request created".to_string();
                job.data = Some(data);
            }
            JobUpdate::Failed { error } => {
                job.message = "payment request failed".to_string();
                job.error = Some(error);
            }
        }
        job.status = next;
        job.updated_at = Utc::now();

        Ok(job.clone())
    }
}

// ---------------------------------------------------------------------------
// Queue
// ---------------------------------------------------------------------------

#[derive(Debug)]
pub struct QueuedPayment {
    pub job_id: String,
    pub gateway: GatewayKind,
    pub request: CreatePaymentRequest,
}

#[derive(Clone)]
pub struct JobQueue {
    sender: mpsc::Sender<QueuedPayment>,
    tracker: Arc<JobTracker>,
}

impl JobQueue {
    /// Returns the producer handle and the receiver the worker consumes.
    pub fn new(capacity: usize, tracker: Arc<JobTracker>) -> (Self, mpsc::Receiver<QueuedPayment>) {
        let (sender, receiver) = mpsc::channel(capacity.max(1));
        (Self { sender, tracker }, receiver)
    }

    pub fn tracker(&self) -> &Arc<JobTracker> {
        &self.tracker
    }

    /// Waits for room in the channel, then records the job as queued.
    #[instrument(skip(self, request), fields(reference_id = %request.reference_id))]
    pub async fn enqueue(
        &self,
        gateway: GatewayKind,
        request: CreatePaymentRequest,
    ) -> Result<String, JobError> {
        let permit = match self.sender.reserve().await {
            Ok(permit) => permit,
            Err(_) => {
                error!("payment job queue closed, job dropped");
                return Err(JobError::QueueClosed);
            }
        };

        Ok(self.dispatch(permit, gateway, request).await)
    }

    /// Like [`enqueue`](Self::enqueue) but gives up when the queue stays full.
    pub async fn enqueue_with_timeout(
        &self,
        gateway: GatewayKind,
        request: CreatePaymentRequest,
        timeout: Duration,
    ) -> Result<String, JobError> {
        let permit = match tokio::time::timeout(timeout, self.sender.reserve()).await {
            Ok(Ok(permit)) => permit,
            Ok(Err(_)) => return Err(JobError::QueueClosed),
            Err(_) => {
                warn!(timeout_ms = timeout.as_millis() as u64, "payment job queue full");
                return Err(JobError::EnqueueTimeout {
                    timeout_ms: timeout.as_millis() as u64,
                });
            }
        };

        Ok(self.dispatch(permit, gateway, request).await)
    }

    // The tracker insert is the only await after the slot is held, and it
    // writes nothing until it completes, so a dropped caller leaves no job behind.
    async fn dispatch(
        &self,
        permit: mpsc::Permit<'_, QueuedPayment>,
        gateway: GatewayKind,
        request: CreatePaymentRequest,
    ) -> String {
        let job_id = Uuid::new_v4().to_string();
        self.tracker
            .insert(Job::queued(job_id.clone(), gateway))
            .await;
        permit.send(QueuedPayment {
            job_id: job_id.clone(),
            gateway,
            request,
        });

        info!(job_id = %job_id, gateway = %gateway, "payment job queued");
        job_id
    }

    pub async fn get_status(&self, job_id: &str) -> Option<Job> {
        self.tracker.get(job_id).await
    }
}

// ---------------------------------------------------------------------------
// Worker
// ---------------------------------------------------------------------------

/// Single consumer of the payment job queue.
pub struct PaymentJobWorker {
    receiver: mpsc::Receiver<QueuedPayment>,
    tracker: Arc<JobTracker>,
    payments: PaymentService,
}

impl PaymentJobWorker {
    pub fn new(
        receiver: mpsc::Receiver<QueuedPayment>,
        tracker: Arc<JobTracker>,
        payments: PaymentService,
    ) -> Self {
        Self {
            receiver,
            tracker,
            payments,
        }
    }

    pub async fn run(mut self, mut shutdown_rx: watch::Receiver<bool>) {
        info!("Starting payment job worker...");

        loop {
            tokio::select! {
                item = self.receiver.recv() => {
                    match item {
                        Some(item) => self.process(item).await,
                        None => {
                            info!("Payment job queue closed");
                            break;
                        }
                    }
                }
                _ = shutdown_rx.changed() => {
                    if *shutdown_rx.borrow() {
                        info!("Payment job worker received shutdown signal");
                        break;
                    }
                }
            }
        }

        info!("Payment job worker stopped");
    }

    #[instrument(skip(self, item), fields(job_id = %item.job_id, gateway = %item.gateway))]
    async fn process(&self, item: QueuedPayment) {
        if let Err(e) = self.tracker.apply(&item.job_id, JobUpdate::Processing).await {
            error!(error = %e, "could not start payment job");
            return;
        }

        let update = match self.payments.create(item.gateway, &item.request).await {
            Ok(created) => JobUpdate::Done {
                data: serde_json::json!({
                    "payment_request_id": created.payment.payment_request_id,
                    "status": created.payment.status,
                }),
            },
            Err(e) => {
                warn!(error = %e, "payment job failed");
                JobUpdate::Failed {
                    error: job_error_text(&e),
                }
            }
        };

        match self.tracker.apply(&item.job_id, update).await {
            Ok(job) => info!(status = %job.status, "payment job finished"),
            Err(e) => error!(error = %e, "could not record payment job result"),
        }
    }
}

/// Gateway rejections keep the upstream body so pollers see what the gateway said.
fn job_error_text(err: &CreatePaymentError) -> String {
    match err {
        CreatePaymentError::Gateway(PaymentError::GatewayResponse { body, .. }) => {
            format!("{}: {}", err, String::from_utf8_lossy(body))
        }
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transitions_follow_lifecycle() {
        assert!(JobStatus::Queued.can_transition_to(&JobStatus::Processing));
        assert!(JobStatus::Processing.can_transition_to(&JobStatus::Done));
        assert!(JobStatus::Processing.can_transition_to(&JobStatus::Error));

        assert!(!JobStatus::Queued.can_transition_to(&JobStatus::Done));
        assert!(!JobStatus::Processing.can_transition_to(&JobStatus::Queued));
    }

    #[test]
    fn terminal_states_accept_nothing() {
        for next in [
            JobStatus::Queued,
            JobStatus::Processing,
            JobStatus::Done,
            JobStatus::Error,
        ] {
            assert!(!JobStatus::Done.can_transition_to(&next));
            assert!(!JobStatus::Error.can_transition_to(&next));
        }
        assert!(JobStatus::Done.is_terminal());
        assert!(!JobStatus::Queued.is_terminal());
    }

    #[test]
    fn status_serializes_lowercase() {
        assert_eq!(
            serde_json::to_value(JobStatus::Queued).unwrap(),
            serde_json::json!("queued")
        );
    }

    #[tokio::test]
    async fn tracker_rejects_update_after_done() {
        let tracker = JobTracker::new();
        tracker
            .insert(Job::queued("job-1".to_string(), GatewayKind::Xendit))
            .await;

        tracker.apply("job-1", JobUpdate::Processing).await.unwrap();
        let done = tracker
            .apply(
                "job-1",
                JobUpdate::Done {
                    data: serde_json::json!({"payment_request_id": "pr-1"}),
                },
            )
            .await
            .unwrap();
        assert_eq!(done.status, JobStatus::Done);
        assert!(done.updated_at >= done.created_at);

        let again = tracker
            .apply(
                "job-1",
                JobUpdate::Failed {
                    error: "late".to_string(),
                },
            )
            .await;
        assert!(matches!(again, Err(JobError::InvalidTransition { .. })));
        assert_eq!(tracker.get("job-1").await.unwrap().status, JobStatus::Done);
    }

    #[tokio::test]
    async fn unknown_job_is_not_found() {
        let tracker = JobTracker::new();
        assert!(tracker.get("missing").await.is_none());
        assert!(matches!(
            tracker.apply("missing", JobUpdate::Processing).await,
            Err(JobError::NotFound { .. })
        ));
    }

    #[tokio::test]
    async fn enqueue_records_queued_job() {
        let (queue, mut receiver) = JobQueue::new(4, Arc::new(JobTracker::new()));

        let job_id = queue
            .enqueue(GatewayKind::Xendit, CreatePaymentRequest::default())
            .await
            .unwrap();

        let job = queue.get_status(&job_id).await.unwrap();
        assert_eq!(job.status, JobStatus::Queued);
        assert_eq!(receiver.recv().await.unwrap().job_id, job_id);
    }

    #[tokio::test]
    async fn full_queue_times_out() {
        let (queue, _receiver) = JobQueue::new(1, Arc::new(JobTracker::new()));
        queue
            .enqueue(GatewayKind::Xendit, CreatePaymentRequest::default())
            .await
            .unwrap();

        let result = queue
            .enqueue_with_timeout(
                GatewayKind::Xendit,
                CreatePaymentRequest::default(),
                Duration::from_millis(20),
            )
            .await;
        assert!(matches!(result, Err(JobError::EnqueueTimeout { .. })));
        assert_eq!(queue.tracker().len().await, 1);
    }

    #[tokio::test]
    async fn closed_queue_drops_job() {
        let (queue, receiver) = JobQueue::new(1, Arc::new(JobTracker::new()));
        drop(receiver);

        let result = queue
            .enqueue(GatewayKind::Nicepay, CreatePaymentRequest::default())
            .await;
        assert!(matches!(result, Err(JobError::QueueClosed)));
        assert!(queue.tracker().is_empty().await);
    }

    #[tokio::test]
    async fn abandoned_enqueue_leaves_tracker_untouched() {
        let (queue, mut receiver) = JobQueue::new(1, Arc::new(JobTracker::new()));
        let first = queue
            .enqueue(GatewayKind::Xendit, CreatePaymentRequest::default())
            .await
            .unwrap();

        // Queue is full: the caller gives up while enqueue is still waiting.
        let abandoned = tokio::time::timeout(
            Duration::from_millis(20),
            queue.enqueue(GatewayKind::Xendit, CreatePaymentRequest::default()),
        )
        .await;
        assert!(abandoned.is_err());
        assert_eq!(queue.tracker().len().await, 1);

        assert_eq!(receiver.recv().await.unwrap().job_id, first);
        assert!(receiver.try_recv().is_err());
    }

    #[test]
    fn gateway_rejection_text_includes_body() {
        let err = CreatePaymentError::Gateway(PaymentError::GatewayResponse {
            gateway: "xendit".to_string(),
            status: 400,
            body: b"{\"error_code\":\"INVALID\"}".to_vec(),
        });
        let text = job_error_text(&err);
        assert!(text.contains("HTTP 400"));
        assert!(text.contains("INVALID"));
    }
}
