//! In-process doubles for the gateway and the persistence layer.
#![allow(dead_code)]

use airpay_backend::api::AppState;
use airpay_backend::health::HealthChecker;
use airpay_backend::payments::error::{PaymentError, PaymentResult};
use airpay_backend::payments::factory::GatewayRegistry;
use airpay_backend::payments::provider::PaymentGateway;
use airpay_backend::payments::types::{CreatePaymentRequest, GatewayKind, GatewayPayment};
use airpay_backend::services::channel_classifier::ChannelType;
use airpay_backend::services::create_payment::PaymentService;
use airpay_backend::services::payment_persistence::{PaymentStore, PersistenceError, SaveOutcome};
use airpay_backend::workers::payment_jobs::{JobQueue, JobTracker, QueuedPayment};
use async_trait::async_trait;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::mpsc;
use uuid::Uuid;

/// Answers every create call with the same scripted result.
pub struct ScriptedGateway {
    kind: GatewayKind,
    result: Result<GatewayPayment, PaymentError>,
    calls: AtomicUsize,
}

impl ScriptedGateway {
    pub fn ok(kind: GatewayKind, payment_request_id: &str, status: &str) -> Arc<Self> {
        Arc::new(Self {
            kind,
            result: Ok(GatewayPayment {
                payment_request_id: payment_request_id.to_string(),
                status: status.to_string(),
                channel_code: "QRIS".to_string(),
                ..Default::default()
            }),
            calls: AtomicUsize::new(0),
        })
    }

    pub fn failing(kind: GatewayKind, error: PaymentError) -> Arc<Self> {
        Arc::new(Self {
            kind,
            result: Err(error),
            calls: AtomicUsize::new(0),
        })
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl PaymentGateway for ScriptedGateway {
    async fn create(&self, request: &CreatePaymentRequest) -> PaymentResult<GatewayPayment> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.result.clone().map(|mut payment| {
            payment.reference_id = request.reference_id.clone();
            payment
        })
    }

    fn kind(&self) -> GatewayKind {
        self.kind
    }
}

/// Remembers saved transaction ids; optionally fails every save.
#[derive(Default)]
pub struct RecordingStore {
    pub fail: bool,
    saved: Mutex<Vec<String>>,
}

impl RecordingStore {
    pub fn failing() -> Arc<Self> {
        Arc::new(Self {
            fail: true,
            saved: Mutex::new(Vec::new()),
        })
    }

    pub fn saved(&self) -> Vec<String> {
        self.saved.lock().unwrap().clone()
    }
}

#[async_trait]
impl PaymentStore for RecordingStore {
    async fn save(
        &self,
        payment: &GatewayPayment,
        _request: &CreatePaymentRequest,
    ) -> Result<SaveOutcome, PersistenceError> {
        if self.fail {
            return Err(PersistenceError::Timeout(Duration::from_secs(15)));
        }
        self.saved
            .lock()
            .unwrap()
            .push(payment.payment_request_id.clone());
        Ok(SaveOutcome {
            payment_id: Uuid::now_v7(),
            transaction_id: payment.payment_request_id.clone(),
            channel: ChannelType::Qris,
        })
    }
}

pub fn payment_service(
    gateway: Arc<ScriptedGateway>,
    store: Arc<RecordingStore>,
) -> PaymentService {
    let mut registry = GatewayRegistry::new();
    registry.register(gateway);
    PaymentService::new(registry, store)
}

pub fn queue(capacity: usize) -> (JobQueue, mpsc::Receiver<QueuedPayment>, Arc<JobTracker>) {
    let tracker = Arc::new(JobTracker::new());
    let (queue, receiver) = JobQueue::new(capacity, tracker.clone());
    (queue, receiver, tracker)
}

pub fn app_state(payments: PaymentService, jobs: JobQueue, tracker: Arc<JobTracker>) -> Arc<AppState> {
    Arc::new(AppState {
        payments,
        jobs,
        health: HealthChecker::new(None, tracker),
    })
}

pub fn valid_request(reference_id: &str) -> CreatePaymentRequest {
    CreatePaymentRequest {
        reference_id: reference_id.to_string(),
        country: "ID".to_string(),
        currency: "IDR".to_string(),
        request_amount: 25000.0,
        channel_code: "QRIS".to_string(),
        ..Default::default()
    }
}
