//! Validate, call the gateway, persist. Shared by the synchronous endpoint and
//! the async job worker.

use crate::payments::error::PaymentError;
use crate::payments::factory::GatewayRegistry;
use crate::payments::types::{CreatePaymentRequest, GatewayKind, GatewayPayment};
use crate::services::payment_persistence::{PaymentStore, PersistenceError, SaveOutcome};
use std::sync::Arc;
use thiserror::Error;
use tracing::{error, info};

#[derive(Debug, Error)]
pub enum CreatePaymentError {
    #[error(transparent)]
    Gateway(#[from] PaymentError),

    #[error(transparent)]
    Persistence(#[from] PersistenceError),
}

#[derive(Debug, Clone)]
pub struct CreatedPayment {
    pub payment: GatewayPayment,
    pub outcome: SaveOutcome,
}

#[derive(Clone)]
pub struct PaymentService {
    gateways: GatewayRegistry,
    store: Arc<dyn PaymentStore>,
}

impl PaymentService {
    pub fn new(gateways: GatewayRegistry, store: Arc<dyn PaymentStore>) -> Self {
        Self { gateways, store }
    }

    pub fn gateways(&self) -> &GatewayRegistry {
        &self.gateways
    }

    pub async fn create(
        &self,
        kind: GatewayKind,
        request: &CreatePaymentRequest,
    ) -> Result<CreatedPayment, CreatePaymentError> {
        request.validate()?;
        let gateway = self.gateways.get(kind)?;

        let payment = gateway.create(request).await?;

        let outcome = self.store.save(&payment, request).await.map_err(|e| {
            error!(
                gateway = %kind,
                reference_id = %request.reference_id,
                payment_request_id = %payment.payment_request_id,
                error = %e,
                "gateway payment created but not persisted"
            );
            e
        })?;

        info!(
            gateway = %kind,
            reference_id = %request.reference_id,
            transaction_id = %outcome.transaction_id,
            channel = %outcome.channel,
            "payment created"
        );

        Ok(CreatedPayment { payment, outcome })
    }
}
