use crate::payments::error::PaymentResult;
use crate::payments::types::{CreatePaymentRequest, GatewayKind, GatewayPayment};
use async_trait::async_trait;

/// Outbound client for one payment gateway.
#[async_trait]
pub trait PaymentGateway: Send + Sync {
    async fn create(&self, request: &CreatePaymentRequest) -> PaymentResult<GatewayPayment>;

    fn kind(&self) -> GatewayKind;
}
