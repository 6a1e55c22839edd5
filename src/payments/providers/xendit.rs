use crate::config::XenditConfig;
use crate::payments::error::{PaymentError, PaymentResult};
use crate::payments::provider::PaymentGateway;
use crate::payments::types::{
    ChannelProperties, CreatePaymentRequest, GatewayKind, GatewayPayment, PaymentMetadata,
};
use crate::payments::utils::{BasicAuth, PaymentHttpClient};
use async_trait::async_trait;
use serde::Serialize;
use std::time::Duration;
use tracing::{info, warn};

/// Body sent to the payment-requests endpoint. Built from the typed request so
/// locally-used fields (merchant code, caller ip) never leave the service.
#[derive(Debug, Serialize)]
struct XenditPaymentPayload<'a> {
    reference_id: &'a str,
    #[serde(rename = "type", skip_serializing_if = "Option::is_none")]
    payment_type: Option<&'a str>,
    country: &'a str,
    currency: &'a str,
    request_amount: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    capture_method: Option<&'a str>,
    channel_code: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    channel_properties: Option<&'a ChannelProperties>,
    #[serde(skip_serializing_if = "Option::is_none")]
    description: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    metadata: Option<&'a PaymentMetadata>,
}

impl<'a> From<&'a CreatePaymentRequest> for XenditPaymentPayload<'a> {
    fn from(request: &'a CreatePaymentRequest) -> Self {
        Self {
            reference_id: &request.reference_id,
            payment_type: request.payment_type.as_deref(),
            country: &request.country,
            currency: &request.currency,
            request_amount: request.request_amount,
            capture_method: request.capture_method.as_deref(),
            channel_code: &request.channel_code,
            channel_properties: request.channel_properties.as_ref(),
            description: request.description.as_deref(),
            metadata: request.metadata.as_ref(),
        }
    }
}

pub struct XenditGateway {
    config: XenditConfig,
    http: PaymentHttpClient,
}

impl XenditGateway {
    pub fn new(config: XenditConfig) -> PaymentResult<Self> {
        let http = PaymentHttpClient::new("xendit", Duration::from_millis(config.timeout_ms))?;
        Ok(Self { config, http })
    }

    fn auth(&self) -> Option<BasicAuth<'_>> {
        if self.config.api_key.is_empty() {
            return None;
        }
        Some(BasicAuth {
            username: &self.config.api_key,
            password: Some(""),
        })
    }
}

#[async_trait]
impl PaymentGateway for XenditGateway {
    async fn create(&self, request: &CreatePaymentRequest) -> PaymentResult<GatewayPayment> {
        let payload = XenditPaymentPayload::from(request);

        let raw = self
            .http
            .send_json(
                reqwest::Method::POST,
                &self.config.api_url,
                self.auth(),
                &payload,
                &[("api-version", self.config.api_version.as_str())],
            )
            .await?;

        if !raw.is_success() {
            warn!(
                reference_id = %request.reference_id,
                status = raw.status,
                latency_ms = raw.latency.as_millis() as u64,
                "xendit rejected payment request"
            );
            return Err(PaymentError::GatewayResponse {
                gateway: "xendit".to_string(),
                status: raw.status,
                body: raw.body,
            });
        }

        let payment: GatewayPayment =
            serde_json::from_slice(&raw.body).map_err(|e| PaymentError::DecodeError {
                gateway: "xendit".to_string(),
                message: e.to_string(),
            })?;

        info!(
            reference_id = %request.reference_id,
            payment_request_id = %payment.payment_request_id,
            status = %payment.status,
            latency_ms = raw.latency.as_millis() as u64,
            "xendit payment request created"
        );

        Ok(payment)
    }

    fn kind(&self) -> GatewayKind {
        GatewayKind::Xendit
    }
}
