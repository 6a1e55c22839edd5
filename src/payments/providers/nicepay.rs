use crate::config::NicepayConfig;
use crate::payments::error::{PaymentError, PaymentResult};
use crate::payments::provider::PaymentGateway;
use crate::payments::types::{
    ChannelProperties, CreatePaymentRequest, GatewayKind, GatewayPayment, PaymentAction,
};
use crate::payments::utils::PaymentHttpClient;
use async_trait::async_trait;
use chrono::{Duration as ChronoDuration, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use std::time::Duration;
use tracing::{info, warn};
use uuid::Uuid;

pub const PAYMENT_LINK_TTL_HOURS: i64 = 24;

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct RequestPaymentLink {
    pub url_callback: String,
    pub url_return: String,
    pub msisdn: String,
    pub name: String,
    pub number: String,
    pub channel: String,
    pub amount: f64,
    pub email: String,
    pub description: String,
    pub ip_address: String,
}

#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
pub struct PaymentLinkResponse {
    #[serde(default)]
    pub error: bool,
    #[serde(default)]
    pub status_code: i64,
    #[serde(default)]
    pub message: String,
    #[serde(default)]
    pub error_message: JsonValue,
    #[serde(default)]
    pub redirect_url: String,
}

/// One recorded HTTP exchange with the gateway, emitted to the log.
#[derive(Debug, Clone, Serialize)]
pub struct ApiCallRecord {
    pub request_url: String,
    pub method: String,
    pub latency_ms: u64,
    pub request_body: String,
    pub response_body: String,
    pub response_headers: Vec<(String, String)>,
    pub response_status_code: u16,
}

pub struct NicepayGateway {
    config: NicepayConfig,
    http: PaymentHttpClient,
}

impl NicepayGateway {
    pub fn new(config: NicepayConfig) -> PaymentResult<Self> {
        let http = PaymentHttpClient::new("nicepay", Duration::from_millis(config.timeout_ms))?;
        Ok(Self { config, http })
    }

    /// Requests a hosted payment link. The exchange is recorded whether or not
    /// the gateway accepts it.
    pub async fn request_payment_link(
        &self,
        request: &RequestPaymentLink,
        url: &str,
    ) -> PaymentResult<(PaymentLinkResponse, ApiCallRecord)> {
        let raw = self
            .http
            .send_json(reqwest::Method::POST, url, None, request, &[])
            .await?;

        let record = ApiCallRecord {
            request_url: url.to_string(),
            method: "POST".to_string(),
            latency_ms: raw.latency.as_millis() as u64,
            request_body: serde_json::to_string(request).unwrap_or_default(),
            response_body: raw.body_text(),
            response_headers: raw.headers.clone(),
            response_status_code: raw.status,
        };
        info!(
            request_url = %record.request_url,
            status = record.response_status_code,
            latency_ms = record.latency_ms,
            reference = %request.number,
            "nicepay api call"
        );

        let decoded = serde_json::from_slice::<PaymentLinkResponse>(&raw.body);

        if raw.status >= 400 {
            let message = match &decoded {
                Ok(body) if !body.message.is_empty() => body.message.clone(),
                _ => format!("nicepay returned HTTP {}", raw.status),
            };
            warn!(status = raw.status, message = %message, "nicepay rejected payment link");
            return Err(PaymentError::GatewayError {
                gateway: "nicepay".to_string(),
                message,
            });
        }

        let response = decoded.map_err(|e| PaymentError::DecodeError {
            gateway: "nicepay".to_string(),
            message: e.to_string(),
        })?;

        Ok((response, record))
    }

    fn link_request(&self, request: &CreatePaymentRequest) -> RequestPaymentLink {
        let customer = request.customer.clone().unwrap_or_default();
        let props = request.channel_properties.as_ref();

        RequestPaymentLink {
            url_callback: request
                .callback_url
                .clone()
                .unwrap_or_else(|| self.config.callback_url.clone()),
            url_return: request
                .return_url
                .clone()
                .or_else(|| props.and_then(|p| p.success_return_url.clone()))
                .unwrap_or_else(|| self.config.return_url.clone()),
            msisdn: customer
                .phone
                .or_else(|| props.and_then(|p| p.mobile_number().map(str::to_string)))
                .unwrap_or_default(),
            name: customer.name.unwrap_or_default(),
            number: request.reference_id.clone(),
            channel: request.channel_code.clone(),
            amount: request.request_amount,
            email: customer.email.unwrap_or_default(),
            description: request.description.clone().unwrap_or_default(),
            ip_address: request.client_ip.clone().unwrap_or_default(),
        }
    }
}

/// Maps an accepted payment link onto the common payment shape. Nicepay does
/// not assign an id, so one is generated here.
fn payment_from_link(
    request: &CreatePaymentRequest,
    link: &PaymentLinkResponse,
) -> GatewayPayment {
    let now = Utc::now();
    let expires_at = now + ChronoDuration::hours(PAYMENT_LINK_TTL_HOURS);

    GatewayPayment {
        payment_request_id: Uuid::new_v4().to_string(),
        reference_id: request.reference_id.clone(),
        country: request.country.clone(),
        currency: request.currency.clone(),
        request_amount: request.request_amount,
        channel_code: request.channel_code.clone(),
        channel_properties: Some(ChannelProperties {
            success_return_url: request.return_url.clone(),
            expires_at: Some(expires_at.to_rfc3339_opts(SecondsFormat::Millis, true)),
            ..Default::default()
        }),
        actions: vec![PaymentAction::new(
            "REDIRECT_CUSTOMER",
            "WEB_URL",
            &link.redirect_url,
        )],
        status: "PENDING".to_string(),
        description: request.description.clone(),
        metadata: request
            .metadata
            .as_ref()
            .and_then(|m| serde_json::to_value(m).ok()),
        created: Some(now.to_rfc3339_opts(SecondsFormat::Millis, true)),
        updated: Some(now.to_rfc3339_opts(SecondsFormat::Millis, true)),
        ..Default::default()
    }
}

#[async_trait]
impl PaymentGateway for NicepayGateway {
    async fn create(&self, request: &CreatePaymentRequest) -> PaymentResult<GatewayPayment> {
        let link_request = self.link_request(request);
        let (link, _record) = self
            .request_payment_link(&link_request, &self.config.url)
            .await?;
        Ok(payment_from_link(request, &link))
    }

    fn kind(&self) -> GatewayKind {
        GatewayKind::Nicepay
    }
}
