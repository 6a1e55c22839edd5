use crate::payments::error::PaymentError;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value as JsonValue};
use std::str::FromStr;

/// Gateways a payment can be routed to, taken from the `/payment/{gateway}` path.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum GatewayKind {
    Xendit,
    Nicepay,
}

impl GatewayKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            GatewayKind::Xendit => "xendit",
            GatewayKind::Nicepay => "nicepay",
        }
    }
}

impl std::fmt::Display for GatewayKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for GatewayKind {
    type Err = PaymentError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_lowercase().as_str() {
            "xendit" => Ok(GatewayKind::Xendit),
            "nicepay" => Ok(GatewayKind::Nicepay),
            _ => Err(PaymentError::validation(
                format!("unsupported payment gateway: {}", value),
                "gateway",
            )),
        }
    }
}

/// Channel-specific properties, shared by the inbound request and the gateway
/// response. Unknown keys are kept in `extra` so the raw snapshot stays complete.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct ChannelProperties {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
    /// Outer `Some` means the key was sent, even as `null`.
    #[serde(
        default,
        deserialize_with = "deserialize_present",
        skip_serializing_if = "Option::is_none"
    )]
    pub account_mobile_number: Option<Option<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub success_return_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub failure_return_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, JsonValue>,
}

impl ChannelProperties {
    pub fn has_mobile_number(&self) -> bool {
        self.account_mobile_number.is_some()
    }

    pub fn mobile_number(&self) -> Option<&str> {
        self.account_mobile_number.as_ref().and_then(|n| n.as_deref())
    }
}

fn deserialize_present<'de, D, T>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Option::<T>::deserialize(deserializer).map(Some)
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct PaymentMetadata {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub merchant: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payment_gateway: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, JsonValue>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct CustomerDetails {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub phone: Option<String>,
}

/// Normalized inbound payment-creation request.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct CreatePaymentRequest {
    #[serde(default)]
    pub reference_id: String,
    #[serde(default, rename = "type", skip_serializing_if = "Option::is_none")]
    pub payment_type: Option<String>,
    #[serde(default)]
    pub country: String,
    #[serde(default)]
    pub currency: String,
    #[serde(default)]
    pub request_amount: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub capture_method: Option<String>,
    #[serde(default)]
    pub channel_code: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub channel_properties: Option<ChannelProperties>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<PaymentMetadata>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub merchant_code: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub customer: Option<CustomerDetails>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub callback_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub return_url: Option<String>,
    /// Caller address, filled in by the HTTP layer.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub client_ip: Option<String>,
}

impl CreatePaymentRequest {
    /// Rejects malformed requests before any gateway call is made.
    pub fn validate(&self) -> Result<(), PaymentError> {
        if self.reference_id.trim().is_empty() {
            return Err(PaymentError::validation(
                "reference_id is required",
                "reference_id",
            ));
        }
        if !self.request_amount.is_finite() || self.request_amount <= 0.0 {
            return Err(PaymentError::validation(
                "request_amount must be greater than zero",
                "request_amount",
            ));
        }
        if self.currency.trim().is_empty() {
            return Err(PaymentError::validation("currency is required", "currency"));
        }
        if self.country.trim().is_empty() {
            return Err(PaymentError::validation("country is required", "country"));
        }
        if self.channel_code.trim().is_empty() {
            return Err(PaymentError::validation(
                "channel_code is required",
                "channel_code",
            ));
        }
        if let Some(email) = self.customer.as_ref().and_then(|c| c.email.as_deref()) {
            if !email.trim().is_empty() && !email.contains('@') {
                return Err(PaymentError::validation(
                    format!("invalid customer email: {}", email),
                    "customer.email",
                ));
            }
        }
        Ok(())
    }

    pub fn merchant_name(&self) -> Option<&str> {
        self.metadata.as_ref().and_then(|m| m.merchant.as_deref())
    }

    pub fn payment_gateway(&self) -> Option<&str> {
        self.metadata
            .as_ref()
            .and_then(|m| m.payment_gateway.as_deref())
    }
}

/// One entry of the gateway's `actions` list.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct PaymentAction {
    #[serde(default, rename = "type")]
    pub action_type: String,
    #[serde(default)]
    pub descriptor: String,
    #[serde(default)]
    pub value: String,
}

impl PaymentAction {
    pub fn new(action_type: &str, descriptor: &str, value: &str) -> Self {
        Self {
            action_type: action_type.to_string(),
            descriptor: descriptor.to_string(),
            value: value.to_string(),
        }
    }
}

/// Payment object returned by the gateway after a successful create call.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct GatewayPayment {
    #[serde(default)]
    pub payment_request_id: String,
    #[serde(default)]
    pub reference_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub business_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub customer_id: Option<String>,
    #[serde(default, rename = "type", skip_serializing_if = "Option::is_none")]
    pub payment_type: Option<String>,
    #[serde(default)]
    pub country: String,
    #[serde(default)]
    pub currency: String,
    #[serde(default)]
    pub request_amount: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub capture_method: Option<String>,
    #[serde(default)]
    pub channel_code: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub channel_properties: Option<ChannelProperties>,
    #[serde(default)]
    pub actions: Vec<PaymentAction>,
    #[serde(default)]
    pub status: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<JsonValue>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub failure_code: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, JsonValue>,
}

impl GatewayPayment {
    pub fn expires_at(&self) -> Option<&str> {
        self.channel_properties
            .as_ref()
            .and_then(|p| p.expires_at.as_deref())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn valid_request() -> CreatePaymentRequest {
        CreatePaymentRequest {
            reference_id: "INV-001".to_string(),
            country: "ID".to_string(),
            currency: "IDR".to_string(),
            request_amount: 15000.0,
            channel_code: "BCA_VIRTUAL_ACCOUNT".to_string(),
            ..Default::default()
        }
    }

    #[test]
    fn gateway_kind_parses_path_segment() {
        assert_eq!(GatewayKind::from_str("Xendit").unwrap(), GatewayKind::Xendit);
        assert_eq!(GatewayKind::from_str(" nicepay ").unwrap(), GatewayKind::Nicepay);
        assert!(GatewayKind::from_str("duitku").is_err());
    }

    #[test]
    fn validation_rejects_missing_fields() {
        assert!(valid_request().validate().is_ok());

        let mut request = valid_request();
        request.reference_id = "  ".to_string();
        assert!(matches!(
            request.validate(),
            Err(PaymentError::ValidationError { field: Some(f), .. }) if f == "reference_id"
        ));

        let mut request = valid_request();
        request.request_amount = 0.0;
        assert!(request.validate().is_err());

        let mut request = valid_request();
        request.request_amount = f64::NAN;
        assert!(request.validate().is_err());

        let mut request = valid_request();
        request.channel_code.clear();
        assert!(request.validate().is_err());

        let mut request = valid_request();
        request.customer = Some(CustomerDetails {
            email: Some("not-an-email".to_string()),
            ..Default::default()
        });
        assert!(request.validate().is_err());
    }

    #[test]
    fn gateway_payment_decodes_xendit_shape() {
        let payload = serde_json::json!({
            "payment_request_id": "pr-7b1c",
            "reference_id": "INV-001",
            "business_id": "5f27a14a9bf05c73dd040bc8",
            "type": "PAY",
            "country": "ID",
            "currency": "IDR",
            "request_amount": 15000,
            "capture_method": "AUTOMATIC",
            "latest_payment_id": "py-5521",
            "channel_code": "QRIS",
            "channel_properties": {"expires_at": "2026-10-20T10:00:00Z", "qr_flavor": "DYNAMIC"},
            "actions": [{"type": "PRESENT_TO_CUSTOMER", "descriptor": "QR_STRING", "value": "00020101"}],
            "status": "REQUIRES_ACTION",
            "created": "2026-10-19T10:00:00.123Z",
            "updated": "2026-10-19T10:00:00.123Z"
        });
        let parsed: GatewayPayment = serde_json::from_value(payload).unwrap();
        assert_eq!(parsed.payment_request_id, "pr-7b1c");
        assert_eq!(parsed.actions.len(), 1);
        assert_eq!(parsed.actions[0].action_type, "PRESENT_TO_CUSTOMER");
        assert_eq!(parsed.expires_at(), Some("2026-10-20T10:00:00Z"));
        assert_eq!(parsed.business_id.as_deref(), Some("5f27a14a9bf05c73dd040bc8"));
        assert_eq!(parsed.extra["latest_payment_id"], "py-5521");
        assert!(!parsed.extra.contains_key("business_id"));

        let props = parsed.channel_properties.unwrap();
        assert_eq!(props.extra["qr_flavor"], "DYNAMIC");
        assert!(!props.has_mobile_number());
    }

    #[test]
    fn mobile_number_key_presence_survives_null() {
        let props: ChannelProperties =
            serde_json::from_value(serde_json::json!({"account_mobile_number": null})).unwrap();
        assert!(props.has_mobile_number());
        assert_eq!(props.mobile_number(), None);
        assert_eq!(
            serde_json::to_value(&props).unwrap(),
            serde_json::json!({"account_mobile_number": null})
        );

        let props: ChannelProperties =
            serde_json::from_value(serde_json::json!({"display_name": "Siti"})).unwrap();
        assert!(!props.has_mobile_number());
        assert!(serde_json::to_value(&props)
            .unwrap()
            .get("account_mobile_number")
            .is_none());
    }

    #[test]
    fn request_serialization_omits_empty_optionals() {
        let json = serde_json::to_value(valid_request()).unwrap();
        assert_eq!(json["reference_id"], "INV-001");
        assert!(json.get("metadata").is_none());
        assert!(json.get("type").is_none());
    }
}
