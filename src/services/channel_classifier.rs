//! Decides which channel sub-record a gateway payment belongs to.

use crate::payments::types::{ChannelProperties, CreatePaymentRequest, GatewayPayment};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ChannelType {
    EWallet,
    VirtualAccount,
    Qris,
    Unclassified,
}

impl ChannelType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ChannelType::EWallet => "E_WALLET",
            ChannelType::VirtualAccount => "VIRTUAL_ACCOUNT",
            ChannelType::Qris => "QRIS",
            ChannelType::Unclassified => "UNCLASSIFIED",
        }
    }
}

impl std::fmt::Display for ChannelType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Classify a payment. A mobile number in either the request's or the
/// response's channel properties wins over the channel code.
pub fn classify(payment: &GatewayPayment, request: &CreatePaymentRequest) -> ChannelType {
    let has_mobile = |props: Option<&ChannelProperties>| {
        props.map(|p| p.has_mobile_number()).unwrap_or(false)
    };

    if has_mobile(request.channel_properties.as_ref())
        || has_mobile(payment.channel_properties.as_ref())
    {
        return ChannelType::EWallet;
    }

    let channel_code = if payment.channel_code.trim().is_empty() {
        request.channel_code.trim()
    } else {
        payment.channel_code.trim()
    };
    let upper = channel_code.to_uppercase();

    if upper.contains("VIRTUAL_ACCOUNT") {
        ChannelType::VirtualAccount
    } else if upper == "QRIS" {
        ChannelType::Qris
    } else {
        ChannelType::Unclassified
    }
}
