//! Pulls channel display values (QR string, VA number, mobile number) out of
//! the gateway's action list.

use crate::payments::types::PaymentAction;

pub const QR_STRING: &str = "QR_STRING";
pub const VIRTUAL_ACCOUNT_NUMBER: &str = "VIRTUAL_ACCOUNT_NUMBER";
pub const ACCOUNT_MOBILE_NUMBER: &str = "ACCOUNT_MOBILE_NUMBER";
pub const PRESENT_TO_CUSTOMER: &str = "PRESENT_TO_CUSTOMER";

/// First non-blank value whose descriptor matches `label`, else the first
/// non-blank `PRESENT_TO_CUSTOMER` value, else an empty string.
pub fn extract(actions: &[PaymentAction], label: &str) -> String {
    let non_blank = |a: &&PaymentAction| !a.value.trim().is_empty();

    actions
        .iter()
        .filter(non_blank)
        .find(|a| a.descriptor.eq_ignore_ascii_case(label))
        .or_else(|| {
            actions
                .iter()
                .filter(non_blank)
                .find(|a| a.action_type.eq_ignore_ascii_case(PRESENT_TO_CUSTOMER))
        })
        .map(|a| a.value.clone())
        .unwrap_or_default()
}
