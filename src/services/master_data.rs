//! Resolves the dimension rows a payment references, creating them on first use.

use crate::config::PersistenceConfig;
use crate::database::error::DatabaseError;
use crate::database::master_data_repository::{
    Countries, Currencies, Dimension, EwalletProviders, MasterDataRepository, Merchants,
    NewDimension, PaymentMethods, VaProviders,
};
use crate::services::channel_classifier::ChannelType;
use sqlx::PgConnection;
use uuid::Uuid;

/// Merchant identity derived from a request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MerchantIdentity {
    pub code: String,
    pub name: String,
}

/// Explicit `merchant_code` wins, then the first word of the merchant name,
/// then `default_code`. The display name falls back to the code.
pub fn merchant_identity(
    merchant_code: Option<&str>,
    merchant_name: Option<&str>,
    default_code: &str,
) -> MerchantIdentity {
    let name = merchant_name.map(str::trim).filter(|n| !n.is_empty());

    let code = merchant_code
        .map(str::trim)
        .filter(|c| !c.is_empty())
        .or_else(|| name.and_then(|n| n.split_whitespace().next()))
        .unwrap_or(default_code)
        .to_string();

    MerchantIdentity {
        name: name.map(str::to_string).unwrap_or_else(|| code.clone()),
        code,
    }
}

/// Coarse payment-method label stored in `payment_methods.name`.
pub fn payment_method_label(channel: ChannelType, channel_code: &str, default_label: &str) -> String {
    match channel {
        ChannelType::VirtualAccount => "VIRTUAL_ACCOUNT".to_string(),
        ChannelType::Qris => "QRIS".to_string(),
        ChannelType::EWallet => "EWALLET".to_string(),
        ChannelType::Unclassified => {
            let code = channel_code.trim();
            if code.is_empty() {
                default_label.to_string()
            } else {
                code.to_uppercase()
            }
        }
    }
}

pub fn currency_display_name(code: &str) -> String {
    match code {
        "IDR" => "Indonesia".to_string(),
        other => other.to_string(),
    }
}

pub fn country_display_name(country_id: &str) -> String {
    match country_id {
        "ID" => "Indonesia".to_string(),
        other => other.to_string(),
    }
}

/// Per-dimension find-or-create, run on the caller's transaction.
#[derive(Debug, Clone)]
pub struct MasterDataResolver {
    default_merchant_code: String,
    default_payment_method: String,
    actor: String,
}

impl MasterDataResolver {
    pub fn new(config: &PersistenceConfig) -> Self {
        Self {
            default_merchant_code: config.default_merchant_code.clone(),
            default_payment_method: config.default_payment_method.clone(),
            actor: config.audit_actor.clone(),
        }
    }

    pub fn actor(&self) -> &str {
        &self.actor
    }

    pub fn default_merchant_code(&self) -> &str {
        &self.default_merchant_code
    }

    pub fn default_payment_method(&self) -> &str {
        &self.default_payment_method
    }

    /// Blank keys resolve to `None` without touching the database.
    pub async fn resolve<D: Dimension>(
        &self,
        conn: &mut PgConnection,
        key: &str,
        display_name: &str,
        now_millis: i64,
    ) -> Result<Option<Uuid>, DatabaseError> {
        let key = key.trim();
        if key.is_empty() {
            return Ok(None);
        }

        let display_name = if display_name.trim().is_empty() {
            key
        } else {
            display_name.trim()
        };

        let id = MasterDataRepository::resolve_or_create::<D>(
            conn,
            &NewDimension {
                key,
                display_name,
                actor: &self.actor,
                created_at_millis: now_millis,
            },
        )
        .await?;
        Ok(Some(id))
    }

    pub async fn resolve_merchant(
        &self,
        conn: &mut PgConnection,
        merchant: &MerchantIdentity,
        now_millis: i64,
    ) -> Result<Option<Uuid>, DatabaseError> {
        self.resolve::<Merchants>(conn, &merchant.code, &merchant.name, now_millis)
            .await
    }

    pub async fn resolve_currency(
        &self,
        conn: &mut PgConnection,
        code: &str,
        now_millis: i64,
    ) -> Result<Option<Uuid>, DatabaseError> {
        let code = code.trim().to_uppercase();
        self.resolve::<Currencies>(conn, &code, &currency_display_name(&code), now_millis)
            .await
    }

    pub async fn resolve_country(
        &self,
        conn: &mut PgConnection,
        country_id: &str,
        now_millis: i64,
    ) -> Result<Option<Uuid>, DatabaseError> {
        let country_id = country_id.trim().to_uppercase();
        self.resolve::<Countries>(
            conn,
            &country_id,
            &country_display_name(&country_id),
            now_millis,
        )
        .await
    }

    pub async fn resolve_payment_method(
        &self,
        conn: &mut PgConnection,
        channel: ChannelType,
        channel_code: &str,
        now_millis: i64,
    ) -> Result<Option<Uuid>, DatabaseError> {
        let label = payment_method_label(channel, channel_code, &self.default_payment_method);
        self.resolve::<PaymentMethods>(conn, &label, &label, now_millis)
            .await
    }

    pub async fn resolve_ewallet_provider(
        &self,
        conn: &mut PgConnection,
        channel_code: &str,
        now_millis: i64,
    ) -> Result<Option<Uuid>, DatabaseError> {
        let name = channel_code.trim().to_uppercase();
        self.resolve::<EwalletProviders>(conn, &name, &name, now_millis)
            .await
    }

    pub async fn resolve_va_provider(
        &self,
        conn: &mut PgConnection,
        channel_code: &str,
        now_millis: i64,
    ) -> Result<Option<Uuid>, DatabaseError> {
        let name = channel_code.trim().to_uppercase();
        self.resolve::<VaProviders>(conn, &name, &name, now_millis)
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn explicit_merchant_code_wins() {
        let merchant = merchant_identity(Some(" TOKO01 "), Some("Toko Maju Jaya"), "PPOB");
        assert_eq!(merchant.code, "TOKO01");
        assert_eq!(merchant.name, "Toko Maju Jaya");
    }

    #[test]
    fn merchant_code_from_first_word_of_name() {
        let merchant = merchant_identity(None, Some("  Indomaret Cabang 12"), "PPOB");
        assert_eq!(merchant.code, "Indomaret");

        let merchant = merchant_identity(Some(""), Some("Alfamart"), "PPOB");
        assert_eq!(merchant.code, "Alfamart");
    }

    #[test]
    fn merchant_code_falls_back_to_default() {
        let merchant = merchant_identity(None, None, "PPOB");
        assert_eq!(
            merchant,
            MerchantIdentity {
                code: "PPOB".to_string(),
                name: "PPOB".to_string()
            }
        );

        let merchant = merchant_identity(Some("  "), Some("   "), "DEFAULT");
        assert_eq!(merchant.code, "DEFAULT");
    }

    #[test]
    fn payment_method_label_normalizes_category() {
        assert_eq!(
            payment_method_label(ChannelType::VirtualAccount, "BCA_VIRTUAL_ACCOUNT", "OTHER"),
            "VIRTUAL_ACCOUNT"
        );
        assert_eq!(payment_method_label(ChannelType::Qris, "qris", "OTHER"), "QRIS");
        assert_eq!(payment_method_label(ChannelType::EWallet, "OVO", "OTHER"), "EWALLET");
        assert_eq!(
            payment_method_label(ChannelType::Unclassified, "cards", "OTHER"),
            "CARDS"
        );
        assert_eq!(payment_method_label(ChannelType::Unclassified, " ", "OTHER"), "OTHER");
    }

    #[test]
    fn display_names_for_known_codes() {
        assert_eq!(currency_display_name("IDR"), "Indonesia");
        assert_eq!(currency_display_name("USD"), "USD");
        assert_eq!(country_display_name("ID"), "Indonesia");
        assert_eq!(country_display_name("PH"), "PH");
    }
}
