use crate::config::GatewaysConfig;
use crate::payments::error::{PaymentError, PaymentResult};
use crate::payments::provider::PaymentGateway;
use crate::payments::providers::{NicepayGateway, XenditGateway};
use crate::payments::types::GatewayKind;
use std::collections::HashMap;
use std::str::FromStr;
use std::sync::Arc;

/// Enabled gateway clients keyed by kind. Built once at startup.
#[derive(Clone, Default)]
pub struct GatewayRegistry {
    gateways: HashMap<GatewayKind, Arc<dyn PaymentGateway>>,
}

impl GatewayRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_config(config: &GatewaysConfig) -> PaymentResult<Self> {
        let mut registry = Self::new();
        for kind in &config.enabled {
            let gateway: Arc<dyn PaymentGateway> = match kind {
                GatewayKind::Xendit => Arc::new(XenditGateway::new(config.xendit.clone())?),
                GatewayKind::Nicepay => Arc::new(NicepayGateway::new(config.nicepay.clone())?),
            };
            registry.register(gateway);
        }
        Ok(registry)
    }

    pub fn register(&mut self, gateway: Arc<dyn PaymentGateway>) {
        self.gateways.insert(gateway.kind(), gateway);
    }

    pub fn get(&self, kind: GatewayKind) -> PaymentResult<Arc<dyn PaymentGateway>> {
        self.gateways
            .get(&kind)
            .cloned()
            .ok_or_else(|| PaymentError::ValidationError {
                message: format!("gateway {} is disabled", kind),
                field: Some("gateway".to_string()),
            })
    }

    /// Resolves the `{gateway}` path segment.
    pub fn resolve(&self, name: &str) -> PaymentResult<Arc<dyn PaymentGateway>> {
        self.get(GatewayKind::from_str(name)?)
    }

    pub fn list_enabled(&self) -> Vec<GatewayKind> {
        let mut kinds: Vec<GatewayKind> = self.gateways.keys().copied().collect();
        kinds.sort_by_key(|k| k.as_str());
        kinds
    }
}
