pub mod error;
pub mod factory;
pub mod provider;
pub mod providers;
pub mod types;
pub mod utils;

pub use error::{PaymentError, PaymentResult};
pub use factory::GatewayRegistry;
pub use provider::PaymentGateway;
pub use types::{
    ChannelProperties, CreatePaymentRequest, GatewayKind, GatewayPayment, PaymentAction,
};
