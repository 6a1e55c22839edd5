//! Services module for payment business logic

pub mod action_fields;
pub mod channel_classifier;
pub mod create_payment;
pub mod master_data;
pub mod payment_persistence;

pub use channel_classifier::ChannelType;
pub use create_payment::{CreatePaymentError, CreatedPayment, PaymentService};
pub use payment_persistence::{
    PaymentPersistenceCoordinator, PaymentStore, PersistenceError, SaveOutcome,
};
