pub mod nicepay;
pub mod xendit;

pub use nicepay::NicepayGateway;
pub use xendit::XenditGateway;
