pub mod error;
pub mod service;
pub mod strategy;

pub use error::DeliveryError;
pub use service::DeliveryService;
