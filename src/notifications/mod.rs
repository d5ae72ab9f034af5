pub mod result;
pub mod types;

pub use result::{DeliveryResult, DeliveryStatus, Warning};
pub use types::{Contact, Notification, NotificationDraft, Strategy, Subject, ValidationError};
