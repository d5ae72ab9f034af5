pub mod adapter;
pub mod bitrix;
pub mod email;
pub mod logged;

pub use adapter::{Channel, ChannelError, ChannelType};
