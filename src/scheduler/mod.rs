pub mod buffer;
pub mod dispatcher;
pub mod error;
pub mod service;

pub use buffer::Buffer;
pub use dispatcher::BufferedDispatcher;
pub use error::{SchedulerError, SchedulerResult};
pub use service::Scheduler;
