pub mod app;
pub mod middleware;
pub mod routes;
pub mod state;

pub use app::{bind_address, build_router};
pub use state::{AppState, Ingestor};
