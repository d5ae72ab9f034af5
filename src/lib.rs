pub mod app;
pub mod broker;
pub mod channels;
pub mod config;
pub mod delivery;
pub mod health;
pub mod logging;
pub mod notifications;
pub mod queue;
pub mod scheduler;
pub mod server;
