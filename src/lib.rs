mod routes;
mod telemetry;

pub mod app;
pub mod blob;
pub mod config;
pub mod prediction;
pub mod server;
pub mod session;
pub mod workflow;

pub use app::start_app;
pub use telemetry::init_subscriber;
