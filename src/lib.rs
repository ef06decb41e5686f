pub mod api_error;
pub mod app;
pub mod auth;
pub mod clock;
pub mod config;
pub mod handlers;
pub mod history;
pub mod lifecycle;
pub mod models;
pub mod notifications;
pub mod plans;
pub mod store;
pub mod sweeper;
pub mod telemetry;

pub use app::{create_app, AppState};
