//! Greenbook bot binary support: configuration, wiring, and the
//! operator control surface.

pub mod app;
pub mod config;
pub mod error;
pub mod server;

pub use app::Application;
pub use config::AppConfig;
pub use error::{AppError, AppResult};
