pub mod api;
pub mod config;
pub mod db;
pub mod error;
pub mod models;
pub mod scheduler;
pub mod session;
pub mod stats;

pub use api::Api;
pub use config::TrackerConfig;
pub use db::Database;
pub use error::ApiError;
pub use scheduler::{LogNotifier, Notifier, Scheduler};
pub use session::SessionController;
