pub mod app_state; // Shared handler state
pub mod config; // Layered configuration and CLI
pub mod constants; // Configuration keys and defaults

pub use app_state::AppState;
pub use config::{Cli, Configuration};
