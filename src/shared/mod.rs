pub mod config;
pub mod logging;
pub mod models;
pub mod wordlist;

pub use config::Config;
pub use models::AppState;
