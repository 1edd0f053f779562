pub mod config;
pub mod logging;

pub use config::Config;
pub use logging::{init_logging, init_logging_with};
