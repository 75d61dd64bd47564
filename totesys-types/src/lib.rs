pub mod errors;
pub mod keys;
pub mod models;
pub mod report;
pub mod tables;
pub mod types;

// Re-exports
pub use chrono;
pub use log;
pub use serde;
pub use serde_json;
pub use serde_yaml;
pub use thiserror;
