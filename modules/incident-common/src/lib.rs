pub mod config;
pub mod error;
pub mod file_config;
pub mod types;

pub use config::AppConfig;
pub use error::{IncidentError, Result};
pub use file_config::{ClusteringConfig, FileConfig};
pub use types::*;
