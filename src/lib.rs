pub mod blob_store;
pub mod config;
pub mod connection_string;
pub mod error;
pub mod generator;
pub mod handlers;
pub mod middleware;
pub mod orchestrator;
pub mod outcome;
pub mod paths;
pub mod rate_limit_config;
pub mod rate_limiter;
pub mod server;
pub mod styles;
pub mod validation;

pub use config::Config;
pub use error::{Result, StylizerError};
pub use orchestrator::Orchestrator;
pub use outcome::{FailedEntry, ProcessingOutcome, StyleReport};
pub use server::create_app;
