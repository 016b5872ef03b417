pub mod alerts;
pub mod config;
pub mod context;
pub mod handler;
pub mod metrics;
pub mod scheduler;
pub mod server;
pub mod sinks;
pub mod store;
pub mod template;
pub mod tools;

use thiserror::Error;

pub use alerts::{Alert, AlertCollector, AlertResult, AlertState};
pub use handler::AlertSchedulerHandler;

#[derive(Debug, Error)]
pub enum Error {
    #[error("Configuration error: {0}")]
    Config(String),
    #[error("Invalid alert definition: {0}")]
    Definition(String),
    #[error("{0}")]
    UnresolvedUri(String),
    #[error("Reporting text error: {0}")]
    Template(String),
    #[error("Expression error: {0}")]
    Expression(String),
    #[error("Script error: {0}")]
    Script(String),
    #[error("Transport error: {0}")]
    Transport(String),
    #[error("Store error: {0}")]
    Store(String),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("JSON error: {0}")]
    SerdeJson(#[from] serde_json::Error),
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("Metrics error: {0}")]
    Metrics(#[from] prometheus::Error),
    #[error("Internal error: {0}")]
    Internal(String),
}

pub type Result<T> = std::result::Result<T, Error>;
