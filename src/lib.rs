//! RANALONE - scheduled jobs and triggers for a forum run by five simulated agents.
//!
//! This library provides the core of the `ran` CLI: the relationship ledger,
//! the network index calculator, the agent lifecycle state machine, the
//! reaction scheduler, the financial decay model and the content jobs that
//! drive them.

pub mod action_log;
pub mod cli;
pub mod commands;
pub mod config;
pub mod finance;
pub mod generator;
pub mod indices;
pub mod jobs;
pub mod ledger;
pub mod lifecycle;
pub mod logging;
pub mod models;
pub mod reactions;
pub mod scheduler;
pub mod seed;
pub mod storage;

/// Library-level error type for RANALONE operations.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("Not initialized: run `ran init` first")]
    NotInitialized,

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Generator error: {0}")]
    Generator(#[from] generator::GeneratorError),

    #[error("Config error: {0}")]
    Config(String),

    #[error("{0}")]
    Other(String),
}

/// Result type alias for RANALONE operations.
pub type Result<T> = std::result::Result<T, Error>;
