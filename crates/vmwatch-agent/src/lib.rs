//! # vmwatch-agent
//!
//! Reconciliation core of vmwatch: target selection, status aggregation,
//! remediation dispatch, and the watchdog loop that ties them together.
//!
//! The agent periodically samples the state of a target set of preemptible
//! instances through the `InstanceGateway` and issues start commands for any
//! that the provider has stopped.

pub mod remediation;
pub mod selector;
pub mod status;
pub mod watchdog;

// Re-export commonly used types
pub use remediation::{dispatch, RemediationOutcome};
pub use selector::{SelectionStrategy, TargetSelector};
pub use status::{StatusSnapshot, StatusTracker};
pub use watchdog::Watchdog;

use vmwatch_core::LoggingConfig;

// Error handling
#[derive(Debug, thiserror::Error)]
pub enum AgentError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Core error: {0}")]
    Core(#[from] vmwatch_core::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_yaml::Error),
}

pub type Result<T> = std::result::Result<T, AgentError>;

/// Initialize logging and tracing
pub fn init_logging(logging_config: &LoggingConfig) -> Result<()> {
    use tracing_subscriber::fmt::writer::BoxMakeWriter;

    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&logging_config.level));

    let writer = match &logging_config.file {
        Some(path) => {
            let file = std::fs::OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)?;
            BoxMakeWriter::new(std::sync::Mutex::new(file))
        }
        None => BoxMakeWriter::new(std::io::stderr),
    };

    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(logging_config.show_target)
        .with_writer(writer);

    match logging_config.format.as_str() {
        "json" => subscriber.json().init(),
        _ => subscriber.init(),
    }

    Ok(())
}
