//! # vmwatch-core
//!
//! Core types, traits, and utilities for vmwatch - a watchdog for
//! preemptible cloud compute instances.
//!
//! This crate provides the foundational data structures and interfaces that
//! are shared across the other vmwatch components. It includes:
//!
//! - Core data structures for instances, statuses, and target sets
//! - The `InstanceGateway` trait abstracting the cloud compute API
//! - Configuration schema and parsing utilities
//! - Error handling types and utilities

pub mod config;
pub mod error;
pub mod gateway;
pub mod types;

// Re-export commonly used types at the crate root
pub use config::{AuthConfig, AuthType, LoggingConfig, WatchdogConfig};
pub use error::{Error, Result};
pub use gateway::{InstanceGateway, MockInstanceGateway};
pub use types::{Instance, InstanceId, InstanceStatus, TargetSet};
