//! # vmwatch-gateway
//!
//! Yandex Cloud Compute gateway for vmwatch.
//!
//! This crate provides:
//! - `ComputeGateway`, the REST implementation of the
//!   `vmwatch_core::InstanceGateway` trait
//! - Credential acquisition for the four supported auth types
//!   (oauth, iam, inside-vm, sa)

pub mod auth;
pub mod client;

// Re-export main types
pub use auth::{Credentials, ServiceAccountKey};
pub use client::{ComputeGateway, GatewayConfig};
