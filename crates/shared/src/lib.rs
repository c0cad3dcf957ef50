//! Shared types, errors, and configuration for Finlyt.
//!
//! This crate provides common types used across all other crates:
//! - Typed IDs for owner-scoped entity references
//! - Application-wide error taxonomy
//! - Configuration management
//! - Tracing subscriber bootstrap for the binaries

pub mod config;
pub mod error;
pub mod telemetry;
pub mod types;

pub use config::AppConfig;
pub use error::AppError;
