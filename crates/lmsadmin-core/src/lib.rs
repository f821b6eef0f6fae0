//! LMS Admin Core Library
//!
//! This crate provides the tenant model, configuration and error types shared by the
//! storage resolver and the HTTP API.

pub mod config;
pub mod error;
pub mod tenant;

// Re-export commonly used types
pub use config::{AdminConfig, Config, ProjectConfig, TenantConfig};
pub use error::{AppError, ErrorMetadata, LogLevel};
pub use tenant::{BucketRef, Privilege, TenantCode};
