//! LMS Admin API Library
//!
//! This crate provides the HTTP handlers, middleware, and application setup for the admin
//! console backend.

// Module declarations
mod api_doc;
mod handlers;
mod middleware;
pub mod setup;
mod telemetry;

// Public modules
pub mod error;
pub mod services;
pub mod state;

// Re-exports
pub use error::{ErrorResponse, HttpAppError};
pub use services::identity::{HttpIdentityAdmin, IdentityAdmin, IdentityError, IdentityUser};
pub use state::AppState;
