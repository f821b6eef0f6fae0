//! Application setup and initialization
//!
//! This module contains all application initialization logic extracted from main.rs
//! for better organization and testability.

pub mod routes;
pub mod server;
pub mod validation;

use crate::services::identity::HttpIdentityAdmin;
use crate::state::AppState;
use anyhow::{Context, Result};
use lmsadmin_core::Config;
use std::sync::Arc;

/// Initialize the entire application
pub async fn initialize_app(config: Config) -> Result<(Arc<AppState>, axum::Router)> {
    // Initialize telemetry first so validation warnings are visible
    crate::telemetry::init_telemetry(config.environment())
        .map_err(|e| anyhow::anyhow!("Failed to initialize telemetry: {}", e))?;

    // Validate configuration - fail fast on misconfiguration
    validation::validate_config(&config).context("Configuration validation failed")?;

    tracing::info!("Configuration loaded and validated successfully");

    let factory = lmsadmin_storage::create_client_factory(&config)
        .context("Failed to create storage client factory")?;
    let identity = HttpIdentityAdmin::from_config(&config);

    let config = Arc::new(config);
    let state = Arc::new(AppState::new(config.clone(), factory, identity));

    let router = routes::setup_routes(&config, state.clone())?;

    Ok((state, router))
}
