//! Configuration module for protgraph
//!
//! This module handles:
//! - Layout engine settings (program, arguments, timeout, retries)
//! - Graph policies (which components form the principal subgraph)
//! - Layering of user, project, explicit and environment sources

mod app_config;

pub use app_config::{AppConfig, GraphConfig, LayoutConfig, PROJECT_CONFIG_FILE};
