//! Bootstrap module for initializing the quoting layer
//!
//! This module handles:
//! - Configuration loading
//! - Service initialization and dependency injection

pub mod config;
pub mod services;

pub use config::{load_config, load_config_from};
pub use services::{init_services, Services};
