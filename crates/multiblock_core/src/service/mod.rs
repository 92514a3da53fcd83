//! Core use-case services.
//!
//! # Responsibility
//! - Orchestrate repository calls into use-case level APIs.
//! - Keep the CLI and hosts decoupled from storage details.

pub mod child_config_service;
pub mod privacy_service;
pub mod relationship_service;
