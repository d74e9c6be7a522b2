//! Library crate for arena-sync, exposing modules for binaries and integration tests.

/// Runtime configuration.
pub mod config;
/// Persistence and remote access.
pub mod dao;
mod dto;
mod error;
/// HTTP surface.
pub mod routes;
/// Operations behind the routes.
pub mod services;
/// Per-context state and background tasks.
pub mod state;
