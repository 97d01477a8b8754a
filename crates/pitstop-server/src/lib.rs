//! HTTP CRUD service for the shop directory.
//!
//! A thin axum surface over `pitstop-pool`: five routes, JSON in and out,
//! one pooled executor shared by every handler.

pub mod config;
pub mod error;
pub mod routes;
pub mod shop;

pub use config::ServerConfig;
pub use routes::{AppState, router};
