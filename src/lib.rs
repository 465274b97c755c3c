//! # Docsite Backend Library
//!
//! This library provides the core functionality for the docsite backend:
//! verified GitHub webhook intake, Discord account linking and GitHub sponsor
//! status, together with the handlers, models and server configuration.

pub mod auth;
pub mod config;
pub mod connect_flow;
pub mod connectors;
pub mod db;
pub mod error;
pub mod events;
pub mod handlers;
pub mod models;
pub mod repositories;
pub mod server;
pub mod sponsor_status;
pub mod telemetry;
pub mod webhook_verification;
pub use migration;
