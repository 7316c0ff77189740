//! HTTP API for the climate shock service.

pub mod config;
pub mod error;
pub mod handlers;
pub mod state;
