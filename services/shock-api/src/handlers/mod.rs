//! HTTP handlers.

pub mod catalog;
pub mod health;
pub mod mask;
pub mod shock;
pub mod threshold;
