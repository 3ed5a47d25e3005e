// ABOUTME: Library root for rolltrack - exposes public types for testing.
// ABOUTME: The main binary is in main.rs.

pub mod config;
pub mod error;
pub mod kubectl;
pub mod multitrack;
pub mod output;
pub mod signals;
pub mod types;
