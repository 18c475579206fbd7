// ABOUTME: Library root for stagehand - exposes public types for testing.
// ABOUTME: The main binary is in main.rs.

pub mod config;
pub mod deploy;
pub mod error;
pub mod ingress;
pub mod model;
pub mod nginx;
pub mod output;
pub mod reconcile;
