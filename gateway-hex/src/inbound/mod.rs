//! HTTP Inbound Adapter
//!
//! Axum-based HTTP server that drives the payment orchestrator.

pub mod auth;
pub mod handlers;
mod rate_limit;
mod server;

pub use auth::{Caller, USER_ID_HEADER};
pub use server::HttpServer;
