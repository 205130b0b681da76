//! # Gateway Hex
//!
//! Payment orchestrator, reconciliation worker and HTTP adapter for the
//! payment gateway.
//!
//! ## Architecture
//!
//! - `service/` - Payment orchestrator (registry, adapters and ledger)
//! - `reconciler/` - Interval worker resolving stale records
//! - `inbound/` - HTTP adapter (Axum server)
//!
//! The orchestrator is generic over `R: LedgerRepository`, allowing
//! different repository implementations to be injected. Provider adapters
//! are injected at runtime through a `ProviderRegistry`.

pub mod inbound;
pub mod openapi;
pub mod reconciler;
pub mod service;

#[cfg(test)]
mod service_tests;

pub use reconciler::ReconcileWorker;
pub use service::{OrchestratorSettings, PaymentOrchestrator};
