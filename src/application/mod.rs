//! Application layer - orchestration of domain logic.
//!
//! This layer coordinates the domain logic and manages the runtime behavior:
//! - Exception classification (kinds and message patterns)
//! - Rate limiter (shared sliding windows)
//! - Keep/suppress policies and their metrics
//! - Remote dump check
//!
//! ## Ports
//!
//! The application layer defines ports (traits) that infrastructure
//! adapters must implement. This keeps the application layer independent
//! from infrastructure details.

pub mod check;
pub mod classifier;
pub mod limiter;
pub mod metrics;
pub mod policy;
pub mod ports;
