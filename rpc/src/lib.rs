//! JSON HTTP server for the ballot coordinator.
//!
//! Provides endpoints for:
//! - Vote submission
//! - Session status, tally and history queries
//! - Replica health
//! - The recent-event feed
//! - Admin session transitions (start, stop, publish, rollover)
//!
//! The layer is deliberately thin: every policy decision lives in the
//! coordinator. Admin endpoints carry no authentication here; capability
//! checks belong to the deployment boundary in front of this server.

pub mod error;
pub mod handlers;
pub mod server;

pub use error::RpcError;
pub use server::{router, AppState, RpcServer};
