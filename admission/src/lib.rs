//! Admission queue — bounds the number of in-flight vote operations.
//!
//! A counting semaphore with FIFO wait order: once two requests are both
//! waiting, the earlier arrival is always admitted first. Requests that wait
//! past the configured timeout are rejected as busy instead of blocking
//! indefinitely; that rejection is the one locally-recoverable failure and
//! callers may retry with backoff.

pub mod queue;

pub use queue::{AdmissionError, AdmissionPermit, AdmissionQueue, DEFAULT_MAX_CONCURRENT};
