//! Storage primitives for the service layer
//!
//! Crash-safe file replacement used by the JSON-backed state store.

pub mod atomic;
