//! Shared building blocks for the possession workspace.
//! - `types`: small response types shared by HTTP handlers.
//! - `utils::logging`: tracing subscriber setup.
//! - `env`: start-up sanity checks for on-disk directories.

pub mod types;
pub mod utils;
pub mod env;
