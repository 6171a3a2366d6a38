//! Runtime environment helpers
//!
//! Thin wrapper around `common::env` so binary crates can prepare the data
//! directory via `service::runtime` without depending directly on `common`.

/// Ensure the directory holding the state file exists.
pub async fn ensure_env(state_path: &str) -> anyhow::Result<()> {
    common::env::ensure_parent_dir(state_path).await
}
