use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::errors::ServiceError;

/// Latest successful possession for one `(owner, group)` slot.
///
/// Field names on disk are `user_id` and `name`; existing state files use them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PossessionRecord {
    #[serde(rename = "user_id")]
    pub target_user_id: i64,
    #[serde(rename = "name")]
    pub target_name: String,
}

/// Key of a possession slot inside the state file: `"{owner_id}#{group_id}"`.
pub fn composite_key(owner_id: &str, group_id: &str) -> String {
    format!("{owner_id}#{group_id}")
}

/// Trait abstraction for possession record storage.
/// Mutations return only after the new state is durable.
#[async_trait]
pub trait PossessionStore: Send + Sync {
    async fn get(&self, owner_id: &str, group_id: &str) -> Option<PossessionRecord>;
    async fn set(
        &self,
        owner_id: &str,
        group_id: &str,
        target_user_id: i64,
        target_name: &str,
    ) -> Result<(), ServiceError>;
    /// Remove a slot and persist; returns whether it existed.
    async fn clear(&self, owner_id: &str, group_id: &str) -> Result<bool, ServiceError>;
}
