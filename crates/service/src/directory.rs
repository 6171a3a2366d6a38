use async_trait::async_trait;

use crate::errors::ServiceError;

/// Label used when a member has neither a group card nor a nickname.
pub const FALLBACK_DISPLAY_NAME: &str = "群友";

/// One member of a group as reported by the platform.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GroupMember {
    pub user_id: i64,
    /// Group-specific alias ("group card").
    pub card: Option<String>,
    pub nickname: Option<String>,
}

impl GroupMember {
    pub fn new(user_id: i64, card: Option<&str>, nickname: Option<&str>) -> Self {
        Self {
            user_id,
            card: card.map(str::to_string),
            nickname: nickname.map(str::to_string),
        }
    }

    /// Trimmed card, else trimmed nickname, else [`FALLBACK_DISPLAY_NAME`].
    /// Blank values count as absent; inner whitespace is kept.
    pub fn display_name(&self) -> String {
        [self.card.as_deref(), self.nickname.as_deref()]
            .into_iter()
            .flatten()
            .map(str::trim)
            .find(|s| !s.is_empty())
            .unwrap_or(FALLBACK_DISPLAY_NAME)
            .to_string()
    }
}

/// Read and write access to the chat platform's groups.
///
/// The first three methods enumerate, the last two act. Each call is one
/// remote effect, so an error never leaves a half-applied change behind.
#[async_trait]
pub trait GroupDirectory: Send + Sync {
    /// Account id of the bot itself.
    async fn get_identity(&self) -> Result<i64, ServiceError>;
    async fn list_groups(&self) -> Result<Vec<i64>, ServiceError>;
    async fn list_members(&self, group_id: i64) -> Result<Vec<GroupMember>, ServiceError>;
    /// Set the bot's own group card in `group_id`.
    async fn set_own_display_name(&self, group_id: i64, self_id: i64, name: &str) -> Result<(), ServiceError>;
    /// Poke a member. Callers treat failures as non-fatal.
    async fn notify_member(&self, group_id: i64, member_id: i64) -> Result<(), ServiceError>;
}
