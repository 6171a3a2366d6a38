use std::collections::BTreeSet;

use configs::{GroupMode, PossessionConfig};

/// Allow-list policy deciding which groups may be possessed.
#[derive(Debug, Clone, Default)]
pub struct GroupFilter {
    mode: GroupMode,
    ids: BTreeSet<i64>,
}

impl GroupFilter {
    pub fn new(mode: GroupMode, ids: impl IntoIterator<Item = i64>) -> Self {
        Self { mode, ids: ids.into_iter().collect() }
    }

    pub fn from_config(cfg: &PossessionConfig) -> Self {
        Self::new(cfg.group_mode, cfg.group_list.iter().copied())
    }

    pub fn mode(&self) -> GroupMode {
        self.mode
    }

    /// Non-positive ids are never allowed.
    pub fn is_allowed(&self, group_id: i64) -> bool {
        if group_id <= 0 {
            return false;
        }
        match self.mode {
            GroupMode::Whitelist => self.ids.contains(&group_id),
            GroupMode::Blacklist => !self.ids.contains(&group_id),
            GroupMode::None => true,
        }
    }

    /// Keep allowed ids, preserving input order.
    pub fn filter(&self, group_ids: impl IntoIterator<Item = i64>) -> Vec<i64> {
        group_ids.into_iter().filter(|g| self.is_allowed(*g)).collect()
    }
}
