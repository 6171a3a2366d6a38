#![cfg(test)]
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Mutex;

use async_trait::async_trait;
use tempfile::TempDir;
use tokio::sync::Notify;
use tokio::time::Instant;

use crate::directory::{GroupDirectory, GroupMember};
use crate::errors::ServiceError;

/// Fresh state file path inside a temp directory that is removed on drop.
pub fn temp_state_dir() -> (TempDir, PathBuf) {
    let dir = tempfile::Builder::new()
        .prefix("possession_svc_")
        .tempdir()
        .expect("create temp dir");
    let path = dir.path().join("state.json");
    (dir, path)
}

/// In-memory platform with switchable failures and call recording.
#[derive(Default)]
pub struct MockDirectory {
    self_id: i64,
    groups: Vec<i64>,
    members: HashMap<i64, Vec<GroupMember>>,
    fail_groups: bool,
    fail_rename: bool,
    fail_poke: bool,
    renames: Mutex<Vec<(i64, i64, String)>>,
    pokes: Mutex<Vec<(i64, i64)>>,
    group_calls: Mutex<Vec<Instant>>,
    pub renamed: Notify,
    pub groups_listed: Notify,
}

impl MockDirectory {
    pub fn new(self_id: i64) -> Self {
        Self { self_id, ..Default::default() }
    }

    pub fn with_group(mut self, group_id: i64, members: Vec<GroupMember>) -> Self {
        self.groups.push(group_id);
        self.members.insert(group_id, members);
        self
    }

    pub fn failing_groups(mut self) -> Self {
        self.fail_groups = true;
        self
    }

    pub fn failing_rename(mut self) -> Self {
        self.fail_rename = true;
        self
    }

    pub fn failing_poke(mut self) -> Self {
        self.fail_poke = true;
        self
    }

    pub fn renames(&self) -> Vec<(i64, i64, String)> {
        self.renames.lock().unwrap().clone()
    }

    pub fn pokes(&self) -> Vec<(i64, i64)> {
        self.pokes.lock().unwrap().clone()
    }

    pub fn group_calls(&self) -> Vec<Instant> {
        self.group_calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl GroupDirectory for MockDirectory {
    async fn get_identity(&self) -> Result<i64, ServiceError> {
        Ok(self.self_id)
    }

    async fn list_groups(&self) -> Result<Vec<i64>, ServiceError> {
        self.group_calls.lock().unwrap().push(Instant::now());
        self.groups_listed.notify_one();
        if self.fail_groups {
            return Err(ServiceError::Remote("get_group_list: connection refused".into()));
        }
        Ok(self.groups.clone())
    }

    async fn list_members(&self, group_id: i64) -> Result<Vec<GroupMember>, ServiceError> {
        Ok(self.members.get(&group_id).cloned().unwrap_or_default())
    }

    async fn set_own_display_name(&self, group_id: i64, self_id: i64, name: &str) -> Result<(), ServiceError> {
        if self.fail_rename {
            return Err(ServiceError::Remote("set_group_card: retcode=100".into()));
        }
        self.renames.lock().unwrap().push((group_id, self_id, name.to_string()));
        self.renamed.notify_one();
        Ok(())
    }

    async fn notify_member(&self, group_id: i64, member_id: i64) -> Result<(), ServiceError> {
        if self.fail_poke {
            return Err(ServiceError::Remote("group_poke: unsupported".into()));
        }
        self.pokes.lock().unwrap().push((group_id, member_id));
        Ok(())
    }
}
