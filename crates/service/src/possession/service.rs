use std::sync::Arc;

use rand::seq::SliceRandom;
use rand::Rng;
use tracing::{debug, info, instrument, warn};

use crate::directory::{GroupDirectory, GroupMember};
use crate::errors::ServiceError;
use crate::metrics;
use crate::possession::policy::GroupFilter;
use crate::store::{PossessionRecord, PossessionStore};

/// A completed possession: the bot now wears `target_name` in `group_id`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Possession {
    pub group_id: i64,
    pub target_user_id: i64,
    pub target_name: String,
}

/// Result of one background cycle. Only `Possessed` writes a record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CycleOutcome {
    Possessed(Possession),
    NoEligibleGroup,
    NoEligibleMember { group_id: i64 },
    RenameFailed { group_id: i64 },
}

/// Result of an on-demand possession of a given group.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PossessOutcome {
    Possessed(Possession),
    /// No member other than the bot, or the rename was refused.
    NoEligibleTarget,
    GroupNotAllowed,
}

enum Acted {
    Possessed(Possession),
    NoMember,
    RenameFailed,
}

/// Pick a member other than `self_id` uniformly at random.
pub(crate) fn pick_target<R: Rng + ?Sized>(
    members: &[GroupMember],
    self_id: i64,
    rng: &mut R,
) -> Option<GroupMember> {
    let candidates: Vec<&GroupMember> = members
        .iter()
        .filter(|m| m.user_id > 0 && m.user_id != self_id)
        .collect();
    candidates.choose(rng).map(|m| (*m).clone())
}

/// Select → act → record, shared by the scheduler and foreground callers.
pub struct PossessionService {
    directory: Arc<dyn GroupDirectory>,
    store: Arc<dyn PossessionStore>,
    filter: GroupFilter,
}

impl PossessionService {
    pub fn new(directory: Arc<dyn GroupDirectory>, store: Arc<dyn PossessionStore>, filter: GroupFilter) -> Self {
        Self { directory, store, filter }
    }

    /// One full background cycle over all eligible groups.
    #[instrument(skip(self))]
    pub async fn run_cycle(&self) -> Result<CycleOutcome, ServiceError> {
        let self_id = self.directory.get_identity().await?;
        let groups = self.directory.list_groups().await?;
        let candidates = self.filter.filter(groups);
        let picked = candidates.choose(&mut rand::thread_rng()).copied();
        let Some(group_id) = picked else {
            debug!(self_id, mode = %self.filter.mode(), "no eligible group");
            metrics::POSSESSION_ABANDONED_TOTAL.inc();
            return Ok(CycleOutcome::NoEligibleGroup);
        };
        debug!(self_id, group_id, candidates = candidates.len(), "group selected");

        match self.act(group_id, self_id).await? {
            Acted::Possessed(p) => {
                self.record(self_id, &p).await?;
                info!(group_id, target_user_id = p.target_user_id, target_name = %p.target_name, "auto possession");
                Ok(CycleOutcome::Possessed(p))
            }
            Acted::NoMember => Ok(CycleOutcome::NoEligibleMember { group_id }),
            Acted::RenameFailed => Ok(CycleOutcome::RenameFailed { group_id }),
        }
    }

    /// Possess a specific group now.
    #[instrument(skip(self))]
    pub async fn possess_group(&self, group_id: i64) -> Result<PossessOutcome, ServiceError> {
        if !self.filter.is_allowed(group_id) {
            debug!(group_id, mode = %self.filter.mode(), "group rejected by filter");
            return Ok(PossessOutcome::GroupNotAllowed);
        }
        let self_id = self.directory.get_identity().await?;
        match self.act(group_id, self_id).await? {
            Acted::Possessed(p) => {
                self.record(self_id, &p).await?;
                Ok(PossessOutcome::Possessed(p))
            }
            Acted::NoMember | Acted::RenameFailed => Ok(PossessOutcome::NoEligibleTarget),
        }
    }

    /// Latest recorded possession of the bot in `group_id`.
    pub async fn status(&self, group_id: i64) -> Result<Option<PossessionRecord>, ServiceError> {
        let self_id = self.directory.get_identity().await?;
        Ok(self.store.get(&self_id.to_string(), &group_id.to_string()).await)
    }

    /// Forget the recorded possession for `group_id`; returns whether one existed.
    pub async fn clear(&self, group_id: i64) -> Result<bool, ServiceError> {
        let self_id = self.directory.get_identity().await?;
        self.store.clear(&self_id.to_string(), &group_id.to_string()).await
    }

    async fn act(&self, group_id: i64, self_id: i64) -> Result<Acted, ServiceError> {
        let members = self.directory.list_members(group_id).await?;
        let picked = pick_target(&members, self_id, &mut rand::thread_rng());
        let Some(target) = picked else {
            info!(group_id, members = members.len(), "no member to possess");
            metrics::POSSESSION_ABANDONED_TOTAL.inc();
            return Ok(Acted::NoMember);
        };
        let target_name = target.display_name();

        if let Err(e) = self.directory.set_own_display_name(group_id, self_id, &target_name).await {
            warn!(group_id, error = %e, "set group card failed");
            metrics::POSSESSION_ABANDONED_TOTAL.inc();
            return Ok(Acted::RenameFailed);
        }
        info!(group_id, self_id, new_card = %target_name, from_user = target.user_id, "group card updated");

        // 戳一戳只是附带效果，失败不影响本次夺舍
        if let Err(e) = self.directory.notify_member(group_id, target.user_id).await {
            warn!(group_id, user_id = target.user_id, error = %e, "poke failed");
        }

        Ok(Acted::Possessed(Possession { group_id, target_user_id: target.user_id, target_name }))
    }

    async fn record(&self, self_id: i64, p: &Possession) -> Result<(), ServiceError> {
        self.store
            .set(&self_id.to_string(), &p.group_id.to_string(), p.target_user_id, &p.target_name)
            .await?;
        metrics::POSSESSION_SUCCESS_TOTAL.inc();
        Ok(())
    }
}
