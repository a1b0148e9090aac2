//! Mutex boundary around one in-memory account.
//!
//! Every read and write of account state goes through [`SharedAccount`], which
//! holds the lock for the whole operation and releases it on every return
//! path. The lock is never held across an `.await`; the level-up flow in
//! [`SharedAccount::toggle_with_rewards_at`] consults the oracle before it
//! locks, then commits the toggle and its stat gains together.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use chrono::{DateTime, Local, TimeZone};
use log::{debug, info};

use super::{Account, LevelUpReward, ProgressSummary, Quest, Stats, ToggleOutcome};
use crate::errors::Result;
use crate::logutil::escape_log;
use crate::oracle::{resolve_proposal, StatAllocator};

#[derive(Debug, Clone)]
pub struct SharedAccount {
    inner: Arc<Mutex<Account>>,
}

impl SharedAccount {
    pub fn new(account: Account) -> Self {
        SharedAccount {
            inner: Arc::new(Mutex::new(account)),
        }
    }

    // No operation panics halfway through a mutation, so a poisoned lock still
    // guards a consistent account.
    fn lock(&self) -> MutexGuard<'_, Account> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Run `f` with shared access to the account.
    pub fn read<R>(&self, f: impl FnOnce(&Account) -> R) -> R {
        f(&self.lock())
    }

    /// Clone of the current state, e.g. for persisting.
    pub fn snapshot(&self) -> Account {
        self.lock().clone()
    }

    pub fn username(&self) -> String {
        self.lock().username.clone()
    }

    pub fn add_quest(&self, name: &str) -> Result<Quest> {
        let mut account = self.lock();
        let quest = account.add_quest(name)?;
        debug!(
            "{} added quest {} ({})",
            account.username,
            quest.id,
            escape_log(&quest.name)
        );
        Ok(quest)
    }

    pub fn remove_quest(&self, index: usize) -> Result<Quest> {
        let mut account = self.lock();
        let quest = account.remove_quest(index)?;
        debug!("{} removed quest {}", account.username, quest.id);
        Ok(quest)
    }

    pub fn quest_by_index(&self, index: usize) -> Option<Quest> {
        self.lock().quest_by_index(index).cloned()
    }

    pub fn set_reset_hour(&self, hour: i64) -> Result<()> {
        let mut account = self.lock();
        account.set_reset_hour(hour)?;
        debug!("{} reset hour set to {}", account.username, account.reset_hour);
        Ok(())
    }

    pub fn toggle_completion_at<Tz: TimeZone>(
        &self,
        quest_id: &str,
        now: &DateTime<Tz>,
    ) -> Result<ToggleOutcome> {
        Ok(self.lock().toggle_completion_at(quest_id, now)?)
    }

    pub fn toggle_completion(&self, quest_id: &str) -> Result<ToggleOutcome> {
        self.toggle_completion_at(quest_id, &Local::now())
    }

    /// Toggle a quest and, for every level-up event it causes, ask `allocator`
    /// for a stat split and add it to the account.
    ///
    /// Allocations are resolved first against a preview of the toggle, with
    /// the lock released. The toggle and all of its stat gains then commit in
    /// one critical section, so no reader ever sees a level without its
    /// points. If the account changed in the meantime, only the levels the
    /// committed toggle actually reached are rewarded; a level with no
    /// prepared allocation gets a random split.
    ///
    /// Stat points are never taken back. Un-completing the quest that caused
    /// a level-up lowers level and experience but keeps the stats, so
    /// re-completing it at the same threshold grants a fresh allocation.
    pub async fn toggle_with_rewards_at<Tz: TimeZone>(
        &self,
        quest_id: &str,
        now: &DateTime<Tz>,
        allocator: &StatAllocator,
    ) -> Result<ToggleOutcome> {
        let (planned_levels, quest_names) = {
            let account = self.lock();
            let mut preview = account.clone();
            let outcome = preview.toggle_completion_at(quest_id, now)?;
            (outcome.new_levels, account.quest_names())
        };

        let mut prepared = Vec::with_capacity(planned_levels.len());
        for &level in &planned_levels {
            prepared.push(allocator.allocate(&quest_names, level).await);
        }

        let mut account = self.lock();
        let mut outcome = account.toggle_completion_at(quest_id, now)?;
        for &level in &outcome.new_levels {
            let reward = match prepared.iter().position(|r| r.level == level) {
                Some(i) => prepared.swap_remove(i),
                None => {
                    debug!("No prepared allocation for level {}; using random split", level);
                    let (gain, source) = resolve_proposal(None);
                    LevelUpReward { level, gain, source }
                }
            };
            account.apply_stat_gain(reward.gain);
            info!(
                "{} reached level {}: {:?} stat gain {:?}",
                account.username, level, reward.source, reward.gain
            );
            outcome.rewards.push(reward);
        }
        Ok(outcome)
    }

    pub async fn toggle_with_rewards(
        &self,
        quest_id: &str,
        allocator: &StatAllocator,
    ) -> Result<ToggleOutcome> {
        self.toggle_with_rewards_at(quest_id, &Local::now(), allocator).await
    }

    pub fn apply_stat_gain(&self, gain: Stats) {
        self.lock().apply_stat_gain(gain);
    }

    pub fn completed_today_at<Tz: TimeZone>(&self, quest_id: &str, now: &DateTime<Tz>) -> bool {
        self.lock().completed_today_at(quest_id, now)
    }

    pub fn summary_at<Tz: TimeZone>(&self, now: &DateTime<Tz>) -> ProgressSummary {
        self.lock().summary_at(now)
    }

    pub fn summary(&self) -> ProgressSummary {
        self.summary_at(&Local::now())
    }

    pub fn streaks(&self) -> (u32, u32) {
        let account = self.lock();
        (account.current_streak, account.longest_streak)
    }
}

impl From<Account> for SharedAccount {
    fn from(account: Account) -> Self {
        SharedAccount::new(account)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use std::thread;

    #[test]
    fn concurrent_toggles_are_serialized() {
        let mut account = Account::new("crowd".into(), "h".into());
        let ids: Vec<String> = (0..8)
            .map(|i| account.add_quest(&format!("quest {i}")).unwrap().id)
            .collect();
        let shared = SharedAccount::new(account);
        let now = Utc.with_ymd_and_hms(2025, 7, 1, 12, 0, 0).unwrap();

        let handles: Vec<_> = ids
            .iter()
            .cloned()
            .map(|id| {
                let shared = shared.clone();
                thread::spawn(move || {
                    // odd number of flips leaves each quest completed
                    for _ in 0..101 {
                        shared.toggle_completion_at(&id, &now).unwrap();
                    }
                })
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }

        let snap = shared.snapshot();
        assert_eq!(snap.experience, 80);
        assert!(ids.iter().all(|id| snap.completed_today_at(id, &now)));
        assert_eq!(snap.current_streak, 1);
        assert_eq!(snap.longest_streak, 1);
    }

    #[test]
    fn failed_operation_leaves_state_untouched() {
        let shared = SharedAccount::new(Account::new("v".into(), "h".into()));
        let before = shared.snapshot();
        assert!(shared.remove_quest(0).is_err());
        assert!(shared.set_reset_hour(42).is_err());
        assert!(shared.add_quest("   ").is_err());
        assert_eq!(shared.snapshot(), before);
    }

    #[tokio::test]
    async fn level_up_applies_one_reward_per_event() {
        let mut account = Account::new("lvl".into(), "h".into());
        let id = account.add_quest("Squats").unwrap().id;
        account.experience = 95;
        let shared = SharedAccount::new(account);
        let now = Utc.with_ymd_and_hms(2025, 7, 1, 12, 0, 0).unwrap();

        let outcome = shared
            .toggle_with_rewards_at(&id, &now, &StatAllocator::offline())
            .await
            .unwrap();
        assert!(outcome.leveled_up);
        assert_eq!(outcome.rewards.len(), 1);
        assert_eq!(outcome.rewards[0].gain.total(), 4);
        let snap = shared.snapshot();
        assert_eq!(snap.level, 2);
        assert_eq!(snap.stats.total(), Stats::for_level(1).total() + 4);
    }
}
