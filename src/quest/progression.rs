//! Completion toggles, experience and leveling.
//!
//! Each quest completion is worth [`EXP_PER_QUEST`]. Reaching
//! `level * EXP_PER_LEVEL` experience raises the level; every single
//! threshold crossing is a level-up event and earns a stat allocation
//! (see [`crate::oracle`]). Un-completing a quest reverses the change
//! exactly, including any level it had granted.

use chrono::{DateTime, Local, TimeZone};

use super::{Account, Stats};
use crate::errors::ValidationError;
use crate::oracle::AllocationSource;

pub const EXP_PER_QUEST: u32 = 10;
pub const EXP_PER_LEVEL: u32 = 100;
const MAX_LEVEL: u32 = u32::MAX / EXP_PER_LEVEL;

/// Stat points granted for reaching `level`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LevelUpReward {
    pub level: u32,
    pub gain: Stats,
    pub source: AllocationSource,
}

/// Result of flipping one quest's completion for today.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToggleOutcome {
    pub quest_id: String,
    pub day_key: String,
    /// Completion state after the flip.
    pub completed: bool,
    /// True when the quest went from open to completed and earned experience.
    pub gained_exp: bool,
    pub leveled_up: bool,
    /// One entry per level-up event, in the order they happened.
    pub new_levels: Vec<u32>,
    /// Filled in by [`super::SharedAccount::toggle_with_rewards_at`].
    pub rewards: Vec<LevelUpReward>,
}

impl Account {
    /// Flip `quest_id` for the logical day containing `now`, adjust experience
    /// and level, then refresh the streak.
    ///
    /// Unknown quest ids are rejected before anything is written.
    pub fn toggle_completion_at<Tz: TimeZone>(
        &mut self,
        quest_id: &str,
        now: &DateTime<Tz>,
    ) -> Result<ToggleOutcome, ValidationError> {
        if self.find_quest(quest_id).is_none() {
            return Err(ValidationError::UnknownQuest(quest_id.to_string()));
        }
        let today = self.day_key_at(now);
        let row = self.completions.entry(today.clone()).or_default();
        let was = row.get(quest_id).copied().unwrap_or(false);
        row.insert(quest_id.to_string(), !was);

        let new_levels = if was {
            self.lose_experience(EXP_PER_QUEST);
            Vec::new()
        } else {
            self.gain_experience(EXP_PER_QUEST)
        };
        self.refresh_streak_at(now);

        Ok(ToggleOutcome {
            quest_id: quest_id.to_string(),
            day_key: today,
            completed: !was,
            gained_exp: !was,
            leveled_up: !new_levels.is_empty(),
            new_levels,
            rewards: Vec::new(),
        })
    }

    pub fn toggle_completion(&mut self, quest_id: &str) -> Result<ToggleOutcome, ValidationError> {
        self.toggle_completion_at(quest_id, &Local::now())
    }

    /// Experience needed to leave the current level.
    pub fn exp_threshold_for_next_level(&self) -> u32 {
        self.level.saturating_mul(EXP_PER_LEVEL)
    }

    /// Experience earned since the current level began.
    pub fn exp_within_current_level(&self) -> u32 {
        let base = (self.level.saturating_sub(1)).saturating_mul(EXP_PER_LEVEL);
        self.experience.saturating_sub(base)
    }

    /// Add stat points from a level-up allocation on top of existing stats.
    pub fn apply_stat_gain(&mut self, gain: Stats) {
        self.stats = self.stats.saturating_add(gain);
    }

    /// Returns the levels reached, one per threshold crossed.
    fn gain_experience(&mut self, amount: u32) -> Vec<u32> {
        self.experience = self.experience.saturating_add(amount);
        let mut reached = Vec::new();
        while self.level < MAX_LEVEL && self.experience >= self.exp_threshold_for_next_level() {
            self.level += 1;
            reached.push(self.level);
        }
        reached
    }

    fn lose_experience(&mut self, amount: u32) {
        self.experience = self.experience.saturating_sub(amount);
        while self.level > 1 && self.experience < (self.level - 1).saturating_mul(EXP_PER_LEVEL) {
            self.level -= 1;
        }
    }
}
