//! # Quest Module - Per-Account Progress Engine
//!
//! An [`Account`] owns everything the tracker knows about one user: the quest
//! list, the completion ledger keyed by logical day, experience and level,
//! the four stats and the streak counters.
//!
//! ## Submodules
//!
//! - [`progression`] - completion toggles, experience and leveling
//! - [`streak`] - consecutive-day streak bookkeeping
//! - [`guard`] - [`SharedAccount`], the mutex boundary around one account
//!
//! ## Record layout
//!
//! Accounts serialize to a single JSON object. Records written before stats
//! and streaks existed (schema version 1) are upgraded while deserializing:
//! absent stats become `10 + level` each, an absent or out-of-range reset hour
//! becomes [`DEFAULT_RESET_HOUR`], an absent ledger becomes empty. Only fields
//! that are literally missing get defaults; a stored `0` stays `0`.

pub mod guard;
pub mod progression;
pub mod streak;

pub use guard::SharedAccount;
pub use progression::{LevelUpReward, ToggleOutcome, EXP_PER_LEVEL, EXP_PER_QUEST};

use std::collections::BTreeMap;

use chrono::{DateTime, Duration, Local, TimeZone};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::calendar;
use crate::errors::ValidationError;
use crate::validation::{validate_quest_name, validate_reset_hour};

pub const DEFAULT_LEVEL: u32 = 1;
pub const DEFAULT_RESET_HOUR: u32 = 4;
pub const BASE_STAT: u32 = 10;
pub const CURRENT_SCHEMA_VERSION: u8 = 2;

/// Day key -> quest id -> completed.
pub type Ledger = BTreeMap<String, BTreeMap<String, bool>>;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Quest {
    pub id: String,
    pub name: String,
}

impl Quest {
    fn new(name: String) -> Self {
        Quest {
            id: format!("q_{}", Uuid::new_v4().simple()),
            name,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Stats {
    #[serde(alias = "str")]
    pub strength: u32,
    #[serde(alias = "vit")]
    pub vitality: u32,
    #[serde(alias = "agi")]
    pub agility: u32,
    #[serde(alias = "int")]
    pub intelligence: u32,
}

impl Stats {
    pub fn uniform(value: u32) -> Self {
        Stats {
            strength: value,
            vitality: value,
            agility: value,
            intelligence: value,
        }
    }

    /// Starting stats for an account at `level`.
    pub fn for_level(level: u32) -> Self {
        Self::uniform(BASE_STAT + level)
    }

    pub fn total(&self) -> u32 {
        self.strength + self.vitality + self.agility + self.intelligence
    }

    /// Values in allocation priority order: STR, VIT, AGI, INT.
    pub fn to_array(self) -> [u32; 4] {
        [self.strength, self.vitality, self.agility, self.intelligence]
    }

    pub fn from_array(values: [u32; 4]) -> Self {
        Stats {
            strength: values[0],
            vitality: values[1],
            agility: values[2],
            intelligence: values[3],
        }
    }

    pub fn saturating_add(self, other: Stats) -> Self {
        Stats {
            strength: self.strength.saturating_add(other.strength),
            vitality: self.vitality.saturating_add(other.vitality),
            agility: self.agility.saturating_add(other.agility),
            intelligence: self.intelligence.saturating_add(other.intelligence),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "StoredAccount")]
pub struct Account {
    pub schema_version: u8,
    pub username: String,
    pub password_hash: String,
    pub quests: Vec<Quest>,
    pub level: u32,
    pub experience: u32,
    pub stats: Stats,
    pub current_streak: u32,
    pub longest_streak: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_complete_day: Option<String>,
    pub completions: Ledger,
    pub reset_hour: u32,
}

/// Read-side snapshot for status displays.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProgressSummary {
    pub level: u32,
    pub experience: u32,
    pub exp_within_level: u32,
    pub exp_for_next_level: u32,
    pub stats: Stats,
    pub current_streak: u32,
    pub longest_streak: u32,
    pub completed_today: usize,
    pub total_quests: usize,
    pub time_until_reset: Duration,
}

impl Account {
    /// Fresh account as created by registration. `username` must already be
    /// normalized.
    pub fn new(username: String, password_hash: String) -> Self {
        Account {
            schema_version: CURRENT_SCHEMA_VERSION,
            username,
            password_hash,
            quests: Vec::new(),
            level: DEFAULT_LEVEL,
            experience: 0,
            stats: Stats::for_level(DEFAULT_LEVEL),
            current_streak: 0,
            longest_streak: 0,
            last_complete_day: None,
            completions: Ledger::new(),
            reset_hour: DEFAULT_RESET_HOUR,
        }
    }

    /// Append a quest with a fresh unique id.
    pub fn add_quest(&mut self, name: &str) -> Result<Quest, ValidationError> {
        let name = validate_quest_name(name)?;
        let quest = Quest::new(name);
        self.quests.push(quest.clone());
        Ok(quest)
    }

    /// Remove the quest at `index`. Ledger rows that mention it are kept.
    pub fn remove_quest(&mut self, index: usize) -> Result<Quest, ValidationError> {
        if index >= self.quests.len() {
            return Err(ValidationError::QuestIndexOutOfRange {
                index,
                len: self.quests.len(),
            });
        }
        Ok(self.quests.remove(index))
    }

    pub fn quest_by_index(&self, index: usize) -> Option<&Quest> {
        self.quests.get(index)
    }

    pub fn find_quest(&self, quest_id: &str) -> Option<&Quest> {
        self.quests.iter().find(|q| q.id == quest_id)
    }

    pub fn quest_names(&self) -> Vec<String> {
        self.quests.iter().map(|q| q.name.clone()).collect()
    }

    /// Change the reset hour. Out-of-range values leave the account untouched.
    /// Existing ledger rows keep their keys.
    pub fn set_reset_hour(&mut self, hour: i64) -> Result<(), ValidationError> {
        self.reset_hour = validate_reset_hour(hour)?;
        Ok(())
    }

    pub fn day_key_at<Tz: TimeZone>(&self, now: &DateTime<Tz>) -> String {
        calendar::day_key(now, self.reset_hour)
    }

    pub fn completed_on(&self, day_key: &str, quest_id: &str) -> bool {
        self.completions
            .get(day_key)
            .and_then(|row| row.get(quest_id))
            .copied()
            .unwrap_or(false)
    }

    pub fn completed_today_at<Tz: TimeZone>(&self, quest_id: &str, now: &DateTime<Tz>) -> bool {
        self.completed_on(&self.day_key_at(now), quest_id)
    }

    pub fn completed_today(&self, quest_id: &str) -> bool {
        self.completed_today_at(quest_id, &Local::now())
    }

    /// Number of current quests completed in the logical day containing `now`.
    pub fn completed_count_today_at<Tz: TimeZone>(&self, now: &DateTime<Tz>) -> usize {
        let today = self.day_key_at(now);
        self.quests
            .iter()
            .filter(|q| self.completed_on(&today, &q.id))
            .count()
    }

    pub fn next_reset_at<Tz: TimeZone>(&self, now: &DateTime<Tz>) -> DateTime<Tz> {
        calendar::next_reset_instant(now, self.reset_hour)
    }

    pub fn time_until_reset_at<Tz: TimeZone>(&self, now: &DateTime<Tz>) -> Duration {
        calendar::time_until_reset(now, self.reset_hour)
    }

    pub fn time_until_reset(&self) -> Duration {
        self.time_until_reset_at(&Local::now())
    }

    pub fn summary_at<Tz: TimeZone>(&self, now: &DateTime<Tz>) -> ProgressSummary {
        ProgressSummary {
            level: self.level,
            experience: self.experience,
            exp_within_level: self.exp_within_current_level(),
            exp_for_next_level: self.exp_threshold_for_next_level(),
            stats: self.stats,
            current_streak: self.current_streak,
            longest_streak: self.longest_streak,
            completed_today: self.completed_count_today_at(now),
            total_quests: self.quests.len(),
            time_until_reset: self.time_until_reset_at(now),
        }
    }
}

/// On-disk shape accepted by the deserializer, including legacy field names.
#[derive(Deserialize)]
struct StoredAccount {
    #[serde(default)]
    schema_version: Option<u8>,
    username: String,
    #[serde(default)]
    password_hash: String,
    #[serde(default, alias = "habits")]
    quests: Option<Vec<Quest>>,
    #[serde(default)]
    level: Option<i64>,
    #[serde(default, alias = "exp")]
    experience: Option<i64>,
    #[serde(default)]
    stats: Option<Stats>,
    #[serde(default)]
    current_streak: Option<u32>,
    #[serde(default)]
    longest_streak: Option<u32>,
    #[serde(default)]
    last_complete_day: Option<String>,
    #[serde(default, alias = "daily_completions")]
    completions: Option<Ledger>,
    #[serde(default, alias = "day_reset_hour")]
    reset_hour: Option<i64>,
}

impl From<StoredAccount> for Account {
    fn from(stored: StoredAccount) -> Self {
        let level = match stored.level {
            Some(l) if l >= 1 => u32::try_from(l).unwrap_or(u32::MAX),
            _ => DEFAULT_LEVEL,
        };
        let experience = stored
            .experience
            .map(|e| u32::try_from(e.max(0)).unwrap_or(u32::MAX))
            .unwrap_or(0);
        let reset_hour = stored
            .reset_hour
            .and_then(|h| validate_reset_hour(h).ok())
            .unwrap_or(DEFAULT_RESET_HOUR);
        let current_streak = stored.current_streak.unwrap_or(0);
        let longest_streak = stored.longest_streak.unwrap_or(0).max(current_streak);
        if stored.schema_version.unwrap_or(1) < CURRENT_SCHEMA_VERSION {
            log::debug!(
                "Upgrading account record for {} from schema v{}",
                stored.username,
                stored.schema_version.unwrap_or(1)
            );
        }
        Account {
            schema_version: CURRENT_SCHEMA_VERSION,
            username: stored.username,
            password_hash: stored.password_hash,
            quests: stored.quests.unwrap_or_default(),
            level,
            experience,
            stats: stored.stats.unwrap_or_else(|| Stats::for_level(level)),
            current_streak,
            longest_streak,
            last_complete_day: stored.last_complete_day.filter(|d| !d.is_empty()),
            completions: stored.completions.unwrap_or_default(),
            reset_hour,
        }
    }
}
