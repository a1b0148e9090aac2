//! Consecutive-day streaks.
//!
//! A day counts toward the streak when every current quest is completed in
//! that day's ledger row. The tracker only looks at today's row and the two
//! persisted counters plus `last_complete_day`; it never scans history.

use chrono::{DateTime, TimeZone};

use super::Account;
use crate::calendar;

impl Account {
    /// True when the account has quests and all of them are done on `day_key`.
    pub fn all_complete_on(&self, day_key: &str) -> bool {
        !self.quests.is_empty() && self.quests.iter().all(|q| self.completed_on(day_key, &q.id))
    }

    /// Re-evaluate the streak after a ledger change in the day containing `now`.
    pub fn refresh_streak_at<Tz: TimeZone>(&mut self, now: &DateTime<Tz>) {
        let today = calendar::day_key(now, self.reset_hour);
        let credited_today = self.last_complete_day.as_deref() == Some(today.as_str());

        if !self.all_complete_on(&today) {
            if credited_today {
                // Withdraw today's credit.
                self.current_streak = self.current_streak.saturating_sub(1);
                self.last_complete_day = None;
            }
            return;
        }

        if credited_today {
            return;
        }
        let yesterday = calendar::previous_day_key(now, self.reset_hour);
        if self.last_complete_day.as_deref() == Some(yesterday.as_str()) {
            self.current_streak = self.current_streak.saturating_add(1);
        } else {
            self.current_streak = 1;
        }
        self.last_complete_day = Some(today);
        self.longest_streak = self.longest_streak.max(self.current_streak);
    }
}
