//! Virtual calendar: maps wall-clock instants to logical quest days.
//!
//! A logical day starts at `reset_hour:00:00` local time and runs until the
//! same time on the next calendar date. Instants before the reset hour belong
//! to the previous date. All functions are generic over the time zone of the
//! instant they receive, so the same rules apply to `Local`, `Utc` or a fixed
//! offset.

use chrono::{DateTime, Duration, NaiveDate, TimeZone, Timelike};

/// Format of ledger day keys.
pub const DAY_KEY_FORMAT: &str = "%Y-%m-%d";

/// Calendar date of the logical day containing `now`.
pub fn logical_date<Tz: TimeZone>(now: &DateTime<Tz>, reset_hour: u32) -> NaiveDate {
    let date = now.date_naive();
    if now.hour() < reset_hour {
        date.pred_opt().unwrap_or(date)
    } else {
        date
    }
}

pub fn day_key<Tz: TimeZone>(now: &DateTime<Tz>, reset_hour: u32) -> String {
    logical_date(now, reset_hour).format(DAY_KEY_FORMAT).to_string()
}

/// Key of the logical day before the one containing `now`.
pub fn previous_day_key<Tz: TimeZone>(now: &DateTime<Tz>, reset_hour: u32) -> String {
    let today = logical_date(now, reset_hour);
    today.pred_opt().unwrap_or(today).format(DAY_KEY_FORMAT).to_string()
}

/// The next strictly-future reset instant. At or after today's reset the
/// answer is tomorrow's.
pub fn next_reset_instant<Tz: TimeZone>(now: &DateTime<Tz>, reset_hour: u32) -> DateTime<Tz> {
    let tz = now.timezone();
    let today = now.date_naive();
    if let Some(reset) = reset_at(&tz, today, reset_hour) {
        if reset > *now {
            return reset;
        }
    }
    today
        .succ_opt()
        .and_then(|tomorrow| reset_at(&tz, tomorrow, reset_hour))
        .filter(|reset| reset > now)
        .unwrap_or_else(|| now.clone() + Duration::hours(24))
}

/// Time left in the current logical day; never negative.
pub fn time_until_reset<Tz: TimeZone>(now: &DateTime<Tz>, reset_hour: u32) -> Duration {
    let next = next_reset_instant(now, reset_hour);
    next.signed_duration_since(now.clone()).max(Duration::zero())
}

/// Resolve `date` at `hour:00:00` in `tz`. Ambiguous local times take the
/// earlier instant; a time inside a DST gap moves to the first hour after it.
fn reset_at<Tz: TimeZone>(tz: &Tz, date: NaiveDate, hour: u32) -> Option<DateTime<Tz>> {
    let naive = date.and_hms_opt(hour, 0, 0)?;
    tz.from_local_datetime(&naive)
        .earliest()
        .or_else(|| tz.from_local_datetime(&(naive + Duration::hours(1))).earliest())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{FixedOffset, LocalResult, NaiveDateTime, Utc};

    /// US-Eastern-like zone with 2025 transitions only: clocks jump from
    /// 02:00 to 03:00 on March 9 and fall back from 02:00 to 01:00 on Nov 2.
    #[derive(Debug, Clone, Copy)]
    struct Eastern2025;

    impl Eastern2025 {
        fn est() -> FixedOffset {
            FixedOffset::west_opt(5 * 3600).unwrap()
        }

        fn edt() -> FixedOffset {
            FixedOffset::west_opt(4 * 3600).unwrap()
        }

        fn local(m: u32, d: u32, h: u32) -> NaiveDateTime {
            NaiveDate::from_ymd_opt(2025, m, d)
                .unwrap()
                .and_hms_opt(h, 0, 0)
                .unwrap()
        }
    }

    impl TimeZone for Eastern2025 {
        type Offset = FixedOffset;

        fn from_offset(_: &FixedOffset) -> Self {
            Eastern2025
        }

        fn offset_from_local_date(&self, local: &NaiveDate) -> LocalResult<FixedOffset> {
            self.offset_from_local_datetime(&local.and_hms_opt(12, 0, 0).unwrap())
        }

        fn offset_from_local_datetime(&self, local: &NaiveDateTime) -> LocalResult<FixedOffset> {
            let spring = Self::local(3, 9, 2);
            let fall = Self::local(11, 2, 1);
            if *local < spring {
                LocalResult::Single(Self::est())
            } else if *local < spring + Duration::hours(1) {
                LocalResult::None
            } else if *local < fall {
                LocalResult::Single(Self::edt())
            } else if *local < fall + Duration::hours(1) {
                LocalResult::Ambiguous(Self::edt(), Self::est())
            } else {
                LocalResult::Single(Self::est())
            }
        }

        fn offset_from_utc_date(&self, utc: &NaiveDate) -> FixedOffset {
            self.offset_from_utc_datetime(&utc.and_hms_opt(12, 0, 0).unwrap())
        }

        fn offset_from_utc_datetime(&self, utc: &NaiveDateTime) -> FixedOffset {
            if *utc >= Self::local(3, 9, 7) && *utc < Self::local(11, 2, 6) {
                Self::edt()
            } else {
                Self::est()
            }
        }
    }

    fn eastern(m: u32, d: u32, h: u32) -> DateTime<Eastern2025> {
        Eastern2025.from_utc_datetime(&Eastern2025::local(m, d, h))
    }

    fn utc(y: i32, m: u32, d: u32, h: u32, min: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, m, d, h, min, 0).unwrap()
    }

    #[test]
    fn before_reset_hour_belongs_to_previous_date() {
        assert_eq!(day_key(&utc(2025, 3, 10, 3, 59), 4), "2025-03-09");
        assert_eq!(day_key(&utc(2025, 3, 10, 4, 0), 4), "2025-03-10");
        assert_eq!(day_key(&utc(2025, 3, 11, 3, 59), 4), "2025-03-10");
    }

    #[test]
    fn midnight_reset_never_backdates() {
        assert_eq!(day_key(&utc(2025, 3, 10, 0, 0), 0), "2025-03-10");
        assert_eq!(day_key(&utc(2025, 3, 10, 23, 59), 0), "2025-03-10");
    }

    #[test]
    fn backdating_crosses_month_and_year() {
        assert_eq!(day_key(&utc(2025, 1, 1, 2, 0), 4), "2024-12-31");
        assert_eq!(previous_day_key(&utc(2025, 3, 1, 12, 0), 4), "2025-02-28");
    }

    #[test]
    fn next_reset_is_today_before_the_hour() {
        let now = utc(2025, 3, 10, 2, 30);
        assert_eq!(next_reset_instant(&now, 4), utc(2025, 3, 10, 4, 0));
        assert_eq!(time_until_reset(&now, 4), Duration::minutes(90));
    }

    #[test]
    fn next_reset_at_exact_boundary_is_tomorrow() {
        let now = utc(2025, 3, 10, 4, 0);
        assert_eq!(next_reset_instant(&now, 4), utc(2025, 3, 11, 4, 0));
        assert_eq!(time_until_reset(&now, 4), Duration::hours(24));
    }

    #[test]
    fn fixed_offset_uses_local_wall_clock() {
        let tz = FixedOffset::east_opt(9 * 3600).unwrap();
        // 19:30 UTC on the 9th is 04:30 on the 10th in UTC+9
        let now = utc(2025, 3, 9, 19, 30).with_timezone(&tz);
        assert_eq!(day_key(&now, 4), "2025-03-10");
        assert_eq!(day_key(&now, 5), "2025-03-09");
    }

    #[test]
    fn reset_inside_spring_forward_gap_moves_to_next_hour() {
        // noon EST on March 8; tomorrow's 02:00 does not exist
        let now = eastern(3, 8, 17);
        let next = next_reset_instant(&now, 2);
        assert_eq!(next.with_timezone(&Utc), utc(2025, 3, 9, 7, 0));
        assert_eq!(next.hour(), 3);
        assert_eq!(time_until_reset(&now, 2), Duration::hours(14));
    }

    #[test]
    fn ambiguous_fall_back_reset_takes_earlier_instant() {
        // noon EDT on Nov 1; tomorrow's 01:00 happens twice
        let now = eastern(11, 1, 16);
        let next = next_reset_instant(&now, 1);
        assert_eq!(next.with_timezone(&Utc), utc(2025, 11, 2, 5, 0));
        assert_eq!(time_until_reset(&now, 1), Duration::hours(13));
    }

    #[test]
    fn day_keys_follow_local_wall_clock_across_transitions() {
        // 06:00 UTC on Nov 2 is 01:00 EST, the second pass through 01:00
        let late = Eastern2025.from_utc_datetime(&Eastern2025::local(11, 2, 6));
        assert_eq!(day_key(&late, 4), "2025-11-01");
        assert_eq!(day_key(&eastern(3, 9, 8), 4), "2025-03-09");
    }
}
