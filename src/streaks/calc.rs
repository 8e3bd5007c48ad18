//! Calendar-day streak arithmetic.
//!
//! Pure: the acting day is always passed in. The engine passes the UTC
//! calendar day, the single canonical day boundary for all actors.

use chrono::{Days, NaiveDate};
use serde::{Deserialize, Serialize};

/// Persisted streak counters for one actor.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct StreakState {
    /// Consecutive days with at least one qualifying reading
    pub current_streak: u32,
    /// Best streak ever reached
    pub best_streak: u32,
    /// Last calendar day already counted into the streak
    pub last_counted_day: Option<NaiveDate>,
}

impl StreakState {
    /// Count `today` into the streak. Returns false when the day was already
    /// counted (multiple reads on one calendar day leave the streak alone).
    pub fn advance(&mut self, today: NaiveDate) -> bool {
        match self.last_counted_day {
            Some(last) if last == today => return false,
            Some(last) if Some(last) == today.checked_sub_days(Days::new(1)) => {
                self.current_streak += 1;
            }
            _ => {
                // First activity ever, or a gap: the streak restarts
                self.current_streak = 1;
            }
        }

        self.best_streak = self.best_streak.max(self.current_streak);
        self.last_counted_day = Some(today);
        true
    }
}
