use crate::model::CommitStreak;
use chrono::NaiveDate;
use std::cmp::Ordering;

impl CommitStreak {
    /// Advance the streak with a commit made on `date`.
    ///
    /// A commit exactly one day after the last one extends the streak, a
    /// same-day commit leaves the counters alone, and a longer gap starts a
    /// new streak of 1. Commits dated before `last_commit_date` are ignored
    /// so a backdated entry cannot rewind the streak.
    pub fn update(&mut self, date: NaiveDate) {
        let Some(last) = self.last_commit_date else {
            self.current = 1;
            self.longest = self.longest.max(self.current);
            self.last_commit_date = Some(date);
            return;
        };

        match date.cmp(&last) {
            Ordering::Less => {
                tracing::debug!(%date, %last, "ignoring backdated commit for streak");
                return;
            }
            Ordering::Equal => {}
            Ordering::Greater => {
                if (date - last).num_days() == 1 {
                    self.current += 1;
                } else {
                    self.current = 1;
                }
                self.longest = self.longest.max(self.current);
            }
        }

        self.last_commit_date = Some(date);
    }

    pub fn is_active(&self) -> bool {
        self.last_commit_date.is_some()
    }
}
