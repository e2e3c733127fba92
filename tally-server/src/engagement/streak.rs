use anyhow::Result;
use chrono::NaiveDate;

use tally_types::UserStreak;

use crate::db::repositories::StreakRepository;
use crate::db::DbPool;

/// How a new vote moved a user's streak
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreakChange {
    /// First counted vote for this user
    Started,
    /// Already voted today; only the vote total moves
    SameDay,
    /// Voted yesterday, streak grows by one
    Extended,
    /// Missed at least one day, streak restarts at one
    Reset,
    /// Vote dated before the last counted day. Streak fields are left alone.
    OutOfOrder,
}

/// Apply one new vote on `today` to a user's streak
pub fn advance(previous: Option<&UserStreak>, fid: i64, today: NaiveDate) -> (UserStreak, StreakChange) {
    let Some(previous) = previous else {
        return (
            UserStreak {
                fid,
                current_streak: 1,
                longest_streak: 1,
                last_vote_date: today,
                total_votes: 1,
            },
            StreakChange::Started,
        );
    };

    let total_votes = previous.total_votes + 1;
    let day_diff = (today - previous.last_vote_date).num_days();

    match day_diff {
        0 => (
            UserStreak {
                total_votes,
                ..previous.clone()
            },
            StreakChange::SameDay,
        ),
        1 => {
            let current_streak = previous.current_streak + 1;
            (
                UserStreak {
                    fid,
                    current_streak,
                    longest_streak: previous.longest_streak.max(current_streak),
                    last_vote_date: today,
                    total_votes,
                },
                StreakChange::Extended,
            )
        }
        d if d > 1 => (
            UserStreak {
                fid,
                current_streak: 1,
                // A stored record always has longest >= 1
                longest_streak: previous.longest_streak.max(1),
                last_vote_date: today,
                total_votes,
            },
            StreakChange::Reset,
        ),
        _ => (
            UserStreak {
                total_votes,
                ..previous.clone()
            },
            StreakChange::OutOfOrder,
        ),
    }
}

/// Keeps each user's consecutive-day voting streak
#[derive(Clone)]
pub struct StreakTracker {
    repo: StreakRepository,
}

impl StreakTracker {
    pub fn new(pool: DbPool) -> Self {
        Self {
            repo: StreakRepository::new(pool),
        }
    }

    /// Count one new vote cast on `today`
    ///
    /// Only call this for votes that created a vote row; changed or repeated
    /// votes do not touch the streak.
    pub fn register_activity(&self, fid: i64, today: NaiveDate) -> Result<UserStreak> {
        let mut change = StreakChange::Started;
        let streak = self.repo.update_with(fid, |previous| {
            let (next, how) = advance(previous, fid, today);
            change = how;
            next
        })?;

        match change {
            StreakChange::Reset => {
                tracing::debug!("Streak reset for fid {} on {}", fid, today);
            }
            StreakChange::OutOfOrder => {
                tracing::warn!(
                    "Vote for fid {} dated {} precedes last counted day {}; streak left unchanged",
                    fid,
                    today,
                    streak.last_vote_date
                );
            }
            StreakChange::Extended if streak.current_streak == streak.longest_streak => {
                tracing::debug!("fid {} reached a best streak of {}", fid, streak.current_streak);
            }
            _ => {}
        }

        Ok(streak)
    }

    pub fn get_streak(&self, fid: i64) -> Result<Option<UserStreak>> {
        self.repo.get(fid)
    }

    pub fn leaderboard(&self, limit: i64) -> Result<Vec<UserStreak>> {
        self.repo.top(limit)
    }
}
