use anyhow::{Context, Result};
use rusqlite::{OptionalExtension, Row, TransactionBehavior};

use tally_types::UserStreak;

use super::parse_date;
use crate::db::DbPool;

const STREAK_COLUMNS: &str = "fid, current_streak, longest_streak, last_vote_date, total_votes";

fn map_streak(row: &Row<'_>) -> rusqlite::Result<UserStreak> {
    Ok(UserStreak {
        fid: row.get(0)?,
        current_streak: row.get(1)?,
        longest_streak: row.get(2)?,
        last_vote_date: parse_date(3, row.get(3)?)?,
        total_votes: row.get(4)?,
    })
}

#[derive(Clone)]
pub struct StreakRepository {
    pool: DbPool,
}

impl StreakRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    /// Get a user's streak record
    pub fn get(&self, fid: i64) -> Result<Option<UserStreak>> {
        let conn = self.pool.get()?;
        let streak = conn
            .query_row(
                &format!("SELECT {} FROM user_streaks WHERE fid = ?", STREAK_COLUMNS),
                [fid],
                map_streak,
            )
            .optional()
            .context("Failed to load streak")?;
        Ok(streak)
    }

    /// Read-modify-write a user's streak under the database write lock
    ///
    /// `update` receives the stored record (if any) and returns the record to
    /// persist. Concurrent updates for the same fid are applied one after the
    /// other, never interleaved.
    pub fn update_with<F>(&self, fid: i64, update: F) -> Result<UserStreak>
    where
        F: FnOnce(Option<&UserStreak>) -> UserStreak,
    {
        let mut conn = self.pool.get()?;
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

        let current = tx
            .query_row(
                &format!("SELECT {} FROM user_streaks WHERE fid = ?", STREAK_COLUMNS),
                [fid],
                map_streak,
            )
            .optional()?;

        let next = update(current.as_ref());
        if current.as_ref() != Some(&next) {
            tx.execute(
                "INSERT INTO user_streaks (fid, current_streak, longest_streak, last_vote_date, total_votes)
                 VALUES (?, ?, ?, ?, ?)
                 ON CONFLICT(fid) DO UPDATE SET
                    current_streak = excluded.current_streak,
                    longest_streak = excluded.longest_streak,
                    last_vote_date = excluded.last_vote_date,
                    total_votes = excluded.total_votes",
                (
                    fid,
                    next.current_streak,
                    next.longest_streak,
                    next.last_vote_date.to_string(),
                    next.total_votes,
                ),
            )
            .context("Failed to save streak")?;
        }
        tx.commit()?;

        Ok(next)
    }

    /// Longest running streaks first
    pub fn top(&self, limit: i64) -> Result<Vec<UserStreak>> {
        let conn = self.pool.get()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM user_streaks
             ORDER BY current_streak DESC, longest_streak DESC, total_votes DESC, fid ASC
             LIMIT ?",
            STREAK_COLUMNS
        ))?;

        let streaks = stmt
            .query_map([limit], map_streak)?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(streaks)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::Database;
    use chrono::NaiveDate;

    fn setup_test_db() -> Result<(Database, StreakRepository)> {
        let db = Database::in_memory()?;
        db.initialize()?;
        let repo = StreakRepository::new(db.pool.clone());
        Ok((db, repo))
    }

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 3, d).unwrap()
    }

    fn streak(fid: i64, current: i64, longest: i64, last: NaiveDate, total: i64) -> UserStreak {
        UserStreak {
            fid,
            current_streak: current,
            longest_streak: longest,
            last_vote_date: last,
            total_votes: total,
        }
    }

    #[test]
    fn test_update_with_creates_then_updates() -> Result<()> {
        let (_db, repo) = setup_test_db()?;

        let created = repo.update_with(5, |prev| {
            assert!(prev.is_none());
            streak(5, 1, 1, day(1), 1)
        })?;
        assert_eq!(created.current_streak, 1);

        let updated = repo.update_with(5, |prev| {
            let prev = prev.expect("record should exist");
            streak(5, prev.current_streak + 1, 2, day(2), prev.total_votes + 1)
        })?;
        assert_eq!(updated, streak(5, 2, 2, day(2), 2));
        assert_eq!(repo.get(5)?, Some(updated));

        Ok(())
    }

    #[test]
    fn test_check_constraint_rejects_current_above_longest() -> Result<()> {
        let (_db, repo) = setup_test_db()?;

        let result = repo.update_with(5, |_| streak(5, 3, 1, day(1), 1));
        assert!(result.is_err());
        assert!(repo.get(5)?.is_none());

        Ok(())
    }

    #[test]
    fn test_top_orders_by_current_streak() -> Result<()> {
        let (_db, repo) = setup_test_db()?;
        repo.update_with(1, |_| streak(1, 2, 9, day(3), 20))?;
        repo.update_with(2, |_| streak(2, 5, 5, day(3), 5))?;
        repo.update_with(3, |_| streak(3, 2, 4, day(3), 8))?;

        let top = repo.top(2)?;
        let fids: Vec<i64> = top.iter().map(|s| s.fid).collect();
        assert_eq!(fids, vec![2, 1]);

        Ok(())
    }
}
