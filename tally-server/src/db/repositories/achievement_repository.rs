use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use rusqlite::Row;
use std::collections::HashSet;

use tally_types::{Achievement, UserAchievement};

use super::{format_timestamp, parse_achievement_kind, parse_timestamp, stored_instant};
use crate::db::DbPool;

fn map_achievement(row: &Row<'_>) -> rusqlite::Result<Achievement> {
    Ok(Achievement {
        id: row.get(0)?,
        name: row.get(1)?,
        description: row.get(2)?,
        kind: parse_achievement_kind(3, row.get(3)?)?,
        threshold: row.get(4)?,
    })
}

#[derive(Clone)]
pub struct AchievementRepository {
    pool: DbPool,
}

impl AchievementRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    /// Full achievement catalog ordered by type then threshold
    pub fn catalog(&self) -> Result<Vec<Achievement>> {
        let conn = self.pool.get()?;
        let mut stmt = conn.prepare(
            "SELECT id, name, description, type, threshold
             FROM achievements
             ORDER BY type, threshold, id",
        )?;

        let achievements = stmt
            .query_map([], map_achievement)?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(achievements)
    }

    /// IDs of achievements a user already holds
    pub fn held_ids(&self, fid: i64) -> Result<HashSet<String>> {
        let conn = self.pool.get()?;
        let mut stmt = conn.prepare("SELECT achievement_id FROM user_achievements WHERE fid = ?")?;

        let ids = stmt
            .query_map([fid], |row| row.get(0))?
            .collect::<Result<HashSet<String>, _>>()?;

        Ok(ids)
    }

    /// Record an unlock. Returns true only for the call that created the row;
    /// repeated or racing unlocks of the same achievement return false.
    pub fn unlock(&self, fid: i64, achievement_id: &str, at: DateTime<Utc>) -> Result<bool> {
        let conn = self.pool.get()?;
        let rows = conn
            .execute(
                "INSERT OR IGNORE INTO user_achievements (fid, achievement_id, earned_at) VALUES (?, ?, ?)",
                (fid, achievement_id, format_timestamp(&stored_instant(at))),
            )
            .context("Failed to record achievement unlock")?;
        Ok(rows == 1)
    }

    /// Achievements a user has earned, oldest first
    pub fn earned_by(&self, fid: i64) -> Result<Vec<UserAchievement>> {
        let conn = self.pool.get()?;
        let mut stmt = conn.prepare(
            "SELECT a.id, a.name, a.description, a.type, a.threshold, ua.earned_at
             FROM user_achievements ua
             JOIN achievements a ON a.id = ua.achievement_id
             WHERE ua.fid = ?
             ORDER BY ua.earned_at ASC, a.id ASC",
        )?;

        let earned = stmt
            .query_map([fid], |row| {
                Ok(UserAchievement {
                    fid,
                    achievement: map_achievement(row)?,
                    earned_at: parse_timestamp(5, row.get(5)?)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(earned)
    }
}
