use anyhow::{Context, Result};
use rusqlite::{OptionalExtension, Row};
use uuid::Uuid;

use tally_types::Topic;

use super::{format_timestamp, parse_timestamp, parse_uuid};
use crate::db::DbPool;

/// Column list matching [`map_topic`]
pub(crate) const TOPIC_COLUMNS: &str =
    "id, option_a, option_b, image_a, image_b, starts_at, ends_at, votes_a, votes_b, is_active, submitted_by, created_at";

pub(crate) fn map_topic(row: &Row<'_>) -> rusqlite::Result<Topic> {
    let ends_at: Option<String> = row.get(6)?;
    Ok(Topic {
        id: parse_uuid(0, row.get(0)?)?,
        option_a: row.get(1)?,
        option_b: row.get(2)?,
        image_a: row.get(3)?,
        image_b: row.get(4)?,
        starts_at: parse_timestamp(5, row.get(5)?)?,
        ends_at: ends_at.map(|s| parse_timestamp(6, s)).transpose()?,
        votes_a: row.get(7)?,
        votes_b: row.get(8)?,
        is_active: row.get(9)?,
        submitted_by: row.get(10)?,
        created_at: parse_timestamp(11, row.get(11)?)?,
    })
}

#[derive(Clone)]
pub struct TopicRepository {
    pool: DbPool,
}

impl TopicRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    /// Create a new topic
    pub fn create(&self, topic: &Topic) -> Result<()> {
        let conn = self.pool.get()?;
        conn.execute(
            "INSERT INTO topics (id, option_a, option_b, image_a, image_b, starts_at, ends_at, votes_a, votes_b, is_active, submitted_by, created_at)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
            (
                topic.id.to_string(),
                &topic.option_a,
                &topic.option_b,
                &topic.image_a,
                &topic.image_b,
                format_timestamp(&topic.starts_at),
                topic.ends_at.as_ref().map(format_timestamp),
                topic.votes_a,
                topic.votes_b,
                topic.is_active,
                topic.submitted_by,
                format_timestamp(&topic.created_at),
            ),
        )
        .context("Failed to create topic")?;
        Ok(())
    }

    /// Get a single topic by ID
    pub fn get_by_id(&self, topic_id: &Uuid) -> Result<Option<Topic>> {
        let conn = self.pool.get()?;
        let topic = conn
            .query_row(
                &format!("SELECT {} FROM topics WHERE id = ?", TOPIC_COLUMNS),
                [topic_id.to_string()],
                map_topic,
            )
            .optional()
            .context("Failed to load topic")?;
        Ok(topic)
    }

    /// Active topics, newest first
    pub fn list_active(&self, limit: i64) -> Result<Vec<Topic>> {
        let conn = self.pool.get()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM topics WHERE is_active = 1 ORDER BY starts_at DESC, created_at DESC LIMIT ?",
            TOPIC_COLUMNS
        ))?;

        let topics = stmt
            .query_map([limit], map_topic)?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(topics)
    }

    /// Toggle the active flag. Returns false when the topic does not exist.
    pub fn set_active(&self, topic_id: &Uuid, is_active: bool) -> Result<bool> {
        let conn = self.pool.get()?;
        let rows = conn
            .execute(
                "UPDATE topics SET is_active = ? WHERE id = ?",
                (is_active, topic_id.to_string()),
            )
            .context("Failed to update topic status")?;
        Ok(rows > 0)
    }

    /// Number of topics submitted by a user
    pub fn count_submitted_by(&self, fid: i64) -> Result<i64> {
        let conn = self.pool.get()?;
        let count: i64 = conn.query_row(
            "SELECT COUNT(*) FROM topics WHERE submitted_by = ?",
            [fid],
            |row| row.get(0),
        )?;
        Ok(count)
    }

    /// Recompute the cached tallies for a topic from its vote rows
    pub fn recount(&self, topic_id: &Uuid) -> Result<()> {
        let conn = self.pool.get()?;
        conn.execute(
            "UPDATE topics
             SET votes_a = (SELECT COUNT(*) FROM votes WHERE topic_id = ?1 AND choice = 'A'),
                 votes_b = (SELECT COUNT(*) FROM votes WHERE topic_id = ?1 AND choice = 'B')
             WHERE id = ?1",
            [topic_id.to_string()],
        )
        .context("Failed to recount topic votes")?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::Database;
    use chrono::{TimeZone, Utc};

    fn setup_test_db() -> Result<(Database, TopicRepository)> {
        let db = Database::in_memory()?;
        db.initialize()?;
        let repo = TopicRepository::new(db.pool.clone());
        Ok((db, repo))
    }

    fn sample_topic(submitted_by: Option<i64>) -> Topic {
        let now = Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap();
        Topic {
            id: Uuid::new_v4(),
            option_a: "Tabs".to_string(),
            option_b: "Spaces".to_string(),
            image_a: Some("https://img.example/tabs.png".to_string()),
            image_b: None,
            starts_at: now,
            ends_at: Some(now + chrono::Duration::days(1)),
            votes_a: 0,
            votes_b: 0,
            is_active: true,
            submitted_by,
            created_at: now,
        }
    }

    #[test]
    fn test_create_and_get_topic() -> Result<()> {
        let (_db, repo) = setup_test_db()?;
        let topic = sample_topic(Some(42));

        repo.create(&topic)?;
        let loaded = repo.get_by_id(&topic.id)?.expect("topic should exist");

        assert_eq!(loaded.option_a, "Tabs");
        assert_eq!(loaded.image_a.as_deref(), Some("https://img.example/tabs.png"));
        assert_eq!(loaded.image_b, None);
        assert_eq!(loaded.starts_at, topic.starts_at);
        assert_eq!(loaded.ends_at, topic.ends_at);
        assert_eq!(loaded.submitted_by, Some(42));
        assert!(loaded.is_active);

        Ok(())
    }

    #[test]
    fn test_get_unknown_topic_returns_none() -> Result<()> {
        let (_db, repo) = setup_test_db()?;
        assert!(repo.get_by_id(&Uuid::new_v4())?.is_none());
        Ok(())
    }

    #[test]
    fn test_set_active_and_list() -> Result<()> {
        let (_db, repo) = setup_test_db()?;
        let first = sample_topic(None);
        let second = sample_topic(None);
        repo.create(&first)?;
        repo.create(&second)?;

        assert!(repo.set_active(&first.id, false)?);
        assert!(!repo.set_active(&Uuid::new_v4(), false)?);

        let active = repo.list_active(10)?;
        assert_eq!(active.len(), 1);
        assert_eq!(active[0].id, second.id);

        Ok(())
    }

    #[test]
    fn test_count_submitted_by() -> Result<()> {
        let (_db, repo) = setup_test_db()?;
        repo.create(&sample_topic(Some(7)))?;
        repo.create(&sample_topic(Some(7)))?;
        repo.create(&sample_topic(Some(8)))?;
        repo.create(&sample_topic(None))?;

        assert_eq!(repo.count_submitted_by(7)?, 2);
        assert_eq!(repo.count_submitted_by(8)?, 1);
        assert_eq!(repo.count_submitted_by(9)?, 0);

        Ok(())
    }

    #[test]
    fn test_recount_repairs_drifted_counters() -> Result<()> {
        let (db, repo) = setup_test_db()?;
        let topic = sample_topic(None);
        repo.create(&topic)?;

        {
            let conn = db.connection()?;
            conn.execute(
                "INSERT INTO votes (id, topic_id, fid, choice, created_at, updated_at)
                 VALUES (?, ?, 1, 'A', '2024-03-01T12:00:00Z', '2024-03-01T12:00:00Z')",
                (Uuid::new_v4().to_string(), topic.id.to_string()),
            )?;
            conn.execute(
                "UPDATE topics SET votes_b = 5 WHERE id = ?",
                [topic.id.to_string()],
            )?;
        }

        repo.recount(&topic.id)?;
        let loaded = repo.get_by_id(&topic.id)?.expect("topic should exist");
        assert_eq!((loaded.votes_a, loaded.votes_b), (1, 0));

        Ok(())
    }
}
