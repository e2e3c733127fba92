use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use rusqlite::{OptionalExtension, Row, TransactionBehavior};
use thiserror::Error;
use uuid::Uuid;

use tally_types::{Choice, Topic, Vote};

use super::topic_repository::{map_topic, TOPIC_COLUMNS};
use super::{format_timestamp, parse_choice, parse_timestamp, parse_uuid, stored_instant};
use crate::db::DbPool;

const VOTE_COLUMNS: &str = "id, topic_id, fid, choice, created_at, updated_at";

fn map_vote(row: &Row<'_>) -> rusqlite::Result<Vote> {
    Ok(Vote {
        id: parse_uuid(0, row.get(0)?)?,
        topic_id: parse_uuid(1, row.get(1)?)?,
        fid: row.get(2)?,
        choice: parse_choice(3, row.get(3)?)?,
        created_at: parse_timestamp(4, row.get(4)?)?,
        updated_at: parse_timestamp(5, row.get(5)?)?,
    })
}

/// Cached tally column for a choice
fn counter_column(choice: Choice) -> &'static str {
    match choice {
        Choice::A => "votes_a",
        Choice::B => "votes_b",
    }
}

#[derive(Debug, Error)]
pub enum LedgerError {
    #[error("topic {0} not found")]
    TopicNotFound(Uuid),
    #[error("topic {0} is not active")]
    TopicInactive(Uuid),
    #[error("vote storage failed: {0:#}")]
    Storage(#[from] anyhow::Error),
}

impl From<rusqlite::Error> for LedgerError {
    fn from(err: rusqlite::Error) -> Self {
        LedgerError::Storage(err.into())
    }
}

impl From<r2d2::Error> for LedgerError {
    fn from(err: r2d2::Error) -> Self {
        LedgerError::Storage(err.into())
    }
}

/// Result of writing a vote
#[derive(Debug, Clone)]
pub struct VoteUpsert {
    pub vote: Vote,
    pub is_new_vote: bool,
    pub choice_changed: bool,
    /// Topic as committed together with the vote, tallies included
    pub topic: Topic,
}

/// Source of truth for vote rows and the per-topic tallies cached on `topics`
///
/// The tallies are only ever written here, inside the same transaction as the
/// vote row they account for.
#[derive(Clone)]
pub struct VoteLedger {
    pool: DbPool,
}

impl VoteLedger {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    /// Insert or change a user's vote on a topic
    ///
    /// Runs in an IMMEDIATE transaction so concurrent submissions for the same
    /// (topic, fid) pair serialize on the write lock: the second one sees the
    /// first one's row and becomes an update or a no-op.
    pub fn upsert_vote(
        &self,
        topic_id: &Uuid,
        fid: i64,
        choice: Choice,
        at: DateTime<Utc>,
    ) -> Result<VoteUpsert, LedgerError> {
        let at = stored_instant(at);
        let mut conn = self.pool.get()?;
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

        let topic = tx
            .query_row(
                &format!("SELECT {} FROM topics WHERE id = ?", TOPIC_COLUMNS),
                [topic_id.to_string()],
                map_topic,
            )
            .optional()?
            .ok_or(LedgerError::TopicNotFound(*topic_id))?;
        if !topic.is_active {
            return Err(LedgerError::TopicInactive(*topic_id));
        }

        let existing = tx
            .query_row(
                &format!("SELECT {} FROM votes WHERE topic_id = ? AND fid = ?", VOTE_COLUMNS),
                (topic_id.to_string(), fid),
                map_vote,
            )
            .optional()?;

        let (vote, is_new_vote, choice_changed) = match existing {
            None => {
                let vote = Vote {
                    id: Uuid::new_v4(),
                    topic_id: *topic_id,
                    fid,
                    choice,
                    created_at: at,
                    updated_at: at,
                };
                tx.execute(
                    "INSERT INTO votes (id, topic_id, fid, choice, created_at, updated_at)
                     VALUES (?, ?, ?, ?, ?, ?)",
                    (
                        vote.id.to_string(),
                        topic_id.to_string(),
                        fid,
                        choice.as_str(),
                        format_timestamp(&at),
                        format_timestamp(&at),
                    ),
                )
                .context("Failed to insert vote")?;
                let column = counter_column(choice);
                tx.execute(
                    &format!("UPDATE topics SET {0} = {0} + 1 WHERE id = ?", column),
                    [topic_id.to_string()],
                )
                .context("Failed to increment topic tally")?;
                (vote, true, false)
            }
            Some(previous) if previous.choice == choice => (previous, false, false),
            Some(previous) => {
                tx.execute(
                    "UPDATE votes SET choice = ?, updated_at = ? WHERE id = ?",
                    (choice.as_str(), format_timestamp(&at), previous.id.to_string()),
                )
                .context("Failed to update vote")?;
                tx.execute(
                    &format!(
                        "UPDATE topics SET {0} = {0} + 1, {1} = {1} - 1 WHERE id = ?",
                        counter_column(choice),
                        counter_column(previous.choice)
                    ),
                    [topic_id.to_string()],
                )
                .context("Failed to move topic tally")?;
                let vote = Vote {
                    choice,
                    updated_at: at,
                    ..previous
                };
                (vote, false, true)
            }
        };

        let topic = tx.query_row(
            &format!("SELECT {} FROM topics WHERE id = ?", TOPIC_COLUMNS),
            [topic_id.to_string()],
            map_topic,
        )?;
        tx.commit()?;

        Ok(VoteUpsert {
            vote,
            is_new_vote,
            choice_changed,
            topic,
        })
    }

    /// Get a user's vote on a topic
    pub fn get_vote(&self, topic_id: &Uuid, fid: i64) -> Result<Option<Vote>> {
        let conn = self.pool.get()?;
        let vote = conn
            .query_row(
                &format!("SELECT {} FROM votes WHERE topic_id = ? AND fid = ?", VOTE_COLUMNS),
                (topic_id.to_string(), fid),
                map_vote,
            )
            .optional()?;
        Ok(vote)
    }

    /// Number of topics a user has voted on
    pub fn count_by_user(&self, fid: i64) -> Result<i64> {
        let conn = self.pool.get()?;
        let count: i64 = conn.query_row(
            "SELECT COUNT(*) FROM votes WHERE fid = ?",
            [fid],
            |row| row.get(0),
        )?;
        Ok(count)
    }

    /// Tallies for a topic counted from vote rows rather than the cache
    pub fn count_by_topic(&self, topic_id: &Uuid) -> Result<(i64, i64)> {
        let conn = self.pool.get()?;
        let counts = conn.query_row(
            "SELECT COALESCE(SUM(choice = 'A'), 0), COALESCE(SUM(choice = 'B'), 0)
             FROM votes WHERE topic_id = ?",
            [topic_id.to_string()],
            |row| Ok((row.get(0)?, row.get(1)?)),
        )?;
        Ok(counts)
    }
}
