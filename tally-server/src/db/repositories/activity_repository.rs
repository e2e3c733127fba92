use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use rusqlite::types::Value;
use uuid::Uuid;

use tally_types::ActivityKind;

use super::format_timestamp;
use crate::db::DbPool;

/// One entry in the activity log
#[derive(Debug, Clone, PartialEq)]
pub struct ActivityEvent {
    pub kind: ActivityKind,
    pub fid: i64,
    pub topic_id: Option<Uuid>,
    pub at: DateTime<Utc>,
}

/// Narrows a [`ActivityLog::count`] query; unset fields match everything
#[derive(Debug, Clone, Default)]
pub struct EventFilter {
    pub fid: Option<i64>,
    pub topic_id: Option<Uuid>,
    pub since: Option<DateTime<Utc>>,
}

impl EventFilter {
    pub fn for_user(fid: i64) -> Self {
        Self {
            fid: Some(fid),
            ..Self::default()
        }
    }
}

/// Append-only log of user activity that is counted rather than stored as state
pub trait ActivityLog: Send + Sync {
    fn append(&self, event: &ActivityEvent) -> Result<()>;

    fn count(&self, kind: ActivityKind, filter: &EventFilter) -> Result<i64>;
}

/// SQLite-backed activity log
#[derive(Clone)]
pub struct ActivityRepository {
    pool: DbPool,
}

impl ActivityRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

impl ActivityLog for ActivityRepository {
    fn append(&self, event: &ActivityEvent) -> Result<()> {
        let conn = self.pool.get()?;
        conn.execute(
            "INSERT INTO activity_events (event_type, fid, topic_id, created_at) VALUES (?, ?, ?, ?)",
            (
                event.kind.as_str(),
                event.fid,
                event.topic_id.map(|id| id.to_string()),
                format_timestamp(&event.at),
            ),
        )
        .context("Failed to append activity event")?;
        Ok(())
    }

    fn count(&self, kind: ActivityKind, filter: &EventFilter) -> Result<i64> {
        let mut sql = String::from("SELECT COUNT(*) FROM activity_events WHERE event_type = ?");
        let mut params: Vec<Value> = vec![Value::Text(kind.as_str().to_string())];

        if let Some(fid) = filter.fid {
            sql.push_str(" AND fid = ?");
            params.push(Value::Integer(fid));
        }
        if let Some(topic_id) = filter.topic_id {
            sql.push_str(" AND topic_id = ?");
            params.push(Value::Text(topic_id.to_string()));
        }
        if let Some(since) = filter.since {
            sql.push_str(" AND created_at >= ?");
            params.push(Value::Text(format_timestamp(&since)));
        }

        let conn = self.pool.get()?;
        let count: i64 = conn
            .query_row(&sql, rusqlite::params_from_iter(params), |row| row.get(0))
            .context("Failed to count activity events")?;
        Ok(count)
    }
}
