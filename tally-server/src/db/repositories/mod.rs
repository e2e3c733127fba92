mod activity_repository;
mod achievement_repository;
mod streak_repository;
mod topic_repository;
mod vote_ledger;

pub use activity_repository::{ActivityEvent, ActivityLog, ActivityRepository, EventFilter};
pub use achievement_repository::AchievementRepository;
pub use streak_repository::StreakRepository;
pub use topic_repository::TopicRepository;
pub use vote_ledger::{LedgerError, VoteLedger, VoteUpsert};

use chrono::{DateTime, NaiveDate, SecondsFormat, SubsecRound, Utc};
use rusqlite::types::Type;
use tally_types::{AchievementKind, Choice};
use uuid::Uuid;

// Column values are stored as TEXT; these turn bad values into rusqlite
// conversion errors instead of panicking inside row mappers.

fn conversion_error(idx: usize, message: String) -> rusqlite::Error {
    rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, message.into())
}

/// Drop the sub-microsecond digits that `format_timestamp` cannot keep, so a
/// value handed back to a caller equals the one later read from storage
pub(crate) fn stored_instant(at: DateTime<Utc>) -> DateTime<Utc> {
    at.trunc_subsecs(6)
}

pub(crate) fn format_timestamp(at: &DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Micros, true)
}

pub(crate) fn parse_timestamp(idx: usize, value: String) -> rusqlite::Result<DateTime<Utc>> {
    value
        .parse::<DateTime<Utc>>()
        .map_err(|e| conversion_error(idx, format!("invalid timestamp '{}': {}", value, e)))
}

pub(crate) fn parse_date(idx: usize, value: String) -> rusqlite::Result<NaiveDate> {
    value
        .parse::<NaiveDate>()
        .map_err(|e| conversion_error(idx, format!("invalid date '{}': {}", value, e)))
}

pub(crate) fn parse_uuid(idx: usize, value: String) -> rusqlite::Result<Uuid> {
    Uuid::parse_str(&value)
        .map_err(|e| conversion_error(idx, format!("invalid id '{}': {}", value, e)))
}

pub(crate) fn parse_choice(idx: usize, value: String) -> rusqlite::Result<Choice> {
    Choice::parse(&value).ok_or_else(|| conversion_error(idx, format!("invalid choice '{}'", value)))
}

pub(crate) fn parse_achievement_kind(idx: usize, value: String) -> rusqlite::Result<AchievementKind> {
    AchievementKind::parse(&value)
        .ok_or_else(|| conversion_error(idx, format!("invalid achievement type '{}'", value)))
}
