use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::enums::{AchievementKind, Choice};

// Custom serde module for DateTime to ensure RFC3339 string format
mod datetime_format {
    use chrono::{DateTime, Utc};
    use serde::{self, Deserialize, Deserializer, Serializer};

    pub fn serialize<S>(date: &DateTime<Utc>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let s = date.to_rfc3339();
        serializer.serialize_str(&s)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<DateTime<Utc>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        s.parse::<DateTime<Utc>>().map_err(serde::de::Error::custom)
    }
}

// Same RFC3339 format for optional timestamps
mod optional_datetime_format {
    use chrono::{DateTime, Utc};
    use serde::{self, Deserialize, Deserializer, Serializer};

    pub fn serialize<S>(date: &Option<DateTime<Utc>>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match date {
            Some(date) => serializer.serialize_str(&date.to_rfc3339()),
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Option<DateTime<Utc>>, D::Error>
    where
        D: Deserializer<'de>,
    {
        Option::<String>::deserialize(deserializer)?
            .map(|s| s.parse::<DateTime<Utc>>().map_err(serde::de::Error::custom))
            .transpose()
    }
}

/// A two-option poll
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Topic {
    pub id: Uuid,
    pub option_a: String,
    pub option_b: String,
    #[serde(default)]
    pub image_a: Option<String>,
    #[serde(default)]
    pub image_b: Option<String>,
    #[serde(with = "datetime_format")]
    pub starts_at: DateTime<Utc>,
    #[serde(default, with = "optional_datetime_format")]
    pub ends_at: Option<DateTime<Utc>>,
    /// Materialized tally, only written in the same transaction as a vote row
    pub votes_a: i64,
    pub votes_b: i64,
    pub is_active: bool,
    /// fid of the user who submitted this topic, if it was user-submitted
    #[serde(default)]
    pub submitted_by: Option<i64>,
    #[serde(with = "datetime_format")]
    pub created_at: DateTime<Utc>,
}

impl Topic {
    pub fn total_votes(&self) -> i64 {
        self.votes_a + self.votes_b
    }

    pub fn votes_for(&self, choice: Choice) -> i64 {
        match choice {
            Choice::A => self.votes_a,
            Choice::B => self.votes_b,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Vote {
    pub id: Uuid,
    pub topic_id: Uuid,
    pub fid: i64,
    pub choice: Choice,
    #[serde(with = "datetime_format")]
    pub created_at: DateTime<Utc>,
    #[serde(with = "datetime_format")]
    pub updated_at: DateTime<Utc>,
}

/// Consecutive-day voting streak for one user
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserStreak {
    pub fid: i64,
    pub current_streak: i64,
    pub longest_streak: i64,
    /// Calendar day of the most recent counted vote
    pub last_vote_date: NaiveDate,
    pub total_votes: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Achievement {
    pub id: String,
    pub name: String,
    pub description: String,
    #[serde(rename = "type")]
    pub kind: AchievementKind,
    pub threshold: i64,
}

/// An unlocked achievement, joined with its catalog entry
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserAchievement {
    pub fid: i64,
    #[serde(flatten)]
    pub achievement: Achievement,
    #[serde(with = "datetime_format")]
    pub earned_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TopicStats {
    pub topic_id: Uuid,
    pub votes_a: i64,
    pub votes_b: i64,
    pub total_votes: i64,
    pub percent_a: i64,
    pub percent_b: i64,
    pub is_contested: bool,
}

/// Result of casting a vote
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VoteOutcome {
    pub vote: Vote,
    pub is_new_vote: bool,
    pub choice_changed: bool,
    pub stats: TopicStats,
    pub is_rare_opinion: bool,
    pub is_early_voter: bool,
    /// Absent when streak bookkeeping failed for this request
    pub streak: Option<UserStreak>,
    pub new_achievements: Vec<Achievement>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubmissionOutcome {
    pub topic: Topic,
    pub new_achievements: Vec<Achievement>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ShareOutcome {
    pub topic_id: Uuid,
    /// Absent when the share was logged but could not be counted
    pub share_count: Option<i64>,
    pub new_achievements: Vec<Achievement>,
}

// Request/Response types for API
#[derive(Debug, Serialize, Deserialize)]
pub struct CastVoteRequest {
    pub fid: Option<i64>,
    pub choice: Option<String>,
}

#[derive(Debug, Default, Serialize, Deserialize)]
pub struct CreateTopicRequest {
    pub option_a: String,
    pub option_b: String,
    #[serde(default)]
    pub image_a: Option<String>,
    #[serde(default)]
    pub image_b: Option<String>,
    #[serde(default, with = "optional_datetime_format")]
    pub starts_at: Option<DateTime<Utc>>,
    #[serde(default, with = "optional_datetime_format")]
    pub ends_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub submitted_by: Option<i64>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ShareRequest {
    pub fid: Option<i64>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct SetTopicActiveRequest {
    pub is_active: bool,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
    pub details: Option<String>,
}
