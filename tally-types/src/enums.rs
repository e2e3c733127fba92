use serde::{Deserialize, Serialize};

/// One of the two options of a topic
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Choice {
    A,
    B,
}

impl Choice {
    pub fn as_str(&self) -> &'static str {
        match self {
            Choice::A => "A",
            Choice::B => "B",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_uppercase().as_str() {
            "A" => Some(Choice::A),
            "B" => Some(Choice::B),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AchievementKind {
    Votes,
    Streak,
    Submissions,
    Popular,
    Divisive,
    Social,
    EarlyVoter,
}

impl AchievementKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            AchievementKind::Votes => "votes",
            AchievementKind::Streak => "streak",
            AchievementKind::Submissions => "submissions",
            AchievementKind::Popular => "popular",
            AchievementKind::Divisive => "divisive",
            AchievementKind::Social => "social",
            AchievementKind::EarlyVoter => "early_voter",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "votes" => Some(AchievementKind::Votes),
            "streak" => Some(AchievementKind::Streak),
            "submissions" => Some(AchievementKind::Submissions),
            "popular" => Some(AchievementKind::Popular),
            "divisive" => Some(AchievementKind::Divisive),
            "social" => Some(AchievementKind::Social),
            "early_voter" => Some(AchievementKind::EarlyVoter),
            _ => None,
        }
    }
}

/// Event types recorded in the append-only activity log
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ActivityKind {
    Share,
    Submission,
}

impl ActivityKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ActivityKind::Share => "share",
            ActivityKind::Submission => "submission",
        }
    }
}
