use anyhow::Result;
use chrono::{DateTime, Utc};
use std::collections::HashSet;

use tally_types::{Achievement, AchievementKind, UserAchievement};

use crate::db::repositories::AchievementRepository;
use crate::db::DbPool;

/// Counters and flags an achievement check runs against
///
/// Each call site fills in what it knows; rules whose counter is `None` are
/// skipped rather than treated as zero.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TriggerContext {
    pub total_votes: Option<i64>,
    pub current_streak: Option<i64>,
    pub is_rare_opinion: bool,
    pub is_early_voter: bool,
    pub submissions: Option<i64>,
    /// Votes on a topic the user submitted
    pub popular_votes: Option<i64>,
    pub shares: Option<i64>,
}

impl TriggerContext {
    pub fn for_vote(
        total_votes: i64,
        current_streak: Option<i64>,
        is_rare_opinion: bool,
        is_early_voter: bool,
    ) -> Self {
        Self {
            total_votes: Some(total_votes),
            current_streak,
            is_rare_opinion,
            is_early_voter,
            ..Self::default()
        }
    }

    pub fn for_submissions(submissions: i64) -> Self {
        Self {
            submissions: Some(submissions),
            ..Self::default()
        }
    }

    pub fn for_popular_topic(votes: i64) -> Self {
        Self {
            popular_votes: Some(votes),
            ..Self::default()
        }
    }

    pub fn for_shares(shares: i64) -> Self {
        Self {
            shares: Some(shares),
            ..Self::default()
        }
    }
}

fn reaches(counter: Option<i64>, threshold: i64) -> bool {
    counter.is_some_and(|value| value >= threshold)
}

/// Whether the context satisfies an achievement's rule
pub fn qualifies(achievement: &Achievement, ctx: &TriggerContext) -> bool {
    match achievement.kind {
        AchievementKind::Votes => reaches(ctx.total_votes, achievement.threshold),
        AchievementKind::Streak => reaches(ctx.current_streak, achievement.threshold),
        AchievementKind::Submissions => reaches(ctx.submissions, achievement.threshold),
        AchievementKind::Popular => reaches(ctx.popular_votes, achievement.threshold),
        AchievementKind::Social => reaches(ctx.shares, achievement.threshold),
        AchievementKind::Divisive => ctx.is_rare_opinion,
        AchievementKind::EarlyVoter => ctx.is_early_voter,
    }
}

/// Catalog entries the context qualifies for that the user does not hold yet
pub fn pending_unlocks<'a>(
    catalog: &'a [Achievement],
    held: &HashSet<String>,
    ctx: &TriggerContext,
) -> Vec<&'a Achievement> {
    catalog
        .iter()
        .filter(|achievement| !held.contains(&achievement.id))
        .filter(|achievement| qualifies(achievement, ctx))
        .collect()
}

/// Turns counters into one-time achievement unlocks
#[derive(Clone)]
pub struct AchievementEvaluator {
    repo: AchievementRepository,
}

impl AchievementEvaluator {
    pub fn new(pool: DbPool) -> Self {
        Self {
            repo: AchievementRepository::new(pool),
        }
    }

    /// Unlock everything the context qualifies for and return what was newly
    /// earned. Losing an unlock race to a concurrent request is not an error;
    /// the achievement is just not reported twice.
    pub fn evaluate(&self, fid: i64, ctx: &TriggerContext, at: DateTime<Utc>) -> Result<Vec<Achievement>> {
        let catalog = self.repo.catalog()?;
        let held = self.repo.held_ids(fid)?;

        let mut unlocked = Vec::new();
        for achievement in pending_unlocks(&catalog, &held, ctx) {
            if self.repo.unlock(fid, &achievement.id, at)? {
                tracing::info!("fid {} unlocked achievement '{}'", fid, achievement.id);
                unlocked.push(achievement.clone());
            }
        }

        Ok(unlocked)
    }

    pub fn user_achievements(&self, fid: i64) -> Result<Vec<UserAchievement>> {
        self.repo.earned_by(fid)
    }

    pub fn catalog(&self) -> Result<Vec<Achievement>> {
        self.repo.catalog()
    }
}
