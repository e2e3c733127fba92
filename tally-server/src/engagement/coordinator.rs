use chrono::{DateTime, Utc};
use std::sync::Arc;
use uuid::Uuid;

use tally_types::{
    Achievement, ActivityKind, Choice, CreateTopicRequest, UserAchievement, ShareOutcome, SubmissionOutcome,
    Topic, TopicStats, UserStreak, VoteOutcome,
};

use super::achievements::{AchievementEvaluator, TriggerContext};
use super::calendar::Calendar;
use super::error::{BookkeepingError, EngagementError, EngagementResult};
use super::statistics;
use super::streak::StreakTracker;
use crate::db::repositories::{
    stored_instant, ActivityEvent, ActivityLog, ActivityRepository, EventFilter, TopicRepository,
    VoteLedger,
};
use crate::db::Database;

/// Longest option label accepted for a topic
const MAX_OPTION_LENGTH: usize = 120;

/// Runs the "cast vote" pipeline and the other engagement entry points
///
/// Only the vote write is transactional. Streak and achievement bookkeeping run
/// after it commits; their failures are logged and never undo or fail the vote.
#[derive(Clone)]
pub struct EngagementCoordinator {
    topics: TopicRepository,
    ledger: VoteLedger,
    streaks: StreakTracker,
    achievements: AchievementEvaluator,
    activity: Arc<dyn ActivityLog>,
    calendar: Calendar,
}

impl EngagementCoordinator {
    pub fn new(db: &Database, calendar: Calendar) -> Self {
        let pool = db.pool.clone();
        Self {
            topics: TopicRepository::new(pool.clone()),
            ledger: VoteLedger::new(pool.clone()),
            streaks: StreakTracker::new(pool.clone()),
            achievements: AchievementEvaluator::new(pool.clone()),
            activity: Arc::new(ActivityRepository::new(pool)),
            calendar,
        }
    }

    /// Replace the activity log backend
    pub fn with_activity_log(mut self, activity: Arc<dyn ActivityLog>) -> Self {
        self.activity = activity;
        self
    }

    pub fn record_vote(&self, topic_id: &Uuid, fid: i64, choice: &str) -> EngagementResult<VoteOutcome> {
        self.record_vote_at(topic_id, fid, choice, Utc::now())
    }

    /// Cast or change a vote at a given instant
    pub fn record_vote_at(
        &self,
        topic_id: &Uuid,
        fid: i64,
        choice: &str,
        at: DateTime<Utc>,
    ) -> EngagementResult<VoteOutcome> {
        // 1. Validate before any write
        validate_fid(fid)?;
        let choice = Choice::parse(choice).ok_or_else(|| {
            EngagementError::Validation(format!("choice must be 'A' or 'B', got '{}'", choice))
        })?;
        let topic = self
            .topics
            .get_by_id(topic_id)?
            .ok_or(EngagementError::TopicNotFound(*topic_id))?;
        if !topic.is_active {
            return Err(EngagementError::TopicInactive(*topic_id));
        }

        // 2. The only step the caller's success depends on
        let upsert = self.ledger.upsert_vote(topic_id, fid, choice, at)?;
        tracing::debug!(
            "Vote by fid {} on topic {}: {} (new: {}, changed: {})",
            fid,
            topic_id,
            choice.as_str(),
            upsert.is_new_vote,
            upsert.choice_changed
        );

        // 3. Streaks only move on new votes
        let streak = if upsert.is_new_vote {
            self.streaks
                .register_activity(fid, self.calendar.day_of(at))
                .map_err(|source| BookkeepingError::Streak { fid, source })
        } else {
            self.streaks
                .get_streak(fid)
                .map_err(|source| BookkeepingError::Streak { fid, source })
                .and_then(|streak| {
                    streak.ok_or_else(|| BookkeepingError::Streak {
                        fid,
                        source: anyhow::anyhow!("no streak record for an existing voter"),
                    })
                })
        };
        let streak = match streak {
            Ok(streak) => Some(streak),
            Err(err) => {
                tracing::warn!("Streak bookkeeping skipped: {}", err);
                None
            }
        };

        // 4. Classify against the tallies committed with this vote
        let topic = upsert.topic;
        let stats = statistics::topic_stats(&topic);
        let vote_counted = upsert.is_new_vote || upsert.choice_changed;
        let is_rare_opinion = vote_counted
            && statistics::is_rare_opinion(topic.votes_for(choice), topic.total_votes());
        let is_early_voter = upsert.is_new_vote && statistics::is_early_voter(topic.total_votes());

        // 5. Achievements for the voter, then for the topic's author
        let new_achievements = match self.evaluate_vote_achievements(
            fid,
            streak.as_ref(),
            is_rare_opinion,
            is_early_voter,
            at,
        ) {
            Ok(unlocked) => unlocked,
            Err(err) => {
                tracing::error!("Achievement bookkeeping skipped: {}", err);
                Vec::new()
            }
        };
        if upsert.is_new_vote {
            self.evaluate_author_achievements(&topic, at);
        }

        Ok(VoteOutcome {
            vote: upsert.vote,
            is_new_vote: upsert.is_new_vote,
            choice_changed: upsert.choice_changed,
            stats,
            is_rare_opinion,
            is_early_voter,
            streak,
            new_achievements,
        })
    }

    fn evaluate_vote_achievements(
        &self,
        fid: i64,
        streak: Option<&UserStreak>,
        is_rare_opinion: bool,
        is_early_voter: bool,
        at: DateTime<Utc>,
    ) -> Result<Vec<Achievement>, BookkeepingError> {
        let total_votes = self
            .ledger
            .count_by_user(fid)
            .map_err(|source| BookkeepingError::Achievements { fid, source })?;
        let ctx = TriggerContext::for_vote(
            total_votes,
            streak.map(|s| s.current_streak),
            is_rare_opinion,
            is_early_voter,
        );
        self.achievements
            .evaluate(fid, &ctx, at)
            .map_err(|source| BookkeepingError::Achievements { fid, source })
    }

    /// Popular-type achievements for whoever submitted the topic
    fn evaluate_author_achievements(&self, topic: &Topic, at: DateTime<Utc>) {
        let Some(author) = topic.submitted_by else {
            return;
        };
        let ctx = TriggerContext::for_popular_topic(topic.total_votes());
        match self.achievements.evaluate(author, &ctx, at) {
            Ok(unlocked) if !unlocked.is_empty() => {
                tracing::info!(
                    "Topic {} earned {} achievement(s) for its author fid {}",
                    topic.id,
                    unlocked.len(),
                    author
                );
            }
            Ok(_) => {}
            Err(source) => {
                let err = BookkeepingError::Achievements { fid: author, source };
                tracing::error!("Author achievement bookkeeping skipped: {}", err);
            }
        }
    }

    pub fn create_topic(&self, request: CreateTopicRequest) -> EngagementResult<SubmissionOutcome> {
        self.create_topic_at(request, Utc::now())
    }

    /// Create a topic; when `submitted_by` is set it counts as that user's submission
    pub fn create_topic_at(
        &self,
        request: CreateTopicRequest,
        at: DateTime<Utc>,
    ) -> EngagementResult<SubmissionOutcome> {
        let at = stored_instant(at);
        let option_a = request.option_a.trim().to_string();
        let option_b = request.option_b.trim().to_string();
        validate_option(&option_a, "option_a")?;
        validate_option(&option_b, "option_b")?;
        if option_a.eq_ignore_ascii_case(&option_b) {
            return Err(EngagementError::Validation(
                "the two options must differ".to_string(),
            ));
        }
        if let Some(fid) = request.submitted_by {
            validate_fid(fid)?;
        }
        let starts_at = request.starts_at.map_or(at, stored_instant);
        let ends_at = request.ends_at.map(stored_instant);
        if let Some(ends_at) = ends_at {
            if ends_at <= starts_at {
                return Err(EngagementError::Validation(
                    "ends_at must be after starts_at".to_string(),
                ));
            }
        }

        let topic = Topic {
            id: Uuid::new_v4(),
            option_a,
            option_b,
            image_a: request.image_a,
            image_b: request.image_b,
            starts_at,
            ends_at,
            votes_a: 0,
            votes_b: 0,
            is_active: true,
            submitted_by: request.submitted_by,
            created_at: at,
        };
        self.topics.create(&topic)?;
        tracing::info!("Created topic {} ({} vs {})", topic.id, topic.option_a, topic.option_b);

        let new_achievements = match topic.submitted_by {
            Some(fid) => match self.evaluate_submission_achievements(&topic, fid, at) {
                Ok(unlocked) => unlocked,
                Err(err) => {
                    tracing::error!("Submission bookkeeping skipped: {}", err);
                    Vec::new()
                }
            },
            None => Vec::new(),
        };

        Ok(SubmissionOutcome {
            topic,
            new_achievements,
        })
    }

    fn evaluate_submission_achievements(
        &self,
        topic: &Topic,
        fid: i64,
        at: DateTime<Utc>,
    ) -> Result<Vec<Achievement>, BookkeepingError> {
        let event = ActivityEvent {
            kind: ActivityKind::Submission,
            fid,
            topic_id: Some(topic.id),
            at,
        };
        if let Err(source) = self.activity.append(&event) {
            tracing::warn!("{}", BookkeepingError::Activity { fid, source });
        }

        let submissions = self
            .topics
            .count_submitted_by(fid)
            .map_err(|source| BookkeepingError::Achievements { fid, source })?;
        self.achievements
            .evaluate(fid, &TriggerContext::for_submissions(submissions), at)
            .map_err(|source| BookkeepingError::Achievements { fid, source })
    }

    pub fn record_share(&self, topic_id: &Uuid, fid: i64) -> EngagementResult<ShareOutcome> {
        self.record_share_at(topic_id, fid, Utc::now())
    }

    /// Log that a user shared a topic and check social achievements
    pub fn record_share_at(
        &self,
        topic_id: &Uuid,
        fid: i64,
        at: DateTime<Utc>,
    ) -> EngagementResult<ShareOutcome> {
        validate_fid(fid)?;
        if self.topics.get_by_id(topic_id)?.is_none() {
            return Err(EngagementError::TopicNotFound(*topic_id));
        }

        self.activity.append(&ActivityEvent {
            kind: ActivityKind::Share,
            fid,
            topic_id: Some(*topic_id),
            at,
        })?;

        let share_count = match self.activity.count(ActivityKind::Share, &EventFilter::for_user(fid)) {
            Ok(count) => Some(count),
            Err(source) => {
                tracing::warn!("{}", BookkeepingError::Activity { fid, source });
                None
            }
        };

        let new_achievements = match share_count {
            Some(shares) => self
                .achievements
                .evaluate(fid, &TriggerContext::for_shares(shares), at)
                .unwrap_or_else(|source| {
                    let err = BookkeepingError::Achievements { fid, source };
                    tracing::error!("Share bookkeeping skipped: {}", err);
                    Vec::new()
                }),
            None => Vec::new(),
        };

        Ok(ShareOutcome {
            topic_id: *topic_id,
            share_count,
            new_achievements,
        })
    }

    pub fn get_streak(&self, fid: i64) -> EngagementResult<Option<UserStreak>> {
        validate_fid(fid)?;
        Ok(self.streaks.get_streak(fid)?)
    }

    pub fn get_topic_stats(&self, topic_id: &Uuid) -> EngagementResult<TopicStats> {
        let topic = self
            .topics
            .get_by_id(topic_id)?
            .ok_or(EngagementError::TopicNotFound(*topic_id))?;
        Ok(statistics::topic_stats(&topic))
    }

    pub fn get_user_achievements(&self, fid: i64) -> EngagementResult<Vec<UserAchievement>> {
        validate_fid(fid)?;
        Ok(self.achievements.user_achievements(fid)?)
    }

    pub fn list_active_topics(&self, limit: i64) -> EngagementResult<Vec<Topic>> {
        Ok(self.topics.list_active(limit.clamp(1, 100))?)
    }

    pub fn set_topic_active(&self, topic_id: &Uuid, is_active: bool) -> EngagementResult<Topic> {
        if !self.topics.set_active(topic_id, is_active)? {
            return Err(EngagementError::TopicNotFound(*topic_id));
        }
        tracing::info!("Topic {} active: {}", topic_id, is_active);
        self.topics
            .get_by_id(topic_id)?
            .ok_or(EngagementError::TopicNotFound(*topic_id))
    }

    /// Rebuild a topic's cached tallies from its vote rows
    pub fn repair_tallies(&self, topic_id: &Uuid) -> EngagementResult<TopicStats> {
        if self.topics.get_by_id(topic_id)?.is_none() {
            return Err(EngagementError::TopicNotFound(*topic_id));
        }
        self.topics.recount(topic_id)?;
        tracing::info!("Recounted tallies for topic {}", topic_id);
        self.get_topic_stats(topic_id)
    }

    pub fn streak_leaderboard(&self, limit: i64) -> EngagementResult<Vec<UserStreak>> {
        Ok(self.streaks.leaderboard(limit.clamp(1, 100))?)
    }
}

fn validate_fid(fid: i64) -> EngagementResult<()> {
    if fid <= 0 {
        return Err(EngagementError::Validation(format!(
            "fid must be a positive integer, got {}",
            fid
        )));
    }
    Ok(())
}

fn validate_option(label: &str, field: &str) -> EngagementResult<()> {
    if label.is_empty() {
        return Err(EngagementError::Validation(format!("{} cannot be empty", field)));
    }
    if label.chars().count() > MAX_OPTION_LENGTH {
        return Err(EngagementError::Validation(format!(
            "{} exceeds {} character limit",
            field, MAX_OPTION_LENGTH
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::Result;
    use chrono::TimeZone;
    use std::sync::Mutex;

    fn at(day: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, day, 12, 0, 0).unwrap()
    }

    fn setup() -> Result<(Database, EngagementCoordinator)> {
        let db = Database::in_memory()?;
        db.initialize()?;
        let coordinator = EngagementCoordinator::new(&db, Calendar::utc());
        Ok((db, coordinator))
    }

    fn new_topic(coordinator: &EngagementCoordinator, submitted_by: Option<i64>) -> Result<Topic> {
        let outcome = coordinator.create_topic_at(
            CreateTopicRequest {
                option_a: "Cats".to_string(),
                option_b: "Dogs".to_string(),
                starts_at: Some(at(1)),
                submitted_by,
                ..Default::default()
            },
            at(1),
        )?;
        Ok(outcome.topic)
    }

    fn set_tallies(db: &Database, topic: &Topic, votes_a: i64, votes_b: i64) -> Result<()> {
        // Seed other voters directly so tallies and rows stay consistent
        let conn = db.connection()?;
        let mut fid = 10_000;
        for (choice, count) in [("A", votes_a), ("B", votes_b)] {
            for _ in 0..count {
                fid += 1;
                conn.execute(
                    "INSERT INTO votes (id, topic_id, fid, choice, created_at, updated_at)
                     VALUES (?, ?, ?, ?, '2024-03-01T00:00:00Z', '2024-03-01T00:00:00Z')",
                    (Uuid::new_v4().to_string(), topic.id.to_string(), fid, choice),
                )?;
            }
        }
        conn.execute(
            "UPDATE topics SET votes_a = ?, votes_b = ? WHERE id = ?",
            (votes_a, votes_b, topic.id.to_string()),
        )?;
        Ok(())
    }

    fn achievement_ids(outcome: &VoteOutcome) -> Vec<&str> {
        let mut ids: Vec<&str> = outcome.new_achievements.iter().map(|a| a.id.as_str()).collect();
        ids.sort_unstable();
        ids
    }

    #[test]
    fn test_first_ever_vote() -> Result<()> {
        let (_db, coordinator) = setup()?;
        let topic = new_topic(&coordinator, None)?;

        let outcome = coordinator.record_vote_at(&topic.id, 1, "A", at(1))?;

        assert!(outcome.is_new_vote);
        assert!(!outcome.choice_changed);
        assert_eq!(outcome.stats.votes_a, 1);
        assert_eq!(outcome.stats.percent_a, 100);
        assert!(outcome.is_early_voter);
        assert!(!outcome.is_rare_opinion);
        let streak = outcome.streak.clone().expect("streak should be recorded");
        assert_eq!((streak.current_streak, streak.longest_streak, streak.total_votes), (1, 1, 1));
        assert_eq!(achievement_ids(&outcome), vec!["early_bird", "first_vote"]);

        Ok(())
    }

    #[test]
    fn test_consecutive_days_extend_streak() -> Result<()> {
        let (_db, coordinator) = setup()?;
        let first = new_topic(&coordinator, None)?;
        let second = new_topic(&coordinator, None)?;
        let third = new_topic(&coordinator, None)?;

        coordinator.record_vote_at(&first.id, 1, "A", at(1))?;
        coordinator.record_vote_at(&second.id, 1, "A", at(2))?;
        let outcome = coordinator.record_vote_at(&third.id, 1, "B", at(3))?;

        let streak = outcome.streak.clone().expect("streak should be recorded");
        assert_eq!((streak.current_streak, streak.longest_streak), (3, 3));
        assert!(achievement_ids(&outcome).contains(&"streak_3"));

        Ok(())
    }

    #[test]
    fn test_gap_resets_streak_keeps_longest() -> Result<()> {
        let (_db, coordinator) = setup()?;
        let topics: Vec<Topic> = (0..4)
            .map(|_| new_topic(&coordinator, None))
            .collect::<Result<_>>()?;

        coordinator.record_vote_at(&topics[0].id, 1, "A", at(1))?;
        coordinator.record_vote_at(&topics[1].id, 1, "A", at(2))?;
        let outcome = coordinator.record_vote_at(&topics[2].id, 1, "A", at(5))?;

        let streak = outcome.streak.expect("streak should be recorded");
        assert_eq!((streak.current_streak, streak.longest_streak, streak.total_votes), (1, 2, 3));

        Ok(())
    }

    #[test]
    fn test_revote_same_choice_is_noop() -> Result<()> {
        let (_db, coordinator) = setup()?;
        let topic = new_topic(&coordinator, None)?;

        coordinator.record_vote_at(&topic.id, 1, "A", at(1))?;
        let outcome = coordinator.record_vote_at(&topic.id, 1, "a", at(2))?;

        assert!(!outcome.is_new_vote);
        assert!(!outcome.choice_changed);
        assert!(!outcome.is_early_voter);
        assert_eq!(outcome.stats.total_votes, 1);
        // Streak is reported but not advanced by a repeat vote
        let streak = outcome.streak.expect("streak should be reported");
        assert_eq!((streak.current_streak, streak.total_votes), (1, 1));
        assert!(outcome.new_achievements.is_empty());

        Ok(())
    }

    #[test]
    fn test_changed_choice_does_not_touch_streak() -> Result<()> {
        let (_db, coordinator) = setup()?;
        let topic = new_topic(&coordinator, None)?;

        coordinator.record_vote_at(&topic.id, 1, "A", at(1))?;
        let outcome = coordinator.record_vote_at(&topic.id, 1, "B", at(2))?;

        assert!(outcome.choice_changed);
        assert_eq!((outcome.stats.votes_a, outcome.stats.votes_b), (0, 1));
        let streak = outcome.streak.expect("streak should be reported");
        assert_eq!(streak.last_vote_date, Calendar::utc().day_of(at(1)));
        assert_eq!(streak.total_votes, 1);

        Ok(())
    }

    #[test]
    fn test_rare_opinion_uses_post_vote_totals() -> Result<()> {
        let (db, coordinator) = setup()?;
        let topic = new_topic(&coordinator, None)?;
        set_tallies(&db, &topic, 17, 3)?;

        let outcome = coordinator.record_vote_at(&topic.id, 1, "B", at(2))?;

        assert_eq!((outcome.stats.votes_a, outcome.stats.votes_b), (17, 4));
        assert_eq!(outcome.stats.percent_b, 19);
        assert!(outcome.is_rare_opinion);
        assert!(!outcome.is_early_voter);
        assert!(achievement_ids(&outcome).contains(&"contrarian"));

        Ok(())
    }

    #[test]
    fn test_majority_vote_is_not_rare() -> Result<()> {
        let (db, coordinator) = setup()?;
        let topic = new_topic(&coordinator, None)?;
        set_tallies(&db, &topic, 17, 3)?;

        let outcome = coordinator.record_vote_at(&topic.id, 1, "A", at(2))?;
        assert!(!outcome.is_rare_opinion);

        Ok(())
    }

    #[test]
    fn test_contested_stats() -> Result<()> {
        let (db, coordinator) = setup()?;
        let close = new_topic(&coordinator, None)?;
        let lopsided = new_topic(&coordinator, None)?;
        set_tallies(&db, &close, 55, 45)?;
        set_tallies(&db, &lopsided, 60, 40)?;

        assert!(coordinator.get_topic_stats(&close.id)?.is_contested);
        assert!(!coordinator.get_topic_stats(&lopsided.id)?.is_contested);

        Ok(())
    }

    #[test]
    fn test_repair_tallies_restores_counters() -> Result<()> {
        let (db, coordinator) = setup()?;
        let topic = new_topic(&coordinator, None)?;
        coordinator.record_vote_at(&topic.id, 1, "A", at(2))?;
        coordinator.record_vote_at(&topic.id, 2, "B", at(2))?;

        db.connection()?.execute(
            "UPDATE topics SET votes_a = 40, votes_b = 0 WHERE id = ?",
            [topic.id.to_string()],
        )?;

        let stats = coordinator.repair_tallies(&topic.id)?;
        assert_eq!((stats.votes_a, stats.votes_b), (1, 1));

        let missing = Uuid::new_v4();
        assert!(matches!(
            coordinator.repair_tallies(&missing),
            Err(EngagementError::TopicNotFound(id)) if id == missing
        ));

        Ok(())
    }

    #[test]
    fn test_validation_has_no_side_effects() -> Result<()> {
        let (db, coordinator) = setup()?;
        let topic = new_topic(&coordinator, None)?;

        let err = coordinator.record_vote_at(&topic.id, 1, "C", at(1)).unwrap_err();
        assert!(matches!(err, EngagementError::Validation(_)));

        let err = coordinator.record_vote_at(&topic.id, 0, "A", at(1)).unwrap_err();
        assert!(matches!(err, EngagementError::Validation(_)));

        let missing = Uuid::new_v4();
        let err = coordinator.record_vote_at(&missing, 1, "A", at(1)).unwrap_err();
        assert!(matches!(err, EngagementError::TopicNotFound(_)));

        coordinator.set_topic_active(&topic.id, false)?;
        let err = coordinator.record_vote_at(&topic.id, 1, "A", at(1)).unwrap_err();
        assert!(matches!(err, EngagementError::TopicInactive(_)));

        let conn = db.connection()?;
        let votes: i64 = conn.query_row("SELECT COUNT(*) FROM votes", [], |row| row.get(0))?;
        let streaks: i64 = conn.query_row("SELECT COUNT(*) FROM user_streaks", [], |row| row.get(0))?;
        let earned: i64 = conn.query_row("SELECT COUNT(*) FROM user_achievements", [], |row| row.get(0))?;
        assert_eq!((votes, streaks, earned), (0, 0, 0));

        Ok(())
    }

    #[test]
    fn test_vote_survives_streak_failure() -> Result<()> {
        let (db, coordinator) = setup()?;
        let topic = new_topic(&coordinator, None)?;
        db.connection()?.execute_batch("DROP TABLE user_streaks;")?;

        let outcome = coordinator.record_vote_at(&topic.id, 1, "A", at(1))?;

        assert!(outcome.is_new_vote);
        assert!(outcome.streak.is_none());
        assert_eq!(outcome.stats.votes_a, 1);
        // Streak achievements are skipped, vote-count ones still unlock
        assert_eq!(achievement_ids(&outcome), vec!["early_bird", "first_vote"]);

        Ok(())
    }

    #[test]
    fn test_vote_survives_achievement_failure() -> Result<()> {
        let (db, coordinator) = setup()?;
        let topic = new_topic(&coordinator, None)?;
        db.connection()?.execute_batch("DROP TABLE user_achievements;")?;

        let outcome = coordinator.record_vote_at(&topic.id, 1, "B", at(1))?;

        assert!(outcome.is_new_vote);
        assert!(outcome.new_achievements.is_empty());
        assert_eq!(outcome.stats.votes_b, 1);
        assert!(outcome.streak.is_some());
        assert_eq!(coordinator.get_topic_stats(&topic.id)?.votes_b, 1);

        Ok(())
    }

    #[test]
    fn test_submission_achievements() -> Result<()> {
        let (_db, coordinator) = setup()?;

        let outcome = coordinator.create_topic_at(
            CreateTopicRequest {
                option_a: "Vim".to_string(),
                option_b: "Emacs".to_string(),
                submitted_by: Some(5),
                ..Default::default()
            },
            at(1),
        )?;

        assert_eq!(outcome.topic.submitted_by, Some(5));
        let ids: Vec<&str> = outcome.new_achievements.iter().map(|a| a.id.as_str()).collect();
        assert_eq!(ids, vec!["first_submission"]);

        Ok(())
    }

    #[test]
    fn test_created_topic_matches_stored_row() -> Result<()> {
        let (db, coordinator) = setup()?;
        let precise = at(1) + chrono::Duration::nanoseconds(633_301_082);

        let outcome = coordinator.create_topic_at(
            CreateTopicRequest {
                option_a: "Cats".to_string(),
                option_b: "Dogs".to_string(),
                ends_at: Some(precise + chrono::Duration::days(1)),
                ..Default::default()
            },
            precise,
        )?;
        let stored = TopicRepository::new(db.pool.clone())
            .get_by_id(&outcome.topic.id)?
            .expect("topic should exist");

        assert_eq!(stored.created_at, outcome.topic.created_at);
        assert_eq!(stored.starts_at, outcome.topic.starts_at);
        assert_eq!(stored.ends_at, outcome.topic.ends_at);

        let first = coordinator.record_vote_at(&stored.id, 1, "A", precise)?;
        let second = coordinator.record_vote_at(&stored.id, 1, "A", precise)?;
        assert_eq!(first.vote, second.vote);

        Ok(())
    }

    #[test]
    fn test_create_topic_validation() -> Result<()> {
        let (_db, coordinator) = setup()?;

        let same = coordinator.create_topic_at(
            CreateTopicRequest {
                option_a: "Yes".to_string(),
                option_b: " yes ".to_string(),
                ..Default::default()
            },
            at(1),
        );
        assert!(matches!(same, Err(EngagementError::Validation(_))));

        let backwards = coordinator.create_topic_at(
            CreateTopicRequest {
                option_a: "Yes".to_string(),
                option_b: "No".to_string(),
                starts_at: Some(at(3)),
                ends_at: Some(at(2)),
                ..Default::default()
            },
            at(1),
        );
        assert!(matches!(backwards, Err(EngagementError::Validation(_))));

        Ok(())
    }

    #[test]
    fn test_popular_achievement_goes_to_author() -> Result<()> {
        let (db, coordinator) = setup()?;
        let topic = new_topic(&coordinator, Some(77))?;
        set_tallies(&db, &topic, 30, 19)?;

        let outcome = coordinator.record_vote_at(&topic.id, 1, "A", at(2))?;

        assert!(outcome.new_achievements.iter().all(|a| a.id != "crowd_pleaser"));
        let author: Vec<String> = coordinator
            .get_user_achievements(77)?
            .into_iter()
            .map(|earned| earned.achievement.id)
            .collect();
        assert!(author.contains(&"crowd_pleaser".to_string()));

        Ok(())
    }

    #[test]
    fn test_shares_unlock_social_achievements() -> Result<()> {
        let (_db, coordinator) = setup()?;
        let topic = new_topic(&coordinator, None)?;

        let first = coordinator.record_share_at(&topic.id, 3, at(1))?;
        assert_eq!(first.share_count, Some(1));
        assert_eq!(first.new_achievements.len(), 1);
        assert_eq!(first.new_achievements[0].id, "sharer_1");

        for _ in 0..3 {
            coordinator.record_share_at(&topic.id, 3, at(1))?;
        }
        let fifth = coordinator.record_share_at(&topic.id, 3, at(2))?;
        assert_eq!(fifth.share_count, Some(5));
        assert_eq!(fifth.new_achievements[0].id, "sharer_5");

        let missing = coordinator.record_share_at(&Uuid::new_v4(), 3, at(2));
        assert!(matches!(missing, Err(EngagementError::TopicNotFound(_))));

        Ok(())
    }

    /// Activity log that records appends but cannot count
    struct AppendOnlyLog {
        events: Mutex<Vec<ActivityEvent>>,
    }

    impl ActivityLog for AppendOnlyLog {
        fn append(&self, event: &ActivityEvent) -> Result<()> {
            self.events.lock().unwrap().push(event.clone());
            Ok(())
        }

        fn count(&self, _kind: ActivityKind, _filter: &EventFilter) -> Result<i64> {
            Err(anyhow::anyhow!("counting unavailable"))
        }
    }

    #[test]
    fn test_share_survives_count_failure() -> Result<()> {
        let (_db, coordinator) = setup()?;
        let topic = new_topic(&coordinator, None)?;
        let log = Arc::new(AppendOnlyLog {
            events: Mutex::new(Vec::new()),
        });
        let coordinator = coordinator.with_activity_log(log.clone());

        let outcome = coordinator.record_share_at(&topic.id, 3, at(1))?;

        assert_eq!(outcome.share_count, None);
        assert!(outcome.new_achievements.is_empty());
        assert_eq!(log.events.lock().unwrap().len(), 1);

        Ok(())
    }
}
