/// SQL schema for the Tally database
/// Creates all tables with proper constraints, foreign keys, and indexes
pub const SCHEMA: &str = r#"
-- Topics table (two-option polls)
CREATE TABLE IF NOT EXISTS topics (
    id TEXT PRIMARY KEY,
    option_a TEXT NOT NULL,
    option_b TEXT NOT NULL,
    image_a TEXT,
    image_b TEXT,
    starts_at TEXT NOT NULL,
    ends_at TEXT,
    votes_a INTEGER NOT NULL DEFAULT 0 CHECK(votes_a >= 0),
    votes_b INTEGER NOT NULL DEFAULT 0 CHECK(votes_b >= 0),
    is_active INTEGER NOT NULL DEFAULT 1,
    submitted_by INTEGER,
    created_at TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_topics_active ON topics(is_active, starts_at DESC);
CREATE INDEX IF NOT EXISTS idx_topics_submitted_by ON topics(submitted_by);

-- Votes table, one row per (topic, user)
CREATE TABLE IF NOT EXISTS votes (
    id TEXT PRIMARY KEY,
    topic_id TEXT NOT NULL,
    fid INTEGER NOT NULL,
    choice TEXT NOT NULL CHECK(choice IN ('A', 'B')),
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL,
    UNIQUE (topic_id, fid),
    FOREIGN KEY (topic_id) REFERENCES topics(id) ON DELETE CASCADE
);

CREATE INDEX IF NOT EXISTS idx_votes_fid ON votes(fid);

-- Per-user voting streaks
CREATE TABLE IF NOT EXISTS user_streaks (
    fid INTEGER PRIMARY KEY,
    current_streak INTEGER NOT NULL CHECK(current_streak >= 0),
    longest_streak INTEGER NOT NULL,
    last_vote_date TEXT NOT NULL,
    total_votes INTEGER NOT NULL DEFAULT 0,
    CHECK(current_streak <= longest_streak)
);

CREATE INDEX IF NOT EXISTS idx_user_streaks_current ON user_streaks(current_streak DESC, longest_streak DESC);

-- Achievement catalog
CREATE TABLE IF NOT EXISTS achievements (
    id TEXT PRIMARY KEY,
    name TEXT NOT NULL,
    description TEXT NOT NULL,
    type TEXT NOT NULL CHECK(type IN ('votes', 'streak', 'submissions', 'popular', 'divisive', 'social', 'early_voter')),
    threshold INTEGER NOT NULL
);

-- Unlocked achievements; the primary key makes unlocking one-time
CREATE TABLE IF NOT EXISTS user_achievements (
    fid INTEGER NOT NULL,
    achievement_id TEXT NOT NULL,
    earned_at TEXT NOT NULL,
    PRIMARY KEY (fid, achievement_id),
    FOREIGN KEY (achievement_id) REFERENCES achievements(id) ON DELETE CASCADE
);

-- Append-only activity log (shares, submissions)
CREATE TABLE IF NOT EXISTS activity_events (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    event_type TEXT NOT NULL,
    fid INTEGER NOT NULL,
    topic_id TEXT,
    created_at TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_activity_events_type_fid ON activity_events(event_type, fid);
CREATE INDEX IF NOT EXISTS idx_activity_events_topic ON activity_events(topic_id);
"#;

/// Built-in achievement catalog, applied on every startup
pub const ACHIEVEMENT_CATALOG: &str = r#"
INSERT OR IGNORE INTO achievements (id, name, description, type, threshold) VALUES
    ('first_vote', 'First Vote', 'Cast your first vote', 'votes', 1),
    ('voter_10', 'Regular', 'Vote on 10 topics', 'votes', 10),
    ('voter_50', 'Devoted', 'Vote on 50 topics', 'votes', 50),
    ('voter_100', 'Centurion', 'Vote on 100 topics', 'votes', 100),
    ('streak_3', 'Warming Up', 'Vote 3 days in a row', 'streak', 3),
    ('streak_7', 'On Fire', 'Vote 7 days in a row', 'streak', 7),
    ('streak_30', 'Unstoppable', 'Vote 30 days in a row', 'streak', 30),
    ('contrarian', 'Contrarian', 'Side with a small minority on a busy topic', 'divisive', 1),
    ('early_bird', 'Early Bird', 'Be among the first ten voters on a topic', 'early_voter', 1),
    ('first_submission', 'Question Master', 'Submit your first topic', 'submissions', 1),
    ('prolific_5', 'Prolific', 'Submit 5 topics', 'submissions', 5),
    ('crowd_pleaser', 'Crowd Pleaser', 'Submit a topic that gets 50 votes', 'popular', 50),
    ('sharer_1', 'Spreading the Word', 'Share a topic', 'social', 1),
    ('sharer_5', 'Social Butterfly', 'Share 5 topics', 'social', 5);
"#;

/// Sample topics for local development
pub const SAMPLE_TOPICS: &str = r#"
INSERT OR IGNORE INTO topics (id, option_a, option_b, starts_at, is_active, created_at) VALUES
    ('750e8400-e29b-41d4-a716-446655440001', 'Tabs', 'Spaces', '2024-01-01T00:00:00Z', 1, '2024-01-01T00:00:00Z'),
    ('750e8400-e29b-41d4-a716-446655440002', 'Coffee', 'Tea', '2024-01-01T00:00:00Z', 1, '2024-01-01T00:00:00Z'),
    ('750e8400-e29b-41d4-a716-446655440003', 'Cats', 'Dogs', '2024-01-01T00:00:00Z', 1, '2024-01-01T00:00:00Z'),
    ('750e8400-e29b-41d4-a716-446655440004', 'Pineapple on pizza', 'Never', '2024-01-01T00:00:00Z', 0, '2024-01-01T00:00:00Z');
"#;
