//! Stateless classifications over topic tallies.
//!
//! Every function here takes counts that already include the vote being
//! processed; callers never pass pre-vote totals.

use tally_types::{Topic, TopicStats};

/// Fewer votes than this and a topic is never contested
pub const CONTESTED_MIN_VOTES: i64 = 10;
/// Largest percentage-point gap between the options that still counts as contested
pub const CONTESTED_MAX_SPREAD: i64 = 10;
/// Fewer votes than this and no vote is a rare opinion
pub const RARE_MIN_VOTES: i64 = 20;
/// Largest share of the vote, in percent, an option can hold and still be rare
pub const RARE_MAX_SHARE_PERCENT: i64 = 30;
/// A vote is early while the topic has at most this many votes
pub const EARLY_VOTER_MAX_VOTES: i64 = 10;

/// Share of `count` in `total` as a whole percentage, rounded half up.
/// Zero when there are no votes.
pub fn rounded_percent(count: i64, total: i64) -> i64 {
    if total <= 0 {
        return 0;
    }
    (200 * count + total) / (2 * total)
}

pub fn percentages(votes_a: i64, votes_b: i64) -> (i64, i64) {
    let total = votes_a + votes_b;
    (rounded_percent(votes_a, total), rounded_percent(votes_b, total))
}

/// Both options within a few points of each other on a busy enough topic
pub fn is_contested(votes_a: i64, votes_b: i64) -> bool {
    if votes_a + votes_b < CONTESTED_MIN_VOTES {
        return false;
    }
    let (percent_a, percent_b) = percentages(votes_a, votes_b);
    (percent_a - percent_b).abs() <= CONTESTED_MAX_SPREAD
}

/// The chosen option holds a small share of a busy topic
pub fn is_rare_opinion(chosen_votes: i64, total_votes: i64) -> bool {
    if total_votes < RARE_MIN_VOTES {
        return false;
    }
    chosen_votes * 100 <= RARE_MAX_SHARE_PERCENT * total_votes
}

pub fn is_early_voter(total_votes: i64) -> bool {
    total_votes > 0 && total_votes <= EARLY_VOTER_MAX_VOTES
}

pub fn topic_stats(topic: &Topic) -> TopicStats {
    let (percent_a, percent_b) = percentages(topic.votes_a, topic.votes_b);
    TopicStats {
        topic_id: topic.id,
        votes_a: topic.votes_a,
        votes_b: topic.votes_b,
        total_votes: topic.total_votes(),
        percent_a,
        percent_b,
        is_contested: is_contested(topic.votes_a, topic.votes_b),
    }
}
