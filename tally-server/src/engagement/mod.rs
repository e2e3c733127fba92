//! Vote pipeline plus the streak, achievement and statistics bookkeeping
//! that hangs off it.

pub mod achievements;
pub mod calendar;
pub mod coordinator;
pub mod error;
pub mod statistics;
pub mod streak;

pub use achievements::{AchievementEvaluator, TriggerContext};
pub use calendar::Calendar;
pub use coordinator::EngagementCoordinator;
pub use error::{BookkeepingError, EngagementError, EngagementResult};
pub use streak::{StreakChange, StreakTracker};
