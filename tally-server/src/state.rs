use crate::db::Database;
use crate::engagement::{Calendar, EngagementCoordinator};

#[derive(Clone)]
pub struct AppState {
    pub db: Database,
    pub engagement: EngagementCoordinator,
}

impl AppState {
    pub fn new(db: Database, calendar: Calendar) -> Self {
        let engagement = EngagementCoordinator::new(&db, calendar);
        Self { db, engagement }
    }
}
