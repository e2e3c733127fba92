use chrono::{DateTime, FixedOffset, NaiveDate, Offset, Utc};

/// The single calendar streak days are counted in
///
/// A fixed UTC offset, so a vote's day never depends on the host's local zone.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Calendar {
    offset: FixedOffset,
}

impl Calendar {
    pub fn utc() -> Self {
        Self { offset: Utc.fix() }
    }

    /// Calendar at a fixed offset east of UTC. None when the offset is
    /// outside ±24h.
    pub fn from_offset_minutes(minutes: i32) -> Option<Self> {
        minutes
            .checked_mul(60)
            .and_then(FixedOffset::east_opt)
            .map(|offset| Self { offset })
    }

    pub fn offset(&self) -> FixedOffset {
        self.offset
    }

    /// Calendar day an instant falls on
    pub fn day_of(&self, at: DateTime<Utc>) -> NaiveDate {
        at.with_timezone(&self.offset).date_naive()
    }
}

impl Default for Calendar {
    fn default() -> Self {
        Self::utc()
    }
}
