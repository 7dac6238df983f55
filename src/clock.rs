//! The venue's civil calendar. Every date-window comparison in the engine
//! reads "today" from this one source; nothing else consults a clock for
//! calendar purposes.

use chrono::{FixedOffset, NaiveDate, Utc};

/// Default venue offset: UTC−6 (the venue's local clock, no DST).
pub const DEFAULT_UTC_OFFSET_MIN: i32 = -360;

#[derive(Debug, Clone, Copy)]
pub struct VenueClock {
    offset: FixedOffset,
}

impl VenueClock {
    /// Build a clock from a UTC offset in minutes. Returns `None` for offsets
    /// outside ±24h.
    pub fn from_offset_minutes(offset_min: i32) -> Option<Self> {
        FixedOffset::east_opt(offset_min * 60).map(|offset| Self { offset })
    }

    /// The venue-local calendar date right now.
    pub fn today(&self) -> NaiveDate {
        Utc::now().with_timezone(&self.offset).date_naive()
    }
}

impl Default for VenueClock {
    fn default() -> Self {
        Self::from_offset_minutes(DEFAULT_UTC_OFFSET_MIN).expect("default offset is in range")
    }
}

/// Unix milliseconds — used for `created_at` stamps, not calendar logic.
pub fn unix_ms() -> i64 {
    Utc::now().timestamp_millis()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn offset_bounds() {
        assert!(VenueClock::from_offset_minutes(-360).is_some());
        assert!(VenueClock::from_offset_minutes(0).is_some());
        assert!(VenueClock::from_offset_minutes(14 * 60).is_some());
        assert!(VenueClock::from_offset_minutes(25 * 60).is_none());
    }

    #[test]
    fn default_matches_explicit() {
        let explicit = VenueClock::from_offset_minutes(DEFAULT_UTC_OFFSET_MIN).unwrap();
        // Same instant must map to the same civil date.
        assert_eq!(explicit.today(), VenueClock::default().today());
    }
}
