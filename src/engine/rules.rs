use chrono::{Days, NaiveDate};
use ulid::Ulid;

use crate::model::{CourtId, HouseId};

use super::EngineError;

/// Bookings may be placed from today through today + 7 days, venue-local.
pub const ADVANCE_WINDOW_DAYS: u64 = 7;

/// A house may hold at most this many future confirmed reservations per court.
pub const HOUSE_COURT_CAP: usize = 2;

/// Window check. Runs before the cap check — both are independent necessary
/// conditions, and this one needs no ledger read.
pub(crate) fn check_window(date: NaiveDate, today: NaiveDate) -> Result<(), EngineError> {
    if date < today {
        return Err(EngineError::OutOfWindow { date });
    }
    let inside = today
        .checked_add_days(Days::new(ADVANCE_WINDOW_DAYS))
        .is_some_and(|horizon| date <= horizon);
    if !inside {
        return Err(EngineError::OutOfWindow { date });
    }
    Ok(())
}

pub(crate) fn check_house_cap(
    future_confirmed: usize,
    house: &HouseId,
    court: &CourtId,
) -> Result<(), EngineError> {
    if future_confirmed >= HOUSE_COURT_CAP {
        return Err(EngineError::HouseCapExceeded {
            house: house.clone(),
            court: court.clone(),
        });
    }
    Ok(())
}

/// Per-(house, court) record of confirmed reservations, used for the cap
/// check. Guarded by its own async mutex in the engine; always locked before
/// any partition lock.
#[derive(Debug, Default)]
pub(crate) struct HouseLedger {
    entries: Vec<(Ulid, NaiveDate)>,
}

impl HouseLedger {
    pub fn future_count(&self, today: NaiveDate) -> usize {
        self.entries.iter().filter(|(_, date)| *date >= today).count()
    }

    pub fn insert(&mut self, id: Ulid, date: NaiveDate) {
        self.entries.push((id, date));
    }

    pub fn remove(&mut self, id: Ulid) {
        self.entries.retain(|(entry_id, _)| *entry_id != id);
    }

    /// Drop entries whose date precedes `cutoff` (retention pruning).
    pub fn prune_before(&mut self, cutoff: NaiveDate) {
        self.entries.retain(|(_, date)| *date >= cutoff);
    }
}
