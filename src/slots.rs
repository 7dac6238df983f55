//! The fixed day grid. Slots begin every 30 minutes from 05:00 through the
//! final start at 20:30; each occupies a fixed 60 minutes, so the last slot
//! runs past the final start time (20:30–21:30).
//!
//! This grid is configuration, not per-request state. The overlap resolver
//! and the HTTP surface iterate the same sequence so the board never offers
//! a start the ledger would reject.

use crate::model::{Minute, TimeRange};

pub const OPEN_MINUTE: Minute = 5 * 60;
pub const LAST_START_MINUTE: Minute = 20 * 60 + 30;
pub const SLOT_STEP_MIN: Minute = 30;
pub const SLOT_DURATION_MIN: Minute = 60;

/// Ordered sequence of grid start times. Restartable — call as often as needed.
pub fn grid_slots() -> impl Iterator<Item = Minute> + Clone {
    (OPEN_MINUTE..=LAST_START_MINUTE).step_by(SLOT_STEP_MIN as usize)
}

/// Whether `start` is one of the grid marks.
pub fn is_grid_start(start: Minute) -> bool {
    start >= OPEN_MINUTE
        && start <= LAST_START_MINUTE
        && (start - OPEN_MINUTE) % SLOT_STEP_MIN == 0
}

/// The occupied interval of a slot starting at `start`.
pub fn slot_range(start: Minute) -> TimeRange {
    TimeRange::new(start, start + SLOT_DURATION_MIN)
}
