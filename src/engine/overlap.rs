use crate::model::{HouseId, Minute, Reservation, TimeRange};
use crate::slots;

/// One grid slot on the availability board.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SlotCell {
    pub start: Minute,
    pub end: Minute,
    /// Set when the slot conflicts with a confirmed reservation; carries the
    /// holding house for display attribution.
    pub taken_by: Option<HouseId>,
}

impl SlotCell {
    pub fn is_taken(&self) -> bool {
        self.taken_by.is_some()
    }
}

/// First confirmed reservation whose stored interval conflicts with `range`.
/// Two half-open intervals conflict iff s1 < e2 && s2 < e1; each row's own
/// end is used, so per-reservation durations that differ from the grid's
/// nominal duration classify correctly.
pub(crate) fn find_conflict<'a>(
    rows: &'a [Reservation],
    range: &TimeRange,
) -> Option<&'a Reservation> {
    rows.iter()
        .find(|r| r.is_confirmed() && r.range.overlaps(range))
}

/// Classify every grid slot against the day's reservations. Linear scan per
/// slot — bounded daily volumes, no interval index needed at this scale.
pub(crate) fn slot_board(rows: &[Reservation]) -> Vec<SlotCell> {
    slots::grid_slots()
        .map(|start| {
            let range = slots::slot_range(start);
            SlotCell {
                start,
                end: range.end,
                taken_by: find_conflict(rows, &range).map(|r| r.house.clone()),
            }
        })
        .collect()
}
