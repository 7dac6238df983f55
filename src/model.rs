use std::fmt;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use ulid::Ulid;

use crate::token::CancelToken;

/// Minutes since venue midnight — the only time-of-day type.
pub type Minute = u16;

/// Half-open interval `[start, end)` in minutes since venue midnight.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeRange {
    pub start: Minute,
    pub end: Minute,
}

impl TimeRange {
    pub fn new(start: Minute, end: Minute) -> Self {
        debug_assert!(start < end, "TimeRange start must be before end");
        Self { start, end }
    }

    pub fn duration_min(&self) -> Minute {
        self.end - self.start
    }

    pub fn overlaps(&self, other: &TimeRange) -> bool {
        self.start < other.end && other.start < self.end
    }
}

/// Format a minute-of-day as `HH:MM`.
pub fn format_hhmm(minute: Minute) -> String {
    format!("{:02}:{:02}", minute / 60, minute % 60)
}

/// Parse `HH:MM` into a minute-of-day. Seconds are not accepted.
pub fn parse_hhmm(s: &str) -> Option<Minute> {
    use chrono::Timelike;
    let t = chrono::NaiveTime::parse_from_str(s, "%H:%M").ok()?;
    Some((t.hour() * 60 + t.minute()) as Minute)
}

// ── Reference data ───────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CourtId(pub String);

impl fmt::Display for CourtId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct HouseId(pub String);

impl fmt::Display for HouseId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CourtType {
    Padel,
    TennisPickleball,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Court {
    pub id: CourtId,
    pub name: String,
    pub court_type: CourtType,
    pub active: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct House {
    pub id: HouseId,
    pub name: String,
    pub active: bool,
}

// ── Reservations ─────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReservationStatus {
    Confirmed,
    Cancelled,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Reservation {
    pub id: Ulid,
    pub court: CourtId,
    pub house: HouseId,
    pub date: NaiveDate,
    /// Occupied interval. `end` is stored per row, never recomputed from the
    /// grid's nominal duration.
    pub range: TimeRange,
    pub status: ReservationStatus,
    pub booker_name: String,
    pub booker_email: Option<String>,
    pub booker_phone: Option<String>,
    pub cancel_token: CancelToken,
    pub created_at_ms: i64,
}

impl Reservation {
    pub fn is_confirmed(&self) -> bool {
        self.status == ReservationStatus::Confirmed
    }
}

/// Admissions serialize per (court, date).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PartitionKey {
    pub court: CourtId,
    pub date: NaiveDate,
}

#[derive(Debug, Clone)]
pub struct PartitionState {
    pub court: CourtId,
    pub date: NaiveDate,
    /// All reservations for this (court, date), sorted by `range.start`.
    pub reservations: Vec<Reservation>,
}

impl PartitionState {
    pub fn new(key: PartitionKey) -> Self {
        Self {
            court: key.court,
            date: key.date,
            reservations: Vec::new(),
        }
    }

    /// Insert maintaining sort order by range.start.
    pub fn insert_sorted(&mut self, reservation: Reservation) {
        let pos = self
            .reservations
            .binary_search_by_key(&reservation.range.start, |r| r.range.start)
            .unwrap_or_else(|e| e);
        self.reservations.insert(pos, reservation);
    }

    pub fn position(&self, id: Ulid) -> Option<usize> {
        self.reservations.iter().position(|r| r.id == id)
    }

    pub fn remove(&mut self, id: Ulid) -> Option<Reservation> {
        self.position(id).map(|pos| self.reservations.remove(pos))
    }

    pub fn confirmed(&self) -> impl Iterator<Item = &Reservation> {
        self.reservations.iter().filter(|r| r.is_confirmed())
    }
}

// ── WAL record format ────────────────────────────────────────────

/// The event types — flat, no nesting.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Event {
    ReservationConfirmed {
        id: Ulid,
        court: CourtId,
        house: HouseId,
        date: NaiveDate,
        range: TimeRange,
        booker_name: String,
        booker_email: Option<String>,
        booker_phone: Option<String>,
        cancel_token: CancelToken,
        created_at_ms: i64,
    },
    ReservationCancelled {
        id: Ulid,
    },
    /// Administrative hard removal — distinct from cancellation.
    ReservationDeleted {
        id: Ulid,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn range_basics() {
        let r = TimeRange::new(300, 360);
        assert_eq!(r.duration_min(), 60);
    }

    #[test]
    fn range_overlap_half_open() {
        let a = TimeRange::new(300, 360);
        let b = TimeRange::new(330, 390);
        let c = TimeRange::new(360, 420);
        assert!(a.overlaps(&b));
        assert!(!a.overlaps(&c)); // adjacent, not overlapping
    }

    #[test]
    fn hhmm_round_trip() {
        assert_eq!(format_hhmm(300), "05:00");
        assert_eq!(format_hhmm(1230), "20:30");
        assert_eq!(parse_hhmm("05:00"), Some(300));
        assert_eq!(parse_hhmm("20:30"), Some(1230));
        assert_eq!(parse_hhmm("5 o'clock"), None);
        assert_eq!(parse_hhmm("25:00"), None);
    }

    #[test]
    fn insert_sorted_keeps_order() {
        let key = PartitionKey {
            court: CourtId("padel".into()),
            date: NaiveDate::from_ymd_opt(2026, 8, 10).unwrap(),
        };
        let mut part = PartitionState::new(key);
        for start in [600u16, 300, 450] {
            part.insert_sorted(test_reservation(start));
        }
        let starts: Vec<Minute> = part.reservations.iter().map(|r| r.range.start).collect();
        assert_eq!(starts, vec![300, 450, 600]);
    }

    #[test]
    fn remove_by_id() {
        let key = PartitionKey {
            court: CourtId("padel".into()),
            date: NaiveDate::from_ymd_opt(2026, 8, 10).unwrap(),
        };
        let mut part = PartitionState::new(key);
        let r = test_reservation(300);
        let id = r.id;
        part.insert_sorted(r);
        assert!(part.remove(id).is_some());
        assert!(part.remove(id).is_none());
        assert!(part.reservations.is_empty());
    }

    #[test]
    fn event_serialization_round_trip() {
        let event = Event::ReservationConfirmed {
            id: Ulid::new(),
            court: CourtId("padel".into()),
            house: HouseId("casa-coco".into()),
            date: NaiveDate::from_ymd_opt(2026, 8, 10).unwrap(),
            range: TimeRange::new(300, 360),
            booker_name: "John Doe".into(),
            booker_email: Some("john@example.com".into()),
            booker_phone: None,
            cancel_token: CancelToken::mint(),
            created_at_ms: 1_700_000_000_000,
        };
        let bytes = bincode::serialize(&event).unwrap();
        let decoded: Event = bincode::deserialize(&bytes).unwrap();
        assert_eq!(event, decoded);
    }

    fn test_reservation(start: Minute) -> Reservation {
        Reservation {
            id: Ulid::new(),
            court: CourtId("padel".into()),
            house: HouseId("casa-coco".into()),
            date: NaiveDate::from_ymd_opt(2026, 8, 10).unwrap(),
            range: TimeRange::new(start, start + 60),
            status: ReservationStatus::Confirmed,
            booker_name: "Test".into(),
            booker_email: None,
            booker_phone: None,
            cancel_token: CancelToken::mint(),
            created_at_ms: 0,
        }
    }
}
