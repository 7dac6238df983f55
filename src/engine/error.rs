use chrono::NaiveDate;
use ulid::Ulid;

use crate::model::{CourtId, HouseId, Minute};

#[derive(Debug)]
pub enum EngineError {
    /// Requested date is before today or past the advance window.
    OutOfWindow { date: NaiveDate },
    /// The house already holds the maximum future confirmed reservations on
    /// this court.
    HouseCapExceeded { house: HouseId, court: CourtId },
    /// The slot overlaps an existing confirmed reservation.
    SlotTaken(Ulid),
    /// No reservation carries this cancellation token.
    InvalidToken,
    NotFound(Ulid),
    UnknownCourt(CourtId),
    UnknownHouse(HouseId),
    /// Start time is not one of the grid marks.
    OffGrid(Minute),
    InvalidInput(&'static str),
    LimitExceeded(&'static str),
    /// The ledger's transaction could not be made durable — retryable, and
    /// never leaves partial state.
    Storage(String),
}

impl std::fmt::Display for EngineError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EngineError::OutOfWindow { date } => {
                write!(f, "booking date {date} is outside the allowed window")
            }
            EngineError::HouseCapExceeded { house, court } => {
                write!(f, "house {house} already holds the maximum upcoming reservations on court {court}")
            }
            EngineError::SlotTaken(id) => write!(f, "slot conflicts with reservation {id}"),
            EngineError::InvalidToken => write!(f, "invalid cancellation token"),
            EngineError::NotFound(id) => write!(f, "reservation not found: {id}"),
            EngineError::UnknownCourt(id) => write!(f, "unknown court: {id}"),
            EngineError::UnknownHouse(id) => write!(f, "unknown house: {id}"),
            EngineError::OffGrid(start) => {
                write!(f, "start time {} is not a bookable slot", crate::model::format_hhmm(*start))
            }
            EngineError::InvalidInput(msg) => write!(f, "invalid input: {msg}"),
            EngineError::LimitExceeded(msg) => write!(f, "limit exceeded: {msg}"),
            EngineError::Storage(e) => write!(f, "storage unavailable: {e}"),
        }
    }
}

impl std::error::Error for EngineError {}
