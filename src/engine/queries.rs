use chrono::NaiveDate;

use crate::limits::MAX_LOOKUP_RESULTS;
use crate::model::*;

use super::overlap::{self, SlotCell};
use super::{Engine, SharedPartition};

impl Engine {
    /// Availability board for one (court, date): every grid slot, blocked or
    /// not, with house attribution. Reads may trail in-flight admissions —
    /// the authoritative check happens inside `admit`.
    pub async fn slot_board(&self, court: &CourtId, date: NaiveDate) -> Vec<SlotCell> {
        let key = PartitionKey {
            court: court.clone(),
            date,
        };
        match self.partitions.get(&key).map(|e| e.value().clone()) {
            Some(part) => {
                let guard = part.read().await;
                overlap::slot_board(&guard.reservations)
            }
            None => overlap::slot_board(&[]),
        }
    }

    /// All reservations (confirmed and cancelled) whose booker email matches,
    /// newest booking date first. Only rows for that exact booker are
    /// returned.
    pub async fn lookup_by_email(&self, email: &str) -> Vec<Reservation> {
        let mut rows = Vec::new();
        let parts: Vec<SharedPartition> = self
            .partitions
            .iter()
            .map(|e| e.value().clone())
            .collect();
        for part in parts {
            let guard = part.read().await;
            rows.extend(
                guard
                    .reservations
                    .iter()
                    .filter(|r| {
                        r.booker_email
                            .as_deref()
                            .is_some_and(|e| e.eq_ignore_ascii_case(email))
                    })
                    .cloned(),
            );
        }
        sort_newest_first(&mut rows);
        rows.truncate(MAX_LOOKUP_RESULTS);
        rows
    }

    /// Privileged listing of every reservation, newest booking date first.
    pub async fn list_all(&self) -> Vec<Reservation> {
        let mut rows = Vec::new();
        let parts: Vec<SharedPartition> = self
            .partitions
            .iter()
            .map(|e| e.value().clone())
            .collect();
        for part in parts {
            let guard = part.read().await;
            rows.extend(guard.reservations.iter().cloned());
        }
        sort_newest_first(&mut rows);
        rows
    }
}

fn sort_newest_first(rows: &mut [Reservation]) {
    rows.sort_by(|a, b| {
        b.date
            .cmp(&a.date)
            .then(a.range.start.cmp(&b.range.start))
            .then(a.court.0.cmp(&b.court.0))
    });
}
