use chrono::{Days, NaiveDate};
use tokio::sync::oneshot;
use ulid::Ulid;

use crate::clock;
use crate::directory::Snapshot;
use crate::limits::*;
use crate::model::*;
use crate::notify::ConfirmationNotice;
use crate::observability;
use crate::slots;
use crate::token::CancelToken;

use super::rules;
use super::overlap;
use super::{Engine, EngineError, Locator, WalCommand};

/// A reservation request as assembled by the caller. `end` is never supplied;
/// the occupied interval is derived from the grid's fixed duration.
#[derive(Debug, Clone)]
pub struct Candidate {
    pub house: HouseId,
    pub court: CourtId,
    pub date: NaiveDate,
    pub start: Minute,
    pub booker_name: String,
    pub booker_email: Option<String>,
    pub booker_phone: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CancelOutcome {
    Cancelled,
    /// The token was valid but the reservation was already cancelled.
    /// Repeated cancellation clicks must not error.
    AlreadyCancelled,
}

fn validate(candidate: &Candidate, snapshot: &Snapshot) -> Result<(), EngineError> {
    if candidate.booker_name.trim().is_empty() {
        return Err(EngineError::InvalidInput("booker_name is required"));
    }
    if candidate.booker_name.len() > MAX_NAME_LEN {
        return Err(EngineError::LimitExceeded("booker name too long"));
    }
    if let Some(email) = &candidate.booker_email
        && email.len() > MAX_EMAIL_LEN
    {
        return Err(EngineError::LimitExceeded("booker email too long"));
    }
    if let Some(phone) = &candidate.booker_phone
        && phone.len() > MAX_PHONE_LEN
    {
        return Err(EngineError::LimitExceeded("booker phone too long"));
    }
    if !slots::is_grid_start(candidate.start) {
        return Err(EngineError::OffGrid(candidate.start));
    }
    if snapshot.active_court(&candidate.court).is_none() {
        return Err(EngineError::UnknownCourt(candidate.court.clone()));
    }
    if snapshot.active_house(&candidate.house).is_none() {
        return Err(EngineError::UnknownHouse(candidate.house.clone()));
    }
    Ok(())
}

impl Engine {
    /// Atomic admission. Window, house cap, and overlap are all evaluated
    /// against live data while the (house, court) ledger mutex and the
    /// (court, date) partition write lock are held; the row is inserted only
    /// after its WAL record is durable. Concurrent requests for overlapping
    /// slots resolve to exactly one winner.
    pub async fn admit(&self, candidate: Candidate) -> Result<Reservation, EngineError> {
        let started = std::time::Instant::now();
        let result = self.admit_inner(candidate).await;
        metrics::counter!(
            observability::ADMISSIONS_TOTAL,
            "outcome" => observability::outcome_label(&result)
        )
        .increment(1);
        metrics::histogram!(observability::ADMISSION_DURATION_SECONDS)
            .record(started.elapsed().as_secs_f64());
        result
    }

    async fn admit_inner(&self, candidate: Candidate) -> Result<Reservation, EngineError> {
        let snapshot = self
            .directory
            .snapshot()
            .map_err(|e| EngineError::Storage(e.to_string()))?;
        validate(&candidate, &snapshot)?;

        let range = slots::slot_range(candidate.start);

        // Lock order: ledger mutex, then partition write lock. Window, cap,
        // and overlap are all judged inside the serialized section, with one
        // canonical civil-date read shared by the first two.
        let ledger = self.ledger_entry(&candidate.house, &candidate.court);
        let mut ledger_guard = ledger.lock().await;
        let today = self.clock.today();
        rules::check_window(candidate.date, today)?;
        rules::check_house_cap(
            ledger_guard.future_count(today),
            &candidate.house,
            &candidate.court,
        )?;

        let key = PartitionKey {
            court: candidate.court.clone(),
            date: candidate.date,
        };
        let part = self.partition_entry(&key);
        let mut part_guard = part.write().await;
        if let Some(hit) = overlap::find_conflict(&part_guard.reservations, &range) {
            return Err(EngineError::SlotTaken(hit.id));
        }

        let id = Ulid::new();
        let token = CancelToken::mint();
        let created_at_ms = clock::unix_ms();
        let event = Event::ReservationConfirmed {
            id,
            court: candidate.court.clone(),
            house: candidate.house.clone(),
            date: candidate.date,
            range,
            booker_name: candidate.booker_name.clone(),
            booker_email: candidate.booker_email.clone(),
            booker_phone: candidate.booker_phone.clone(),
            cancel_token: token.clone(),
            created_at_ms,
        };
        self.wal_append(&event).await?;

        let reservation = Reservation {
            id,
            court: candidate.court,
            house: candidate.house,
            date: candidate.date,
            range,
            status: ReservationStatus::Confirmed,
            booker_name: candidate.booker_name,
            booker_email: candidate.booker_email,
            booker_phone: candidate.booker_phone,
            cancel_token: token.clone(),
            created_at_ms,
        };
        part_guard.insert_sorted(reservation.clone());
        ledger_guard.insert(id, reservation.date);
        self.tokens.insert(token.as_str().to_owned(), id);
        self.locator.insert(
            id,
            Locator {
                key,
                house: reservation.house.clone(),
            },
        );

        // Fire-and-forget hand-off to the mailer boundary.
        self.notify.send(ConfirmationNotice {
            booking_id: id,
            email: reservation.booker_email.clone(),
            booker_name: reservation.booker_name.clone(),
            booking_date: reservation.date,
            start_time: format_hhmm(range.start),
            court_name: snapshot.court_name(&reservation.court),
            house_name: snapshot.house_name(&reservation.house),
            cancellation_token: token.as_str().to_owned(),
        });

        Ok(reservation)
    }

    /// Advisory rule validation (window first, then cap) for fast feedback
    /// ahead of `admit`. Never sufficient on its own — `admit` re-evaluates
    /// everything under the locks.
    pub async fn preflight(
        &self,
        house: &HouseId,
        court: &CourtId,
        date: NaiveDate,
    ) -> Result<(), EngineError> {
        let snapshot = self
            .directory
            .snapshot()
            .map_err(|e| EngineError::Storage(e.to_string()))?;
        if snapshot.active_court(court).is_none() {
            return Err(EngineError::UnknownCourt(court.clone()));
        }
        if snapshot.active_house(house).is_none() {
            return Err(EngineError::UnknownHouse(house.clone()));
        }
        let today = self.clock.today();
        rules::check_window(date, today)?;
        let ledger = self.ledger_entry(house, court);
        let future = ledger.lock().await.future_count(today);
        rules::check_house_cap(future, house, court)
    }

    /// One-time, idempotent transition to cancelled. The status flip is the
    /// only field change; the token keeps resolving afterwards so repeated
    /// clicks report `AlreadyCancelled` instead of erroring.
    pub async fn cancel_by_token(&self, token: &str) -> Result<CancelOutcome, EngineError> {
        let result = self.cancel_inner(token).await;
        let outcome = match &result {
            Ok(CancelOutcome::Cancelled) => "cancelled",
            Ok(CancelOutcome::AlreadyCancelled) => "already_cancelled",
            Err(EngineError::Storage(_)) => "storage",
            Err(_) => "invalid_token",
        };
        metrics::counter!(observability::CANCELLATIONS_TOTAL, "outcome" => outcome).increment(1);
        result
    }

    async fn cancel_inner(&self, token: &str) -> Result<CancelOutcome, EngineError> {
        let id = self
            .tokens
            .get(token)
            .map(|e| *e.value())
            .ok_or(EngineError::InvalidToken)?;
        let loc = self
            .locator
            .get(&id)
            .map(|e| e.value().clone())
            .ok_or(EngineError::InvalidToken)?;

        let ledger = self.ledger_entry(&loc.house, &loc.key.court);
        let mut ledger_guard = ledger.lock().await;
        let part = self
            .partitions
            .get(&loc.key)
            .map(|e| e.value().clone())
            .ok_or(EngineError::InvalidToken)?;
        let mut part_guard = part.write().await;

        let pos = part_guard.position(id).ok_or(EngineError::InvalidToken)?;
        if !part_guard.reservations[pos].is_confirmed() {
            return Ok(CancelOutcome::AlreadyCancelled);
        }

        self.wal_append(&Event::ReservationCancelled { id }).await?;
        part_guard.reservations[pos].status = ReservationStatus::Cancelled;
        ledger_guard.remove(id);
        Ok(CancelOutcome::Cancelled)
    }

    /// Administrative hard removal. Bypasses no invariants — it only removes
    /// a row and its index entries.
    pub async fn delete_reservation(&self, id: Ulid) -> Result<(), EngineError> {
        let loc = self
            .locator
            .get(&id)
            .map(|e| e.value().clone())
            .ok_or(EngineError::NotFound(id))?;

        let ledger = self.ledger_entry(&loc.house, &loc.key.court);
        let mut ledger_guard = ledger.lock().await;
        let part = self
            .partitions
            .get(&loc.key)
            .map(|e| e.value().clone())
            .ok_or(EngineError::NotFound(id))?;
        let mut part_guard = part.write().await;
        if part_guard.position(id).is_none() {
            return Err(EngineError::NotFound(id));
        }

        self.wal_append(&Event::ReservationDeleted { id }).await?;
        if let Some(removed) = part_guard.remove(id) {
            self.tokens.remove(removed.cancel_token.as_str());
        }
        self.locator.remove(&id);
        ledger_guard.remove(id);
        metrics::counter!(observability::ADMIN_DELETES_TOTAL).increment(1);
        Ok(())
    }

    // ── WAL maintenance ──────────────────────────────────────

    /// Compact the WAL by rewriting it with only the events needed to
    /// recreate the current state. Partitions past the retention horizon are
    /// dropped along with their index entries.
    pub async fn compact_wal(&self) -> Result<(), EngineError> {
        let today = self.clock.today();
        let cutoff = today
            .checked_sub_days(Days::new(RETENTION_DAYS))
            .unwrap_or(today);

        // Phase 1: drop expired partitions and their index entries.
        let keys: Vec<PartitionKey> = self.partitions.iter().map(|e| e.key().clone()).collect();
        for key in &keys {
            if key.date >= cutoff {
                continue;
            }
            let Some((_, part)) = self.partitions.remove(key) else {
                continue;
            };
            let guard = part.read().await;
            for r in &guard.reservations {
                self.tokens.remove(r.cancel_token.as_str());
                self.locator.remove(&r.id);
            }
        }
        let ledgers: Vec<_> = self.ledgers.iter().map(|e| e.value().clone()).collect();
        for ledger in ledgers {
            ledger.lock().await.prune_before(cutoff);
        }
        metrics::gauge!(observability::PARTITIONS_ACTIVE).set(self.partitions.len() as f64);

        // Phase 2: snapshot the surviving rows.
        let mut events = Vec::new();
        let keys: Vec<PartitionKey> = self.partitions.iter().map(|e| e.key().clone()).collect();
        for key in keys {
            let Some(part) = self.partitions.get(&key).map(|e| e.value().clone()) else {
                continue;
            };
            let guard = part.read().await;
            for r in &guard.reservations {
                events.push(Event::ReservationConfirmed {
                    id: r.id,
                    court: r.court.clone(),
                    house: r.house.clone(),
                    date: r.date,
                    range: r.range,
                    booker_name: r.booker_name.clone(),
                    booker_email: r.booker_email.clone(),
                    booker_phone: r.booker_phone.clone(),
                    cancel_token: r.cancel_token.clone(),
                    created_at_ms: r.created_at_ms,
                });
                if !r.is_confirmed() {
                    events.push(Event::ReservationCancelled { id: r.id });
                }
            }
        }

        let (tx, rx) = oneshot::channel();
        self.wal_tx
            .send(WalCommand::Compact {
                events,
                response: tx,
            })
            .await
            .map_err(|_| EngineError::Storage("WAL writer shut down".into()))?;
        rx.await
            .map_err(|_| EngineError::Storage("WAL writer dropped response".into()))?
            .map_err(|e| EngineError::Storage(e.to_string()))
    }

    pub async fn wal_appends_since_compact(&self) -> u64 {
        let (tx, rx) = oneshot::channel();
        if self
            .wal_tx
            .send(WalCommand::AppendsSinceCompact { response: tx })
            .await
            .is_err()
        {
            return 0;
        }
        rx.await.unwrap_or(0)
    }
}
