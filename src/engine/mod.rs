mod admission;
mod error;
mod overlap;
mod queries;
mod rules;

pub use admission::{CancelOutcome, Candidate};
pub use error::EngineError;
pub use overlap::SlotCell;
pub use rules::{ADVANCE_WINDOW_DAYS, HOUSE_COURT_CAP};

use std::io;
use std::path::PathBuf;
use std::sync::Arc;

use chrono::NaiveDate;
use dashmap::DashMap;
use tokio::sync::{Mutex, RwLock, mpsc, oneshot};
use ulid::Ulid;

use crate::clock::VenueClock;
use crate::directory::Directory;
use crate::model::*;
use crate::notify::NotifyHub;
use crate::wal::Wal;

use rules::HouseLedger;

pub type SharedPartition = Arc<RwLock<PartitionState>>;

// ── Group-commit WAL channel ─────────────────────────────

pub(super) enum WalCommand {
    Append {
        event: Event,
        response: oneshot::Sender<io::Result<()>>,
    },
    Compact {
        events: Vec<Event>,
        response: oneshot::Sender<io::Result<()>>,
    },
    AppendsSinceCompact {
        response: oneshot::Sender<u64>,
    },
}

/// Background task that owns the WAL and batches appends for group commit.
/// 1. Block until the first Append arrives.
/// 2. Buffer it (no fsync).
/// 3. Drain all immediately available Appends (the batch window).
/// 4. Single flush_sync for the whole batch.
/// 5. Respond Ok to all senders.
async fn wal_writer_loop(mut wal: Wal, mut rx: mpsc::Receiver<WalCommand>) {
    while let Some(cmd) = rx.recv().await {
        match cmd {
            WalCommand::Append { event, response } => {
                let mut batch = vec![(event, response)];

                // Drain all immediately available appends
                loop {
                    match rx.try_recv() {
                        Ok(WalCommand::Append { event, response }) => {
                            batch.push((event, response));
                        }
                        Ok(other) => {
                            // Flush current batch first, then handle the non-append command
                            flush_and_respond(&mut wal, &mut batch);
                            handle_non_append(&mut wal, other);
                            break;
                        }
                        Err(_) => break, // channel empty — flush batch
                    }
                }

                if !batch.is_empty() {
                    flush_and_respond(&mut wal, &mut batch);
                }
            }
            other => handle_non_append(&mut wal, other),
        }
    }
}

fn flush_and_respond(wal: &mut Wal, batch: &mut Vec<(Event, oneshot::Sender<io::Result<()>>)>) {
    metrics::histogram!(crate::observability::WAL_FLUSH_BATCH_SIZE).record(batch.len() as f64);
    let flush_start = std::time::Instant::now();
    let result = flush_batch(wal, batch);
    metrics::histogram!(crate::observability::WAL_FLUSH_DURATION_SECONDS)
        .record(flush_start.elapsed().as_secs_f64());
    respond_batch(batch, &result);
}

fn flush_batch(
    wal: &mut Wal,
    batch: &mut [(Event, oneshot::Sender<io::Result<()>>)],
) -> io::Result<()> {
    let mut append_err: Option<io::Error> = None;
    for (event, _) in batch.iter() {
        if let Err(e) = wal.append_buffered(event) {
            append_err = Some(e);
            break;
        }
    }
    // Always flush — even on append error — so partially buffered bytes
    // don't leak into the next batch (callers were told this batch failed).
    let flush_err = wal.flush_sync().err();
    if let Some(e) = append_err {
        return Err(e);
    }
    if let Some(e) = flush_err {
        return Err(e);
    }
    Ok(())
}

fn respond_batch(batch: &mut Vec<(Event, oneshot::Sender<io::Result<()>>)>, result: &io::Result<()>) {
    for (_, tx) in batch.drain(..) {
        let r = match result {
            Ok(()) => Ok(()),
            Err(e) => Err(io::Error::new(e.kind(), e.to_string())),
        };
        let _ = tx.send(r);
    }
}

fn handle_non_append(wal: &mut Wal, cmd: WalCommand) {
    match cmd {
        WalCommand::Compact { events, response } => {
            let result = Wal::write_compact_file(wal.path(), &events)
                .and_then(|()| wal.swap_compact_file());
            let _ = response.send(result);
        }
        WalCommand::AppendsSinceCompact { response } => {
            let _ = response.send(wal.appends_since_compact());
        }
        WalCommand::Append { .. } => unreachable!(),
    }
}

// ── Engine ───────────────────────────────────────────────

/// Where a reservation row lives, for token and id lookups.
#[derive(Debug, Clone)]
pub(super) struct Locator {
    pub key: PartitionKey,
    pub house: HouseId,
}

/// The reservation ledger. Single source of truth: rows come into existence
/// only through `admit`, change status only through `cancel_by_token`, and
/// leave only through `delete_reservation`.
///
/// Lock order is fixed at two levels: the (house, court) ledger mutex first,
/// then one (court, date) partition write lock. Admissions on different
/// partitions never contend.
pub struct Engine {
    pub(super) partitions: DashMap<PartitionKey, SharedPartition>,
    /// cancellation token → reservation id
    pub(super) tokens: DashMap<String, Ulid>,
    /// reservation id → row location
    pub(super) locator: DashMap<Ulid, Locator>,
    /// (house, court) → cap bookkeeping
    pub(super) ledgers: DashMap<(HouseId, CourtId), Arc<Mutex<HouseLedger>>>,
    pub(super) wal_tx: mpsc::Sender<WalCommand>,
    pub notify: Arc<NotifyHub>,
    pub(super) directory: Arc<Directory>,
    pub(super) clock: VenueClock,
}

impl Engine {
    pub fn new(
        wal_path: PathBuf,
        notify: Arc<NotifyHub>,
        directory: Arc<Directory>,
        clock: VenueClock,
    ) -> io::Result<Self> {
        let events = Wal::replay(&wal_path)?;
        let wal = Wal::open(&wal_path)?;
        let (wal_tx, wal_rx) = mpsc::channel(4096);
        tokio::spawn(wal_writer_loop(wal, wal_rx));

        let engine = Self {
            partitions: DashMap::new(),
            tokens: DashMap::new(),
            locator: DashMap::new(),
            ledgers: DashMap::new(),
            wal_tx,
            notify,
            directory,
            clock,
        };

        // Replay — we're the sole owner of every Arc here, so try_write and
        // try_lock always succeed instantly. Never block in this path: it may
        // run inside an async context.
        for event in events {
            match event {
                Event::ReservationConfirmed {
                    id,
                    court,
                    house,
                    date,
                    range,
                    booker_name,
                    booker_email,
                    booker_phone,
                    cancel_token,
                    created_at_ms,
                } => {
                    engine.replay_confirmed(Reservation {
                        id,
                        court,
                        house,
                        date,
                        range,
                        status: ReservationStatus::Confirmed,
                        booker_name,
                        booker_email,
                        booker_phone,
                        cancel_token,
                        created_at_ms,
                    });
                }
                Event::ReservationCancelled { id } => {
                    if let Some(loc) = engine.locator.get(&id).map(|e| e.value().clone())
                        && let Some(entry) = engine.partitions.get(&loc.key)
                    {
                        let part = entry.value().clone();
                        let mut guard = part.try_write().expect("replay: uncontended write");
                        if let Some(pos) = guard.position(id) {
                            guard.reservations[pos].status = ReservationStatus::Cancelled;
                        }
                        let ledger = engine.ledger_entry(&loc.house, &loc.key.court);
                        ledger
                            .try_lock()
                            .expect("replay: uncontended lock")
                            .remove(id);
                    }
                }
                Event::ReservationDeleted { id } => {
                    engine.replay_deleted(id);
                }
            }
        }
        metrics::gauge!(crate::observability::PARTITIONS_ACTIVE)
            .set(engine.partitions.len() as f64);

        Ok(engine)
    }

    fn replay_confirmed(&self, reservation: Reservation) {
        let key = PartitionKey {
            court: reservation.court.clone(),
            date: reservation.date,
        };
        let part = self.partition_entry(&key);
        let mut guard = part.try_write().expect("replay: uncontended write");
        self.tokens
            .insert(reservation.cancel_token.as_str().to_owned(), reservation.id);
        self.locator.insert(
            reservation.id,
            Locator {
                key,
                house: reservation.house.clone(),
            },
        );
        let ledger = self.ledger_entry(&reservation.house, &reservation.court);
        ledger
            .try_lock()
            .expect("replay: uncontended lock")
            .insert(reservation.id, reservation.date);
        guard.insert_sorted(reservation);
    }

    fn replay_deleted(&self, id: Ulid) {
        let Some((_, loc)) = self.locator.remove(&id) else {
            return;
        };
        if let Some(entry) = self.partitions.get(&loc.key) {
            let part = entry.value().clone();
            let mut guard = part.try_write().expect("replay: uncontended write");
            if let Some(removed) = guard.remove(id) {
                self.tokens.remove(removed.cancel_token.as_str());
            }
        }
        let ledger = self.ledger_entry(&loc.house, &loc.key.court);
        ledger
            .try_lock()
            .expect("replay: uncontended lock")
            .remove(id);
    }

    /// Write event to WAL via the background group-commit writer.
    pub(super) async fn wal_append(&self, event: &Event) -> Result<(), EngineError> {
        let (tx, rx) = oneshot::channel();
        self.wal_tx
            .send(WalCommand::Append {
                event: event.clone(),
                response: tx,
            })
            .await
            .map_err(|_| EngineError::Storage("WAL writer shut down".into()))?;
        rx.await
            .map_err(|_| EngineError::Storage("WAL writer dropped response".into()))?
            .map_err(|e| EngineError::Storage(e.to_string()))
    }

    pub(super) fn partition_entry(&self, key: &PartitionKey) -> SharedPartition {
        let part = self
            .partitions
            .entry(key.clone())
            .or_insert_with(|| Arc::new(RwLock::new(PartitionState::new(key.clone()))))
            .value()
            .clone();
        metrics::gauge!(crate::observability::PARTITIONS_ACTIVE)
            .set(self.partitions.len() as f64);
        part
    }

    pub(super) fn ledger_entry(&self, house: &HouseId, court: &CourtId) -> Arc<Mutex<HouseLedger>> {
        self.ledgers
            .entry((house.clone(), court.clone()))
            .or_default()
            .value()
            .clone()
    }

    /// The venue-local calendar date used for all window comparisons.
    pub fn today(&self) -> NaiveDate {
        self.clock.today()
    }
}
