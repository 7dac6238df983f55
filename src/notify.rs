use chrono::NaiveDate;
use tokio::sync::broadcast;
use ulid::Ulid;

const CHANNEL_CAPACITY: usize = 256;

/// Everything the external mailer needs to send a confirmation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfirmationNotice {
    pub booking_id: Ulid,
    pub email: Option<String>,
    pub booker_name: String,
    pub booking_date: NaiveDate,
    /// `HH:MM` venue-local.
    pub start_time: String,
    pub court_name: String,
    pub house_name: String,
    pub cancellation_token: String,
}

/// Fire-and-forget hand-off hub for confirmed admissions. Delivery problems
/// never reach the admission path: send is a no-op without subscribers, and a
/// lagging subscriber only loses its own backlog.
pub struct NotifyHub {
    tx: broadcast::Sender<ConfirmationNotice>,
}

impl Default for NotifyHub {
    fn default() -> Self {
        Self::new()
    }
}

impl NotifyHub {
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(CHANNEL_CAPACITY);
        Self { tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ConfirmationNotice> {
        self.tx.subscribe()
    }

    /// Send a notice. No-op if nobody is listening.
    pub fn send(&self, notice: ConfirmationNotice) {
        let _ = self.tx.send(notice);
    }
}
