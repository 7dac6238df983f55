//! Hard input bounds. Requests exceeding these are rejected before any lock
//! is taken.

pub const MAX_NAME_LEN: usize = 120;
pub const MAX_EMAIL_LEN: usize = 254;
pub const MAX_PHONE_LEN: usize = 32;

/// Maximum rows returned by the email lookup.
pub const MAX_LOOKUP_RESULTS: usize = 200;

/// Partitions older than this many days are dropped at WAL compaction.
pub const RETENTION_DAYS: u64 = 90;
