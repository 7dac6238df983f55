pub mod api;
pub mod auth;
pub mod clock;
pub mod directory;
pub mod engine;
pub mod limits;
pub mod model;
pub mod notify;
pub mod observability;
pub mod slots;
pub mod sweeper;
pub mod token;
pub mod wal;
