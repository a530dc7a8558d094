//! SQLite backend for rollcall.
//!
//! Wraps [`tokio_rusqlite`] so all database access runs on a dedicated thread
//! without blocking the async runtime. One [`SqliteStore`] implements both
//! the attendance store and the identity provider.

mod encode;
mod schema;
mod store;
mod subscribe;

pub mod error;

pub use error::{Error, Result};
pub use store::SqliteStore;
pub use subscribe::RecordSubscription;
