//! Error type for `rollcall-store-sqlite`.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
  #[error("database error: {0}")]
  Database(#[from] tokio_rusqlite::Error),

  #[error("uuid parse error: {0}")]
  Uuid(#[from] uuid::Error),

  #[error("date/time parse error: {0}")]
  DateParse(String),

  #[error("unknown {kind} value: {value:?}")]
  UnknownVariant { kind: &'static str, value: String },

  /// A uniqueness constraint rejected the write.
  #[error("conflict: {0}")]
  Conflict(String),
}

impl rollcall_core::BackendError for Error {
  fn is_conflict(&self) -> bool { matches!(self, Error::Conflict(_)) }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
