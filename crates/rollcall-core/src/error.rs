//! Error types for `rollcall-core`.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
  #[error("subject not found: {0}")]
  SubjectNotFound(String),

  #[error("store error: {0}")]
  Store(#[source] Box<dyn std::error::Error + Send + Sync>),

  #[error("identity provider error: {0}")]
  Identity(#[source] Box<dyn std::error::Error + Send + Sync>),

  /// Some absentee writes landed and some did not. Nothing is rolled back;
  /// running the sweep again fills in the remainder.
  #[error("absentee sweep incomplete: {written} written, {failed} failed ({first_failure})")]
  PartialSweep {
    written:       usize,
    failed:        usize,
    first_failure: String,
  },
}

impl Error {
  pub fn store(e: impl std::error::Error + Send + Sync + 'static) -> Self {
    Self::Store(Box::new(e))
  }

  pub fn identity(e: impl std::error::Error + Send + Sync + 'static) -> Self {
    Self::Identity(Box::new(e))
  }
}

/// Error type of a storage or identity backend.
///
/// Backends report uniqueness violations through [`is_conflict`] so callers
/// can tell "already exists" apart from an outage.
///
/// [`is_conflict`]: BackendError::is_conflict
pub trait BackendError: std::error::Error + Send + Sync + 'static {
  /// Whether the failed write collided with an existing row.
  fn is_conflict(&self) -> bool;
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
