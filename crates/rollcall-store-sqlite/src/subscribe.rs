//! Live query subscriptions over attendance records.

use rollcall_core::{
  record::AttendanceRecord,
  store::{AttendanceStore as _, RecordQuery},
};
use tokio::sync::broadcast::{self, error::RecvError};

use crate::{Result, SqliteStore};

/// A live view of one [`RecordQuery`].
///
/// Every call to [`next`](Self::next) yields the complete current result
/// set, never a delta. Several writes landing between two calls are folded
/// into a single re-read.
pub struct RecordSubscription {
  store:  SqliteStore,
  query:  RecordQuery,
  rx:     broadcast::Receiver<()>,
  primed: bool,
}

impl RecordSubscription {
  pub(crate) fn new(
    store: SqliteStore,
    query: RecordQuery,
    rx: broadcast::Receiver<()>,
  ) -> Self {
    Self { store, query, rx, primed: false }
  }

  pub fn query(&self) -> &RecordQuery { &self.query }

  /// The current result set: immediately on the first call, then after the
  /// next write to the store. Returns `None` once the store is gone.
  pub async fn next(&mut self) -> Option<Result<Vec<AttendanceRecord>>> {
    if self.primed {
      match self.rx.recv().await {
        Ok(()) | Err(RecvError::Lagged(_)) => {}
        Err(RecvError::Closed) => return None,
      }
      // Fold any further queued notifications into this read.
      while self.rx.try_recv().is_ok() {}
    }
    self.primed = true;
    Some(self.store.query_records(&self.query).await)
  }
}
