//! `SessionPresentSet`: the in-memory list of students marked during one
//! scan session.
//!
//! The set short-circuits repeat scans without a store round-trip and backs
//! the running "today's attendance" list. It is never authoritative: the
//! store is, and the set is discarded when the session ends.
//!
//! A set belongs to one calendar day. Entries from an earlier day never
//! count as marks for a later one.

use std::{
  collections::HashSet,
  sync::{Arc, Mutex, PoisonError},
};

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

/// One student marked present in the current session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PresentEntry {
  pub student_id:   String,
  pub display_name: String,
  /// Local capture instant, not the store's `created_at`.
  pub captured_at:  DateTime<Utc>,
}

#[derive(Debug, Default)]
struct Inner {
  /// Day the entries were marked on; `None` until the first mark.
  day:     Option<NaiveDate>,
  entries: Vec<PresentEntry>,
}

/// Insertion-ordered set of [`PresentEntry`], keyed by student id.
///
/// Cloning is cheap and clones share the same underlying set.
#[derive(Debug, Clone, Default)]
pub struct SessionPresentSet {
  inner: Arc<Mutex<Inner>>,
}

impl SessionPresentSet {
  pub fn new() -> Self { Self::default() }

  fn lock(&self) -> std::sync::MutexGuard<'_, Inner> {
    self.inner.lock().unwrap_or_else(PoisonError::into_inner)
  }

  /// The day the current entries belong to.
  pub fn day(&self) -> Option<NaiveDate> { self.lock().day }

  /// Make `day` the set's day, dropping entries from any other day.
  /// Returns `true` if stale entries were dropped.
  pub fn begin_day(&self, day: NaiveDate) -> bool {
    let mut inner = self.lock();
    if inner.day == Some(day) {
      return false;
    }
    inner.day = Some(day);
    let stale = !inner.entries.is_empty();
    inner.entries.clear();
    stale
  }

  /// Student ids marked on `day`; empty if the set belongs to another day.
  pub fn student_ids_on(&self, day: NaiveDate) -> HashSet<String> {
    let inner = self.lock();
    if inner.day != Some(day) {
      return HashSet::new();
    }
    inner.entries.iter().map(|e| e.student_id.clone()).collect()
  }

  pub fn contains(&self, student_id: &str) -> bool {
    self.lock().entries.iter().any(|e| e.student_id == student_id)
  }

  /// Add an entry. Returns `false` (and keeps the original) if the student
  /// is already present.
  pub fn insert(&self, entry: PresentEntry) -> bool {
    let mut inner = self.lock();
    if inner.entries.iter().any(|e| e.student_id == entry.student_id) {
      return false;
    }
    inner.entries.push(entry);
    true
  }

  /// Snapshot of the entries in capture order.
  pub fn entries(&self) -> Vec<PresentEntry> { self.lock().entries.clone() }

  pub fn len(&self) -> usize { self.lock().entries.len() }

  pub fn is_empty(&self) -> bool { self.lock().entries.is_empty() }

  pub fn clear(&self) { self.lock().entries.clear(); }
}
