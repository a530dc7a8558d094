//! The `AttendanceStore` trait and supporting query types.
//!
//! The trait is implemented by storage backends (e.g.
//! `rollcall-store-sqlite`). The engine and the HTTP surface depend on this
//! abstraction, not on any concrete backend.

use std::future::Future;

use chrono::NaiveDate;

use crate::{
  BackendError,
  record::{AttendanceRecord, AttendanceStatus, NewRecord},
  subject::Subject,
};

// ─── Query type ──────────────────────────────────────────────────────────────

/// Parameters for [`AttendanceStore::query_records`]. Every set field is an
/// equality (or range) filter; unset fields match everything.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RecordQuery {
  pub subject:      Option<String>,
  pub student_id:   Option<String>,
  pub date:         Option<NaiveDate>,
  /// Inclusive lower bound on `date`.
  pub date_from:    Option<NaiveDate>,
  /// Inclusive upper bound on `date`.
  pub date_to:      Option<NaiveDate>,
  pub status:       Option<AttendanceStatus>,
  /// Order by date descending instead of ascending. Within one date records
  /// are always in creation order.
  pub newest_first: bool,
  pub limit:        Option<usize>,
}

impl RecordQuery {
  /// All records of one subject on one day.
  pub fn subject_day(subject: impl Into<String>, date: NaiveDate) -> Self {
    Self {
      subject: Some(subject.into()),
      date: Some(date),
      ..Default::default()
    }
  }

  /// A student's history across subjects, newest day first.
  pub fn student(student_id: impl Into<String>) -> Self {
    Self {
      student_id: Some(student_id.into()),
      newest_first: true,
      ..Default::default()
    }
  }

  /// Every record on one day.
  pub fn day(date: NaiveDate) -> Self {
    Self { date: Some(date), ..Default::default() }
  }

  /// Whether `record` satisfies every filter in this query.
  pub fn matches(&self, record: &AttendanceRecord) -> bool {
    self.subject.as_ref().is_none_or(|s| *s == record.subject)
      && self.student_id.as_ref().is_none_or(|s| *s == record.student_id)
      && self.date.is_none_or(|d| d == record.date)
      && self.date_from.is_none_or(|d| record.date >= d)
      && self.date_to.is_none_or(|d| record.date <= d)
      && self.status.is_none_or(|s| s == record.status)
  }
}

/// Result of a conditional create.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CreateOutcome {
  Created(AttendanceRecord),
  /// A record for the same (student, subject, date) already exists. Nothing
  /// was written.
  Conflict,
}

// ─── Trait ───────────────────────────────────────────────────────────────────

/// Abstraction over an attendance store backend.
///
/// Record writes are create-only. `create_record` must be conditional on the
/// (student, subject, date) tuple: a backend rejects the second writer with
/// [`CreateOutcome::Conflict`] rather than storing a duplicate.
pub trait AttendanceStore: Send + Sync {
  type Error: BackendError;

  // ── Subjects ──────────────────────────────────────────────────────────

  /// Persist a new subject. Fails if the name is taken.
  fn add_subject(
    &self,
    subject: Subject,
  ) -> impl Future<Output = Result<Subject, Self::Error>> + Send + '_;

  /// Retrieve a subject by name. Returns `None` if not found.
  fn get_subject<'a>(
    &'a self,
    name: &'a str,
  ) -> impl Future<Output = Result<Option<Subject>, Self::Error>> + Send + 'a;

  /// All subjects ordered by name.
  fn list_subjects(
    &self,
  ) -> impl Future<Output = Result<Vec<Subject>, Self::Error>> + Send + '_;

  // ── Records ───────────────────────────────────────────────────────────

  /// Single-record fetch by its unique tuple.
  fn find_record<'a>(
    &'a self,
    student_id: &'a str,
    subject: &'a str,
    date: NaiveDate,
  ) -> impl Future<Output = Result<Option<AttendanceRecord>, Self::Error>>
  + Send
  + 'a;

  /// Filtered, ordered record listing.
  fn query_records<'a>(
    &'a self,
    query: &'a RecordQuery,
  ) -> impl Future<Output = Result<Vec<AttendanceRecord>, Self::Error>> + Send + 'a;

  /// Create a record unless one already exists for its tuple.
  fn create_record(
    &self,
    input: NewRecord,
  ) -> impl Future<Output = Result<CreateOutcome, Self::Error>> + Send + '_;
}
