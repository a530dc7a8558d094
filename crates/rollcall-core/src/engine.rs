//! The attendance reconciliation engine.
//!
//! [`Attendance`] turns a decoded student identifier into at most one durable
//! record per (student, subject, day), and reconciles a subject's roster by
//! writing `Absent` records for everyone still unaccounted for.

use std::{collections::BTreeMap, sync::Arc};

use chrono::{Local, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use tokio::task::JoinSet;
use tracing::{debug, info, warn};

use crate::{
  Error, Result,
  cache::TtlCache,
  identity::{IdentityProvider, RosterIdentity},
  record::{AttendanceRecord, AttendanceStatus, NewRecord},
  session::{PresentEntry, SessionPresentSet},
  store::{AttendanceStore, CreateOutcome, RecordQuery},
  subject::Subject,
};

// ─── Outcomes ────────────────────────────────────────────────────────────────

/// Result of [`Attendance::mark_present`]. Only `Recorded` wrote anything.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case", rename_all_fields = "camelCase")]
pub enum MarkOutcome {
  Recorded {
    record:       AttendanceRecord,
    display_name: String,
  },
  /// Already present in this session or already in the store for today.
  AlreadyMarked { student_id: String },
  /// The identifier does not resolve to a student.
  StudentNotFound { student_id: String },
  /// A store or identity round-trip failed. Not retried.
  WriteFailed { student_id: String, reason: String },
}

impl MarkOutcome {
  pub fn student_id(&self) -> &str {
    match self {
      Self::Recorded { record, .. } => &record.student_id,
      Self::AlreadyMarked { student_id }
      | Self::StudentNotFound { student_id }
      | Self::WriteFailed { student_id, .. } => student_id,
    }
  }

  pub fn is_recorded(&self) -> bool { matches!(self, Self::Recorded { .. }) }
}

/// Result of a fully successful [`Attendance::sweep_absentees`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SweepReport {
  pub subject:       String,
  pub date:          NaiveDate,
  pub roster_size:   usize,
  /// Students that received a new `Absent` record, in roster order.
  pub marked_absent: Vec<String>,
}

impl SweepReport {
  pub fn count(&self) -> usize { self.marked_absent.len() }
}

/// Per-subject counts for one day.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubjectSummary {
  pub subject: String,
  pub present: usize,
  pub absent:  usize,
}

// ─── Engine ──────────────────────────────────────────────────────────────────

type Clock = Arc<dyn Fn() -> NaiveDate + Send + Sync>;

/// Attendance reconciliation over a store `S` and identity provider `I`.
///
/// Cloning is cheap; clones share the backends and the identity cache.
pub struct Attendance<S, I> {
  store:      Arc<S>,
  identities: Arc<I>,
  today:      Clock,
  known:      Arc<TtlCache<String, RosterIdentity>>,
}

impl<S, I> Clone for Attendance<S, I> {
  fn clone(&self) -> Self {
    Self {
      store:      Arc::clone(&self.store),
      identities: Arc::clone(&self.identities),
      today:      Arc::clone(&self.today),
      known:      Arc::clone(&self.known),
    }
  }
}

impl<S, I> Attendance<S, I>
where
  S: AttendanceStore + 'static,
  I: IdentityProvider + 'static,
{
  /// An engine whose "today" is the local calendar date.
  pub fn new(store: Arc<S>, identities: Arc<I>) -> Self {
    Self {
      store,
      identities,
      today: Arc::new(|| Local::now().date_naive()),
      known: Arc::new(TtlCache::default()),
    }
  }

  /// Replace the source of "today".
  pub fn with_clock(
    mut self,
    today: impl Fn() -> NaiveDate + Send + Sync + 'static,
  ) -> Self {
    self.today = Arc::new(today);
    self
  }

  pub fn today(&self) -> NaiveDate { (self.today)() }

  pub fn store(&self) -> &Arc<S> { &self.store }

  pub fn identities(&self) -> &Arc<I> { &self.identities }

  /// Resolve an identity, memoising hits. Misses are never cached so a
  /// student added mid-session resolves on the next scan.
  async fn resolve(&self, student_id: &str) -> Result<Option<RosterIdentity>> {
    if let Some(known) = self.known.get(&student_id.to_owned()) {
      return Ok(Some(known));
    }
    let found = self
      .identities
      .resolve_identity(student_id)
      .await
      .map_err(Error::identity)?;
    if let Some(identity) = &found {
      self.known.insert(student_id.to_owned(), identity.clone());
    }
    Ok(found)
  }

  // ── Mark ────────────────────────────────────────────────────────────────

  /// Record `student_id` as present in `subject` today.
  ///
  /// Checks run in a fixed order: the session set (no round-trip), the store
  /// for an existing record, then the identity provider. Exactly one durable
  /// write happens on the `Recorded` path and none on any other.
  pub async fn mark_present(
    &self,
    session: &SessionPresentSet,
    student_id: &str,
    subject: &Subject,
  ) -> MarkOutcome {
    let student_id = student_id.trim();
    let today = self.today();
    if session.begin_day(today) {
      info!(subject = %subject.name, %today, "session set rolled over to a new day");
    }
    if session.contains(student_id) {
      debug!(student_id, subject = %subject.name, "already marked in session");
      return MarkOutcome::AlreadyMarked { student_id: student_id.to_owned() };
    }

    let write_failed = |reason: String| {
      warn!(student_id, subject = %subject.name, %reason, "mark failed");
      MarkOutcome::WriteFailed { student_id: student_id.to_owned(), reason }
    };

    match self.store.find_record(student_id, &subject.name, today).await {
      Ok(Some(existing)) => {
        debug!(
          student_id,
          subject = %subject.name,
          status = %existing.status,
          "already recorded today"
        );
        return MarkOutcome::AlreadyMarked { student_id: student_id.to_owned() };
      }
      Ok(None) => {}
      Err(e) => return write_failed(e.to_string()),
    }

    let identity = match self.resolve(student_id).await {
      Ok(Some(identity)) if identity.is_student() => identity,
      Ok(_) => {
        info!(student_id, subject = %subject.name, "unknown student identifier");
        return MarkOutcome::StudentNotFound { student_id: student_id.to_owned() };
      }
      Err(e) => return write_failed(e.to_string()),
    };

    let input = NewRecord::present(student_id, &subject.name, today);
    match self.store.create_record(input).await {
      Ok(CreateOutcome::Created(record)) => {
        session.insert(PresentEntry {
          student_id:   record.student_id.clone(),
          display_name: identity.display_name.clone(),
          captured_at:  Utc::now(),
        });
        info!(student_id, subject = %subject.name, %today, "marked present");
        MarkOutcome::Recorded { record, display_name: identity.display_name }
      }
      Ok(CreateOutcome::Conflict) => {
        debug!(student_id, subject = %subject.name, "lost create race");
        MarkOutcome::AlreadyMarked { student_id: student_id.to_owned() }
      }
      Err(e) => write_failed(e.to_string()),
    }
  }

  // ── Sweep ───────────────────────────────────────────────────────────────

  /// Write `Absent` records for every roster member of `subject` with no
  /// record today.
  ///
  /// The set of accounted-for students is re-read from the store on every
  /// call, so re-running after a partial failure only fills the gaps.
  pub async fn sweep_absentees(
    &self,
    session: Option<&SessionPresentSet>,
    subject: &Subject,
  ) -> Result<SweepReport> {
    let today = self.today();

    let roster = self
      .identities
      .roster(&subject.department, &subject.semester)
      .await
      .map_err(Error::identity)?;

    // Marks from a previous day in a long-lived session never count.
    let mut accounted = session.map(|s| s.student_ids_on(today)).unwrap_or_default();
    let recorded = self
      .store
      .query_records(&RecordQuery::subject_day(&subject.name, today))
      .await
      .map_err(Error::store)?;
    accounted.extend(recorded.into_iter().map(|r| r.student_id));

    let missing: Vec<String> = roster
      .iter()
      .filter(|identity| identity.on_roster_of(subject))
      .map(|identity| identity.user_id.clone())
      .filter(|id| !accounted.contains(id))
      .collect();

    debug!(
      subject = %subject.name,
      roster = roster.len(),
      missing = missing.len(),
      "sweeping absentees"
    );

    let mut writes = JoinSet::new();
    for (index, student_id) in missing.iter().enumerate() {
      let store = Arc::clone(&self.store);
      let input = NewRecord::absent(student_id, &subject.name, today);
      writes.spawn(async move { (index, store.create_record(input).await) });
    }

    let mut written = Vec::new();
    let mut failures = Vec::new();
    while let Some(joined) = writes.join_next().await {
      match joined {
        Ok((index, Ok(CreateOutcome::Created(_)))) => written.push(index),
        Ok((_, Ok(CreateOutcome::Conflict))) => {}
        Ok((index, Err(e))) => failures.push(format!("{}: {e}", missing[index])),
        Err(e) => failures.push(e.to_string()),
      }
    }

    if !failures.is_empty() {
      warn!(
        subject = %subject.name,
        written = written.len(),
        failed = failures.len(),
        "absentee sweep incomplete"
      );
      return Err(Error::PartialSweep {
        written:       written.len(),
        failed:        failures.len(),
        first_failure: failures.swap_remove(0),
      });
    }

    written.sort_unstable();
    let marked_absent: Vec<String> =
      written.into_iter().map(|i| missing[i].clone()).collect();

    info!(
      subject = %subject.name,
      %today,
      absent = marked_absent.len(),
      "absentee sweep complete"
    );

    Ok(SweepReport {
      subject: subject.name.clone(),
      date: today,
      roster_size: roster.len(),
      marked_absent,
    })
  }

  // ── Reads ───────────────────────────────────────────────────────────────

  /// All records of `subject` on `date`, in creation order.
  pub async fn records_for_day(
    &self,
    subject: &str,
    date: NaiveDate,
  ) -> Result<Vec<AttendanceRecord>> {
    self
      .store
      .query_records(&RecordQuery::subject_day(subject, date))
      .await
      .map_err(Error::store)
  }

  /// A student's records across all subjects, newest day first.
  pub async fn student_history(
    &self,
    student_id: &str,
  ) -> Result<Vec<AttendanceRecord>> {
    self
      .store
      .query_records(&RecordQuery::student(student_id))
      .await
      .map_err(Error::store)
  }

  /// Present/absent counts per subject on `date`, ordered by subject name.
  pub async fn day_summary(&self, date: NaiveDate) -> Result<Vec<SubjectSummary>> {
    let records = self
      .store
      .query_records(&RecordQuery::day(date))
      .await
      .map_err(Error::store)?;

    let mut by_subject: BTreeMap<String, SubjectSummary> = BTreeMap::new();
    for record in records {
      let summary = by_subject
        .entry(record.subject.clone())
        .or_insert_with(|| SubjectSummary {
          subject: record.subject.clone(),
          present: 0,
          absent:  0,
        });
      match record.status {
        AttendanceStatus::Present => summary.present += 1,
        AttendanceStatus::Absent => summary.absent += 1,
      }
    }
    Ok(by_subject.into_values().collect())
  }
}
