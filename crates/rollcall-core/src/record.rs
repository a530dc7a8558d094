//! Attendance records.
//!
//! A record is written once per (student, subject, calendar day) and never
//! updated or deleted afterwards.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Whether the student attended.
#[derive(
  Debug,
  Clone,
  Copy,
  PartialEq,
  Eq,
  Hash,
  Serialize,
  Deserialize,
  strum::Display,
  strum::EnumString,
)]
pub enum AttendanceStatus {
  Present,
  Absent,
}

/// A persisted attendance entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AttendanceRecord {
  pub record_id:  Uuid,
  pub student_id: String,
  /// Subject name.
  pub subject:    String,
  pub status:     AttendanceStatus,
  /// Calendar day the attendance applies to; serialised as `YYYY-MM-DD`.
  pub date:       NaiveDate,
  /// Store-assigned; never changes after creation.
  pub created_at: DateTime<Utc>,
}

/// Input to [`crate::store::AttendanceStore::create_record`].
/// `record_id` and `created_at` are always assigned by the store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewRecord {
  pub student_id: String,
  pub subject:    String,
  pub status:     AttendanceStatus,
  pub date:       NaiveDate,
}

impl NewRecord {
  pub fn present(
    student_id: impl Into<String>,
    subject: impl Into<String>,
    date: NaiveDate,
  ) -> Self {
    Self {
      student_id: student_id.into(),
      subject: subject.into(),
      status: AttendanceStatus::Present,
      date,
    }
  }

  pub fn absent(
    student_id: impl Into<String>,
    subject: impl Into<String>,
    date: NaiveDate,
  ) -> Self {
    Self {
      student_id: student_id.into(),
      subject: subject.into(),
      status: AttendanceStatus::Absent,
      date,
    }
  }
}
