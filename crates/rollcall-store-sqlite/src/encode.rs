//! Encoding and decoding helpers between domain types and the plain-text
//! representations stored in SQLite columns.
//!
//! Timestamps are RFC 3339 with fixed-width nanoseconds so they sort
//! lexically. Dates are `YYYY-MM-DD`. Enums use their display form.

use chrono::{DateTime, NaiveDate, SecondsFormat, Utc};
use rollcall_core::{
  identity::{Role, RosterIdentity},
  record::{AttendanceRecord, AttendanceStatus},
  subject::Subject,
};
use uuid::Uuid;

use crate::{Error, Result};

// ─── Uuid ─────────────────────────────────────────────────────────────────────

pub fn encode_uuid(id: Uuid) -> String { id.hyphenated().to_string() }

pub fn decode_uuid(s: &str) -> Result<Uuid> { Ok(Uuid::parse_str(s)?) }

// ─── DateTime<Utc> ────────────────────────────────────────────────────────────

pub fn encode_dt(dt: DateTime<Utc>) -> String {
  dt.to_rfc3339_opts(SecondsFormat::Nanos, true)
}

pub fn decode_dt(s: &str) -> Result<DateTime<Utc>> {
  DateTime::parse_from_rfc3339(s)
    .map(|dt| dt.with_timezone(&Utc))
    .map_err(|e| Error::DateParse(e.to_string()))
}

// ─── NaiveDate ────────────────────────────────────────────────────────────────

pub fn encode_date(date: NaiveDate) -> String { date.format("%Y-%m-%d").to_string() }

pub fn decode_date(s: &str) -> Result<NaiveDate> {
  NaiveDate::parse_from_str(s, "%Y-%m-%d").map_err(|e| Error::DateParse(e.to_string()))
}

// ─── Enums ────────────────────────────────────────────────────────────────────

pub fn decode_status(s: &str) -> Result<AttendanceStatus> {
  s.parse().map_err(|_| Error::UnknownVariant { kind: "status", value: s.to_owned() })
}

pub fn decode_role(s: &str) -> Result<Role> {
  s.parse().map_err(|_| Error::UnknownVariant { kind: "role", value: s.to_owned() })
}

// ─── Row types ───────────────────────────────────────────────────────────────

pub const RECORD_COLUMNS: &str =
  "record_id, student_id, subject, status, date, created_at";

/// Raw strings read directly from an `attendance` row.
pub struct RawRecord {
  pub record_id:  String,
  pub student_id: String,
  pub subject:    String,
  pub status:     String,
  pub date:       String,
  pub created_at: String,
}

impl RawRecord {
  /// Map a row selected with [`RECORD_COLUMNS`].
  pub fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      record_id:  row.get(0)?,
      student_id: row.get(1)?,
      subject:    row.get(2)?,
      status:     row.get(3)?,
      date:       row.get(4)?,
      created_at: row.get(5)?,
    })
  }

  pub fn into_record(self) -> Result<AttendanceRecord> {
    Ok(AttendanceRecord {
      record_id:  decode_uuid(&self.record_id)?,
      student_id: self.student_id,
      subject:    self.subject,
      status:     decode_status(&self.status)?,
      date:       decode_date(&self.date)?,
      created_at: decode_dt(&self.created_at)?,
    })
  }
}

pub const IDENTITY_COLUMNS: &str = "user_id, display_name, role, department, semester";

/// Raw strings read directly from a `users` row.
pub struct RawIdentity {
  pub user_id:      String,
  pub display_name: String,
  pub role:         String,
  pub department:   Option<String>,
  pub semester:     Option<String>,
}

impl RawIdentity {
  /// Map a row selected with [`IDENTITY_COLUMNS`].
  pub fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      user_id:      row.get(0)?,
      display_name: row.get(1)?,
      role:         row.get(2)?,
      department:   row.get(3)?,
      semester:     row.get(4)?,
    })
  }

  pub fn into_identity(self) -> Result<RosterIdentity> {
    Ok(RosterIdentity {
      user_id:      self.user_id,
      display_name: self.display_name,
      role:         decode_role(&self.role)?,
      department:   self.department,
      semester:     self.semester,
    })
  }
}

pub fn subject_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Subject> {
  Ok(Subject {
    name:       row.get(0)?,
    department: row.get(1)?,
    semester:   row.get(2)?,
  })
}
