//! [`SqliteStore`]: the SQLite implementation of [`AttendanceStore`],
//! [`IdentityProvider`], and [`UserDirectory`].

use std::path::Path;

use chrono::{NaiveDate, Utc};
use rusqlite::{OptionalExtension as _, types::Value};
use tokio::sync::broadcast;
use tracing::debug;
use uuid::Uuid;

use rollcall_core::{
  identity::{IdentityProvider, NewUser, Role, RosterIdentity, UserDirectory},
  record::{AttendanceRecord, NewRecord},
  store::{AttendanceStore, CreateOutcome, RecordQuery},
  subject::Subject,
};

use crate::{
  Error, Result,
  encode::{
    IDENTITY_COLUMNS, RECORD_COLUMNS, RawIdentity, RawRecord, encode_date, encode_dt,
    encode_uuid, subject_from_row,
  },
  schema::SCHEMA,
  subscribe::RecordSubscription,
};

/// Capacity of the change-notification channel. Lagging subscribers simply
/// re-query, so the exact value only bounds memory.
const CHANGE_CAPACITY: usize = 64;

fn is_unique_violation(e: &rusqlite::Error) -> bool {
  matches!(
    e,
    rusqlite::Error::SqliteFailure(err, _)
      if err.code == rusqlite::ErrorCode::ConstraintViolation
  )
}

// ─── Store ───────────────────────────────────────────────────────────────────

/// An attendance store backed by a single SQLite file.
///
/// Cloning is cheap; the inner connection and change channel are
/// reference-counted.
#[derive(Clone)]
pub struct SqliteStore {
  conn:    tokio_rusqlite::Connection,
  changes: broadcast::Sender<()>,
}

impl SqliteStore {
  /// Open (or create) a store at `path` and run schema initialisation.
  pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open(path).await?;
    Self::with_connection(conn).await
  }

  /// Open an in-memory store, for tests.
  pub async fn open_in_memory() -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open_in_memory().await?;
    Self::with_connection(conn).await
  }

  async fn with_connection(conn: tokio_rusqlite::Connection) -> Result<Self> {
    let (changes, _) = broadcast::channel(CHANGE_CAPACITY);
    let store = Self { conn, changes };
    store.init_schema().await?;
    Ok(store)
  }

  async fn init_schema(&self) -> Result<()> {
    self
      .conn
      .call(|conn| {
        conn.execute_batch(SCHEMA)?;
        Ok(())
      })
      .await?;
    Ok(())
  }

  /// Subscribe to the result set of `query`. The first
  /// [`RecordSubscription::next`] yields the current rows; each later call
  /// waits for a write and yields the full, re-read result set.
  pub fn subscribe(&self, query: RecordQuery) -> RecordSubscription {
    RecordSubscription::new(self.clone(), query, self.changes.subscribe())
  }

  /// All users with the given role, ordered by user id.
  pub async fn list_users(&self, role: Option<Role>) -> Result<Vec<RosterIdentity>> {
    let role_str = role.map(|r| r.to_string());

    let raws: Vec<RawIdentity> = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare(&format!(
          "SELECT {IDENTITY_COLUMNS} FROM users
           WHERE ?1 IS NULL OR role = ?1
           ORDER BY user_id"
        ))?;
        let rows = stmt
          .query_map(rusqlite::params![role_str], RawIdentity::from_row)?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    raws.into_iter().map(RawIdentity::into_identity).collect()
  }
}

// ─── AttendanceStore impl ────────────────────────────────────────────────────

impl AttendanceStore for SqliteStore {
  type Error = Error;

  // ── Subjects ──────────────────────────────────────────────────────────────

  async fn add_subject(&self, subject: Subject) -> Result<Subject> {
    let name       = subject.name.clone();
    let department = subject.department.clone();
    let semester   = subject.semester.clone();
    let at_str     = encode_dt(Utc::now());

    let inserted = self
      .conn
      .call(move |conn| {
        match conn.execute(
          "INSERT INTO subjects (name, department, semester, created_at)
           VALUES (?1, ?2, ?3, ?4)",
          rusqlite::params![name, department, semester, at_str],
        ) {
          Ok(_) => Ok(true),
          Err(e) if is_unique_violation(&e) => Ok(false),
          Err(e) => Err(e.into()),
        }
      })
      .await?;

    if !inserted {
      return Err(Error::Conflict(format!("subject {:?} already exists", subject.name)));
    }
    Ok(subject)
  }

  async fn get_subject(&self, name: &str) -> Result<Option<Subject>> {
    let name = name.to_owned();

    let subject = self
      .conn
      .call(move |conn| {
        Ok(
          conn
            .query_row(
              "SELECT name, department, semester FROM subjects WHERE name = ?1",
              rusqlite::params![name],
              subject_from_row,
            )
            .optional()?,
        )
      })
      .await?;

    Ok(subject)
  }

  async fn list_subjects(&self) -> Result<Vec<Subject>> {
    let subjects = self
      .conn
      .call(|conn| {
        let mut stmt =
          conn.prepare("SELECT name, department, semester FROM subjects ORDER BY name")?;
        let rows = stmt
          .query_map([], subject_from_row)?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    Ok(subjects)
  }

  // ── Records ───────────────────────────────────────────────────────────────

  async fn find_record(
    &self,
    student_id: &str,
    subject: &str,
    date: NaiveDate,
  ) -> Result<Option<AttendanceRecord>> {
    let student_id = student_id.to_owned();
    let subject    = subject.to_owned();
    let date_str   = encode_date(date);

    let raw: Option<RawRecord> = self
      .conn
      .call(move |conn| {
        Ok(
          conn
            .query_row(
              &format!(
                "SELECT {RECORD_COLUMNS} FROM attendance
                 WHERE student_id = ?1 AND subject = ?2 AND date = ?3"
              ),
              rusqlite::params![student_id, subject, date_str],
              RawRecord::from_row,
            )
            .optional()?,
        )
      })
      .await?;

    raw.map(RawRecord::into_record).transpose()
  }

  async fn query_records(&self, query: &RecordQuery) -> Result<Vec<AttendanceRecord>> {
    let mut conds: Vec<String> = Vec::new();
    let mut params: Vec<Value> = Vec::new();

    let mut filter = |column: &str, op: &str, value: Value| {
      params.push(value);
      conds.push(format!("{column} {op} ?{}", params.len()));
    };
    if let Some(subject) = &query.subject {
      filter("subject", "=", Value::Text(subject.clone()));
    }
    if let Some(student_id) = &query.student_id {
      filter("student_id", "=", Value::Text(student_id.clone()));
    }
    if let Some(date) = query.date {
      filter("date", "=", Value::Text(encode_date(date)));
    }
    if let Some(from) = query.date_from {
      filter("date", ">=", Value::Text(encode_date(from)));
    }
    if let Some(to) = query.date_to {
      filter("date", "<=", Value::Text(encode_date(to)));
    }
    if let Some(status) = query.status {
      filter("status", "=", Value::Text(status.to_string()));
    }

    let where_clause = if conds.is_empty() {
      String::new()
    } else {
      format!("WHERE {}", conds.join(" AND "))
    };
    let date_order = if query.newest_first { "DESC" } else { "ASC" };
    let limit_clause = match query.limit {
      Some(limit) => {
        params.push(Value::Integer(limit as i64));
        format!("LIMIT ?{}", params.len())
      }
      None => String::new(),
    };

    let sql = format!(
      "SELECT {RECORD_COLUMNS} FROM attendance
       {where_clause}
       ORDER BY date {date_order}, created_at ASC, rowid ASC
       {limit_clause}"
    );

    let raws: Vec<RawRecord> = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt
          .query_map(rusqlite::params_from_iter(params.iter()), RawRecord::from_row)?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    raws.into_iter().map(RawRecord::into_record).collect()
  }

  async fn create_record(&self, input: NewRecord) -> Result<CreateOutcome> {
    let record = AttendanceRecord {
      record_id:  Uuid::new_v4(),
      student_id: input.student_id,
      subject:    input.subject,
      status:     input.status,
      date:       input.date,
      created_at: Utc::now(),
    };

    let id_str     = encode_uuid(record.record_id);
    let student_id = record.student_id.clone();
    let subject    = record.subject.clone();
    let status_str = record.status.to_string();
    let date_str   = encode_date(record.date);
    let at_str     = encode_dt(record.created_at);

    let inserted = self
      .conn
      .call(move |conn| {
        match conn.execute(
          "INSERT INTO attendance (record_id, student_id, subject, status, date, created_at)
           VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
          rusqlite::params![id_str, student_id, subject, status_str, date_str, at_str],
        ) {
          Ok(_) => Ok(true),
          Err(e) if is_unique_violation(&e) => Ok(false),
          Err(e) => Err(e.into()),
        }
      })
      .await?;

    if !inserted {
      debug!(
        student_id = %record.student_id,
        subject = %record.subject,
        date = %record.date,
        "attendance create rejected by unique constraint"
      );
      return Ok(CreateOutcome::Conflict);
    }

    // No receivers is fine.
    self.changes.send(()).ok();
    Ok(CreateOutcome::Created(record))
  }
}

// ─── IdentityProvider impl ───────────────────────────────────────────────────

impl IdentityProvider for SqliteStore {
  type Error = Error;

  async fn resolve_identity(&self, user_id: &str) -> Result<Option<RosterIdentity>> {
    let user_id = user_id.to_owned();

    let raw: Option<RawIdentity> = self
      .conn
      .call(move |conn| {
        Ok(
          conn
            .query_row(
              &format!("SELECT {IDENTITY_COLUMNS} FROM users WHERE user_id = ?1"),
              rusqlite::params![user_id],
              RawIdentity::from_row,
            )
            .optional()?,
        )
      })
      .await?;

    raw.map(RawIdentity::into_identity).transpose()
  }

  async fn roster(&self, department: &str, semester: &str) -> Result<Vec<RosterIdentity>> {
    let department = department.to_owned();
    let semester   = semester.to_owned();
    let student    = Role::Student.to_string();

    let raws: Vec<RawIdentity> = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare(&format!(
          "SELECT {IDENTITY_COLUMNS} FROM users
           WHERE role = ?1 AND department = ?2 AND semester = ?3
           ORDER BY user_id"
        ))?;
        let rows = stmt
          .query_map(
            rusqlite::params![student, department, semester],
            RawIdentity::from_row,
          )?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    raws.into_iter().map(RawIdentity::into_identity).collect()
  }
}

// ─── UserDirectory impl ──────────────────────────────────────────────────────

impl UserDirectory for SqliteStore {
  async fn add_user(&self, input: NewUser) -> Result<RosterIdentity> {
    let identity = input.identity;

    let user_id      = identity.user_id.clone();
    let display_name = identity.display_name.clone();
    let role_str     = identity.role.to_string();
    let department   = identity.department.clone();
    let semester     = identity.semester.clone();
    let hash         = input.password_hash;
    let at_str       = encode_dt(Utc::now());

    let inserted = self
      .conn
      .call(move |conn| {
        match conn.execute(
          "INSERT INTO users (
             user_id, display_name, role, department, semester, password_hash, created_at
           ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
          rusqlite::params![user_id, display_name, role_str, department, semester, hash, at_str],
        ) {
          Ok(_) => Ok(true),
          Err(e) if is_unique_violation(&e) => Ok(false),
          Err(e) => Err(e.into()),
        }
      })
      .await?;

    if !inserted {
      return Err(Error::Conflict(format!("user {:?} already exists", identity.user_id)));
    }
    Ok(identity)
  }

  async fn password_hash(&self, user_id: &str) -> Result<Option<String>> {
    let user_id = user_id.to_owned();

    let hash: Option<Option<String>> = self
      .conn
      .call(move |conn| {
        Ok(
          conn
            .query_row(
              "SELECT password_hash FROM users WHERE user_id = ?1",
              rusqlite::params![user_id],
              |row| row.get(0),
            )
            .optional()?,
        )
      })
      .await?;

    Ok(hash.flatten())
  }
}
