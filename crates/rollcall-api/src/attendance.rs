//! Attendance reads and the absentee sweep.
//!
//! | Method | Path | Notes |
//! |--------|------|-------|
//! | `GET`  | `/attendance?subject=..[&date=YYYY-MM-DD]` | Teacher or Admin; date defaults to today |
//! | `GET`  | `/attendance/summary[?date=YYYY-MM-DD]` | Admin |
//! | `GET`  | `/students/{id}/attendance` | The student themself, Teacher or Admin |
//! | `POST` | `/subjects/{name}/sweep[?session=<uuid>]` | Teacher or Admin; the session must be the caller's |

use axum::{
  Json,
  extract::{Path, Query, State},
};
use chrono::NaiveDate;
use rollcall_core::{
  engine::{SubjectSummary, SweepReport},
  identity::Role,
  record::AttendanceRecord,
};
use serde::Deserialize;
use tracing::info;
use uuid::Uuid;

use crate::{
  AppState, Backend, auth::Actor, error::ApiError, sessions::owned, subjects::find_subject,
};

// ─── Day view ─────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct DayParams {
  pub subject: String,
  pub date:    Option<NaiveDate>,
}

/// `GET /attendance?subject=<name>[&date=<date>]`
pub async fn for_day<S: Backend>(
  State(state): State<AppState<S>>,
  actor: Actor,
  Query(params): Query<DayParams>,
) -> Result<Json<Vec<AttendanceRecord>>, ApiError> {
  actor.require(&[Role::Teacher, Role::Admin])?;

  let subject = find_subject(&state, &params.subject).await?;
  let date = params.date.unwrap_or_else(|| state.attendance.today());
  let records = state.attendance.records_for_day(&subject.name, date).await?;
  Ok(Json(records))
}

// ─── Summary ──────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct SummaryParams {
  pub date: Option<NaiveDate>,
}

/// `GET /attendance/summary[?date=<date>]`
pub async fn summary<S: Backend>(
  State(state): State<AppState<S>>,
  actor: Actor,
  Query(params): Query<SummaryParams>,
) -> Result<Json<Vec<SubjectSummary>>, ApiError> {
  actor.require(&[Role::Admin])?;

  let date = params.date.unwrap_or_else(|| state.attendance.today());
  Ok(Json(state.attendance.day_summary(date).await?))
}

// ─── Student history ──────────────────────────────────────────────────────────

/// `GET /students/{id}/attendance`
pub async fn history<S: Backend>(
  State(state): State<AppState<S>>,
  actor: Actor,
  Path(student_id): Path<String>,
) -> Result<Json<Vec<AttendanceRecord>>, ApiError> {
  if actor.id() != student_id && !actor.is_staff() {
    return Err(ApiError::Forbidden("students may only view their own record".into()));
  }
  Ok(Json(state.attendance.student_history(&student_id).await?))
}

// ─── Sweep ────────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct SweepParams {
  /// Live scan session whose marks count as accounted for.
  pub session: Option<Uuid>,
}

/// `POST /subjects/{name}/sweep[?session=<uuid>]`
///
/// Writes `Absent` for every roster member without a record today. A
/// partial failure is a 500 naming how many writes landed; repeating the
/// request fills the gaps.
pub async fn sweep<S: Backend>(
  State(state): State<AppState<S>>,
  actor: Actor,
  Path(name): Path<String>,
  Query(params): Query<SweepParams>,
) -> Result<Json<SweepReport>, ApiError> {
  actor.require(&[Role::Teacher, Role::Admin])?;

  let subject = find_subject(&state, &name).await?;
  let present = match params.session {
    Some(id) => {
      let session = owned(&state, &actor, id)?;
      if session.gate.subject().name != subject.name {
        return Err(ApiError::BadRequest(format!("session {id} is not for {:?}", subject.name)));
      }
      Some(session.gate.present().clone())
    }
    None => None,
  };

  let report = state.attendance.sweep_absentees(present.as_ref(), &subject).await?;
  info!(
    subject = %subject.name,
    absent = report.count(),
    by = actor.id(),
    "absentees swept"
  );
  Ok(Json(report))
}
