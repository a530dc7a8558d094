//! Handlers for `/subjects` endpoints.
//!
//! | Method | Path | Notes |
//! |--------|------|-------|
//! | `GET`  | `/subjects` | Any authenticated user |
//! | `POST` | `/subjects` | Body: `{"name":..,"department":..,"semester":..}`; Admin |
//! | `GET`  | `/subjects/{name}/roster` | Teacher or Admin; 404 if not found |

use axum::{
  Json,
  extract::{Path, State},
  http::StatusCode,
  response::IntoResponse,
};
use rollcall_core::{
  identity::{IdentityProvider, Role, RosterIdentity},
  store::AttendanceStore,
  subject::Subject,
};
use tracing::info;

use crate::{AppState, Backend, auth::Actor, error::ApiError};

/// Look up a subject or fail with 404.
pub(crate) async fn find_subject<S: Backend>(
  state: &AppState<S>,
  name: &str,
) -> Result<Subject, ApiError> {
  state
    .store()
    .get_subject(name)
    .await
    .map_err(ApiError::store)?
    .ok_or_else(|| ApiError::NotFound(format!("subject {name:?} not found")))
}

// ─── List ─────────────────────────────────────────────────────────────────────

/// `GET /subjects`
pub async fn list<S: Backend>(
  State(state): State<AppState<S>>,
  _actor: Actor,
) -> Result<Json<Vec<Subject>>, ApiError> {
  let subjects = state.store().list_subjects().await.map_err(ApiError::store)?;
  Ok(Json(subjects))
}

// ─── Create ───────────────────────────────────────────────────────────────────

/// `POST /subjects`
pub async fn create<S: Backend>(
  State(state): State<AppState<S>>,
  actor: Actor,
  Json(body): Json<Subject>,
) -> Result<impl IntoResponse, ApiError> {
  actor.require(&[Role::Admin])?;

  let subject = Subject::new(
    body.name.trim(),
    body.department.trim(),
    body.semester.trim(),
  );
  if subject.name.is_empty() || subject.department.is_empty() || subject.semester.is_empty() {
    return Err(ApiError::BadRequest(
      "name, department and semester are required".into(),
    ));
  }

  let store = state.store();
  if store.get_subject(&subject.name).await.map_err(ApiError::store)?.is_some() {
    return Err(ApiError::Conflict(format!("subject {:?} already exists", subject.name)));
  }
  let subject = store.add_subject(subject).await.map_err(ApiError::write)?;

  info!(subject = %subject.name, by = actor.id(), "subject created");
  Ok((StatusCode::CREATED, Json(subject)))
}

// ─── Roster ───────────────────────────────────────────────────────────────────

/// `GET /subjects/{name}/roster`
pub async fn roster<S: Backend>(
  State(state): State<AppState<S>>,
  actor: Actor,
  Path(name): Path<String>,
) -> Result<Json<Vec<RosterIdentity>>, ApiError> {
  actor.require(&[Role::Teacher, Role::Admin])?;

  let subject = find_subject(&state, &name).await?;
  let roster = state
    .store()
    .roster(&subject.department, &subject.semester)
    .await
    .map_err(ApiError::store)?;
  Ok(Json(roster))
}
