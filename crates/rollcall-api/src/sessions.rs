//! Handlers for `/sessions` endpoints: scan sessions driven by a client
//! that decodes codes on its own device.
//!
//! | Method   | Path | Notes |
//! |----------|------|-------|
//! | `POST`   | `/sessions` | Body: `{"subject":"Data Structures"}`; Teacher or Admin |
//! | `GET`    | `/sessions/{id}` | Owner only |
//! | `DELETE` | `/sessions/{id}` | Owner only; returns the final view |
//! | `POST`   | `/sessions/{id}/scan` | Body: `{"payload":"s1"}`; owner only |
//!
//! A session is good for the day it was opened on and expires after an
//! idle period; an expired session answers 404.

use std::{
  collections::HashMap,
  sync::{Mutex, PoisonError},
  time::Duration,
};

use axum::{
  Json,
  extract::{Path, State},
  http::StatusCode,
  response::IntoResponse,
};
use chrono::{DateTime, NaiveDate, Utc};
use rollcall_core::{
  engine::MarkOutcome,
  identity::Role,
  session::PresentEntry,
  subject::Subject,
};
use rollcall_scan::gate::{ScanGate, ScanOutcome};
use serde::{Deserialize, Serialize};
use tokio::time::Instant;
use tracing::{debug, info};
use uuid::Uuid;

use crate::{AppState, Backend, auth::Actor, error::ApiError, subjects::find_subject};

// ─── Registry ────────────────────────────────────────────────────────────────

/// How long a session may go without a request before it is dropped.
pub const DEFAULT_SESSION_IDLE: Duration = Duration::from_secs(60 * 60);

/// One live scan session.
pub struct ApiSession<S> {
  pub owner:      String,
  pub started_at: DateTime<Utc>,
  /// Attendance day the session was opened on. It expires when the day ends.
  pub day:        NaiveDate,
  pub gate:       ScanGate<S, S>,
}

impl<S> Clone for ApiSession<S> {
  fn clone(&self) -> Self {
    Self {
      owner:      self.owner.clone(),
      started_at: self.started_at,
      day:        self.day,
      gate:       self.gate.clone(),
    }
  }
}

struct Slot<S> {
  session: ApiSession<S>,
  touched: Instant,
}

/// Live sessions by id. Sessions live in memory only and vanish on restart.
///
/// A session expires once its day is over or after `idle` without a
/// request. Expired sessions are dropped when next looked up and by
/// [`SessionRegistry::prune`].
pub struct SessionRegistry<S> {
  sessions: Mutex<HashMap<Uuid, Slot<S>>>,
  idle:     Duration,
}

impl<S> Default for SessionRegistry<S> {
  fn default() -> Self { Self::new(DEFAULT_SESSION_IDLE) }
}

impl<S> SessionRegistry<S> {
  pub fn new(idle: Duration) -> Self { Self { sessions: Mutex::new(HashMap::new()), idle } }

  fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<Uuid, Slot<S>>> {
    self.sessions.lock().unwrap_or_else(PoisonError::into_inner)
  }

  fn expired(&self, slot: &Slot<S>, today: NaiveDate) -> bool {
    slot.session.day != today || slot.touched.elapsed() >= self.idle
  }

  pub fn idle(&self) -> Duration { self.idle }

  pub fn insert(&self, id: Uuid, session: ApiSession<S>) {
    self.lock().insert(id, Slot { session, touched: Instant::now() });
  }

  /// Fetch a live session and reset its idle timer.
  pub fn get(&self, id: Uuid, today: NaiveDate) -> Option<ApiSession<S>> {
    let mut sessions = self.lock();
    let slot = sessions.get_mut(&id)?;
    if self.expired(slot, today) {
      sessions.remove(&id);
      debug!(%id, "scan session expired");
      return None;
    }
    slot.touched = Instant::now();
    Some(slot.session.clone())
  }

  /// Remove a session. Expired sessions are removed but not returned.
  pub fn remove(&self, id: Uuid, today: NaiveDate) -> Option<ApiSession<S>> {
    let slot = self.lock().remove(&id)?;
    (!self.expired(&slot, today)).then_some(slot.session)
  }

  /// Drop every expired session, returning how many went.
  pub fn prune(&self, today: NaiveDate) -> usize {
    let mut sessions = self.lock();
    let before = sessions.len();
    sessions.retain(|_, slot| !self.expired(slot, today));
    before - sessions.len()
  }

  pub fn len(&self) -> usize { self.lock().len() }

  pub fn is_empty(&self) -> bool { self.lock().is_empty() }
}

/// Fetch a session, requiring the actor to own it.
pub(crate) fn owned<S: Backend>(
  state: &AppState<S>,
  actor: &Actor,
  id: Uuid,
) -> Result<ApiSession<S>, ApiError> {
  let session = state
    .sessions
    .get(id, state.attendance.today())
    .ok_or_else(|| ApiError::NotFound(format!("session {id} not found")))?;
  if session.owner != actor.id() {
    return Err(ApiError::Forbidden(format!("session {id} belongs to another user")));
  }
  Ok(session)
}

// ─── Views ───────────────────────────────────────────────────────────────────

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionView {
  pub id:          Uuid,
  pub subject:     Subject,
  pub owner:       String,
  pub started_at:  DateTime<Utc>,
  pub cooldown_ms: u64,
  pub present:     Vec<PresentEntry>,
}

impl SessionView {
  fn of<S: Backend>(id: Uuid, session: &ApiSession<S>) -> Self {
    Self {
      id,
      subject: session.gate.subject().clone(),
      owner: session.owner.clone(),
      started_at: session.started_at,
      cooldown_ms: session.gate.cooldown().as_millis() as u64,
      present: session.gate.present().entries(),
    }
  }
}

/// Response to a submitted payload.
#[derive(Debug, Serialize, Deserialize)]
#[serde(tag = "result", rename_all = "snake_case")]
pub enum ScanResponse {
  /// Dropped by the cooldown.
  Suppressed,
  Marked { outcome: MarkOutcome },
}

impl From<ScanOutcome> for ScanResponse {
  fn from(outcome: ScanOutcome) -> Self {
    match outcome {
      ScanOutcome::Suppressed => Self::Suppressed,
      ScanOutcome::Marked(outcome) => Self::Marked { outcome },
    }
  }
}

// ─── Start ───────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct StartBody {
  pub subject: String,
}

/// `POST /sessions`, body: `{"subject":"Data Structures"}`
pub async fn start<S: Backend>(
  State(state): State<AppState<S>>,
  actor: Actor,
  Json(body): Json<StartBody>,
) -> Result<impl IntoResponse, ApiError> {
  actor.require(&[Role::Teacher, Role::Admin])?;

  let subject = find_subject(&state, &body.subject).await?;

  let today = state.attendance.today();
  let pruned = state.sessions.prune(today);
  if pruned > 0 {
    debug!(pruned, "dropped expired scan sessions");
  }

  let id = Uuid::new_v4();
  let session = ApiSession {
    owner:      actor.id().to_owned(),
    started_at: Utc::now(),
    day:        today,
    gate:       ScanGate::new(state.attendance.clone(), subject)
      .with_cooldown(state.cooldown),
  };
  let view = SessionView::of(id, &session);
  state.sessions.insert(id, session);

  info!(%id, owner = actor.id(), subject = %view.subject.name, "scan session opened");
  Ok((StatusCode::CREATED, Json(view)))
}

// ─── Get / stop ──────────────────────────────────────────────────────────────

/// `GET /sessions/{id}`
pub async fn get_one<S: Backend>(
  State(state): State<AppState<S>>,
  actor: Actor,
  Path(id): Path<Uuid>,
) -> Result<Json<SessionView>, ApiError> {
  let session = owned(&state, &actor, id)?;
  Ok(Json(SessionView::of(id, &session)))
}

/// `DELETE /sessions/{id}` ends the session and returns its final view.
pub async fn stop<S: Backend>(
  State(state): State<AppState<S>>,
  actor: Actor,
  Path(id): Path<Uuid>,
) -> Result<Json<SessionView>, ApiError> {
  owned(&state, &actor, id)?;
  let session = state
    .sessions
    .remove(id, state.attendance.today())
    .ok_or_else(|| ApiError::NotFound(format!("session {id} not found")))?;

  let view = SessionView::of(id, &session);
  info!(%id, present = view.present.len(), "scan session closed");
  Ok(Json(view))
}

// ─── Scan ────────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct ScanBody {
  pub payload: String,
}

/// `POST /sessions/{id}/scan`, body: `{"payload":"s1"}`
pub async fn scan<S: Backend>(
  State(state): State<AppState<S>>,
  actor: Actor,
  Path(id): Path<Uuid>,
  Json(body): Json<ScanBody>,
) -> Result<Json<ScanResponse>, ApiError> {
  let session = owned(&state, &actor, id)?;
  if body.payload.trim().is_empty() {
    return Err(ApiError::BadRequest("payload must not be empty".into()));
  }
  let outcome = session.gate.submit(&body.payload).await;
  Ok(Json(outcome.into()))
}
