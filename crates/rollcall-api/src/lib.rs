//! JSON REST API for rollcall.
//!
//! Exposes an axum [`Router`] over any backend implementing both
//! [`AttendanceStore`] and [`UserDirectory`]. Every route requires HTTP Basic
//! credentials of a stored user; TLS is the caller's responsibility.
//!
//! # Mounting
//!
//! ```rust,ignore
//! .nest("/api", rollcall_api::api_router(AppState::new(store.clone())))
//! ```

pub mod attendance;
pub mod auth;
pub mod error;
pub mod sessions;
pub mod subjects;
pub mod users;

#[cfg(test)]
mod tests;

use std::{sync::Arc, time::Duration};

use axum::{
  Router,
  routing::{get, post},
};
use rollcall_core::{engine::Attendance, identity::UserDirectory, store::AttendanceStore};
use rollcall_scan::gate::DEFAULT_COOLDOWN;

pub use error::ApiError;
pub use sessions::DEFAULT_SESSION_IDLE;
use sessions::SessionRegistry;

/// A storage backend the API can serve: records, subjects and users.
pub trait Backend: AttendanceStore + UserDirectory + 'static {}

impl<T> Backend for T where T: AttendanceStore + UserDirectory + 'static {}

// ─── Application state ────────────────────────────────────────────────────────

/// Shared state threaded through all handlers.
pub struct AppState<S> {
  pub attendance: Attendance<S, S>,
  pub sessions:   Arc<SessionRegistry<S>>,
  /// Cooldown applied to each scan session started over HTTP.
  pub cooldown:   Duration,
}

impl<S> Clone for AppState<S> {
  fn clone(&self) -> Self {
    Self {
      attendance: self.attendance.clone(),
      sessions:   Arc::clone(&self.sessions),
      cooldown:   self.cooldown,
    }
  }
}

impl<S: Backend> AppState<S> {
  pub fn new(store: Arc<S>) -> Self {
    Self::with_attendance(Attendance::new(Arc::clone(&store), store))
  }

  pub fn with_attendance(attendance: Attendance<S, S>) -> Self {
    Self {
      attendance,
      sessions: Arc::new(SessionRegistry::default()),
      cooldown: DEFAULT_COOLDOWN,
    }
  }

  pub fn with_cooldown(mut self, cooldown: Duration) -> Self {
    self.cooldown = cooldown;
    self
  }

  /// Expire scan sessions after `idle` without a request.
  pub fn with_session_idle(mut self, idle: Duration) -> Self {
    self.sessions = Arc::new(SessionRegistry::new(idle));
    self
  }

  /// Drop expired scan sessions; returns how many were removed.
  pub fn prune_sessions(&self) -> usize { self.sessions.prune(self.attendance.today()) }

  pub fn store(&self) -> &Arc<S> { self.attendance.store() }
}

// ─── Router ───────────────────────────────────────────────────────────────────

/// Build a fully-materialised API router.
///
/// The returned `Router<()>` can be nested into any parent router regardless
/// of its own state type.
pub fn api_router<S: Backend>(state: AppState<S>) -> Router<()> {
  Router::new()
    // Subjects
    .route("/subjects", get(subjects::list::<S>).post(subjects::create::<S>))
    .route("/subjects/{name}/roster", get(subjects::roster::<S>))
    .route("/subjects/{name}/sweep", post(attendance::sweep::<S>))
    // Users
    .route("/users", post(users::create::<S>))
    // Scan sessions
    .route("/sessions", post(sessions::start::<S>))
    .route("/sessions/{id}", get(sessions::get_one::<S>).delete(sessions::stop::<S>))
    .route("/sessions/{id}/scan", post(sessions::scan::<S>))
    // Attendance reads
    .route("/attendance", get(attendance::for_day::<S>))
    .route("/attendance/summary", get(attendance::summary::<S>))
    .route("/students/{id}/attendance", get(attendance::history::<S>))
    .with_state(state)
}
