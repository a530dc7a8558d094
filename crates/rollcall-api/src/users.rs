//! Handlers for `/users` endpoints.
//!
//! | Method | Path | Notes |
//! |--------|------|-------|
//! | `POST` | `/users` | Admin; body below; 409 if the id is taken |
//!
//! ```json
//! {"userId":"s1","displayName":"Asha","role":"Student",
//!  "department":"Computer Science","semester":"3rd Semester","password":"…"}
//! ```

use axum::{Json, extract::State, http::StatusCode, response::IntoResponse};
use rollcall_core::identity::{IdentityProvider, NewUser, Role, RosterIdentity, UserDirectory};
use serde::Deserialize;
use tracing::info;

use crate::{
  AppState, Backend,
  auth::{Actor, hash_password},
  error::ApiError,
};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateBody {
  pub user_id:      String,
  pub display_name: String,
  pub role:         Role,
  pub department:   Option<String>,
  pub semester:     Option<String>,
  /// Omit for users that never log in, e.g. most students.
  pub password:     Option<String>,
}

/// `POST /users`
pub async fn create<S: Backend>(
  State(state): State<AppState<S>>,
  actor: Actor,
  Json(body): Json<CreateBody>,
) -> Result<impl IntoResponse, ApiError> {
  actor.require(&[Role::Admin])?;

  let user_id = body.user_id.trim().to_owned();
  if user_id.is_empty() || user_id.contains(':') {
    return Err(ApiError::BadRequest("userId must be non-empty and contain no ':'".into()));
  }
  let non_blank = |v: Option<String>| v.map(|s| s.trim().to_owned()).filter(|s| !s.is_empty());
  let department = non_blank(body.department);
  let semester = non_blank(body.semester);
  if body.role == Role::Student && (department.is_none() || semester.is_none()) {
    return Err(ApiError::BadRequest("students need a department and a semester".into()));
  }

  let store = state.store();
  if store.resolve_identity(&user_id).await.map_err(ApiError::store)?.is_some() {
    return Err(ApiError::Conflict(format!("user {user_id:?} already exists")));
  }

  let password_hash = body
    .password
    .map(|p| hash_password(&p))
    .transpose()
    .map_err(|e| ApiError::BadRequest(format!("cannot hash password: {e}")))?;

  let identity = store
    .add_user(NewUser {
      identity: RosterIdentity {
        user_id,
        display_name: body.display_name,
        role: body.role,
        department,
        semester,
      },
      password_hash,
    })
    .await
    .map_err(ApiError::write)?;

  info!(user = %identity.user_id, role = %identity.role, by = actor.id(), "user created");
  Ok((StatusCode::CREATED, Json(identity)))
}
