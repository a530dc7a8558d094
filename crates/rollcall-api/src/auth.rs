//! HTTP Basic authentication against stored users.
//!
//! The username is the user id; the password is verified against the argon2
//! PHC string held by the [`UserDirectory`]. Users without a stored hash
//! cannot log in.

use argon2::{
  Argon2, PasswordHash, PasswordHasher, PasswordVerifier, password_hash::SaltString,
};
use axum::{
  extract::FromRequestParts,
  http::{HeaderMap, header, request::Parts},
};
use base64::{Engine as _, engine::general_purpose::STANDARD as B64};
use rand_core::OsRng;
use rollcall_core::identity::{IdentityProvider, Role, RosterIdentity, UserDirectory};
use tracing::debug;

use crate::{AppState, Backend, error::ApiError};

/// Hash `password` into an argon2id PHC string with a fresh salt.
pub fn hash_password(password: &str) -> Result<String, argon2::password_hash::Error> {
  let salt = SaltString::generate(&mut OsRng);
  Ok(Argon2::default().hash_password(password.as_bytes(), &salt)?.to_string())
}

/// Check `password` against a PHC string. Malformed hashes never verify.
pub fn verify_password(password: &str, phc: &str) -> bool {
  PasswordHash::new(phc)
    .and_then(|parsed| Argon2::default().verify_password(password.as_bytes(), &parsed))
    .is_ok()
}

/// Split a `Basic` authorization header into `(user, password)`.
pub fn basic_credentials(headers: &HeaderMap) -> Result<(String, String), ApiError> {
  let value = headers
    .get(header::AUTHORIZATION)
    .and_then(|v| v.to_str().ok())
    .ok_or(ApiError::Unauthorized)?;

  let encoded = value.strip_prefix("Basic ").ok_or(ApiError::Unauthorized)?;
  let decoded = B64.decode(encoded).map_err(|_| ApiError::Unauthorized)?;
  let creds   = String::from_utf8(decoded).map_err(|_| ApiError::Unauthorized)?;

  let (user, password) = creds.split_once(':').ok_or(ApiError::Unauthorized)?;
  Ok((user.to_owned(), password.to_owned()))
}

// ─── Actor ───────────────────────────────────────────────────────────────────

/// The authenticated user making the request.
#[derive(Debug, Clone)]
pub struct Actor(pub RosterIdentity);

impl Actor {
  pub fn id(&self) -> &str { &self.0.user_id }

  pub fn role(&self) -> Role { self.0.role }

  pub fn is_staff(&self) -> bool { matches!(self.0.role, Role::Teacher | Role::Admin) }

  /// Fail with 403 unless the actor holds one of `roles`.
  pub fn require(&self, roles: &[Role]) -> Result<(), ApiError> {
    if roles.contains(&self.0.role) {
      Ok(())
    } else {
      Err(ApiError::Forbidden(format!("{} may not do this", self.0.role)))
    }
  }
}

impl<S: Backend> FromRequestParts<AppState<S>> for Actor {
  type Rejection = ApiError;

  async fn from_request_parts(
    parts: &mut Parts,
    state: &AppState<S>,
  ) -> Result<Self, Self::Rejection> {
    let (user, password) = basic_credentials(&parts.headers)?;
    let store = state.store();

    let hash = store.password_hash(&user).await.map_err(ApiError::store)?;
    if !hash.is_some_and(|phc| verify_password(&password, &phc)) {
      debug!(%user, "rejected credentials");
      return Err(ApiError::Unauthorized);
    }

    let identity = store
      .resolve_identity(&user)
      .await
      .map_err(ApiError::store)?
      .ok_or(ApiError::Unauthorized)?;
    Ok(Actor(identity))
  }
}
