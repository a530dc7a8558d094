//! Identities, roles, and the `IdentityProvider` trait.
//!
//! The provider is the authority on who a student identifier belongs to.
//! Decoded payloads are only ever trusted after they resolve here.

use std::future::Future;

use serde::{Deserialize, Serialize};

use crate::{BackendError, subject::Subject};

/// The role an actor holds in the portal.
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
pub enum Role {
  Admin,
  Teacher,
  Student,
}

/// A user as seen by the attendance flow.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RosterIdentity {
  pub user_id:      String,
  pub display_name: String,
  pub role:         Role,
  /// Staff may have no department or semester.
  pub department:   Option<String>,
  pub semester:     Option<String>,
}

impl RosterIdentity {
  pub fn is_student(&self) -> bool { self.role == Role::Student }

  /// Whether this identity is on the roster of `subject`: a student whose
  /// department and semester both match.
  pub fn on_roster_of(&self, subject: &Subject) -> bool {
    self.is_student()
      && self.department.as_deref() == Some(subject.department.as_str())
      && self.semester.as_deref() == Some(subject.semester.as_str())
  }
}

/// Input to [`UserDirectory::add_user`].
#[derive(Debug, Clone)]
pub struct NewUser {
  pub identity:      RosterIdentity,
  /// argon2 PHC string; `None` for users that never log in directly.
  pub password_hash: Option<String>,
}

/// Read access to the identity service.
pub trait IdentityProvider: Send + Sync {
  type Error: BackendError;

  /// Resolve a user identifier. Returns `None` if no such user exists.
  fn resolve_identity<'a>(
    &'a self,
    user_id: &'a str,
  ) -> impl Future<Output = Result<Option<RosterIdentity>, Self::Error>> + Send + 'a;

  /// All Student-role identities in the given department and semester,
  /// ordered by user id.
  fn roster<'a>(
    &'a self,
    department: &'a str,
    semester: &'a str,
  ) -> impl Future<Output = Result<Vec<RosterIdentity>, Self::Error>> + Send + 'a;
}

/// Write access and credential lookup, used by the HTTP surface.
pub trait UserDirectory: IdentityProvider {
  /// Persist a new user. Fails if the user id is taken.
  fn add_user(
    &self,
    input: NewUser,
  ) -> impl Future<Output = Result<RosterIdentity, Self::Error>> + Send + '_;

  /// The stored password hash for `user_id`, if the user exists and has one.
  fn password_hash<'a>(
    &'a self,
    user_id: &'a str,
  ) -> impl Future<Output = Result<Option<String>, Self::Error>> + Send + 'a;
}
