//! Subject: a taught course scoped to one department and semester.

use serde::{Deserialize, Serialize};

/// A subject. The name is unique across the store and is what attendance
/// records reference.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Subject {
  pub name:       String,
  pub department: String,
  /// Semester or cohort label, e.g. "3rd Semester".
  pub semester:   String,
}

impl Subject {
  pub fn new(
    name: impl Into<String>,
    department: impl Into<String>,
    semester: impl Into<String>,
  ) -> Self {
    Self {
      name:       name.into(),
      department: department.into(),
      semester:   semester.into(),
    }
  }
}
