//! Error types for `rollcall-scan`.

use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Error {
  /// The user (or platform policy) refused camera access.
  #[error("camera permission denied: {0}")]
  PermissionDenied(String),

  /// The device exists but could not be opened or stopped delivering frames.
  #[error("camera hardware error: {0}")]
  Hardware(String),

  /// The camera was lost with a crashed capture task and cannot be reopened.
  #[error("camera unavailable")]
  CameraUnavailable,

  #[error("frame buffer is {actual} bytes, expected {expected}")]
  FrameSize { expected: usize, actual: usize },

  #[error("cannot change subject while a scan session is running")]
  SubjectLocked,

  #[error("no subject selected")]
  NoSubject,
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
