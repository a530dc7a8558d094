//! Camera access and frame sampling.
//!
//! A [`Camera`] hands out [`FrameStream`]s. An open stream is the camera
//! handle: dropping it releases the device. [`FrameSampler`] owns exactly one
//! camera and at most one open stream, and tracks the capture lifecycle:
//!
//! ```text
//! Idle ──start──▶ Requesting ──granted──▶ Streaming ──stop──▶ Idle
//!                     │
//!                     └──denied / hardware error──▶ PermissionDenied
//! ```
//!
//! `PermissionDenied` is terminal until `start_capture` is called again.

use std::future::Future;

use tracing::{debug, info, warn};

use crate::{Error, Result, frame::Frame};

/// Which lens to request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Facing {
  Rear,
  Front,
}

/// A video source that can be opened into a stream of frames.
pub trait Camera: Send + 'static {
  type Stream: FrameStream;

  /// Request access and open the given lens. Fails with
  /// [`Error::PermissionDenied`] or [`Error::Hardware`].
  fn open(
    &mut self,
    facing: Facing,
  ) -> impl Future<Output = Result<Self::Stream>> + Send + '_;
}

/// An open camera. Implementations release the device on drop.
pub trait FrameStream: Send + 'static {
  /// The next frame, waiting for the device if needed. `None` once the
  /// device stops delivering.
  fn next_frame(&mut self) -> impl Future<Output = Option<Frame>> + Send + '_;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CaptureState {
  Idle,
  Requesting,
  Streaming,
  PermissionDenied,
}

/// Exclusive owner of one [`Camera`] and its open stream.
pub struct FrameSampler<C: Camera> {
  camera:     C,
  stream:     Option<C::Stream>,
  state:      CaptureState,
  last_error: Option<Error>,
}

impl<C: Camera> FrameSampler<C> {
  pub fn new(camera: C) -> Self {
    Self { camera, stream: None, state: CaptureState::Idle, last_error: None }
  }

  pub fn state(&self) -> CaptureState { self.state }

  /// The error that put the sampler into `PermissionDenied`, if any.
  pub fn last_error(&self) -> Option<&Error> { self.last_error.as_ref() }

  /// Request the camera, preferring the rear lens and falling back to the
  /// front one on a hardware error. A refusal is not retried.
  pub async fn start_capture(&mut self) -> Result<()> {
    if self.state == CaptureState::Streaming {
      return Ok(());
    }
    self.state = CaptureState::Requesting;
    self.last_error = None;

    let opened = match self.camera.open(Facing::Rear).await {
      Err(Error::Hardware(reason)) => {
        debug!(%reason, "rear camera unavailable, trying front");
        self.camera.open(Facing::Front).await
      }
      other => other,
    };

    match opened {
      Ok(stream) => {
        self.stream = Some(stream);
        self.state = CaptureState::Streaming;
        info!("camera streaming");
        Ok(())
      }
      Err(e) => {
        warn!(error = %e, "camera access failed");
        self.state = CaptureState::PermissionDenied;
        self.last_error = Some(e.clone());
        Err(e)
      }
    }
  }

  /// Release the camera. Safe to call in any state.
  pub fn stop_capture(&mut self) {
    if self.stream.take().is_some() {
      debug!("camera released");
    }
    if self.state != CaptureState::PermissionDenied {
      self.state = CaptureState::Idle;
    }
  }

  /// The next frame while streaming. Returns `None` when not streaming, or
  /// when the device ends the stream, in which case the camera is released.
  pub async fn next_frame(&mut self) -> Option<Frame> {
    let stream = self.stream.as_mut()?;
    let frame = stream.next_frame().await;
    if frame.is_none() {
      warn!("camera stream ended");
      self.stop_capture();
    }
    frame
  }

  /// Release any open stream and hand the camera back.
  pub fn into_camera(self) -> C { self.camera }
}
