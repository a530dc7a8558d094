//! The scan session controller.
//!
//! ```text
//! NotScanning ──start──▶ Scanning ──payload──▶ Cooldown ──elapsed──▶ Scanning
//!      ▲                     │                     │
//!      └───────stop / drop───┴─────────────────────┘
//! ```
//!
//! While running, a background task owns the camera. Every frame in
//! `Scanning` is decoded; frames that arrive during `Cooldown` are dropped
//! undecoded. Outcomes are published as [`ScanEvent`]s.

use std::{sync::Arc, time::Duration};

use rollcall_core::{
  engine::{Attendance, MarkOutcome},
  identity::IdentityProvider,
  session::SessionPresentSet,
  store::AttendanceStore,
  subject::Subject,
};
use tokio::{
  sync::{mpsc, oneshot, watch},
  task::JoinHandle,
};
use tracing::{info, warn};

use crate::{
  Error, Result,
  capture::{Camera, FrameSampler},
  decode::Decoder,
  gate::{DEFAULT_COOLDOWN, ScanGate, ScanOutcome},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScanState {
  NotScanning,
  Scanning,
  Cooldown,
}

/// A user-visible notification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScanEvent {
  Recorded { student_id: String, display_name: String },
  AlreadyMarked { student_id: String },
  StudentNotFound { student_id: String },
  WriteFailed { student_id: String, reason: String },
  PermissionDenied { reason: String },
  /// The camera stopped delivering frames; the session has ended.
  CaptureEnded,
}

impl From<MarkOutcome> for ScanEvent {
  fn from(outcome: MarkOutcome) -> Self {
    match outcome {
      MarkOutcome::Recorded { record, display_name } => {
        Self::Recorded { student_id: record.student_id, display_name }
      }
      MarkOutcome::AlreadyMarked { student_id } => Self::AlreadyMarked { student_id },
      MarkOutcome::StudentNotFound { student_id } => Self::StudentNotFound { student_id },
      MarkOutcome::WriteFailed { student_id, reason } => {
        Self::WriteFailed { student_id, reason }
      }
    }
  }
}

struct Running<C> {
  stop:  Option<oneshot::Sender<()>>,
  state: watch::Receiver<ScanState>,
  task:  JoinHandle<C>,
}

/// Drives one camera and decoder for a selected subject.
pub struct ScanSession<S, I, C, D> {
  engine:   Attendance<S, I>,
  decoder:  Arc<D>,
  camera:   Option<C>,
  subject:  Option<Subject>,
  cooldown: Duration,
  present:  SessionPresentSet,
  events:   mpsc::UnboundedSender<ScanEvent>,
  denied:   Option<Error>,
  running:  Option<Running<C>>,
}

impl<S, I, C, D> ScanSession<S, I, C, D>
where
  S: AttendanceStore + 'static,
  I: IdentityProvider + 'static,
  C: Camera,
  D: Decoder,
{
  pub fn new(
    engine: Attendance<S, I>,
    camera: C,
    decoder: D,
    events: mpsc::UnboundedSender<ScanEvent>,
  ) -> Self {
    Self {
      engine,
      decoder: Arc::new(decoder),
      camera: Some(camera),
      subject: None,
      cooldown: DEFAULT_COOLDOWN,
      present: SessionPresentSet::new(),
      events,
      denied: None,
      running: None,
    }
  }

  pub fn with_cooldown(mut self, cooldown: Duration) -> Self {
    self.cooldown = cooldown;
    self
  }

  /// Whether the frame loop is alive.
  pub fn is_running(&self) -> bool {
    self.running.as_ref().is_some_and(|r| !r.task.is_finished())
  }

  pub fn state(&self) -> ScanState {
    match &self.running {
      Some(running) => *running.state.borrow(),
      None => ScanState::NotScanning,
    }
  }

  pub fn subject(&self) -> Option<&Subject> { self.subject.as_ref() }

  /// Students marked present since the last `start`.
  pub fn present(&self) -> &SessionPresentSet { &self.present }

  /// The camera error from the last failed `start`, cleared by a successful
  /// one.
  pub fn last_error(&self) -> Option<&Error> { self.denied.as_ref() }

  /// Choose the subject for the next session. Rejected while running.
  pub fn select_subject(&mut self, subject: Subject) -> Result<()> {
    if self.is_running() {
      return Err(Error::SubjectLocked);
    }
    self.subject = Some(subject);
    Ok(())
  }

  /// Open the camera and start scanning with a fresh session set. A no-op
  /// if already running.
  ///
  /// On a camera refusal a [`ScanEvent::PermissionDenied`] is published and
  /// the error returned; calling `start` again is the retry.
  pub async fn start(&mut self) -> Result<()> {
    if self.is_running() {
      return Ok(());
    }
    // Reap a loop that ended on its own so the camera comes back.
    self.stop().await;

    let subject = self.subject.clone().ok_or(Error::NoSubject)?;
    let camera = self.camera.take().ok_or(Error::CameraUnavailable)?;

    let mut sampler = FrameSampler::new(camera);
    if let Err(e) = sampler.start_capture().await {
      self.camera = Some(sampler.into_camera());
      self.events.send(ScanEvent::PermissionDenied { reason: e.to_string() }).ok();
      self.denied = Some(e.clone());
      return Err(e);
    }
    self.denied = None;

    self.present = SessionPresentSet::new();
    let gate = ScanGate::with_present(self.engine.clone(), subject, self.present.clone())
      .with_cooldown(self.cooldown);
    info!(subject = %gate.subject().name, "scan session started");

    let (stop_tx, stop_rx) = oneshot::channel();
    let (state_tx, state_rx) = watch::channel(ScanState::Scanning);
    let task = tokio::spawn(frame_loop(
      gate,
      sampler,
      Arc::clone(&self.decoder),
      self.events.clone(),
      state_tx,
      stop_rx,
    ));

    self.running = Some(Running { stop: Some(stop_tx), state: state_rx, task });
    Ok(())
  }

  /// End the session from any sub-state and wait until the camera is
  /// released. A mark already in flight still completes.
  pub async fn stop(&mut self) {
    let Some(mut running) = self.running.take() else {
      return;
    };
    if let Some(stop) = running.stop.take() {
      stop.send(()).ok();
    }
    match running.task.await {
      Ok(camera) => self.camera = Some(camera),
      Err(e) => warn!(error = %e, "scan loop failed; camera lost"),
    }
    info!(present = self.present.len(), "scan session stopped");
  }
}

impl<S, I, C, D> Drop for ScanSession<S, I, C, D> {
  fn drop(&mut self) {
    if let Some(stop) = self.running.as_mut().and_then(|r| r.stop.take()) {
      stop.send(()).ok();
    }
  }
}

async fn frame_loop<S, I, C, D>(
  gate: ScanGate<S, I>,
  mut sampler: FrameSampler<C>,
  decoder: Arc<D>,
  events: mpsc::UnboundedSender<ScanEvent>,
  state: watch::Sender<ScanState>,
  mut stop: oneshot::Receiver<()>,
) -> C
where
  S: AttendanceStore + 'static,
  I: IdentityProvider + 'static,
  C: Camera,
  D: Decoder,
{
  loop {
    let frame = tokio::select! {
      biased;
      _ = &mut stop => break,
      frame = sampler.next_frame() => frame,
    };
    let Some(frame) = frame else {
      events.send(ScanEvent::CaptureEnded).ok();
      break;
    };

    if gate.in_cooldown() {
      state.send_replace(ScanState::Cooldown);
      continue;
    }
    state.send_replace(ScanState::Scanning);

    // Decoding is CPU-bound; keep it off the async workers.
    let decoding = {
      let decoder = Arc::clone(&decoder);
      tokio::task::spawn_blocking(move || decoder.decode(&frame))
    };
    let decoded = tokio::select! {
      biased;
      _ = &mut stop => break,
      decoded = decoding => decoded.unwrap_or_else(|e| {
        warn!(error = %e, "decoder task failed");
        None
      }),
    };
    let Some(payload) = decoded else {
      continue;
    };

    state.send_replace(ScanState::Cooldown);
    let outcome = tokio::select! {
      biased;
      _ = &mut stop => break,
      outcome = gate.submit(&payload) => outcome,
    };
    if let ScanOutcome::Marked(outcome) = outcome {
      events.send(outcome.into()).ok();
    }
  }

  sampler.stop_capture();
  state.send_replace(ScanState::NotScanning);
  sampler.into_camera()
}
