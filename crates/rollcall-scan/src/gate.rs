//! The payload half of a scan session: cooldown, session set, engine call.
//!
//! [`ScanGate`] needs no camera, so the same semantics apply whether the
//! payload came from the local decoder or from a client over HTTP.

use std::{
  sync::{Arc, Mutex, PoisonError},
  time::Duration,
};

use rollcall_core::{
  engine::{Attendance, MarkOutcome},
  identity::IdentityProvider,
  session::SessionPresentSet,
  store::AttendanceStore,
  subject::Subject,
};
use tokio::time::Instant;
use tracing::{debug, warn};

/// Quiet period after each accepted payload.
pub const DEFAULT_COOLDOWN: Duration = Duration::from_secs(2);

/// What happened to a submitted payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScanOutcome {
  /// Arrived during cooldown; the engine was not called.
  Suppressed,
  Marked(MarkOutcome),
}

/// Applies the cooldown to payloads for one subject and marks the rest.
///
/// Cloning is cheap; clones share the cooldown and the session set.
pub struct ScanGate<S, I> {
  engine:        Attendance<S, I>,
  subject:       Subject,
  present:       SessionPresentSet,
  cooldown:      Duration,
  cooling_until: Arc<Mutex<Option<Instant>>>,
}

impl<S, I> Clone for ScanGate<S, I> {
  fn clone(&self) -> Self {
    Self {
      engine:        self.engine.clone(),
      subject:       self.subject.clone(),
      present:       self.present.clone(),
      cooldown:      self.cooldown,
      cooling_until: Arc::clone(&self.cooling_until),
    }
  }
}

impl<S, I> ScanGate<S, I>
where
  S: AttendanceStore + 'static,
  I: IdentityProvider + 'static,
{
  pub fn new(engine: Attendance<S, I>, subject: Subject) -> Self {
    Self::with_present(engine, subject, SessionPresentSet::new())
  }

  /// A gate that records into an existing session set.
  pub fn with_present(
    engine: Attendance<S, I>,
    subject: Subject,
    present: SessionPresentSet,
  ) -> Self {
    Self {
      engine,
      subject,
      present,
      cooldown: DEFAULT_COOLDOWN,
      cooling_until: Arc::new(Mutex::new(None)),
    }
  }

  pub fn with_cooldown(mut self, cooldown: Duration) -> Self {
    self.cooldown = cooldown;
    self
  }

  pub fn subject(&self) -> &Subject { &self.subject }

  pub fn present(&self) -> &SessionPresentSet { &self.present }

  pub fn cooldown(&self) -> Duration { self.cooldown }

  pub fn in_cooldown(&self) -> bool {
    self
      .cooling_until
      .lock()
      .unwrap_or_else(PoisonError::into_inner)
      .is_some_and(|until| Instant::now() < until)
  }

  /// Start a cooldown unless one is running. Returns whether this caller
  /// won the slot.
  fn try_enter_cooldown(&self) -> bool {
    let mut until = self.cooling_until.lock().unwrap_or_else(PoisonError::into_inner);
    let now = Instant::now();
    if until.is_some_and(|u| now < u) {
      return false;
    }
    *until = Some(now + self.cooldown);
    true
  }

  fn restart_cooldown(&self) {
    *self.cooling_until.lock().unwrap_or_else(PoisonError::into_inner) =
      Some(Instant::now() + self.cooldown);
  }

  /// Mark the student named by `payload`, unless a cooldown is running.
  ///
  /// The mark runs on its own task: dropping the returned future (a stopped
  /// session) does not cancel a write already in flight. The cooldown is
  /// restarted once the mark completes.
  pub async fn submit(&self, payload: &str) -> ScanOutcome {
    if !self.try_enter_cooldown() {
      debug!(subject = %self.subject.name, "payload dropped during cooldown");
      return ScanOutcome::Suppressed;
    }

    let engine     = self.engine.clone();
    let present    = self.present.clone();
    let subject    = self.subject.clone();
    let student_id = payload.trim().to_owned();

    let mark = {
      let student_id = student_id.clone();
      tokio::spawn(async move { engine.mark_present(&present, &student_id, &subject).await })
    };
    let outcome = match mark.await {
      Ok(outcome) => outcome,
      Err(e) => {
        warn!(error = %e, %student_id, "mark task failed");
        MarkOutcome::WriteFailed { student_id, reason: e.to_string() }
      }
    };

    self.restart_cooldown();
    ScanOutcome::Marked(outcome)
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::fake::{data_structures as subject, seeded_engine};

  #[tokio::test(start_paused = true)]
  async fn payloads_during_cooldown_are_suppressed() {
    let gate = ScanGate::new(seeded_engine().await, subject());

    let first = gate.submit("s1").await;
    assert!(matches!(first, ScanOutcome::Marked(MarkOutcome::Recorded { .. })));
    assert!(gate.in_cooldown());
    assert_eq!(gate.submit("s2").await, ScanOutcome::Suppressed);

    tokio::time::sleep(DEFAULT_COOLDOWN).await;
    assert!(!gate.in_cooldown());
    let second = gate.submit("s2").await;
    assert!(matches!(second, ScanOutcome::Marked(MarkOutcome::Recorded { .. })));
    assert_eq!(gate.present().len(), 2);
  }

  #[tokio::test(start_paused = true)]
  async fn clones_share_cooldown() {
    let gate = ScanGate::new(seeded_engine().await, subject())
      .with_cooldown(Duration::from_millis(500));
    let other = gate.clone();

    gate.submit("s1").await;
    assert_eq!(other.submit("s1").await, ScanOutcome::Suppressed);

    tokio::time::sleep(Duration::from_millis(500)).await;
    assert_eq!(
      other.submit(" s1 ").await,
      ScanOutcome::Marked(MarkOutcome::AlreadyMarked { student_id: "s1".into() })
    );
  }

  #[tokio::test(start_paused = true)]
  async fn unknown_payload_still_starts_cooldown() {
    let gate = ScanGate::new(seeded_engine().await, subject());
    assert_eq!(
      gate.submit("visitor-badge").await,
      ScanOutcome::Marked(MarkOutcome::StudentNotFound { student_id: "visitor-badge".into() })
    );
    assert!(gate.in_cooldown());
    assert!(gate.present().is_empty());
  }
}
