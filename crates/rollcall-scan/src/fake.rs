//! In-memory camera and decoder used by the unit tests.
//!
//! The fake camera "films" a scene: either nothing (blank frames) or a
//! payload, encoded directly into the luma bytes so [`FakeDecoder`] can read
//! it back without real QR rendering.

use std::{
  sync::{
    Arc, Mutex,
    atomic::{AtomicBool, AtomicUsize, Ordering},
  },
  thread::ThreadId,
  time::Duration,
};

use chrono::NaiveDate;
use rollcall_core::{
  engine::Attendance,
  identity::{IdentityProvider, NewUser, Role, RosterIdentity, UserDirectory},
  record::{AttendanceRecord, NewRecord},
  store::{AttendanceStore, CreateOutcome, RecordQuery},
  subject::Subject,
};
use rollcall_store_sqlite::{Error as StoreError, SqliteStore};
use tokio::sync::{Notify, watch};

use crate::{
  Error, Result,
  capture::{Camera, Facing, FrameStream},
  decode::Decoder,
  frame::Frame,
};

/// Interval between fake frames, roughly 10 fps.
pub const FRAME_INTERVAL: Duration = Duration::from_millis(100);

#[derive(Default)]
struct Shared {
  active:      AtomicUsize,
  opened:      Mutex<Vec<Facing>>,
  scene:       Mutex<Option<String>>,
  denied:      AtomicBool,
  rear_broken: AtomicBool,
  unplugged:   AtomicBool,
}

/// Clones share state, so a test keeps one clone for inspection after moving
/// the other into a sampler.
#[derive(Clone, Default)]
pub struct FakeCamera {
  shared: Arc<Shared>,
}

impl FakeCamera {
  pub fn new() -> Self { Self::default() }

  pub fn denied(self) -> Self {
    self.shared.denied.store(true, Ordering::SeqCst);
    self
  }

  pub fn rear_broken(self) -> Self {
    self.shared.rear_broken.store(true, Ordering::SeqCst);
    self
  }

  pub fn grant(&self) { self.shared.denied.store(false, Ordering::SeqCst); }

  pub fn unplug(&self) { self.shared.unplugged.store(true, Ordering::SeqCst); }

  /// Point the camera at a code carrying `payload`.
  pub fn show(&self, payload: &str) {
    *self.shared.scene.lock().unwrap() = Some(payload.to_owned());
  }

  /// Point the camera at nothing.
  pub fn blank(&self) { *self.shared.scene.lock().unwrap() = None; }

  /// Open stream handles not yet released.
  pub fn active(&self) -> usize { self.shared.active.load(Ordering::SeqCst) }

  /// Every lens requested so far, in order.
  pub fn opened(&self) -> Vec<Facing> { self.shared.opened.lock().unwrap().clone() }
}

impl Camera for FakeCamera {
  type Stream = FakeStream;

  async fn open(&mut self, facing: Facing) -> Result<FakeStream> {
    self.shared.opened.lock().unwrap().push(facing);
    tokio::task::yield_now().await;

    if self.shared.denied.load(Ordering::SeqCst) {
      return Err(Error::PermissionDenied("camera prompt dismissed".into()));
    }
    if facing == Facing::Rear && self.shared.rear_broken.load(Ordering::SeqCst) {
      return Err(Error::Hardware("rear lens not found".into()));
    }
    self.shared.unplugged.store(false, Ordering::SeqCst);
    self.shared.active.fetch_add(1, Ordering::SeqCst);
    Ok(FakeStream { shared: Arc::clone(&self.shared) })
  }
}

pub struct FakeStream {
  shared: Arc<Shared>,
}

impl FrameStream for FakeStream {
  async fn next_frame(&mut self) -> Option<Frame> {
    tokio::time::sleep(FRAME_INTERVAL).await;
    if self.shared.unplugged.load(Ordering::SeqCst) {
      return None;
    }
    let scene = self.shared.scene.lock().unwrap().clone();
    let frame = match scene {
      Some(payload) => Frame::new(payload.len(), 1, payload.into_bytes()),
      None => Frame::new(1, 1, vec![0]),
    };
    frame.ok()
  }
}

impl Drop for FakeStream {
  fn drop(&mut self) { self.shared.active.fetch_sub(1, Ordering::SeqCst); }
}

/// Reads payloads written by [`FakeCamera`] and counts calls.
#[derive(Clone, Default)]
pub struct FakeDecoder {
  calls:   Arc<AtomicUsize>,
  threads: Arc<Mutex<Vec<ThreadId>>>,
}

impl FakeDecoder {
  pub fn calls(&self) -> usize { self.calls.load(Ordering::SeqCst) }

  /// Threads that ran a decode, one entry per call.
  pub fn threads(&self) -> Vec<ThreadId> { self.threads.lock().unwrap().clone() }
}

impl Decoder for FakeDecoder {
  fn decode(&self, frame: &Frame) -> Option<String> {
    self.calls.fetch_add(1, Ordering::SeqCst);
    self.threads.lock().unwrap().push(std::thread::current().id());
    if frame.luma().iter().all(|&b| b == 0) {
      return None;
    }
    String::from_utf8(frame.luma().to_vec()).ok()
  }
}

// ─── Engine fixtures ─────────────────────────────────────────────────────────

pub fn data_structures() -> Subject {
  Subject::new("Data Structures", "Computer Science", "3rd Semester")
}

/// An in-memory store whose roster for [`data_structures`] is `s1`, `s2`,
/// `s3`.
pub async fn seeded_store() -> SqliteStore {
  let store = SqliteStore::open_in_memory().await.unwrap();
  for id in ["s1", "s2", "s3"] {
    store
      .add_user(NewUser {
        identity:      RosterIdentity {
          user_id:      id.into(),
          display_name: format!("Student {id}"),
          role:         Role::Student,
          department:   Some("Computer Science".into()),
          semester:     Some("3rd Semester".into()),
        },
        password_hash: None,
      })
      .await
      .unwrap();
  }
  store
}

fn monday() -> NaiveDate { NaiveDate::from_ymd_opt(2024, 10, 14).unwrap() }

/// An engine over [`seeded_store`], pinned to one day.
pub async fn seeded_engine() -> Attendance<SqliteStore, SqliteStore> {
  let store = Arc::new(seeded_store().await);
  Attendance::new(Arc::clone(&store), store).with_clock(monday)
}

// ─── Held store ──────────────────────────────────────────────────────────────

/// Wraps [`SqliteStore`]; while held, record creates park until
/// [`HeldStore::release`].
pub struct HeldStore {
  inner:   SqliteStore,
  held:    watch::Sender<bool>,
  entered: Notify,
}

impl HeldStore {
  pub async fn held() -> Self {
    Self {
      inner:   seeded_store().await,
      held:    watch::channel(true).0,
      entered: Notify::new(),
    }
  }

  pub fn engine(self: &Arc<Self>) -> Attendance<HeldStore, HeldStore> {
    Attendance::new(Arc::clone(self), Arc::clone(self)).with_clock(monday)
  }

  /// Resolves once a create is parked (or has passed through).
  pub async fn create_started(&self) { self.entered.notified().await }

  pub fn release(&self) { self.held.send_replace(false); }
}

impl AttendanceStore for HeldStore {
  type Error = StoreError;

  async fn add_subject(&self, subject: Subject) -> Result<Subject, StoreError> {
    self.inner.add_subject(subject).await
  }

  async fn get_subject(&self, name: &str) -> Result<Option<Subject>, StoreError> {
    self.inner.get_subject(name).await
  }

  async fn list_subjects(&self) -> Result<Vec<Subject>, StoreError> {
    self.inner.list_subjects().await
  }

  async fn find_record(
    &self,
    student_id: &str,
    subject: &str,
    date: NaiveDate,
  ) -> Result<Option<AttendanceRecord>, StoreError> {
    self.inner.find_record(student_id, subject, date).await
  }

  async fn query_records(&self, query: &RecordQuery) -> Result<Vec<AttendanceRecord>, StoreError> {
    self.inner.query_records(query).await
  }

  async fn create_record(&self, input: NewRecord) -> Result<CreateOutcome, StoreError> {
    self.entered.notify_one();
    let mut held = self.held.subscribe();
    held.wait_for(|held| !*held).await.ok();
    self.inner.create_record(input).await
  }
}

impl IdentityProvider for HeldStore {
  type Error = StoreError;

  async fn resolve_identity(&self, user_id: &str) -> Result<Option<RosterIdentity>, StoreError> {
    self.inner.resolve_identity(user_id).await
  }

  async fn roster(
    &self,
    department: &str,
    semester: &str,
  ) -> Result<Vec<RosterIdentity>, StoreError> {
    self.inner.roster(department, semester).await
  }
}
