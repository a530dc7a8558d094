//! Router-level tests against an in-memory SQLite backend.

use std::{sync::Arc, time::Duration};

use argon2::{Algorithm, Argon2, Params, PasswordHasher, Version, password_hash::SaltString};
use axum::{
  Router,
  body::Body,
  http::{Request, StatusCode, header},
};
use base64::{Engine as _, engine::general_purpose::STANDARD as B64};
use chrono::NaiveDate;
use rand_core::OsRng;
use rollcall_core::{
  engine::Attendance,
  identity::{NewUser, Role, RosterIdentity, UserDirectory},
  store::AttendanceStore,
  subject::Subject,
};
use rollcall_store_sqlite::SqliteStore;
use serde_json::{Value, json};
use tower::ServiceExt as _;

use crate::{AppState, api_router};

const ADMIN: (&str, &str) = ("a1", "admin-pw");
const TEACHER: (&str, &str) = ("t1", "teacher-pw");
const OTHER_TEACHER: (&str, &str) = ("t2", "teacher-pw");
const STUDENT: (&str, &str) = ("s1", "student-pw");

/// Cheap argon2 parameters keep the suite fast; verification reads the
/// parameters back out of the PHC string.
fn quick_hash(password: &str) -> String {
  let params = Params::new(1024, 1, 1, None).unwrap();
  Argon2::new(Algorithm::Argon2id, Version::V0x13, params)
    .hash_password(password.as_bytes(), &SaltString::generate(&mut OsRng))
    .unwrap()
    .to_string()
}

fn user(id: &str, role: Role, password: Option<&str>) -> NewUser {
  let cohort = role == Role::Student;
  NewUser {
    identity:      RosterIdentity {
      user_id:      id.into(),
      display_name: format!("User {id}"),
      role,
      department:   cohort.then(|| "Computer Science".into()),
      semester:     cohort.then(|| "3rd Semester".into()),
    },
    password_hash: password.map(quick_hash),
  }
}

async fn seeded_state() -> AppState<SqliteStore> {
  let store = Arc::new(SqliteStore::open_in_memory().await.unwrap());
  store
    .add_subject(Subject::new("Data Structures", "Computer Science", "3rd Semester"))
    .await
    .unwrap();
  store.add_user(user(ADMIN.0, Role::Admin, Some(ADMIN.1))).await.unwrap();
  store.add_user(user(TEACHER.0, Role::Teacher, Some(TEACHER.1))).await.unwrap();
  store
    .add_user(user(OTHER_TEACHER.0, Role::Teacher, Some(OTHER_TEACHER.1)))
    .await
    .unwrap();
  store.add_user(user(STUDENT.0, Role::Student, Some(STUDENT.1))).await.unwrap();
  store.add_user(user("s2", Role::Student, None)).await.unwrap();
  store.add_user(user("s3", Role::Student, None)).await.unwrap();

  let today = NaiveDate::from_ymd_opt(2024, 10, 14).unwrap();
  AppState::with_attendance(Attendance::new(Arc::clone(&store), store).with_clock(move || today))
}

async fn app() -> Router { api_router(seeded_state().await) }

async fn call(
  app: &Router,
  method: &str,
  uri: &str,
  auth: Option<(&str, &str)>,
  body: Option<Value>,
) -> (StatusCode, Value) {
  let mut builder = Request::builder().method(method).uri(uri);
  if let Some((user, pass)) = auth {
    builder = builder.header(
      header::AUTHORIZATION,
      format!("Basic {}", B64.encode(format!("{user}:{pass}"))),
    );
  }
  let req = match body {
    Some(body) => builder
      .header(header::CONTENT_TYPE, "application/json")
      .body(Body::from(body.to_string()))
      .unwrap(),
    None => builder.body(Body::empty()).unwrap(),
  };

  let resp = app.clone().oneshot(req).await.unwrap();
  let status = resp.status();
  let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX).await.unwrap();
  let json = if bytes.is_empty() { Value::Null } else { serde_json::from_slice(&bytes).unwrap() };
  (status, json)
}

// ─── Authentication ──────────────────────────────────────────────────────────

#[tokio::test]
async fn missing_credentials_are_challenged() {
  let app = app().await;
  let req = Request::builder().uri("/subjects").body(Body::empty()).unwrap();
  let resp = app.oneshot(req).await.unwrap();

  assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
  let challenge = resp.headers().get(header::WWW_AUTHENTICATE).unwrap();
  assert!(challenge.to_str().unwrap().starts_with("Basic"));
}

#[tokio::test]
async fn wrong_password_and_passwordless_users_are_rejected() {
  let app = app().await;
  let (status, body) = call(&app, "GET", "/subjects", Some((TEACHER.0, "nope")), None).await;
  assert_eq!(status, StatusCode::UNAUTHORIZED);
  assert_eq!(body["error"], "unauthorized");

  let (status, _) = call(&app, "GET", "/subjects", Some(("s2", "")), None).await;
  assert_eq!(status, StatusCode::UNAUTHORIZED);
}

// ─── Subjects ────────────────────────────────────────────────────────────────

#[tokio::test]
async fn any_user_lists_subjects() {
  let app = app().await;
  let (status, body) = call(&app, "GET", "/subjects", Some(STUDENT), None).await;
  assert_eq!(status, StatusCode::OK);
  assert_eq!(body.as_array().unwrap().len(), 1);
  assert_eq!(body[0]["name"], "Data Structures");
}

#[tokio::test]
async fn only_admins_create_subjects() {
  let app = app().await;
  let os = json!({
    "name": "Operating Systems",
    "department": "Computer Science",
    "semester": "3rd Semester"
  });

  let (status, _) = call(&app, "POST", "/subjects", Some(TEACHER), Some(os.clone())).await;
  assert_eq!(status, StatusCode::FORBIDDEN);

  let (status, body) = call(&app, "POST", "/subjects", Some(ADMIN), Some(os.clone())).await;
  assert_eq!(status, StatusCode::CREATED);
  assert_eq!(body["name"], "Operating Systems");

  let (status, _) = call(&app, "POST", "/subjects", Some(ADMIN), Some(os)).await;
  assert_eq!(status, StatusCode::CONFLICT);

  let blank = json!({ "name": " ", "department": "CS", "semester": "1st" });
  let (status, _) = call(&app, "POST", "/subjects", Some(ADMIN), Some(blank)).await;
  assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn racing_creates_conflict_instead_of_failing() {
  let app = app().await;
  let compilers = json!({
    "name": "Compilers",
    "department": "Computer Science",
    "semester": "5th Semester"
  });
  let dana = json!({ "userId": "s9", "displayName": "Dana", "role": "Admin" });

  let (first, second, third, fourth) = tokio::join!(
    call(&app, "POST", "/subjects", Some(ADMIN), Some(compilers.clone())),
    call(&app, "POST", "/subjects", Some(ADMIN), Some(compilers)),
    call(&app, "POST", "/users", Some(ADMIN), Some(dana.clone())),
    call(&app, "POST", "/users", Some(ADMIN), Some(dana)),
  );

  let mut subjects = [first.0.as_u16(), second.0.as_u16()];
  subjects.sort_unstable();
  assert_eq!(subjects, [201, 409]);

  let mut users = [third.0.as_u16(), fourth.0.as_u16()];
  users.sort_unstable();
  assert_eq!(users, [201, 409]);
}

#[tokio::test]
async fn roster_lists_matching_students() {
  let app = app().await;
  let (status, body) = call(
    &app,
    "GET",
    "/subjects/Data%20Structures/roster",
    Some(TEACHER),
    None,
  )
  .await;
  assert_eq!(status, StatusCode::OK);
  let ids: Vec<_> = body.as_array().unwrap().iter().map(|u| u["userId"].clone()).collect();
  assert_eq!(ids, [json!("s1"), json!("s2"), json!("s3")]);

  let (status, _) = call(&app, "GET", "/subjects/Compilers/roster", Some(TEACHER), None).await;
  assert_eq!(status, StatusCode::NOT_FOUND);

  let (status, _) = call(
    &app,
    "GET",
    "/subjects/Data%20Structures/roster",
    Some(STUDENT),
    None,
  )
  .await;
  assert_eq!(status, StatusCode::FORBIDDEN);
}

// ─── Users ───────────────────────────────────────────────────────────────────

#[tokio::test]
async fn admin_creates_users_who_can_log_in() {
  let app = app().await;

  let no_cohort = json!({ "userId": "s9", "displayName": "New", "role": "Student" });
  let (status, _) = call(&app, "POST", "/users", Some(ADMIN), Some(no_cohort)).await;
  assert_eq!(status, StatusCode::BAD_REQUEST);

  let teacher = json!({
    "userId": "t9",
    "displayName": "Dr. Rao",
    "role": "Teacher",
    "password": "fresh-pw"
  });
  let (status, _) = call(&app, "POST", "/users", Some(TEACHER), Some(teacher.clone())).await;
  assert_eq!(status, StatusCode::FORBIDDEN);

  let (status, body) = call(&app, "POST", "/users", Some(ADMIN), Some(teacher.clone())).await;
  assert_eq!(status, StatusCode::CREATED);
  assert_eq!(body["role"], "Teacher");
  assert!(body.get("password").is_none());

  let (status, _) = call(&app, "POST", "/users", Some(ADMIN), Some(teacher)).await;
  assert_eq!(status, StatusCode::CONFLICT);

  let (status, _) = call(&app, "GET", "/subjects", Some(("t9", "fresh-pw")), None).await;
  assert_eq!(status, StatusCode::OK);
}

// ─── Scan sessions ───────────────────────────────────────────────────────────

async fn open_session(app: &Router, who: (&str, &str)) -> String {
  let (status, body) = call(
    app,
    "POST",
    "/sessions",
    Some(who),
    Some(json!({ "subject": "Data Structures" })),
  )
  .await;
  assert_eq!(status, StatusCode::CREATED);
  body["id"].as_str().unwrap().to_owned()
}

#[tokio::test]
async fn session_scan_sweep_and_close() {
  let app = app().await;
  let id = open_session(&app, TEACHER).await;
  let scan = format!("/sessions/{id}/scan");

  let (status, body) =
    call(&app, "POST", &scan, Some(TEACHER), Some(json!({ "payload": "s1" }))).await;
  assert_eq!(status, StatusCode::OK);
  assert_eq!(body["result"], "marked");
  assert_eq!(body["outcome"]["outcome"], "recorded");
  assert_eq!(body["outcome"]["displayName"], "User s1");

  // Inside the cooldown the payload never reaches the engine.
  let (_, body) = call(&app, "POST", &scan, Some(TEACHER), Some(json!({ "payload": "s1" }))).await;
  assert_eq!(body["result"], "suppressed");

  let (status, body) = call(&app, "GET", &format!("/sessions/{id}"), Some(TEACHER), None).await;
  assert_eq!(status, StatusCode::OK);
  assert_eq!(body["present"].as_array().unwrap().len(), 1);
  assert_eq!(body["present"][0]["studentId"], "s1");

  let (status, body) = call(
    &app,
    "POST",
    &format!("/subjects/Data%20Structures/sweep?session={id}"),
    Some(TEACHER),
    None,
  )
  .await;
  assert_eq!(status, StatusCode::OK);
  assert_eq!(body["markedAbsent"], json!(["s2", "s3"]));

  let (status, body) = call(
    &app,
    "GET",
    "/attendance?subject=Data%20Structures&date=2024-10-14",
    Some(TEACHER),
    None,
  )
  .await;
  assert_eq!(status, StatusCode::OK);
  // The two absentee writes race each other, so compare by student.
  let mut statuses: Vec<_> = body
    .as_array()
    .unwrap()
    .iter()
    .map(|r| (r["studentId"].clone(), r["status"].clone()))
    .collect();
  statuses.sort_by_key(|(id, _)| id.to_string());
  assert_eq!(statuses, [
    (json!("s1"), json!("Present")),
    (json!("s2"), json!("Absent")),
    (json!("s3"), json!("Absent")),
  ]);

  let (status, body) = call(&app, "DELETE", &format!("/sessions/{id}"), Some(TEACHER), None).await;
  assert_eq!(status, StatusCode::OK);
  assert_eq!(body["present"].as_array().unwrap().len(), 1);

  let (status, _) = call(&app, "GET", &format!("/sessions/{id}"), Some(TEACHER), None).await;
  assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn sessions_belong_to_their_owner() {
  let app = app().await;
  let id = open_session(&app, TEACHER).await;

  let (status, _) = call(&app, "GET", &format!("/sessions/{id}"), Some(OTHER_TEACHER), None).await;
  assert_eq!(status, StatusCode::FORBIDDEN);

  let (status, _) = call(
    &app,
    "POST",
    &format!("/sessions/{id}/scan"),
    Some(OTHER_TEACHER),
    Some(json!({ "payload": "s1" })),
  )
  .await;
  assert_eq!(status, StatusCode::FORBIDDEN);

  let (status, _) = call(&app, "DELETE", &format!("/sessions/{id}"), Some(OTHER_TEACHER), None).await;
  assert_eq!(status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn students_cannot_open_sessions() {
  let app = app().await;
  let (status, _) = call(
    &app,
    "POST",
    "/sessions",
    Some(STUDENT),
    Some(json!({ "subject": "Data Structures" })),
  )
  .await;
  assert_eq!(status, StatusCode::FORBIDDEN);

  let (status, _) = call(
    &app,
    "POST",
    "/sessions",
    Some(TEACHER),
    Some(json!({ "subject": "Compilers" })),
  )
  .await;
  assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn unknown_and_blank_payloads() {
  let app = api_router(seeded_state().await.with_cooldown(Duration::ZERO));
  let id = open_session(&app, TEACHER).await;
  let scan = format!("/sessions/{id}/scan");

  let (status, _) = call(&app, "POST", &scan, Some(TEACHER), Some(json!({ "payload": "  " }))).await;
  assert_eq!(status, StatusCode::BAD_REQUEST);

  let (_, body) =
    call(&app, "POST", &scan, Some(TEACHER), Some(json!({ "payload": "visitor-7" }))).await;
  assert_eq!(body["outcome"]["outcome"], "student_not_found");
  assert_eq!(body["outcome"]["studentId"], "visitor-7");

  // Staff codes never mark attendance.
  let (_, body) = call(&app, "POST", &scan, Some(TEACHER), Some(json!({ "payload": "t2" }))).await;
  assert_eq!(body["outcome"]["outcome"], "student_not_found");
}

#[tokio::test]
async fn idle_sessions_expire() {
  let state = seeded_state().await.with_session_idle(Duration::ZERO);
  let app = api_router(state.clone());
  let id = open_session(&app, TEACHER).await;

  let (status, _) = call(&app, "GET", &format!("/sessions/{id}"), Some(TEACHER), None).await;
  assert_eq!(status, StatusCode::NOT_FOUND);
  assert!(state.sessions.is_empty());

  // Opening a session reclaims abandoned ones.
  open_session(&app, TEACHER).await;
  open_session(&app, TEACHER).await;
  assert_eq!(state.sessions.len(), 1);
}

#[tokio::test]
async fn sessions_end_with_their_day() {
  let clock = Arc::new(std::sync::Mutex::new(NaiveDate::from_ymd_opt(2024, 10, 14).unwrap()));
  let seeded = seeded_state().await;
  let attendance = seeded.attendance.clone().with_clock({
    let clock = Arc::clone(&clock);
    move || *clock.lock().unwrap()
  });
  let state = AppState::with_attendance(attendance).with_cooldown(Duration::ZERO);
  let app = api_router(state.clone());

  let id = open_session(&app, TEACHER).await;
  let scan = format!("/sessions/{id}/scan");
  let (_, body) = call(&app, "POST", &scan, Some(TEACHER), Some(json!({ "payload": "s1" }))).await;
  assert_eq!(body["outcome"]["outcome"], "recorded");

  *clock.lock().unwrap() = NaiveDate::from_ymd_opt(2024, 10, 15).unwrap();

  let (status, _) = call(&app, "POST", &scan, Some(TEACHER), Some(json!({ "payload": "s1" }))).await;
  assert_eq!(status, StatusCode::NOT_FOUND);
  let (status, _) = call(
    &app,
    "POST",
    &format!("/subjects/Data%20Structures/sweep?session={id}"),
    Some(TEACHER),
    None,
  )
  .await;
  assert_eq!(status, StatusCode::NOT_FOUND);

  // A fresh session on the new day records s1 again.
  let id = open_session(&app, TEACHER).await;
  let (_, body) = call(
    &app,
    "POST",
    &format!("/sessions/{id}/scan"),
    Some(TEACHER),
    Some(json!({ "payload": "s1" })),
  )
  .await;
  assert_eq!(body["outcome"]["outcome"], "recorded");
  assert_eq!(body["outcome"]["record"]["date"], "2024-10-15");
  assert_eq!(state.sessions.len(), 1);
}

#[tokio::test]
async fn sweep_only_trusts_the_callers_session() {
  let app = app().await;
  let id = open_session(&app, TEACHER).await;

  let (status, _) = call(
    &app,
    "POST",
    &format!("/subjects/Data%20Structures/sweep?session={id}"),
    Some(OTHER_TEACHER),
    None,
  )
  .await;
  assert_eq!(status, StatusCode::FORBIDDEN);

  let (_, body) = call(&app, "GET", "/attendance/summary", Some(ADMIN), None).await;
  assert_eq!(body, json!([]));
}

// ─── Reads ───────────────────────────────────────────────────────────────────

#[tokio::test]
async fn student_history_is_private() {
  let app = api_router(seeded_state().await.with_cooldown(Duration::ZERO));
  let id = open_session(&app, TEACHER).await;
  for payload in ["s1", "s2"] {
    call(
      &app,
      "POST",
      &format!("/sessions/{id}/scan"),
      Some(TEACHER),
      Some(json!({ "payload": payload })),
    )
    .await;
  }

  let (status, body) = call(&app, "GET", "/students/s1/attendance", Some(STUDENT), None).await;
  assert_eq!(status, StatusCode::OK);
  assert_eq!(body.as_array().unwrap().len(), 1);
  assert_eq!(body[0]["date"], "2024-10-14");

  let (status, _) = call(&app, "GET", "/students/s2/attendance", Some(STUDENT), None).await;
  assert_eq!(status, StatusCode::FORBIDDEN);

  let (status, body) = call(&app, "GET", "/students/s2/attendance", Some(TEACHER), None).await;
  assert_eq!(status, StatusCode::OK);
  assert_eq!(body[0]["status"], "Present");
}

#[tokio::test]
async fn summary_is_admin_only() {
  let app = app().await;
  call(&app, "POST", "/subjects/Data%20Structures/sweep", Some(TEACHER), None).await;

  let (status, _) = call(&app, "GET", "/attendance/summary?date=2024-10-14", Some(TEACHER), None).await;
  assert_eq!(status, StatusCode::FORBIDDEN);

  let (status, body) =
    call(&app, "GET", "/attendance/summary?date=2024-10-14", Some(ADMIN), None).await;
  assert_eq!(status, StatusCode::OK);
  assert_eq!(body, json!([{ "subject": "Data Structures", "present": 0, "absent": 3 }]));

  // Default date is today.
  let (_, today) = call(&app, "GET", "/attendance/summary", Some(ADMIN), None).await;
  assert_eq!(today, body);
}
