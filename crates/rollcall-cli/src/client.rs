//! Async HTTP client wrapping the rollcall JSON API.

use std::time::Duration;

use anyhow::{Context, Result, anyhow};
use chrono::{DateTime, NaiveDate, Utc};
use reqwest::{Client, Response};
use rollcall_core::{
  engine::{MarkOutcome, SweepReport},
  record::AttendanceRecord,
  session::PresentEntry,
  subject::Subject,
};
use serde::{Deserialize, de::DeserializeOwned};
use serde_json::json;
use tracing::debug;
use uuid::Uuid;

/// Connection settings for the rollcall API.
#[derive(Debug, Clone)]
pub struct ApiConfig {
  pub base_url: String,
  pub username: String,
  pub password: String,
}

/// A live scan session as reported by the server.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionView {
  pub id:          Uuid,
  pub subject:     Subject,
  pub owner:       String,
  pub started_at:  DateTime<Utc>,
  pub cooldown_ms: u64,
  pub present:     Vec<PresentEntry>,
}

/// Server reply to a submitted payload.
#[derive(Debug, Deserialize)]
#[serde(tag = "result", rename_all = "snake_case")]
pub enum ScanResponse {
  Suppressed,
  Marked { outcome: MarkOutcome },
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
  error: String,
}

/// Async HTTP client for the rollcall JSON REST API.
///
/// Cheap to clone; the inner [`reqwest::Client`] is `Arc`-based.
#[derive(Clone)]
pub struct ApiClient {
  client: Client,
  config: ApiConfig,
}

impl ApiClient {
  pub fn new(config: ApiConfig) -> Result<Self> {
    let client = Client::builder()
      .timeout(Duration::from_secs(30))
      .build()
      .context("failed to build HTTP client")?;
    Ok(Self { client, config })
  }

  fn url(&self, path: &str) -> String {
    format!("{}/api{}", self.config.base_url.trim_end_matches('/'), path)
  }

  fn auth(&self, req: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
    if self.config.username.is_empty() {
      req
    } else {
      req.basic_auth(&self.config.username, Some(&self.config.password))
    }
  }

  /// Turn a non-success response into an error carrying the server's
  /// message, otherwise deserialise the body.
  async fn read<T: DeserializeOwned>(resp: Response, what: &str) -> Result<T> {
    let status = resp.status();
    if !status.is_success() {
      let message = resp
        .json::<ErrorBody>()
        .await
        .map(|body| body.error)
        .unwrap_or_default();
      return Err(anyhow!("{what} → {status} {message}"));
    }
    resp
      .json()
      .await
      .with_context(|| format!("deserialising response to {what}"))
  }

  // ── Subjects ──────────────────────────────────────────────────────────────

  /// `GET /api/subjects`
  pub async fn list_subjects(&self) -> Result<Vec<Subject>> {
    let resp = self
      .auth(self.client.get(self.url("/subjects")))
      .send()
      .await
      .context("GET /subjects failed")?;
    Self::read(resp, "GET /subjects").await
  }

  /// `POST /api/subjects/{name}/sweep[?session=<id>]`
  pub async fn sweep(&self, subject: &str, session: Option<Uuid>) -> Result<SweepReport> {
    let mut req = self.client.post(self.url(&format!("/subjects/{subject}/sweep")));
    if let Some(id) = session {
      req = req.query(&[("session", id.to_string())]);
    }
    let resp = self
      .auth(req)
      .send()
      .await
      .context("POST /subjects/{name}/sweep failed")?;
    Self::read(resp, "POST /subjects/{name}/sweep").await
  }

  // ── Sessions ──────────────────────────────────────────────────────────────

  /// `POST /api/sessions`
  pub async fn start_session(&self, subject: &str) -> Result<SessionView> {
    let resp = self
      .auth(self.client.post(self.url("/sessions")))
      .json(&json!({ "subject": subject }))
      .send()
      .await
      .context("POST /sessions failed")?;
    Self::read(resp, "POST /sessions").await
  }

  /// `POST /api/sessions/{id}/scan`
  pub async fn scan(&self, session: Uuid, payload: &str) -> Result<ScanResponse> {
    debug!(%session, payload, "submitting scan");
    let resp = self
      .auth(self.client.post(self.url(&format!("/sessions/{session}/scan"))))
      .json(&json!({ "payload": payload }))
      .send()
      .await
      .context("POST /sessions/{id}/scan failed")?;
    Self::read(resp, "POST /sessions/{id}/scan").await
  }

  /// `DELETE /api/sessions/{id}`
  pub async fn stop_session(&self, session: Uuid) -> Result<SessionView> {
    let resp = self
      .auth(self.client.delete(self.url(&format!("/sessions/{session}"))))
      .send()
      .await
      .context("DELETE /sessions/{id} failed")?;
    Self::read(resp, "DELETE /sessions/{id}").await
  }

  // ── Attendance ────────────────────────────────────────────────────────────

  /// `GET /api/attendance?subject=<name>[&date=<date>]`
  pub async fn attendance_for_day(
    &self,
    subject: &str,
    date: Option<NaiveDate>,
  ) -> Result<Vec<AttendanceRecord>> {
    let mut query = vec![("subject", subject.to_owned())];
    if let Some(date) = date {
      query.push(("date", date.to_string()));
    }
    let resp = self
      .auth(self.client.get(self.url("/attendance")))
      .query(&query)
      .send()
      .await
      .context("GET /attendance failed")?;
    Self::read(resp, "GET /attendance").await
  }

  /// `GET /api/students/{id}/attendance`
  pub async fn student_history(&self, student_id: &str) -> Result<Vec<AttendanceRecord>> {
    let resp = self
      .auth(self.client.get(self.url(&format!("/students/{student_id}/attendance"))))
      .send()
      .await
      .context("GET /students/{id}/attendance failed")?;
    Self::read(resp, "GET /students/{id}/attendance").await
  }
}
