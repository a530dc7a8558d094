//! `rollcall`: command-line client for the rollcall server.
//!
//! # Usage
//!
//! ```text
//! rollcall --url http://localhost:8080 --user t1 --password secret subjects
//! rollcall start "Data Structures"
//! rollcall scan <session>            # one payload per line on stdin
//! rollcall scan <session> s1         # a single payload
//! rollcall stop <session>
//! rollcall sweep "Data Structures" --session <session>
//! ```
//!
//! Without a payload argument `scan` reads lines from stdin, which suits
//! handheld scanners that type each decoded code followed by Enter.

mod client;

use std::io::BufRead;

use anyhow::{Context, Result};
use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use client::{ApiClient, ApiConfig, ScanResponse, SessionView};
use rollcall_core::{engine::MarkOutcome, record::AttendanceRecord};
use serde::Deserialize;
use tracing::level_filters::LevelFilter;
use tracing_subscriber::EnvFilter;
use uuid::Uuid;

// ─── CLI args ─────────────────────────────────────────────────────────────────

#[derive(Parser, Debug)]
#[command(name = "rollcall", about = "Command-line client for rollcall attendance")]
struct Args {
  /// Path to a TOML config file (url, username, password).
  #[arg(short, long, value_name = "FILE")]
  config: Option<std::path::PathBuf>,

  /// Base URL of the rollcall server (default: http://localhost:8080).
  #[arg(long, env = "ROLLCALL_URL")]
  url: Option<String>,

  /// User id to authenticate as.
  #[arg(long, env = "ROLLCALL_USER")]
  user: Option<String>,

  /// Password (plaintext).
  #[arg(long, env = "ROLLCALL_PASSWORD")]
  password: Option<String>,

  #[command(subcommand)]
  command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
  /// List subjects.
  Subjects,
  /// Open a scan session for a subject.
  Start { subject: String },
  /// Submit a scanned payload, or read payloads line by line from stdin.
  Scan {
    session: Uuid,
    payload: Option<String>,
  },
  /// Close a scan session and print who was marked present.
  Stop { session: Uuid },
  /// Mark every unrecorded roster member absent for today.
  Sweep {
    subject: String,
    /// Session whose marks count as accounted for.
    #[arg(long)]
    session: Option<Uuid>,
  },
  /// Show the records for a subject on one day.
  Today {
    subject: String,
    /// Day to show (default: today on the server).
    #[arg(long, value_name = "YYYY-MM-DD")]
    date: Option<NaiveDate>,
  },
  /// Show one student's attendance history.
  History { student: String },
}

// ─── Config file ──────────────────────────────────────────────────────────────

/// Shape of the optional TOML config file.
#[derive(Deserialize, Default)]
struct ConfigFile {
  #[serde(default)]
  url:      String,
  #[serde(default)]
  username: String,
  #[serde(default)]
  password: String,
}

// ─── Entry point ──────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> Result<()> {
  tracing_subscriber::fmt()
    .with_writer(std::io::stderr)
    .with_env_filter(
      EnvFilter::builder()
        .with_default_directive(LevelFilter::WARN.into())
        .from_env_lossy(),
    )
    .init();

  let args = Args::parse();

  let file_cfg: ConfigFile = if let Some(path) = &args.config {
    let raw = std::fs::read_to_string(path)
      .with_context(|| format!("reading config file {}", path.display()))?;
    toml::from_str(&raw).context("parsing config file")?
  } else {
    ConfigFile::default()
  };

  // CLI flags override config file, which overrides defaults.
  let api_config = ApiConfig {
    base_url: args
      .url
      .or_else(|| (!file_cfg.url.is_empty()).then(|| file_cfg.url.clone()))
      .unwrap_or_else(|| "http://localhost:8080".to_string()),
    username: args
      .user
      .or_else(|| (!file_cfg.username.is_empty()).then(|| file_cfg.username.clone()))
      .unwrap_or_default(),
    password: args
      .password
      .or_else(|| (!file_cfg.password.is_empty()).then(|| file_cfg.password.clone()))
      .unwrap_or_default(),
  };

  let client = ApiClient::new(api_config)?;
  run(&client, args.command).await
}

async fn run(client: &ApiClient, command: Command) -> Result<()> {
  match command {
    Command::Subjects => {
      for subject in client.list_subjects().await? {
        println!("{}\t{}\t{}", subject.name, subject.department, subject.semester);
      }
    }
    Command::Start { subject } => {
      let view = client.start_session(&subject).await?;
      println!("{}", view.id);
      eprintln!(
        "session open for {} ({} / {}), cooldown {}ms",
        view.subject.name, view.subject.department, view.subject.semester, view.cooldown_ms
      );
    }
    Command::Scan { session, payload: Some(payload) } => {
      let response = client.scan(session, &payload).await?;
      println!("{}", describe_scan(&response));
    }
    Command::Scan { session, payload: None } => {
      let stdin = std::io::stdin();
      for line in stdin.lock().lines() {
        let line = line.context("reading stdin")?;
        let payload = line.trim();
        if payload.is_empty() {
          continue;
        }
        match client.scan(session, payload).await {
          Ok(response) => println!("{}", describe_scan(&response)),
          Err(e) => eprintln!("{payload}: {e:#}"),
        }
      }
    }
    Command::Stop { session } => {
      let view = client.stop_session(session).await?;
      print_present(&view);
    }
    Command::Sweep { subject, session } => {
      let report = client.sweep(&subject, session).await?;
      println!(
        "{}: marked {} of {} absent on {}",
        report.subject,
        report.count(),
        report.roster_size,
        report.date
      );
      for student_id in &report.marked_absent {
        println!("  {student_id}");
      }
    }
    Command::Today { subject, date } => {
      print_records(&client.attendance_for_day(&subject, date).await?);
    }
    Command::History { student } => {
      print_records(&client.student_history(&student).await?);
    }
  }
  Ok(())
}

// ─── Output ───────────────────────────────────────────────────────────────────

fn describe_scan(response: &ScanResponse) -> String {
  match response {
    ScanResponse::Suppressed => "cooling down, scan ignored".to_string(),
    ScanResponse::Marked { outcome } => match outcome {
      MarkOutcome::Recorded { record, display_name } => {
        format!("{display_name} ({}) marked present", record.student_id)
      }
      MarkOutcome::AlreadyMarked { student_id } => {
        format!("{student_id} is already marked for today")
      }
      MarkOutcome::StudentNotFound { student_id } => {
        format!("{student_id}: no such student")
      }
      MarkOutcome::WriteFailed { student_id, reason } => {
        format!("{student_id}: could not record attendance ({reason})")
      }
    },
  }
}

fn print_present(view: &SessionView) {
  println!(
    "{}: {} present (opened by {} at {})",
    view.subject.name,
    view.present.len(),
    view.owner,
    view.started_at.format("%Y-%m-%d %H:%M")
  );
  for entry in &view.present {
    println!(
      "  {}\t{}\t{}",
      entry.captured_at.format("%H:%M:%S"),
      entry.student_id,
      entry.display_name
    );
  }
}

fn print_records(records: &[AttendanceRecord]) {
  for record in records {
    println!("{}\t{}\t{}\t{}", record.date, record.subject, record.student_id, record.status);
  }
}
