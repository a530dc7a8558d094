//! SQL schema for the rollcall SQLite store.
//!
//! Executed once at connection startup; versioned with `PRAGMA user_version`.

/// Full schema DDL; idempotent thanks to `CREATE TABLE IF NOT EXISTS`.
pub const SCHEMA: &str = "
PRAGMA journal_mode = WAL;
PRAGMA foreign_keys = ON;

CREATE TABLE IF NOT EXISTS subjects (
    name        TEXT PRIMARY KEY,
    department  TEXT NOT NULL,
    semester    TEXT NOT NULL,
    created_at  TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS users (
    user_id        TEXT PRIMARY KEY,
    display_name   TEXT NOT NULL,
    role           TEXT NOT NULL,   -- 'Admin' | 'Teacher' | 'Student'
    department     TEXT,
    semester       TEXT,
    password_hash  TEXT,            -- argon2 PHC string
    created_at     TEXT NOT NULL
);

-- Create-only. No UPDATE or DELETE is ever issued against this table.
-- The UNIQUE constraint is what makes a second writer for the same
-- student/subject/day lose instead of inserting a duplicate.
CREATE TABLE IF NOT EXISTS attendance (
    record_id   TEXT PRIMARY KEY,
    student_id  TEXT NOT NULL,
    subject     TEXT NOT NULL,
    status      TEXT NOT NULL,      -- 'Present' | 'Absent'
    date        TEXT NOT NULL,      -- YYYY-MM-DD
    created_at  TEXT NOT NULL,      -- RFC 3339 UTC, fixed-width nanos
    UNIQUE (student_id, subject, date)
);

CREATE INDEX IF NOT EXISTS users_roster_idx       ON users(role, department, semester);
CREATE INDEX IF NOT EXISTS attendance_day_idx     ON attendance(subject, date);
CREATE INDEX IF NOT EXISTS attendance_student_idx ON attendance(student_id);

PRAGMA user_version = 1;
";
