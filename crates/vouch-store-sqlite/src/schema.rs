//! SQL schema for the vouch SQLite store.
//!
//! Executed once at connection startup via `PRAGMA user_version`. Future
//! migrations will be gated on that version number.

/// Full schema DDL; idempotent thanks to `CREATE TABLE IF NOT EXISTS`.
pub const SCHEMA: &str = "
PRAGMA journal_mode = WAL;
PRAGMA foreign_keys = ON;

CREATE TABLE IF NOT EXISTS subjects (
    subject_id  TEXT PRIMARY KEY,
    username    TEXT NOT NULL UNIQUE,
    created_at  TEXT NOT NULL
);

-- Attestations are append-mostly. The only delete ever issued is the
-- supersede case: a resubmission matching the key
-- (attester_id, subject_id, event_id, attestation_type, skill_name)
-- replaces the prior record.
CREATE TABLE IF NOT EXISTS attestations (
    attestation_id   TEXT PRIMARY KEY,
    subject_id       TEXT NOT NULL REFERENCES subjects(subject_id),
    attester_id      TEXT NOT NULL REFERENCES subjects(subject_id),
    attestation_type TEXT NOT NULL,   -- 'skill' | 'work_ethic'
    skill_name       TEXT,            -- NULL for work_ethic
    value_json       TEXT NOT NULL,   -- JSON payload (inner data only)
    comments         TEXT,
    event_id         TEXT,
    recorded_at      TEXT NOT NULL,   -- ISO 8601 UTC; server-assigned
    CHECK (attester_id != subject_id)
);

-- Derived projection: running rating statistics per (subject, skill).
-- Rebuildable from the attestations table; never a source of truth.
CREATE TABLE IF NOT EXISTS skill_index (
    subject_id   TEXT NOT NULL REFERENCES subjects(subject_id),
    skill_name   TEXT NOT NULL,
    rating_count INTEGER NOT NULL,
    rating_sum   INTEGER NOT NULL,
    PRIMARY KEY (subject_id, skill_name)
);

-- Derived projection: last computed trust score per subject.
CREATE TABLE IF NOT EXISTS trust_scores (
    subject_id  TEXT PRIMARY KEY REFERENCES subjects(subject_id),
    score       REAL NOT NULL,
    computed_at TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS attestations_subject_idx  ON attestations(subject_id);
CREATE INDEX IF NOT EXISTS attestations_attester_idx ON attestations(attester_id);
CREATE INDEX IF NOT EXISTS skill_index_skill_idx     ON skill_index(skill_name);

PRAGMA user_version = 1;
";
