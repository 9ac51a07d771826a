//! [`SqliteStore`] — the SQLite implementation of [`AttestationStore`].

use std::{collections::HashMap, path::Path, time::Duration};

use chrono::Utc;
use rusqlite::OptionalExtension as _;
use uuid::Uuid;

use vouch_core::{
  attestation::{Attestation, AttestationValue, NewAttestation},
  score::{self, ScorePolicy},
  store::AttestationStore,
  subject::Subject,
};

use crate::{
  encode::{RawAttestation, RawSubject, encode_dt, encode_uuid},
  schema::SCHEMA,
  Error, Result,
};

/// Recompute attempts before surfacing [`Error::EngineUnavailable`].
const RECOMPUTE_ATTEMPTS: u32 = 3;

/// Base delay between recompute attempts; grows linearly per attempt.
const RECOMPUTE_BACKOFF: Duration = Duration::from_millis(50);

// ─── Store ───────────────────────────────────────────────────────────────────

/// A vouch store backed by a single SQLite file.
///
/// Cloning is cheap — the inner connection is reference-counted. Every write
/// runs as one job on the connection's owner thread, inside one transaction
/// covering the attestation record and its skill-index effect, so a reader
/// never observes one without the other.
#[derive(Clone)]
pub struct SqliteStore {
  conn:   tokio_rusqlite::Connection,
  policy: ScorePolicy,
}

impl SqliteStore {
  /// Open (or create) a store at `path` and run schema initialisation.
  pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open(path).await?;
    let store = Self { conn, policy: ScorePolicy::default() };
    store.init_schema().await?;
    Ok(store)
  }

  /// Open an in-memory store — useful for testing.
  pub async fn open_in_memory() -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open_in_memory().await?;
    let store = Self { conn, policy: ScorePolicy::default() };
    store.init_schema().await?;
    Ok(store)
  }

  /// Replace the default scoring policy. The weighting constants are
  /// policy, not law; see [`ScorePolicy`].
  pub fn with_policy(mut self, policy: ScorePolicy) -> Self {
    self.policy = policy;
    self
  }

  async fn init_schema(&self) -> Result<()> {
    self
      .conn
      .call(|conn| {
        conn.execute_batch(SCHEMA)?;
        Ok(())
      })
      .await?;
    Ok(())
  }

  /// Run `f` on the connection's owner thread, carrying domain errors back
  /// across the channel boundary intact.
  async fn call<T, F>(&self, f: F) -> Result<T>
  where
    T: Send + 'static,
    F: FnOnce(&mut rusqlite::Connection) -> Result<T> + Send + 'static,
  {
    self
      .conn
      .call(move |conn| {
        f(conn).map_err(|e| tokio_rusqlite::Error::Other(Box::new(e)))
      })
      .await
      .map_err(|e| match e {
        tokio_rusqlite::Error::Other(inner) => match inner.downcast::<Error>() {
          Ok(own) => *own,
          Err(other) => Error::Database(tokio_rusqlite::Error::Other(other)),
        },
        other => Error::Database(other),
      })
  }

  /// Recompute and cache one subject's trust score from their current
  /// attestation set and the attesters' last stored scores.
  ///
  /// The recompute is a pure function of stored data; it cannot fail
  /// validation. Transient storage failures are retried with bounded
  /// backoff and surface as [`Error::EngineUnavailable`] once exhausted,
  /// leaving the previously cached score in place.
  pub async fn recompute_trust_score(
    &self,
    subject_id: Uuid,
  ) -> Result<Option<f64>> {
    let mut attempt = 1;
    loop {
      let policy = self.policy.clone();
      let result = self
        .call(move |conn| {
          let tx = conn.transaction()?;
          let computed = recompute_subject(&tx, &policy, subject_id)?;
          tx.commit()?;
          Ok(computed)
        })
        .await;

      match result {
        Ok(computed) => return Ok(computed),
        Err(e) if e.is_transient() && attempt < RECOMPUTE_ATTEMPTS => {
          tokio::time::sleep(RECOMPUTE_BACKOFF * attempt).await;
          attempt += 1;
        }
        Err(e) if e.is_transient() => {
          return Err(Error::EngineUnavailable(e.to_string()));
        }
        Err(e) => return Err(e),
      }
    }
  }
}

// ─── AttestationStore impl ───────────────────────────────────────────────────

impl AttestationStore for SqliteStore {
  type Error = Error;

  // ── Subjects ──────────────────────────────────────────────────────────────

  async fn add_subject(&self, username: String) -> Result<Subject> {
    let subject = Subject {
      subject_id:  Uuid::new_v4(),
      username,
      created_at:  Utc::now(),
      trust_score: None,
    };

    let id_str   = encode_uuid(subject.subject_id);
    let at_str   = encode_dt(subject.created_at);
    let name     = subject.username.clone();

    self
      .call(move |conn| {
        let taken: bool = conn
          .query_row(
            "SELECT 1 FROM subjects WHERE username = ?1",
            rusqlite::params![name],
            |_| Ok(true),
          )
          .optional()?
          .unwrap_or(false);
        if taken {
          return Err(Error::UsernameTaken(name));
        }

        conn.execute(
          "INSERT INTO subjects (subject_id, username, created_at) VALUES (?1, ?2, ?3)",
          rusqlite::params![id_str, name, at_str],
        )?;
        Ok(())
      })
      .await?;

    Ok(subject)
  }

  async fn get_subject(&self, id: Uuid) -> Result<Option<Subject>> {
    let id_str = encode_uuid(id);

    let raw: Option<RawSubject> = self
      .call(move |conn| {
        Ok(
          conn
            .query_row(
              "SELECT s.subject_id, s.username, s.created_at, t.score
               FROM subjects s
               LEFT JOIN trust_scores t ON t.subject_id = s.subject_id
               WHERE s.subject_id = ?1",
              rusqlite::params![id_str],
              |row| {
                Ok(RawSubject {
                  subject_id:  row.get(0)?,
                  username:    row.get(1)?,
                  created_at:  row.get(2)?,
                  trust_score: row.get(3)?,
                })
              },
            )
            .optional()?,
        )
      })
      .await?;

    raw.map(RawSubject::into_subject).transpose()
  }

  async fn list_subjects(&self) -> Result<Vec<Subject>> {
    let raws: Vec<RawSubject> = self
      .call(move |conn| {
        let mut stmt = conn.prepare(
          "SELECT s.subject_id, s.username, s.created_at, t.score
           FROM subjects s
           LEFT JOIN trust_scores t ON t.subject_id = s.subject_id
           ORDER BY s.username",
        )?;
        let rows = stmt
          .query_map([], |row| {
            Ok(RawSubject {
              subject_id:  row.get(0)?,
              username:    row.get(1)?,
              created_at:  row.get(2)?,
              trust_score: row.get(3)?,
            })
          })?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    raws.into_iter().map(RawSubject::into_subject).collect()
  }

  // ── Attestations ──────────────────────────────────────────────────────────

  async fn append(&self, input: NewAttestation) -> Result<Attestation> {
    input.validate().map_err(Error::Core)?;

    let record = Attestation {
      attestation_id: Uuid::new_v4(),
      subject_id:     input.subject_id,
      attester_id:    input.attester_id,
      value:          input.value,
      comments:       input.comments,
      event_id:       input.event_id,
      recorded_at:    Utc::now(),
    };

    let stored = record.clone();
    self
      .call(move |conn| {
        let tx = conn.transaction()?;
        insert_with_supersede(&tx, &record)?;
        tx.commit()?;
        Ok(())
      })
      .await?;

    // The record and its index effect are already visible atomically; the
    // subject's score follows before the append is acknowledged.
    self.recompute_trust_score(stored.subject_id).await?;

    Ok(stored)
  }

  async fn list_for(&self, subject_id: Uuid) -> Result<Vec<Attestation>> {
    let id_str = encode_uuid(subject_id);

    let raws: Vec<RawAttestation> = self
      .call(move |conn| {
        let mut stmt = conn.prepare(
          "SELECT attestation_id, subject_id, attester_id, attestation_type,
                  value_json, comments, event_id, recorded_at
           FROM attestations
           WHERE subject_id = ?1
           ORDER BY recorded_at DESC, attestation_id",
        )?;
        let rows = stmt
          .query_map(rusqlite::params![id_str], map_attestation_row)?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    raws.into_iter().map(RawAttestation::into_attestation).collect()
  }

  async fn attestation_count(&self, subject_id: Uuid) -> Result<u64> {
    let id_str = encode_uuid(subject_id);
    self
      .call(move |conn| {
        let count: i64 = conn.query_row(
          "SELECT COUNT(*) FROM attestations WHERE subject_id = ?1",
          rusqlite::params![id_str],
          |row| row.get(0),
        )?;
        Ok(count as u64)
      })
      .await
  }

  // ── Derived reads ─────────────────────────────────────────────────────────

  async fn trust_score(&self, subject_id: Uuid) -> Result<Option<f64>> {
    let id_str = encode_uuid(subject_id);
    self
      .call(move |conn| {
        Ok(
          conn
            .query_row(
              "SELECT score FROM trust_scores WHERE subject_id = ?1",
              rusqlite::params![id_str],
              |row| row.get(0),
            )
            .optional()?,
        )
      })
      .await
  }

  async fn skill_holders(&self, skill: &str) -> Result<Vec<Uuid>> {
    let skill = skill.to_owned();
    let ids: Vec<String> = self
      .call(move |conn| {
        let mut stmt = conn.prepare(
          "SELECT subject_id FROM skill_index
           WHERE skill_name = ?1
           ORDER BY subject_id",
        )?;
        let rows = stmt
          .query_map(rusqlite::params![skill], |row| row.get(0))?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    ids
      .iter()
      .map(|s| crate::encode::decode_uuid(s))
      .collect()
  }

  async fn skill_average(
    &self,
    subject_id: Uuid,
    skill:      &str,
  ) -> Result<Option<f64>> {
    let id_str = encode_uuid(subject_id);
    let skill  = skill.to_owned();
    self
      .call(move |conn| {
        let stats: Option<(i64, i64)> = conn
          .query_row(
            "SELECT rating_count, rating_sum FROM skill_index
             WHERE subject_id = ?1 AND skill_name = ?2",
            rusqlite::params![id_str, skill],
            |row| Ok((row.get(0)?, row.get(1)?)),
          )
          .optional()?;
        Ok(stats.and_then(|(count, sum)| {
          (count > 0).then(|| sum as f64 / count as f64)
        }))
      })
      .await
  }

  // ── Maintenance ───────────────────────────────────────────────────────────

  async fn rebuild_projections(&self) -> Result<()> {
    let policy = self.policy.clone();
    self
      .call(move |conn| {
        let tx = conn.transaction()?;
        rebuild_in_tx(&tx, &policy)?;
        tx.commit()?;
        Ok(())
      })
      .await
  }
}

// ─── Row mapping ─────────────────────────────────────────────────────────────

fn map_attestation_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<RawAttestation> {
  Ok(RawAttestation {
    attestation_id:   row.get(0)?,
    subject_id:       row.get(1)?,
    attester_id:      row.get(2)?,
    attestation_type: row.get(3)?,
    value_json:       row.get(4)?,
    comments:         row.get(5)?,
    event_id:         row.get(6)?,
    recorded_at:      row.get(7)?,
  })
}

// ─── Write-path helpers (run inside the owner thread) ────────────────────────

fn subject_exists(conn: &rusqlite::Connection, id_str: &str) -> Result<bool> {
  Ok(
    conn
      .query_row(
        "SELECT 1 FROM subjects WHERE subject_id = ?1",
        rusqlite::params![id_str],
        |_| Ok(true),
      )
      .optional()?
      .unwrap_or(false),
  )
}

/// Insert `record`, first retiring any prior record under the same
/// supersede key and backing its contribution out of the skill index.
fn insert_with_supersede(
  tx:     &rusqlite::Transaction<'_>,
  record: &Attestation,
) -> Result<()> {
  let subject_str  = encode_uuid(record.subject_id);
  let attester_str = encode_uuid(record.attester_id);

  if !subject_exists(tx, &subject_str)? {
    return Err(Error::SubjectNotFound(record.subject_id));
  }
  if !subject_exists(tx, &attester_str)? {
    return Err(Error::SubjectNotFound(record.attester_id));
  }

  let event_str = record.event_id.map(encode_uuid);
  let skill     = record.value.skill_name().map(str::to_owned);

  let prior: Option<(String, String)> = tx
    .query_row(
      "SELECT attestation_id, value_json FROM attestations
       WHERE attester_id = ?1 AND subject_id = ?2
         AND event_id IS ?3 AND attestation_type = ?4 AND skill_name IS ?5",
      rusqlite::params![
        attester_str,
        subject_str,
        event_str,
        record.value.discriminant(),
        skill,
      ],
      |row| Ok((row.get(0)?, row.get(1)?)),
    )
    .optional()?;

  if let Some((prior_id, prior_json)) = prior {
    tx.execute(
      "DELETE FROM attestations WHERE attestation_id = ?1",
      rusqlite::params![prior_id],
    )?;
    if let Some(skill_name) = &skill {
      let data: serde_json::Value = serde_json::from_str(&prior_json)?;
      if let AttestationValue::Skill(s) =
        AttestationValue::from_parts("skill", data).map_err(Error::Core)?
      {
        subtract_from_index(tx, &subject_str, skill_name, s.rating)?;
      }
    }
  }

  tx.execute(
    "INSERT INTO attestations (
       attestation_id, subject_id, attester_id, attestation_type,
       skill_name, value_json, comments, event_id, recorded_at
     ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
    rusqlite::params![
      encode_uuid(record.attestation_id),
      subject_str,
      attester_str,
      record.value.discriminant(),
      skill,
      record.value.to_json().map_err(Error::Core)?.to_string(),
      record.comments,
      event_str,
      encode_dt(record.recorded_at),
    ],
  )?;

  if let AttestationValue::Skill(s) = &record.value {
    add_to_index(tx, &subject_str, &s.skill_name, s.rating)?;
  }

  Ok(())
}

fn add_to_index(
  conn:        &rusqlite::Connection,
  subject_str: &str,
  skill:       &str,
  rating:      u8,
) -> Result<()> {
  conn.execute(
    "INSERT INTO skill_index (subject_id, skill_name, rating_count, rating_sum)
     VALUES (?1, ?2, 1, ?3)
     ON CONFLICT(subject_id, skill_name) DO UPDATE SET
       rating_count = rating_count + 1,
       rating_sum   = rating_sum + excluded.rating_sum",
    rusqlite::params![subject_str, skill, i64::from(rating)],
  )?;
  Ok(())
}

fn subtract_from_index(
  conn:        &rusqlite::Connection,
  subject_str: &str,
  skill:       &str,
  rating:      u8,
) -> Result<()> {
  conn.execute(
    "UPDATE skill_index
     SET rating_count = rating_count - 1, rating_sum = rating_sum - ?3
     WHERE subject_id = ?1 AND skill_name = ?2",
    rusqlite::params![subject_str, skill, i64::from(rating)],
  )?;
  // A subject with no remaining ratings for the skill leaves the bucket.
  conn.execute(
    "DELETE FROM skill_index
     WHERE subject_id = ?1 AND skill_name = ?2 AND rating_count <= 0",
    rusqlite::params![subject_str, skill],
  )?;
  Ok(())
}

// ─── Score recompute (runs inside the owner thread) ──────────────────────────

fn load_received(
  conn:        &rusqlite::Connection,
  subject_str: &str,
) -> Result<Vec<Attestation>> {
  let mut stmt = conn.prepare(
    "SELECT attestation_id, subject_id, attester_id, attestation_type,
            value_json, comments, event_id, recorded_at
     FROM attestations
     WHERE subject_id = ?1",
  )?;
  let raws = stmt
    .query_map(rusqlite::params![subject_str], map_attestation_row)?
    .collect::<rusqlite::Result<Vec<_>>>()?;
  raws.into_iter().map(RawAttestation::into_attestation).collect()
}

/// Last stored trust score per distinct attester in `received`. One hop
/// only — attesters' own scores are read as persisted, never recomputed
/// here, which is what keeps score cycles from recursing.
fn load_attester_scores(
  conn:     &rusqlite::Connection,
  received: &[Attestation],
) -> Result<HashMap<Uuid, f64>> {
  let mut scores = HashMap::new();
  for attestation in received {
    if scores.contains_key(&attestation.attester_id) {
      continue;
    }
    let stored: Option<f64> = conn
      .query_row(
        "SELECT score FROM trust_scores WHERE subject_id = ?1",
        rusqlite::params![encode_uuid(attestation.attester_id)],
        |row| row.get(0),
      )
      .optional()?;
    if let Some(score) = stored {
      scores.insert(attestation.attester_id, score);
    }
  }
  Ok(scores)
}

fn store_score(
  conn:        &rusqlite::Connection,
  subject_str: &str,
  score:       Option<f64>,
) -> Result<()> {
  match score {
    Some(value) => {
      conn.execute(
        "INSERT INTO trust_scores (subject_id, score, computed_at)
         VALUES (?1, ?2, ?3)
         ON CONFLICT(subject_id) DO UPDATE SET
           score = excluded.score, computed_at = excluded.computed_at",
        rusqlite::params![subject_str, value, encode_dt(Utc::now())],
      )?;
    }
    None => {
      conn.execute(
        "DELETE FROM trust_scores WHERE subject_id = ?1",
        rusqlite::params![subject_str],
      )?;
    }
  }
  Ok(())
}

fn recompute_subject(
  tx:         &rusqlite::Transaction<'_>,
  policy:     &ScorePolicy,
  subject_id: Uuid,
) -> Result<Option<f64>> {
  let subject_str     = encode_uuid(subject_id);
  let received        = load_received(tx, &subject_str)?;
  let attester_scores = load_attester_scores(tx, &received)?;
  let computed = score::compute_trust_score(policy, &received, &attester_scores);
  store_score(tx, &subject_str, computed)?;
  Ok(computed)
}

// ─── Projection rebuild (runs inside the owner thread) ───────────────────────

fn rebuild_in_tx(
  tx:     &rusqlite::Transaction<'_>,
  policy: &ScorePolicy,
) -> Result<()> {
  tx.execute("DELETE FROM skill_index", [])?;
  tx.execute("DELETE FROM trust_scores", [])?;

  let mut stmt = tx.prepare(
    "SELECT attestation_id, subject_id, attester_id, attestation_type,
            value_json, comments, event_id, recorded_at
     FROM attestations
     ORDER BY recorded_at, attestation_id",
  )?;
  let raws = stmt
    .query_map([], map_attestation_row)?
    .collect::<rusqlite::Result<Vec<_>>>()?;
  drop(stmt);
  let log: Vec<Attestation> = raws
    .into_iter()
    .map(RawAttestation::into_attestation)
    .collect::<Result<_>>()?;

  // Replay in recorded order. Each attestation updates the index and then
  // recomputes its subject against the scores accumulated so far, which is
  // exactly what the live append path did.
  let mut received: HashMap<Uuid, Vec<Attestation>> = HashMap::new();
  let mut index: HashMap<(Uuid, String), (i64, i64)> = HashMap::new();
  let mut scores: HashMap<Uuid, f64> = HashMap::new();

  for attestation in log {
    if let AttestationValue::Skill(s) = &attestation.value {
      let entry = index
        .entry((attestation.subject_id, s.skill_name.clone()))
        .or_insert((0, 0));
      entry.0 += 1;
      entry.1 += i64::from(s.rating);
    }

    let subject_id = attestation.subject_id;
    received.entry(subject_id).or_default().push(attestation);
    match score::compute_trust_score(policy, &received[&subject_id], &scores) {
      Some(value) => {
        scores.insert(subject_id, value);
      }
      None => {
        scores.remove(&subject_id);
      }
    }
  }

  for ((subject_id, skill_name), (count, sum)) in &index {
    tx.execute(
      "INSERT INTO skill_index (subject_id, skill_name, rating_count, rating_sum)
       VALUES (?1, ?2, ?3, ?4)",
      rusqlite::params![encode_uuid(*subject_id), skill_name, count, sum],
    )?;
  }

  let now = encode_dt(Utc::now());
  for (subject_id, value) in &scores {
    tx.execute(
      "INSERT INTO trust_scores (subject_id, score, computed_at)
       VALUES (?1, ?2, ?3)",
      rusqlite::params![encode_uuid(*subject_id), value, now],
    )?;
  }

  Ok(())
}
