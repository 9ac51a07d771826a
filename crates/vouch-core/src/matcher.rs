//! Crew matching: "who holds skills {S1..Sn} with trust at or above T".
//!
//! The matcher composes the skill index and the trust-score cache through
//! the [`AttestationStore`] trait and ranks the surviving candidates by a
//! composite of matched-skill quality and overall trust.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use crate::store::AttestationStore;

// ─── Policy ──────────────────────────────────────────────────────────────────

/// Tunable ranking weights for [`CrewMatcher::find_candidates`].
#[derive(Debug, Clone)]
pub struct MatchPolicy {
  /// Weight of the mean matched-skill rating (on the `1..=5` scale).
  pub skill_weight: f64,
  /// Weight of the normalised trust score (`score / 100`).
  pub trust_weight: f64,
}

impl Default for MatchPolicy {
  fn default() -> Self {
    Self { skill_weight: 0.7, trust_weight: 0.3 }
  }
}

// ─── Results and errors ──────────────────────────────────────────────────────

/// One ranked candidate in a crew-match result.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CandidateMatch {
  pub subject_id:      Uuid,
  /// Last computed trust score; `None` only when matching with a zero
  /// threshold admitted an unrated candidate.
  pub trust_score:     Option<f64>,
  /// Mean of the candidate's average ratings over the required skills.
  pub skill_average:   f64,
  pub composite_score: f64,
}

#[derive(Debug, Error)]
pub enum MatchError<E>
where
  E: std::error::Error + Send + Sync + 'static,
{
  /// The query named no skills; rejected before touching the index.
  #[error("required skill set is empty")]
  EmptySkillSet,

  #[error("store error: {0}")]
  Store(#[source] E),
}

// ─── Matcher ─────────────────────────────────────────────────────────────────

/// Ranks candidates holding a required skill set above a trust threshold.
#[derive(Debug, Clone, Default)]
pub struct CrewMatcher {
  pub policy: MatchPolicy,
}

impl CrewMatcher {
  pub fn new() -> Self {
    Self { policy: MatchPolicy::default() }
  }

  pub fn with_policy(policy: MatchPolicy) -> Self {
    Self { policy }
  }

  /// Find every subject holding *all* of `required_skills` whose trust
  /// score is at least `min_trust_score` (inclusive), ranked best-first.
  ///
  /// Unrated candidates are excluded unless the threshold is zero. An empty
  /// result after filtering is a valid outcome, not an error.
  pub async fn find_candidates<S>(
    &self,
    store: &S,
    required_skills: &[String],
    min_trust_score: f64,
  ) -> Result<Vec<CandidateMatch>, MatchError<S::Error>>
  where
    S: AttestationStore,
  {
    if required_skills.is_empty() {
      return Err(MatchError::EmptySkillSet);
    }

    // AND semantics: intersect the holder set of every required skill.
    let mut candidates: Option<HashSet<Uuid>> = None;
    for skill in required_skills {
      let holders: HashSet<Uuid> = store
        .skill_holders(skill)
        .await
        .map_err(MatchError::Store)?
        .into_iter()
        .collect();
      candidates = Some(match candidates {
        None => holders,
        Some(prev) => prev.intersection(&holders).copied().collect(),
      });
      if candidates.as_ref().is_some_and(HashSet::is_empty) {
        return Ok(Vec::new());
      }
    }

    let mut ranked = Vec::new();
    for subject_id in candidates.unwrap_or_default() {
      let trust = store
        .trust_score(subject_id)
        .await
        .map_err(MatchError::Store)?;
      match trust {
        None if min_trust_score > 0.0 => continue,
        Some(t) if t < min_trust_score => continue,
        _ => {}
      }

      let mut rating_sum = 0.0;
      let mut rated = 0usize;
      for skill in required_skills {
        if let Some(avg) = store
          .skill_average(subject_id, skill)
          .await
          .map_err(MatchError::Store)?
        {
          rating_sum += avg;
          rated += 1;
        }
      }
      let skill_average =
        if rated == 0 { 0.0 } else { rating_sum / rated as f64 };

      let composite_score = self.policy.skill_weight * skill_average
        + self.policy.trust_weight * trust.unwrap_or(0.0) / 100.0;

      let count = store
        .attestation_count(subject_id)
        .await
        .map_err(MatchError::Store)?;

      ranked.push((
        CandidateMatch { subject_id, trust_score: trust, skill_average, composite_score },
        count,
      ));
    }

    // Deterministic order: composite descending, then total attestation
    // count descending, then subject id ascending.
    ranked.sort_by(|(a, a_count), (b, b_count)| {
      b.composite_score
        .total_cmp(&a.composite_score)
        .then_with(|| b_count.cmp(a_count))
        .then_with(|| a.subject_id.cmp(&b.subject_id))
    });

    Ok(ranked.into_iter().map(|(candidate, _)| candidate).collect())
  }
}

#[cfg(test)]
mod tests {
  use std::collections::HashMap;

  use thiserror::Error;

  use super::*;
  use crate::{
    attestation::{Attestation, NewAttestation},
    subject::Subject,
  };

  #[derive(Debug, Error)]
  #[error("fake store failure")]
  struct FakeError;

  /// Minimal read-only store serving canned index and score data.
  #[derive(Default)]
  struct FakeStore {
    holders:  HashMap<String, Vec<Uuid>>,
    scores:   HashMap<Uuid, f64>,
    averages: HashMap<(Uuid, String), f64>,
    counts:   HashMap<Uuid, u64>,
  }

  impl FakeStore {
    fn holder(
      &mut self,
      id: Uuid,
      skill: &str,
      average: f64,
      score: Option<f64>,
      count: u64,
    ) {
      self.holders.entry(skill.to_owned()).or_default().push(id);
      self.averages.insert((id, skill.to_owned()), average);
      if let Some(score) = score {
        self.scores.insert(id, score);
      }
      self.counts.insert(id, count);
    }
  }

  impl AttestationStore for FakeStore {
    type Error = FakeError;

    async fn add_subject(&self, _username: String) -> Result<Subject, FakeError> {
      unimplemented!("not used by the matcher")
    }

    async fn get_subject(&self, _id: Uuid) -> Result<Option<Subject>, FakeError> {
      unimplemented!("not used by the matcher")
    }

    async fn list_subjects(&self) -> Result<Vec<Subject>, FakeError> {
      unimplemented!("not used by the matcher")
    }

    async fn append(
      &self,
      _input: NewAttestation,
    ) -> Result<Attestation, FakeError> {
      unimplemented!("not used by the matcher")
    }

    async fn list_for(&self, _id: Uuid) -> Result<Vec<Attestation>, FakeError> {
      unimplemented!("not used by the matcher")
    }

    async fn attestation_count(&self, id: Uuid) -> Result<u64, FakeError> {
      Ok(self.counts.get(&id).copied().unwrap_or(0))
    }

    async fn trust_score(&self, id: Uuid) -> Result<Option<f64>, FakeError> {
      Ok(self.scores.get(&id).copied())
    }

    async fn skill_holders(&self, skill: &str) -> Result<Vec<Uuid>, FakeError> {
      Ok(self.holders.get(skill).cloned().unwrap_or_default())
    }

    async fn skill_average(
      &self,
      id: Uuid,
      skill: &str,
    ) -> Result<Option<f64>, FakeError> {
      Ok(self.averages.get(&(id, skill.to_owned())).copied())
    }

    async fn rebuild_projections(&self) -> Result<(), FakeError> {
      unimplemented!("not used by the matcher")
    }
  }

  fn skills(names: &[&str]) -> Vec<String> {
    names.iter().map(|s| (*s).to_owned()).collect()
  }

  #[tokio::test]
  async fn empty_skill_set_is_rejected_before_the_index() {
    let store = FakeStore::default();
    let err = CrewMatcher::new()
      .find_candidates(&store, &[], 0.0)
      .await
      .unwrap_err();
    assert!(matches!(err, MatchError::EmptySkillSet));
  }

  #[tokio::test]
  async fn composite_blends_skill_and_trust() {
    let mut store = FakeStore::default();
    let id = Uuid::from_u128(1);
    store.holder(id, "Lighting", 4.0, Some(75.0), 3);

    let ranked = CrewMatcher::new()
      .find_candidates(&store, &skills(&["Lighting"]), 60.0)
      .await
      .unwrap();
    assert_eq!(ranked.len(), 1);
    let expected = 0.7 * 4.0 + 0.3 * 0.75;
    assert!((ranked[0].composite_score - expected).abs() < 1e-12);
  }

  #[tokio::test]
  async fn threshold_is_inclusive_at_the_boundary() {
    let mut store = FakeStore::default();
    let id = Uuid::from_u128(1);
    store.holder(id, "Lighting", 4.0, Some(75.0), 1);

    let matcher = CrewMatcher::new();
    let at = matcher
      .find_candidates(&store, &skills(&["Lighting"]), 75.0)
      .await
      .unwrap();
    assert_eq!(at.len(), 1);

    let above = matcher
      .find_candidates(&store, &skills(&["Lighting"]), 80.0)
      .await
      .unwrap();
    assert!(above.is_empty());
  }

  #[tokio::test]
  async fn unrated_candidates_only_pass_a_zero_threshold() {
    let mut store = FakeStore::default();
    let id = Uuid::from_u128(1);
    store.holder(id, "Lighting", 5.0, None, 1);

    let matcher = CrewMatcher::new();
    let strict = matcher
      .find_candidates(&store, &skills(&["Lighting"]), 10.0)
      .await
      .unwrap();
    assert!(strict.is_empty());

    let open = matcher
      .find_candidates(&store, &skills(&["Lighting"]), 0.0)
      .await
      .unwrap();
    assert_eq!(open.len(), 1);
    assert_eq!(open[0].trust_score, None);
    // The trust term contributes nothing for an unrated candidate.
    assert!((open[0].composite_score - 0.7 * 5.0).abs() < 1e-12);
  }

  #[tokio::test]
  async fn ties_break_on_count_then_subject_id() {
    let mut store = FakeStore::default();
    let low = Uuid::from_u128(1);
    let busy = Uuid::from_u128(2);
    let quiet = Uuid::from_u128(3);
    // busy and quiet tie on composite; busy has more attestations.
    store.holder(busy, "Lighting", 4.0, Some(50.0), 9);
    store.holder(quiet, "Lighting", 4.0, Some(50.0), 2);
    store.holder(low, "Lighting", 1.0, Some(50.0), 20);

    let ranked = CrewMatcher::new()
      .find_candidates(&store, &skills(&["Lighting"]), 0.0)
      .await
      .unwrap();
    let order: Vec<_> = ranked.iter().map(|c| c.subject_id).collect();
    assert_eq!(order, vec![busy, quiet, low]);
  }

  #[tokio::test]
  async fn equal_candidates_order_by_subject_id() {
    let mut store = FakeStore::default();
    let first = Uuid::from_u128(1);
    let second = Uuid::from_u128(2);
    store.holder(second, "Lighting", 3.0, Some(40.0), 5);
    store.holder(first, "Lighting", 3.0, Some(40.0), 5);

    let ranked = CrewMatcher::new()
      .find_candidates(&store, &skills(&["Lighting"]), 0.0)
      .await
      .unwrap();
    let order: Vec<_> = ranked.iter().map(|c| c.subject_id).collect();
    assert_eq!(order, vec![first, second]);
  }
}
