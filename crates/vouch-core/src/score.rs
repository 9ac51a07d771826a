//! Trust-score aggregation.
//!
//! A subject's trust score is a pure function of the attestations they have
//! received and of each attester's *last stored* trust score. The one-hop
//! lookup is what breaks score cycles: computing A's score never recurses
//! into recomputing B's, it only reads B's already-persisted value. Stale
//! one-hop weights are expected; the score is eventually consistent.
//!
//! All constants are policy, not law: the blend ratio, the top-skill cap,
//! and the attester weighting live in [`ScorePolicy`] so callers can tune
//! them without touching the aggregation itself.

use std::collections::HashMap;

use uuid::Uuid;

use crate::attestation::{Attestation, AttestationValue};

// ─── Policy ──────────────────────────────────────────────────────────────────

/// Tunable weighting constants for [`compute_trust_score`].
#[derive(Debug, Clone)]
pub struct ScorePolicy {
  /// Blend weight of the work-ethic term in the overall score.
  pub work_ethic_weight:      f64,
  /// Blend weight of the skill term in the overall score.
  pub skill_weight:           f64,
  /// Number of most-attested skills that contribute to the skill term.
  /// Caps how much one heavily-attested skill can dominate.
  pub top_skill_count:        usize,
  /// Floor applied to `t / 100` when weighting a scored attester.
  pub min_attester_weight:    f64,
  /// Weight given to attesters who have no trust score of their own yet.
  pub default_attester_weight: f64,
}

impl Default for ScorePolicy {
  fn default() -> Self {
    Self {
      work_ethic_weight:       0.6,
      skill_weight:            0.4,
      top_skill_count:         3,
      min_attester_weight:     0.2,
      default_attester_weight: 0.5,
    }
  }
}

impl ScorePolicy {
  /// Map an attester's last stored trust score to their rating weight:
  /// `max(min_attester_weight, t / 100)`, or the default weight for an
  /// attester who is unrated themselves.
  pub fn attester_weight(&self, last_score: Option<f64>) -> f64 {
    match last_score {
      Some(t) => (t / 100.0).max(self.min_attester_weight),
      None => self.default_attester_weight,
    }
  }
}

// ─── Aggregation ─────────────────────────────────────────────────────────────

/// Weighted mean of `(value, weight)` samples. `None` when the samples are
/// empty or carry no weight.
pub fn weighted_average(samples: &[(f64, f64)]) -> Option<f64> {
  let total: f64 = samples.iter().map(|(_, w)| w).sum();
  if total <= 0.0 {
    return None;
  }
  Some(samples.iter().map(|(v, w)| v * w).sum::<f64>() / total)
}

/// Compute a subject's trust score in `[0, 100]` from the attestations they
/// have received, or `None` when they have received none.
///
/// `attester_scores` holds the last stored score per attester; attesters
/// absent from the map are weighted with the policy default.
///
/// The result is deterministic for a given input: recomputing without new
/// attestations yields an identical value.
pub fn compute_trust_score(
  policy: &ScorePolicy,
  received: &[Attestation],
  attester_scores: &HashMap<Uuid, f64>,
) -> Option<f64> {
  let mut by_skill: HashMap<&str, Vec<(f64, f64)>> = HashMap::new();
  let mut ethic: Vec<(f64, f64)> = Vec::new();

  for attestation in received {
    let weight = policy
      .attester_weight(attester_scores.get(&attestation.attester_id).copied());
    match &attestation.value {
      AttestationValue::Skill(s) => by_skill
        .entry(s.skill_name.as_str())
        .or_default()
        .push((f64::from(s.rating), weight)),
      AttestationValue::WorkEthic(e) => ethic.push((e.mean(), weight)),
    }
  }

  let ethic_term = weighted_average(&ethic);
  let skill_term = top_skill_mean(policy, &by_skill);

  // Both terms live on the 1..=5 scale; scale to 0..=100 and blend,
  // renormalising over whichever terms are present.
  let mut blended = 0.0;
  let mut weight_total = 0.0;
  if let Some(e) = ethic_term {
    blended += policy.work_ethic_weight * e * 20.0;
    weight_total += policy.work_ethic_weight;
  }
  if let Some(s) = skill_term {
    blended += policy.skill_weight * s * 20.0;
    weight_total += policy.skill_weight;
  }

  if weight_total <= 0.0 {
    return None;
  }
  Some((blended / weight_total).clamp(0.0, 100.0))
}

/// Unweighted mean of the weighted per-skill averages, restricted to the
/// `top_skill_count` skills with the most attestations. Ordering is
/// deterministic: attestation count descending, then skill name ascending.
fn top_skill_mean(
  policy: &ScorePolicy,
  by_skill: &HashMap<&str, Vec<(f64, f64)>>,
) -> Option<f64> {
  let mut per_skill: Vec<(&str, usize, f64)> = by_skill
    .iter()
    .filter_map(|(name, samples)| {
      weighted_average(samples).map(|avg| (*name, samples.len(), avg))
    })
    .collect();

  if per_skill.is_empty() {
    return None;
  }

  per_skill.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(b.0)));

  let take = policy.top_skill_count.clamp(1, per_skill.len());
  Some(per_skill[..take].iter().map(|(_, _, avg)| avg).sum::<f64>() / take as f64)
}

// ─── Tests ───────────────────────────────────────────────────────────────────
