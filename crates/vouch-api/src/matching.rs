//! Handler for `POST /crew/match`.

use std::sync::Arc;

use axum::{Json, extract::State};
use serde::Deserialize;
use vouch_core::{
  matcher::{CandidateMatch, CrewMatcher, MatchError},
  store::{AttestationStore, ClassifyError},
};

use crate::error::ApiError;

/// JSON body accepted by `POST /crew/match`.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MatchBody {
  /// Required skills; every candidate must hold all of them.
  pub skills:          Vec<String>,
  #[serde(default)]
  pub min_trust_score: f64,
}

/// `POST /crew/match` — ranked candidates, best first. An empty result is a
/// valid 200; an empty skill set is a 400.
pub async fn handler<S>(
  State(store): State<Arc<S>>,
  Json(body): Json<MatchBody>,
) -> Result<Json<Vec<CandidateMatch>>, ApiError>
where
  S: AttestationStore,
  S::Error: ClassifyError,
{
  let ranked = CrewMatcher::new()
    .find_candidates(store.as_ref(), &body.skills, body.min_trust_score)
    .await
    .map_err(|e| match e {
      MatchError::EmptySkillSet => ApiError::BadRequest(e.to_string()),
      MatchError::Store(inner) => ApiError::from_store(inner),
    })?;
  Ok(Json(ranked))
}
