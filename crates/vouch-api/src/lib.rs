//! JSON REST API for vouch.
//!
//! Exposes an axum [`Router`] backed by any
//! [`vouch_core::store::AttestationStore`]. Auth, TLS, and transport concerns
//! are the caller's responsibility; attester identity arrives explicitly in
//! each request body, never from session state.
//!
//! # Mounting
//!
//! ```rust,ignore
//! .nest("/api", vouch_api::api_router(store.clone()))
//! ```

pub mod attestations;
pub mod error;
pub mod matching;
pub mod profile;
pub mod subjects;

use std::sync::Arc;

use axum::{
  Router,
  routing::{get, post},
};
use vouch_core::store::{AttestationStore, ClassifyError};

pub use error::ApiError;

/// Build a fully-materialised API router for `store`.
///
/// The returned `Router<()>` can be nested into any parent router regardless
/// of its own state type.
pub fn api_router<S>(store: Arc<S>) -> Router<()>
where
  S: AttestationStore + 'static,
  S::Error: ClassifyError,
{
  Router::new()
    // Subjects
    .route("/subjects", get(subjects::list::<S>).post(subjects::create::<S>))
    .route("/subjects/{id}", get(subjects::get_one::<S>))
    // Attestations
    .route("/attestations/skill", post(attestations::create_skill::<S>))
    .route(
      "/attestations/work-ethic",
      post(attestations::create_work_ethic::<S>),
    )
    // Derived reads
    .route("/users/{id}/trust-profile", get(profile::handler::<S>))
    .route("/crew/match", post(matching::handler::<S>))
    .with_state(store)
}

// ─── Integration tests ────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
  use std::sync::Arc;

  use axum::{
    body::Body,
    http::{Request, StatusCode, header},
  };
  use serde_json::{Value, json};
  use tower::ServiceExt as _;
  use uuid::Uuid;
  use vouch_store_sqlite::SqliteStore;

  use super::*;

  async fn router() -> Router<()> {
    let store = SqliteStore::open_in_memory().await.unwrap();
    api_router(Arc::new(store))
  }

  async fn send(
    app: &Router<()>,
    method: &str,
    uri: &str,
    body: Option<Value>,
  ) -> (StatusCode, Value) {
    let mut builder = Request::builder().method(method).uri(uri);
    let body = match body {
      Some(json) => {
        builder = builder.header(header::CONTENT_TYPE, "application/json");
        Body::from(json.to_string())
      }
      None => Body::empty(),
    };
    let resp = app
      .clone()
      .oneshot(builder.body(body).unwrap())
      .await
      .unwrap();

    let status = resp.status();
    let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX)
      .await
      .unwrap();
    let value = if bytes.is_empty() {
      Value::Null
    } else {
      serde_json::from_slice(&bytes).unwrap()
    };
    (status, value)
  }

  async fn create_subject(app: &Router<()>, username: &str) -> Uuid {
    let (status, body) =
      send(app, "POST", "/subjects", Some(json!({ "username": username })))
        .await;
    assert_eq!(status, StatusCode::CREATED);
    body["subjectId"].as_str().unwrap().parse().unwrap()
  }

  async fn rate_skill(
    app: &Router<()>,
    attester: Uuid,
    recipient: Uuid,
    skill: &str,
    rating: u8,
  ) {
    let (status, _) = send(
      app,
      "POST",
      "/attestations/skill",
      Some(json!({
        "attesterId": attester,
        "recipientId": recipient,
        "skill": skill,
        "rating": rating,
      })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
  }

  // ── Subjects ────────────────────────────────────────────────────────────────

  #[tokio::test]
  async fn create_and_fetch_subject() {
    let app = router().await;
    let id = create_subject(&app, "alice").await;

    let (status, body) =
      send(&app, "GET", &format!("/subjects/{id}"), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["username"], "alice");
    assert_eq!(body["trustScore"], Value::Null);
  }

  #[tokio::test]
  async fn duplicate_username_is_a_400() {
    let app = router().await;
    create_subject(&app, "alice").await;

    let (status, body) =
      send(&app, "POST", "/subjects", Some(json!({ "username": "alice" })))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].as_str().unwrap().contains("alice"));
  }

  #[tokio::test]
  async fn unknown_subject_is_a_404() {
    let app = router().await;
    let (status, _) =
      send(&app, "GET", &format!("/subjects/{}", Uuid::new_v4()), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
  }

  // ── Attestations ────────────────────────────────────────────────────────────

  #[tokio::test]
  async fn skill_attestation_round_trips() {
    let app = router().await;
    let alice = create_subject(&app, "alice").await;
    let bob = create_subject(&app, "bob").await;

    let (status, body) = send(
      &app,
      "POST",
      "/attestations/skill",
      Some(json!({
        "attesterId": alice,
        "recipientId": bob,
        "skill": "Lighting",
        "rating": 5,
        "comments": "ran the whole rig",
      })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["subjectId"].as_str().unwrap(), bob.to_string());
    assert_eq!(body["value"]["type"], "skill");
    assert_eq!(body["value"]["data"]["rating"], 5);
    assert_eq!(body["comments"], "ran the whole rig");
  }

  #[tokio::test]
  async fn out_of_range_rating_is_a_400() {
    let app = router().await;
    let alice = create_subject(&app, "alice").await;
    let bob = create_subject(&app, "bob").await;

    let (status, body) = send(
      &app,
      "POST",
      "/attestations/skill",
      Some(json!({
        "attesterId": alice,
        "recipientId": bob,
        "skill": "Lighting",
        "rating": 6,
      })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].as_str().unwrap().contains("1..=5"));
  }

  #[tokio::test]
  async fn self_attestation_is_a_400() {
    let app = router().await;
    let alice = create_subject(&app, "alice").await;

    let (status, _) = send(
      &app,
      "POST",
      "/attestations/skill",
      Some(json!({
        "attesterId": alice,
        "recipientId": alice,
        "skill": "Lighting",
        "rating": 4,
      })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
  }

  #[tokio::test]
  async fn attesting_an_unknown_recipient_is_a_404() {
    let app = router().await;
    let alice = create_subject(&app, "alice").await;

    let (status, _) = send(
      &app,
      "POST",
      "/attestations/skill",
      Some(json!({
        "attesterId": alice,
        "recipientId": Uuid::new_v4(),
        "skill": "Lighting",
        "rating": 4,
      })),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
  }

  #[tokio::test]
  async fn work_ethic_attestation_round_trips() {
    let app = router().await;
    let alice = create_subject(&app, "alice").await;
    let bob = create_subject(&app, "bob").await;

    let (status, body) = send(
      &app,
      "POST",
      "/attestations/work-ethic",
      Some(json!({
        "attesterId": alice,
        "recipientId": bob,
        "reliability": 5,
        "teamwork": 4,
        "professionalism": 3,
      })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["value"]["type"], "work_ethic");
    assert_eq!(body["value"]["data"]["teamwork"], 4);
  }

  // ── Trust profile ───────────────────────────────────────────────────────────

  #[tokio::test]
  async fn trust_profile_reports_score_and_attestations() {
    let app = router().await;
    let alice = create_subject(&app, "alice").await;
    let bob = create_subject(&app, "bob").await;
    rate_skill(&app, alice, bob, "Lighting", 4).await;

    let (status, body) =
      send(&app, "GET", &format!("/users/{bob}/trust-profile"), None).await;
    assert_eq!(status, StatusCode::OK);
    // A lone rating of 4 renormalises to 80.
    assert!((body["trustScore"].as_f64().unwrap() - 80.0).abs() < 1e-9);
    assert_eq!(body["attestationsReceived"].as_array().unwrap().len(), 1);
  }

  #[tokio::test]
  async fn trust_profile_of_unrated_subject_is_null_not_zero() {
    let app = router().await;
    let alice = create_subject(&app, "alice").await;

    let (status, body) =
      send(&app, "GET", &format!("/users/{alice}/trust-profile"), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["trustScore"], Value::Null);
    assert_eq!(body["attestationsReceived"].as_array().unwrap().len(), 0);
  }

  #[tokio::test]
  async fn trust_profile_of_unknown_subject_is_a_404() {
    let app = router().await;
    let (status, _) = send(
      &app,
      "GET",
      &format!("/users/{}/trust-profile", Uuid::new_v4()),
      None,
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
  }

  // ── Crew matching ───────────────────────────────────────────────────────────

  #[tokio::test]
  async fn crew_match_ranks_candidates() {
    let app = router().await;
    let alice = create_subject(&app, "alice").await;
    let bob = create_subject(&app, "bob").await;
    let carol = create_subject(&app, "carol").await;
    rate_skill(&app, alice, bob, "Lighting", 5).await;
    rate_skill(&app, alice, carol, "Lighting", 2).await;

    let (status, body) = send(
      &app,
      "POST",
      "/crew/match",
      Some(json!({ "skills": ["Lighting"], "minTrustScore": 0 })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let ranked = body.as_array().unwrap();
    assert_eq!(ranked.len(), 2);
    assert_eq!(ranked[0]["subjectId"].as_str().unwrap(), bob.to_string());
    assert!(
      ranked[0]["compositeScore"].as_f64().unwrap()
        > ranked[1]["compositeScore"].as_f64().unwrap()
    );
  }

  #[tokio::test]
  async fn crew_match_filters_on_the_trust_threshold() {
    let app = router().await;
    let alice = create_subject(&app, "alice").await;
    let bob = create_subject(&app, "bob").await;
    // A lone rating of 4 puts bob at exactly 80.
    rate_skill(&app, alice, bob, "Lighting", 4).await;

    let (status, body) = send(
      &app,
      "POST",
      "/crew/match",
      Some(json!({ "skills": ["Lighting"], "minTrustScore": 80 })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body.as_array().unwrap().len(), 1);

    let (status, body) = send(
      &app,
      "POST",
      "/crew/match",
      Some(json!({ "skills": ["Lighting"], "minTrustScore": 80.1 })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert!(body.as_array().unwrap().is_empty());
  }

  #[tokio::test]
  async fn crew_match_with_no_full_holder_is_an_empty_200() {
    let app = router().await;
    let alice = create_subject(&app, "alice").await;
    let bob = create_subject(&app, "bob").await;
    let carol = create_subject(&app, "carol").await;
    rate_skill(&app, alice, bob, "Lighting", 5).await;
    rate_skill(&app, alice, carol, "Audio", 5).await;

    let (status, body) = send(
      &app,
      "POST",
      "/crew/match",
      Some(json!({ "skills": ["Lighting", "Audio"], "minTrustScore": 0 })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert!(body.as_array().unwrap().is_empty());
  }

  #[tokio::test]
  async fn crew_match_with_empty_skills_is_a_400() {
    let app = router().await;
    let (status, body) = send(
      &app,
      "POST",
      "/crew/match",
      Some(json!({ "skills": [], "minTrustScore": 0 })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].as_str().unwrap().contains("empty"));
  }
}
