//! Handlers for `/subjects` endpoints.
//!
//! | Method | Path | Notes |
//! |--------|------|-------|
//! | `GET`  | `/subjects` | All subjects, ordered by username |
//! | `POST` | `/subjects` | Body: `{"username":"alice"}` |
//! | `GET`  | `/subjects/:id` | 404 if not found |

use std::sync::Arc;

use axum::{
  Json,
  extract::{Path, State},
  http::StatusCode,
  response::IntoResponse,
};
use serde::Deserialize;
use uuid::Uuid;
use vouch_core::{
  store::{AttestationStore, ClassifyError},
  subject::Subject,
};

use crate::error::ApiError;

// ─── List ─────────────────────────────────────────────────────────────────────

/// `GET /subjects`
pub async fn list<S>(
  State(store): State<Arc<S>>,
) -> Result<Json<Vec<Subject>>, ApiError>
where
  S: AttestationStore,
  S::Error: ClassifyError,
{
  let subjects = store.list_subjects().await.map_err(ApiError::from_store)?;
  Ok(Json(subjects))
}

// ─── Create ───────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct CreateBody {
  pub username: String,
}

/// `POST /subjects` — body: `{"username":"alice"}`
pub async fn create<S>(
  State(store): State<Arc<S>>,
  Json(body): Json<CreateBody>,
) -> Result<impl IntoResponse, ApiError>
where
  S: AttestationStore,
  S::Error: ClassifyError,
{
  if body.username.trim().is_empty() {
    return Err(ApiError::BadRequest("username must not be blank".into()));
  }
  let subject = store
    .add_subject(body.username)
    .await
    .map_err(ApiError::from_store)?;
  Ok((StatusCode::CREATED, Json(subject)))
}

// ─── Get one ──────────────────────────────────────────────────────────────────

/// `GET /subjects/:id`
pub async fn get_one<S>(
  State(store): State<Arc<S>>,
  Path(id): Path<Uuid>,
) -> Result<Json<Subject>, ApiError>
where
  S: AttestationStore,
  S::Error: ClassifyError,
{
  let subject = store
    .get_subject(id)
    .await
    .map_err(ApiError::from_store)?
    .ok_or_else(|| ApiError::NotFound(format!("subject {id} not found")))?;
  Ok(Json(subject))
}
