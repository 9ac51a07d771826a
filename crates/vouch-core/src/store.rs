//! The `AttestationStore` trait.
//!
//! The trait is implemented by storage backends (e.g. `vouch-store-sqlite`).
//! Higher layers (`vouch-api`, the matcher) depend on this abstraction, not
//! on any concrete backend.

use std::future::Future;

use uuid::Uuid;

use crate::{
  attestation::{Attestation, NewAttestation},
  subject::Subject,
};

/// How a backend error maps onto the API boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorClass {
  /// Rejected input. Permanent; never retried.
  Validation,
  /// A referenced subject does not exist.
  NotFound,
  /// Retries on a transient storage failure were exhausted.
  Unavailable,
  /// Anything else.
  Internal,
}

/// Implemented by backend error types so boundary layers can translate
/// failures into status codes without knowing the concrete backend.
pub trait ClassifyError {
  fn class(&self) -> ErrorClass;
}

/// Abstraction over a vouch attestation store backend.
///
/// The store owns attestation records exclusively. The skill index and the
/// trust-score cache are derived projections maintained by the backend; they
/// must be fully reconstructable by replaying the attestation log (see
/// [`AttestationStore::rebuild_projections`]).
///
/// All methods return `Send` futures so the trait can be used in
/// multi-threaded async runtimes (e.g. tokio with `axum`).
pub trait AttestationStore: Send + Sync {
  type Error: std::error::Error + Send + Sync + 'static;

  // ── Subjects ──────────────────────────────────────────────────────────

  /// Create and persist a new subject. Usernames are unique.
  fn add_subject(
    &self,
    username: String,
  ) -> impl Future<Output = Result<Subject, Self::Error>> + Send + '_;

  /// Retrieve a subject by UUID, with the last computed trust score
  /// populated. Returns `None` if not found.
  fn get_subject(
    &self,
    id: Uuid,
  ) -> impl Future<Output = Result<Option<Subject>, Self::Error>> + Send + '_;

  /// List all subjects.
  fn list_subjects(
    &self,
  ) -> impl Future<Output = Result<Vec<Subject>, Self::Error>> + Send + '_;

  // ── Attestations ──────────────────────────────────────────────────────

  /// Validate and persist an attestation, returning the stored record with
  /// its server-assigned id and timestamp.
  ///
  /// A submission matching the supersede key
  /// `(attester, subject, event, type, skill?)` of an existing record
  /// replaces it. The record write and the skill-index update are applied
  /// as one atomic unit of visibility, and the subject's trust score is
  /// recomputed before the call returns.
  fn append(
    &self,
    input: NewAttestation,
  ) -> impl Future<Output = Result<Attestation, Self::Error>> + Send + '_;

  /// All attestations received by a subject, ordered `recorded_at`
  /// descending. Pure read; restartable.
  fn list_for(
    &self,
    subject_id: Uuid,
  ) -> impl Future<Output = Result<Vec<Attestation>, Self::Error>> + Send + '_;

  /// Number of attestations a subject has received.
  fn attestation_count(
    &self,
    subject_id: Uuid,
  ) -> impl Future<Output = Result<u64, Self::Error>> + Send + '_;

  // ── Derived reads ─────────────────────────────────────────────────────

  /// The subject's last computed trust score; `None` means unrated.
  fn trust_score(
    &self,
    subject_id: Uuid,
  ) -> impl Future<Output = Result<Option<f64>, Self::Error>> + Send + '_;

  /// Subjects holding at least one skill attestation for `skill`.
  fn skill_holders<'a>(
    &'a self,
    skill: &'a str,
  ) -> impl Future<Output = Result<Vec<Uuid>, Self::Error>> + Send + 'a;

  /// A subject's unweighted average rating for `skill`, from the index's
  /// running statistics. `None` if the subject holds no such attestation.
  fn skill_average<'a>(
    &'a self,
    subject_id: Uuid,
    skill: &'a str,
  ) -> impl Future<Output = Result<Option<f64>, Self::Error>> + Send + 'a;

  // ── Maintenance ───────────────────────────────────────────────────────

  /// Drop and reconstruct the skill index and trust-score cache by
  /// replaying the attestation log in `recorded_at` order.
  fn rebuild_projections(
    &self,
  ) -> impl Future<Output = Result<(), Self::Error>> + Send + '_;
}
