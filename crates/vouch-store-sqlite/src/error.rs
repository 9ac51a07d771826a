//! Error type for `vouch-store-sqlite`.

use thiserror::Error;
use vouch_core::store::{ClassifyError, ErrorClass};

#[derive(Debug, Error)]
pub enum Error {
  #[error("core error: {0}")]
  Core(#[from] vouch_core::Error),

  #[error("database error: {0}")]
  Database(#[from] tokio_rusqlite::Error),

  #[error("sql error: {0}")]
  Sql(#[from] rusqlite::Error),

  #[error("json error: {0}")]
  Json(#[from] serde_json::Error),

  #[error("uuid parse error: {0}")]
  Uuid(#[from] uuid::Error),

  #[error("date/time parse error: {0}")]
  DateParse(String),

  #[error("subject not found: {0}")]
  SubjectNotFound(uuid::Uuid),

  #[error("username already taken: {0:?}")]
  UsernameTaken(String),

  /// Trust-score recompute retries were exhausted on a storage failure.
  /// The stored record and index update are intact; the cached score for
  /// the subject is stale until the next successful recompute.
  #[error("trust engine unavailable: {0}")]
  EngineUnavailable(String),
}

impl Error {
  /// True for transient storage failures worth retrying; validation and
  /// lookup failures are permanent and must surface immediately.
  pub fn is_transient(&self) -> bool {
    matches!(self, Error::Database(_) | Error::Sql(_))
  }
}

impl ClassifyError for Error {
  fn class(&self) -> ErrorClass {
    match self {
      Error::Core(vouch_core::Error::SubjectNotFound(_))
      | Error::SubjectNotFound(_) => ErrorClass::NotFound,
      Error::Core(vouch_core::Error::Serialization(_)) => ErrorClass::Internal,
      Error::Core(_) | Error::UsernameTaken(_) => ErrorClass::Validation,
      Error::EngineUnavailable(_) => ErrorClass::Unavailable,
      _ => ErrorClass::Internal,
    }
  }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
