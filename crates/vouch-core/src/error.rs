//! Error types for `vouch-core`.

use thiserror::Error;
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum Error {
  #[error("attester and subject are the same person")]
  SelfAttestation,

  #[error("{field} rating {value} is outside 1..=5")]
  RatingOutOfRange { field: &'static str, value: u8 },

  #[error("skill name must not be blank")]
  BlankSkillName,

  #[error("subject not found: {0}")]
  SubjectNotFound(Uuid),

  #[error("serialization error: {0}")]
  Serialization(#[from] serde_json::Error),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
