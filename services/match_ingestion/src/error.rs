use serde::{Deserialize, Serialize};
use std::fmt;

/// Errors surfaced by a [`crate::repository::MatchRepository`] backend.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StoreError {
    #[error("Transient store error: {0}")]
    Transient(String),
    #[error("Duplicate key: {0}")]
    DuplicateKey(String),
    #[error("Store error: {0}")]
    Other(String),
}

impl From<sqlx::Error> for StoreError {
    fn from(err: sqlx::Error) -> Self {
        match &err {
            sqlx::Error::Database(db_err) if db_err.code().as_deref() == Some("23505") => {
                StoreError::DuplicateKey(db_err.message().to_string())
            }
            sqlx::Error::Io(_)
            | sqlx::Error::PoolTimedOut
            | sqlx::Error::PoolClosed
            | sqlx::Error::WorkerCrashed => StoreError::Transient(err.to_string()),
            _ => StoreError::Other(err.to_string()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    #[error("missing required field '{0}'")]
    MissingField(&'static str),
    #[error("{0} has leading or trailing whitespace")]
    PaddedName(&'static str),
    #[error("invalid match_date '{0}'")]
    InvalidDate(String),
    #[error("invalid match_time '{0}'")]
    InvalidTime(String),
    #[error("{0}")]
    InvalidStatus(String),
    #[error("{field} must be non-negative, got {value}")]
    NegativeScore { field: &'static str, value: i32 },
    #[error("home_score and away_score must both be present or both absent")]
    PartialScore,
    #[error("status '{0}' requires both scores")]
    MissingScores(crate::types::MatchStatus),
    #[error("home and away team are the same: '{0}'")]
    SameTeam(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityKind {
    Team,
    Season,
    AgeGroup,
    Division,
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EntityKind::Team => f.write_str("team"),
            EntityKind::Season => f.write_str("season"),
            EntityKind::AgeGroup => f.write_str("age group"),
            EntityKind::Division => f.write_str("division"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Unresolved {
    pub kind: EntityKind,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unresolved {}", format_unresolved(.unresolved))]
pub struct ResolutionError {
    pub unresolved: Vec<Unresolved>,
}

fn format_unresolved(unresolved: &[Unresolved]) -> String {
    unresolved
        .iter()
        .map(|u| format!("{} '{}'", u.kind, u.name))
        .collect::<Vec<_>>()
        .join(", ")
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum KickoffError {
    #[error("unknown time zone '{0}'")]
    UnknownTimeZone(String),
    #[error("local time {0} does not map to an instant in {1}")]
    Unrepresentable(chrono::NaiveDateTime, String),
}

/// Failure classification reported on the task status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FailureClass {
    Validation,
    Resolution,
    Store,
    Cancelled,
}

impl fmt::Display for FailureClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FailureClass::Validation => f.write_str("validation"),
            FailureClass::Resolution => f.write_str("resolution"),
            FailureClass::Store => f.write_str("store"),
            FailureClass::Cancelled => f.write_str("cancelled"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum IngestError {
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),
    #[error("Resolution error: {0}")]
    Resolution(#[from] ResolutionError),
    #[error("Kickoff error: {0}")]
    Kickoff(#[from] KickoffError),
    #[error("{0}")]
    Store(#[from] StoreError),
    #[error("gave up after {attempts} attempts: {last}")]
    RetriesExhausted {
        attempts: u32,
        last: Box<IngestError>,
    },
    #[error("cancelled by shutdown")]
    Cancelled,
}

impl IngestError {
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            IngestError::Resolution(_) | IngestError::Store(StoreError::Transient(_))
        )
    }

    pub fn class(&self) -> FailureClass {
        match self {
            IngestError::Validation(_) | IngestError::Kickoff(_) => FailureClass::Validation,
            IngestError::Resolution(_) => FailureClass::Resolution,
            IngestError::Store(_) => FailureClass::Store,
            IngestError::RetriesExhausted { last, .. } => last.class(),
            IngestError::Cancelled => FailureClass::Cancelled,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_only_resolution_and_transient_store_errors_retry() {
        assert!(IngestError::Resolution(ResolutionError { unresolved: vec![] }).is_retryable());
        assert!(IngestError::Store(StoreError::Transient("timeout".into())).is_retryable());
        assert!(!IngestError::Store(StoreError::Other("syntax".into())).is_retryable());
        assert!(!IngestError::Validation(ValidationError::PartialScore).is_retryable());
        assert!(!IngestError::Cancelled.is_retryable());
    }

    #[test]
    fn test_exhausted_keeps_inner_class() {
        let err = IngestError::RetriesExhausted {
            attempts: 3,
            last: Box::new(IngestError::Resolution(ResolutionError {
                unresolved: vec![Unresolved {
                    kind: EntityKind::Team,
                    name: "Riverside FC".into(),
                }],
            })),
        };
        assert_eq!(err.class(), FailureClass::Resolution);
        assert!(err.to_string().contains("team 'Riverside FC'"));
    }

    #[test]
    fn test_pool_timeout_is_transient() {
        assert!(matches!(
            StoreError::from(sqlx::Error::PoolTimedOut),
            StoreError::Transient(_)
        ));
        assert!(matches!(
            StoreError::from(sqlx::Error::RowNotFound),
            StoreError::Other(_)
        ));
    }
}
