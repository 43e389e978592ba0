pub mod change_detector;
pub mod config;
pub mod error;
pub mod feed;
pub mod kickoff;
pub mod memory;
pub mod metrics;
pub mod queue;
pub mod repository;
pub mod resolver;
pub mod retry;
pub mod standings;
pub mod types;
pub mod validator;
pub mod worker;

pub use error::{FailureClass, IngestError, StoreError};
pub use queue::{DeadLetter, IngestQueue, TaskStatus};
pub use repository::{MatchRepository, PgMatchRepository};
pub use standings::{compute_table, TeamRow};
pub use types::{IngestOutcome, IngestResult, MatchPayload};
pub use worker::IngestionWorker;
