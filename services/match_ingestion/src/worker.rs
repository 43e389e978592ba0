use crate::change_detector::{detect_changes, IncomingState};
use crate::error::{IngestError, StoreError};
use crate::kickoff::KickoffNormalizer;
use crate::repository::MatchRepository;
use crate::resolver::{EntityResolver, ResolvedIds};
use crate::retry::{RetryPolicy, Shutdown};
use crate::types::{
    IngestOutcome, IngestResult, MatchPayload, MatchRecord, NewMatch, ValidatedPayload,
};
use crate::validator::validate;
use chrono::{DateTime, Utc};
use std::fmt;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Steps a message moves through. `Failed` is reachable from any of them.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IngestStage {
    Received,
    Validated,
    Resolved,
    Deduped,
    Skipped,
    Created,
    Updated,
    Done,
    Failed,
}

impl fmt::Display for IngestStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            IngestStage::Received => "received",
            IngestStage::Validated => "validated",
            IngestStage::Resolved => "resolved",
            IngestStage::Deduped => "deduped",
            IngestStage::Skipped => "skipped",
            IngestStage::Created => "created",
            IngestStage::Updated => "updated",
            IngestStage::Done => "done",
            IngestStage::Failed => "failed",
        };
        f.write_str(name)
    }
}

impl From<IngestOutcome> for IngestStage {
    fn from(outcome: IngestOutcome) -> Self {
        match outcome {
            IngestOutcome::Created => IngestStage::Created,
            IngestOutcome::Updated => IngestStage::Updated,
            IngestOutcome::Skipped => IngestStage::Skipped,
        }
    }
}

#[derive(Debug, Clone)]
pub struct WorkerSettings {
    /// Feed tag used when a payload does not name its own source.
    pub default_source: String,
    pub resolution_retry: RetryPolicy,
    pub store_retry: RetryPolicy,
}

impl Default for WorkerSettings {
    fn default() -> Self {
        Self {
            default_source: "feed".to_string(),
            resolution_retry: RetryPolicy::resolution_default(),
            store_retry: RetryPolicy::default(),
        }
    }
}

/// Processes one ingestion message at a time. Built once per process and
/// shared between pool tasks; holds no per-message state.
pub struct IngestionWorker<R: MatchRepository + ?Sized> {
    repo: Arc<R>,
    normalizer: KickoffNormalizer,
    settings: WorkerSettings,
    shutdown: Shutdown,
}

impl<R: MatchRepository + ?Sized> IngestionWorker<R> {
    pub fn new(repo: Arc<R>, normalizer: KickoffNormalizer, settings: WorkerSettings) -> Self {
        Self {
            repo,
            normalizer,
            settings,
            shutdown: Shutdown::never(),
        }
    }

    pub fn with_shutdown(mut self, shutdown: Shutdown) -> Self {
        self.shutdown = shutdown;
        self
    }

    pub fn repository(&self) -> &Arc<R> {
        &self.repo
    }

    /// Runs a payload through validation, resolution, dedup and change
    /// detection. Validation failures return immediately; resolution and
    /// transient store failures are retried per the configured policies.
    pub async fn process(&self, payload: &MatchPayload) -> Result<IngestResult, IngestError> {
        debug!(stage = %IngestStage::Received, "home={} away={} date={}", payload.home_team, payload.away_team, payload.match_date);

        match self.run(payload).await {
            Ok(result) => {
                debug!(stage = %IngestStage::from(result.outcome), match_id = result.match_id, "outcome={}", result.outcome);
                debug!(stage = %IngestStage::Done, match_id = result.match_id, "done");
                Ok(result)
            }
            Err(err) => {
                debug!(stage = %IngestStage::Failed, class = %err.class(), "{}", err);
                Err(err)
            }
        }
    }

    async fn run(&self, payload: &MatchPayload) -> Result<IngestResult, IngestError> {
        let valid = validate(payload)?;
        debug!(stage = %IngestStage::Validated, "payload validated");

        let source = valid
            .source
            .clone()
            .unwrap_or_else(|| self.settings.default_source.clone());
        let kickoff = self.normalizer.normalize(valid.match_date, valid.match_time)?;

        let mut shutdown = self.shutdown.clone();
        // Resolution and store failures each spend their own policy's budget.
        let mut resolution_attempts = 0;
        let mut store_attempts = 0;
        loop {
            let err = match self.attempt(&valid, &source, kickoff).await {
                Ok(result) => return Ok(result),
                Err(err) if !err.is_retryable() => return Err(err),
                Err(err) => err,
            };

            let (policy, attempts) = match &err {
                IngestError::Resolution(_) => {
                    resolution_attempts += 1;
                    (&self.settings.resolution_retry, resolution_attempts)
                }
                _ => {
                    store_attempts += 1;
                    (&self.settings.store_retry, store_attempts)
                }
            };

            if attempts >= policy.max_attempts {
                warn!(
                    "Giving up on {} vs {} ({}) after {} attempts: {}",
                    valid.home_team, valid.away_team, valid.match_date, attempts, err
                );
                return Err(IngestError::RetriesExhausted {
                    attempts,
                    last: Box::new(err),
                });
            }

            let delay = policy.backoff(attempts);
            warn!(
                "Attempt {} for {} vs {} failed ({}), retrying in {} ms",
                attempts,
                valid.home_team,
                valid.away_team,
                err,
                delay.as_millis()
            );
            if !shutdown.sleep(delay).await {
                return Err(IngestError::Cancelled);
            }
        }
    }

    async fn attempt(
        &self,
        valid: &ValidatedPayload,
        source: &str,
        kickoff: Option<DateTime<Utc>>,
    ) -> Result<IngestResult, IngestError> {
        let ids = EntityResolver::new(self.repo.as_ref()).resolve(valid).await?;
        debug!(stage = %IngestStage::Resolved, "{:?}", ids);

        let incoming = IncomingState {
            match_status: valid.match_status,
            home_score: valid.home_score,
            away_score: valid.away_score,
            scheduled_kickoff: kickoff,
        };

        if let Some(existing) = self.find_existing(valid, source, &ids).await? {
            return self.apply_changes(&existing, &incoming).await;
        }

        let new_match = NewMatch {
            match_date: valid.match_date,
            home_team_id: ids.home_team_id,
            away_team_id: ids.away_team_id,
            season_id: ids.season_id,
            age_group_id: ids.age_group_id,
            division_id: ids.division_id,
            league_id: ids.league_id,
            home_score: valid.home_score,
            away_score: valid.away_score,
            match_status: valid.match_status,
            scheduled_kickoff: kickoff,
            external_id: valid.external_id.clone(),
            source: valid.external_id.as_ref().map(|_| source.to_string()),
            location: valid.location.clone(),
            match_type: valid.match_type.clone(),
        };

        match self.repo.insert(&new_match).await {
            Ok(match_id) => {
                info!(
                    match_id,
                    "Created match {} vs {} on {}", valid.home_team, valid.away_team, valid.match_date
                );
                Ok(IngestResult {
                    match_id,
                    outcome: IngestOutcome::Created,
                })
            }
            Err(StoreError::DuplicateKey(detail)) => {
                // Another worker inserted the same match first; fold into its row.
                debug!("Insert lost a race ({}), re-reading existing match", detail);
                match self.find_existing(valid, source, &ids).await? {
                    Some(existing) => self.apply_changes(&existing, &incoming).await,
                    None => Err(StoreError::Transient(format!(
                        "duplicate reported but no row visible: {}",
                        detail
                    ))
                    .into()),
                }
            }
            Err(err) => Err(err.into()),
        }
    }

    async fn find_existing(
        &self,
        valid: &ValidatedPayload,
        source: &str,
        ids: &ResolvedIds,
    ) -> Result<Option<MatchRecord>, IngestError> {
        let existing = match &valid.external_id {
            Some(external_id) => self.repo.find_by_external_id(source, external_id).await?,
            None => self.repo.find_by_natural_key(&ids.natural_key(valid)).await?,
        };
        debug!(stage = %IngestStage::Deduped, "existing={:?}", existing.as_ref().map(|m| m.id));
        Ok(existing)
    }

    async fn apply_changes(
        &self,
        existing: &MatchRecord,
        incoming: &IncomingState,
    ) -> Result<IngestResult, IngestError> {
        match detect_changes(existing, incoming) {
            None => {
                debug!(match_id = existing.id, "No changes, skipping");
                Ok(IngestResult {
                    match_id: existing.id,
                    outcome: IngestOutcome::Skipped,
                })
            }
            Some(change) => {
                self.repo.update(existing.id, &change.update).await?;
                info!(match_id = existing.id, "Updated match: {}", change.reason);
                Ok(IngestResult {
                    match_id: existing.id,
                    outcome: IngestOutcome::Updated,
                })
            }
        }
    }
}
