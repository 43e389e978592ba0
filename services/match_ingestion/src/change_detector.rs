use crate::types::{MatchRecord, MatchStatus, MatchUpdate};
use chrono::{DateTime, Utc};
use std::fmt;

/// The incoming values the detector compares against a stored row.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IncomingState {
    pub match_status: MatchStatus,
    pub home_score: Option<i32>,
    pub away_score: Option<i32>,
    /// `None` when the payload carried no local kickoff time.
    pub scheduled_kickoff: Option<DateTime<Utc>>,
}

/// First check that fired, in precedence order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeReason {
    Status,
    Score,
    Kickoff,
}

impl fmt::Display for ChangeReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ChangeReason::Status => f.write_str("status changed"),
            ChangeReason::Score => f.write_str("score changed"),
            ChangeReason::Kickoff => f.write_str("kickoff changed"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChangeSet {
    pub reason: ChangeReason,
    pub update: MatchUpdate,
}

/// Compares a stored match with freshly resolved values.
///
/// Returns `None` when nothing needs writing. An absent incoming kickoff never
/// produces a change, so a stored kickoff is never cleared.
pub fn detect_changes(existing: &MatchRecord, incoming: &IncomingState) -> Option<ChangeSet> {
    let mut update = MatchUpdate::default();
    let mut reason = None;

    if existing.match_status != Some(incoming.match_status) {
        update.match_status = Some(incoming.match_status);
        reason.get_or_insert(ChangeReason::Status);
    }

    if existing.home_score != incoming.home_score || existing.away_score != incoming.away_score {
        if existing.home_score != incoming.home_score {
            update.home_score = Some(incoming.home_score);
        }
        if existing.away_score != incoming.away_score {
            update.away_score = Some(incoming.away_score);
        }
        reason.get_or_insert(ChangeReason::Score);
    }

    if let Some(kickoff) = incoming.scheduled_kickoff {
        if existing.scheduled_kickoff != Some(kickoff) {
            update.scheduled_kickoff = Some(kickoff);
            reason.get_or_insert(ChangeReason::Kickoff);
        }
    }

    reason.map(|reason| ChangeSet { reason, update })
}

pub fn needs_update(existing: &MatchRecord, incoming: &IncomingState) -> bool {
    detect_changes(existing, incoming).is_some()
}
