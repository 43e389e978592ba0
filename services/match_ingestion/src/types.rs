use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Raw ingestion message as it arrives from the feed. Nothing here is trusted.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MatchPayload {
    pub home_team: String,
    pub away_team: String,
    pub match_date: String,
    #[serde(default)]
    pub match_time: Option<String>,
    #[serde(default)]
    pub season: Option<String>,
    #[serde(default)]
    pub age_group: Option<String>,
    #[serde(default)]
    pub division: Option<String>,
    #[serde(default)]
    pub league: Option<String>,
    #[serde(default)]
    pub home_score: Option<i32>,
    #[serde(default)]
    pub away_score: Option<i32>,
    #[serde(default)]
    pub match_status: Option<String>,
    #[serde(default)]
    pub external_id: Option<String>,
    #[serde(default)]
    pub location: Option<String>,
    #[serde(default)]
    pub source: Option<String>,
    #[serde(default)]
    pub match_type: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MatchStatus {
    Scheduled,
    Live,
    Completed,
    Forfeit,
    Postponed,
    Cancelled,
}

impl MatchStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            MatchStatus::Scheduled => "scheduled",
            MatchStatus::Live => "live",
            MatchStatus::Completed => "completed",
            MatchStatus::Forfeit => "forfeit",
            MatchStatus::Postponed => "postponed",
            MatchStatus::Cancelled => "cancelled",
        }
    }

    /// Statuses that count towards a standings table.
    pub fn is_final(&self) -> bool {
        matches!(self, MatchStatus::Completed | MatchStatus::Forfeit)
    }
}

impl fmt::Display for MatchStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MatchStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "scheduled" => Ok(MatchStatus::Scheduled),
            "live" => Ok(MatchStatus::Live),
            "completed" => Ok(MatchStatus::Completed),
            "forfeit" => Ok(MatchStatus::Forfeit),
            "postponed" => Ok(MatchStatus::Postponed),
            "cancelled" => Ok(MatchStatus::Cancelled),
            other => Err(format!("unknown match status '{}'", other)),
        }
    }
}

/// A payload that passed structural validation; names are not resolved yet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidatedPayload {
    pub home_team: String,
    pub away_team: String,
    pub match_date: NaiveDate,
    pub match_time: Option<NaiveTime>,
    pub season: String,
    pub age_group: String,
    pub division: Option<String>,
    pub league: Option<String>,
    pub home_score: Option<i32>,
    pub away_score: Option<i32>,
    pub match_status: MatchStatus,
    pub external_id: Option<String>,
    pub location: Option<String>,
    pub source: Option<String>,
    pub match_type: Option<String>,
}

/// Fallback dedup key for matches that carry no external id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NaturalKey {
    pub match_date: NaiveDate,
    pub home_team_id: i64,
    pub away_team_id: i64,
    pub season_id: i64,
    pub age_group_id: i64,
    pub division_id: Option<i64>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MatchRecord {
    pub id: i64,
    pub match_date: NaiveDate,
    pub home_team_id: i64,
    pub away_team_id: i64,
    pub season_id: i64,
    pub age_group_id: i64,
    pub division_id: Option<i64>,
    pub league_id: Option<i64>,
    pub home_score: Option<i32>,
    pub away_score: Option<i32>,
    /// `None` only for legacy rows written before status was tracked.
    pub match_status: Option<MatchStatus>,
    pub scheduled_kickoff: Option<DateTime<Utc>>,
    pub external_id: Option<String>,
    pub source: Option<String>,
    pub location: Option<String>,
    pub match_type: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl MatchRecord {
    pub fn natural_key(&self) -> NaturalKey {
        NaturalKey {
            match_date: self.match_date,
            home_team_id: self.home_team_id,
            away_team_id: self.away_team_id,
            season_id: self.season_id,
            age_group_id: self.age_group_id,
            division_id: self.division_id,
        }
    }
}

/// Full row for a first-sight insert.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NewMatch {
    pub match_date: NaiveDate,
    pub home_team_id: i64,
    pub away_team_id: i64,
    pub season_id: i64,
    pub age_group_id: i64,
    pub division_id: Option<i64>,
    pub league_id: Option<i64>,
    pub home_score: Option<i32>,
    pub away_score: Option<i32>,
    pub match_status: MatchStatus,
    pub scheduled_kickoff: Option<DateTime<Utc>>,
    pub external_id: Option<String>,
    pub source: Option<String>,
    pub location: Option<String>,
    pub match_type: Option<String>,
}

impl NewMatch {
    pub fn natural_key(&self) -> NaturalKey {
        NaturalKey {
            match_date: self.match_date,
            home_team_id: self.home_team_id,
            away_team_id: self.away_team_id,
            season_id: self.season_id,
            age_group_id: self.age_group_id,
            division_id: self.division_id,
        }
    }
}

/// Partial update. `None` leaves the stored column untouched; the nested option
/// on scores lets an update write an explicit null.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct MatchUpdate {
    pub match_status: Option<MatchStatus>,
    pub home_score: Option<Option<i32>>,
    pub away_score: Option<Option<i32>>,
    pub scheduled_kickoff: Option<DateTime<Utc>>,
}

impl MatchUpdate {
    pub fn is_empty(&self) -> bool {
        self.match_status.is_none()
            && self.home_score.is_none()
            && self.away_score.is_none()
            && self.scheduled_kickoff.is_none()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IngestOutcome {
    Created,
    Updated,
    Skipped,
}

impl fmt::Display for IngestOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IngestOutcome::Created => f.write_str("created"),
            IngestOutcome::Updated => f.write_str("updated"),
            IngestOutcome::Skipped => f.write_str("skipped"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct IngestResult {
    pub match_id: i64,
    pub outcome: IngestOutcome,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
pub struct TeamInfo {
    pub id: i64,
    pub name: String,
    pub division_id: Option<i64>,
}

/// Narrows which matches take part in a standings computation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StandingsScope {
    pub season_id: i64,
    pub age_group_id: i64,
    pub division_id: Option<i64>,
    pub match_type: Option<String>,
}
