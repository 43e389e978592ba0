use crate::error::ValidationError;
use crate::types::{MatchPayload, MatchStatus, ValidatedPayload};
use chrono::{NaiveDate, NaiveTime};

fn required(value: &str, field: &'static str) -> Result<String, ValidationError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(ValidationError::MissingField(field));
    }
    Ok(trimmed.to_string())
}

/// Team names are matched exactly downstream, so they are not trimmed.
fn team_name(value: &str, field: &'static str) -> Result<String, ValidationError> {
    let trimmed = required(value, field)?;
    if trimmed != value {
        return Err(ValidationError::PaddedName(field));
    }
    Ok(trimmed)
}

fn required_opt(value: Option<&str>, field: &'static str) -> Result<String, ValidationError> {
    required(value.unwrap_or_default(), field)
}

/// Blank strings are treated the same as a missing field.
fn optional(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

fn parse_time(raw: &str) -> Result<NaiveTime, ValidationError> {
    NaiveTime::parse_from_str(raw, "%H:%M:%S")
        .or_else(|_| NaiveTime::parse_from_str(raw, "%H:%M"))
        .map_err(|_| ValidationError::InvalidTime(raw.to_string()))
}

fn check_score(value: Option<i32>, field: &'static str) -> Result<(), ValidationError> {
    match value {
        Some(v) if v < 0 => Err(ValidationError::NegativeScore { field, value: v }),
        _ => Ok(()),
    }
}

/// Checks a raw payload and turns it into typed fields. Any error returned here
/// is terminal: a malformed payload will never become valid on retry.
pub fn validate(payload: &MatchPayload) -> Result<ValidatedPayload, ValidationError> {
    let home_team = team_name(&payload.home_team, "home_team")?;
    let away_team = team_name(&payload.away_team, "away_team")?;
    let raw_date = required(&payload.match_date, "match_date")?;
    let season = required_opt(payload.season.as_deref(), "season")?;
    let age_group = required_opt(payload.age_group.as_deref(), "age_group")?;

    if home_team == away_team {
        return Err(ValidationError::SameTeam(home_team));
    }

    let match_date = NaiveDate::parse_from_str(&raw_date, "%Y-%m-%d")
        .map_err(|_| ValidationError::InvalidDate(raw_date.clone()))?;

    let match_time = optional(payload.match_time.as_deref())
        .map(|raw| parse_time(&raw))
        .transpose()?;

    let match_status = match optional(payload.match_status.as_deref()) {
        Some(raw) => raw.parse::<MatchStatus>().map_err(ValidationError::InvalidStatus)?,
        None => MatchStatus::Scheduled,
    };

    check_score(payload.home_score, "home_score")?;
    check_score(payload.away_score, "away_score")?;
    if payload.home_score.is_some() != payload.away_score.is_some() {
        return Err(ValidationError::PartialScore);
    }
    if match_status.is_final() && payload.home_score.is_none() {
        return Err(ValidationError::MissingScores(match_status));
    }

    Ok(ValidatedPayload {
        home_team,
        away_team,
        match_date,
        match_time,
        season,
        age_group,
        division: optional(payload.division.as_deref()),
        league: optional(payload.league.as_deref()),
        home_score: payload.home_score,
        away_score: payload.away_score,
        match_status,
        external_id: optional(payload.external_id.as_deref()),
        location: optional(payload.location.as_deref()),
        source: optional(payload.source.as_deref()),
        match_type: optional(payload.match_type.as_deref()),
    })
}
