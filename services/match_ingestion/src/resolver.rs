use crate::error::{EntityKind, IngestError, ResolutionError, Unresolved, ValidationError};
use crate::repository::MatchRepository;
use crate::types::{NaturalKey, ValidatedPayload};
use tracing::warn;

/// Internal ids for every name a payload references.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResolvedIds {
    pub home_team_id: i64,
    pub away_team_id: i64,
    pub season_id: i64,
    pub age_group_id: i64,
    pub division_id: Option<i64>,
    pub league_id: Option<i64>,
}

impl ResolvedIds {
    pub fn natural_key(&self, payload: &ValidatedPayload) -> NaturalKey {
        NaturalKey {
            match_date: payload.match_date,
            home_team_id: self.home_team_id,
            away_team_id: self.away_team_id,
            season_id: self.season_id,
            age_group_id: self.age_group_id,
            division_id: self.division_id,
        }
    }
}

pub struct EntityResolver<'a, R: MatchRepository + ?Sized> {
    repo: &'a R,
}

impl<'a, R: MatchRepository + ?Sized> EntityResolver<'a, R> {
    pub fn new(repo: &'a R) -> Self {
        Self { repo }
    }

    /// Resolves every name on the payload. Unknown teams, seasons, age groups
    /// and supplied divisions are collected into one [`ResolutionError`]; an
    /// unknown league is dropped with a warning.
    pub async fn resolve(&self, payload: &ValidatedPayload) -> Result<ResolvedIds, IngestError> {
        let mut unresolved = Vec::new();

        let home_team_id = self.required(
            self.repo.resolve_team(&payload.home_team).await?,
            EntityKind::Team,
            &payload.home_team,
            &mut unresolved,
        );
        let away_team_id = self.required(
            self.repo.resolve_team(&payload.away_team).await?,
            EntityKind::Team,
            &payload.away_team,
            &mut unresolved,
        );
        let season_id = self.required(
            self.repo.resolve_season(&payload.season).await?,
            EntityKind::Season,
            &payload.season,
            &mut unresolved,
        );
        let age_group_id = self.required(
            self.repo.resolve_age_group(&payload.age_group).await?,
            EntityKind::AgeGroup,
            &payload.age_group,
            &mut unresolved,
        );

        let division_id = match &payload.division {
            Some(name) => self.required(
                self.repo.resolve_division(name).await?,
                EntityKind::Division,
                name,
                &mut unresolved,
            ),
            None => None,
        };

        let league_id = match &payload.league {
            Some(name) => {
                let id = self.repo.resolve_league(name).await?;
                if id.is_none() {
                    warn!("League '{}' not found, storing match without league", name);
                }
                id
            }
            None => None,
        };

        match (home_team_id, away_team_id, season_id, age_group_id) {
            (Some(home_team_id), Some(away_team_id), Some(season_id), Some(age_group_id))
                if unresolved.is_empty() =>
            {
                if home_team_id == away_team_id {
                    return Err(ValidationError::SameTeam(payload.home_team.clone()).into());
                }
                Ok(ResolvedIds {
                    home_team_id,
                    away_team_id,
                    season_id,
                    age_group_id,
                    division_id,
                    league_id,
                })
            }
            _ => Err(ResolutionError { unresolved }.into()),
        }
    }

    fn required(
        &self,
        id: Option<i64>,
        kind: EntityKind,
        name: &str,
        unresolved: &mut Vec<Unresolved>,
    ) -> Option<i64> {
        if id.is_none() {
            unresolved.push(Unresolved {
                kind,
                name: name.to_string(),
            });
        }
        id
    }
}
