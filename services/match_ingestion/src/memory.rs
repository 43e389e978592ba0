use crate::error::StoreError;
use crate::repository::MatchRepository;
use crate::types::{MatchRecord, MatchUpdate, NaturalKey, NewMatch, StandingsScope, TeamInfo};
use async_trait::async_trait;
use chrono::Utc;
use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;

#[derive(Default)]
struct State {
    next_id: i64,
    matches: Vec<MatchRecord>,
    teams: Vec<TeamInfo>,
    seasons: HashMap<String, i64>,
    age_groups: HashMap<String, i64>,
    divisions: HashMap<String, i64>,
    leagues: HashMap<String, i64>,
    next_lookup_id: i64,
    injected_failures: VecDeque<StoreError>,
    racing_insert: Option<MatchRecord>,
    writes: usize,
    team_misses: usize,
}

impl State {
    fn take_failure(&mut self) -> Result<(), StoreError> {
        match self.injected_failures.pop_front() {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    fn lookup_id(&mut self) -> i64 {
        self.next_lookup_id += 1;
        self.next_lookup_id
    }
}

/// Repository kept entirely in memory. Enforces the same uniqueness rules as
/// the Postgres schema and can be told to fail upcoming calls.
#[derive(Default)]
pub struct InMemoryRepository {
    state: Mutex<State>,
}

impl InMemoryRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_team(&self, name: &str, division_id: Option<i64>) -> i64 {
        let mut state = self.state.lock().unwrap();
        let id = state.lookup_id();
        state.teams.push(TeamInfo {
            id,
            name: name.to_string(),
            division_id,
        });
        id
    }

    pub fn add_season(&self, name: &str) -> i64 {
        let mut state = self.state.lock().unwrap();
        let id = state.lookup_id();
        state.seasons.insert(name.to_lowercase(), id);
        id
    }

    pub fn add_age_group(&self, name: &str) -> i64 {
        let mut state = self.state.lock().unwrap();
        let id = state.lookup_id();
        state.age_groups.insert(name.to_lowercase(), id);
        id
    }

    pub fn add_division(&self, name: &str) -> i64 {
        let mut state = self.state.lock().unwrap();
        let id = state.lookup_id();
        state.divisions.insert(name.to_lowercase(), id);
        id
    }

    pub fn add_league(&self, name: &str) -> i64 {
        let mut state = self.state.lock().unwrap();
        let id = state.lookup_id();
        state.leagues.insert(name.to_lowercase(), id);
        id
    }

    /// Seed a row directly, bypassing the uniqueness checks.
    pub fn seed_match(&self, record: MatchRecord) {
        let mut state = self.state.lock().unwrap();
        state.next_id = state.next_id.max(record.id);
        state.matches.push(record);
    }

    /// The next store call fails with `err`. Calls queue up in order.
    pub fn fail_next(&self, err: StoreError) {
        self.state.lock().unwrap().injected_failures.push_back(err);
    }

    /// `record` lands just before the next insert runs, as if another worker
    /// won the race for the same match.
    pub fn race_next_insert(&self, record: MatchRecord) {
        self.state.lock().unwrap().racing_insert = Some(record);
    }

    pub fn matches(&self) -> Vec<MatchRecord> {
        self.state.lock().unwrap().matches.clone()
    }

    pub fn get(&self, id: i64) -> Option<MatchRecord> {
        self.state
            .lock()
            .unwrap()
            .matches
            .iter()
            .find(|m| m.id == id)
            .cloned()
    }

    /// Number of team lookups that found nothing.
    pub fn team_misses(&self) -> usize {
        self.state.lock().unwrap().team_misses
    }

    /// Number of successful inserts and updates.
    pub fn write_count(&self) -> usize {
        self.state.lock().unwrap().writes
    }
}

#[async_trait]
impl MatchRepository for InMemoryRepository {
    async fn find_by_external_id(
        &self,
        source: &str,
        external_id: &str,
    ) -> Result<Option<MatchRecord>, StoreError> {
        let mut state = self.state.lock().unwrap();
        state.take_failure()?;
        Ok(state
            .matches
            .iter()
            .find(|m| {
                m.source.as_deref() == Some(source) && m.external_id.as_deref() == Some(external_id)
            })
            .cloned())
    }

    async fn find_by_natural_key(
        &self,
        key: &NaturalKey,
    ) -> Result<Option<MatchRecord>, StoreError> {
        let mut state = self.state.lock().unwrap();
        state.take_failure()?;
        Ok(state
            .matches
            .iter()
            .find(|m| m.natural_key() == *key)
            .cloned())
    }

    async fn insert(&self, new_match: &NewMatch) -> Result<i64, StoreError> {
        let mut state = self.state.lock().unwrap();
        state.take_failure()?;
        if let Some(record) = state.racing_insert.take() {
            state.next_id = state.next_id.max(record.id);
            state.matches.push(record);
        }

        let conflict = state.matches.iter().any(|m| match &new_match.external_id {
            Some(external_id) => {
                m.external_id.as_ref() == Some(external_id) && m.source == new_match.source
            }
            None => m.external_id.is_none() && m.natural_key() == new_match.natural_key(),
        });
        if conflict {
            return Err(StoreError::DuplicateKey(format!(
                "match {:?}/{:?} already exists",
                new_match.source, new_match.external_id
            )));
        }

        state.next_id += 1;
        let id = state.next_id;
        let now = Utc::now();
        state.matches.push(MatchRecord {
            id,
            match_date: new_match.match_date,
            home_team_id: new_match.home_team_id,
            away_team_id: new_match.away_team_id,
            season_id: new_match.season_id,
            age_group_id: new_match.age_group_id,
            division_id: new_match.division_id,
            league_id: new_match.league_id,
            home_score: new_match.home_score,
            away_score: new_match.away_score,
            match_status: Some(new_match.match_status),
            scheduled_kickoff: new_match.scheduled_kickoff,
            external_id: new_match.external_id.clone(),
            source: new_match.source.clone(),
            location: new_match.location.clone(),
            match_type: new_match.match_type.clone(),
            created_at: now,
            updated_at: now,
        });
        state.writes += 1;
        Ok(id)
    }

    async fn update(&self, id: i64, update: &MatchUpdate) -> Result<(), StoreError> {
        let mut state = self.state.lock().unwrap();
        state.take_failure()?;

        let record = state
            .matches
            .iter_mut()
            .find(|m| m.id == id)
            .ok_or_else(|| StoreError::Other(format!("match {} not found for update", id)))?;
        if let Some(status) = update.match_status {
            record.match_status = Some(status);
        }
        if let Some(home_score) = update.home_score {
            record.home_score = home_score;
        }
        if let Some(away_score) = update.away_score {
            record.away_score = away_score;
        }
        if let Some(kickoff) = update.scheduled_kickoff {
            record.scheduled_kickoff = Some(kickoff);
        }
        record.updated_at = Utc::now();
        state.writes += 1;
        Ok(())
    }

    async fn resolve_team(&self, name: &str) -> Result<Option<i64>, StoreError> {
        let mut state = self.state.lock().unwrap();
        state.take_failure()?;
        let id = state.teams.iter().find(|t| t.name == name).map(|t| t.id);
        if id.is_none() {
            state.team_misses += 1;
        }
        Ok(id)
    }

    async fn resolve_season(&self, name: &str) -> Result<Option<i64>, StoreError> {
        let mut state = self.state.lock().unwrap();
        state.take_failure()?;
        Ok(state.seasons.get(&name.to_lowercase()).copied())
    }

    async fn resolve_age_group(&self, name: &str) -> Result<Option<i64>, StoreError> {
        let mut state = self.state.lock().unwrap();
        state.take_failure()?;
        Ok(state.age_groups.get(&name.to_lowercase()).copied())
    }

    async fn resolve_division(&self, name: &str) -> Result<Option<i64>, StoreError> {
        let mut state = self.state.lock().unwrap();
        state.take_failure()?;
        Ok(state.divisions.get(&name.to_lowercase()).copied())
    }

    async fn resolve_league(&self, name: &str) -> Result<Option<i64>, StoreError> {
        let mut state = self.state.lock().unwrap();
        state.take_failure()?;
        Ok(state.leagues.get(&name.to_lowercase()).copied())
    }

    async fn list_matches(&self, scope: &StandingsScope) -> Result<Vec<MatchRecord>, StoreError> {
        let mut state = self.state.lock().unwrap();
        state.take_failure()?;
        Ok(state
            .matches
            .iter()
            .filter(|m| m.season_id == scope.season_id && m.age_group_id == scope.age_group_id)
            .filter(|m| scope.division_id.map_or(true, |d| m.division_id == Some(d)))
            .filter(|m| {
                scope
                    .match_type
                    .as_ref()
                    .map_or(true, |t| m.match_type.as_ref() == Some(t))
            })
            .cloned()
            .collect())
    }

    async fn list_teams(&self, ids: &[i64]) -> Result<Vec<TeamInfo>, StoreError> {
        let mut state = self.state.lock().unwrap();
        state.take_failure()?;
        Ok(state
            .teams
            .iter()
            .filter(|t| ids.contains(&t.id))
            .cloned()
            .collect())
    }
}
