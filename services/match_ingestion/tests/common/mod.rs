#![allow(dead_code)]

use std::sync::Arc;

use match_ingestion::kickoff::KickoffNormalizer;
use match_ingestion::memory::InMemoryRepository;
use match_ingestion::retry::RetryPolicy;
use match_ingestion::types::MatchPayload;
use match_ingestion::worker::{IngestionWorker, WorkerSettings};

pub const SOURCE: &str = "league-feed";

pub struct League {
    pub repo: Arc<InMemoryRepository>,
    pub team_a: i64,
    pub team_b: i64,
    pub team_c: i64,
    pub season: i64,
    pub age_group: i64,
    pub division: i64,
}

/// Three teams in "Premier", one season, one age group.
pub fn league() -> League {
    let repo = Arc::new(InMemoryRepository::new());
    let division = repo.add_division("Premier");
    let team_a = repo.add_team("Team A", Some(division));
    let team_b = repo.add_team("Team B", Some(division));
    let team_c = repo.add_team("Team C", None);
    let season = repo.add_season("2024-2025");
    let age_group = repo.add_age_group("U14");
    League {
        repo,
        team_a,
        team_b,
        team_c,
        season,
        age_group,
        division,
    }
}

pub fn settings() -> WorkerSettings {
    WorkerSettings {
        default_source: SOURCE.to_string(),
        resolution_retry: RetryPolicy::no_delay(3),
        store_retry: RetryPolicy::no_delay(4),
    }
}

pub fn worker(repo: &Arc<InMemoryRepository>) -> IngestionWorker<InMemoryRepository> {
    IngestionWorker::new(
        Arc::clone(repo),
        KickoffNormalizer::from_name("America/New_York").unwrap(),
        settings(),
    )
}

/// Team A at home to Team B on 2024-10-15, still scheduled.
pub fn fixture(external_id: &str) -> MatchPayload {
    MatchPayload {
        home_team: "Team A".into(),
        away_team: "Team B".into(),
        match_date: "2024-10-15".into(),
        season: Some("2024-2025".into()),
        age_group: Some("U14".into()),
        division: Some("premier".into()),
        external_id: Some(external_id.into()),
        ..Default::default()
    }
}

pub fn result(external_id: &str, home: i32, away: i32) -> MatchPayload {
    MatchPayload {
        home_score: Some(home),
        away_score: Some(away),
        match_status: Some("completed".into()),
        ..fixture(external_id)
    }
}
