mod common;

use chrono::NaiveDate;
use pretty_assertions::assert_eq;
use test_log::test;

use common::{fixture, league, result, worker, League};
use match_ingestion::repository::MatchRepository;
use match_ingestion::standings::{compute_table_on, team_directory, TeamRow};
use match_ingestion::types::{MatchPayload, StandingsScope};

async fn table(league: &League, scope: &StandingsScope) -> Vec<TeamRow> {
    let matches = league.repo.list_matches(scope).await.unwrap();
    let ids: Vec<i64> = matches
        .iter()
        .flat_map(|m| [m.home_team_id, m.away_team_id])
        .collect();
    let teams = team_directory(league.repo.list_teams(&ids).await.unwrap());
    let today = NaiveDate::from_ymd_opt(2025, 1, 1).unwrap();
    compute_table_on(&matches, &teams, scope.division_id, today)
}

fn scope(league: &League) -> StandingsScope {
    StandingsScope {
        season_id: league.season,
        age_group_id: league.age_group,
        ..Default::default()
    }
}

#[test(tokio::test)]
async fn test_ingested_result_appears_in_table() {
    let league = league();
    let worker = worker(&league.repo);
    worker.process(&result("e2e", 2, 1)).await.unwrap();

    let rows = table(&league, &scope(&league)).await;
    assert_eq!(
        rows,
        vec![
            TeamRow {
                team_id: league.team_a,
                team: "Team A".into(),
                played: 1,
                wins: 1,
                draws: 0,
                losses: 0,
                goals_for: 2,
                goals_against: 1,
                goal_difference: 1,
                points: 3,
            },
            TeamRow {
                team_id: league.team_b,
                team: "Team B".into(),
                played: 1,
                wins: 0,
                draws: 0,
                losses: 1,
                goals_for: 1,
                goals_against: 2,
                goal_difference: -1,
                points: 0,
            },
        ]
    );
}

#[test(tokio::test)]
async fn test_scheduled_fixtures_do_not_count_until_completed() {
    let league = league();
    let worker = worker(&league.repo);
    worker.process(&fixture("later")).await.unwrap();
    assert!(table(&league, &scope(&league)).await.is_empty());

    worker.process(&result("later", 1, 1)).await.unwrap();
    let rows = table(&league, &scope(&league)).await;
    assert!(rows.iter().all(|r| r.draws == 1 && r.points == 1));
}

#[test(tokio::test)]
async fn test_division_table_excludes_outsiders() {
    let league = league();
    let worker = worker(&league.repo);
    worker.process(&result("in", 2, 0)).await.unwrap();
    // Team C is not registered in Premier, even though the match is filed there.
    worker
        .process(&MatchPayload {
            home_team: "Team C".into(),
            ..result("cross", 5, 0)
        })
        .await
        .unwrap();

    let mut division_scope = scope(&league);
    division_scope.division_id = Some(league.division);
    let rows = table(&league, &division_scope).await;

    assert_eq!(rows.len(), 2);
    assert!(rows.iter().all(|r| r.team_id != league.team_c));
    let team_b = rows.iter().find(|r| r.team_id == league.team_b).unwrap();
    assert_eq!(team_b.played, 1);

    let everyone = table(&league, &scope(&league)).await;
    assert_eq!(everyone[0].team_id, league.team_c);
}

#[test(tokio::test)]
async fn test_match_type_scopes_the_table() {
    let league = league();
    let worker = worker(&league.repo);
    worker
        .process(&MatchPayload {
            match_type: Some("league".into()),
            ..result("l-1", 1, 0)
        })
        .await
        .unwrap();
    worker
        .process(&MatchPayload {
            match_type: Some("friendly".into()),
            ..result("f-1", 0, 4)
        })
        .await
        .unwrap();

    let mut league_only = scope(&league);
    league_only.match_type = Some("league".into());
    let rows = table(&league, &league_only).await;
    assert_eq!(rows[0].team_id, league.team_a);
    assert_eq!(rows[0].played, 1);
}
