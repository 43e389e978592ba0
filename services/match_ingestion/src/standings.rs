use crate::types::{MatchRecord, TeamInfo};
use chrono::{NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

const WIN_POINTS: u32 = 3;
const DRAW_POINTS: u32 = 1;

/// One line of a league table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TeamRow {
    pub team_id: i64,
    pub team: String,
    pub played: u32,
    pub wins: u32,
    pub draws: u32,
    pub losses: u32,
    pub goals_for: i64,
    pub goals_against: i64,
    pub goal_difference: i64,
    pub points: u32,
}

impl TeamRow {
    fn new(team_id: i64, team: String) -> Self {
        Self {
            team_id,
            team,
            played: 0,
            wins: 0,
            draws: 0,
            losses: 0,
            goals_for: 0,
            goals_against: 0,
            goal_difference: 0,
            points: 0,
        }
    }

    fn record(&mut self, scored: i32, conceded: i32) {
        self.played += 1;
        self.goals_for += i64::from(scored);
        self.goals_against += i64::from(conceded);
        if scored > conceded {
            self.wins += 1;
            self.points += WIN_POINTS;
        } else if scored == conceded {
            self.draws += 1;
            self.points += DRAW_POINTS;
        } else {
            self.losses += 1;
        }
    }
}

pub type TeamDirectory = HashMap<i64, TeamInfo>;

pub fn team_directory(teams: impl IntoIterator<Item = TeamInfo>) -> TeamDirectory {
    teams.into_iter().map(|team| (team.id, team)).collect()
}

/// Whether a match counts towards the table. Rows with no status at all are
/// legacy data and count once their date has passed.
pub fn is_eligible(record: &MatchRecord, today: NaiveDate) -> bool {
    match record.match_status {
        Some(status) => status.is_final(),
        None => record.match_date <= today,
    }
}

fn in_division(teams: &TeamDirectory, team_id: i64, division_id: i64) -> bool {
    teams
        .get(&team_id)
        .map_or(false, |team| team.division_id == Some(division_id))
}

pub fn compute_table(
    matches: &[MatchRecord],
    teams: &TeamDirectory,
    division_id: Option<i64>,
) -> Vec<TeamRow> {
    compute_table_on(matches, teams, division_id, Utc::now().date_naive())
}

/// Builds the ranked table as of `today`.
///
/// With a division filter, a match counts only if both teams belong to that
/// division. Matches missing either score are ignored. Ties on points, goal
/// difference and goals scored keep the order in which teams were first seen.
pub fn compute_table_on(
    matches: &[MatchRecord],
    teams: &TeamDirectory,
    division_id: Option<i64>,
    today: NaiveDate,
) -> Vec<TeamRow> {
    let mut rows: Vec<TeamRow> = Vec::new();
    let mut index: HashMap<i64, usize> = HashMap::new();

    let mut row_for = |team_id: i64, rows: &mut Vec<TeamRow>| -> usize {
        *index.entry(team_id).or_insert_with(|| {
            let name = teams
                .get(&team_id)
                .map(|t| t.name.clone())
                .unwrap_or_else(|| format!("team #{}", team_id));
            rows.push(TeamRow::new(team_id, name));
            rows.len() - 1
        })
    };

    for record in matches.iter().filter(|m| is_eligible(m, today)) {
        if let Some(division_id) = division_id {
            if !in_division(teams, record.home_team_id, division_id)
                || !in_division(teams, record.away_team_id, division_id)
            {
                continue;
            }
        }

        let (Some(home_score), Some(away_score)) = (record.home_score, record.away_score) else {
            continue;
        };

        let home = row_for(record.home_team_id, &mut rows);
        rows[home].record(home_score, away_score);
        let away = row_for(record.away_team_id, &mut rows);
        rows[away].record(away_score, home_score);
    }

    for row in rows.iter_mut() {
        row.goal_difference = row.goals_for - row.goals_against;
    }

    // sort_by is stable
    rows.sort_by(|a, b| {
        (b.points, b.goal_difference, b.goals_for).cmp(&(a.points, a.goal_difference, a.goals_for))
    });
    rows
}
