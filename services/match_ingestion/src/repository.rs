use crate::error::StoreError;
use crate::types::{
    MatchRecord, MatchStatus, MatchUpdate, NaturalKey, NewMatch, StandingsScope, TeamInfo,
};
use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use sqlx::{postgres::PgPoolOptions, PgPool, Postgres, QueryBuilder};
use tracing::{debug, warn};

/// Store operations the ingestion core and the standings read path need.
///
/// Implementations must enforce uniqueness of `(source, external_id)` and of
/// the natural key for rows without an external id, reporting a violation as
/// [`StoreError::DuplicateKey`].
#[async_trait]
pub trait MatchRepository: Send + Sync {
    async fn find_by_external_id(
        &self,
        source: &str,
        external_id: &str,
    ) -> Result<Option<MatchRecord>, StoreError>;

    async fn find_by_natural_key(&self, key: &NaturalKey)
        -> Result<Option<MatchRecord>, StoreError>;

    async fn insert(&self, new_match: &NewMatch) -> Result<i64, StoreError>;

    async fn update(&self, id: i64, update: &MatchUpdate) -> Result<(), StoreError>;

    /// Exact, case-sensitive.
    async fn resolve_team(&self, name: &str) -> Result<Option<i64>, StoreError>;

    async fn resolve_season(&self, name: &str) -> Result<Option<i64>, StoreError>;

    async fn resolve_age_group(&self, name: &str) -> Result<Option<i64>, StoreError>;

    async fn resolve_division(&self, name: &str) -> Result<Option<i64>, StoreError>;

    async fn resolve_league(&self, name: &str) -> Result<Option<i64>, StoreError>;

    async fn list_matches(&self, scope: &StandingsScope) -> Result<Vec<MatchRecord>, StoreError>;

    async fn list_teams(&self, ids: &[i64]) -> Result<Vec<TeamInfo>, StoreError>;
}

#[derive(Debug, sqlx::FromRow)]
struct MatchRow {
    id: i64,
    match_date: NaiveDate,
    home_team_id: i64,
    away_team_id: i64,
    season_id: i64,
    age_group_id: i64,
    division_id: Option<i64>,
    league_id: Option<i64>,
    home_score: Option<i32>,
    away_score: Option<i32>,
    match_status: Option<String>,
    scheduled_kickoff: Option<DateTime<Utc>>,
    external_id: Option<String>,
    source: Option<String>,
    location: Option<String>,
    match_type: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<MatchRow> for MatchRecord {
    fn from(row: MatchRow) -> Self {
        let match_status = row.match_status.as_deref().and_then(|s| match s.parse::<MatchStatus>() {
            Ok(status) => Some(status),
            Err(e) => {
                warn!("Match {} has unreadable status: {}", row.id, e);
                None
            }
        });
        Self {
            id: row.id,
            match_date: row.match_date,
            home_team_id: row.home_team_id,
            away_team_id: row.away_team_id,
            season_id: row.season_id,
            age_group_id: row.age_group_id,
            division_id: row.division_id,
            league_id: row.league_id,
            home_score: row.home_score,
            away_score: row.away_score,
            match_status,
            scheduled_kickoff: row.scheduled_kickoff,
            external_id: row.external_id,
            source: row.source,
            location: row.location,
            match_type: row.match_type,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

const MATCH_COLUMNS: &str = r#"
    id, match_date, home_team_id, away_team_id, season_id, age_group_id,
    division_id, league_id, home_score, away_score, match_status,
    scheduled_kickoff, external_id, source, location, match_type,
    created_at, updated_at
"#;

/// PostgreSQL-backed repository.
///
/// Expects `matches(source, external_id)` to be unique where `external_id` is
/// not null, and a partial unique index over the natural key columns where it
/// is null.
#[derive(Debug, Clone)]
pub struct PgMatchRepository {
    pool: PgPool,
}

impl PgMatchRepository {
    pub async fn connect(database_url: &str, max_connections: u32) -> Result<Self, StoreError> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .connect(database_url)
            .await?;
        Ok(Self { pool })
    }

    pub fn from_pool(pool: PgPool) -> Self {
        Self { pool }
    }

    async fn resolve_by_name_ci(&self, table: &str, name: &str) -> Result<Option<i64>, StoreError> {
        let sql = format!("SELECT id FROM {} WHERE lower(name) = lower($1) LIMIT 1", table);
        let id: Option<i64> = sqlx::query_scalar(&sql)
            .bind(name)
            .fetch_optional(&self.pool)
            .await?;
        Ok(id)
    }
}

#[async_trait]
impl MatchRepository for PgMatchRepository {
    async fn find_by_external_id(
        &self,
        source: &str,
        external_id: &str,
    ) -> Result<Option<MatchRecord>, StoreError> {
        let sql = format!(
            "SELECT {} FROM matches WHERE source = $1 AND external_id = $2",
            MATCH_COLUMNS
        );
        let row = sqlx::query_as::<_, MatchRow>(&sql)
            .bind(source)
            .bind(external_id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.map(MatchRecord::from))
    }

    async fn find_by_natural_key(
        &self,
        key: &NaturalKey,
    ) -> Result<Option<MatchRecord>, StoreError> {
        let sql = format!(
            r#"
            SELECT {} FROM matches
            WHERE match_date = $1
              AND home_team_id = $2
              AND away_team_id = $3
              AND season_id = $4
              AND age_group_id = $5
              AND division_id IS NOT DISTINCT FROM $6
            ORDER BY id
            LIMIT 1
            "#,
            MATCH_COLUMNS
        );
        let row = sqlx::query_as::<_, MatchRow>(&sql)
            .bind(key.match_date)
            .bind(key.home_team_id)
            .bind(key.away_team_id)
            .bind(key.season_id)
            .bind(key.age_group_id)
            .bind(key.division_id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.map(MatchRecord::from))
    }

    async fn insert(&self, new_match: &NewMatch) -> Result<i64, StoreError> {
        let id: i64 = sqlx::query_scalar(
            r#"
            INSERT INTO matches (
                match_date, home_team_id, away_team_id, season_id, age_group_id,
                division_id, league_id, home_score, away_score, match_status,
                scheduled_kickoff, external_id, source, location, match_type,
                created_at, updated_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, NOW(), NOW())
            RETURNING id
            "#,
        )
        .bind(new_match.match_date)
        .bind(new_match.home_team_id)
        .bind(new_match.away_team_id)
        .bind(new_match.season_id)
        .bind(new_match.age_group_id)
        .bind(new_match.division_id)
        .bind(new_match.league_id)
        .bind(new_match.home_score)
        .bind(new_match.away_score)
        .bind(new_match.match_status.as_str())
        .bind(new_match.scheduled_kickoff)
        .bind(new_match.external_id.as_deref())
        .bind(new_match.source.as_deref())
        .bind(new_match.location.as_deref())
        .bind(new_match.match_type.as_deref())
        .fetch_one(&self.pool)
        .await?;
        Ok(id)
    }

    async fn update(&self, id: i64, update: &MatchUpdate) -> Result<(), StoreError> {
        if update.is_empty() {
            return Ok(());
        }

        let mut builder: QueryBuilder<Postgres> = QueryBuilder::new("UPDATE matches SET ");
        let mut set = builder.separated(", ");
        if let Some(status) = update.match_status {
            set.push("match_status = ").push_bind_unseparated(status.as_str());
        }
        if let Some(home_score) = update.home_score {
            set.push("home_score = ").push_bind_unseparated(home_score);
        }
        if let Some(away_score) = update.away_score {
            set.push("away_score = ").push_bind_unseparated(away_score);
        }
        if let Some(kickoff) = update.scheduled_kickoff {
            set.push("scheduled_kickoff = ").push_bind_unseparated(kickoff);
        }
        set.push("updated_at = NOW()");
        builder.push(" WHERE id = ").push_bind(id);

        let result = builder.build().execute(&self.pool).await?;
        if result.rows_affected() == 0 {
            return Err(StoreError::Other(format!("match {} not found for update", id)));
        }
        debug!("Updated match {} ({:?})", id, update);
        Ok(())
    }

    async fn resolve_team(&self, name: &str) -> Result<Option<i64>, StoreError> {
        let id: Option<i64> = sqlx::query_scalar("SELECT id FROM teams WHERE name = $1 LIMIT 1")
            .bind(name)
            .fetch_optional(&self.pool)
            .await?;
        Ok(id)
    }

    async fn resolve_season(&self, name: &str) -> Result<Option<i64>, StoreError> {
        self.resolve_by_name_ci("seasons", name).await
    }

    async fn resolve_age_group(&self, name: &str) -> Result<Option<i64>, StoreError> {
        self.resolve_by_name_ci("age_groups", name).await
    }

    async fn resolve_division(&self, name: &str) -> Result<Option<i64>, StoreError> {
        self.resolve_by_name_ci("divisions", name).await
    }

    async fn resolve_league(&self, name: &str) -> Result<Option<i64>, StoreError> {
        self.resolve_by_name_ci("leagues", name).await
    }

    async fn list_matches(&self, scope: &StandingsScope) -> Result<Vec<MatchRecord>, StoreError> {
        let sql = format!(
            r#"
            SELECT {} FROM matches
            WHERE season_id = $1
              AND age_group_id = $2
              AND ($3::BIGINT IS NULL OR division_id = $3)
              AND ($4::TEXT IS NULL OR match_type = $4)
            ORDER BY match_date, id
            "#,
            MATCH_COLUMNS
        );
        let rows = sqlx::query_as::<_, MatchRow>(&sql)
            .bind(scope.season_id)
            .bind(scope.age_group_id)
            .bind(scope.division_id)
            .bind(scope.match_type.as_deref())
            .fetch_all(&self.pool)
            .await?;
        Ok(rows.into_iter().map(MatchRecord::from).collect())
    }

    async fn list_teams(&self, ids: &[i64]) -> Result<Vec<TeamInfo>, StoreError> {
        let teams = sqlx::query_as::<_, TeamInfo>(
            "SELECT id, name, division_id FROM teams WHERE id = ANY($1) ORDER BY id",
        )
        .bind(ids)
        .fetch_all(&self.pool)
        .await?;
        Ok(teams)
    }
}
