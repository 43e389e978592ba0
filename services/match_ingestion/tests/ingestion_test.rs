mod common;

use chrono::{TimeZone, Utc};
use pretty_assertions::assert_eq;
use std::time::Duration;
use test_log::test;

use common::{fixture, league, result, settings, worker, SOURCE};
use match_ingestion::error::{FailureClass, IngestError, StoreError};
use match_ingestion::kickoff::KickoffNormalizer;
use match_ingestion::retry::{shutdown_channel, RetryPolicy};
use match_ingestion::types::{IngestOutcome, MatchPayload, MatchStatus};
use match_ingestion::worker::{IngestionWorker, WorkerSettings};

#[test(tokio::test)]
async fn test_replaying_unchanged_payload_is_a_noop() {
    let league = league();
    let worker = worker(&league.repo);

    let first = worker.process(&fixture("m-1")).await.unwrap();
    let second = worker.process(&fixture("m-1")).await.unwrap();
    let third = worker.process(&fixture("m-1")).await.unwrap();

    assert_eq!(first.outcome, IngestOutcome::Created);
    assert_eq!(second.outcome, IngestOutcome::Skipped);
    assert_eq!(third.outcome, IngestOutcome::Skipped);
    assert_eq!(second.match_id, first.match_id);
    assert_eq!(league.repo.matches().len(), 1);
    assert_eq!(league.repo.write_count(), 1);
}

#[test(tokio::test)]
async fn test_result_arrives_for_scheduled_fixture() {
    let league = league();
    let worker = worker(&league.repo);

    let created = worker.process(&fixture("m-2")).await.unwrap();
    let updated = worker.process(&result("m-2", 2, 1)).await.unwrap();
    let replay = worker.process(&result("m-2", 2, 1)).await.unwrap();

    assert_eq!(updated.outcome, IngestOutcome::Updated);
    assert_eq!(replay.outcome, IngestOutcome::Skipped);
    assert_eq!(updated.match_id, created.match_id);

    let stored = league.repo.get(created.match_id).unwrap();
    assert_eq!(stored.match_status, Some(MatchStatus::Completed));
    assert_eq!((stored.home_score, stored.away_score), (Some(2), Some(1)));
    assert_eq!(stored.home_team_id, league.team_a);
    assert_eq!(stored.away_team_id, league.team_b);
    assert_eq!(stored.division_id, Some(league.division));
    assert_eq!(league.repo.write_count(), 2);
}

#[test(tokio::test)]
async fn test_score_correction_updates_again() {
    let league = league();
    let worker = worker(&league.repo);

    worker.process(&result("m-3", 2, 1)).await.unwrap();
    let corrected = worker.process(&result("m-3", 2, 2)).await.unwrap();

    assert_eq!(corrected.outcome, IngestOutcome::Updated);
    assert_eq!(league.repo.get(corrected.match_id).unwrap().away_score, Some(2));
}

#[test(tokio::test)]
async fn test_kickoff_follows_daylight_saving() {
    let league = league();
    let worker = worker(&league.repo);

    let winter = worker
        .process(&MatchPayload {
            match_date: "2024-01-15".into(),
            match_time: Some("14:00".into()),
            ..fixture("winter")
        })
        .await
        .unwrap();
    let summer = worker
        .process(&MatchPayload {
            match_date: "2024-07-15".into(),
            match_time: Some("14:00".into()),
            ..fixture("summer")
        })
        .await
        .unwrap();

    let winter = league.repo.get(winter.match_id).unwrap().scheduled_kickoff.unwrap();
    let summer = league.repo.get(summer.match_id).unwrap().scheduled_kickoff.unwrap();
    assert_eq!(winter, Utc.with_ymd_and_hms(2024, 1, 15, 19, 0, 0).unwrap());
    assert_eq!(summer, Utc.with_ymd_and_hms(2024, 7, 15, 18, 0, 0).unwrap());
}

#[test(tokio::test)]
async fn test_kickoff_backfill_never_regresses() {
    let league = league();
    let worker = worker(&league.repo);
    let timed = MatchPayload {
        match_time: Some("10:30".into()),
        ..fixture("m-4")
    };

    let created = worker.process(&fixture("m-4")).await.unwrap();
    assert_eq!(league.repo.get(created.match_id).unwrap().scheduled_kickoff, None);

    let backfilled = worker.process(&timed).await.unwrap();
    assert_eq!(backfilled.outcome, IngestOutcome::Updated);
    let expected = Utc.with_ymd_and_hms(2024, 10, 15, 14, 30, 0).unwrap();
    assert_eq!(league.repo.get(created.match_id).unwrap().scheduled_kickoff, Some(expected));

    // A later payload without a time must not clear what we know.
    let untimed = worker.process(&fixture("m-4")).await.unwrap();
    assert_eq!(untimed.outcome, IngestOutcome::Skipped);
    assert_eq!(league.repo.get(created.match_id).unwrap().scheduled_kickoff, Some(expected));
}

#[test(tokio::test)]
async fn test_natural_key_dedup_without_external_id() {
    let league = league();
    let worker = worker(&league.repo);
    let payload = MatchPayload {
        external_id: None,
        ..fixture("unused")
    };

    let first = worker.process(&payload).await.unwrap();
    let second = worker.process(&payload).await.unwrap();
    assert_eq!(first.outcome, IngestOutcome::Created);
    assert_eq!(second.outcome, IngestOutcome::Skipped);

    // Same teams and date, no division: a different natural key.
    let other = worker
        .process(&MatchPayload {
            division: None,
            ..payload.clone()
        })
        .await
        .unwrap();
    assert_eq!(other.outcome, IngestOutcome::Created);
    assert_ne!(other.match_id, first.match_id);

    let stored = league.repo.get(first.match_id).unwrap();
    assert_eq!(stored.source, None);
}

#[test(tokio::test)]
async fn test_external_ids_are_scoped_by_source() {
    let league = league();
    let worker = worker(&league.repo);

    let default_source = worker.process(&fixture("shared")).await.unwrap();
    let other_source = worker
        .process(&MatchPayload {
            source: Some("partner".into()),
            ..fixture("shared")
        })
        .await
        .unwrap();

    assert_eq!(other_source.outcome, IngestOutcome::Created);
    assert_eq!(league.repo.get(default_source.match_id).unwrap().source.as_deref(), Some(SOURCE));
    assert_eq!(league.repo.get(other_source.match_id).unwrap().source.as_deref(), Some("partner"));
}

#[test(tokio::test)]
async fn test_lost_insert_race_folds_into_existing_row() {
    let league = league();
    let worker = worker(&league.repo);

    // Let another worker create the scheduled fixture, then have ours lose the
    // insert race for the same external id.
    let winner = worker.process(&fixture("m-5")).await.unwrap();
    let raced = league.repo.get(winner.match_id).unwrap();
    let other = common::league();
    other.repo.race_next_insert(raced.clone());
    let loser = common::worker(&other.repo);

    let outcome = loser.process(&result("m-5", 2, 1)).await.unwrap();

    assert_eq!(outcome.outcome, IngestOutcome::Updated);
    assert_eq!(outcome.match_id, raced.id);
    let rows = other.repo.matches();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].match_status, Some(MatchStatus::Completed));
    assert_eq!(other.repo.write_count(), 1);
}

#[test(tokio::test)]
async fn test_validation_failures_are_terminal() {
    let league = league();
    let worker = worker(&league.repo);

    let cases = vec![
        MatchPayload { home_team: " ".into(), ..fixture("v") },
        MatchPayload { age_group: None, ..fixture("v") },
        MatchPayload { match_date: "15/10/2024".into(), ..fixture("v") },
        MatchPayload { home_score: Some(-1), away_score: Some(0), ..fixture("v") },
        MatchPayload { match_status: Some("completed".into()), ..fixture("v") },
        MatchPayload { away_team: "Team A".into(), ..fixture("v") },
    ];
    for payload in cases {
        let err = worker.process(&payload).await.unwrap_err();
        assert_eq!(err.class(), FailureClass::Validation, "{:?}", payload);
        assert!(matches!(err, IngestError::Validation(_)));
    }
    assert!(league.repo.matches().is_empty());
}

#[test(tokio::test)]
async fn test_unknown_team_exhausts_retries_then_succeeds_once_added() {
    let league = league();
    let worker = worker(&league.repo);
    let payload = MatchPayload {
        away_team: "Team Z".into(),
        ..fixture("m-6")
    };

    let err = worker.process(&payload).await.unwrap_err();
    match &err {
        IngestError::RetriesExhausted { attempts, last } => {
            assert_eq!(*attempts, 3);
            assert!(last.to_string().contains("Team Z"));
        }
        other => panic!("expected exhausted retries, got {:?}", other),
    }
    assert_eq!(err.class(), FailureClass::Resolution);
    assert!(league.repo.matches().is_empty());

    league.repo.add_team("Team Z", None);
    let created = worker.process(&payload).await.unwrap();
    assert_eq!(created.outcome, IngestOutcome::Created);
}

#[test(tokio::test)]
async fn test_team_names_are_case_sensitive() {
    let league = league();
    let worker = worker(&league.repo);
    let err = worker
        .process(&MatchPayload {
            home_team: "team a".into(),
            ..fixture("m-7")
        })
        .await
        .unwrap_err();
    assert_eq!(err.class(), FailureClass::Resolution);
}

#[test(tokio::test)]
async fn test_transient_store_errors_exhaust_store_policy() {
    let league = league();
    let worker = worker(&league.repo);
    for _ in 0..4 {
        league.repo.fail_next(StoreError::Transient("pool timed out".into()));
    }

    let err = worker.process(&fixture("m-8")).await.unwrap_err();
    assert_eq!(
        err,
        IngestError::RetriesExhausted {
            attempts: 4,
            last: Box::new(IngestError::Store(StoreError::Transient("pool timed out".into()))),
        }
    );
    assert_eq!(err.class(), FailureClass::Store);
}

#[test(tokio::test)]
async fn test_shutdown_cancels_backoff() {
    let league = league();
    let (trigger, shutdown) = shutdown_channel();
    let slow = RetryPolicy {
        max_attempts: 10,
        base_delay: Duration::from_secs(60),
        multiplier: 2.0,
        max_delay: Duration::from_secs(600),
        jitter: Duration::ZERO,
    };
    let worker = IngestionWorker::new(
        league.repo.clone(),
        KickoffNormalizer::from_name("America/New_York").unwrap(),
        WorkerSettings {
            resolution_retry: slow,
            ..settings()
        },
    )
    .with_shutdown(shutdown);

    trigger.trigger();
    let err = worker
        .process(&MatchPayload {
            home_team: "Nobody".into(),
            ..fixture("m-9")
        })
        .await
        .unwrap_err();
    assert_eq!(err, IngestError::Cancelled);
    assert_eq!(err.class(), FailureClass::Cancelled);
}

#[test(tokio::test)]
async fn test_store_failures_do_not_spend_resolution_retries() {
    let league = league();
    let worker = worker(&league.repo);
    league.repo.fail_next(StoreError::Transient("connection reset".into()));
    league.repo.fail_next(StoreError::Transient("connection reset".into()));

    let err = worker
        .process(&MatchPayload {
            away_team: "Late FC".into(),
            ..fixture("m-10")
        })
        .await
        .unwrap_err();

    match &err {
        IngestError::RetriesExhausted { attempts, last } => {
            assert_eq!(*attempts, 3);
            assert_eq!(last.class(), FailureClass::Resolution);
        }
        other => panic!("expected exhausted retries, got {:?}", other),
    }
    // Every resolution attempt the policy allows actually looked the team up.
    assert_eq!(league.repo.team_misses(), 3);
}

#[test(tokio::test)]
async fn test_padded_team_name_is_not_resolved_loosely() {
    let league = league();
    let worker = worker(&league.repo);
    let err = worker
        .process(&MatchPayload {
            home_team: " Team A".into(),
            ..fixture("m-11")
        })
        .await
        .unwrap_err();
    assert_eq!(err.class(), FailureClass::Validation);
    assert!(league.repo.matches().is_empty());
}
