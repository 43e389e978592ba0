use crate::standings::TeamRow;
use crate::types::MatchPayload;
use std::fs::File;
use std::io::{BufRead, BufReader, Write};
use std::path::Path;

#[derive(Debug, thiserror::Error)]
pub enum FeedError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
    #[error("line {line}: malformed payload: {message}")]
    Malformed { line: usize, message: String },
}

/// Reads a JSON-lines feed dump. Blank lines are skipped; a malformed line is
/// returned as an error in place so the rest of the file still gets ingested.
pub fn read_payloads(path: &Path) -> Result<Vec<Result<MatchPayload, FeedError>>, FeedError> {
    let reader = BufReader::new(File::open(path)?);
    let mut payloads = Vec::new();

    for (idx, line) in reader.lines().enumerate() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        payloads.push(
            serde_json::from_str::<MatchPayload>(&line).map_err(|e| FeedError::Malformed {
                line: idx + 1,
                message: e.to_string(),
            }),
        );
    }

    Ok(payloads)
}

pub fn write_standings_csv<W: Write>(rows: &[TeamRow], writer: W) -> Result<(), FeedError> {
    let mut wtr = csv::Writer::from_writer(writer);
    wtr.write_record([
        "position",
        "team",
        "played",
        "wins",
        "draws",
        "losses",
        "goals_for",
        "goals_against",
        "goal_difference",
        "points",
    ])?;
    for (position, row) in rows.iter().enumerate() {
        wtr.write_record(&[
            (position + 1).to_string(),
            row.team.clone(),
            row.played.to_string(),
            row.wins.to_string(),
            row.draws.to_string(),
            row.losses.to_string(),
            row.goals_for.to_string(),
            row.goals_against.to_string(),
            row.goal_difference.to_string(),
            row.points.to_string(),
        ])?;
    }
    wtr.flush()?;
    Ok(())
}
