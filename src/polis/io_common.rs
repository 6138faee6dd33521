// Tabular records shared by all the loaders, and their conversion to votes.

use log::{debug, warn};
use snafu::prelude::*;

use serde_json::Map as JSMap;
use serde_json::Value as JSValue;
use std::collections::HashMap;

use crate::polis::*;

/// One row, keyed by the column names of the source.
pub type Record = JSMap<String, JSValue>;
pub type Table = Vec<Record>;

/// Comments and votes, with the column names of the source.
#[derive(PartialEq, Debug, Clone, Default)]
pub struct RawDataset {
    pub comments: Table,
    pub votes: Table,
}

/// Reads a CSV document with a header row. Numeric cells become JSON numbers.
pub fn records_from_csv(text: &str, url: &str) -> PolisResult<Table> {
    let mut rdr = csv::ReaderBuilder::new()
        .has_headers(true)
        .from_reader(text.as_bytes());
    let headers = rdr.headers().context(ParsingCsvSnafu { url })?.clone();
    let mut res: Table = Vec::new();
    for line_r in rdr.records() {
        let line = line_r.context(ParsingCsvSnafu { url })?;
        let record: Record = headers
            .iter()
            .zip(line.iter())
            .map(|(h, cell)| (h.to_string(), csv_cell(cell)))
            .collect();
        res.push(record);
    }
    debug!("records_from_csv: {} rows from {}", res.len(), url);
    Ok(res)
}

fn csv_cell(cell: &str) -> JSValue {
    if let Ok(i) = cell.parse::<i64>() {
        return JSValue::from(i);
    }
    match cell.parse::<f64>() {
        Ok(f) if f.is_finite() => JSValue::from(f),
        _ => JSValue::String(cell.to_string()),
    }
}

/// Reads a JSON array of objects.
pub fn records_from_json(js: JSValue, path: &str) -> PolisResult<Table> {
    let items = match js {
        JSValue::Array(items) => items,
        _ => {
            return UnexpectedJsonSnafu {
                path,
                expected: "an array of records",
            }
            .fail()
        }
    };
    let mut res: Table = Vec::with_capacity(items.len());
    for item in items {
        match item {
            JSValue::Object(obj) => res.push(obj),
            _ => {
                return UnexpectedJsonSnafu {
                    path,
                    expected: "a record (JSON object)",
                }
                .fail()
            }
        }
    }
    Ok(res)
}

// Column names of the three sources: local names, report export, API.
const PARTICIPANT_COLUMNS: [&str; 3] = ["participant_id", "voter-id", "pid"];
const STATEMENT_COLUMNS: [&str; 3] = ["statement_id", "comment-id", "tid"];
const VOTE_COLUMN: &str = "vote";
const TIME_COLUMNS: [&str; 2] = ["timestamp", "modified"];
// The API records an agreement as -1.
const API_PARTICIPANT_COLUMN: &str = "pid";

/// Converts the vote records to votes, with agreement as 1.
///
/// When a participant voted several times on a statement, only the latest vote
/// is kept: the most recent timestamp, or the last row without timestamps.
/// The votes are returned sorted by participant then statement.
pub fn extract_votes(votes: &Table) -> PolisResult<Vec<Vote>> {
    // (participant, statement) -> (time, vote)
    let mut latest: HashMap<(ParticipantId, StatementId), (Option<f64>, Vote)> = HashMap::new();
    for (row, record) in votes.iter().enumerate() {
        let (pcol, participant_id) = read_id(record, &PARTICIPANT_COLUMNS, row)?;
        let (_, statement_id) = read_id(record, &STATEMENT_COLUMNS, row)?;
        let raw_vote = record
            .get(VOTE_COLUMN)
            .and_then(as_i64)
            .context(MissingColumnSnafu {
                column: VOTE_COLUMN,
                row,
            })?;
        let vote = if pcol == API_PARTICIPANT_COLUMN {
            -raw_vote
        } else {
            raw_vote
        };
        let time = TIME_COLUMNS
            .iter()
            .find_map(|c| record.get(*c).and_then(|v| v.as_f64()));
        let v = Vote {
            participant_id,
            statement_id,
            vote,
        };
        let e = latest.entry((participant_id, statement_id)).or_insert((time, v));
        let newer = match (e.0, time) {
            (Some(prev), Some(cur)) => cur >= prev,
            _ => true,
        };
        if newer {
            *e = (time, v);
        }
    }
    let mut res: Vec<Vote> = latest.into_values().map(|(_, v)| v).collect();
    res.sort_by_key(|v| (v.participant_id, v.statement_id));
    if res.len() < votes.len() {
        debug!(
            "extract_votes: {} duplicate votes dropped",
            votes.len() - res.len()
        );
    }
    Ok(res)
}

fn read_id<'a>(record: &Record, columns: &[&'a str], row: usize) -> PolisResult<(&'a str, u64)> {
    for c in columns.iter() {
        if let Some(v) = record.get(*c) {
            return match as_i64(v) {
                Some(x) if x >= 0 => Ok((*c, x as u64)),
                _ => {
                    warn!("read_id: row {}: column {} holds {:?}", row, c, v);
                    MissingColumnSnafu { column: *c, row }.fail()
                }
            };
        }
    }
    MissingColumnSnafu {
        column: columns.join("|"),
        row,
    }
    .fail()
}

fn as_i64(v: &JSValue) -> Option<i64> {
    match v {
        JSValue::Number(n) => n
            .as_i64()
            .or_else(|| n.as_f64().filter(|f| f.fract() == 0.0).map(|f| f as i64)),
        JSValue::String(s) => s.trim().parse::<i64>().ok(),
        _ => None,
    }
}
