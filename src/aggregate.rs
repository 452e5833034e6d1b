use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::parser::normalize::MAX_RATING;
use crate::parser::{GenreExtract, MovieRecord};

/// A complete row of the merged table, in store column order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MergedRow {
    #[serde(rename = "Serial_No")]
    pub serial_no: u64,
    #[serde(rename = "Movie_Name")]
    pub title: String,
    #[serde(rename = "Genre")]
    pub genre: String,
    #[serde(rename = "Ratings")]
    pub rating: f64,
    #[serde(rename = "Voting_Counts")]
    pub vote_count: u64,
    #[serde(rename = "Duration")]
    pub duration_minutes: u32,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct MergedTable {
    pub rows: Vec<MergedRow>,
}

impl MergedTable {
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

#[derive(Debug, PartialEq)]
pub enum MergeOutcome {
    Merged { table: MergedTable, dropped: usize },
    /// Nothing to load: no extracts, or every row was incomplete.
    Empty { input_rows: usize },
}

/// Concatenate extracts in the order given, drop rows with any missing or
/// out-of-range field, then number the survivors 1..=n.
pub fn merge(extracts: Vec<GenreExtract>) -> MergeOutcome {
    let input_rows: usize = extracts.iter().map(|e| e.records.len()).sum();

    let rows: Vec<MergedRow> = extracts
        .into_iter()
        .flat_map(|e| e.records)
        .filter_map(complete_row)
        .zip(1u64..)
        .map(|(mut row, serial_no)| {
            row.serial_no = serial_no;
            row
        })
        .collect();

    let dropped = input_rows - rows.len();
    if rows.is_empty() {
        warn!("Merged table is empty ({} input rows); nothing to load", input_rows);
        return MergeOutcome::Empty { input_rows };
    }
    info!(
        "Merged {} rows ({} incomplete dropped of {})",
        rows.len(),
        dropped,
        input_rows
    );
    MergeOutcome::Merged {
        table: MergedTable { rows },
        dropped,
    }
}

fn complete_row(record: MovieRecord) -> Option<MergedRow> {
    let title = record.title.map(|t| t.trim().to_string()).filter(|t| !t.is_empty())?;
    let genre = record.genre.trim().to_string();
    if genre.is_empty() {
        return None;
    }
    let rating = record
        .rating
        .filter(|r| r.is_finite() && *r > 0.0 && *r <= MAX_RATING)?;
    Some(MergedRow {
        serial_no: 0,
        title,
        genre,
        rating,
        vote_count: record.vote_count?,
        duration_minutes: record.duration_minutes.filter(|d| *d > 0)?,
    })
}

/// Numeric cell to rating; anything unparseable is `None`.
pub fn coerce_rating(cell: &str) -> Option<f64> {
    cell.trim().parse::<f64>().ok().filter(|r| r.is_finite())
}

/// Numeric cell to a count. Accepts "12000" and "12000.0".
pub fn coerce_count(cell: &str) -> Option<u64> {
    let cell = cell.trim();
    if let Ok(n) = cell.parse::<u64>() {
        return Some(n);
    }
    let f = cell.parse::<f64>().ok()?;
    (f.is_finite() && f >= 0.0 && f.fract() == 0.0 && f < u64::MAX as f64).then(|| f as u64)
}
