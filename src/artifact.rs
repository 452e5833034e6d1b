//! Intermediate CSV artifacts: one per genre plus the merged table.
//!
//! Files are rewritten whole on every run (temp file + rename), never appended.

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::aggregate::{coerce_count, coerce_rating, MergedRow, MergedTable};
use crate::error::ArtifactError;
use crate::parser::{GenreExtract, MovieRecord};

/// File stem of the merged artifact. No genre may share it.
pub const MERGED_STEM: &str = "merged";

const EXTRACT_HEADERS: [&str; 5] = ["Movie_Name", "Genre", "Ratings", "Voting_Counts", "Duration"];
const MERGED_HEADERS: [&str; 6] = [
    "Serial_No",
    "Movie_Name",
    "Genre",
    "Ratings",
    "Voting_Counts",
    "Duration",
];

#[derive(Serialize)]
struct ExtractRowOut<'a> {
    #[serde(rename = "Movie_Name")]
    movie_name: Option<&'a str>,
    #[serde(rename = "Genre")]
    genre: &'a str,
    #[serde(rename = "Ratings")]
    ratings: Option<f64>,
    #[serde(rename = "Voting_Counts")]
    voting_counts: Option<u64>,
    #[serde(rename = "Duration")]
    duration: Option<u32>,
}

/// Cells as stored; typed on read.
#[derive(Deserialize)]
struct ExtractRowIn {
    #[serde(rename = "Movie_Name")]
    movie_name: Option<String>,
    #[serde(rename = "Genre")]
    genre: Option<String>,
    #[serde(rename = "Ratings")]
    ratings: Option<String>,
    #[serde(rename = "Voting_Counts")]
    voting_counts: Option<String>,
    #[serde(rename = "Duration")]
    duration: Option<String>,
}

#[derive(Debug, Clone)]
pub struct ArtifactStore {
    dir: PathBuf,
    year: u16,
}

impl ArtifactStore {
    pub fn new(dir: impl Into<PathBuf>, year: u16) -> Self {
        Self {
            dir: dir.into(),
            year,
        }
    }

    pub fn genre_path(&self, genre: &str) -> PathBuf {
        self.dir
            .join(format!("imdb_{}_movies_{}.csv", genre, self.year))
    }

    pub fn merged_path(&self) -> PathBuf {
        self.dir
            .join(format!("imdb_{}_movies_{}.csv", MERGED_STEM, self.year))
    }

    pub fn write_genre(&self, extract: &GenreExtract) -> Result<PathBuf, ArtifactError> {
        let path = self.genre_path(&extract.genre);
        let rows = extract.records.iter().map(|r| ExtractRowOut {
            movie_name: r.title.as_deref(),
            genre: &r.genre,
            ratings: r.rating,
            voting_counts: r.vote_count,
            duration: r.duration_minutes,
        });
        write_replace(&path, &EXTRACT_HEADERS, rows)?;
        info!("Saved {} rows to {}", extract.records.len(), path.display());
        Ok(path)
    }

    /// Read a genre artifact back, coercing each cell. Unparseable cells
    /// become `None`; an empty genre cell falls back to `genre`.
    pub fn read_genre(&self, genre: &str) -> Result<GenreExtract, ArtifactError> {
        let path = self.genre_path(genre);
        let mut reader = csv::Reader::from_path(&path).map_err(|e| csv_err(&path, e))?;
        let mut records = Vec::new();
        for row in reader.deserialize::<ExtractRowIn>() {
            let row = row.map_err(|e| csv_err(&path, e))?;
            records.push(MovieRecord {
                title: row.movie_name.filter(|t| !t.trim().is_empty()),
                genre: row
                    .genre
                    .filter(|g| !g.trim().is_empty())
                    .unwrap_or_else(|| genre.to_string()),
                rating: row.ratings.as_deref().and_then(coerce_rating),
                vote_count: row.voting_counts.as_deref().and_then(coerce_count),
                duration_minutes: row
                    .duration
                    .as_deref()
                    .and_then(coerce_count)
                    .and_then(|d| u32::try_from(d).ok()),
            });
        }
        Ok(GenreExtract {
            genre: genre.to_string(),
            records,
        })
    }

    pub fn write_merged(&self, table: &MergedTable) -> Result<PathBuf, ArtifactError> {
        let path = self.merged_path();
        write_replace(&path, &MERGED_HEADERS, table.rows.iter())?;
        info!("Merged data saved to {}", path.display());
        Ok(path)
    }

    pub fn read_merged(&self) -> Result<MergedTable, ArtifactError> {
        let path = self.merged_path();
        let mut reader = csv::Reader::from_path(&path).map_err(|e| csv_err(&path, e))?;
        let rows = reader
            .deserialize::<MergedRow>()
            .collect::<Result<Vec<_>, _>>()
            .map_err(|e| csv_err(&path, e))?;
        Ok(MergedTable { rows })
    }
}

/// Header row is written explicitly so an empty table still has one.
fn write_replace<T: Serialize>(
    path: &Path,
    headers: &[&str],
    rows: impl IntoIterator<Item = T>,
) -> Result<(), ArtifactError> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(|e| io_err(parent, e))?;
    }
    let tmp = path.with_extension("csv.tmp");
    {
        let mut writer = csv::WriterBuilder::new()
            .has_headers(false)
            .from_path(&tmp)
            .map_err(|e| csv_err(&tmp, e))?;
        writer.write_record(headers).map_err(|e| csv_err(&tmp, e))?;
        for row in rows {
            writer.serialize(row).map_err(|e| csv_err(&tmp, e))?;
        }
        writer.flush().map_err(|e| io_err(&tmp, e))?;
    }
    fs::rename(&tmp, path).map_err(|e| io_err(path, e))
}

fn csv_err(path: &Path, source: csv::Error) -> ArtifactError {
    ArtifactError::Csv {
        path: path.to_path_buf(),
        source,
    }
}

fn io_err(path: &Path, source: std::io::Error) -> ArtifactError {
    ArtifactError::Io {
        path: path.to_path_buf(),
        source,
    }
}
