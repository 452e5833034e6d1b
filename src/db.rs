use std::fs;
use std::path::{Path, PathBuf};

use anyhow::Result;
use rusqlite::Connection;
use tracing::info;

use crate::aggregate::MergedTable;
use crate::config::{is_plain_identifier, StoreConfig};
use crate::error::LoadError;

/// Writes the merged table into the destination table, replacing its rows.
pub struct StoreLoader {
    path: PathBuf,
    table: String,
}

impl StoreLoader {
    pub fn new(cfg: &StoreConfig) -> Result<Self, LoadError> {
        if !is_plain_identifier(&cfg.table) {
            return Err(LoadError::InvalidTable(cfg.table.clone()));
        }
        Ok(Self {
            path: cfg.path.clone(),
            table: cfg.table.clone(),
        })
    }

    pub fn table(&self) -> &str {
        &self.table
    }

    pub fn connect(&self) -> Result<Connection, LoadError> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|source| LoadError::Io {
                path: self.path.clone(),
                source,
            })?;
        }
        let open = |source: rusqlite::Error| LoadError::Open {
            path: self.path.clone(),
            source,
        };
        let conn = Connection::open(&self.path).map_err(open)?;
        conn.execute_batch("PRAGMA journal_mode=WAL;").map_err(open)?;
        Ok(conn)
    }

    pub fn init_schema(&self, conn: &Connection) -> Result<(), LoadError> {
        conn.execute_batch(&format!(
            "CREATE TABLE IF NOT EXISTS {t} (
                Serial_No     INTEGER NOT NULL UNIQUE,
                Movie_Name    TEXT NOT NULL,
                Genre         TEXT NOT NULL,
                Ratings       REAL NOT NULL,
                Voting_Counts INTEGER NOT NULL,
                Duration      INTEGER NOT NULL
            );
            CREATE INDEX IF NOT EXISTS idx_{t}_genre ON {t}(Genre);",
            t = self.table
        ))
        .map_err(|source| LoadError::Schema {
            table: self.table.clone(),
            source,
        })
    }

    /// Delete every row and insert `table` in one transaction. Readers see
    /// either the previous contents or the new ones, never a partial set.
    /// On error the transaction rolls back and nothing is retried here.
    pub fn load(&self, table: &MergedTable) -> Result<usize, LoadError> {
        let mut conn = self.connect()?;
        self.init_schema(&conn)?;
        let n = self.replace_rows(&mut conn, table).map_err(|source| LoadError::Replace {
            table: self.table.clone(),
            source,
        })?;
        info!("Data successfully saved to table {} ({} rows)", self.table, n);
        Ok(n)
    }

    fn replace_rows(&self, conn: &mut Connection, table: &MergedTable) -> rusqlite::Result<usize> {
        let tx = conn.transaction()?;
        let removed = tx.execute(&format!("DELETE FROM {}", self.table), [])?;
        info!("Table {} cleared ({} old rows) inside load transaction", self.table, removed);
        let mut count = 0;
        {
            let mut stmt = tx.prepare(&format!(
                "INSERT INTO {} (Serial_No, Movie_Name, Genre, Ratings, Voting_Counts, Duration)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                self.table
            ))?;
            for r in &table.rows {
                count += stmt.execute(rusqlite::params![
                    r.serial_no as i64,
                    r.title,
                    r.genre,
                    r.rating,
                    r.vote_count as i64,
                    r.duration_minutes,
                ])?;
            }
        }
        tx.commit()?;
        Ok(count)
    }
}

// ── Read side ──

pub fn open_readonly(path: &Path) -> Result<Connection> {
    let conn = Connection::open_with_flags(path, rusqlite::OpenFlags::SQLITE_OPEN_READ_ONLY)?;
    Ok(conn)
}

pub fn count_rows(conn: &Connection, table: &str) -> Result<usize> {
    let n: i64 = conn.query_row(&format!("SELECT COUNT(*) FROM {}", table), [], |r| r.get(0))?;
    Ok(n as usize)
}

pub struct GenreStats {
    pub genre: String,
    pub movies: usize,
    pub avg_rating: f64,
    pub avg_duration: f64,
    pub total_votes: i64,
}

pub fn fetch_genre_stats(conn: &Connection, table: &str) -> Result<Vec<GenreStats>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT Genre, COUNT(*), AVG(Ratings), AVG(Duration), SUM(Voting_Counts)
         FROM {}
         GROUP BY Genre
         ORDER BY COUNT(*) DESC, Genre",
        table
    ))?;
    let rows = stmt
        .query_map([], |row| {
            Ok(GenreStats {
                genre: row.get(0)?,
                movies: row.get::<_, i64>(1)? as usize,
                avg_rating: row.get(2)?,
                avg_duration: row.get(3)?,
                total_votes: row.get(4)?,
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}

#[derive(Default)]
pub struct MovieFilter {
    pub genre: Option<String>,
    pub min_rating: Option<f64>,
    pub max_rating: Option<f64>,
    pub min_votes: Option<i64>,
    pub min_duration: Option<i64>,
    pub max_duration: Option<i64>,
}

pub struct MovieRow {
    pub serial_no: i64,
    pub title: String,
    pub genre: String,
    pub rating: f64,
    pub votes: i64,
    pub duration: i64,
}

pub fn fetch_movies(
    conn: &Connection,
    table: &str,
    filter: &MovieFilter,
    limit: usize,
) -> Result<Vec<MovieRow>> {
    let mut conditions = Vec::new();
    let mut params: Vec<Box<dyn rusqlite::types::ToSql>> = Vec::new();

    let mut push = |cond: &str, value: Box<dyn rusqlite::types::ToSql>| {
        conditions.push(format!("{} ?{}", cond, params.len() + 1));
        params.push(value);
    };
    if let Some(g) = &filter.genre {
        push("Genre =", Box::new(g.clone()));
    }
    if let Some(r) = filter.min_rating {
        push("Ratings >=", Box::new(r));
    }
    if let Some(r) = filter.max_rating {
        push("Ratings <=", Box::new(r));
    }
    if let Some(v) = filter.min_votes {
        push("Voting_Counts >=", Box::new(v));
    }
    if let Some(d) = filter.min_duration {
        push("Duration >=", Box::new(d));
    }
    if let Some(d) = filter.max_duration {
        push("Duration <=", Box::new(d));
    }

    let where_clause = if conditions.is_empty() {
        String::new()
    } else {
        format!(" WHERE {}", conditions.join(" AND "))
    };

    let sql = format!(
        "SELECT Serial_No, Movie_Name, Genre, Ratings, Voting_Counts, Duration
         FROM {}{}
         ORDER BY Ratings DESC, Voting_Counts DESC, Serial_No
         LIMIT {}",
        table, where_clause, limit
    );

    let mut stmt = conn.prepare(&sql)?;
    let param_refs: Vec<&dyn rusqlite::types::ToSql> = params.iter().map(|p| p.as_ref()).collect();
    let rows = stmt
        .query_map(param_refs.as_slice(), |row| {
            Ok(MovieRow {
                serial_no: row.get(0)?,
                title: row.get(1)?,
                genre: row.get(2)?,
                rating: row.get(3)?,
                votes: row.get(4)?,
                duration: row.get(5)?,
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}
