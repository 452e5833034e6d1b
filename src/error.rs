use std::path::PathBuf;

use thiserror::Error;

/// Failures raised by the rendering-engine session.
#[derive(Debug, Error)]
pub enum BrowserError {
    #[error("failed to launch browser: {0}")]
    Launch(String),

    #[error("navigation to {url} failed: {reason}")]
    Navigation { url: String, reason: String },

    #[error("timed out after {0:?}")]
    Timeout(std::time::Duration),

    #[error("click intercepted by another element")]
    ClickIntercepted,

    #[error("browser protocol error: {0}")]
    Protocol(String),
}

impl From<chromiumoxide::error::CdpError> for BrowserError {
    fn from(err: chromiumoxide::error::CdpError) -> Self {
        BrowserError::Protocol(err.to_string())
    }
}

/// A fatal failure of one genre run. Always carries the genre name.
#[derive(Debug, Error)]
pub enum ScrapeError {
    #[error("genre {genre}: could not open browser session: {source}")]
    Session {
        genre: String,
        #[source]
        source: BrowserError,
    },

    #[error("genre {genre}: page failed to load: {source}")]
    Navigation {
        genre: String,
        #[source]
        source: BrowserError,
    },

    #[error("genre {genre}: listing extraction failed: {source}")]
    Extraction {
        genre: String,
        #[source]
        source: BrowserError,
    },

    #[error("genre {genre}: {source}")]
    Artifact {
        genre: String,
        #[source]
        source: ArtifactError,
    },
}

impl ScrapeError {
    pub fn genre(&self) -> &str {
        match self {
            ScrapeError::Session { genre, .. }
            | ScrapeError::Navigation { genre, .. }
            | ScrapeError::Extraction { genre, .. }
            | ScrapeError::Artifact { genre, .. } => genre,
        }
    }
}

#[derive(Debug, Error)]
pub enum ArtifactError {
    #[error("artifact {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("artifact {path}: {source}")]
    Csv {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },
}

/// Store load failures. The merged artifact on disk is untouched by any of these.
#[derive(Debug, Error)]
pub enum LoadError {
    #[error("invalid table name {0:?}")]
    InvalidTable(String),

    #[error("cannot create store directory for {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("cannot open store {path}: {source}")]
    Open {
        path: PathBuf,
        #[source]
        source: rusqlite::Error,
    },

    #[error("cannot prepare table {table}: {source}")]
    Schema {
        table: String,
        #[source]
        source: rusqlite::Error,
    },

    #[error("replace of table {table} failed: {source}")]
    Replace {
        table: String,
        #[source]
        source: rusqlite::Error,
    },
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error(transparent)]
    Source(#[from] ::config::ConfigError),

    #[error("invalid configuration: {0}")]
    Invalid(String),
}
