use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;
use std::time::Duration;

use regex::Regex;
use serde::Deserialize;

use crate::artifact::MERGED_STEM;
use crate::browser::ListingLocators;
use crate::error::ConfigError;
use crate::parser::normalize::SuffixRule;

pub const DEFAULT_CONFIG_FILE: &str = "imdb_scraper.toml";
const ENV_PREFIX: &str = "IMDB_SCRAPER";

static IDENT_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*$").unwrap());

/// True for names safe to splice into SQL as a table identifier.
pub fn is_plain_identifier(name: &str) -> bool {
    IDENT_RE.is_match(name)
}

/// Everything a run needs, passed explicitly to each stage.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    pub store: StoreConfig,
    pub artifacts: ArtifactConfig,
    pub browser: BrowserConfig,
    pub locators: ListingLocators,
    pub genres: Vec<GenreSource>,
    pub votes_suffix: SuffixRule,
    /// Max genre runs in flight, each with its own browser session.
    pub concurrency: usize,
    /// Optional argv spawned after a successful load (reporting dashboard).
    pub dashboard_command: Vec<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    pub path: PathBuf,
    pub table: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ArtifactConfig {
    pub dir: PathBuf,
    pub year: u16,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct BrowserConfig {
    pub headless: bool,
    pub chrome_executable: Option<PathBuf>,
    pub navigation_timeout_secs: u64,
    /// Budget for each "load more" locate attempt.
    pub wait_secs: u64,
    pub scroll_pause_ms: u64,
    pub click_settle_ms: u64,
    pub final_settle_ms: u64,
    /// Upper bound on "load more" clicks for one listing.
    pub max_load_more_clicks: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct GenreSource {
    pub name: String,
    pub url: String,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            store: StoreConfig::default(),
            artifacts: ArtifactConfig::default(),
            browser: BrowserConfig::default(),
            locators: ListingLocators::default(),
            genres: default_genres(2024),
            votes_suffix: SuffixRule::default(),
            concurrency: 1,
            dashboard_command: Vec::new(),
        }
    }
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from("data/imdb.sqlite"),
            table: "movies".into(),
        }
    }
}

impl Default for ArtifactConfig {
    fn default() -> Self {
        Self {
            dir: PathBuf::from("data"),
            year: 2024,
        }
    }
}

impl Default for BrowserConfig {
    fn default() -> Self {
        Self {
            headless: true,
            chrome_executable: None,
            navigation_timeout_secs: 60,
            wait_secs: 15,
            scroll_pause_ms: 1000,
            click_settle_ms: 3000,
            final_settle_ms: 3000,
            max_load_more_clicks: 500,
        }
    }
}

impl BrowserConfig {
    pub fn navigation_timeout(&self) -> Duration {
        Duration::from_secs(self.navigation_timeout_secs)
    }

    pub fn timing(&self) -> ExpandTiming {
        ExpandTiming {
            wait: Duration::from_secs(self.wait_secs),
            scroll_pause: Duration::from_millis(self.scroll_pause_ms),
            click_settle: Duration::from_millis(self.click_settle_ms),
            final_settle: Duration::from_millis(self.final_settle_ms),
        }
    }
}

/// Waits used while expanding a listing page.
#[derive(Debug, Clone, Copy)]
pub struct ExpandTiming {
    pub wait: Duration,
    pub scroll_pause: Duration,
    pub click_settle: Duration,
    pub final_settle: Duration,
}

impl ExpandTiming {
    #[cfg(test)]
    pub fn instant() -> Self {
        Self {
            wait: Duration::from_millis(50),
            scroll_pause: Duration::ZERO,
            click_settle: Duration::ZERO,
            final_settle: Duration::ZERO,
        }
    }
}

/// Feature films released in `year`, one listing per genre.
pub fn default_genres(year: u16) -> Vec<GenreSource> {
    ["Action", "Adventure", "Biography", "Animation", "Fantasy"]
        .iter()
        .map(|name| GenreSource {
            name: name.to_string(),
            url: format!(
                "https://www.imdb.com/search/title/?title_type=feature&release_date={year}-01-01,{year}-12-31&genres={}",
                name.to_lowercase()
            ),
        })
        .collect()
}

/// Load defaults, then the TOML file (required only when given explicitly),
/// then `IMDB_SCRAPER_*` environment overrides.
pub fn load(path: Option<&Path>) -> Result<PipelineConfig, ConfigError> {
    let file = path.unwrap_or(Path::new(DEFAULT_CONFIG_FILE));
    let settings = ::config::Config::builder()
        .add_source(::config::File::from(file).required(path.is_some()))
        .add_source(
            ::config::Environment::with_prefix(ENV_PREFIX)
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true),
        )
        .build()?;
    let cfg: PipelineConfig = settings.try_deserialize()?;
    cfg.validate()?;
    Ok(cfg)
}

impl PipelineConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !is_plain_identifier(&self.store.table) {
            return Err(ConfigError::Invalid(format!(
                "store.table {:?} is not a plain identifier",
                self.store.table
            )));
        }
        if self.concurrency == 0 {
            return Err(ConfigError::Invalid("concurrency must be at least 1".into()));
        }
        if self.genres.is_empty() {
            return Err(ConfigError::Invalid("no genres configured".into()));
        }

        let mut seen = HashSet::new();
        for g in &self.genres {
            let name = g.name.trim();
            if name.is_empty() {
                return Err(ConfigError::Invalid(format!("genre with empty name ({})", g.url)));
            }
            if name.contains(['/', '\\']) {
                return Err(ConfigError::Invalid(format!("genre name {name:?} contains a path separator")));
            }
            if name.eq_ignore_ascii_case(MERGED_STEM) {
                return Err(ConfigError::Invalid(format!(
                    "genre name {name:?} is reserved for the merged artifact"
                )));
            }
            if !seen.insert(name.to_lowercase()) {
                return Err(ConfigError::Invalid(format!("genre {name:?} configured twice")));
            }
            let parsed = url::Url::parse(&g.url)
                .map_err(|e| ConfigError::Invalid(format!("genre {name}: bad url {:?}: {e}", g.url)))?;
            if !matches!(parsed.scheme(), "http" | "https") {
                return Err(ConfigError::Invalid(format!("genre {name}: url must be http(s)")));
            }
        }
        Ok(())
    }

    /// Configured genres, optionally narrowed to `only` (case-insensitive).
    pub fn select_genres(&self, only: &[String]) -> Result<Vec<GenreSource>, ConfigError> {
        if only.is_empty() {
            return Ok(self.genres.clone());
        }
        only.iter()
            .map(|wanted| {
                self.genres
                    .iter()
                    .find(|g| g.name.eq_ignore_ascii_case(wanted))
                    .cloned()
                    .ok_or_else(|| ConfigError::Invalid(format!("unknown genre {wanted:?}")))
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        let cfg = PipelineConfig::default();
        cfg.validate().unwrap();
        assert_eq!(cfg.genres.len(), 5);
        assert_eq!(cfg.genres[0].name, "Action");
        assert!(cfg.genres[0].url.contains("release_date=2024-01-01,2024-12-31"));
        assert!(cfg.genres[0].url.ends_with("genres=action"));
        assert_eq!(cfg.store.table, "movies");
        assert_eq!(cfg.browser.timing().wait, Duration::from_secs(15));
    }

    #[test]
    fn rejects_bad_genres() {
        let mut cfg = PipelineConfig::default();
        cfg.genres.push(GenreSource { name: "  ".into(), url: "https://example.com".into() });
        assert!(cfg.validate().is_err());

        let mut cfg = PipelineConfig::default();
        cfg.genres.push(GenreSource { name: "Drama".into(), url: "not a url".into() });
        assert!(cfg.validate().is_err());

        let mut cfg = PipelineConfig::default();
        cfg.genres.push(GenreSource { name: "action".into(), url: "https://example.com".into() });
        assert!(cfg.validate().is_err());

        let mut cfg = PipelineConfig::default();
        cfg.genres = vec![GenreSource { name: "Drama".into(), url: "ftp://example.com".into() }];
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn rejects_genre_named_like_merged_artifact() {
        for name in ["merged", "Merged", " MERGED "] {
            let mut cfg = PipelineConfig::default();
            cfg.genres.push(GenreSource {
                name: name.into(),
                url: "https://www.imdb.com/search/title/?genres=merged".into(),
            });
            assert!(cfg.validate().is_err(), "{name:?} accepted");
        }

        let artifacts = crate::artifact::ArtifactStore::new("data", 2024);
        for g in &PipelineConfig::default().genres {
            assert_ne!(artifacts.genre_path(&g.name), artifacts.merged_path());
        }
    }

    #[test]
    fn rejects_injected_table_name() {
        let mut cfg = PipelineConfig::default();
        cfg.store.table = "movies; DROP TABLE x".into();
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn file_overrides_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("custom.toml");
        std::fs::write(
            &path,
            r#"
votes_suffix = "legacy"
concurrency = 2

[store]
table = "films"

[[genres]]
name = "Horror"
url = "https://www.imdb.com/search/title/?genres=horror"
"#,
        )
        .unwrap();

        let cfg = load(Some(&path)).unwrap();
        assert_eq!(cfg.store.table, "films");
        assert_eq!(cfg.store.path, PathBuf::from("data/imdb.sqlite"));
        assert_eq!(cfg.concurrency, 2);
        assert_eq!(cfg.votes_suffix, SuffixRule::Legacy);
        assert_eq!(cfg.genres.len(), 1);
        assert_eq!(cfg.genres[0].name, "Horror");
    }

    #[test]
    fn explicit_missing_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        assert!(load(Some(&dir.path().join("absent.toml"))).is_err());
    }

    #[test]
    fn select_genres_by_name() {
        let cfg = PipelineConfig::default();
        let picked = cfg.select_genres(&["fantasy".into(), "Action".into()]).unwrap();
        let names: Vec<_> = picked.iter().map(|g| g.name.as_str()).collect();
        assert_eq!(names, ["Fantasy", "Action"]);
        assert!(cfg.select_genres(&["Western".into()]).is_err());
        assert_eq!(cfg.select_genres(&[]).unwrap().len(), 5);
    }
}
