use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use indicatif::{ProgressBar, ProgressStyle};
use tokio::sync::Semaphore;
use tracing::{debug, info, info_span, warn, Instrument};

use crate::artifact::ArtifactStore;
use crate::browser::{BrowserLauncher, BrowserSession, ListingLocators, Locator};
use crate::config::{ExpandTiming, GenreSource, PipelineConfig};
use crate::error::{BrowserError, ScrapeError};
use crate::parser::extract::ItemExtractor;
use crate::parser::normalize::SuffixRule;
use crate::parser::GenreExtract;

const SCROLL_TO_BOTTOM_JS: &str = "window.scrollTo(0, document.body.scrollHeight);";

/// Everything a genre run needs besides its browser session.
#[derive(Debug, Clone)]
pub struct ScrapeSettings {
    pub locators: ListingLocators,
    pub timing: ExpandTiming,
    pub navigation_timeout: Duration,
    pub votes_rule: SuffixRule,
    pub max_load_more_clicks: usize,
}

impl ScrapeSettings {
    pub fn from_config(cfg: &PipelineConfig) -> Self {
        Self {
            locators: cfg.locators.clone(),
            timing: cfg.browser.timing(),
            navigation_timeout: cfg.browser.navigation_timeout(),
            votes_rule: cfg.votes_suffix,
            max_load_more_clicks: cfg.browser.max_load_more_clicks,
        }
    }
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct ExpandStats {
    pub clicks: usize,
    pub forced: usize,
}

/// Click "load more" until it stops showing up, then scroll to the bottom
/// so lazily rendered cards below the fold exist before extraction.
///
/// The control failing to become clickable within `timing.wait` is the
/// normal end of the listing, not an error.
pub async fn expand_page<S: BrowserSession>(
    session: &S,
    load_more: &Locator,
    timing: ExpandTiming,
    max_clicks: usize,
) -> ExpandStats {
    let mut stats = ExpandStats::default();

    while stats.clicks < max_clicks {
        let button = match session.wait_until_clickable(load_more, timing.wait).await {
            Ok(button) => button,
            Err(e) => {
                info!("No more 'load more' control ({}); all results loaded", e);
                break;
            }
        };

        if let Err(e) = session.scroll_into_view(&button).await {
            debug!("scroll into view failed: {}", e);
        }
        tokio::time::sleep(timing.scroll_pause).await;

        match session.click(&button).await {
            Ok(()) => {}
            Err(e) => {
                if !matches!(e, BrowserError::ClickIntercepted) {
                    warn!("Click on 'load more' failed ({}), forcing", e);
                } else {
                    debug!("Click intercepted, forcing");
                }
                if let Err(e) = session.force_click(&button).await {
                    warn!("Forced click failed ({}); stopping expansion", e);
                    break;
                }
                stats.forced += 1;
            }
        }
        stats.clicks += 1;
        tokio::time::sleep(timing.click_settle).await;
    }

    if stats.clicks >= max_clicks {
        warn!("Stopped after {} 'load more' clicks", max_clicks);
    }

    if let Err(e) = session.run_script(SCROLL_TO_BOTTOM_JS).await {
        warn!("Final scroll failed: {}", e);
    }
    tokio::time::sleep(timing.final_settle).await;
    stats
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScrapePhase {
    NotStarted,
    PageLoading,
    Expanding,
    Extracting,
    Done,
}

/// One genre's listing page, driven through its states on a single session.
pub struct GenreScraper<'a> {
    genre: &'a GenreSource,
    settings: &'a ScrapeSettings,
    phase: ScrapePhase,
    expand: ExpandStats,
}

impl<'a> GenreScraper<'a> {
    pub fn new(genre: &'a GenreSource, settings: &'a ScrapeSettings) -> Self {
        Self {
            genre,
            settings,
            phase: ScrapePhase::NotStarted,
            expand: ExpandStats::default(),
        }
    }

    pub fn phase(&self) -> ScrapePhase {
        self.phase
    }

    pub fn expand_stats(&self) -> ExpandStats {
        self.expand
    }

    fn enter(&mut self, phase: ScrapePhase) {
        debug!("{:?} -> {:?}", self.phase, phase);
        self.phase = phase;
    }

    pub async fn run<S: BrowserSession>(&mut self, session: &S) -> Result<GenreExtract, ScrapeError> {
        let name = &self.genre.name;
        let s = self.settings;

        self.enter(ScrapePhase::PageLoading);
        info!("Starting to scrape {} movies", name);
        session
            .navigate(&self.genre.url, s.navigation_timeout)
            .await
            .map_err(|source| ScrapeError::Navigation {
                genre: name.clone(),
                source,
            })?;

        self.enter(ScrapePhase::Expanding);
        self.expand = expand_page(session, &s.locators.load_more, s.timing, s.max_load_more_clicks).await;

        self.enter(ScrapePhase::Extracting);
        let cards = session
            .find_all(&s.locators.card)
            .await
            .map_err(|source| ScrapeError::Extraction {
                genre: name.clone(),
                source,
            })?;
        let extractor = ItemExtractor::new(&s.locators, s.votes_rule);
        let mut records = Vec::with_capacity(cards.len());
        for card in &cards {
            records.push(extractor.extract(session, card, name).await);
        }
        let complete = records.iter().filter(|r| r.is_complete()).count();
        info!(
            "Extracted {} movies in {} genre ({} with every field)",
            records.len(),
            name,
            complete
        );

        self.enter(ScrapePhase::Done);
        Ok(GenreExtract {
            genre: name.clone(),
            records,
        })
    }
}

#[derive(Debug)]
pub struct GenreRun {
    pub genre: String,
    pub rows: usize,
    pub artifact: PathBuf,
    pub expand: ExpandStats,
}

/// Full genre run: own session, scrape, release the session, overwrite the
/// genre artifact.
pub async fn scrape_genre<L: BrowserLauncher>(
    launcher: &L,
    genre: &GenreSource,
    settings: &ScrapeSettings,
    artifacts: &ArtifactStore,
) -> Result<GenreRun, ScrapeError> {
    let session = launcher.launch().await.map_err(|source| ScrapeError::Session {
        genre: genre.name.clone(),
        source,
    })?;

    let mut scraper = GenreScraper::new(genre, settings);
    let result = scraper.run(&session).await;
    if let Err(e) = session.close().await {
        warn!("Closing browser for {} failed: {}", genre.name, e);
    }
    let extract = result.inspect_err(|_| {
        warn!("{} stopped during {:?}", genre.name, scraper.phase());
    })?;

    let artifact = artifacts
        .write_genre(&extract)
        .map_err(|source| ScrapeError::Artifact {
            genre: genre.name.clone(),
            source,
        })?;
    Ok(GenreRun {
        genre: genre.name.clone(),
        rows: extract.records.len(),
        artifact,
        expand: scraper.expand_stats(),
    })
}

/// Run every genre, at most `concurrency` at a time, each with its own
/// session. A failed genre never stops the others. Results come back in
/// the order of `genres`.
pub async fn scrape_genres<L: BrowserLauncher>(
    launcher: Arc<L>,
    genres: Vec<GenreSource>,
    settings: Arc<ScrapeSettings>,
    artifacts: Arc<ArtifactStore>,
    concurrency: usize,
) -> Vec<Result<GenreRun, ScrapeError>> {
    let semaphore = Arc::new(Semaphore::new(concurrency.max(1)));

    let pb = ProgressBar::new(genres.len() as u64);
    if let Ok(style) = ProgressStyle::default_bar()
        .template("[{elapsed_precise}] {bar:40} {pos}/{len} genres ({msg})")
    {
        pb.set_style(style.progress_chars("=> "));
    }

    let handles: Vec<_> = genres
        .into_iter()
        .map(|genre| {
            let launcher = Arc::clone(&launcher);
            let settings = Arc::clone(&settings);
            let artifacts = Arc::clone(&artifacts);
            let sem = Arc::clone(&semaphore);
            let span = info_span!("genre", genre = %genre.name);
            let name = genre.name.clone();
            let handle = tokio::spawn(
                async move {
                    let _permit = sem.acquire_owned().await;
                    scrape_genre(launcher.as_ref(), &genre, &settings, &artifacts).await
                }
                .instrument(span),
            );
            (name, handle)
        })
        .collect();

    let mut results = Vec::with_capacity(handles.len());
    for (name, handle) in handles {
        let result = match handle.await {
            Ok(result) => result,
            Err(e) => Err(ScrapeError::Session {
                genre: name.clone(),
                source: BrowserError::Protocol(format!("genre task aborted: {e}")),
            }),
        };
        match &result {
            Ok(run) => info!("{}: {} rows -> {}", run.genre, run.rows, run.artifact.display()),
            Err(e) => warn!("{}", e),
        }
        pb.set_message(name);
        pb.inc(1);
        results.push(result);
    }
    pb.finish_and_clear();
    results
}
