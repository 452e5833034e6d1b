use tracing::debug;

use super::normalize::{
    normalize_duration, normalize_rating, normalize_title, normalize_votes, SuffixRule,
};
use super::MovieRecord;
use crate::browser::{BrowserSession, ListingLocators, Locator};

/// Turns one rendered listing card into a [`MovieRecord`].
///
/// Each field is looked up on its own; a missing or unreadable sub-element
/// only leaves that field empty.
pub struct ItemExtractor<'a> {
    locators: &'a ListingLocators,
    votes_rule: SuffixRule,
}

impl<'a> ItemExtractor<'a> {
    pub fn new(locators: &'a ListingLocators, votes_rule: SuffixRule) -> Self {
        Self {
            locators,
            votes_rule,
        }
    }

    pub async fn extract<S: BrowserSession>(
        &self,
        session: &S,
        card: &S::Node,
        genre: &str,
    ) -> MovieRecord {
        let l = self.locators;
        let title = self
            .field_text(session, card, &l.title)
            .await
            .map(|t| normalize_title(&t))
            .filter(|t| !t.is_empty());
        let rating = self
            .field_text(session, card, &l.rating)
            .await
            .and_then(|t| normalize_rating(&t));
        let vote_count = self
            .field_text(session, card, &l.votes)
            .await
            .and_then(|t| normalize_votes(&t, self.votes_rule));
        let duration_minutes = self
            .field_text(session, card, &l.duration)
            .await
            .and_then(|t| normalize_duration(&t));

        MovieRecord {
            title,
            genre: genre.to_string(),
            rating,
            vote_count,
            duration_minutes,
        }
    }

    async fn field_text<S: BrowserSession>(
        &self,
        session: &S,
        card: &S::Node,
        locator: &Locator,
    ) -> Option<String> {
        let node = match session.find_relative(card, locator).await {
            Ok(Some(node)) => node,
            Ok(None) => {
                debug!("card has no {}", locator);
                return None;
            }
            Err(e) => {
                debug!("lookup of {} failed: {}", locator, e);
                return None;
            }
        };
        match session.text(&node).await {
            Ok(Some(text)) if !text.trim().is_empty() => Some(text),
            Ok(_) => None,
            Err(e) => {
                debug!("reading {} failed: {}", locator, e);
                None
            }
        }
    }
}
