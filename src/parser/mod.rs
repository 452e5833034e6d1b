pub mod extract;
pub mod normalize;

/// One listing entry. Every field except `genre` is independently optional;
/// `None` means the card did not yield a parseable value.
#[derive(Debug, Clone, PartialEq)]
pub struct MovieRecord {
    pub title: Option<String>,
    pub genre: String,
    pub rating: Option<f64>,
    pub vote_count: Option<u64>,
    pub duration_minutes: Option<u32>,
}

impl MovieRecord {
    pub fn is_complete(&self) -> bool {
        self.title.is_some()
            && !self.genre.is_empty()
            && self.rating.is_some()
            && self.vote_count.is_some()
            && self.duration_minutes.is_some()
    }
}

/// Rows scraped from one genre's listing, in page order.
#[derive(Debug, Clone, PartialEq)]
pub struct GenreExtract {
    pub genre: String,
    pub records: Vec<MovieRecord>,
}
