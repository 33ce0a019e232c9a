use serde::{Deserialize, Serialize};

pub const POSTER_BASE_URL: &str = "https://image.tmdb.org/t/p/w500";
pub const POSTER_SMALL_BASE_URL: &str = "https://image.tmdb.org/t/p/w342";

/// Fields available from a plain `movie/{id}` request
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MinimalFields {
    pub poster_path: Option<String>,
    pub poster_url: Option<String>,
    pub poster_url_w342: Option<String>,
    pub tmdb_vote_average: Option<f64>,
    pub tmdb_vote_count: u32,
    /// `vote_average / 2`, on the same 5-star scale as user ratings
    pub tmdb_stars: Option<f64>,
    pub genres: Vec<String>,
    pub countries: Vec<String>,
    pub runtime: Option<u32>,
    pub original_language: Option<String>,
    pub release_date: Option<String>,
}

impl MinimalFields {
    pub fn with_poster(mut self, poster_path: Option<String>) -> Self {
        self.poster_url = poster_path
            .as_ref()
            .map(|p| format!("{}{}", POSTER_BASE_URL, p));
        self.poster_url_w342 = poster_path
            .as_ref()
            .map(|p| format!("{}{}", POSTER_SMALL_BASE_URL, p));
        self.poster_path = poster_path;
        self
    }

    pub fn with_votes(mut self, vote_average: Option<f64>, vote_count: Option<u32>) -> Self {
        self.tmdb_vote_average = vote_average;
        self.tmdb_vote_count = vote_count.unwrap_or(0);
        self.tmdb_stars = vote_average.map(|v| v / 2.0);
        self
    }
}

/// Fields that need credits and keywords
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ExtendedFields {
    pub directors: Vec<String>,
    pub actors: Vec<String>,
    pub keywords: Vec<String>,
}

impl ExtendedFields {
    pub fn is_empty(&self) -> bool {
        self.directors.is_empty() && self.actors.is_empty() && self.keywords.is_empty()
    }
}
