use super::models::{Credits, Genre, KeywordsResponse, MovieDetails, ProductionCountry};
use crate::modules::provider::domain::entities::{ExtendedFields, MinimalFields};

/// Top-billed cast members kept per movie
pub const MAX_ACTORS: usize = 8;
/// Keywords kept per movie
pub const MAX_KEYWORDS: usize = 20;

/// TMDB (The Movie Database) specific mapper implementation
#[derive(Debug, Clone, Default)]
pub struct TmdbMapper;

impl TmdbMapper {
    pub fn new() -> Self {
        Self
    }

    pub fn map_minimal(&self, movie: &MovieDetails) -> MinimalFields {
        MinimalFields {
            genres: Self::extract_genres(&movie.genres),
            countries: Self::extract_countries(&movie.production_countries),
            runtime: movie.runtime,
            original_language: movie.original_language.clone(),
            release_date: movie.release_date.clone().filter(|d| !d.is_empty()),
            ..MinimalFields::default()
        }
        .with_poster(movie.poster_path.clone())
        .with_votes(movie.vote_average, movie.vote_count)
    }

    pub fn map_extended(
        &self,
        credits: Option<&Credits>,
        keywords: Option<&KeywordsResponse>,
    ) -> ExtendedFields {
        ExtendedFields {
            directors: credits.map(Self::extract_directors).unwrap_or_default(),
            actors: credits.map(Self::extract_actors).unwrap_or_default(),
            keywords: keywords.map(Self::extract_keywords).unwrap_or_default(),
        }
    }

    /// Extract genre names
    fn extract_genres(genres: &[Genre]) -> Vec<String> {
        genres.iter().filter_map(|g| non_empty(&g.name)).collect()
    }

    fn extract_countries(countries: &[ProductionCountry]) -> Vec<String> {
        countries.iter().filter_map(|c| non_empty(&c.name)).collect()
    }

    /// Crew members credited with the "Director" job
    fn extract_directors(credits: &Credits) -> Vec<String> {
        credits
            .crew
            .iter()
            .filter(|c| c.job.as_deref() == Some("Director"))
            .filter_map(|c| non_empty(&c.name))
            .collect()
    }

    fn extract_actors(credits: &Credits) -> Vec<String> {
        credits
            .cast
            .iter()
            .filter_map(|c| non_empty(&c.name))
            .take(MAX_ACTORS)
            .collect()
    }

    fn extract_keywords(keywords: &KeywordsResponse) -> Vec<String> {
        keywords
            .keywords
            .iter()
            .filter_map(|k| non_empty(&k.name))
            .take(MAX_KEYWORDS)
            .collect()
    }
}

fn non_empty(value: &Option<String>) -> Option<String> {
    value.as_ref().filter(|v| !v.is_empty()).cloned()
}
