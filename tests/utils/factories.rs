/// Test data factories
///
/// Build input rows, phase-1 records and TMDb payloads with sensible defaults.
use film_enricher::modules::jobs::{EnrichedRecord, InputRow};
use film_enricher::modules::provider::MinimalFields;
use serde_json::{json, Value};

pub fn row(title: &str, year: Option<i32>, rating: Option<f64>) -> InputRow {
    InputRow::new(title, year, rating)
}

/// Phase-1 record with an external rating on TMDb's 10-point scale
pub fn record(tmdb_id: i64, user_rating: Option<f64>, vote_average: Option<f64>, votes: u32) -> EnrichedRecord {
    EnrichedRecord::from_row(
        &InputRow::new(&format!("Movie {}", tmdb_id), Some(2000), user_rating),
        Some(tmdb_id),
        MinimalFields::default().with_votes(vote_average, Some(votes)),
    )
}

/// TMDb movie payload builder
pub struct MovieFactory {
    id: i64,
    title: String,
    vote_average: f64,
    vote_count: u32,
    poster_path: Option<String>,
    directors: Vec<String>,
    actors: Vec<String>,
    keywords: Vec<String>,
}

impl MovieFactory {
    pub fn new(id: i64, title: &str) -> Self {
        Self {
            id,
            title: title.to_string(),
            vote_average: 7.0,
            vote_count: 1000,
            poster_path: Some(format!("/poster{}.jpg", id)),
            directors: vec!["Jane Director".to_string()],
            actors: vec!["Lead Actor".to_string(), "Second Actor".to_string()],
            keywords: vec!["heist".to_string()],
        }
    }

    pub fn votes(mut self, vote_average: f64, vote_count: u32) -> Self {
        self.vote_average = vote_average;
        self.vote_count = vote_count;
        self
    }

    pub fn directors(mut self, names: &[&str]) -> Self {
        self.directors = names.iter().map(|n| n.to_string()).collect();
        self
    }

    /// `movie/{id}` body
    pub fn details(&self) -> Value {
        json!({
            "id": self.id,
            "title": self.title,
            "original_language": "en",
            "poster_path": self.poster_path,
            "release_date": "1995-12-15",
            "vote_average": self.vote_average,
            "vote_count": self.vote_count,
            "runtime": 170,
            "genres": [{"id": 80, "name": "Crime"}, {"id": 18, "name": "Drama"}],
            "production_countries": [{"iso_3166_1": "US", "name": "United States of America"}]
        })
    }

    /// `movie/{id}?append_to_response=credits,keywords` body
    pub fn details_with_extras(&self) -> Value {
        let mut body = self.details();
        let crew: Vec<Value> = self
            .directors
            .iter()
            .map(|name| json!({"name": name, "job": "Director", "department": "Directing"}))
            .chain(std::iter::once(
                json!({"name": "Some Writer", "job": "Screenplay", "department": "Writing"}),
            ))
            .collect();
        let cast: Vec<Value> = self
            .actors
            .iter()
            .enumerate()
            .map(|(i, name)| json!({"name": name, "character": "Role", "order": i}))
            .collect();
        let keywords: Vec<Value> = self
            .keywords
            .iter()
            .enumerate()
            .map(|(i, name)| json!({"id": i, "name": name}))
            .collect();

        body["credits"] = json!({"cast": cast, "crew": crew});
        body["keywords"] = json!({"keywords": keywords});
        body
    }
}

pub fn search_response(ids: &[i64]) -> Value {
    let results: Vec<Value> = ids.iter().map(|id| json!({"id": id, "title": "match"})).collect();
    json!({
        "page": 1,
        "results": results,
        "total_pages": 1,
        "total_results": ids.len()
    })
}
