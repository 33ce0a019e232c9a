/// Domain entities of an enrichment job
///
/// A job turns input rows into enriched records and exposes its progress as
/// a snapshot that collaborators poll.
use crate::modules::provider::domain::entities::{ExtendedFields, MinimalFields};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// User-facing message when memory pressure stops a run
pub const ABORT_MESSAGE: &str =
    "The file is too large for the current server. Try a smaller export or retry later.";

/// One input movie. Unknown fields are carried through to the output record.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct InputRow {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub year: Option<i32>,
    /// User rating on a 5-star scale
    #[serde(default)]
    pub rating: Option<f64>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl InputRow {
    pub fn new(title: &str, year: Option<i32>, rating: Option<f64>) -> Self {
        Self {
            title: title.to_string(),
            year,
            rating,
            extra: Map::new(),
        }
    }

    /// Rows without a title produce no record
    pub fn is_blank(&self) -> bool {
        self.title.trim().is_empty()
    }
}

/// Keys the enrichment writes into every record. Input columns with these
/// names are not carried through.
pub const ENRICHED_KEYS: &[&str] = &[
    "tmdb_id",
    "poster_path",
    "poster_url",
    "poster_url_w342",
    "tmdb_vote_average",
    "tmdb_vote_count",
    "tmdb_stars",
    "genres",
    "countries",
    "runtime",
    "original_language",
    "release_date",
    "directors",
    "actors",
    "keywords",
];

/// Output record. Built once by phase 1; phase 2 only fills `extended`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EnrichedRecord {
    pub title: String,
    pub year: Option<i32>,
    pub rating: Option<f64>,
    #[serde(flatten)]
    pub source: Map<String, Value>,
    pub tmdb_id: Option<i64>,
    #[serde(flatten)]
    pub minimal: MinimalFields,
    #[serde(flatten)]
    pub extended: Option<ExtendedFields>,
}

impl EnrichedRecord {
    pub fn from_row(row: &InputRow, tmdb_id: Option<i64>, minimal: MinimalFields) -> Self {
        Self {
            title: row.title.clone(),
            year: row.year,
            rating: row.rating,
            source: row
                .extra
                .iter()
                .filter(|(key, _)| !ENRICHED_KEYS.contains(&key.as_str()))
                .map(|(key, value)| (key.clone(), value.clone()))
                .collect(),
            tmdb_id,
            minimal,
            extended: None,
        }
    }

    pub fn tmdb_stars(&self) -> Option<f64> {
        self.minimal.tmdb_stars
    }

    pub fn vote_count(&self) -> u32 {
        self.minimal.tmdb_vote_count
    }
}

/// Job status as seen by collaborators
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    Processing,
    Done,
    Error,
}

impl std::fmt::Display for JobStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            JobStatus::Processing => write!(f, "processing"),
            JobStatus::Done => write!(f, "done"),
            JobStatus::Error => write!(f, "error"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStage {
    Parsing,
    TmdbDetails,
    TmdbExtras,
    Finalizing,
}

impl JobStage {
    pub fn message(&self) -> &'static str {
        match self {
            JobStage::Parsing => "Reading input…",
            JobStage::TmdbDetails => "Loading TMDb data…",
            JobStage::TmdbExtras => "Loading cast and keywords…",
            JobStage::Finalizing => "Preparing the result…",
        }
    }
}

/// Progress snapshot of one job.
///
/// `done` never decreases and a terminal status is never left.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobProgress {
    pub status: JobStatus,
    pub stage: JobStage,
    pub total: usize,
    pub done: usize,
    pub percent: u8,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub report_path: Option<String>,
}

impl Default for JobProgress {
    fn default() -> Self {
        Self {
            status: JobStatus::Processing,
            stage: JobStage::Parsing,
            total: 0,
            done: 0,
            percent: 1,
            message: JobStage::Parsing.message().to_string(),
            report_path: None,
        }
    }
}

impl JobProgress {
    pub fn is_terminal(&self) -> bool {
        self.status != JobStatus::Processing
    }

    /// Enter a stage; its default message replaces the current one.
    pub fn enter_stage(&mut self, stage: JobStage) {
        if self.is_terminal() {
            return;
        }
        self.stage = stage;
        self.message = stage.message().to_string();
    }

    pub fn set_total(&mut self, total: usize) {
        if self.is_terminal() {
            return;
        }
        self.total = total;
        self.recompute_percent();
    }

    pub fn set_message(&mut self, message: impl Into<String>) {
        if self.is_terminal() {
            return;
        }
        self.message = message.into();
    }

    /// Move `done` forward. Smaller values are ignored.
    pub fn advance(&mut self, done: usize) {
        if self.is_terminal() || done <= self.done {
            return;
        }
        self.done = if self.total > 0 {
            done.min(self.total)
        } else {
            done
        };
        self.recompute_percent();
    }

    pub fn complete(&mut self, report_path: Option<String>) {
        if self.is_terminal() {
            return;
        }
        self.status = JobStatus::Done;
        self.percent = 100;
        self.message = "Done".to_string();
        self.report_path = report_path;
    }

    pub fn fail(&mut self, message: impl Into<String>) {
        if self.is_terminal() {
            return;
        }
        self.status = JobStatus::Error;
        self.message = message.into();
    }

    fn recompute_percent(&mut self) {
        if self.total > 0 {
            let ratio = 100.0 * self.done as f64 / self.total as f64;
            self.percent = ratio.round().min(100.0) as u8;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_input_columns_never_shadow_enriched_keys() {
        let row: InputRow = serde_json::from_value(json!({
            "title": "Heat",
            "year": 1995,
            "letterboxd_uri": "https://boxd.it/2bbs",
            "genres": "Crime",
            "tmdb_id": "stale"
        }))
        .unwrap();
        let minimal = MinimalFields {
            genres: vec!["Thriller".to_string()],
            ..MinimalFields::default()
        };

        let record = EnrichedRecord::from_row(&row, Some(949), minimal);
        let raw = serde_json::to_string(&record).unwrap();
        assert_eq!(raw.matches("\"genres\"").count(), 1);
        assert_eq!(raw.matches("\"tmdb_id\"").count(), 1);

        let value: Value = serde_json::from_str(&raw).unwrap();
        assert_eq!(value["tmdb_id"], json!(949));
        assert_eq!(value["genres"], json!(["Thriller"]));
        assert_eq!(value["letterboxd_uri"], json!("https://boxd.it/2bbs"));
    }

    #[test]
    fn test_job_status_display() {
        assert_eq!(JobStatus::Processing.to_string(), "processing");
        assert_eq!(JobStatus::Done.to_string(), "done");
        assert_eq!(JobStatus::Error.to_string(), "error");
    }

    #[test]
    fn test_progress_percent_and_monotonic_done() {
        let mut progress = JobProgress::default();
        progress.enter_stage(JobStage::TmdbDetails);
        progress.set_total(3);

        progress.advance(1);
        assert_eq!(progress.percent, 33);
        progress.advance(2);
        assert_eq!(progress.percent, 67);
        progress.advance(1);
        assert_eq!(progress.done, 2);
        progress.advance(10);
        assert_eq!(progress.done, 3);
        assert_eq!(progress.percent, 100);
    }

    #[test]
    fn test_terminal_state_is_final() {
        let mut progress = JobProgress::default();
        progress.set_total(10);
        progress.fail("boom");
        progress.advance(5);
        progress.complete(None);
        progress.enter_stage(JobStage::Finalizing);

        assert_eq!(progress.status, JobStatus::Error);
        assert_eq!(progress.done, 0);
        assert_eq!(progress.message, "boom");
        assert_eq!(progress.stage, JobStage::Parsing);
    }

    #[test]
    fn test_progress_serializes_snake_case() {
        let mut progress = JobProgress::default();
        progress.enter_stage(JobStage::TmdbDetails);
        let value = serde_json::to_value(&progress).unwrap();
        assert_eq!(value["status"], "processing");
        assert_eq!(value["stage"], "tmdb_details");
        assert!(value.get("report_path").is_none());
    }

    #[test]
    fn test_input_row_keeps_extra_fields() {
        let row: InputRow = serde_json::from_value(json!({
            "title": "Heat",
            "year": 1995,
            "rating": 4.5,
            "letterboxd_url": "https://boxd.it/x"
        }))
        .unwrap();
        assert_eq!(row.extra["letterboxd_url"], "https://boxd.it/x");

        let record = EnrichedRecord::from_row(&row, Some(949), MinimalFields::default());
        let value = serde_json::to_value(&record).unwrap();
        assert_eq!(value["letterboxd_url"], "https://boxd.it/x");
        assert_eq!(value["tmdb_id"], 949);
        assert!(value.get("directors").is_none());
    }

    #[test]
    fn test_blank_rows() {
        assert!(InputRow::new("  ", None, None).is_blank());
        assert!(!InputRow::new("Heat", None, None).is_blank());
    }
}
