pub mod progress_sink;

pub use progress_sink::{FileProgressSink, JobRegistry, ProgressReporter, ProgressSink};
