pub mod enrichment_client;
pub mod run_memo;

pub use enrichment_client::{EnrichmentClient, FullBatch, RunMemos};
pub use run_memo::RunMemo;
