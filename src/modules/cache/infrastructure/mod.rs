pub mod models;
pub mod persistent_cache;
pub mod writer;
