pub mod cache;    // Durable SQLite cache with a single writer thread
pub mod jobs;     // Job lifecycle, governor and two-phase scheduler
pub mod provider; // TMDb client, retries and run memos
