//! Request-path services
//!
//! The write path (ingestion) and the read path (retrieval) glue the local
//! cache, the fast tier, and the cold tier together with cache-aside logic.

pub mod ingestion;
pub mod retrieval;
pub mod types;

pub use ingestion::{DEFAULT_TTL_SECONDS, IngestionService};
pub use retrieval::RetrievalService;
pub use types::{CacheHint, IngestOutcome, IngestRequest, Retrieved, RetrievalSource, StoredTier};
