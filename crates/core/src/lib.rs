pub mod config;
pub mod error;
pub mod extractor;
pub mod fuzzy;
pub mod ingest;
pub mod models;
pub mod normalizer;
pub mod orchestrator;
pub mod placement;
pub mod retrieval;
pub mod stores;
pub mod summarizer;
pub mod traits;

pub use config::{
    init_store, KnowledgeBase, KnowledgeBaseConfig, StoreBackend, SummarizerConfig,
    SUMMARIZER_API_KEY_VAR, SUMMARIZER_ENDPOINT_VAR,
};
pub use error::{IngestError, SearchError, StoreError};
pub use extractor::{join_page_texts, LopdfExtractor, PdfExtractor};
pub use fuzzy::{default_process, partial_ratio, ratio};
pub use ingest::{
    artifact_from_path, discover_pdf_files, load_seed_file, seed_records, FailedArtifact,
    IngestedArtifact, IngestionPipeline, IngestionReport,
};
pub use models::{
    InstructionRecord, NewInstruction, RecordId, SearchHit, SearchMode, SearchQuery, SearchResult,
    UploadedArtifact, DEFAULT_TOP_K,
};
pub use normalizer::{normalize_content, StructuredBody, NO_CONTENT_EXTRACTED};
pub use orchestrator::{rank_fuzzy, SearchCoordinator};
pub use placement::UploadRoot;
pub use retrieval::{check_attachment, find_instruction, Attachment};
pub use stores::{MemoryRecordStore, SqliteRecordStore};
pub use summarizer::{HeuristicSummarizer, ModelSummarizer, Summarizer};
pub use traits::RecordStore;
