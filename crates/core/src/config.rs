use crate::extractor::LopdfExtractor;
use crate::ingest::IngestionPipeline;
use crate::orchestrator::SearchCoordinator;
use crate::placement::UploadRoot;
use crate::stores::{MemoryRecordStore, SqliteRecordStore};
use crate::summarizer::{HeuristicSummarizer, ModelSummarizer, Summarizer};
use crate::traits::RecordStore;
use crate::IngestError;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

pub const DEFAULT_UPLOAD_ROOT: &str = "uploaded_pdfs";
pub const DEFAULT_DATABASE: &str = "instructions_database.db";
pub const DEFAULT_SUMMARIZER_TIMEOUT_SECS: u64 = 20;
pub const SUMMARIZER_ENDPOINT_VAR: &str = "SUMMARIZER_ENDPOINT";
pub const SUMMARIZER_API_KEY_VAR: &str = "SUMMARIZER_API_KEY";

fn default_timeout_secs() -> u64 {
    DEFAULT_SUMMARIZER_TIMEOUT_SECS
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum StoreBackend {
    Memory,
    Sqlite { path: PathBuf },
}

impl Default for StoreBackend {
    fn default() -> Self {
        Self::Sqlite {
            path: PathBuf::from(DEFAULT_DATABASE),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SummarizerConfig {
    #[default]
    Heuristic,
    Model {
        endpoint: String,
        #[serde(default)]
        api_key: Option<String>,
        #[serde(default = "default_timeout_secs")]
        timeout_secs: u64,
    },
}

impl SummarizerConfig {
    /// Model summarizer settings from `SUMMARIZER_ENDPOINT` and
    /// `SUMMARIZER_API_KEY`, or `None` when no endpoint is set.
    pub fn model_from_env(timeout_secs: u64) -> Option<Self> {
        Self::model_from_vars(|name| std::env::var(name).ok(), timeout_secs)
    }

    fn model_from_vars(var: impl Fn(&str) -> Option<String>, timeout_secs: u64) -> Option<Self> {
        let endpoint = var(SUMMARIZER_ENDPOINT_VAR)
            .map(|value| value.trim().to_string())
            .filter(|endpoint| !endpoint.is_empty())?;

        let api_key = var(SUMMARIZER_API_KEY_VAR)
            .map(|value| value.trim().to_string())
            .filter(|key| !key.is_empty());

        Some(Self::Model {
            endpoint,
            api_key,
            timeout_secs,
        })
    }

    pub fn build(&self) -> Result<Arc<dyn Summarizer>, IngestError> {
        match self {
            Self::Heuristic => Ok(Arc::new(HeuristicSummarizer)),
            Self::Model {
                endpoint,
                api_key,
                timeout_secs,
            } => {
                if *timeout_secs == 0 {
                    return Err(IngestError::InvalidConfig(
                        "summarizer timeout must be at least one second".to_string(),
                    ));
                }
                let summarizer = ModelSummarizer::new(
                    endpoint,
                    api_key.clone(),
                    Duration::from_secs(*timeout_secs),
                )?;
                Ok(Arc::new(summarizer))
            }
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct KnowledgeBaseConfig {
    pub upload_root: PathBuf,
    #[serde(default)]
    pub store: StoreBackend,
    #[serde(default)]
    pub summarizer: SummarizerConfig,
}

impl Default for KnowledgeBaseConfig {
    fn default() -> Self {
        Self {
            upload_root: PathBuf::from(DEFAULT_UPLOAD_ROOT),
            store: StoreBackend::default(),
            summarizer: SummarizerConfig::default(),
        }
    }
}

impl KnowledgeBaseConfig {
    pub fn from_json_file(path: &Path) -> Result<Self, IngestError> {
        let data = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&data)?)
    }
}

/// Handles produced by [`init_store`].
pub struct KnowledgeBase {
    pub upload_root: UploadRoot,
    pub store: Arc<dyn RecordStore>,
    pub summarizer: Arc<dyn Summarizer>,
}

impl KnowledgeBase {
    pub fn pipeline(&self) -> IngestionPipeline<LopdfExtractor> {
        IngestionPipeline::with_parts(
            self.upload_root.clone(),
            LopdfExtractor,
            Arc::clone(&self.summarizer),
        )
    }

    pub fn search_coordinator(&self) -> SearchCoordinator {
        SearchCoordinator::new(Arc::clone(&self.store))
    }
}

/// Process-start initialization: creates the upload root (idempotent),
/// opens the record store and builds the configured summarizer.
pub fn init_store(config: &KnowledgeBaseConfig) -> Result<KnowledgeBase, IngestError> {
    let upload_root = UploadRoot::open(&config.upload_root)?;

    let store: Arc<dyn RecordStore> = match &config.store {
        StoreBackend::Memory => Arc::new(MemoryRecordStore::new()),
        StoreBackend::Sqlite { path } => Arc::new(SqliteRecordStore::open(path)?),
    };
    let summarizer = config.summarizer.build()?;

    info!(
        upload_root = %upload_root.path().display(),
        store = ?config.store,
        summarizer = summarizer.name(),
        "knowledge base initialized"
    );

    Ok(KnowledgeBase {
        upload_root,
        store,
        summarizer,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{NewInstruction, SearchQuery, UploadedArtifact};
    use tempfile::tempdir;

    #[test]
    fn config_file_defaults_store_and_summarizer() -> Result<(), Box<dyn std::error::Error>> {
        let dir = tempdir()?;
        let path = dir.path().join("config.json");
        std::fs::write(&path, r#"{"upload_root": "pdfs"}"#)?;

        let config = KnowledgeBaseConfig::from_json_file(&path)?;
        assert_eq!(config.upload_root, PathBuf::from("pdfs"));
        assert_eq!(config.store, StoreBackend::default());
        assert_eq!(config.summarizer, SummarizerConfig::Heuristic);
        Ok(())
    }

    #[test]
    fn model_config_parses_with_default_timeout() -> Result<(), serde_json::Error> {
        let parsed: SummarizerConfig =
            serde_json::from_str(r#"{"kind": "model", "endpoint": "http://localhost:8080/summarize"}"#)?;
        assert_eq!(
            parsed,
            SummarizerConfig::Model {
                endpoint: "http://localhost:8080/summarize".to_string(),
                api_key: None,
                timeout_secs: DEFAULT_SUMMARIZER_TIMEOUT_SECS,
            }
        );
        Ok(())
    }

    #[test]
    fn model_settings_come_from_endpoint_and_key_vars() {
        let vars = |name: &str| match name {
            SUMMARIZER_ENDPOINT_VAR => Some(" http://localhost:8080/summarize ".to_string()),
            SUMMARIZER_API_KEY_VAR => Some("secret".to_string()),
            _ => None,
        };

        assert_eq!(
            SummarizerConfig::model_from_vars(vars, 5),
            Some(SummarizerConfig::Model {
                endpoint: "http://localhost:8080/summarize".to_string(),
                api_key: Some("secret".to_string()),
                timeout_secs: 5,
            })
        );
    }

    #[test]
    fn missing_or_blank_endpoint_var_means_no_model() {
        assert_eq!(SummarizerConfig::model_from_vars(|_| None, 20), None);
        assert_eq!(
            SummarizerConfig::model_from_vars(|_| Some("   ".to_string()), 20),
            None
        );
    }

    #[test]
    fn blank_api_key_var_is_dropped() {
        let vars = |name: &str| match name {
            SUMMARIZER_ENDPOINT_VAR => Some("http://localhost:8080".to_string()),
            _ => Some(" ".to_string()),
        };
        assert!(matches!(
            SummarizerConfig::model_from_vars(vars, 20),
            Some(SummarizerConfig::Model { api_key: None, .. })
        ));
    }

    #[test]
    fn zero_timeout_is_rejected() {
        let config = SummarizerConfig::Model {
            endpoint: "http://localhost:8080".to_string(),
            api_key: None,
            timeout_secs: 0,
        };
        assert!(matches!(config.build(), Err(IngestError::InvalidConfig(_))));
    }

    #[test]
    fn init_store_is_idempotent_and_wires_components() -> Result<(), Box<dyn std::error::Error>> {
        let dir = tempdir()?;
        let config = KnowledgeBaseConfig {
            upload_root: dir.path().join("uploaded_pdfs"),
            store: StoreBackend::Sqlite {
                path: dir.path().join("instructions_database.db"),
            },
            summarizer: SummarizerConfig::Heuristic,
        };

        let knowledge_base = init_store(&config)?;
        knowledge_base
            .store
            .insert(NewInstruction::new("Aktion anlegen", "Summary:\nAktion", "")?)?;
        drop(knowledge_base);

        let knowledge_base = init_store(&config)?;
        let result = knowledge_base
            .search_coordinator()
            .search(&SearchQuery::new("aktion"))?;
        assert_eq!(result.hits.len(), 1);

        let report = knowledge_base.pipeline().ingest_batch(
            knowledge_base.store.as_ref(),
            vec![UploadedArtifact::new("broken.pdf", b"not a pdf".to_vec())],
        )?;
        assert_eq!(report.failure_count(), 1);
        Ok(())
    }
}
