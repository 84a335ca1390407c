use crate::extractor::{LopdfExtractor, PdfExtractor};
use crate::normalizer::normalize_content;
use crate::placement::{sanitize_file_name, split_extension, UploadRoot};
use crate::summarizer::{HeuristicSummarizer, Summarizer};
use crate::traits::RecordStore;
use crate::{IngestError, NewInstruction, RecordId, StoreError, UploadedArtifact};
use sha2::{Digest, Sha256};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{info, warn};
use uuid::Uuid;
use walkdir::WalkDir;

pub fn discover_pdf_files(folder: &Path) -> Vec<PathBuf> {
    let mut files = Vec::new();

    for entry in WalkDir::new(folder)
        .into_iter()
        .filter_map(|item| item.ok())
    {
        if !entry.file_type().is_file() {
            continue;
        }

        let is_pdf = entry
            .path()
            .extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| ext.eq_ignore_ascii_case("pdf"));

        if is_pdf {
            files.push(entry.path().to_path_buf());
        }
    }

    files.sort_unstable();
    files
}

pub fn digest_bytes(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    format!("{:x}", hasher.finalize())
}

/// Reads a local file into an artifact named after its file name.
pub fn artifact_from_path(path: &Path) -> Result<UploadedArtifact, IngestError> {
    let name = path
        .file_name()
        .and_then(|name| name.to_str())
        .ok_or_else(|| {
            IngestError::InvalidArgument(format!("path missing filename: {}", path.display()))
        })?;
    let bytes = fs::read(path)?;
    Ok(UploadedArtifact::new(name, bytes))
}

/// Filename without its extension, e.g. `Kasse_Abschluss.pdf` -> `Kasse_Abschluss`.
pub fn title_from_file_name(name: &str) -> Result<String, IngestError> {
    let name = sanitize_file_name(name)?;
    let (stem, _) = split_extension(name);
    Ok(stem.trim().to_string())
}

#[derive(Debug, Clone)]
pub struct IngestedArtifact {
    pub name: String,
    pub record_id: RecordId,
    pub title: String,
    pub pdf_path: PathBuf,
    pub checksum: String,
    pub no_content: bool,
}

#[derive(Debug)]
pub struct FailedArtifact {
    pub name: String,
    pub error: IngestError,
}

impl FailedArtifact {
    pub fn reason(&self) -> String {
        self.error.to_string()
    }
}

#[derive(Debug)]
pub struct IngestionReport {
    pub batch_id: Uuid,
    pub ingested: Vec<IngestedArtifact>,
    pub failed: Vec<FailedArtifact>,
}

impl IngestionReport {
    pub fn success_count(&self) -> usize {
        self.ingested.len()
    }

    pub fn failure_count(&self) -> usize {
        self.failed.len()
    }

    pub fn is_complete_success(&self) -> bool {
        self.failed.is_empty()
    }
}

/// Extract -> normalize -> place -> insert, one artifact at a time.
///
/// An artifact either ends up as a file plus a record, or leaves nothing
/// behind. Extraction happens before placement, so unreadable uploads never
/// touch the upload root.
pub struct IngestionPipeline<E = LopdfExtractor> {
    upload_root: UploadRoot,
    extractor: E,
    summarizer: Arc<dyn Summarizer>,
}

impl IngestionPipeline<LopdfExtractor> {
    pub fn new(upload_root: UploadRoot) -> Self {
        Self::with_parts(upload_root, LopdfExtractor, Arc::new(HeuristicSummarizer))
    }
}

impl<E: PdfExtractor> IngestionPipeline<E> {
    pub fn with_parts(upload_root: UploadRoot, extractor: E, summarizer: Arc<dyn Summarizer>) -> Self {
        Self {
            upload_root,
            extractor,
            summarizer,
        }
    }

    /// Per-artifact failures are collected in the report; only an unusable
    /// upload root fails the whole call, including one that disappears or
    /// stops accepting files part way through. Records inserted before that
    /// point stay in the store.
    pub fn ingest_batch<I>(
        &self,
        store: &dyn RecordStore,
        artifacts: I,
    ) -> Result<IngestionReport, IngestError>
    where
        I: IntoIterator<Item = UploadedArtifact>,
    {
        self.upload_root.ensure_writable()?;

        let batch_id = Uuid::new_v4();
        let mut ingested = Vec::new();
        let mut failed = Vec::new();

        for artifact in artifacts {
            let name = artifact.name.clone();
            match self.ingest_one(store, artifact) {
                Ok(outcome) => ingested.push(outcome),
                Err(error @ IngestError::Placement { .. }) => {
                    warn!(
                        %batch_id,
                        artifact = %name,
                        ingested = ingested.len(),
                        %error,
                        "upload root lost, aborting batch"
                    );
                    return Err(error);
                }
                Err(error) => {
                    warn!(%batch_id, artifact = %name, %error, "artifact not ingested");
                    failed.push(FailedArtifact { name, error });
                }
            }
        }

        info!(
            %batch_id,
            ingested = ingested.len(),
            failed = failed.len(),
            "ingestion batch finished"
        );

        Ok(IngestionReport {
            batch_id,
            ingested,
            failed,
        })
    }

    pub fn ingest_one(
        &self,
        store: &dyn RecordStore,
        artifact: UploadedArtifact,
    ) -> Result<IngestedArtifact, IngestError> {
        let title = match &artifact.title {
            Some(title) if !title.trim().is_empty() => title.trim().to_string(),
            _ => title_from_file_name(&artifact.name)?,
        };
        if title.is_empty() {
            return Err(IngestError::InvalidArgument(format!(
                "cannot derive a title from '{}'",
                artifact.name
            )));
        }

        let raw_text = self.extractor.extract_text(&artifact.bytes)?;
        let body = normalize_content(&raw_text, self.summarizer.as_ref());
        let pdf_path = self.upload_root.persist(&artifact.name, &artifact.bytes)?;

        let inserted = NewInstruction::new(
            title.clone(),
            body.render(),
            pdf_path.to_string_lossy().to_string(),
        )
        .and_then(|record| store.insert(record));

        let record_id = match inserted {
            Ok(record_id) => record_id,
            Err(error) => {
                discard_upload(&pdf_path, &error);
                return Err(IngestError::Store(error));
            }
        };

        Ok(IngestedArtifact {
            name: artifact.name,
            record_id,
            title,
            pdf_path,
            checksum: digest_bytes(&artifact.bytes),
            no_content: body.is_no_content(),
        })
    }
}

fn discard_upload(path: &Path, cause: &StoreError) {
    if let Err(error) = fs::remove_file(path) {
        warn!(path = %path.display(), %cause, %error, "could not remove orphaned upload");
    }
}

/// Bulk insert of ready-made records, stopping at the first store failure.
pub fn seed_records(
    store: &dyn RecordStore,
    records: Vec<NewInstruction>,
) -> Result<Vec<RecordId>, StoreError> {
    let mut ids = Vec::with_capacity(records.len());
    for record in records {
        ids.push(store.insert(record)?);
    }
    info!(seeded = ids.len(), "seeded instruction records");
    Ok(ids)
}

/// Reads a JSON array of `{ "title", "content", "pdf_path"? }` objects.
pub fn load_seed_file(path: &Path) -> Result<Vec<NewInstruction>, IngestError> {
    let data = fs::read_to_string(path)?;
    let records: Vec<NewInstruction> = serde_json::from_str(&data)?;
    for record in &records {
        record.validate()?;
    }
    Ok(records)
}
