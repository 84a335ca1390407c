use chrono::Utc;
use clap::{Parser, Subcommand, ValueEnum};
use instruction_search_core::{
    artifact_from_path, discover_pdf_files, find_instruction, init_store, load_seed_file,
    seed_records, Attachment, IngestError, KnowledgeBase, KnowledgeBaseConfig, NewInstruction,
    IngestionReport, SearchMode, SearchQuery, StoreBackend, SummarizerConfig, DEFAULT_TOP_K,
    SUMMARIZER_ENDPOINT_VAR,
};
use std::path::PathBuf;
use tracing::{error, info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[derive(Clone, Copy, ValueEnum)]
enum SummarizerKind {
    Heuristic,
    Model,
}

#[derive(Clone, Copy, ValueEnum)]
enum ModeArg {
    Fuzzy,
    Substring,
}

impl From<ModeArg> for SearchMode {
    fn from(value: ModeArg) -> Self {
        match value {
            ModeArg::Fuzzy => SearchMode::Fuzzy,
            ModeArg::Substring => SearchMode::Substring,
        }
    }
}

#[derive(Parser)]
#[command(name = "instruction-search", version)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// JSON config file; replaces the storage and summarizer flags below.
    #[arg(long, env = "INSTRUCTIONS_CONFIG")]
    config: Option<PathBuf>,

    /// Directory uploaded PDFs are copied into.
    #[arg(long, env = "INSTRUCTIONS_UPLOAD_ROOT", default_value = "uploaded_pdfs")]
    upload_root: PathBuf,

    /// SQLite database file.
    #[arg(long, env = "INSTRUCTIONS_DATABASE", default_value = "instructions_database.db")]
    database: PathBuf,

    /// Keep records in memory only (nothing survives the process).
    #[arg(long, default_value_t = false)]
    in_memory: bool,

    /// Summary strategy for ingested documents.
    #[arg(long, value_enum, default_value = "heuristic")]
    summarizer: SummarizerKind,

    /// Summarization endpoint for `--summarizer model`. Without it the
    /// endpoint and key are read from SUMMARIZER_ENDPOINT and SUMMARIZER_API_KEY.
    #[arg(long)]
    summarizer_endpoint: Option<String>,

    /// Bearer token for `--summarizer-endpoint`.
    #[arg(long, requires = "summarizer_endpoint")]
    summarizer_api_key: Option<String>,

    /// Upper bound for one summarization request.
    #[arg(long, default_value = "20")]
    summarizer_timeout_secs: u64,
}

#[derive(Subcommand)]
enum Command {
    /// Create the upload root and the database.
    Init,
    /// Ingest PDF manuals as instruction records.
    Ingest {
        /// PDF files to ingest.
        #[arg(long = "file")]
        files: Vec<PathBuf>,
        /// Folder searched recursively for PDFs.
        #[arg(long)]
        folder: Option<PathBuf>,
        /// Title for the record; only valid with a single file.
        #[arg(long)]
        title: Option<String>,
    },
    /// Insert records from a JSON array of {title, content, pdf_path}.
    Seed {
        #[arg(long)]
        file: PathBuf,
    },
    /// Insert a single record by hand.
    Add {
        #[arg(long)]
        title: String,
        #[arg(long)]
        content: String,
        #[arg(long, default_value = "")]
        pdf_path: String,
    },
    /// Find the instructions that best match a question.
    Search {
        /// Free-text question.
        #[arg(long)]
        query: String,
        /// Number of results to return.
        #[arg(long, default_value_t = DEFAULT_TOP_K)]
        top_k: usize,
        #[arg(long, value_enum, default_value = "fuzzy")]
        mode: ModeArg,
        /// Only return results scoring above this.
        #[arg(long, default_value_t = 0.0)]
        min_score: f64,
    },
    /// Print one record and the state of its PDF.
    Show {
        #[arg(long)]
        title: String,
    },
    /// List all records.
    List,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let app_version = env!("CARGO_PKG_VERSION");

    tracing_subscriber::registry()
        .with(EnvFilter::from_default_env())
        .with(fmt::layer())
        .init();

    let cli = Cli::parse();
    info!(
        version = app_version,
        started_at = %Utc::now().to_rfc3339(),
        "instruction-search boot"
    );

    tokio::task::spawn_blocking(move || run(cli)).await?
}

fn build_config(cli: &Cli) -> anyhow::Result<KnowledgeBaseConfig> {
    if let Some(path) = &cli.config {
        return KnowledgeBaseConfig::from_json_file(path)
            .map_err(|error| anyhow::anyhow!("cannot load config {}: {error}", path.display()));
    }

    let store = if cli.in_memory {
        StoreBackend::Memory
    } else {
        StoreBackend::Sqlite {
            path: cli.database.clone(),
        }
    };

    let summarizer = match cli.summarizer {
        SummarizerKind::Heuristic => SummarizerConfig::Heuristic,
        SummarizerKind::Model => match &cli.summarizer_endpoint {
            Some(endpoint) => SummarizerConfig::Model {
                endpoint: endpoint.clone(),
                api_key: cli.summarizer_api_key.clone(),
                timeout_secs: cli.summarizer_timeout_secs,
            },
            None => SummarizerConfig::model_from_env(cli.summarizer_timeout_secs).ok_or_else(|| {
                anyhow::anyhow!(
                    "--summarizer model needs --summarizer-endpoint or {SUMMARIZER_ENDPOINT_VAR}"
                )
            })?,
        },
    };

    Ok(KnowledgeBaseConfig {
        upload_root: cli.upload_root.clone(),
        store,
        summarizer,
    })
}

fn run(cli: Cli) -> anyhow::Result<()> {
    let config = build_config(&cli)?;
    let knowledge_base =
        init_store(&config).map_err(|error| anyhow::anyhow!(error.to_string()))?;

    match cli.command {
        Command::Init => {
            println!(
                "upload root {} ready, store {:?}",
                knowledge_base.upload_root.path().display(),
                config.store
            );
        }
        Command::Ingest {
            files,
            folder,
            title,
        } => ingest(&knowledge_base, files, folder, title)?,
        Command::Seed { file } => {
            let records = load_seed_file(&file).map_err(|error| anyhow::anyhow!(error.to_string()))?;
            let ids = seed_records(knowledge_base.store.as_ref(), records)
                .map_err(|error| anyhow::anyhow!(error.to_string()))?;
            println!("{} records seeded from {}", ids.len(), file.display());
        }
        Command::Add {
            title,
            content,
            pdf_path,
        } => {
            let record = NewInstruction::new(title, content, pdf_path)
                .map_err(|error| anyhow::anyhow!(error.to_string()))?;
            let id = knowledge_base
                .store
                .insert(record)
                .map_err(|error| anyhow::anyhow!(error.to_string()))?;
            println!("record {id} added");
        }
        Command::Search {
            query,
            top_k,
            mode,
            min_score,
        } => {
            let search_query = SearchQuery::new(query)
                .with_top_k(top_k)
                .with_mode(mode.into())
                .with_min_score(min_score);

            let result = match knowledge_base.search_coordinator().search(&search_query) {
                Ok(result) => result,
                Err(search_error) => {
                    error!(%search_error, "search failed");
                    anyhow::bail!("search failed, please try again later");
                }
            };

            println!("query: {}", result.query);
            if result.is_empty() {
                println!("no matching instructions found");
            }
            for hit in result.hits {
                println!(
                    "[{}] score={:.1} title={}",
                    hit.record.id, hit.score, hit.record.title
                );
                println!("{}", hit.record.content);
                print_attachment(&instruction_search_core::check_attachment(&hit.record));
                println!();
            }
        }
        Command::Show { title } => {
            match find_instruction(knowledge_base.store.as_ref(), &title)
                .map_err(|error| anyhow::anyhow!(error.to_string()))?
            {
                Some((record, attachment)) => {
                    println!("[{}] {}", record.id, record.title);
                    println!("{}", record.content);
                    print_attachment(&attachment);
                }
                None => println!("no instruction titled '{title}'"),
            }
        }
        Command::List => {
            let records = knowledge_base
                .store
                .list_all()
                .map_err(|error| anyhow::anyhow!(error.to_string()))?;
            for record in &records {
                let pdf = if record.has_attachment() {
                    record.pdf_path.as_str()
                } else {
                    "-"
                };
                println!("[{}] {} pdf={}", record.id, record.title, pdf);
            }
            println!("{} records", records.len());
        }
    }

    Ok(())
}

fn ingest(
    knowledge_base: &KnowledgeBase,
    mut files: Vec<PathBuf>,
    folder: Option<PathBuf>,
    title: Option<String>,
) -> anyhow::Result<()> {
    if let Some(folder) = &folder {
        files.extend(discover_pdf_files(folder));
    }
    if files.is_empty() {
        anyhow::bail!("nothing to ingest: pass --file or --folder");
    }
    if title.is_some() && files.len() > 1 {
        anyhow::bail!("--title can only be used with a single file");
    }

    let mut artifacts = Vec::new();
    let mut unreadable = Vec::new();
    for path in &files {
        match artifact_from_path(path) {
            Ok(artifact) => artifacts.push(match &title {
                Some(title) => artifact.with_title(title.clone()),
                None => artifact,
            }),
            Err(read_error) => unreadable.push((path.display().to_string(), read_error)),
        }
    }

    let report = knowledge_base
        .pipeline()
        .ingest_batch(knowledge_base.store.as_ref(), artifacts)
        .map_err(|error: IngestError| anyhow::anyhow!(error.to_string()))?;

    for item in &report.ingested {
        println!(
            "ingested {} as [{}] '{}' -> {}{}",
            item.name,
            item.record_id,
            item.title,
            item.pdf_path.display(),
            if item.no_content { " (no text extracted)" } else { "" }
        );
    }
    for (name, read_error) in &unreadable {
        warn!(file = %name, reason = %read_error, "could not read upload");
        println!("failed {name}: {read_error}");
    }
    for failure in &report.failed {
        println!("failed {}: {}", failure.name, failure.reason());
    }

    println!(
        "{} ingested, {} failed (batch {}) at {}",
        report.success_count(),
        report.failure_count() + unreadable.len(),
        report.batch_id,
        Utc::now().to_rfc3339()
    );
    batch_outcome(&report, unreadable.len())
}

/// A batch with any failed upload exits non-zero after the report is printed.
fn batch_outcome(report: &IngestionReport, unreadable: usize) -> anyhow::Result<()> {
    if report.is_complete_success() && unreadable == 0 {
        return Ok(());
    }
    anyhow::bail!(
        "{} of {} uploads failed",
        report.failure_count() + unreadable,
        report.success_count() + report.failure_count() + unreadable
    )
}

fn print_attachment(attachment: &Attachment) {
    match attachment {
        Attachment::NotAttached => {}
        Attachment::Available(path) => println!("  pdf: {}", path.display()),
        Attachment::Missing(path) => println!("  pdf missing: {}", path.display()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use instruction_search_core::{FailedArtifact, IngestedArtifact, RecordId};
    use uuid::Uuid;

    fn parse(args: &[&str]) -> Result<Cli, clap::Error> {
        Cli::try_parse_from(std::iter::once("instruction-search").chain(args.iter().copied()))
    }

    fn report(ingested: usize, failed: usize) -> IngestionReport {
        IngestionReport {
            batch_id: Uuid::new_v4(),
            ingested: (0..ingested)
                .map(|index| IngestedArtifact {
                    name: format!("{index}.pdf"),
                    record_id: RecordId(index as u64 + 1),
                    title: index.to_string(),
                    pdf_path: PathBuf::from(format!("uploaded_pdfs/{index}.pdf")),
                    checksum: String::new(),
                    no_content: false,
                })
                .collect(),
            failed: (0..failed)
                .map(|index| FailedArtifact {
                    name: format!("broken_{index}.pdf"),
                    error: IngestError::Extraction("no xref table".to_string()),
                })
                .collect(),
        }
    }

    #[test]
    fn endpoint_flag_builds_model_config() -> anyhow::Result<()> {
        let cli = parse(&[
            "--summarizer",
            "model",
            "--summarizer-endpoint",
            "http://localhost:8080/summarize",
            "--summarizer-api-key",
            "secret",
            "--summarizer-timeout-secs",
            "7",
            "list",
        ])?;

        let config = build_config(&cli)?;
        assert_eq!(
            config.summarizer,
            SummarizerConfig::Model {
                endpoint: "http://localhost:8080/summarize".to_string(),
                api_key: Some("secret".to_string()),
                timeout_secs: 7,
            }
        );
        Ok(())
    }

    #[test]
    fn api_key_flag_needs_an_endpoint_flag() {
        assert!(parse(&["--summarizer-api-key", "secret", "list"]).is_err());
    }

    #[test]
    fn heuristic_is_the_default_summarizer() -> anyhow::Result<()> {
        let config = build_config(&parse(&["--in-memory", "list"])?)?;
        assert_eq!(config.summarizer, SummarizerConfig::Heuristic);
        assert_eq!(config.store, StoreBackend::Memory);
        Ok(())
    }

    #[test]
    fn any_failed_upload_fails_the_command() {
        assert!(batch_outcome(&report(2, 0), 0).is_ok());

        let partial = batch_outcome(&report(2, 1), 0);
        assert_eq!(
            partial.map_err(|error| error.to_string()),
            Err("1 of 3 uploads failed".to_string())
        );

        let unreadable = batch_outcome(&report(1, 0), 1);
        assert_eq!(
            unreadable.map_err(|error| error.to_string()),
            Err("1 of 2 uploads failed".to_string())
        );
    }
}
