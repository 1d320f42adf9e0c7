//! Command-line interface for docstash.
//!
//! Provides commands for initializing a store, ingesting local files,
//! listing and inspecting stored documents, and showing configuration.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};

use crate::config::{self, ResolvedConfig};
use crate::domain::{ContentDigest, FileRecord, TypeCategory};
use crate::ingest::{stage_file, IngestQueue, Outcome, Pipeline};
use crate::store::MetadataStore;

/// docstash - content-addressed document store
#[derive(Parser, Debug)]
#[command(name = "docstash")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Create the storage directories and the metadata schema
    Init,

    /// Ingest local files
    Ingest {
        /// Files to ingest, processed in the given order
        #[arg(required = true)]
        files: Vec<PathBuf>,

        /// Display name for the stored document (single file only)
        #[arg(short, long)]
        name: Option<String>,
    },

    /// List stored documents, newest first
    List {
        /// Filter by document type
        #[arg(short = 't', long = "type", value_enum)]
        file_type: Option<DocType>,

        /// Maximum number of documents to show
        #[arg(short, long, default_value = "20")]
        limit: usize,

        /// Print records as JSON
        #[arg(long)]
        json: bool,
    },

    /// Show one document by original or converted checksum
    Show {
        /// SHA-256 hex digest
        checksum: String,
    },

    /// Show resolved configuration (debug)
    Config,
}

/// Document type for CLI (maps to TypeCategory)
#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum DocType {
    Pdf,
    Image,
    Plaintext,
}

impl From<DocType> for TypeCategory {
    fn from(t: DocType) -> Self {
        match t {
            DocType::Pdf => TypeCategory::Pdf,
            DocType::Image => TypeCategory::Image,
            DocType::Plaintext => TypeCategory::Plaintext,
        }
    }
}

impl Cli {
    /// Execute the CLI command
    pub async fn execute(self) -> Result<()> {
        match self.command {
            Commands::Init => init().await,
            Commands::Ingest { files, name } => ingest_files(files, name).await,
            Commands::List {
                file_type,
                limit,
                json,
            } => list_documents(file_type, limit, json).await,
            Commands::Show { checksum } => show_document(&checksum).await,
            Commands::Config => show_config().await,
        }
    }
}

/// Open the metadata store, creating the schema if needed.
///
/// Failure here is fatal: nothing can be ingested without metadata.
fn open_store(cfg: &ResolvedConfig) -> Result<MetadataStore> {
    MetadataStore::bootstrap(&cfg.layout.database).with_context(|| {
        format!(
            "Failed to open metadata store: {}",
            cfg.layout.database.display()
        )
    })
}

async fn init() -> Result<()> {
    let cfg = config::config()?;

    cfg.layout.ensure_dirs().with_context(|| {
        format!(
            "Failed to create storage directories under {}",
            cfg.layout.root.display()
        )
    })?;

    let mut store = MetadataStore::open(&cfg.layout.database).with_context(|| {
        format!(
            "Failed to open metadata store: {}",
            cfg.layout.database.display()
        )
    })?;
    let created = store.ensure_schema()?;

    println!("Root:     {}", cfg.layout.root.display());
    println!("Database: {}", cfg.layout.database.display());
    if created {
        println!("Schema created.");
    } else {
        println!("Schema already present, left untouched.");
    }

    Ok(())
}

async fn ingest_files(files: Vec<PathBuf>, name: Option<String>) -> Result<()> {
    if name.is_some() && files.len() != 1 {
        anyhow::bail!("--name can only be used with a single file");
    }

    let cfg = config::config()?;
    cfg.layout
        .ensure_dirs()
        .context("Failed to create storage directories")?;

    let store = open_store(cfg)?;
    let pipeline = Pipeline::for_layout(&cfg.layout, cfg.classifier, store);

    let mut items = Vec::with_capacity(files.len());
    let mut staging_failures = 0;
    for path in &files {
        match stage_file(path, &cfg.layout.temp_dir) {
            Ok(item) => items.push(match &name {
                Some(name) => item.with_desired_name(name.clone()),
                None => item,
            }),
            Err(e) => {
                eprintln!("✗ {}: {}", path.display(), e);
                staging_failures += 1;
            }
        }
    }

    let (queue, mut reports) = IngestQueue::spawn_with_reports(pipeline);
    queue.enqueue_batch(items)?;
    let stats = queue.shutdown().await?;

    while let Some(report) = reports.recv().await {
        let file = &report.item.original_name;
        match report.result {
            Ok(Outcome::Stored(record)) => {
                println!("✓ {} → {} ({})", file, record.file_path.display(), record.file_type)
            }
            Ok(Outcome::Duplicate(digest)) => println!("= {} already stored ({})", file, digest),
            Ok(Outcome::Unusable) => println!("- {} unusable, discarded", file),
            Ok(Outcome::Skipped) => println!("- {} skipped, staging file missing", file),
            Err(e) => eprintln!("✗ {}: {}", file, e),
        }
    }

    println!(
        "\nStored: {}  Duplicates: {}  Unusable: {}  Skipped: {}  Failed: {}",
        stats.stored,
        stats.duplicates,
        stats.unusable,
        stats.skipped,
        stats.failed + staging_failures
    );

    let failed = stats.failed + staging_failures;
    if failed > 0 {
        anyhow::bail!("{} of {} files failed", failed, files.len());
    }

    Ok(())
}

async fn list_documents(file_type: Option<DocType>, limit: usize, json: bool) -> Result<()> {
    let cfg = config::config()?;
    let store = open_store(cfg)?;

    let records = store.list(file_type.map(Into::into), Some(limit))?;

    if json {
        println!("{}", serde_json::to_string_pretty(&records)?);
        return Ok(());
    }

    if records.is_empty() {
        println!("No documents stored. Use 'docstash ingest <files>' to add some.");
        return Ok(());
    }

    println!("{:<6} {:<10} {:<18} {:<40}", "ID", "TYPE", "CHECKSUM", "NAME");
    println!("{}", "-".repeat(80));

    for record in &records {
        let name = if record.name.chars().count() > 37 {
            format!("{}...", record.name.chars().take(37).collect::<String>())
        } else {
            record.name.clone()
        };
        println!(
            "{:<6} {:<10} {:<18} {:<40}",
            record.id,
            record.file_type.to_string(),
            &record.converted_checksum.as_str()[..16],
            name
        );
    }

    println!("\nTotal: {} documents", store.count()?);

    Ok(())
}

async fn show_document(checksum: &str) -> Result<()> {
    let digest = ContentDigest::parse(checksum)
        .with_context(|| format!("Not a SHA-256 hex digest: {}", checksum))?;

    let cfg = config::config()?;
    let store = open_store(cfg)?;

    let record = match store.get_by_checksum(&digest)? {
        Some(record) => record,
        None => store
            .get_by_converted_checksum(&digest)?
            .with_context(|| format!("No document with checksum {}", digest))?,
    };

    print_record(&record);
    Ok(())
}

fn print_record(record: &FileRecord) {
    println!("ID:                 {}", record.id);
    println!("Name:               {}", record.name);
    println!("Original file name: {}", record.old_file_name);
    println!("Type:               {}", record.file_type);
    println!("Created:            {}", record.created_on.to_rfc3339());
    println!("Path:               {}", record.file_path.display());
    println!("Original checksum:  {}", record.original_checksum);
    println!("Converted checksum: {}", record.converted_checksum);
}

async fn show_config() -> Result<()> {
    let cfg = config::config()?;

    println!(
        "Config file: {}",
        cfg.config_file
            .as_ref()
            .map(|p| p.display().to_string())
            .unwrap_or_else(|| "(none - using defaults)".to_string())
    );
    println!();
    println!("Paths:");
    println!("  Root:       {}", cfg.layout.root.display());
    println!("  Uploads:    {}", cfg.layout.temp_dir.display());
    println!("  Converted:  {}", cfg.layout.converted_dir.display());
    println!("  Files:      {}", cfg.layout.files_dir.display());
    println!("  Database:   {}", cfg.layout.database.display());
    println!();
    println!("Classifier:");
    println!("  Prefix bytes:     {}", cfg.classifier.prefix_bytes);
    println!("  Binary threshold: {}", cfg.classifier.binary_threshold);

    Ok(())
}
