//! Annoload - GTF annotation ingestion tool

use annoload_common::logging::{init_logging, LogConfig, LogLevel};
use annoload_ingest::gtf::GtfPipeline;
use annoload_ingest::IngestConfig;
use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;
use tracing::info;

#[derive(Parser, Debug)]
#[command(name = "annoload")]
#[command(author, version, about = "Load GTF genome annotation into relational tables")]
struct Cli {
    /// GTF file, plain or gzip
    #[arg(short, long, env = "ANNOLOAD_INPUT")]
    input: Option<PathBuf>,

    /// Output directory
    #[arg(short, long, env = "ANNOLOAD_OUTPUT_DIR")]
    output: Option<PathBuf>,

    /// Chromosome alias CSV (source_name,chromosome_name)
    #[arg(short, long, env = "ANNOLOAD_ALIAS_TABLE")]
    alias_table: Option<PathBuf>,

    /// Template JSON (defaults to the built-in Ensembl template)
    #[arg(short, long, env = "ANNOLOAD_TEMPLATE")]
    template: Option<PathBuf>,

    /// Namespace for genes, transcripts and non-consensus coding sequences
    #[arg(short, long, env = "ANNOLOAD_NAMESPACE")]
    namespace: Option<String>,

    /// Only group transcripts that carry a consensus id
    #[arg(long, env = "ANNOLOAD_REQUIRE_CONSENSUS")]
    require_consensus: Option<bool>,

    /// Run the second stage; false writes only raw per-feature tables
    #[arg(long, env = "ANNOLOAD_TRANSFORM")]
    transform: Option<bool>,

    /// Prefix for generated coding sequence accessions
    #[arg(long, env = "ANNOLOAD_CDS_ID_PREFIX")]
    cds_id_prefix: Option<String>,

    /// Stop after this many records (for smoke runs)
    #[arg(long, env = "ANNOLOAD_PARSE_LIMIT")]
    parse_limit: Option<usize>,

    /// Verbose output
    #[arg(short, long)]
    verbose: bool,
}

impl Cli {
    fn into_config(self, mut config: IngestConfig) -> IngestConfig {
        if let Some(input) = self.input {
            config.input = input;
        }
        if let Some(output) = self.output {
            config.output_dir = output;
        }
        if let Some(alias_table) = self.alias_table {
            config.alias_table = alias_table;
        }
        if let Some(template) = self.template {
            config.template = Some(template);
        }
        if let Some(namespace) = self.namespace {
            config.namespace = namespace;
        }
        if let Some(require) = self.require_consensus {
            config.require_consensus = require;
        }
        if let Some(transform) = self.transform {
            config.transform = transform;
        }
        if let Some(prefix) = self.cds_id_prefix {
            config.cds_id_prefix = prefix;
        }
        if let Some(limit) = self.parse_limit {
            config.parse_limit = Some(limit);
        }
        config
    }
}

fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    let mut log_config = LogConfig::from_env().context("Invalid logging configuration")?;
    if cli.verbose {
        log_config.level = LogLevel::Debug;
    }
    let _guard = init_logging(&log_config)?;

    let config = cli.into_config(IngestConfig::from_env()?);
    config.validate().context("Invalid configuration")?;

    info!(
        input = %config.input.display(),
        output = %config.output_dir.display(),
        "Starting ingestion"
    );
    let summary = GtfPipeline::new(config)
        .run()
        .context("Ingestion failed")?;

    info!(
        tables = summary.tables.len(),
        warnings = summary.warnings.len(),
        "Done"
    );
    Ok(())
}
