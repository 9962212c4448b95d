// GTF ingestion pipeline
//
// Stage 1: alias table + template -> raw extractor -> per-feature tables.
// Stage 2: load -> validate -> merge stop codons -> phases -> classes -> tables.
// Fatal errors abort before the table writer commits anything.

use super::alias::AliasTable;
use super::emitter::{build_tables, TableSet, TableWriter};
use super::equivalence::{EquivalenceBuilder, EquivalenceClasses, EquivalenceConfig};
use super::loader::load_annotation;
use super::models::{AnnotationSet, PhasedTranscripts};
use super::parser::{ExtractionStats, GtfExtractor, RawTable};
use super::phase::assign_phases;
use super::stop_codon::{merge_stop_codons, MergeStats};
use super::template::Template;
use super::validator::validate;
use crate::config::IngestConfig;
use crate::decompression::open_input;
use crate::error::{Result, Staged, Warning};
use annoload_common::checksum::{compute_file_checksum, ChecksumAlgorithm};
use indexmap::IndexMap;
use std::path::PathBuf;
use tracing::{info, instrument, warn};

/// Log a stage's warnings and keep them for the summary
fn absorb<T>(staged: Staged<T>, warnings: &mut Vec<Warning>) -> T {
    for warning in &staged.warnings {
        warn!("{}", warning);
    }
    staged.drain_into(warnings)
}

/// Everything stage 2 produces
#[derive(Debug, Clone)]
pub struct Transformed {
    pub annotation: AnnotationSet,
    pub phased: PhasedTranscripts,
    pub classes: EquivalenceClasses,
    pub merge: MergeStats,
    pub tables: TableSet,
}

/// Run stage 2 over in-memory raw tables
///
/// `namespace` is recorded on genes and transcripts; `equivalence` controls
/// grouping and naming of coding sequences.
pub fn transform(
    tables: &IndexMap<String, RawTable>,
    equivalence: &EquivalenceConfig,
) -> Result<Staged<Transformed>> {
    let mut warnings = Vec::new();

    let mut annotation = load_annotation(tables, &equivalence.namespace)?;
    validate(&annotation)?;

    let merge = absorb(merge_stop_codons(&mut annotation), &mut warnings);
    let phased = assign_phases(&annotation)?;

    let builder = EquivalenceBuilder::new(equivalence.clone());
    let classes = absorb(
        builder.build(&mut annotation.transcripts, &phased),
        &mut warnings,
    );

    let tables = absorb(build_tables(&annotation, &phased, &classes), &mut warnings);

    info!(
        genes = tables.genes.len(),
        transcripts = tables.transcripts.len(),
        exons = tables.exons.len(),
        coding_sequences = tables.cds.len(),
        "Transformed annotation"
    );

    Ok(Staged::with_warnings(
        Transformed {
            annotation,
            phased,
            classes,
            merge,
            tables,
        },
        warnings,
    ))
}

/// Outcome of a completed run
#[derive(Debug, Clone, Default)]
pub struct RunSummary {
    /// SHA-256 of the input file as stored on disk
    pub input_checksum: String,
    pub extraction: ExtractionStats,
    pub genes: usize,
    pub transcripts: usize,
    pub exons: usize,
    pub fragments: usize,
    pub stop_codons: MergeStats,
    pub coding_sequences: usize,
    pub discarded_transcripts: usize,
    pub tables: Vec<PathBuf>,
    pub warnings: Vec<Warning>,
}

impl RunSummary {
    fn record_transform(&mut self, transformed: &Transformed) {
        self.genes = transformed.tables.genes.len();
        self.transcripts = transformed.tables.transcripts.len();
        self.exons = transformed.tables.exons.len();
        self.fragments = transformed.phased.values().map(Vec::len).sum();
        self.stop_codons = transformed.merge;
        self.coding_sequences = transformed.classes.classes.len();
        self.discarded_transcripts = transformed.classes.discarded.len();
    }

    fn log(&self) {
        info!(
            lines = self.extraction.lines_read,
            kept = self.extraction.total_kept(),
            skipped_chromosome = self.extraction.skipped_chromosome,
            genes = self.genes,
            transcripts = self.transcripts,
            exons = self.exons,
            fragments = self.fragments,
            stop_codons_merged = self.stop_codons.extended,
            stop_codons_inserted = self.stop_codons.inserted,
            coding_sequences = self.coding_sequences,
            discarded = self.discarded_transcripts,
            tables = self.tables.len(),
            warnings = self.warnings.len(),
            "Ingestion complete"
        );
    }
}

pub struct GtfPipeline {
    config: IngestConfig,
}

impl GtfPipeline {
    pub fn new(config: IngestConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &IngestConfig {
        &self.config
    }

    fn template(&self) -> Result<Template> {
        match &self.config.template {
            Some(path) => Template::from_path(path),
            None => Template::ensembl(),
        }
    }

    fn equivalence_config(&self) -> EquivalenceConfig {
        EquivalenceConfig {
            namespace: self.config.namespace.clone(),
            id_prefix: self.config.cds_id_prefix.clone(),
            require_consensus: self.config.require_consensus,
        }
    }

    /// Run the pipeline end to end and commit the output tables
    #[instrument(skip(self), fields(input = %self.config.input.display()))]
    pub fn run(&self) -> Result<RunSummary> {
        self.config.validate()?;

        let aliases = AliasTable::from_path(&self.config.alias_table)?;
        let template = self.template()?;
        info!(
            aliases = aliases.len(),
            feature_types = ?template.feature_types().collect::<Vec<_>>(),
            "Loaded configuration"
        );

        let mut summary = RunSummary {
            input_checksum: compute_file_checksum(&self.config.input, ChecksumAlgorithm::Sha256)?,
            ..RunSummary::default()
        };
        info!(sha256 = %summary.input_checksum, "Reading input");

        let mut extractor = GtfExtractor::new(&template, &aliases);
        if let Some(limit) = self.config.parse_limit {
            extractor = extractor.with_parse_limit(limit);
        }
        let extraction = extractor.extract(open_input(&self.config.input)?)?;
        summary.extraction = extraction.stats;

        let writer = TableWriter::new(&self.config.output_dir);

        if !self.config.transform {
            summary.tables = writer.write_raw_tables(&extraction.tables)?;
            summary.log();
            return Ok(summary);
        }

        let transformed = transform(&extraction.tables, &self.equivalence_config())?
            .drain_into(&mut summary.warnings);
        summary.record_transform(&transformed);
        summary.tables = writer.write_tables(&transformed.tables)?;

        summary.log();
        Ok(summary)
    }
}
