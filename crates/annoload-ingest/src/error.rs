//! Error and warning types for the ingestion pipeline
//!
//! Two tiers: an [`IngestError`] aborts the whole run before any table is
//! committed, a [`Warning`] is recorded and the run continues. Stages that can
//! produce warnings return `Result<Staged<T>>`.

use thiserror::Error;

/// Result type alias for ingestion operations
pub type Result<T> = std::result::Result<T, IngestError>;

/// Fatal ingestion errors
#[derive(Error, Debug)]
pub enum IngestError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("Failed to parse JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Common(#[from] annoload_common::CommonError),

    #[error("invalid UTF-8: {0}")]
    Encoding(#[from] std::str::Utf8Error),

    #[error("Template error: {0}")]
    Template(String),

    #[error("Alias table error: {0}")]
    AliasTable(String),

    /// A source line failed; wraps the underlying cause
    #[error("line {line}: {source} (line: {content:?})")]
    Line {
        line: usize,
        content: String,
        #[source]
        source: Box<IngestError>,
    },

    #[error("expected 9 tab-separated columns, found {0}")]
    ColumnCount(usize),

    #[error("unparseable attributes: {0}")]
    AttributeSyntax(String),

    #[error("invalid {column} value '{value}'")]
    InvalidNumber { column: &'static str, value: String },

    #[error("unknown chromosome alias '{0}'")]
    UnknownChromosome(String),

    #[error("invalid strand '{0}', expected '+' or '-'")]
    InvalidStrand(String),

    #[error("invalid coordinates start={start} end={end}")]
    InvalidCoordinates { start: i64, end: i64 },

    #[error("invalid frame '{0}', expected 0, 1, 2 or '.'")]
    InvalidFrame(String),

    #[error("duplicate {feature_type} key ({key})")]
    DuplicateKey { feature_type: String, key: String },

    #[error("{table} {record}: missing value for '{column}'")]
    MissingField {
        table: String,
        record: String,
        column: String,
    },

    #[error("{table} {record}: invalid {column} '{value}'")]
    InvalidField {
        table: String,
        record: String,
        column: String,
        value: String,
    },

    #[error("{child} references unknown {parent_kind} '{parent}'")]
    UnknownReference {
        child: String,
        parent_kind: &'static str,
        parent: String,
    },

    #[error("gene '{0}' is not referenced by any transcript")]
    OrphanGene(String),

    #[error("{inner} is not contained in {outer}")]
    Containment { outer: String, inner: String },

    #[error("exon '{accession}' has different coordinates in {first} and {second}")]
    ExonMismatch {
        accession: String,
        first: String,
        second: String,
    },

    #[error("coding fragments {first} and {second} of transcript '{transcript}' overlap or share a start")]
    FragmentOrder {
        transcript: String,
        first: String,
        second: String,
    },
}

impl IngestError {
    /// Attach the 1-based line number and text of the offending source line
    pub fn at_line(line: usize, content: &str, source: IngestError) -> Self {
        Self::Line {
            line,
            content: content.to_string(),
            source: Box::new(source),
        }
    }

    /// Create a template error
    pub fn template(msg: impl Into<String>) -> Self {
        Self::Template(msg.into())
    }

    /// Create an alias table error
    pub fn alias_table(msg: impl Into<String>) -> Self {
        Self::AliasTable(msg.into())
    }
}

/// Non-fatal anomalies, logged and carried through to the run summary
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Warning {
    #[error("stop codon {transcript}#{ordinal} has no coding fragment, inserted as a terminal fragment")]
    UnmatchedStopCodon { transcript: String, ordinal: u32 },

    #[error("exon {transcript}#{ordinal} has inverted coordinates [{start}, {end}), dropped")]
    InvertedExon {
        transcript: String,
        ordinal: u32,
        start: i64,
        end: i64,
    },

    #[error("consensus id '{consensus}' is carried by transcripts in {classes} coding sequences")]
    ConsensusSpansClasses { consensus: String, classes: usize },

    #[error("coding sequence members carry different consensus ids ({ids}), using '{chosen}'")]
    MixedConsensus { ids: String, chosen: String },

    #[error("coding sequence members disagree on protein id ({ids}), using a generated id")]
    ProteinIdDisagreement { ids: String },

    #[error("accession '{accession}' already names another coding sequence, falling back")]
    AccessionClaimed { accession: String },
}

/// A stage result that completed, possibly with warnings
#[derive(Debug, Clone)]
pub struct Staged<T> {
    pub value: T,
    pub warnings: Vec<Warning>,
}

impl<T> Staged<T> {
    /// A clean result
    pub fn new(value: T) -> Self {
        Self {
            value,
            warnings: Vec::new(),
        }
    }

    pub fn with_warnings(value: T, warnings: Vec<Warning>) -> Self {
        Self { value, warnings }
    }

    pub fn is_clean(&self) -> bool {
        self.warnings.is_empty()
    }

    /// Split into the value and its warnings, appending the warnings to `sink`
    pub fn drain_into(self, sink: &mut Vec<Warning>) -> T {
        sink.extend(self.warnings);
        self.value
    }
}
