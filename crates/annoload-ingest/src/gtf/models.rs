// Data models for annotation records
//
// All coordinates are 0-based half-open after normalization.

use crate::error::{IngestError, Result};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Key for per-transcript ordinal records (exons, CDS fragments, stop codons)
pub type OrdinalKey = (String, u32);

/// Genomic strand
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Strand {
    Forward,
    Reverse,
}

impl Strand {
    /// Parse a GTF strand symbol
    pub fn from_symbol(symbol: &str) -> Result<Self> {
        match symbol {
            "+" => Ok(Strand::Forward),
            "-" => Ok(Strand::Reverse),
            other => Err(IngestError::InvalidStrand(other.to_string())),
        }
    }

    /// Parse the signed form used in tables ("1" / "-1")
    pub fn from_signed(value: &str) -> Option<Self> {
        match value {
            "1" => Some(Strand::Forward),
            "-1" => Some(Strand::Reverse),
            _ => None,
        }
    }

    pub fn as_i8(self) -> i8 {
        match self {
            Strand::Forward => 1,
            Strand::Reverse => -1,
        }
    }

    pub fn symbol(self) -> char {
        match self {
            Strand::Forward => '+',
            Strand::Reverse => '-',
        }
    }
}

impl fmt::Display for Strand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_i8())
    }
}

/// A normalized genomic interval
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Location {
    pub chromosome: String,
    pub start: i64,
    pub end: i64,
    pub strand: Strand,
}

impl Location {
    pub fn new(chromosome: impl Into<String>, start: i64, end: i64, strand: Strand) -> Self {
        Self {
            chromosome: chromosome.into(),
            start,
            end,
            strand,
        }
    }

    pub fn len(&self) -> i64 {
        self.end - self.start
    }

    pub fn is_empty(&self) -> bool {
        self.end <= self.start
    }

    /// Whether `other` lies on the same chromosome and strand, within this interval
    pub fn contains(&self, other: &Location) -> bool {
        self.chromosome == other.chromosome
            && self.strand == other.strand
            && self.start <= other.start
            && other.end <= self.end
    }

    /// Boundary at the 5' end in the direction of transcription
    pub fn five_prime(&self) -> i64 {
        match self.strand {
            Strand::Forward => self.start,
            Strand::Reverse => self.end,
        }
    }

    /// Boundary at the 3' end in the direction of transcription
    pub fn three_prime(&self) -> i64 {
        match self.strand {
            Strand::Forward => self.end,
            Strand::Reverse => self.start,
        }
    }
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}:{}-{}({})",
            self.chromosome,
            self.start,
            self.end,
            self.strand.symbol()
        )
    }
}

/// A GTF line after coordinate normalization and attribute parsing
///
/// Exists only while the template is being applied.
#[derive(Debug, Clone)]
pub struct FeatureRecord {
    pub feature_type: String,
    pub source: Option<String>,
    pub location: Location,
    pub score: Option<String>,
    pub frame: Option<u8>,
    pub attributes: IndexMap<String, String>,
}

impl FeatureRecord {
    /// Value of one of the positional GTF fields, by its conventional name
    pub fn field(&self, name: &str) -> Option<String> {
        match name {
            "seqname" => Some(self.location.chromosome.clone()),
            "source" => self.source.clone(),
            "feature" => Some(self.feature_type.clone()),
            "start" => Some(self.location.start.to_string()),
            "end" => Some(self.location.end.to_string()),
            "score" => self.score.clone(),
            "strand" => Some(self.location.strand.to_string()),
            "frame" => self.frame.map(|f| f.to_string()),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Gene {
    pub accession: String,
    pub name: Option<String>,
    pub namespace: String,
    pub biotype: Option<String>,
    pub location: Location,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transcript {
    pub accession: String,
    pub gene_accession: String,
    pub consensus_accession: Option<String>,
    pub name: Option<String>,
    pub namespace: String,
    pub biotype: Option<String>,
    pub support_level: Option<String>,
    pub location: Location,
    /// Filled in by the equivalence-class builder
    pub cds_accession: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Exon {
    pub transcript_accession: String,
    pub ordinal: u32,
    pub accession: Option<String>,
    pub location: Location,
}

/// The coding portion of one exon
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CodingFragment {
    pub transcript_accession: String,
    pub ordinal: u32,
    pub protein_accession: Option<String>,
    pub location: Location,
    pub frame: Option<u8>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StopCodon {
    pub transcript_accession: String,
    pub ordinal: u32,
    pub location: Location,
    pub frame: Option<u8>,
}

/// A coding fragment with its position in the coding sequence and its phases
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PhasedFragment {
    pub transcript_accession: String,
    pub ordinal: u32,
    pub protein_accession: Option<String>,
    pub location: Location,
    pub frame: u8,
    /// 1-based rank of the fragment in the 5'->3' direction
    pub cds_order: u32,
    pub phase_start: u8,
    pub phase_end: u8,
}

/// Phased fragments per transcript, fragments sorted by `cds_order`
pub type PhasedTranscripts = IndexMap<String, Vec<PhasedFragment>>;

/// One element of a coding sequence's shape
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ShapeMember {
    pub chromosome: String,
    pub start: i64,
    pub end: i64,
    pub strand: Strand,
    pub phase_start: u8,
    pub phase_end: u8,
    pub cds_order: u32,
}

impl From<&PhasedFragment> for ShapeMember {
    fn from(fragment: &PhasedFragment) -> Self {
        Self {
            chromosome: fragment.location.chromosome.clone(),
            start: fragment.location.start,
            end: fragment.location.end,
            strand: fragment.location.strand,
            phase_start: fragment.phase_start,
            phase_end: fragment.phase_end,
            cds_order: fragment.cds_order,
        }
    }
}

/// How a coding sequence's accession was obtained
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CdsStatus {
    /// Named after a consensus id (e.g. CCDS)
    Curated,
    /// Named after the members' protein id
    Annotated,
    /// Generated id
    Derived,
}

impl CdsStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            CdsStatus::Curated => "curated",
            CdsStatus::Annotated => "annotated",
            CdsStatus::Derived => "derived",
        }
    }
}

/// A distinct coding sequence shared by one or more transcripts
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CodingSequence {
    pub accession: String,
    pub name: String,
    pub namespace: String,
    pub is_consensus: bool,
    pub status: CdsStatus,
    pub gene_accession: String,
    pub hash: String,
    pub location: Location,
    pub shape: Vec<ShapeMember>,
    /// Transcript accessions in observation order
    pub members: Vec<String>,
}

/// All typed annotation entities, keyed the way they are referenced
#[derive(Debug, Clone, Default)]
pub struct AnnotationSet {
    pub genes: IndexMap<String, Gene>,
    pub transcripts: IndexMap<String, Transcript>,
    pub exons: IndexMap<OrdinalKey, Exon>,
    pub fragments: IndexMap<OrdinalKey, CodingFragment>,
    pub stop_codons: IndexMap<OrdinalKey, StopCodon>,
}

impl AnnotationSet {
    pub fn new() -> Self {
        Self::default()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn test_strand_parsing() {
        assert_eq!(Strand::from_symbol("+").unwrap(), Strand::Forward);
        assert_eq!(Strand::from_symbol("-").unwrap(), Strand::Reverse);
        assert!(Strand::from_symbol(".").is_err());
        assert_eq!(Strand::from_signed("-1"), Some(Strand::Reverse));
        assert_eq!(Strand::from_signed("0"), None);
        assert_eq!(Strand::Reverse.to_string(), "-1");
    }

    #[test]
    fn test_location_containment() {
        let outer = Location::new("1", 100, 500, Strand::Forward);
        assert!(outer.contains(&Location::new("1", 100, 500, Strand::Forward)));
        assert!(outer.contains(&Location::new("1", 200, 300, Strand::Forward)));
        assert!(!outer.contains(&Location::new("1", 99, 300, Strand::Forward)));
        assert!(!outer.contains(&Location::new("1", 200, 300, Strand::Reverse)));
        assert!(!outer.contains(&Location::new("2", 200, 300, Strand::Forward)));
    }

    #[test]
    fn test_oriented_boundaries() {
        let forward = Location::new("1", 10, 20, Strand::Forward);
        assert_eq!((forward.five_prime(), forward.three_prime()), (10, 20));

        let reverse = Location::new("1", 10, 20, Strand::Reverse);
        assert_eq!((reverse.five_prime(), reverse.three_prime()), (20, 10));
    }

    #[test]
    fn test_record_fields() {
        let record = FeatureRecord {
            feature_type: "CDS".to_string(),
            source: None,
            location: Location::new("X", 0, 9, Strand::Reverse),
            score: None,
            frame: Some(2),
            attributes: IndexMap::new(),
        };
        assert_eq!(record.field("seqname").as_deref(), Some("X"));
        assert_eq!(record.field("strand").as_deref(), Some("-1"));
        assert_eq!(record.field("frame").as_deref(), Some("2"));
        assert_eq!(record.field("source"), None);
        assert_eq!(record.field("attribute"), None);
    }
}
