// GTF genome annotation ingestion
//
// Turns an Ensembl-style GTF dump into de-duplicated gene, transcript, exon,
// cds and cdsregion tables ready for a relational loader.

pub mod alias;
pub mod coords;
pub mod emitter;
pub mod equivalence;
pub mod loader;
pub mod models;
pub mod parser;
pub mod phase;
pub mod pipeline;
pub mod stop_codon;
pub mod template;
pub mod validator;

pub use alias::AliasTable;
pub use emitter::{TableSet, TableWriter};
pub use equivalence::{EquivalenceBuilder, EquivalenceClasses, EquivalenceConfig};
pub use models::{
    AnnotationSet, CdsStatus, CodingFragment, CodingSequence, Exon, Gene, Location,
    PhasedFragment, ShapeMember, StopCodon, Strand, Transcript,
};
pub use parser::{GtfExtractor, RawExtraction, RawTable};
pub use pipeline::{transform, GtfPipeline, RunSummary, Transformed};
pub use template::Template;
