//! Annoload Ingest Library
//!
//! Genome annotation ingestion: reads a GTF dump and emits relational tables
//! of genes, transcripts, exons and de-duplicated coding sequences.
//!
//! # Example
//!
//! ```no_run
//! use annoload_ingest::{config::IngestConfig, gtf::GtfPipeline};
//!
//! fn main() -> anyhow::Result<()> {
//!     let config = IngestConfig::new("Homo_sapiens.GRCh38.110.gtf.gz", "aliases.csv")
//!         .with_output_dir("./tables");
//!     let summary = GtfPipeline::new(config).run()?;
//!     println!("{} coding sequences", summary.coding_sequences);
//!     Ok(())
//! }
//! ```

#![deny(clippy::unwrap_used, clippy::expect_used)]

pub mod config;
pub mod decompression;
pub mod error;
pub mod gtf;

pub use config::IngestConfig;
pub use error::{IngestError, Result, Staged, Warning};
