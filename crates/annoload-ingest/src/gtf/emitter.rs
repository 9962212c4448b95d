// Table emission
//
// Builds the five relational tables from the processed annotation and writes
// them as CSV. Every table is written into a staging directory inside the
// output directory first and only moved into place once all of them exist,
// so a failed run never leaves a partial table set behind.

use super::equivalence::EquivalenceClasses;
use super::models::{AnnotationSet, Exon, PhasedFragment, PhasedTranscripts};
use super::parser::RawTable;
use crate::error::{Result, Staged, Warning};
use indexmap::IndexMap;
use serde::Serialize;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Phase of a non-coding boundary
pub const NON_CODING_PHASE: i8 = -1;

/// A row type with a fixed file name and header
pub trait TableRow: Serialize {
    const FILE_NAME: &'static str;
    const COLUMNS: &'static [&'static str];
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GeneRow {
    pub accession: String,
    pub name: Option<String>,
    pub namespace: String,
    pub biotype: Option<String>,
    pub chromosome: String,
    pub start: i64,
    pub end: i64,
    pub strand: i8,
}

impl TableRow for GeneRow {
    const FILE_NAME: &'static str = "db.gene.csv";
    const COLUMNS: &'static [&'static str] = &[
        "accession",
        "name",
        "namespace",
        "biotype",
        "chromosome",
        "start",
        "end",
        "strand",
    ];
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TranscriptRow {
    pub accession: String,
    pub gene_accession: String,
    pub consensus_accession: Option<String>,
    pub name: Option<String>,
    pub namespace: String,
    pub biotype: Option<String>,
    pub chromosome: String,
    pub start: i64,
    pub end: i64,
    pub strand: i8,
    pub support_level: Option<String>,
    pub cds_accession: Option<String>,
}

impl TableRow for TranscriptRow {
    const FILE_NAME: &'static str = "db.transcript.csv";
    const COLUMNS: &'static [&'static str] = &[
        "accession",
        "gene_accession",
        "consensus_accession",
        "name",
        "namespace",
        "biotype",
        "chromosome",
        "start",
        "end",
        "strand",
        "support_level",
        "cds_accession",
    ];
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ExonRow {
    pub transcript_accession: String,
    pub transcript_order: u32,
    pub phase_start: i8,
    pub phase_end: i8,
    pub chromosome: String,
    pub start: i64,
    pub end: i64,
    pub strand: i8,
    pub coding_start: Option<i64>,
    pub coding_end: Option<i64>,
    pub phase_override_flag: bool,
}

impl TableRow for ExonRow {
    const FILE_NAME: &'static str = "db.exon.csv";
    const COLUMNS: &'static [&'static str] = &[
        "transcript_accession",
        "transcript_order",
        "phase_start",
        "phase_end",
        "chromosome",
        "start",
        "end",
        "strand",
        "coding_start",
        "coding_end",
        "phase_override_flag",
    ];
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CdsRow {
    pub accession: String,
    pub name: String,
    pub namespace: String,
    pub gene_accession: String,
    pub is_consensus: bool,
    pub status: &'static str,
    pub chromosome: String,
    pub start: i64,
    pub end: i64,
    pub strand: i8,
}

impl TableRow for CdsRow {
    const FILE_NAME: &'static str = "db.cds.csv";
    const COLUMNS: &'static [&'static str] = &[
        "accession",
        "name",
        "namespace",
        "gene_accession",
        "is_consensus",
        "status",
        "chromosome",
        "start",
        "end",
        "strand",
    ];
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CdsRegionRow {
    pub cds_accession: String,
    pub cds_order: u32,
    pub phase_start: u8,
    pub phase_end: u8,
    pub chromosome: String,
    pub start: i64,
    pub end: i64,
    pub strand: i8,
}

impl TableRow for CdsRegionRow {
    const FILE_NAME: &'static str = "db.cdsregion.csv";
    const COLUMNS: &'static [&'static str] = &[
        "cds_accession",
        "cds_order",
        "phase_start",
        "phase_end",
        "chromosome",
        "start",
        "end",
        "strand",
    ];
}

/// The final relational tables
#[derive(Debug, Clone, Default)]
pub struct TableSet {
    pub genes: Vec<GeneRow>,
    pub transcripts: Vec<TranscriptRow>,
    pub exons: Vec<ExonRow>,
    pub cds: Vec<CdsRow>,
    pub cds_regions: Vec<CdsRegionRow>,
}

/// Exon phases against the exon's own coding fragment
///
/// Returns `(phase_start, phase_end, override)`.
pub fn exon_phases(exon: &Exon, fragment: Option<&PhasedFragment>, terminal: bool) -> (i8, i8, bool) {
    let Some(fragment) = fragment else {
        return (NON_CODING_PHASE, NON_CODING_PHASE, false);
    };

    let five_prime = exon.location.five_prime() == fragment.location.five_prime();
    let three_prime = exon.location.three_prime() == fragment.location.three_prime();

    let phase_start = if five_prime {
        fragment.phase_start as i8
    } else {
        NON_CODING_PHASE
    };
    let phase_end = if three_prime {
        fragment.phase_end as i8
    } else {
        NON_CODING_PHASE
    };

    // the 3' UTR side of the last coding exon is authoritative at -1
    let force_terminal = terminal && !three_prime;
    (phase_start, phase_end, five_prime || three_prime || force_terminal)
}

/// Assemble all output rows
///
/// Exons with inverted coordinates are dropped with a warning.
pub fn build_tables(
    set: &AnnotationSet,
    phased: &PhasedTranscripts,
    classes: &EquivalenceClasses,
) -> Staged<TableSet> {
    let mut warnings = Vec::new();
    let mut tables = TableSet::default();

    tables.genes = set
        .genes
        .values()
        .map(|gene| GeneRow {
            accession: gene.accession.clone(),
            name: gene.name.clone(),
            namespace: gene.namespace.clone(),
            biotype: gene.biotype.clone(),
            chromosome: gene.location.chromosome.clone(),
            start: gene.location.start,
            end: gene.location.end,
            strand: gene.location.strand.as_i8(),
        })
        .collect();

    tables.transcripts = set
        .transcripts
        .values()
        .map(|t| TranscriptRow {
            accession: t.accession.clone(),
            gene_accession: t.gene_accession.clone(),
            consensus_accession: t.consensus_accession.clone(),
            name: t.name.clone(),
            namespace: t.namespace.clone(),
            biotype: t.biotype.clone(),
            chromosome: t.location.chromosome.clone(),
            start: t.location.start,
            end: t.location.end,
            strand: t.location.strand.as_i8(),
            support_level: t.support_level.clone(),
            cds_accession: t.cds_accession.clone(),
        })
        .collect();

    let mut fragments: HashMap<(&str, u32), &PhasedFragment> = HashMap::new();
    let mut terminal: HashMap<&str, u32> = HashMap::new();
    for (accession, list) in phased {
        for fragment in list {
            fragments.insert((accession.as_str(), fragment.ordinal), fragment);
        }
        if let Some(last) = list.last() {
            terminal.insert(accession.as_str(), last.cds_order);
        }
    }

    for exon in set.exons.values() {
        if exon.location.start > exon.location.end {
            warnings.push(Warning::InvertedExon {
                transcript: exon.transcript_accession.clone(),
                ordinal: exon.ordinal,
                start: exon.location.start,
                end: exon.location.end,
            });
            continue;
        }

        let fragment = fragments
            .get(&(exon.transcript_accession.as_str(), exon.ordinal))
            .copied();
        let is_terminal = fragment.is_some_and(|f| {
            terminal.get(exon.transcript_accession.as_str()) == Some(&f.cds_order)
        });
        let (phase_start, phase_end, phase_override_flag) =
            exon_phases(exon, fragment, is_terminal);

        tables.exons.push(ExonRow {
            transcript_accession: exon.transcript_accession.clone(),
            transcript_order: exon.ordinal,
            phase_start,
            phase_end,
            chromosome: exon.location.chromosome.clone(),
            start: exon.location.start,
            end: exon.location.end,
            strand: exon.location.strand.as_i8(),
            coding_start: fragment.map(|f| f.location.start),
            coding_end: fragment.map(|f| f.location.end),
            phase_override_flag,
        });
    }

    for class in &classes.classes {
        tables.cds.push(CdsRow {
            accession: class.accession.clone(),
            name: class.name.clone(),
            namespace: class.namespace.clone(),
            gene_accession: class.gene_accession.clone(),
            is_consensus: class.is_consensus,
            status: class.status.as_str(),
            chromosome: class.location.chromosome.clone(),
            start: class.location.start,
            end: class.location.end,
            strand: class.location.strand.as_i8(),
        });

        tables
            .cds_regions
            .extend(class.shape.iter().map(|member| CdsRegionRow {
                cds_accession: class.accession.clone(),
                cds_order: member.cds_order,
                phase_start: member.phase_start,
                phase_end: member.phase_end,
                chromosome: member.chromosome.clone(),
                start: member.start,
                end: member.end,
                strand: member.strand.as_i8(),
            }));
    }

    Staged::with_warnings(tables, warnings)
}

fn write_rows<T: TableRow>(dir: &Path, rows: &[T]) -> Result<String> {
    let mut writer = csv::WriterBuilder::new()
        .has_headers(false)
        .from_path(dir.join(T::FILE_NAME))?;
    writer.write_record(T::COLUMNS)?;
    for row in rows {
        writer.serialize(row)?;
    }
    writer.flush()?;
    debug!(file = T::FILE_NAME, rows = rows.len(), "Staged table");
    Ok(T::FILE_NAME.to_string())
}

fn write_raw(dir: &Path, table: &RawTable) -> Result<String> {
    let file_name = format!("raw.{}.csv", table.feature_type());
    let mut writer = csv::WriterBuilder::new()
        .has_headers(false)
        .from_path(dir.join(&file_name))?;
    writer.write_record(table.columns())?;
    for row in table.rows() {
        writer.write_record(row)?;
    }
    writer.flush()?;
    debug!(file = %file_name, rows = table.len(), "Staged table");
    Ok(file_name)
}

/// Move one staged file into place, parking any previous file in `previous`
fn commit_file(staging: &Path, previous: &Path, target: &Path, file: &str) -> std::io::Result<Option<PathBuf>> {
    let backup = if target.exists() {
        let backup = previous.join(file);
        std::fs::rename(target, &backup)?;
        Some(backup)
    } else {
        None
    };

    if let Err(e) = std::fs::rename(staging.join(file), target) {
        if let Some(backup) = &backup {
            let _ = std::fs::rename(backup, target);
        }
        return Err(e);
    }
    Ok(backup)
}

/// Move staged files into the output directory
///
/// If any move fails, the files already moved are removed and the previous
/// versions restored before the error is returned.
fn commit(staging: &Path, output_dir: &Path, files: &[String]) -> Result<Vec<PathBuf>> {
    let previous = staging.join(".previous");
    std::fs::create_dir(&previous)?;

    let mut moved: Vec<(PathBuf, Option<PathBuf>)> = Vec::with_capacity(files.len());
    for file in files {
        let target = output_dir.join(file);
        match commit_file(staging, &previous, &target, file) {
            Ok(backup) => moved.push((target, backup)),
            Err(e) => {
                roll_back(&moved);
                return Err(e.into());
            },
        }
    }

    Ok(moved.into_iter().map(|(target, _)| target).collect())
}

fn roll_back(moved: &[(PathBuf, Option<PathBuf>)]) {
    for (target, backup) in moved.iter().rev() {
        let restored = std::fs::remove_file(target).and_then(|()| match backup {
            Some(backup) => std::fs::rename(backup, target),
            None => Ok(()),
        });
        if let Err(e) = restored {
            warn!(file = %target.display(), error = %e, "Failed to roll back table");
        }
    }
}

/// Writes table sets into an output directory, all or nothing
#[derive(Debug, Clone)]
pub struct TableWriter {
    output_dir: PathBuf,
}

impl TableWriter {
    pub fn new(output_dir: impl Into<PathBuf>) -> Self {
        Self {
            output_dir: output_dir.into(),
        }
    }

    /// Write the five final tables
    pub fn write_tables(&self, tables: &TableSet) -> Result<Vec<PathBuf>> {
        self.staged(|dir| {
            Ok(vec![
                write_rows(dir, &tables.genes)?,
                write_rows(dir, &tables.transcripts)?,
                write_rows(dir, &tables.exons)?,
                write_rows(dir, &tables.cds)?,
                write_rows(dir, &tables.cds_regions)?,
            ])
        })
    }

    /// Write stage-1 tables as `raw.<feature_type>.csv`
    pub fn write_raw_tables(&self, tables: &IndexMap<String, RawTable>) -> Result<Vec<PathBuf>> {
        self.staged(|dir| tables.values().map(|table| write_raw(dir, table)).collect())
    }

    fn staged<F>(&self, write: F) -> Result<Vec<PathBuf>>
    where
        F: FnOnce(&Path) -> Result<Vec<String>>,
    {
        std::fs::create_dir_all(&self.output_dir)?;
        let staging = tempfile::Builder::new()
            .prefix(".annoload-staging-")
            .tempdir_in(&self.output_dir)?;

        // Nothing is moved until every table has been written
        let files = write(staging.path())?;
        let committed = commit(staging.path(), &self.output_dir, &files)?;

        info!(
            output_dir = %self.output_dir.display(),
            tables = committed.len(),
            "Wrote tables"
        );
        Ok(committed)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::gtf::models::{Location, Strand};

    fn exon(start: i64, end: i64, strand: Strand) -> Exon {
        Exon {
            transcript_accession: "T1".to_string(),
            ordinal: 1,
            accession: None,
            location: Location::new("1", start, end, strand),
        }
    }

    fn fragment(start: i64, end: i64, strand: Strand, phases: (u8, u8)) -> PhasedFragment {
        PhasedFragment {
            transcript_accession: "T1".to_string(),
            ordinal: 1,
            protein_accession: None,
            location: Location::new("1", start, end, strand),
            frame: 0,
            cds_order: 1,
            phase_start: phases.0,
            phase_end: phases.1,
        }
    }

    #[test]
    fn test_non_coding_exon() {
        assert_eq!(exon_phases(&exon(0, 100, Strand::Forward), None, false), (-1, -1, false));
    }

    #[test]
    fn test_internal_coding_exon() {
        let f = fragment(0, 100, Strand::Forward, (2, 0));
        assert_eq!(exon_phases(&exon(0, 100, Strand::Forward), Some(&f), false), (2, 0, true));
    }

    #[test]
    fn test_first_coding_exon_with_utr() {
        // coding starts inside the exon, 5' end is UTR
        let f = fragment(40, 100, Strand::Forward, (0, 0));
        assert_eq!(exon_phases(&exon(0, 100, Strand::Forward), Some(&f), false), (-1, 0, true));
    }

    #[test]
    fn test_terminal_exon_forces_utr_end() {
        let f = fragment(0, 60, Strand::Forward, (1, 1));
        assert_eq!(exon_phases(&exon(0, 100, Strand::Forward), Some(&f), true), (1, -1, true));
        assert_eq!(exon_phases(&exon(0, 100, Strand::Forward), Some(&f), false), (1, -1, true));
    }

    #[test]
    fn test_reverse_strand_uses_end_as_five_prime() {
        // fragment shares the exon's end, which is its 5' boundary on -1
        let f = fragment(30, 100, Strand::Reverse, (0, 1));
        assert_eq!(exon_phases(&exon(0, 100, Strand::Reverse), Some(&f), false), (0, -1, true));
    }

    #[test]
    fn test_coding_exon_inside_both_utrs() {
        let f = fragment(10, 90, Strand::Forward, (0, 2));
        assert_eq!(exon_phases(&exon(0, 100, Strand::Forward), Some(&f), false), (-1, -1, false));
        assert_eq!(exon_phases(&exon(0, 100, Strand::Forward), Some(&f), true), (-1, -1, true));
    }

    #[test]
    fn test_inverted_exon_dropped() {
        let mut set = AnnotationSet::new();
        set.exons.insert(("T1".to_string(), 1), exon(100, 50, Strand::Forward));
        set.exons.insert(("T1".to_string(), 2), {
            let mut e = exon(200, 300, Strand::Forward);
            e.ordinal = 2;
            e
        });

        let staged = build_tables(&set, &PhasedTranscripts::new(), &EquivalenceClasses::default());
        assert_eq!(staged.value.exons.len(), 1);
        assert_eq!(staged.value.exons[0].transcript_order, 2);
        assert!(matches!(staged.warnings[0], Warning::InvertedExon { ordinal: 1, .. }));
    }

    #[test]
    fn test_write_tables_with_headers() {
        let dir = tempfile::tempdir().unwrap();
        let writer = TableWriter::new(dir.path().join("out"));
        let tables = TableSet {
            genes: vec![GeneRow {
                accession: "G1".to_string(),
                name: None,
                namespace: "ensembl".to_string(),
                biotype: Some("protein_coding".to_string()),
                chromosome: "1".to_string(),
                start: 0,
                end: 10,
                strand: -1,
            }],
            ..TableSet::default()
        };

        let written = writer.write_tables(&tables).unwrap();
        assert_eq!(written.len(), 5);

        let genes = std::fs::read_to_string(dir.path().join("out/db.gene.csv")).unwrap();
        assert_eq!(
            genes,
            "accession,name,namespace,biotype,chromosome,start,end,strand\n\
             G1,,ensembl,protein_coding,1,0,10,-1\n"
        );

        let cds = std::fs::read_to_string(dir.path().join("out/db.cds.csv")).unwrap();
        assert_eq!(cds.lines().count(), 1);

        // staging directory is gone
        let entries: Vec<_> = std::fs::read_dir(dir.path().join("out"))
            .unwrap()
            .map(|e| e.unwrap().file_name().into_string().unwrap())
            .collect();
        assert!(entries.iter().all(|name| name.starts_with("db.")));
    }

    #[test]
    fn test_commit_rolls_back_on_failure() {
        let staging = tempfile::tempdir().unwrap();
        let output = tempfile::tempdir().unwrap();
        std::fs::write(staging.path().join("db.gene.csv"), "new\n").unwrap();
        std::fs::write(staging.path().join("db.exon.csv"), "new\n").unwrap();
        std::fs::write(output.path().join("db.gene.csv"), "old\n").unwrap();

        let files = vec![
            "db.gene.csv".to_string(),
            "db.exon.csv".to_string(),
            "db.cds.csv".to_string(),
        ];
        assert!(commit(staging.path(), output.path(), &files).is_err());

        // the earlier table is restored and the new one removed
        assert_eq!(
            std::fs::read_to_string(output.path().join("db.gene.csv")).unwrap(),
            "old\n"
        );
        assert!(!output.path().join("db.exon.csv").exists());
    }

    #[test]
    fn test_rewrite_replaces_previous_tables() {
        let dir = tempfile::tempdir().unwrap();
        let writer = TableWriter::new(dir.path());
        writer.write_tables(&TableSet::default()).unwrap();
        std::fs::write(dir.path().join("db.gene.csv"), "stale\n").unwrap();

        writer.write_tables(&TableSet::default()).unwrap();
        let genes = std::fs::read_to_string(dir.path().join("db.gene.csv")).unwrap();
        assert!(genes.starts_with("accession,"));
    }

    #[test]
    fn test_write_raw_tables() {
        let dir = tempfile::tempdir().unwrap();
        let mut table = RawTable::new("gene", vec!["accession".to_string(), "name".to_string()]);
        table.push(vec!["G1".to_string(), String::new()]);
        let mut tables = IndexMap::new();
        tables.insert("gene".to_string(), table);

        let written = TableWriter::new(dir.path()).write_raw_tables(&tables).unwrap();
        assert_eq!(written, vec![dir.path().join("raw.gene.csv")]);
        assert_eq!(
            std::fs::read_to_string(&written[0]).unwrap(),
            "accession,name\nG1,\n"
        );
    }
}
