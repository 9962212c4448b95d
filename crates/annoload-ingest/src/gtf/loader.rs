// Typed loading of raw tables
//
// Stage 2 reads the stage-1 tables back by canonical column name. Genes and
// transcripts are keyed by accession, exons, coding fragments and stop codons
// by (transcript accession, ordinal).

use super::models::{
    AnnotationSet, CodingFragment, Exon, Gene, Location, OrdinalKey, StopCodon, Strand,
    Transcript,
};
use super::parser::{RawRecord, RawTable};
use crate::error::{IngestError, Result};
use indexmap::map::Entry;
use indexmap::IndexMap;
use std::str::FromStr;
use tracing::debug;

pub const GENE_FEATURE: &str = "gene";
pub const TRANSCRIPT_FEATURE: &str = "transcript";
pub const EXON_FEATURE: &str = "exon";
pub const CDS_FEATURE: &str = "CDS";
pub const STOP_CODON_FEATURE: &str = "stop_codon";

/// Named access to one raw row with errors that identify the record
struct Row<'a> {
    record: RawRecord<'a>,
    label: String,
}

impl<'a> Row<'a> {
    fn new(record: RawRecord<'a>) -> Self {
        let label = format!("row {}", record.row_number());
        Self { record, label }
    }

    fn identify(&mut self, label: String) {
        self.label = label;
    }

    fn optional(&self, column: &str) -> Option<String> {
        self.record.get(column).map(str::to_string)
    }

    fn required(&self, column: &str) -> Result<&'a str> {
        self.record.get(column).ok_or_else(|| IngestError::MissingField {
            table: self.record.feature_type().to_string(),
            record: self.label.clone(),
            column: column.to_string(),
        })
    }

    fn invalid(&self, column: &str, value: &str) -> IngestError {
        IngestError::InvalidField {
            table: self.record.feature_type().to_string(),
            record: self.label.clone(),
            column: column.to_string(),
            value: value.to_string(),
        }
    }

    fn parse<T: FromStr>(&self, column: &str) -> Result<T> {
        let value = self.required(column)?;
        value.parse().map_err(|_| self.invalid(column, value))
    }

    fn frame(&self) -> Result<Option<u8>> {
        match self.record.get("frame") {
            None => Ok(None),
            Some(value) => match value.parse::<u8>() {
                Ok(frame) if frame < 3 => Ok(Some(frame)),
                _ => Err(self.invalid("frame", value)),
            },
        }
    }

    fn location(&self) -> Result<Location> {
        let chromosome = self.required("chromosome")?;
        let strand_value = self.required("strand")?;
        let strand =
            Strand::from_signed(strand_value).ok_or_else(|| self.invalid("strand", strand_value))?;
        Ok(Location::new(
            chromosome,
            self.parse("start")?,
            self.parse("end")?,
            strand,
        ))
    }

    fn ordinal_key(&mut self) -> Result<OrdinalKey> {
        let transcript = self.required("transcript_accession")?.to_string();
        let ordinal: u32 = self.parse("transcript_order")?;
        self.identify(format!("{}#{}", transcript, ordinal));
        Ok((transcript, ordinal))
    }
}

fn insert_unique<K, V>(
    map: &mut IndexMap<K, V>,
    key: K,
    value: V,
    feature_type: &str,
    describe: impl FnOnce(&K) -> String,
) -> Result<()>
where
    K: std::hash::Hash + Eq,
{
    match map.entry(key) {
        Entry::Occupied(entry) => Err(IngestError::DuplicateKey {
            feature_type: feature_type.to_string(),
            key: describe(entry.key()),
        }),
        Entry::Vacant(entry) => {
            entry.insert(value);
            Ok(())
        },
    }
}

fn describe_ordinal(key: &OrdinalKey) -> String {
    format!("{}, {}", key.0, key.1)
}

fn load_genes(table: &RawTable, namespace: &str) -> Result<IndexMap<String, Gene>> {
    let mut genes = IndexMap::new();
    for record in table.records() {
        let mut row = Row::new(record);
        let accession = row.required("accession")?.to_string();
        row.identify(accession.clone());

        let gene = Gene {
            accession: accession.clone(),
            name: row.optional("name"),
            namespace: namespace.to_string(),
            biotype: row.optional("biotype"),
            location: row.location()?,
        };
        insert_unique(&mut genes, accession, gene, GENE_FEATURE, String::clone)?;
    }
    Ok(genes)
}

fn load_transcripts(table: &RawTable, namespace: &str) -> Result<IndexMap<String, Transcript>> {
    let mut transcripts = IndexMap::new();
    for record in table.records() {
        let mut row = Row::new(record);
        let accession = row.required("accession")?.to_string();
        row.identify(accession.clone());

        let transcript = Transcript {
            accession: accession.clone(),
            gene_accession: row.required("gene_accession")?.to_string(),
            consensus_accession: row.optional("consensus_accession"),
            name: row.optional("name"),
            namespace: namespace.to_string(),
            biotype: row.optional("biotype"),
            support_level: row.optional("support_level"),
            location: row.location()?,
            cds_accession: None,
        };
        insert_unique(
            &mut transcripts,
            accession,
            transcript,
            TRANSCRIPT_FEATURE,
            String::clone,
        )?;
    }
    Ok(transcripts)
}

fn load_exons(table: &RawTable) -> Result<IndexMap<OrdinalKey, Exon>> {
    let mut exons = IndexMap::new();
    for record in table.records() {
        let mut row = Row::new(record);
        let key = row.ordinal_key()?;
        let exon = Exon {
            transcript_accession: key.0.clone(),
            ordinal: key.1,
            accession: row.optional("accession"),
            location: row.location()?,
        };
        insert_unique(&mut exons, key, exon, EXON_FEATURE, describe_ordinal)?;
    }
    Ok(exons)
}

fn load_fragments(table: &RawTable) -> Result<IndexMap<OrdinalKey, CodingFragment>> {
    let mut fragments = IndexMap::new();
    for record in table.records() {
        let mut row = Row::new(record);
        let key = row.ordinal_key()?;
        let fragment = CodingFragment {
            transcript_accession: key.0.clone(),
            ordinal: key.1,
            protein_accession: row.optional("protein_accession"),
            location: row.location()?,
            frame: row.frame()?,
        };
        insert_unique(&mut fragments, key, fragment, CDS_FEATURE, describe_ordinal)?;
    }
    Ok(fragments)
}

fn load_stop_codons(table: &RawTable) -> Result<IndexMap<OrdinalKey, StopCodon>> {
    let mut stop_codons = IndexMap::new();
    for record in table.records() {
        let mut row = Row::new(record);
        let key = row.ordinal_key()?;
        let stop_codon = StopCodon {
            transcript_accession: key.0.clone(),
            ordinal: key.1,
            location: row.location()?,
            frame: row.frame()?,
        };
        insert_unique(
            &mut stop_codons,
            key,
            stop_codon,
            STOP_CODON_FEATURE,
            describe_ordinal,
        )?;
    }
    Ok(stop_codons)
}

/// Build the typed annotation set from stage-1 tables
///
/// A feature type missing from `tables` loads as empty.
pub fn load_annotation(
    tables: &IndexMap<String, RawTable>,
    namespace: &str,
) -> Result<AnnotationSet> {
    let mut set = AnnotationSet::new();

    if let Some(table) = tables.get(GENE_FEATURE) {
        set.genes = load_genes(table, namespace)?;
    }
    if let Some(table) = tables.get(TRANSCRIPT_FEATURE) {
        set.transcripts = load_transcripts(table, namespace)?;
    }
    if let Some(table) = tables.get(EXON_FEATURE) {
        set.exons = load_exons(table)?;
    }
    if let Some(table) = tables.get(CDS_FEATURE) {
        set.fragments = load_fragments(table)?;
    }
    if let Some(table) = tables.get(STOP_CODON_FEATURE) {
        set.stop_codons = load_stop_codons(table)?;
    }

    debug!(
        genes = set.genes.len(),
        transcripts = set.transcripts.len(),
        exons = set.exons.len(),
        fragments = set.fragments.len(),
        stop_codons = set.stop_codons.len(),
        "Loaded annotation tables"
    );

    Ok(set)
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    fn table(feature_type: &str, columns: &[&str], rows: &[&[&str]]) -> RawTable {
        let mut table =
            RawTable::new(feature_type, columns.iter().map(|c| c.to_string()).collect());
        for row in rows {
            table.push(row.iter().map(|v| v.to_string()).collect());
        }
        table
    }

    fn tables(list: Vec<RawTable>) -> IndexMap<String, RawTable> {
        list.into_iter()
            .map(|t| (t.feature_type().to_string(), t))
            .collect()
    }

    const LOCATION: [&str; 4] = ["chromosome", "start", "end", "strand"];

    #[test]
    fn test_load_gene_and_fragment() {
        let gene_columns = [&["accession", "name", "biotype"][..], &LOCATION[..]].concat();
        let cds_columns = [
            &["transcript_accession", "transcript_order", "protein_accession"][..],
            &LOCATION[..],
            &["frame"][..],
        ]
        .concat();

        let set = load_annotation(
            &tables(vec![
                table("gene", &gene_columns, &[&["G1", "", "protein_coding", "1", "99", "999", "1"]]),
                table("CDS", &cds_columns, &[&["T1", "2", "P1", "1", "199", "499", "-1", "1"]]),
            ]),
            "ensembl",
        )
        .unwrap();

        let gene = &set.genes["G1"];
        assert_eq!(gene.name, None);
        assert_eq!(gene.namespace, "ensembl");
        assert_eq!(gene.location, Location::new("1", 99, 999, Strand::Forward));

        let fragment = &set.fragments[&("T1".to_string(), 2)];
        assert_eq!(fragment.frame, Some(1));
        assert_eq!(fragment.location.strand, Strand::Reverse);
        assert!(set.transcripts.is_empty());
    }

    #[test]
    fn test_missing_field_names_record() {
        let columns = [&["accession", "gene_accession"][..], &LOCATION[..]].concat();
        let err = load_annotation(
            &tables(vec![table("transcript", &columns, &[&["T1", "", "1", "0", "10", "1"]])]),
            "ensembl",
        )
        .unwrap_err();
        assert_eq!(
            err.to_string(),
            "transcript T1: missing value for 'gene_accession'"
        );
    }

    #[test]
    fn test_invalid_ordinal() {
        let columns = [&["transcript_accession", "transcript_order"][..], &LOCATION[..]].concat();
        let err = load_annotation(
            &tables(vec![table("exon", &columns, &[&["T1", "two", "1", "0", "10", "1"]])]),
            "ensembl",
        )
        .unwrap_err();
        assert!(matches!(err, IngestError::InvalidField { ref column, .. } if column == "transcript_order"));
    }

    #[test]
    fn test_duplicate_ordinal_rejected() {
        let columns = [&["transcript_accession", "transcript_order"][..], &LOCATION[..]].concat();
        let err = load_annotation(
            &tables(vec![table(
                "exon",
                &columns,
                &[&["T1", "1", "1", "0", "10", "1"], &["T1", "1", "1", "20", "30", "1"]],
            )]),
            "ensembl",
        )
        .unwrap_err();
        assert!(matches!(err, IngestError::DuplicateKey { .. }));
    }
}
