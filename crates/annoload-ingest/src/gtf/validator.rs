//! Cross-feature consistency checks
//!
//! Every violation is fatal and names both records involved.

use super::models::{AnnotationSet, CodingFragment, Exon, Gene, Location, StopCodon, Transcript};
use crate::error::{IngestError, Result};
use indexmap::IndexMap;
use std::collections::{HashMap, HashSet};
use tracing::debug;

fn describe_gene(gene: &Gene) -> String {
    format!("gene {} [{}]", gene.accession, gene.location)
}

fn describe_transcript(transcript: &Transcript) -> String {
    format!("transcript {} [{}]", transcript.accession, transcript.location)
}

fn describe_exon(exon: &Exon) -> String {
    format!("exon {}#{} [{}]", exon.transcript_accession, exon.ordinal, exon.location)
}

fn describe_fragment(fragment: &CodingFragment) -> String {
    format!(
        "CDS {}#{} [{}]",
        fragment.transcript_accession, fragment.ordinal, fragment.location
    )
}

fn describe_stop_codon(stop_codon: &StopCodon) -> String {
    format!(
        "stop codon {}#{} [{}]",
        stop_codon.transcript_accession, stop_codon.ordinal, stop_codon.location
    )
}

/// Run all checks, stopping at the first violation
pub fn validate(set: &AnnotationSet) -> Result<()> {
    check_genes(set)?;
    check_children(set)?;
    check_shared_exons(set)?;
    check_fragment_order(set)?;

    debug!(
        genes = set.genes.len(),
        transcripts = set.transcripts.len(),
        "Annotation tables are consistent"
    );
    Ok(())
}

/// Transcript -> gene references, gene containment, and no orphan genes
fn check_genes(set: &AnnotationSet) -> Result<()> {
    let mut referenced = HashSet::new();

    for transcript in set.transcripts.values() {
        let gene = set.genes.get(&transcript.gene_accession).ok_or_else(|| {
            IngestError::UnknownReference {
                child: describe_transcript(transcript),
                parent_kind: "gene",
                parent: transcript.gene_accession.clone(),
            }
        })?;

        if !gene.location.contains(&transcript.location) {
            return Err(IngestError::Containment {
                outer: describe_gene(gene),
                inner: describe_transcript(transcript),
            });
        }
        referenced.insert(gene.accession.as_str());
    }

    if let Some(orphan) = set.genes.keys().find(|acc| !referenced.contains(acc.as_str())) {
        return Err(IngestError::OrphanGene(orphan.clone()));
    }

    Ok(())
}

fn parent_transcript<'a>(
    set: &'a AnnotationSet,
    accession: &str,
    child: impl FnOnce() -> String,
) -> Result<&'a Transcript> {
    set.transcripts
        .get(accession)
        .ok_or_else(|| IngestError::UnknownReference {
            child: child(),
            parent_kind: "transcript",
            parent: accession.to_string(),
        })
}

fn check_contained(
    transcript: &Transcript,
    location: &Location,
    inner: impl FnOnce() -> String,
) -> Result<()> {
    if transcript.location.contains(location) {
        Ok(())
    } else {
        Err(IngestError::Containment {
            outer: describe_transcript(transcript),
            inner: inner(),
        })
    }
}

/// Exons, coding fragments and stop codons reference a known transcript that contains them
fn check_children(set: &AnnotationSet) -> Result<()> {
    for exon in set.exons.values() {
        let transcript = parent_transcript(set, &exon.transcript_accession, || describe_exon(exon))?;
        check_contained(transcript, &exon.location, || describe_exon(exon))?;
    }

    for fragment in set.fragments.values() {
        let transcript =
            parent_transcript(set, &fragment.transcript_accession, || describe_fragment(fragment))?;
        check_contained(transcript, &fragment.location, || describe_fragment(fragment))?;
    }

    for stop_codon in set.stop_codons.values() {
        let transcript = parent_transcript(set, &stop_codon.transcript_accession, || {
            describe_stop_codon(stop_codon)
        })?;
        check_contained(transcript, &stop_codon.location, || describe_stop_codon(stop_codon))?;
    }

    Ok(())
}

/// Coding fragments of one transcript, in genomic order, must not overlap or share a start
fn check_fragment_order(set: &AnnotationSet) -> Result<()> {
    let mut by_transcript: IndexMap<&str, Vec<&CodingFragment>> = IndexMap::new();
    for fragment in set.fragments.values() {
        by_transcript
            .entry(fragment.transcript_accession.as_str())
            .or_default()
            .push(fragment);
    }

    for (transcript, mut fragments) in by_transcript {
        fragments.sort_by_key(|f| (f.location.start, f.location.end));

        for pair in fragments.windows(2) {
            let (first, second) = (pair[0], pair[1]);
            if second.location.start <= first.location.start
                || second.location.start < first.location.end
            {
                return Err(IngestError::FragmentOrder {
                    transcript: transcript.to_string(),
                    first: describe_fragment(first),
                    second: describe_fragment(second),
                });
            }
        }
    }

    Ok(())
}

/// Exons sharing an exon id must have identical coordinates
fn check_shared_exons(set: &AnnotationSet) -> Result<()> {
    let mut first_seen: HashMap<&str, &Exon> = HashMap::new();

    for exon in set.exons.values() {
        let Some(accession) = exon.accession.as_deref() else {
            continue;
        };
        match first_seen.get(accession) {
            Some(first) if first.location != exon.location => {
                return Err(IngestError::ExonMismatch {
                    accession: accession.to_string(),
                    first: describe_exon(first),
                    second: describe_exon(exon),
                });
            },
            Some(_) => {},
            None => {
                first_seen.insert(accession, exon);
            },
        }
    }

    Ok(())
}
