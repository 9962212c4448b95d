// Coding phase assignment
//
// Frame (GTF column 8) is the number of bases from a fragment's 5' end to the
// first complete codon. Phase is its complement: how far into a codon the
// fragment's 5' boundary falls. phase_end is the same offset at the 3' end.

use super::models::{AnnotationSet, CodingFragment, PhasedFragment, PhasedTranscripts, Strand};
use crate::error::{IngestError, Result};
use indexmap::IndexMap;
use tracing::debug;

/// `(-frame) mod 3`
pub fn phase_start(frame: u8) -> u8 {
    (3 - frame % 3) % 3
}

/// `(phase_start + length) mod 3`
pub fn phase_end(phase_start: u8, length: i64) -> u8 {
    // both terms are reduced first, so the sum cannot overflow
    (i64::from(phase_start % 3) + length.rem_euclid(3)).rem_euclid(3) as u8
}

/// Fragments of one transcript in 5'->3' order
fn transcript_order(fragments: &mut [&CodingFragment]) {
    fragments.sort_by(|a, b| {
        let forward = (a.location.start, a.location.end).cmp(&(b.location.start, b.location.end));
        match a.location.strand {
            Strand::Forward => forward,
            Strand::Reverse => forward.reverse(),
        }
    });
}

fn phase_fragment(fragment: &CodingFragment, cds_order: u32) -> Result<PhasedFragment> {
    let frame = fragment.frame.ok_or_else(|| IngestError::MissingField {
        table: "CDS".to_string(),
        record: format!("{}#{}", fragment.transcript_accession, fragment.ordinal),
        column: "frame".to_string(),
    })?;
    let start = phase_start(frame);

    Ok(PhasedFragment {
        transcript_accession: fragment.transcript_accession.clone(),
        ordinal: fragment.ordinal,
        protein_accession: fragment.protein_accession.clone(),
        location: fragment.location.clone(),
        frame,
        cds_order,
        phase_start: start,
        phase_end: phase_end(start, fragment.location.len()),
    })
}

/// Assign `cds_order` and phases to every coding fragment
///
/// `cds_order` follows genomic order in the direction of transcription,
/// so gaps or oddities in source exon numbering do not matter. Transcripts
/// come out in the order they were loaded; non-coding ones are absent.
pub fn assign_phases(set: &AnnotationSet) -> Result<PhasedTranscripts> {
    let mut grouped: IndexMap<&str, Vec<&CodingFragment>> = set
        .transcripts
        .keys()
        .map(|accession| (accession.as_str(), Vec::new()))
        .collect();
    for fragment in set.fragments.values() {
        grouped
            .entry(fragment.transcript_accession.as_str())
            .or_default()
            .push(fragment);
    }

    let mut phased = PhasedTranscripts::new();
    for (accession, mut fragments) in grouped {
        if fragments.is_empty() {
            continue;
        }
        transcript_order(&mut fragments);

        let ordered = fragments
            .iter()
            .zip(1u32..)
            .map(|(fragment, cds_order)| phase_fragment(fragment, cds_order))
            .collect::<Result<Vec<_>>>()?;
        phased.insert(accession.to_string(), ordered);
    }

    debug!(coding_transcripts = phased.len(), "Assigned coding phases");
    Ok(phased)
}
