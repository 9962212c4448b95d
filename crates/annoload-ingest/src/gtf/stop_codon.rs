// Stop codon merging
//
// Ensembl annotates the stop codon separately from the CDS it terminates.
// Before phases are computed each stop codon is folded into the coding
// fragment of the same exon, so the fragment length covers the full ORF.

use super::models::{AnnotationSet, CodingFragment, Location};
use crate::error::{Staged, Warning};
use tracing::debug;

/// Counters for one merge pass
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MergeStats {
    pub extended: usize,
    pub inserted: usize,
}

fn span(a: &Location, b: &Location) -> Location {
    Location::new(
        a.chromosome.clone(),
        a.start.min(b.start),
        a.end.max(b.end),
        a.strand,
    )
}

/// Fold every stop codon into its coding fragment
///
/// A stop codon with no fragment at its ordinal (split across an exon
/// boundary) becomes a fragment of its own and yields a warning. The new
/// fragment takes the protein id of its transcript's other fragments.
pub fn merge_stop_codons(set: &mut AnnotationSet) -> Staged<MergeStats> {
    let mut stats = MergeStats::default();
    let mut warnings = Vec::new();

    for (key, stop_codon) in &set.stop_codons {
        if let Some(fragment) = set.fragments.get_mut(key) {
            fragment.location = span(&fragment.location, &stop_codon.location);
            stats.extended += 1;
            continue;
        }

        let protein_accession = set
            .fragments
            .values()
            .filter(|f| f.transcript_accession == stop_codon.transcript_accession)
            .find_map(|f| f.protein_accession.clone());

        set.fragments.insert(
            key.clone(),
            CodingFragment {
                transcript_accession: stop_codon.transcript_accession.clone(),
                ordinal: stop_codon.ordinal,
                protein_accession,
                location: stop_codon.location.clone(),
                frame: stop_codon.frame,
            },
        );
        stats.inserted += 1;
        warnings.push(Warning::UnmatchedStopCodon {
            transcript: stop_codon.transcript_accession.clone(),
            ordinal: stop_codon.ordinal,
        });
    }

    debug!(
        extended = stats.extended,
        inserted = stats.inserted,
        "Merged stop codons"
    );

    Staged::with_warnings(stats, warnings)
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::gtf::models::{StopCodon, Strand};

    fn fragment(ordinal: u32, start: i64, end: i64, strand: Strand) -> CodingFragment {
        CodingFragment {
            transcript_accession: "T1".to_string(),
            ordinal,
            protein_accession: Some("P1".to_string()),
            location: Location::new("1", start, end, strand),
            frame: Some(0),
        }
    }

    fn stop(ordinal: u32, start: i64, end: i64, strand: Strand) -> StopCodon {
        StopCodon {
            transcript_accession: "T1".to_string(),
            ordinal,
            location: Location::new("1", start, end, strand),
            frame: Some(0),
        }
    }

    fn key(ordinal: u32) -> (String, u32) {
        ("T1".to_string(), ordinal)
    }

    #[test]
    fn test_extends_forward_fragment() {
        let mut set = AnnotationSet::new();
        set.fragments.insert(key(1), fragment(1, 100, 400, Strand::Forward));
        set.stop_codons.insert(key(1), stop(1, 400, 403, Strand::Forward));

        let staged = merge_stop_codons(&mut set);
        assert!(staged.is_clean());
        assert_eq!(staged.value.extended, 1);
        assert_eq!(set.fragments[&key(1)].location.end, 403);
        assert_eq!(set.fragments[&key(1)].location.start, 100);
    }

    #[test]
    fn test_extends_reverse_fragment() {
        let mut set = AnnotationSet::new();
        set.fragments.insert(key(2), fragment(2, 100, 400, Strand::Reverse));
        set.stop_codons.insert(key(2), stop(2, 97, 100, Strand::Reverse));

        merge_stop_codons(&mut set);
        assert_eq!(set.fragments[&key(2)].location.start, 97);
        assert_eq!(set.fragments[&key(2)].location.end, 400);
    }

    #[test]
    fn test_inserts_unmatched_stop_codon() {
        let mut set = AnnotationSet::new();
        set.fragments.insert(key(1), fragment(1, 100, 400, Strand::Forward));
        set.stop_codons.insert(key(2), stop(2, 500, 503, Strand::Forward));

        let staged = merge_stop_codons(&mut set);
        assert_eq!(staged.value.inserted, 1);
        assert_eq!(
            staged.warnings,
            vec![Warning::UnmatchedStopCodon {
                transcript: "T1".to_string(),
                ordinal: 2
            }]
        );

        let inserted = &set.fragments[&key(2)];
        assert_eq!(inserted.location, Location::new("1", 500, 503, Strand::Forward));
        assert_eq!(inserted.protein_accession.as_deref(), Some("P1"));
    }
}
