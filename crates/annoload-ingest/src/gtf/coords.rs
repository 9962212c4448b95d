// Coordinate normalization
//
// GTF uses 1-based inclusive coordinates and a textual strand; every table
// this crate emits uses 0-based half-open coordinates and a signed strand.

use super::alias::AliasTable;
use super::models::{Location, Strand};
use crate::error::{IngestError, Result};

/// Convert a source interval into a canonical [`Location`]
///
/// Fails if the chromosome has no alias, the strand is not `+`/`-`,
/// `start < 1` or `end < start`.
pub fn normalize(
    aliases: &AliasTable,
    seqname: &str,
    strand: &str,
    start: i64,
    end: i64,
) -> Result<Location> {
    let chromosome = aliases
        .resolve(seqname)
        .ok_or_else(|| IngestError::UnknownChromosome(seqname.to_string()))?;
    let strand = Strand::from_symbol(strand)?;

    if start < 1 || end < start {
        return Err(IngestError::InvalidCoordinates { start, end });
    }

    Ok(Location::new(chromosome, start - 1, end, strand))
}

/// Back to 1-based inclusive `(start, end)`
pub fn denormalize(location: &Location) -> (i64, i64) {
    (location.start + 1, location.end)
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn aliases() -> AliasTable {
        AliasTable::from_pairs([("chr1", "1"), ("1", "1")]).unwrap()
    }

    #[test]
    fn test_normalize_forward() {
        let location = normalize(&aliases(), "chr1", "+", 100, 399).unwrap();
        assert_eq!(location, Location::new("1", 99, 399, Strand::Forward));
        assert_eq!(location.len(), 300);
    }

    #[test]
    fn test_normalize_single_base() {
        let location = normalize(&aliases(), "1", "-", 5, 5).unwrap();
        assert_eq!((location.start, location.end), (4, 5));
        assert_eq!(location.strand, Strand::Reverse);
    }

    #[test]
    fn test_unknown_chromosome() {
        let err = normalize(&aliases(), "chrUn", "+", 1, 2).unwrap_err();
        assert!(matches!(err, IngestError::UnknownChromosome(name) if name == "chrUn"));
    }

    #[test]
    fn test_bad_strand() {
        assert!(matches!(
            normalize(&aliases(), "1", ".", 1, 2),
            Err(IngestError::InvalidStrand(_))
        ));
    }

    #[test]
    fn test_bad_coordinates() {
        assert!(matches!(
            normalize(&aliases(), "1", "+", 0, 2),
            Err(IngestError::InvalidCoordinates { start: 0, end: 2 })
        ));
        assert!(matches!(
            normalize(&aliases(), "1", "+", 10, 9),
            Err(IngestError::InvalidCoordinates { .. })
        ));
    }

    proptest! {
        #[test]
        fn prop_round_trip(start in 1i64..1_000_000_000, span in 0i64..1_000_000, forward in any::<bool>()) {
            let end = start + span;
            let strand = if forward { "+" } else { "-" };
            let location = normalize(&aliases(), "chr1", strand, start, end).unwrap();

            prop_assert_eq!(denormalize(&location), (start, end));
            prop_assert_eq!(location.len(), end - start + 1);
        }
    }
}
