//! Coding sequence equivalence classes
//!
//! Transcripts whose coding fragments have identical shapes encode the same
//! coding sequence and share one [`CodingSequence`] entity. A shape is the
//! ordered list of `(chromosome, start, end, strand, phase_start, phase_end,
//! cds_order)` tuples; its canonical serialization is hashed with SHA-256 and
//! the hash indexes a class arena, so membership is decided by value only.
//!
//! Classes are named by priority:
//!
//! 1. a consensus id (e.g. CCDS) carried by a member,
//! 2. the protein id shared by every member that has one,
//! 3. a generated `<prefix>NNNNNN` id.
//!
//! Naming runs over the classes in canonical order (chromosome, envelope,
//! strand, hash), so the result does not depend on input order. An accession
//! already given to an earlier class is never reused; the later class falls
//! through to the next tier.

use super::models::{
    CdsStatus, CodingSequence, Location, PhasedFragment, PhasedTranscripts, ShapeMember,
    Transcript,
};
use crate::error::{Staged, Warning};
use annoload_common::checksum::content_hash;
use indexmap::IndexMap;
use std::collections::{BTreeSet, HashSet};
use tracing::debug;

/// Namespace of consensus-named coding sequences
pub const CONSENSUS_NAMESPACE: &str = "consensus";

/// Canonical text form of a shape: one member per line, fields tab-joined
pub fn canonical_shape(shape: &[ShapeMember]) -> String {
    let mut text = String::new();
    for member in shape {
        text.push_str(&format!(
            "{}\t{}\t{}\t{}\t{}\t{}\t{}\n",
            member.chromosome,
            member.start,
            member.end,
            member.strand.as_i8(),
            member.phase_start,
            member.phase_end,
            member.cds_order
        ));
    }
    text
}

/// Content hash of a shape
pub fn shape_hash(shape: &[ShapeMember]) -> String {
    content_hash(canonical_shape(shape).as_bytes())
}

/// The shape of one transcript's phased fragments (already in `cds_order`)
pub fn shape_of(fragments: &[PhasedFragment]) -> Vec<ShapeMember> {
    fragments.iter().map(ShapeMember::from).collect()
}

/// Envelope of a non-empty shape
fn envelope(shape: &[ShapeMember]) -> Option<Location> {
    let first = shape.first()?;
    let start = shape.iter().map(|m| m.start).min()?;
    let end = shape.iter().map(|m| m.end).max()?;
    Some(Location::new(first.chromosome.clone(), start, end, first.strand))
}

#[derive(Debug, Clone)]
pub struct EquivalenceConfig {
    pub namespace: String,
    pub id_prefix: String,
    pub require_consensus: bool,
}

impl Default for EquivalenceConfig {
    fn default() -> Self {
        Self {
            namespace: "ensembl".to_string(),
            id_prefix: "CDS".to_string(),
            require_consensus: true,
        }
    }
}

/// Outcome of grouping
#[derive(Debug, Clone, Default)]
pub struct EquivalenceClasses {
    /// Classes in canonical order
    pub classes: Vec<CodingSequence>,
    /// Coding transcripts dropped for lacking a consensus id
    pub discarded: Vec<String>,
}

impl EquivalenceClasses {
    pub fn get(&self, accession: &str) -> Option<&CodingSequence> {
        self.classes.iter().find(|c| c.accession == accession)
    }
}

#[derive(Debug)]
struct Member {
    transcript: String,
    consensus: Option<String>,
    protein: Option<String>,
}

#[derive(Debug)]
struct ClassDraft {
    hash: String,
    shape: Vec<ShapeMember>,
    location: Location,
    gene_accession: String,
    members: Vec<Member>,
}

impl ClassDraft {
    fn sort_key(&self) -> (&str, i64, i64, i8, &str) {
        (
            self.location.chromosome.as_str(),
            self.location.start,
            self.location.end,
            self.location.strand.as_i8(),
            self.hash.as_str(),
        )
    }

    fn consensus_ids(&self) -> BTreeSet<&str> {
        self.members
            .iter()
            .filter_map(|m| m.consensus.as_deref())
            .collect()
    }

    fn protein_ids(&self) -> BTreeSet<&str> {
        self.members
            .iter()
            .filter_map(|m| m.protein.as_deref())
            .collect()
    }
}

fn join(ids: &BTreeSet<&str>) -> String {
    ids.iter().copied().collect::<Vec<_>>().join(", ")
}

struct Naming {
    accession: String,
    namespace: String,
    is_consensus: bool,
    status: CdsStatus,
}

pub struct EquivalenceBuilder {
    config: EquivalenceConfig,
}

impl EquivalenceBuilder {
    pub fn new(config: EquivalenceConfig) -> Self {
        Self { config }
    }

    /// Group coding transcripts into classes and back-annotate them
    ///
    /// Every transcript in `phased` must be present in `transcripts`. Members
    /// get `cds_accession` set to their class, and a name if they had none.
    pub fn build(
        &self,
        transcripts: &mut IndexMap<String, Transcript>,
        phased: &PhasedTranscripts,
    ) -> Staged<EquivalenceClasses> {
        let mut warnings = Vec::new();
        let mut discarded = Vec::new();
        let mut arena: IndexMap<String, ClassDraft> = IndexMap::new();

        for (accession, fragments) in phased {
            let Some(transcript) = transcripts.get(accession) else {
                continue;
            };
            if self.config.require_consensus && transcript.consensus_accession.is_none() {
                discarded.push(accession.clone());
                continue;
            }

            let shape = shape_of(fragments);
            let Some(location) = envelope(&shape) else {
                continue;
            };
            let hash = shape_hash(&shape);

            let draft = arena.entry(hash.clone()).or_insert_with(|| ClassDraft {
                hash,
                shape,
                location,
                gene_accession: transcript.gene_accession.clone(),
                members: Vec::new(),
            });
            draft.members.push(Member {
                transcript: accession.clone(),
                consensus: transcript.consensus_accession.clone(),
                protein: fragments.iter().find_map(|f| f.protein_accession.clone()),
            });
        }

        let mut drafts: Vec<ClassDraft> = arena.into_values().collect();
        drafts.sort_by(|a, b| a.sort_key().cmp(&b.sort_key()));

        let mut claimed = HashSet::new();
        let mut generated = 0u32;
        let mut classes = Vec::with_capacity(drafts.len());

        for draft in drafts {
            let naming = self.name_class(&draft, &mut claimed, &mut generated, &mut warnings);
            classes.push(CodingSequence {
                name: naming.accession.clone(),
                accession: naming.accession,
                namespace: naming.namespace,
                is_consensus: naming.is_consensus,
                status: naming.status,
                gene_accession: draft.gene_accession,
                hash: draft.hash,
                location: draft.location,
                shape: draft.shape,
                members: draft.members.into_iter().map(|m| m.transcript).collect(),
            });
        }

        warnings.extend(cross_check(transcripts, &classes));
        back_annotate(transcripts, &classes);

        debug!(
            classes = classes.len(),
            discarded = discarded.len(),
            "Built coding sequence classes"
        );

        Staged::with_warnings(EquivalenceClasses { classes, discarded }, warnings)
    }

    fn name_class(
        &self,
        draft: &ClassDraft,
        claimed: &mut HashSet<String>,
        generated: &mut u32,
        warnings: &mut Vec<Warning>,
    ) -> Naming {
        let consensus_ids = draft.consensus_ids();
        if let Some(&chosen) = consensus_ids.first() {
            if consensus_ids.len() > 1 {
                warnings.push(Warning::MixedConsensus {
                    ids: join(&consensus_ids),
                    chosen: chosen.to_string(),
                });
            }
            if claimed.insert(chosen.to_string()) {
                return Naming {
                    accession: chosen.to_string(),
                    namespace: CONSENSUS_NAMESPACE.to_string(),
                    is_consensus: true,
                    status: CdsStatus::Curated,
                };
            }
            warnings.push(Warning::AccessionClaimed {
                accession: chosen.to_string(),
            });
        }

        let protein_ids = draft.protein_ids();
        if protein_ids.len() > 1 {
            warnings.push(Warning::ProteinIdDisagreement {
                ids: join(&protein_ids),
            });
        } else if let Some(&protein) = protein_ids.first() {
            if claimed.insert(protein.to_string()) {
                return Naming {
                    accession: protein.to_string(),
                    namespace: self.config.namespace.clone(),
                    is_consensus: false,
                    status: CdsStatus::Annotated,
                };
            }
            warnings.push(Warning::AccessionClaimed {
                accession: protein.to_string(),
            });
        }

        let accession = loop {
            *generated += 1;
            let candidate = format!("{}{:06}", self.config.id_prefix, generated);
            if claimed.insert(candidate.clone()) {
                break candidate;
            }
        };

        Naming {
            accession,
            namespace: self.config.namespace.clone(),
            is_consensus: false,
            status: CdsStatus::Derived,
        }
    }
}

/// Transcripts sharing a consensus id should land in a single class
fn cross_check(
    transcripts: &IndexMap<String, Transcript>,
    classes: &[CodingSequence],
) -> Vec<Warning> {
    let mut spans: IndexMap<&str, BTreeSet<&str>> = IndexMap::new();
    for class in classes {
        for member in &class.members {
            if let Some(consensus) = transcripts
                .get(member)
                .and_then(|t| t.consensus_accession.as_deref())
            {
                spans
                    .entry(consensus)
                    .or_default()
                    .insert(class.accession.as_str());
            }
        }
    }

    spans
        .into_iter()
        .filter(|(_, classes)| classes.len() > 1)
        .map(|(consensus, classes)| Warning::ConsensusSpansClasses {
            consensus: consensus.to_string(),
            classes: classes.len(),
        })
        .collect()
}

fn back_annotate(transcripts: &mut IndexMap<String, Transcript>, classes: &[CodingSequence]) {
    for class in classes {
        for member in &class.members {
            if let Some(transcript) = transcripts.get_mut(member) {
                transcript.cds_accession = Some(class.accession.clone());
                if transcript.name.is_none() {
                    transcript.name = Some(class.name.clone());
                }
            }
        }
    }
}
