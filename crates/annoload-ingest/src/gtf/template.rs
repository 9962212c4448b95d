//! Declarative per-feature-type field mapping
//!
//! A template document is a JSON object keyed by feature type:
//!
//! ```json
//! {
//!   "gene": {
//!     "attributes": { "gene_id": "accession", "gene_name": "name" },
//!     "fields": { "seqname": "chromosome", "start": "start" },
//!     "unique": ["accession"]
//!   }
//! }
//! ```
//!
//! Output columns are the attribute targets followed by the field targets, in
//! declaration order. The feature types of interest are the template's keys.

use super::models::FeatureRecord;
use crate::error::{IngestError, Result};
use indexmap::{IndexMap, IndexSet};
use serde::Deserialize;
use std::path::Path;

/// The "no value" placeholder used throughout GTF
pub const NO_VALUE: &str = ".";

/// Positional GTF columns a template may map from
pub const FIELD_SOURCES: [&str; 8] =
    ["seqname", "source", "feature", "start", "end", "score", "strand", "frame"];

const ENSEMBL_TEMPLATE: &str = include_str!("../../templates/ensembl.json");

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct FeatureEntry {
    #[serde(default)]
    attributes: IndexMap<String, String>,
    #[serde(default)]
    fields: IndexMap<String, String>,
    #[serde(default)]
    unique: Option<Vec<String>>,
}

/// Compiled mapping for one feature type
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeatureTemplate {
    feature_type: String,
    attributes: Vec<(String, String)>,
    fields: Vec<(String, String)>,
    columns: Vec<String>,
    unique: Option<Vec<usize>>,
}

impl FeatureTemplate {
    fn compile(feature_type: &str, entry: FeatureEntry) -> Result<Self> {
        let mut columns = IndexSet::new();

        for target in entry.attributes.values().chain(entry.fields.values()) {
            if !columns.insert(target.clone()) {
                return Err(IngestError::template(format!(
                    "{}: output column '{}' declared twice",
                    feature_type, target
                )));
            }
        }

        if let Some(source) = entry.fields.keys().find(|s| !FIELD_SOURCES.contains(&s.as_str())) {
            return Err(IngestError::template(format!(
                "{}: unknown field '{}', expected one of {}",
                feature_type,
                source,
                FIELD_SOURCES.join(", ")
            )));
        }

        let unique = match entry.unique {
            None => None,
            Some(key) if key.is_empty() => {
                return Err(IngestError::template(format!(
                    "{}: uniqueness key is empty",
                    feature_type
                )));
            },
            Some(key) => {
                let indices = key
                    .iter()
                    .map(|column| {
                        columns.get_index_of(column).ok_or_else(|| {
                            IngestError::template(format!(
                                "{}: unique column '{}' is not an output column",
                                feature_type, column
                            ))
                        })
                    })
                    .collect::<Result<Vec<_>>>()?;
                Some(indices)
            },
        };

        Ok(Self {
            feature_type: feature_type.to_string(),
            attributes: entry.attributes.into_iter().collect(),
            fields: entry.fields.into_iter().collect(),
            columns: columns.into_iter().collect(),
            unique,
        })
    }

    pub fn feature_type(&self) -> &str {
        &self.feature_type
    }

    /// Output column names, in row order
    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn has_unique_key(&self) -> bool {
        self.unique.is_some()
    }

    /// Build an output row; absent and `.` values become empty cells
    pub fn apply(&self, record: &FeatureRecord) -> Vec<String> {
        let attributes = self.attributes.iter().map(|(source, _)| {
            record
                .attributes
                .get(source)
                .filter(|value| value.as_str() != NO_VALUE)
                .cloned()
        });
        let fields = self
            .fields
            .iter()
            .map(|(source, _)| record.field(source).filter(|value| value != NO_VALUE));

        attributes.chain(fields).map(Option::unwrap_or_default).collect()
    }

    /// The declared uniqueness tuple of a row built by [`apply`](Self::apply)
    pub fn unique_key(&self, row: &[String]) -> Option<Vec<String>> {
        self.unique.as_ref().map(|indices| {
            indices
                .iter()
                .map(|&i| row.get(i).cloned().unwrap_or_default())
                .collect()
        })
    }
}

/// Immutable feature type -> mapping configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Template {
    features: IndexMap<String, FeatureTemplate>,
}

impl Template {
    /// Parse and validate a JSON template document
    pub fn from_json_str(text: &str) -> Result<Self> {
        let entries: IndexMap<String, FeatureEntry> = serde_json::from_str(text)?;
        if entries.is_empty() {
            return Err(IngestError::template("template declares no feature types"));
        }

        let features = entries
            .into_iter()
            .map(|(feature_type, entry)| {
                let compiled = FeatureTemplate::compile(&feature_type, entry)?;
                Ok((feature_type, compiled))
            })
            .collect::<Result<IndexMap<_, _>>>()?;

        Ok(Self { features })
    }

    pub fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|e| {
            IngestError::template(format!("cannot read {}: {}", path.display(), e))
        })?;
        Self::from_json_str(&text)
    }

    /// Built-in template for Ensembl/GENCODE GTF
    pub fn ensembl() -> Result<Self> {
        Self::from_json_str(ENSEMBL_TEMPLATE)
    }

    pub fn get(&self, feature_type: &str) -> Option<&FeatureTemplate> {
        self.features.get(feature_type)
    }

    /// Feature types of interest, in declaration order
    pub fn feature_types(&self) -> impl Iterator<Item = &str> {
        self.features.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = &FeatureTemplate> {
        self.features.values()
    }
}
