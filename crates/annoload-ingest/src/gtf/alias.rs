// Chromosome alias table
//
// Maps source sequence names (e.g. "chr1", "1", "NC_000001.11") to the
// canonical chromosome name used in every emitted table. Loaded once from a
// two-column CSV with header `source_name,chromosome_name`.

use crate::error::{IngestError, Result};
use serde::Deserialize;
use std::collections::HashMap;
use std::io::Read;
use std::path::Path;
use tracing::debug;

#[derive(Debug, Deserialize)]
struct AliasRow {
    source_name: String,
    chromosome_name: String,
}

/// Source sequence name -> canonical chromosome name
#[derive(Debug, Clone, Default)]
pub struct AliasTable {
    aliases: HashMap<String, String>,
}

impl AliasTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load from a CSV file
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let file = std::fs::File::open(path).map_err(|e| {
            IngestError::alias_table(format!("cannot open {}: {}", path.display(), e))
        })?;
        let table = Self::from_reader(file)?;
        if table.is_empty() {
            return Err(IngestError::alias_table(format!(
                "{} lists no chromosomes",
                path.display()
            )));
        }
        debug!(path = %path.display(), aliases = table.len(), "Loaded alias table");
        Ok(table)
    }

    /// Load from any CSV source
    pub fn from_reader<R: Read>(reader: R) -> Result<Self> {
        let mut csv_reader = csv::ReaderBuilder::new()
            .trim(csv::Trim::All)
            .from_reader(reader);

        let mut table = Self::new();
        for row in csv_reader.deserialize() {
            let row: AliasRow = row?;
            table.insert(row.source_name, row.chromosome_name)?;
        }
        Ok(table)
    }

    /// Build from in-memory pairs
    pub fn from_pairs<I, S, C>(pairs: I) -> Result<Self>
    where
        I: IntoIterator<Item = (S, C)>,
        S: Into<String>,
        C: Into<String>,
    {
        let mut table = Self::new();
        for (source, canonical) in pairs {
            table.insert(source.into(), canonical.into())?;
        }
        Ok(table)
    }

    /// Add one alias; re-declaring the same pair is accepted, a conflicting one is not
    pub fn insert(&mut self, source_name: String, chromosome_name: String) -> Result<()> {
        if source_name.is_empty() || chromosome_name.is_empty() {
            return Err(IngestError::alias_table(format!(
                "empty name in alias pair ('{}', '{}')",
                source_name, chromosome_name
            )));
        }

        match self.aliases.get(&source_name) {
            Some(existing) if existing != &chromosome_name => Err(IngestError::alias_table(format!(
                "'{}' maps to both '{}' and '{}'",
                source_name, existing, chromosome_name
            ))),
            Some(_) => Ok(()),
            None => {
                self.aliases.insert(source_name, chromosome_name);
                Ok(())
            },
        }
    }

    /// Canonical name for a source sequence name, if it is of interest
    pub fn resolve(&self, source_name: &str) -> Option<&str> {
        self.aliases.get(source_name).map(String::as_str)
    }

    pub fn contains(&self, source_name: &str) -> bool {
        self.aliases.contains_key(source_name)
    }

    pub fn len(&self) -> usize {
        self.aliases.len()
    }

    pub fn is_empty(&self) -> bool {
        self.aliases.is_empty()
    }
}
