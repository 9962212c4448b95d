// GTF raw extractor
//
// Streams a 9-column GTF source, keeps the records whose feature type and
// chromosome are of interest, normalizes their coordinates and maps them
// through the template into one raw table per feature type.

use super::alias::AliasTable;
use super::coords;
use super::models::FeatureRecord;
use super::template::{Template, NO_VALUE};
use crate::error::{IngestError, Result};
use indexmap::IndexMap;
use std::collections::HashSet;
use std::io::BufRead;
use tracing::{debug, info};

/// Number of tab-separated columns in a GTF line
pub const GTF_COLUMNS: usize = 9;

/// Parse the attribute column
///
/// Pairs are `key value;`, the value either double-quoted (and then free to
/// contain `;` and spaces) or a bare token. The trailing `;` is optional.
/// A repeated key keeps its first position and takes the later value.
pub fn parse_attributes(text: &str) -> Result<IndexMap<String, String>> {
    let mut attributes = IndexMap::new();
    let mut rest = text.trim();

    while !rest.is_empty() {
        let key_end = rest.find(char::is_whitespace).ok_or_else(|| {
            IngestError::AttributeSyntax(format!(
                "key '{}' has no value",
                rest.trim_end_matches(';')
            ))
        })?;
        let key = &rest[..key_end];
        if key.contains(';') || key.contains('"') {
            return Err(IngestError::AttributeSyntax(format!(
                "key '{}' has no value",
                key.split(';').next().unwrap_or(key)
            )));
        }
        rest = rest[key_end..].trim_start();

        let (value, remainder) = if let Some(quoted) = rest.strip_prefix('"') {
            let close = quoted.find('"').ok_or_else(|| {
                IngestError::AttributeSyntax(format!("unterminated quote in value of '{}'", key))
            })?;
            (&quoted[..close], &quoted[close + 1..])
        } else {
            let end = rest.find(';').unwrap_or(rest.len());
            let value = rest[..end].trim_end();
            if value.is_empty() {
                return Err(IngestError::AttributeSyntax(format!("key '{}' has no value", key)));
            }
            if value.contains(char::is_whitespace) || value.contains('"') {
                return Err(IngestError::AttributeSyntax(format!(
                    "expected ';' after value of '{}'",
                    key
                )));
            }
            (value, &rest[end..])
        };

        let remainder = remainder.trim_start();
        rest = match remainder.strip_prefix(';') {
            Some(next) => next.trim_start(),
            None if remainder.is_empty() => remainder,
            None => {
                return Err(IngestError::AttributeSyntax(format!(
                    "expected ';' after value of '{}'",
                    key
                )));
            },
        };

        attributes.insert(key.to_string(), value.to_string());
    }

    Ok(attributes)
}

/// Parse the frame column: `.` is absent, otherwise 0, 1 or 2
pub fn parse_frame(text: &str) -> Result<Option<u8>> {
    match text {
        NO_VALUE => Ok(None),
        "0" => Ok(Some(0)),
        "1" => Ok(Some(1)),
        "2" => Ok(Some(2)),
        other => Err(IngestError::InvalidFrame(other.to_string())),
    }
}

fn parse_position(column: &'static str, text: &str) -> Result<i64> {
    text.parse().map_err(|_| IngestError::InvalidNumber {
        column,
        value: text.to_string(),
    })
}

fn optional(text: &str) -> Option<String> {
    (text != NO_VALUE && !text.is_empty()).then(|| text.to_string())
}

/// Strip the line terminator and check the encoding
fn decode_line(bytes: &[u8]) -> Result<&str> {
    let text = std::str::from_utf8(bytes)?;
    Ok(text.trim_end_matches('\n').trim_end_matches('\r'))
}

/// Rows extracted for one feature type
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawTable {
    feature_type: String,
    columns: Vec<String>,
    rows: Vec<Vec<String>>,
}

impl RawTable {
    pub fn new(feature_type: impl Into<String>, columns: Vec<String>) -> Self {
        Self {
            feature_type: feature_type.into(),
            columns,
            rows: Vec::new(),
        }
    }

    pub fn feature_type(&self) -> &str {
        &self.feature_type
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn rows(&self) -> &[Vec<String>] {
        &self.rows
    }

    pub fn push(&mut self, row: Vec<String>) {
        self.rows.push(row);
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn column_index(&self, column: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == column)
    }

    /// Iterate rows with named column access
    pub fn records(&self) -> impl Iterator<Item = RawRecord<'_>> {
        self.rows.iter().enumerate().map(move |(index, values)| RawRecord {
            table: self,
            index,
            values,
        })
    }
}

/// One row of a [`RawTable`]
#[derive(Debug, Clone, Copy)]
pub struct RawRecord<'a> {
    table: &'a RawTable,
    index: usize,
    values: &'a [String],
}

impl<'a> RawRecord<'a> {
    pub fn feature_type(&self) -> &'a str {
        self.table.feature_type()
    }

    /// 1-based position in the table
    pub fn row_number(&self) -> usize {
        self.index + 1
    }

    /// Cell value, `None` if the column is absent or the cell is empty
    pub fn get(&self, column: &str) -> Option<&'a str> {
        let index = self.table.column_index(column)?;
        self.values
            .get(index)
            .map(String::as_str)
            .filter(|value| !value.is_empty())
    }
}

/// Counters for one extraction pass
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExtractionStats {
    pub lines_read: usize,
    pub comment_lines: usize,
    pub skipped_feature_type: usize,
    pub skipped_chromosome: usize,
    pub kept: IndexMap<String, usize>,
}

impl ExtractionStats {
    pub fn total_kept(&self) -> usize {
        self.kept.values().sum()
    }
}

/// Stage-1 output: one table per feature type of interest
#[derive(Debug, Clone)]
pub struct RawExtraction {
    pub tables: IndexMap<String, RawTable>,
    pub stats: ExtractionStats,
}

pub struct GtfExtractor<'a> {
    template: &'a Template,
    aliases: &'a AliasTable,
    parse_limit: Option<usize>,
}

impl<'a> GtfExtractor<'a> {
    pub fn new(template: &'a Template, aliases: &'a AliasTable) -> Self {
        Self {
            template,
            aliases,
            parse_limit: None,
        }
    }

    /// Stop after this many kept records
    pub fn with_parse_limit(mut self, limit: usize) -> Self {
        self.parse_limit = Some(limit);
        self
    }

    /// Extract all records of interest from a line source
    pub fn extract<R: BufRead>(&self, mut reader: R) -> Result<RawExtraction> {
        let mut tables: IndexMap<String, RawTable> = self
            .template
            .iter()
            .map(|ft| {
                let table = RawTable::new(ft.feature_type(), ft.columns().to_vec());
                (ft.feature_type().to_string(), table)
            })
            .collect();
        let mut seen: IndexMap<String, HashSet<Vec<String>>> = IndexMap::new();
        let mut stats = ExtractionStats::default();
        let mut buffer = Vec::new();

        for line_number in 1.. {
            if self.parse_limit.is_some_and(|limit| stats.total_kept() >= limit) {
                debug!(limit = ?self.parse_limit, "Parse limit reached");
                break;
            }

            buffer.clear();
            let read = reader
                .read_until(b'\n', &mut buffer)
                .map_err(|e| IngestError::at_line(line_number, "", e.into()))?;
            if read == 0 {
                break;
            }

            let line = decode_line(&buffer)
                .map_err(|e| IngestError::at_line(line_number, &String::from_utf8_lossy(&buffer), e))?;
            stats.lines_read += 1;

            if line.starts_with('#') || line.trim().is_empty() {
                stats.comment_lines += 1;
                continue;
            }

            self.process_line(line, &mut tables, &mut seen, &mut stats)
                .map_err(|e| IngestError::at_line(line_number, line, e))?;
        }

        info!(
            lines = stats.lines_read,
            kept = stats.total_kept(),
            skipped_chromosome = stats.skipped_chromosome,
            skipped_feature_type = stats.skipped_feature_type,
            "Extracted raw tables"
        );

        Ok(RawExtraction { tables, stats })
    }

    fn process_line(
        &self,
        line: &str,
        tables: &mut IndexMap<String, RawTable>,
        seen: &mut IndexMap<String, HashSet<Vec<String>>>,
        stats: &mut ExtractionStats,
    ) -> Result<()> {
        let columns: Vec<&str> = line.split('\t').collect();
        if columns.len() != GTF_COLUMNS {
            return Err(IngestError::ColumnCount(columns.len()));
        }

        let feature_type = columns[2];
        let Some(feature_template) = self.template.get(feature_type) else {
            stats.skipped_feature_type += 1;
            return Ok(());
        };
        if !self.aliases.contains(columns[0]) {
            stats.skipped_chromosome += 1;
            return Ok(());
        }

        let start = parse_position("start", columns[3])?;
        let end = parse_position("end", columns[4])?;
        let location = coords::normalize(self.aliases, columns[0], columns[6], start, end)?;

        let record = FeatureRecord {
            feature_type: feature_type.to_string(),
            source: optional(columns[1]),
            location,
            score: optional(columns[5]),
            frame: parse_frame(columns[7])?,
            attributes: parse_attributes(columns[8])?,
        };

        let row = feature_template.apply(&record);

        if let Some(key) = feature_template.unique_key(&row) {
            let keys = seen.entry(feature_type.to_string()).or_default();
            if keys.contains(&key) {
                return Err(IngestError::DuplicateKey {
                    feature_type: feature_type.to_string(),
                    key: key.join(", "),
                });
            }
            keys.insert(key);
        }

        if let Some(table) = tables.get_mut(feature_type) {
            table.push(row);
        }
        *stats.kept.entry(feature_type.to_string()).or_insert(0) += 1;

        Ok(())
    }
}
