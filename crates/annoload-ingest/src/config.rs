//! Ingestion configuration
//!
//! Configuration for one GTF ingestion run. Values come from the environment
//! (a `.env` file is honoured) and can be overridden by command-line flags.

use crate::error::Result;
use annoload_common::CommonError;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

pub const DEFAULT_OUTPUT_DIR: &str = "./output";
pub const DEFAULT_NAMESPACE: &str = "ensembl";
pub const DEFAULT_CDS_ID_PREFIX: &str = "CDS";
pub const DEFAULT_REQUIRE_CONSENSUS: bool = true;
pub const DEFAULT_TRANSFORM: bool = true;

/// Configuration for a single ingestion run
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IngestConfig {
    /// GTF source, plain or gzip
    pub input: PathBuf,

    /// Directory receiving the emitted tables
    pub output_dir: PathBuf,

    /// CSV of `source_name,chromosome_name` pairs
    pub alias_table: PathBuf,

    /// Template document (None = built-in Ensembl template)
    pub template: Option<PathBuf>,

    /// Namespace recorded on genes, transcripts and non-consensus CDS
    pub namespace: String,

    /// Drop coding transcripts without a consensus id before grouping
    pub require_consensus: bool,

    /// Run stage 2; when false only raw per-feature tables are written
    pub transform: bool,

    /// Prefix for generated CDS accessions
    pub cds_id_prefix: String,

    /// Parse limit for smoke runs (None = parse all)
    pub parse_limit: Option<usize>,
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            input: PathBuf::new(),
            output_dir: PathBuf::from(DEFAULT_OUTPUT_DIR),
            alias_table: PathBuf::new(),
            template: None,
            namespace: DEFAULT_NAMESPACE.to_string(),
            require_consensus: DEFAULT_REQUIRE_CONSENSUS,
            transform: DEFAULT_TRANSFORM,
            cds_id_prefix: DEFAULT_CDS_ID_PREFIX.to_string(),
            parse_limit: None,
        }
    }
}

fn parse_bool(key: &str, value: &str) -> Result<bool> {
    match value.trim().to_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(CommonError::config(format!("{} must be a boolean, got '{}'", key, value)).into()),
    }
}

impl IngestConfig {
    /// Create new configuration with defaults
    pub fn new(input: impl Into<PathBuf>, alias_table: impl Into<PathBuf>) -> Self {
        Self {
            input: input.into(),
            alias_table: alias_table.into(),
            ..Self::default()
        }
    }

    /// Load configuration from environment variables
    ///
    /// Environment variables:
    /// - `ANNOLOAD_INPUT`: GTF path
    /// - `ANNOLOAD_OUTPUT_DIR`: output directory (default `./output`)
    /// - `ANNOLOAD_ALIAS_TABLE`: chromosome alias CSV
    /// - `ANNOLOAD_TEMPLATE`: template JSON
    /// - `ANNOLOAD_NAMESPACE`: namespace (default `ensembl`)
    /// - `ANNOLOAD_REQUIRE_CONSENSUS`: true/false (default true)
    /// - `ANNOLOAD_TRANSFORM`: true/false (default true)
    /// - `ANNOLOAD_CDS_ID_PREFIX`: generated id prefix (default `CDS`)
    /// - `ANNOLOAD_PARSE_LIMIT`: maximum records kept
    ///
    /// Call [`validate`](Self::validate) after command-line overrides are applied.
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load configuration from an arbitrary key lookup
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(input) = lookup("ANNOLOAD_INPUT") {
            config.input = PathBuf::from(input);
        }
        if let Some(dir) = lookup("ANNOLOAD_OUTPUT_DIR") {
            config.output_dir = PathBuf::from(dir);
        }
        if let Some(aliases) = lookup("ANNOLOAD_ALIAS_TABLE") {
            config.alias_table = PathBuf::from(aliases);
        }
        if let Some(template) = lookup("ANNOLOAD_TEMPLATE") {
            config.template = Some(PathBuf::from(template));
        }
        if let Some(namespace) = lookup("ANNOLOAD_NAMESPACE") {
            config.namespace = namespace;
        }
        if let Some(value) = lookup("ANNOLOAD_REQUIRE_CONSENSUS") {
            config.require_consensus = parse_bool("ANNOLOAD_REQUIRE_CONSENSUS", &value)?;
        }
        if let Some(value) = lookup("ANNOLOAD_TRANSFORM") {
            config.transform = parse_bool("ANNOLOAD_TRANSFORM", &value)?;
        }
        if let Some(prefix) = lookup("ANNOLOAD_CDS_ID_PREFIX") {
            config.cds_id_prefix = prefix;
        }
        if let Some(value) = lookup("ANNOLOAD_PARSE_LIMIT") {
            let limit = value.trim().parse().map_err(|_| {
                CommonError::config(format!(
                    "ANNOLOAD_PARSE_LIMIT must be a positive integer, got '{}'",
                    value
                ))
            })?;
            config.parse_limit = Some(limit);
        }

        Ok(config)
    }

    pub fn with_output_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.output_dir = dir.into();
        self
    }

    pub fn with_template(mut self, template: impl Into<PathBuf>) -> Self {
        self.template = Some(template.into());
        self
    }

    pub fn with_namespace(mut self, namespace: impl Into<String>) -> Self {
        self.namespace = namespace.into();
        self
    }

    pub fn with_require_consensus(mut self, require: bool) -> Self {
        self.require_consensus = require;
        self
    }

    pub fn with_transform(mut self, transform: bool) -> Self {
        self.transform = transform;
        self
    }

    pub fn with_cds_id_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.cds_id_prefix = prefix.into();
        self
    }

    /// Set parse limit for testing
    pub fn with_parse_limit(mut self, limit: usize) -> Self {
        self.parse_limit = Some(limit);
        self
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        if self.input.as_os_str().is_empty() {
            return Err(CommonError::config("ANNOLOAD_INPUT (--input) is required").into());
        }
        if self.alias_table.as_os_str().is_empty() {
            return Err(
                CommonError::config("ANNOLOAD_ALIAS_TABLE (--alias-table) is required").into(),
            );
        }
        if self.output_dir.as_os_str().is_empty() {
            return Err(CommonError::config("output directory must not be empty").into());
        }
        if self.namespace.trim().is_empty() {
            return Err(CommonError::config("namespace must not be empty").into());
        }
        if self.cds_id_prefix.trim().is_empty() {
            return Err(CommonError::config("CDS id prefix must not be empty").into());
        }
        if self.parse_limit == Some(0) {
            return Err(CommonError::config("parse limit must be greater than 0").into());
        }
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key: &str| map.get(key).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = IngestConfig::new("in.gtf.gz", "aliases.csv");
        assert_eq!(config.output_dir, PathBuf::from("./output"));
        assert_eq!(config.namespace, "ensembl");
        assert!(config.require_consensus);
        assert!(config.transform);
        assert_eq!(config.cds_id_prefix, "CDS");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_from_lookup() {
        let config = IngestConfig::from_lookup(lookup(&[
            ("ANNOLOAD_INPUT", "/data/genes.gtf"),
            ("ANNOLOAD_ALIAS_TABLE", "/data/aliases.csv"),
            ("ANNOLOAD_TEMPLATE", "/data/template.json"),
            ("ANNOLOAD_REQUIRE_CONSENSUS", "false"),
            ("ANNOLOAD_TRANSFORM", "no"),
            ("ANNOLOAD_PARSE_LIMIT", "500"),
        ]))
        .unwrap();

        assert_eq!(config.input, PathBuf::from("/data/genes.gtf"));
        assert_eq!(config.template, Some(PathBuf::from("/data/template.json")));
        assert!(!config.require_consensus);
        assert!(!config.transform);
        assert_eq!(config.parse_limit, Some(500));
        config.validate().unwrap();
    }

    #[test]
    fn test_from_lookup_rejects_bad_values() {
        assert!(IngestConfig::from_lookup(lookup(&[("ANNOLOAD_TRANSFORM", "maybe")])).is_err());
        assert!(IngestConfig::from_lookup(lookup(&[("ANNOLOAD_PARSE_LIMIT", "-3")])).is_err());
    }

    #[test]
    fn test_validate() {
        assert!(IngestConfig::default().validate().is_err());

        let base = IngestConfig::new("in.gtf", "aliases.csv");
        assert!(base.clone().with_namespace(" ").validate().is_err());
        assert!(base.clone().with_cds_id_prefix("").validate().is_err());
        assert!(base.clone().with_parse_limit(0).validate().is_err());
        assert!(base.with_parse_limit(1).validate().is_ok());
    }
}
