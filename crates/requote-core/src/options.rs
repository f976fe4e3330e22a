//! Parse and transcode settings, loadable from a JSON profile

use crate::dialect::{Dialect, QuotingPolicy};
use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use std::str::FromStr;

/// What to do with a record whose field count differs from the header
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RaggedPolicy {
    /// Fail with `RaggedRecord`
    #[default]
    Error,
    /// Keep the record as it is
    Allow,
    /// Pad short records with empty fields, truncate long ones
    Pad,
}

impl FromStr for RaggedPolicy {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "error" => Ok(RaggedPolicy::Error),
            "allow" => Ok(RaggedPolicy::Allow),
            "pad" => Ok(RaggedPolicy::Pad),
            _ => Err(format!("unknown ragged policy: {}", s)),
        }
    }
}

/// Settings for the parser that are not part of the file's dialect
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ParseOptions {
    /// Treat the first record as column names
    pub has_header: bool,
    /// Drop lines that contain nothing at all
    pub skip_blank_lines: bool,
    /// Reject quote characters outside quoted fields and text after a closing quote
    pub strict_quotes: bool,
    /// Handling of records whose width differs from the header
    pub ragged: RaggedPolicy,
}

impl Default for ParseOptions {
    fn default() -> Self {
        Self {
            has_header: true,
            skip_blank_lines: true,
            strict_quotes: false,
            ragged: RaggedPolicy::Error,
        }
    }
}

/// Everything needed to read one file and write it back out
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TranscodeOptions {
    /// Dialect of the source
    pub input: Dialect,
    /// Dialect of the destination; `None` reuses the input dialect
    pub output: Option<Dialect>,
    /// Parser behavior
    pub parse: ParseOptions,
    /// Quoting applied when writing
    pub quoting: QuotingPolicy,
}

impl TranscodeOptions {
    /// Dialect used for writing
    pub fn output_dialect(&self) -> &Dialect {
        self.output.as_ref().unwrap_or(&self.input)
    }

    /// Validate both dialects
    pub fn validate(&self) -> Result<()> {
        self.input.validate()?;
        if let Some(output) = &self.output {
            output.validate()?;
        }
        Ok(())
    }

    /// Load options from a JSON file
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(path.as_ref()).map_err(|e| Error::FileRead {
            path: path.as_ref().to_path_buf(),
            source: e,
        })?;
        serde_json::from_str(&content).map_err(Error::Json)
    }

    /// Save options as pretty JSON
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let content = serde_json::to_string_pretty(self)?;
        fs::write(path.as_ref(), content).map_err(|e| Error::FileWrite {
            path: path.as_ref().to_path_buf(),
            source: e,
        })
    }
}
