//! Directory scanning and transcoding of whole trees of delimited files

use crate::error::{Error, Result};
use crate::options::TranscodeOptions;
use crate::transcode::{transcode_file, TranscodeReport};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use tracing::{info, warn};
use walkdir::WalkDir;

/// Extensions picked up when none are given
pub const DEFAULT_EXTENSIONS: &[&str] = &["csv", "tsv"];

/// A file in the tree that could not be transcoded
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TreeFailure {
    pub path: PathBuf,
    pub error: String,
}

/// Result of transcoding a directory tree
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TreeReport {
    pub input_root: PathBuf,
    pub output_root: PathBuf,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    /// Files written successfully, in scan order
    pub files: Vec<TranscodeReport>,
    /// Files that failed, in scan order
    pub failures: Vec<TreeFailure>,
}

impl TreeReport {
    /// True when no file failed
    pub fn is_success(&self) -> bool {
        self.failures.is_empty()
    }

    /// Total records written across all files
    pub fn total_records(&self) -> usize {
        self.files.iter().map(|f| f.stats.records).sum()
    }
}

/// Recursively find files under `root` whose extension is in `extensions`
///
/// Matching is case-insensitive; the result is sorted.
pub fn scan_inputs<P: AsRef<Path>, S: AsRef<str>>(root: P, extensions: &[S]) -> Result<Vec<PathBuf>> {
    let mut found = Vec::new();

    for entry in WalkDir::new(root.as_ref()).follow_links(true) {
        let entry = entry?;
        if !entry.file_type().is_file() {
            continue;
        }

        let path = entry.path();
        let matches = path
            .extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| {
                extensions
                    .iter()
                    .any(|wanted| wanted.as_ref().eq_ignore_ascii_case(ext))
            });

        if matches {
            found.push(path.to_path_buf());
        }
    }

    found.sort();
    Ok(found)
}

/// Transcode every matching file under `input_root` into the same relative
/// location under `output_root`
///
/// Files are processed one after another. A failing file is recorded in the
/// report and does not stop the rest. `output_root` may equal `input_root`,
/// rewriting the tree in place. When it is a directory nested inside the
/// input tree, files already under it are skipped.
pub fn transcode_tree<P: AsRef<Path>, Q: AsRef<Path>, S: AsRef<str>>(
    input_root: P,
    output_root: Q,
    options: &TranscodeOptions,
    extensions: &[S],
) -> Result<TreeReport> {
    let input_root = input_root.as_ref();
    let output_root = output_root.as_ref();
    let started_at = Utc::now();

    if !input_root.is_dir() {
        return Err(Error::FileRead {
            path: input_root.to_path_buf(),
            source: io::Error::new(io::ErrorKind::InvalidInput, "not a directory"),
        });
    }
    options.validate()?;

    // compare resolved roots so `./data` and `data/fixed` relate correctly
    let canonical_input = fs::canonicalize(input_root).map_err(|e| Error::FileRead {
        path: input_root.to_path_buf(),
        source: e,
    })?;
    let canonical_output = fs::create_dir_all(output_root)
        .and_then(|_| fs::canonicalize(output_root))
        .map_err(|e| Error::FileWrite {
            path: output_root.to_path_buf(),
            source: e,
        })?;
    let nested_output = canonical_output != canonical_input
        && canonical_output.starts_with(&canonical_input);

    let inputs = scan_inputs(&canonical_input, extensions)?;
    info!(root = %input_root.display(), files = inputs.len(), "scanned input tree");

    let mut files = Vec::new();
    let mut failures = Vec::new();

    for input in inputs {
        if nested_output && input.starts_with(&canonical_output) {
            continue;
        }

        let relative = input.strip_prefix(&canonical_input).unwrap_or(&input);
        let output = output_root.join(relative);

        let result = ensure_parent(&output).and_then(|_| transcode_file(&input, &output, options));
        match result {
            Ok(report) => files.push(report),
            Err(e) => {
                warn!(path = %input.display(), error = %e, "failed to transcode file");
                failures.push(TreeFailure {
                    path: input,
                    error: e.to_string(),
                });
            }
        }
    }

    Ok(TreeReport {
        input_root: input_root.to_path_buf(),
        output_root: output_root.to_path_buf(),
        started_at,
        finished_at: Utc::now(),
        files,
        failures,
    })
}

fn ensure_parent(path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(|e| Error::FileWrite {
            path: parent.to_path_buf(),
            source: e,
        })?;
    }
    Ok(())
}
