//! Parse-then-write operations over strings, byte buffers and files

use crate::error::{Error, Result};
use crate::options::TranscodeOptions;
use crate::parser::{parse_bytes, parse_str};
use crate::writer::{write_table, write_table_to_string, WriteStats};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs;
use std::io::BufWriter;
use std::path::{Path, PathBuf};
use tempfile::Builder;
use tracing::{debug, info};

/// Counters for one transcode
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TranscodeStats {
    /// Records written, header included
    pub records: usize,
    /// Fields written
    pub fields: usize,
    /// Fields that ended up quoted
    pub quoted_fields: usize,
    /// Size of the source
    pub bytes_in: usize,
    /// Size of the result
    pub bytes_out: usize,
}

impl TranscodeStats {
    fn new(bytes_in: usize, written: WriteStats) -> Self {
        Self {
            records: written.records,
            fields: written.fields,
            quoted_fields: written.quoted_fields,
            bytes_in,
            bytes_out: written.bytes,
        }
    }
}

/// Outcome of transcoding one file
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TranscodeReport {
    pub input: PathBuf,
    pub output: PathBuf,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub stats: TranscodeStats,
}

/// Transcode decoded text to text; encodings in the options are not applied
pub fn transcode_str(text: &str, options: &TranscodeOptions) -> Result<String> {
    options.validate()?;
    let table = parse_str(text, &options.input, &options.parse)?;
    write_table_to_string(&table, options.output_dialect(), options.quoting)
}

/// Transcode raw bytes, decoding and encoding with the configured encodings
pub fn transcode_bytes(bytes: &[u8], options: &TranscodeOptions) -> Result<(Vec<u8>, TranscodeStats)> {
    options.validate()?;
    let table = parse_bytes(bytes, &options.input, &options.parse)?;

    let mut out = Vec::with_capacity(bytes.len());
    let written = write_table(&mut out, &table, options.output_dialect(), options.quoting)?;
    Ok((out, TranscodeStats::new(bytes.len(), written)))
}

/// Transcode `input` into `output`
///
/// The input is read completely before the output is touched, so both may
/// name the same file. Output goes to a temporary file next to `output`
/// that is renamed into place only once everything was written and synced;
/// on any error the temporary file is removed and `output` is left as it was.
pub fn transcode_file<P: AsRef<Path>, Q: AsRef<Path>>(
    input: P,
    output: Q,
    options: &TranscodeOptions,
) -> Result<TranscodeReport> {
    let input = input.as_ref();
    let output = output.as_ref();
    let started_at = Utc::now();

    options.validate()?;

    let bytes = fs::read(input).map_err(|e| Error::FileRead {
        path: input.to_path_buf(),
        source: e,
    })?;
    debug!(path = %input.display(), bytes = bytes.len(), "read input file");

    let table = parse_bytes(&bytes, &options.input, &options.parse)?;
    let written = write_atomically(output, |file| {
        write_table(file, &table, options.output_dialect(), options.quoting)
    })?;

    let stats = TranscodeStats::new(bytes.len(), written);
    info!(
        input = %input.display(),
        output = %output.display(),
        records = stats.records,
        quoted = stats.quoted_fields,
        "transcoded file"
    );

    Ok(TranscodeReport {
        input: input.to_path_buf(),
        output: output.to_path_buf(),
        started_at,
        finished_at: Utc::now(),
        stats,
    })
}

/// Run `write` against a temp file in `path`'s directory, then rename it to `path`
///
/// An existing `path` keeps its permissions. A new one gets the mode a plain
/// create would give it (0666 less the umask) rather than the temp file's 0600.
fn write_atomically<F>(path: &Path, write: F) -> Result<WriteStats>
where
    F: FnOnce(&mut BufWriter<&fs::File>) -> Result<WriteStats>,
{
    let file_error = |source: std::io::Error| Error::FileWrite {
        path: path.to_path_buf(),
        source,
    };

    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    let existing = fs::metadata(path).ok().map(|m| m.permissions());

    let mut builder = Builder::new();
    builder.prefix(".requote");
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        builder.permissions(fs::Permissions::from_mode(0o666));
    }
    let temp = builder.tempfile_in(dir).map_err(file_error)?;

    let stats = {
        let mut buffered = BufWriter::new(temp.as_file());
        write(&mut buffered).map_err(|e| match e {
            Error::Io(source) => file_error(source),
            other => other,
        })?
    };

    if let Some(permissions) = existing {
        temp.as_file().set_permissions(permissions).map_err(file_error)?;
    }
    temp.as_file().sync_all().map_err(file_error)?;
    temp.persist(path).map_err(|e| file_error(e.error))?;
    Ok(stats)
}
