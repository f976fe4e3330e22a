//! requote CLI
//!
//! Rewrites a delimited text file (or a tree of them) with normalized quoting.

use clap::{ArgAction, Parser};
use requote_core::{
    transcode_file, transcode_tree, LineTerminator, QuotingPolicy, RaggedPolicy, TextEncoding,
    TranscodeOptions, DEFAULT_EXTENSIONS,
};
use serde::Serialize;
use std::fs;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::str::FromStr;
use tracing::info;
use tracing_subscriber::EnvFilter;

/// Exit code for failures caused by the input data
const EXIT_DATA_ERROR: u8 = 1;
/// Exit code for I/O and configuration failures
const EXIT_ENV_ERROR: u8 = 2;
/// Exit code when some files of a recursive run failed
const EXIT_PARTIAL: u8 = 3;

#[derive(Parser, Debug)]
#[command(name = "transcode")]
#[command(about = "Rewrite delimited text files with normalized quoting", long_about = None)]
#[command(version)]
struct Cli {
    /// Input file (a directory with --recursive)
    input: PathBuf,

    /// Output file (a directory with --recursive); may equal the input
    output: PathBuf,

    /// Input field delimiter (a single character, or "tab")
    #[arg(short, long, value_parser = parse_char)]
    delimiter: Option<char>,

    /// Input quote character
    #[arg(long, value_parser = parse_char)]
    quote_char: Option<char>,

    /// Input escape character
    #[arg(long, value_parser = parse_char)]
    escape_char: Option<char>,

    /// Input text encoding (WHATWG label, e.g. utf-8, latin1, shift_jis)
    #[arg(long)]
    encoding: Option<String>,

    /// Output field delimiter (defaults to the input delimiter)
    #[arg(long, value_parser = parse_char)]
    output_delimiter: Option<char>,

    /// Output quote character (defaults to the input quote character)
    #[arg(long, value_parser = parse_char)]
    output_quote_char: Option<char>,

    /// Output escape character (defaults to the input escape character)
    #[arg(long, value_parser = parse_char)]
    output_escape_char: Option<char>,

    /// Output text encoding (defaults to the input encoding)
    #[arg(long)]
    output_encoding: Option<String>,

    /// Quoting policy: minimal, all, none, non-numeric (or QUOTE_* names, 0-3)
    #[arg(long, value_parser = QuotingPolicy::from_str)]
    quoting_policy: Option<QuotingPolicy>,

    /// Output line terminator: lf or crlf
    #[arg(long, value_parser = LineTerminator::from_str)]
    line_terminator: Option<LineTerminator>,

    /// Treat the first record as data rather than a header
    #[arg(long)]
    no_header: bool,

    /// Keep blank lines as empty records instead of dropping them
    #[arg(long)]
    keep_blank_lines: bool,

    /// Records whose width differs from the header: error, allow or pad
    #[arg(long, value_parser = RaggedPolicy::from_str)]
    ragged: Option<RaggedPolicy>,

    /// Reject stray quote characters instead of keeping them as data
    #[arg(long)]
    strict_quotes: bool,

    /// JSON file with transcode options; flags override its values
    #[arg(long)]
    config: Option<PathBuf>,

    /// Write the effective options to this JSON file
    #[arg(long)]
    save_config: Option<PathBuf>,

    /// Write a JSON report of the run to this file
    #[arg(long)]
    report: Option<PathBuf>,

    /// Transcode every matching file under the input directory
    #[arg(short, long)]
    recursive: bool,

    /// File extensions picked up with --recursive (default: csv, tsv)
    #[arg(long = "extension")]
    extensions: Vec<String>,

    /// More log output (-v info, -vv debug); RUST_LOG takes precedence
    #[arg(short, long, action = ArgAction::Count)]
    verbose: u8,

    /// Only print errors
    #[arg(short, long, conflicts_with = "verbose")]
    quiet: bool,
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.verbose, cli.quiet);

    match run(&cli) {
        Ok(code) => code,
        Err(e) => {
            eprintln!("Error: {}", e);
            if e.is_data_error() {
                ExitCode::from(EXIT_DATA_ERROR)
            } else {
                ExitCode::from(EXIT_ENV_ERROR)
            }
        }
    }
}

fn init_logging(verbose: u8, quiet: bool) {
    let level = match (quiet, verbose) {
        (true, _) => "error",
        (false, 0) => "warn",
        (false, 1) => "info",
        (false, _) => "debug",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}

fn run(cli: &Cli) -> requote_core::Result<ExitCode> {
    let options = build_options(cli)?;
    options.validate()?;

    if let Some(path) = &cli.save_config {
        options.save(path)?;
        info!(path = %path.display(), "saved options");
    }

    if cli.recursive {
        cmd_tree(cli, &options)
    } else {
        cmd_file(cli, &options)
    }
}

fn cmd_file(cli: &Cli, options: &TranscodeOptions) -> requote_core::Result<ExitCode> {
    let report = transcode_file(&cli.input, &cli.output, options)?;

    if !cli.quiet {
        println!(
            "Wrote {} records ({} of {} fields quoted) to {}",
            report.stats.records,
            report.stats.quoted_fields,
            report.stats.fields,
            report.output.display()
        );
    }

    write_report(cli.report.as_deref(), &report)?;
    Ok(ExitCode::SUCCESS)
}

fn cmd_tree(cli: &Cli, options: &TranscodeOptions) -> requote_core::Result<ExitCode> {
    let extensions: Vec<String> = if cli.extensions.is_empty() {
        DEFAULT_EXTENSIONS.iter().map(|e| e.to_string()).collect()
    } else {
        cli.extensions
            .iter()
            .map(|e| e.trim_start_matches('.').to_string())
            .collect()
    };

    let report = transcode_tree(&cli.input, &cli.output, options, &extensions)?;

    if !cli.quiet {
        println!(
            "Transcoded {} files ({} records) into {}",
            report.files.len(),
            report.total_records(),
            report.output_root.display()
        );
    }

    if !report.failures.is_empty() {
        eprintln!("\nErrors ({}):", report.failures.len());
        for failure in &report.failures {
            eprintln!("  {}: {}", failure.path.display(), failure.error);
        }
    }

    write_report(cli.report.as_deref(), &report)?;

    if report.is_success() {
        Ok(ExitCode::SUCCESS)
    } else {
        Ok(ExitCode::from(EXIT_PARTIAL))
    }
}

/// Merge the config file (if any) with command-line overrides
fn build_options(cli: &Cli) -> requote_core::Result<TranscodeOptions> {
    let mut options = match &cli.config {
        Some(path) => TranscodeOptions::load(path)?,
        None => TranscodeOptions::default(),
    };

    let input = &mut options.input;
    if let Some(delimiter) = cli.delimiter {
        input.delimiter = delimiter;
    }
    if let Some(quote) = cli.quote_char {
        input.quote = quote;
    }
    if cli.escape_char.is_some() {
        input.escape = cli.escape_char;
    }
    if let Some(label) = &cli.encoding {
        input.encoding = TextEncoding::for_label(label)?;
    }

    let output_overridden = cli.output_delimiter.is_some()
        || cli.output_quote_char.is_some()
        || cli.output_escape_char.is_some()
        || cli.output_encoding.is_some()
        || cli.line_terminator.is_some();

    if output_overridden {
        let mut output = options
            .output
            .clone()
            .unwrap_or_else(|| options.input.clone());

        if let Some(delimiter) = cli.output_delimiter {
            output.delimiter = delimiter;
        }
        if let Some(quote) = cli.output_quote_char {
            output.quote = quote;
        }
        if cli.output_escape_char.is_some() {
            output.escape = cli.output_escape_char;
        }
        if let Some(label) = &cli.output_encoding {
            output.encoding = TextEncoding::for_label(label)?;
        }
        if let Some(terminator) = cli.line_terminator {
            output.line_terminator = terminator;
        }
        options.output = Some(output);
    }

    if let Some(policy) = cli.quoting_policy {
        options.quoting = policy;
    }
    if cli.no_header {
        options.parse.has_header = false;
    }
    if cli.keep_blank_lines {
        options.parse.skip_blank_lines = false;
    }
    if let Some(ragged) = cli.ragged {
        options.parse.ragged = ragged;
    }
    if cli.strict_quotes {
        options.parse.strict_quotes = true;
    }

    Ok(options)
}

fn write_report<T: Serialize>(path: Option<&Path>, report: &T) -> requote_core::Result<()> {
    let Some(path) = path else {
        return Ok(());
    };

    let json = serde_json::to_string_pretty(report)?;
    fs::write(path, json).map_err(|e| requote_core::Error::FileWrite {
        path: path.to_path_buf(),
        source: e,
    })?;
    info!(path = %path.display(), "wrote report");
    Ok(())
}

/// A single character, or a name for an awkward one
fn parse_char(s: &str) -> Result<char, String> {
    match s {
        "\\t" | "tab" | "TAB" => return Ok('\t'),
        "space" => return Ok(' '),
        _ => {}
    }

    let mut chars = s.chars();
    match (chars.next(), chars.next()) {
        (Some(c), None) => Ok(c),
        _ => Err(format!("expected a single character, got '{}'", s)),
    }
}
