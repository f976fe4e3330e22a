//! requote-core: parse delimited text files and write them back with normalized quoting
//!
//! This library provides functionality to:
//! - Decode input in a configurable text encoding
//! - Parse delimited text (quoted fields, escapes, embedded line breaks) into a table
//! - Write tables back out under a quoting policy (minimal, all, none, non-numeric)
//! - Transcode single files atomically, or whole directory trees
//!
//! ```
//! use requote_core::{transcode_str, QuotingPolicy, TranscodeOptions};
//!
//! let options = TranscodeOptions {
//!     quoting: QuotingPolicy::NonNumeric,
//!     ..TranscodeOptions::default()
//! };
//! let out = transcode_str("name,amount\n\"ACME, Inc.\",12.5\n", &options).unwrap();
//! assert_eq!(out, "\"name\",\"amount\"\n\"ACME, Inc.\",12.5\n");
//! ```

pub mod dialect;
pub mod encoding;
pub mod error;
pub mod options;
pub mod parser;
pub mod table;
pub mod transcode;
pub mod tree;
pub mod writer;

pub use dialect::{Dialect, LineTerminator, QuotingPolicy};
pub use encoding::TextEncoding;
pub use error::{Error, Result};
pub use options::{ParseOptions, RaggedPolicy, TranscodeOptions};
pub use parser::{parse_bytes, parse_file, parse_str};
pub use table::{Record, Table};
pub use transcode::{transcode_bytes, transcode_file, transcode_str, TranscodeReport, TranscodeStats};
pub use tree::{scan_inputs, transcode_tree, TreeFailure, TreeReport, DEFAULT_EXTENSIONS};
pub use writer::{is_numeric_literal, write_table, write_table_to_string, WriteStats};
