//! Delimited text parser
//!
//! A single pass, character-at-a-time scanner. Quoted fields may contain
//! delimiters, doubled or escaped quote characters and line breaks; the
//! latter are data, not record separators. `\n`, `\r\n` and a bare `\r`
//! all end a record outside quotes.
//!
//! Positions in errors are 1-based record numbers (the header counts as
//! record 1), 1-based line numbers and byte offsets into the decoded text.

use crate::dialect::Dialect;
use crate::error::{Error, Result};
use crate::options::{ParseOptions, RaggedPolicy};
use crate::table::{Record, Table};
use std::fs;
use std::iter::Peekable;
use std::path::Path;
use std::str::CharIndices;
use tracing::{debug, warn};

/// Parse a file, decoding it with the dialect's encoding
pub fn parse_file<P: AsRef<Path>>(
    path: P,
    dialect: &Dialect,
    options: &ParseOptions,
) -> Result<Table> {
    let path = path.as_ref();
    let bytes = fs::read(path).map_err(|e| Error::FileRead {
        path: path.to_path_buf(),
        source: e,
    })?;
    debug!(path = %path.display(), bytes = bytes.len(), "read input file");
    parse_bytes(&bytes, dialect, options)
}

/// Decode raw bytes with the dialect's encoding, then parse them
pub fn parse_bytes(bytes: &[u8], dialect: &Dialect, options: &ParseOptions) -> Result<Table> {
    dialect.validate()?;

    let text = dialect.encoding.decode(bytes).map_err(|e| {
        // records that ended before the bad byte are numbered as the parser would
        let mut scanner = Scanner::new(dialect, options);
        let _ = scanner.feed(&e.valid_prefix);
        Error::Encoding {
            encoding: dialect.encoding.name().to_string(),
            record: scanner.records.len() + 1,
            offset: e.offset,
        }
    })?;
    parse_str(&text, dialect, options)
}

/// Parse already-decoded text into a table
pub fn parse_str(text: &str, dialect: &Dialect, options: &ParseOptions) -> Result<Table> {
    dialect.validate()?;

    let raw = Scanner::new(dialect, options).run(text)?;
    debug!(records = raw.len(), "scanned input");

    let mut table = Table::default();
    let mut raw = raw.into_iter();

    if options.has_header {
        table.header = raw.next().map(|r| Record::new(r.fields));
    }

    let expected = table.column_count();
    for (i, raw_record) in raw.enumerate() {
        let mut fields = raw_record.fields;
        let record = i + if expected.is_some() { 2 } else { 1 };

        // kept blank lines carry no fields and are not held to the header width
        if let Some(expected) = expected.filter(|_| !fields.is_empty()) {
            if fields.len() != expected {
                match options.ragged {
                    RaggedPolicy::Error => {
                        return Err(Error::RaggedRecord {
                            record,
                            line: raw_record.line,
                            offset: raw_record.offset,
                            expected,
                            found: fields.len(),
                        });
                    }
                    RaggedPolicy::Allow => {}
                    RaggedPolicy::Pad => {
                        warn!(
                            record,
                            line = raw_record.line,
                            expected,
                            found = fields.len(),
                            "record width differs from header, padding or truncating"
                        );
                        fields.resize(expected, String::new());
                    }
                }
            }
        }

        table.push(Record::new(fields));
    }

    Ok(table)
}

/// A record as scanned, before header and width handling
#[derive(Debug)]
struct RawRecord {
    fields: Vec<String>,
    /// Line on which the record starts
    line: usize,
    /// Byte offset of the record's first character
    offset: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    /// Nothing consumed for the current record yet
    StartRecord,
    /// Just after a delimiter
    StartField,
    /// Inside an unquoted field
    Unquoted,
    /// Inside a quoted field
    Quoted,
    /// Saw a quote character while inside a quoted field
    QuoteInQuoted,
    /// Saw the escape character outside quotes
    EscapeUnquoted,
    /// Saw the escape character inside quotes
    EscapeQuoted,
}

struct Scanner<'a> {
    dialect: &'a Dialect,
    options: &'a ParseOptions,
    state: State,
    field: String,
    fields: Vec<String>,
    records: Vec<RawRecord>,
    line: usize,
    record_line: usize,
    record_offset: usize,
    /// Line and offset of the quote that opened the current quoted field
    quote_start: (usize, usize),
}

impl<'a> Scanner<'a> {
    fn new(dialect: &'a Dialect, options: &'a ParseOptions) -> Self {
        Self {
            dialect,
            options,
            state: State::StartRecord,
            field: String::new(),
            fields: Vec::new(),
            records: Vec::new(),
            line: 1,
            record_line: 1,
            record_offset: 0,
            quote_start: (1, 0),
        }
    }

    fn run(mut self, text: &str) -> Result<Vec<RawRecord>> {
        self.feed(text)?;
        self.finish(text.len())?;
        Ok(self.records)
    }

    /// Scan `text` without closing the record in progress at its end
    fn feed(&mut self, text: &str) -> Result<()> {
        let mut chars = text.char_indices().peekable();

        while let Some((offset, ch)) = chars.next() {
            if self.state == State::StartRecord {
                self.record_offset = offset;
            }
            let crlf = ch == '\r' && matches!(chars.peek(), Some((_, '\n')));
            let swallowed_lf = self.step(offset, ch, &mut chars)?;

            // a \r\n pair is one line break
            if ch == '\n' || (ch == '\r' && (!crlf || swallowed_lf)) {
                self.line += 1;
            }
        }

        Ok(())
    }

    /// Consume one character; returns true if it also consumed the `\n` of a `\r\n`
    fn step(
        &mut self,
        offset: usize,
        ch: char,
        chars: &mut Peekable<CharIndices<'_>>,
    ) -> Result<bool> {
        let d = self.dialect;
        let is_break = ch == '\n' || ch == '\r';
        let mut swallowed_lf = false;

        match self.state {
            State::StartRecord | State::StartField => {
                if ch == d.quote {
                    self.quote_start = (self.line, offset);
                    self.state = State::Quoted;
                } else if ch == d.delimiter {
                    self.end_field();
                    self.state = State::StartField;
                } else if is_break {
                    swallowed_lf = consume_crlf(ch, chars);
                    if self.state == State::StartRecord {
                        self.blank_line();
                    } else {
                        self.end_record();
                    }
                } else if Some(ch) == d.escape {
                    self.state = State::EscapeUnquoted;
                } else {
                    self.field.push(ch);
                    self.state = State::Unquoted;
                }
            }
            State::Unquoted => {
                if ch == d.delimiter {
                    self.end_field();
                    self.state = State::StartField;
                } else if is_break {
                    swallowed_lf = consume_crlf(ch, chars);
                    self.end_record();
                } else if Some(ch) == d.escape {
                    self.state = State::EscapeUnquoted;
                } else if ch == d.quote && self.options.strict_quotes {
                    return Err(self.malformed(offset, "quote character inside unquoted field"));
                } else {
                    self.field.push(ch);
                }
            }
            State::Quoted => {
                if ch == d.quote {
                    self.state = State::QuoteInQuoted;
                } else if Some(ch) == d.escape {
                    self.state = State::EscapeQuoted;
                } else {
                    self.field.push(ch);
                }
            }
            State::QuoteInQuoted => {
                if ch == d.quote && d.double_quote {
                    self.field.push(ch);
                    self.state = State::Quoted;
                } else if ch == d.delimiter {
                    self.end_field();
                    self.state = State::StartField;
                } else if is_break {
                    swallowed_lf = consume_crlf(ch, chars);
                    self.end_record();
                } else if self.options.strict_quotes {
                    return Err(self.malformed(offset, "unexpected character after closing quote"));
                } else {
                    self.field.push(ch);
                    self.state = State::Unquoted;
                }
            }
            State::EscapeUnquoted => {
                self.field.push(ch);
                self.state = State::Unquoted;
            }
            State::EscapeQuoted => {
                self.field.push(ch);
                self.state = State::Quoted;
            }
        }

        Ok(swallowed_lf)
    }

    fn finish(&mut self, end: usize) -> Result<()> {
        match self.state {
            State::StartRecord => {}
            State::Quoted | State::EscapeQuoted => {
                let (line, offset) = self.quote_start;
                return Err(Error::Malformed {
                    record: self.records.len() + 1,
                    line,
                    offset,
                    message: "unterminated quoted field".to_string(),
                });
            }
            State::EscapeUnquoted => {
                return Err(self.malformed(end, "escape character at end of input"));
            }
            State::StartField | State::Unquoted | State::QuoteInQuoted => self.end_record(),
        }
        Ok(())
    }

    fn end_field(&mut self) {
        self.fields.push(std::mem::take(&mut self.field));
    }

    fn end_record(&mut self) {
        self.end_field();
        self.records.push(RawRecord {
            fields: std::mem::take(&mut self.fields),
            line: self.record_line,
            offset: self.record_offset,
        });
        self.start_next_record();
    }

    fn blank_line(&mut self) {
        if !self.options.skip_blank_lines {
            self.records.push(RawRecord {
                fields: Vec::new(),
                line: self.record_line,
                offset: self.record_offset,
            });
        }
        self.start_next_record();
    }

    fn start_next_record(&mut self) {
        self.state = State::StartRecord;
        // the terminator's own line increment happens after this step
        self.record_line = self.line + 1;
    }

    fn malformed(&self, offset: usize, message: &str) -> Error {
        Error::Malformed {
            record: self.records.len() + 1,
            line: self.line,
            offset,
            message: message.to_string(),
        }
    }
}

/// Swallow the `\n` of a `\r\n` pair so it does not end a second record
fn consume_crlf(ch: char, chars: &mut Peekable<CharIndices<'_>>) -> bool {
    if ch == '\r' && matches!(chars.peek(), Some((_, '\n'))) {
        chars.next();
        true
    } else {
        false
    }
}
