//! Delimited text writer with configurable quoting

use crate::dialect::{Dialect, QuotingPolicy};
use crate::error::{Error, Result};
use crate::table::{Record, Table};
use serde::{Deserialize, Serialize};
use std::io::Write;
use tracing::debug;

/// Counters collected while writing a table
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WriteStats {
    /// Records written, header included
    pub records: usize,
    /// Fields written
    pub fields: usize,
    /// Fields wrapped in quote characters
    pub quoted_fields: usize,
    /// Bytes emitted after encoding
    pub bytes: usize,
}

/// Write a table to `writer` in the dialect's encoding
///
/// The header (if any) is written first. The writer is flushed but not
/// closed; opening and closing the destination is the caller's job.
pub fn write_table<W: Write>(
    mut writer: W,
    table: &Table,
    dialect: &Dialect,
    policy: QuotingPolicy,
) -> Result<WriteStats> {
    let formatter = RecordFormatter::new(dialect, policy)?;
    let mut encoder = dialect.encoding.output_encoder();
    let mut stats = WriteStats::default();
    let mut line = String::new();
    let mut bytes = Vec::new();

    for (i, record) in table.all_records().enumerate() {
        line.clear();
        bytes.clear();
        formatter.format_record(record, i + 1, stats.bytes, &mut line, &mut stats)?;
        encoder.encode(&line, i + 1, &mut bytes)?;
        writer.write_all(&bytes)?;
        stats.bytes += bytes.len();
    }

    bytes.clear();
    encoder.finish(stats.records, &mut bytes)?;
    writer.write_all(&bytes)?;
    stats.bytes += bytes.len();
    writer.flush()?;

    debug!(
        records = stats.records,
        quoted = stats.quoted_fields,
        bytes = stats.bytes,
        "wrote table"
    );
    Ok(stats)
}

/// Render a table as a `String`, ignoring the dialect's encoding
pub fn write_table_to_string(
    table: &Table,
    dialect: &Dialect,
    policy: QuotingPolicy,
) -> Result<String> {
    let formatter = RecordFormatter::new(dialect, policy)?;
    let mut stats = WriteStats::default();
    let mut out = String::new();

    for (i, record) in table.all_records().enumerate() {
        formatter.format_record(record, i + 1, out.len(), &mut out, &mut stats)?;
    }

    Ok(out)
}

/// Turns records into dialect-conformant text
struct RecordFormatter<'a> {
    dialect: &'a Dialect,
    policy: QuotingPolicy,
}

impl<'a> RecordFormatter<'a> {
    fn new(dialect: &'a Dialect, policy: QuotingPolicy) -> Result<Self> {
        dialect.validate()?;
        Ok(Self { dialect, policy })
    }

    /// Append one record plus line terminator to `out`
    ///
    /// `offset` is where the record starts in the output, for error reporting.
    fn format_record(
        &self,
        record: &Record,
        index: usize,
        offset: usize,
        out: &mut String,
        stats: &mut WriteStats,
    ) -> Result<()> {
        // a lone empty field would otherwise read back as a blank line
        let lone_empty = record.len() == 1 && record.fields[0].is_empty();

        for (field_index, field) in record.iter().enumerate() {
            if field_index > 0 {
                out.push(self.dialect.delimiter);
            }

            let quoted = self
                .format_field(field, lone_empty, out)
                .ok_or(Error::UnquotableField {
                    record: index,
                    field: field_index + 1,
                    offset,
                })?;

            stats.fields += 1;
            if quoted {
                stats.quoted_fields += 1;
            }
        }

        out.push_str(self.dialect.line_terminator.as_str());
        stats.records += 1;
        Ok(())
    }

    /// Append one field; `Some(quoted)` on success, `None` if it cannot be represented
    fn format_field(&self, field: &str, lone_empty: bool, out: &mut String) -> Option<bool> {
        let has_special = field.chars().any(|c| self.dialect.is_special(c));

        let quote = match self.policy {
            QuotingPolicy::All => true,
            QuotingPolicy::Minimal => has_special || lone_empty,
            QuotingPolicy::NonNumeric => has_special || !is_numeric_literal(field),
            QuotingPolicy::None => false,
        };

        if quote {
            self.push_quoted(field, out)?;
        } else {
            if lone_empty {
                return None;
            }
            self.push_escaped(field, out)?;
        }
        Some(quote)
    }

    fn push_quoted(&self, field: &str, out: &mut String) -> Option<()> {
        let d = self.dialect;
        out.push(d.quote);
        for ch in field.chars() {
            if ch == d.quote {
                if d.double_quote {
                    out.push(ch);
                } else {
                    out.push(d.escape?);
                }
            } else if Some(ch) == d.escape {
                out.push(ch);
            }
            out.push(ch);
        }
        out.push(d.quote);
        Some(())
    }

    fn push_escaped(&self, field: &str, out: &mut String) -> Option<()> {
        for ch in field.chars() {
            if self.dialect.is_special(ch) {
                out.push(self.dialect.escape?);
            }
            out.push(ch);
        }
        Some(())
    }
}

/// `[+-]? (digits [. digits*] | . digits) ([eE] [+-]? digits)?`, no whitespace
pub fn is_numeric_literal(s: &str) -> bool {
    let bytes = s.as_bytes();
    let mut i = 0;

    let skip_digits = |i: &mut usize| {
        let start = *i;
        while *i < bytes.len() && bytes[*i].is_ascii_digit() {
            *i += 1;
        }
        *i - start
    };

    if matches!(bytes.first(), Some(b'+' | b'-')) {
        i += 1;
    }

    let mut mantissa_digits = skip_digits(&mut i);
    if bytes.get(i) == Some(&b'.') {
        i += 1;
        mantissa_digits += skip_digits(&mut i);
    }
    if mantissa_digits == 0 {
        return false;
    }

    if matches!(bytes.get(i), Some(b'e' | b'E')) {
        i += 1;
        if matches!(bytes.get(i), Some(b'+' | b'-')) {
            i += 1;
        }
        if skip_digits(&mut i) == 0 {
            return false;
        }
    }

    i == bytes.len()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dialect::LineTerminator;
    use crate::encoding::TextEncoding;

    fn render(fields: &[&str], policy: QuotingPolicy) -> Result<String> {
        render_with(fields, &Dialect::default(), policy)
    }

    fn render_with(fields: &[&str], dialect: &Dialect, policy: QuotingPolicy) -> Result<String> {
        let mut table = Table::default();
        table.push(fields.iter().copied().collect());
        write_table_to_string(&table, dialect, policy)
    }

    #[test]
    fn test_minimal_quotes_only_when_needed() {
        assert_eq!(render(&["a,b", "ab"], QuotingPolicy::Minimal).unwrap(), "\"a,b\",ab\n");
        assert_eq!(render(&["line\nbreak"], QuotingPolicy::Minimal).unwrap(), "\"line\nbreak\"\n");
        assert_eq!(render(&["cr\rhere"], QuotingPolicy::Minimal).unwrap(), "\"cr\rhere\"\n");
    }

    #[test]
    fn test_minimal_doubles_quotes() {
        assert_eq!(render(&["a\"b"], QuotingPolicy::Minimal).unwrap(), "\"a\"\"b\"\n");
    }

    #[test]
    fn test_minimal_quotes_lone_empty_field() {
        assert_eq!(render(&[""], QuotingPolicy::Minimal).unwrap(), "\"\"\n");
        assert_eq!(render(&["", ""], QuotingPolicy::Minimal).unwrap(), ",\n");
    }

    #[test]
    fn test_all_quotes_everything() {
        assert_eq!(render(&["1", "x", ""], QuotingPolicy::All).unwrap(), "\"1\",\"x\",\"\"\n");
    }

    #[test]
    fn test_nonnumeric() {
        assert_eq!(
            render(&["42", "-1.5e3", "abc", "", " 7"], QuotingPolicy::NonNumeric).unwrap(),
            "42,-1.5e3,\"abc\",\"\",\" 7\"\n"
        );
    }

    #[test]
    fn test_none_without_escape_rejects_delimiter() {
        let err = render(&["ok", "a,b"], QuotingPolicy::None).unwrap_err();
        assert!(matches!(
            err,
            Error::UnquotableField {
                record: 1,
                field: 2,
                offset: 0
            }
        ));
    }

    #[test]
    fn test_unquotable_field_offset_counts_encoded_bytes() {
        let mut table = Table::default();
        table.push(["ok"].into_iter().collect());
        table.push(["caf\u{e9}"].into_iter().collect());
        table.push(["a,b"].into_iter().collect());

        let dialect = Dialect {
            encoding: TextEncoding::for_label("latin1").unwrap(),
            ..Dialect::default()
        };
        let err = write_table(Vec::new(), &table, &dialect, QuotingPolicy::None).unwrap_err();
        assert!(matches!(
            err,
            Error::UnquotableField {
                record: 3,
                field: 1,
                offset: 8
            }
        ));
    }

    #[test]
    fn test_none_plain_fields() {
        assert_eq!(render(&["a", "b c"], QuotingPolicy::None).unwrap(), "a,b c\n");
    }

    #[test]
    fn test_none_rejects_lone_empty_field() {
        assert!(render(&[""], QuotingPolicy::None).is_err());
    }

    #[test]
    fn test_none_with_escape() {
        let dialect = Dialect {
            escape: Some('\\'),
            ..Dialect::default()
        };
        assert_eq!(
            render_with(&["a,b", "c\"d", "e\\f"], &dialect, QuotingPolicy::None).unwrap(),
            "a\\,b,c\\\"d,e\\\\f\n"
        );
    }

    #[test]
    fn test_quote_escaped_when_not_doubling() {
        let dialect = Dialect {
            escape: Some('\\'),
            double_quote: false,
            ..Dialect::default()
        };
        assert_eq!(
            render_with(&["a\"b"], &dialect, QuotingPolicy::Minimal).unwrap(),
            "\"a\\\"b\"\n"
        );

        let dialect = Dialect {
            double_quote: false,
            ..Dialect::default()
        };
        assert!(render_with(&["a\"b"], &dialect, QuotingPolicy::Minimal).is_err());
    }

    #[test]
    fn test_crlf_terminator_and_custom_delimiter() {
        let dialect = Dialect {
            delimiter: ';',
            line_terminator: LineTerminator::CrLf,
            ..Dialect::default()
        };
        assert_eq!(
            render_with(&["a;b", "a,b"], &dialect, QuotingPolicy::Minimal).unwrap(),
            "\"a;b\";a,b\r\n"
        );
    }

    #[test]
    fn test_header_written_first() {
        let mut table = Table::with_header(["id", "name"].into_iter().collect());
        table.push(["1", "x"].into_iter().collect());
        let out = write_table_to_string(&table, &Dialect::default(), QuotingPolicy::Minimal)
            .unwrap();
        assert_eq!(out, "id,name\n1,x\n");
    }

    #[test]
    fn test_write_table_encodes_and_counts() {
        let mut table = Table::with_header(["name"].into_iter().collect());
        table.push(["café"].into_iter().collect());

        let dialect = Dialect {
            encoding: TextEncoding::for_label("latin1").unwrap(),
            ..Dialect::default()
        };
        let mut out = Vec::new();
        let stats = write_table(&mut out, &table, &dialect, QuotingPolicy::All).unwrap();

        assert_eq!(out, b"\"name\"\n\"caf\xE9\"\n");
        assert_eq!(stats.records, 2);
        assert_eq!(stats.fields, 2);
        assert_eq!(stats.quoted_fields, 2);
        assert_eq!(stats.bytes, out.len());
    }

    #[test]
    fn test_write_table_unencodable() {
        let mut table = Table::with_header(["name"].into_iter().collect());
        table.push(["☃"].into_iter().collect());

        let dialect = Dialect {
            encoding: TextEncoding::for_label("latin1").unwrap(),
            ..Dialect::default()
        };
        let err = write_table(Vec::new(), &table, &dialect, QuotingPolicy::Minimal).unwrap_err();
        assert!(matches!(err, Error::Unencodable { record: 2, .. }));
    }

    #[test]
    fn test_is_numeric_literal() {
        for yes in ["0", "42", "-7", "+3", "1.5", ".5", "5.", "1e9", "2.5E-3"] {
            assert!(is_numeric_literal(yes), "{yes} should be numeric");
        }
        for no in ["", "-", ".", "e5", "1e", "1.2.3", " 1", "1 ", "nan", "inf", "0x10", "1,000"] {
            assert!(!is_numeric_literal(no), "{no} should not be numeric");
        }
    }
}
