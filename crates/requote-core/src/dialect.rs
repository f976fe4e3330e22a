//! Formatting rules for one end of a transcode: delimiter, quoting, line endings

use crate::encoding::TextEncoding;
use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Rule deciding which fields a writer wraps in quote characters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum QuotingPolicy {
    /// Quote only fields that would otherwise be misread
    #[default]
    Minimal,
    /// Quote every field
    All,
    /// Never quote; special characters are escaped instead
    None,
    /// Quote every field that is not a numeric literal
    NonNumeric,
}

impl FromStr for QuotingPolicy {
    type Err = String;

    /// Accepts kebab/snake names, `QUOTE_*` constants and their numeric values
    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        let normalized = s.trim().to_ascii_lowercase().replace('_', "-");
        let name = normalized.strip_prefix("quote-").unwrap_or(&normalized);
        match name {
            "minimal" | "0" => Ok(QuotingPolicy::Minimal),
            "all" | "1" => Ok(QuotingPolicy::All),
            "nonnumeric" | "non-numeric" | "2" => Ok(QuotingPolicy::NonNumeric),
            "none" | "3" => Ok(QuotingPolicy::None),
            _ => Err(format!("unknown quoting policy: {}", s)),
        }
    }
}

impl fmt::Display for QuotingPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            QuotingPolicy::Minimal => "minimal",
            QuotingPolicy::All => "all",
            QuotingPolicy::None => "none",
            QuotingPolicy::NonNumeric => "non-numeric",
        };
        f.write_str(name)
    }
}

/// Sequence written after every record
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LineTerminator {
    /// `\n`
    #[default]
    Lf,
    /// `\r\n`
    CrLf,
}

impl LineTerminator {
    pub fn as_str(&self) -> &'static str {
        match self {
            LineTerminator::Lf => "\n",
            LineTerminator::CrLf => "\r\n",
        }
    }
}

impl FromStr for LineTerminator {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "lf" | "\n" | "unix" => Ok(LineTerminator::Lf),
            "crlf" | "\r\n" | "windows" => Ok(LineTerminator::CrLf),
            _ => Err(format!("unknown line terminator: {}", s)),
        }
    }
}

/// Delimiter, quote, escape, line ending and encoding of a delimited file
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Dialect {
    /// Field separator
    pub delimiter: char,
    /// Character wrapping fields that contain special characters
    pub quote: char,
    /// Character making the next character literal, if any
    pub escape: Option<char>,
    /// Represent a quote inside a quoted field by doubling it
    pub double_quote: bool,
    /// Record terminator used when writing
    pub line_terminator: LineTerminator,
    /// Text encoding of the file
    pub encoding: TextEncoding,
}

impl Default for Dialect {
    fn default() -> Self {
        Self {
            delimiter: ',',
            quote: '"',
            escape: None,
            double_quote: true,
            line_terminator: LineTerminator::Lf,
            encoding: TextEncoding::default(),
        }
    }
}

impl Dialect {
    /// Tab-separated values with otherwise default settings
    pub fn tsv() -> Self {
        Self {
            delimiter: '\t',
            ..Self::default()
        }
    }

    /// Check that the special characters can be told apart
    pub fn validate(&self) -> Result<()> {
        let mut specials = vec![("delimiter", self.delimiter), ("quote", self.quote)];
        if let Some(escape) = self.escape {
            specials.push(("escape", escape));
        }

        for (name, ch) in &specials {
            if *ch == '\r' || *ch == '\n' {
                return Err(Error::InvalidDialect(format!(
                    "{} cannot be a line break character",
                    name
                )));
            }
        }

        for (i, (a_name, a)) in specials.iter().enumerate() {
            for (b_name, b) in &specials[i + 1..] {
                if a == b {
                    return Err(Error::InvalidDialect(format!(
                        "{} and {} are both {:?}",
                        a_name, b_name, a
                    )));
                }
            }
        }

        Ok(())
    }

    /// Whether `ch` would be misread if written unquoted and unescaped
    pub(crate) fn is_special(&self, ch: char) -> bool {
        ch == self.delimiter
            || ch == self.quote
            || ch == '\r'
            || ch == '\n'
            || Some(ch) == self.escape
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_quoting_policy_from_names() {
        assert_eq!("minimal".parse::<QuotingPolicy>(), Ok(QuotingPolicy::Minimal));
        assert_eq!("QUOTE_ALL".parse::<QuotingPolicy>(), Ok(QuotingPolicy::All));
        assert_eq!("quote_nonnumeric".parse::<QuotingPolicy>(), Ok(QuotingPolicy::NonNumeric));
        assert_eq!("non-numeric".parse::<QuotingPolicy>(), Ok(QuotingPolicy::NonNumeric));
        assert_eq!("None".parse::<QuotingPolicy>(), Ok(QuotingPolicy::None));
        assert!("sometimes".parse::<QuotingPolicy>().is_err());
    }

    #[test]
    fn test_quoting_policy_from_python_constants() {
        assert_eq!("0".parse::<QuotingPolicy>(), Ok(QuotingPolicy::Minimal));
        assert_eq!("1".parse::<QuotingPolicy>(), Ok(QuotingPolicy::All));
        assert_eq!("2".parse::<QuotingPolicy>(), Ok(QuotingPolicy::NonNumeric));
        assert_eq!("3".parse::<QuotingPolicy>(), Ok(QuotingPolicy::None));
    }

    #[test]
    fn test_quoting_policy_display_parses_back() {
        for policy in [
            QuotingPolicy::Minimal,
            QuotingPolicy::All,
            QuotingPolicy::None,
            QuotingPolicy::NonNumeric,
        ] {
            assert_eq!(policy.to_string().parse::<QuotingPolicy>(), Ok(policy));
        }
    }

    #[test]
    fn test_default_dialect_is_valid() {
        assert!(Dialect::default().validate().is_ok());
        assert!(Dialect::tsv().validate().is_ok());
    }

    #[test]
    fn test_dialect_rejects_shared_characters() {
        let dialect = Dialect {
            quote: ',',
            ..Dialect::default()
        };
        assert!(matches!(dialect.validate(), Err(Error::InvalidDialect(_))));

        let dialect = Dialect {
            escape: Some('"'),
            ..Dialect::default()
        };
        assert!(dialect.validate().is_err());
    }

    #[test]
    fn test_dialect_rejects_line_break_delimiter() {
        let dialect = Dialect {
            delimiter: '\n',
            ..Dialect::default()
        };
        assert!(dialect.validate().is_err());
    }

    #[test]
    fn test_dialect_json_uses_defaults() {
        let dialect: Dialect = serde_json::from_str(r#"{"delimiter": ";"}"#).unwrap();
        assert_eq!(dialect.delimiter, ';');
        assert_eq!(dialect.quote, '"');
        assert!(dialect.double_quote);
        assert_eq!(dialect.line_terminator, LineTerminator::Lf);
    }
}
