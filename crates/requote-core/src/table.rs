//! In-memory representation of a parsed delimited file

use serde::{Deserialize, Serialize};

/// One logical row: an ordered sequence of text fields
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Record {
    pub fields: Vec<String>,
}

impl Record {
    /// Create a record from its fields
    pub fn new(fields: Vec<String>) -> Self {
        Self { fields }
    }

    /// Number of fields
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Get a field by index
    pub fn get(&self, index: usize) -> Option<&str> {
        self.fields.get(index).map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.fields.iter().map(String::as_str)
    }
}

impl<S: Into<String>> FromIterator<S> for Record {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        Self::new(iter.into_iter().map(Into::into).collect())
    }
}

/// A parsed file: optional header plus data records
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Table {
    /// Column names, if the first record was designated a header
    pub header: Option<Record>,
    /// Data records in source order
    pub records: Vec<Record>,
}

impl Table {
    /// Create a table with a header row
    pub fn with_header(header: Record) -> Self {
        Self {
            header: Some(header),
            records: Vec::new(),
        }
    }

    /// Get the number of columns declared by the header
    pub fn column_count(&self) -> Option<usize> {
        self.header.as_ref().map(Record::len)
    }

    /// Get the number of data records
    pub fn row_count(&self) -> usize {
        self.records.len()
    }

    /// Find a column index by header name
    pub fn find_column(&self, name: &str) -> Option<usize> {
        self.header
            .as_ref()
            .and_then(|h| h.fields.iter().position(|f| f == name))
    }

    /// Header first (if any), then data records
    pub fn all_records(&self) -> impl Iterator<Item = &Record> {
        self.header.iter().chain(self.records.iter())
    }

    pub fn push(&mut self, record: Record) {
        self.records.push(record);
    }
}
