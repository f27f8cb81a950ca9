//! Decoder for the query endpoint's CSV dialect
//!
//! Lines starting with `#` are annotations and are skipped along with blank
//! lines. The first remaining line is the header. Data rows are zipped
//! positionally against it; short rows simply lack the trailing columns and
//! surplus values are ignored. Rows are never rejected.

use std::collections::HashMap;

/// One decoded data row: column name to raw string value.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct QueryRow {
    values: HashMap<String, String>,
}

impl QueryRow {
    pub fn from_pairs<K, V>(pairs: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: Into<String>,
        V: Into<String>,
    {
        Self {
            values: pairs
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }

    /// Raw value of `column`, or `None` if the row had no value for it.
    pub fn get(&self, column: &str) -> Option<&str> {
        self.values.get(column).map(String::as_str)
    }

    pub fn contains(&self, column: &str) -> bool {
        self.values.contains_key(column)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn columns(&self) -> impl Iterator<Item = &str> {
        self.values.keys().map(String::as_str)
    }
}

/// Decode a CSV response body into rows.
pub fn parse_csv(text: &str) -> Vec<QueryRow> {
    let mut header: Option<Vec<String>> = None;
    let mut rows = Vec::new();

    for line in text.lines() {
        let line = line.strip_suffix('\r').unwrap_or(line);
        if line.is_empty() || line.starts_with('#') {
            continue;
        }

        let values = split_line(line);
        match &header {
            None => header = Some(values),
            Some(columns) => rows.push(QueryRow {
                values: columns.iter().cloned().zip(values).collect(),
            }),
        }
    }

    rows
}

/// Split one CSV line on commas, honouring double-quote quoting. A doubled
/// quote inside a quoted section is a literal quote.
pub fn split_line(line: &str) -> Vec<String> {
    let mut fields = Vec::new();
    let mut current = String::new();
    let mut in_quotes = false;
    let mut chars = line.chars().peekable();

    while let Some(c) = chars.next() {
        match c {
            '"' if in_quotes && chars.peek() == Some(&'"') => {
                current.push('"');
                chars.next();
            }
            '"' => in_quotes = !in_quotes,
            ',' if !in_quotes => fields.push(std::mem::take(&mut current)),
            _ => current.push(c),
        }
    }

    fields.push(current);
    fields
}
