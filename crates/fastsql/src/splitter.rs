//! Structural split of a single-row INSERT statement
//!
//! This is deliberately not a SQL parser. It finds the `VALUES` keyword, the
//! parenthesized tuple that follows it and whatever comes after that tuple
//! (typically an upsert clause such as `ON DUPLICATE KEY UPDATE ...` or
//! `ON CONFLICT ... DO ...`). Callers must pass single-row INSERT statements.

use crate::error::{BatchError, Result};

const KEYWORD: &[u8] = b"values";

/// The reusable fragments of a single-row INSERT statement
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueryShape {
    prefix: String,
    values_template: String,
    trailing_clause: String,
}

impl QueryShape {
    /// Everything before the `VALUES` keyword, e.g. `INSERT INTO t(a, b)`
    ///
    /// Casing is preserved as written so case-sensitive identifiers survive.
    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    /// One row's placeholder tuple followed by a `,` separator, e.g. `(?, ?),`
    pub fn values_template(&self) -> &str {
        &self.values_template
    }

    /// Text after the value tuple without the statement terminator; empty if none
    pub fn trailing_clause(&self) -> &str {
        &self.trailing_clause
    }
}

/// Split `query` into its prefix, value-tuple template and trailing clause.
///
/// The keyword is matched case-insensitively, but every returned fragment
/// keeps the caller's original text.
pub fn split(query: &str) -> Result<QueryShape> {
    let statement = strip_terminator(query);
    let bytes = statement.as_bytes();

    let (keyword_at, open_at) = find_values_keyword(bytes)
        .ok_or_else(|| BatchError::malformed(query, "no VALUES ( ... ) clause found"))?;
    let close_at = find_matching_paren(bytes, open_at)
        .ok_or_else(|| BatchError::malformed(query, "VALUES tuple has no closing parenthesis"))?;

    let prefix = statement[..keyword_at].trim();
    if prefix.is_empty() {
        return Err(BatchError::malformed(query, "nothing precedes the VALUES keyword"));
    }

    let trailing_clause = statement[close_at + 1..].trim();
    if trailing_clause.starts_with(',') {
        return Err(BatchError::malformed(
            query,
            "statement already carries more than one value tuple",
        ));
    }

    let mut values_template = String::with_capacity(close_at - open_at + 2);
    values_template.push_str(&statement[open_at..=close_at]);
    values_template.push(',');

    Ok(QueryShape {
        prefix: prefix.to_string(),
        values_template,
        trailing_clause: trailing_clause.to_string(),
    })
}

fn strip_terminator(query: &str) -> &str {
    let trimmed = query.trim();
    trimmed.strip_suffix(';').map_or(trimmed, str::trim_end)
}

/// Locate the first standalone `VALUES` keyword outside quotes that is
/// followed by `(`. Returns the keyword offset and the `(` offset.
fn find_values_keyword(bytes: &[u8]) -> Option<(usize, usize)> {
    let mut quote: Option<u8> = None;
    let mut i = 0;

    while i < bytes.len() {
        let b = bytes[i];
        match quote {
            Some(q) => {
                if b == q {
                    quote = None;
                }
            }
            None if is_quote(b) => quote = Some(b),
            None if is_keyword_at(bytes, i) => {
                let mut j = i + KEYWORD.len();
                while j < bytes.len() && bytes[j].is_ascii_whitespace() {
                    j += 1;
                }
                if bytes.get(j) == Some(&b'(') {
                    return Some((i, j));
                }
            }
            None => {}
        }
        i += 1;
    }

    None
}

fn is_keyword_at(bytes: &[u8], at: usize) -> bool {
    let end = at + KEYWORD.len();
    if end > bytes.len() || !bytes[at..end].eq_ignore_ascii_case(KEYWORD) {
        return false;
    }
    let starts_word = at == 0 || !is_identifier_byte(bytes[at - 1]);
    let ends_word = end == bytes.len() || !is_identifier_byte(bytes[end]);
    starts_word && ends_word
}

/// Offset of the `)` closing the `(` at `open_at`, skipping nested
/// parentheses and anything inside quotes.
fn find_matching_paren(bytes: &[u8], open_at: usize) -> Option<usize> {
    let mut depth = 0usize;
    let mut quote: Option<u8> = None;

    for (offset, &b) in bytes[open_at..].iter().enumerate() {
        match quote {
            Some(q) if b == q => quote = None,
            Some(_) => {}
            None if is_quote(b) => quote = Some(b),
            None if b == b'(' => depth += 1,
            None if b == b')' => {
                depth -= 1;
                if depth == 0 {
                    return Some(open_at + offset);
                }
            }
            None => {}
        }
    }

    None
}

fn is_quote(b: u8) -> bool {
    matches!(b, b'\'' | b'"' | b'`')
}

fn is_identifier_byte(b: u8) -> bool {
    b.is_ascii_alphanumeric() || b == b'_' || b == b'$' || b >= 0x80
}
