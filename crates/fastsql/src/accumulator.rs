//! Per-statement row buffer

use fastsql_core::Value;

use crate::error::{BatchError, Result};
use crate::splitter::{QueryShape, split};

/// Start of the accumulated values text; each buffered row appends one tuple.
const VALUES_CLAUSE: &str = " VALUES";

/// Buffers rows for one distinct INSERT statement until they are flushed.
///
/// The statement is split into a [`QueryShape`] the first time it is needed
/// and that shape is kept for the lifetime of the accumulator, across any
/// number of flushes.
#[derive(Debug)]
pub struct BatchAccumulator {
    query: String,
    shape: Option<QueryShape>,
    pending_params: Vec<Value>,
    values: String,
    row_count: usize,
    columns_per_row: Option<usize>,
}

impl BatchAccumulator {
    /// Create an empty accumulator for `query`. No parsing happens yet.
    pub fn new(query: impl Into<String>) -> Self {
        Self {
            query: query.into(),
            shape: None,
            pending_params: Vec::new(),
            values: VALUES_CLAUSE.to_string(),
            row_count: 0,
            columns_per_row: None,
        }
    }

    /// The single-row statement this accumulator batches
    pub fn query(&self) -> &str {
        &self.query
    }

    /// The statement's split fragments, computed on first use
    pub fn shape(&mut self) -> Result<&QueryShape> {
        let shape = match self.shape.take() {
            Some(shape) => shape,
            None => split(&self.query)?,
        };
        Ok(self.shape.insert(shape))
    }

    /// The shape if it has already been computed
    pub fn cached_shape(&self) -> Option<&QueryShape> {
        self.shape.as_ref()
    }

    /// Buffer one row.
    ///
    /// The first row fixes how many parameters every later row must carry.
    /// On error nothing is buffered.
    pub fn accumulate(&mut self, params: &[Value]) -> Result<()> {
        if let Some(expected) = self.columns_per_row
            && expected != params.len()
        {
            return Err(BatchError::ParameterCountMismatch {
                query: self.query.clone(),
                expected,
                actual: params.len(),
            });
        }

        self.shape()?;
        if let Some(shape) = &self.shape {
            self.values.push_str(shape.values_template());
        }
        self.pending_params.extend_from_slice(params);
        self.row_count += 1;
        self.columns_per_row.get_or_insert(params.len());
        Ok(())
    }

    /// Drop every buffered row. The shape and per-row parameter count survive.
    pub fn reset(&mut self) {
        self.pending_params.clear();
        self.values.truncate(VALUES_CLAUSE.len());
        self.row_count = 0;
    }

    /// The multi-row INSERT for everything currently buffered, or `None`
    /// when no rows are pending.
    pub fn build_collapsed_statement(&self) -> Option<String> {
        let shape = self.shape.as_ref()?;
        if self.row_count == 0 {
            return None;
        }

        let values = self.values.strip_suffix(',').unwrap_or(&self.values);
        let trailing = shape.trailing_clause();

        let mut sql = String::with_capacity(shape.prefix().len() + values.len() + trailing.len() + 1);
        sql.push_str(shape.prefix());
        sql.push_str(values);
        if !trailing.is_empty() {
            sql.push(' ');
            sql.push_str(trailing);
        }
        Some(sql)
    }

    /// Number of buffered rows
    pub fn row_count(&self) -> usize {
        self.row_count
    }

    /// Whether no rows are buffered
    pub fn is_empty(&self) -> bool {
        self.row_count == 0
    }

    /// Buffered parameters, row by row in insertion order
    pub fn pending_params(&self) -> &[Value] {
        &self.pending_params
    }

    /// Accumulated `VALUES` text including the trailing separator
    pub fn values_text(&self) -> &str {
        &self.values
    }

    /// Parameters per row, fixed by the first accumulated row
    pub fn columns_per_row(&self) -> Option<usize> {
        self.columns_per_row
    }
}
