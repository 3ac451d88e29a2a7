//! Precomputed dense side vectors (image and text embeddings).

use crate::error::{DataError, Result};
use crate::index::IdIndex;
use crate::table::Table;
use std::path::Path;
use std::sync::Arc;
use tracing::{info, warn};

/// Dense vectors aligned with an [`IdIndex`]: row `code` holds the vector
/// of the value with that code, zeros when the file had none.
#[derive(Debug, Clone, PartialEq)]
pub struct SideTable {
    dim: usize,
    data: Vec<f32>,
}

impl SideTable {
    pub fn zeros(rows: usize, dim: usize) -> Self {
        Self {
            dim,
            data: vec![0.0; rows * dim],
        }
    }

    /// Reads `key, v0..vN` rows; every non-key column is a vector component.
    pub fn read(path: &Path, key_column: &str, index: &IdIndex) -> Result<Self> {
        let table = Table::read(path, &[key_column])?;
        let table = Self::from_table(&table, key_column, index)?;
        info!(path = %path.display(), dim = table.dim, "Loaded side vectors");
        Ok(table)
    }

    pub fn from_table(table: &Table, key_column: &str, index: &IdIndex) -> Result<Self> {
        let key = table.column(key_column)?;
        let value_cols: Vec<usize> = (0..table.headers().len()).filter(|&c| c != key).collect();
        let dim = value_cols.len();
        let mut side = Self::zeros(index.len(), dim);
        let mut skipped = 0usize;
        for row in 0..table.len() {
            let Some(code) = index.get(table.value(row, key)) else {
                skipped += 1;
                continue;
            };
            let start = code as usize * dim;
            for (k, &col) in value_cols.iter().enumerate() {
                let raw = table.value(row, col);
                side.data[start + k] = raw.parse::<f32>().map_err(|_| DataError::Parse {
                    file: table.name().to_string(),
                    column: table.headers()[col].clone(),
                    value: raw.to_string(),
                })?;
            }
        }
        if skipped > 0 {
            warn!(file = table.name(), skipped, "Side vectors for unindexed keys ignored");
        }
        Ok(side)
    }

    pub fn dim(&self) -> usize {
        self.dim
    }

    pub fn rows(&self) -> usize {
        if self.dim == 0 {
            0
        } else {
            self.data.len() / self.dim
        }
    }

    pub fn row(&self, code: u32) -> &[f32] {
        let start = code as usize * self.dim;
        &self.data[start..start + self.dim]
    }
}

/// Dense input assembled per row by looking up field codes in side tables.
///
/// Each source pairs a field-vector column with a table; a row's dense
/// vector is the concatenation of every source's lookup.
#[derive(Debug, Clone, Default)]
pub struct DenseFeatures {
    sources: Vec<(usize, Arc<SideTable>)>,
}

impl DenseFeatures {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_source(mut self, field: usize, table: Arc<SideTable>) -> Self {
        self.sources.push((field, table));
        self
    }

    pub fn is_empty(&self) -> bool {
        self.sources.is_empty()
    }

    pub fn dim(&self) -> usize {
        self.sources.iter().map(|(_, t)| t.dim()).sum()
    }

    /// Appends the dense vector of `fields` to `out`.
    pub fn extend_row(&self, fields: &[u32], out: &mut Vec<f32>) {
        for (field, table) in &self.sources {
            out.extend_from_slice(table.row(fields[*field]));
        }
    }
}
