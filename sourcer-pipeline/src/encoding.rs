//! Frequency (ordinal) encoding of categorical columns
//!
//! Each column's distinct values are ranked by ascending frequency: rank 0 is
//! the least frequent value. Equal frequencies are ordered by the value
//! itself (byte-wise), so identical training data always yields an identical
//! mapping. Missing cells are never ranked; they, and any value not seen
//! during training, encode to [`OUT_OF_VOCABULARY`].

use crate::error::{PipelineError, PipelineResult};
use crate::table::Table;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};

/// Code for missing or unseen categories
pub const OUT_OF_VOCABULARY: i64 = -1;

/// Bijection between one column's values and their ranks
///
/// Persisted as the list of values in rank order, which is exactly the
/// value -> rank structure with no key conversion involved.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "Vec<String>", into = "Vec<String>")]
pub struct ColumnMapping {
    values: Vec<String>,
    index: HashMap<String, i64>,
}

impl From<Vec<String>> for ColumnMapping {
    fn from(values: Vec<String>) -> Self {
        let index = values
            .iter()
            .enumerate()
            .map(|(rank, value)| (value.clone(), rank as i64))
            .collect();
        Self { values, index }
    }
}

impl From<ColumnMapping> for Vec<String> {
    fn from(mapping: ColumnMapping) -> Self {
        mapping.values
    }
}

impl ColumnMapping {
    /// Rank of a value, or [`OUT_OF_VOCABULARY`]
    pub fn encode(&self, value: Option<&str>) -> i64 {
        value
            .and_then(|v| self.index.get(v).copied())
            .unwrap_or(OUT_OF_VOCABULARY)
    }

    /// Value holding a rank
    pub fn decode(&self, rank: i64) -> Option<&str> {
        usize::try_from(rank)
            .ok()
            .and_then(|r| self.values.get(r))
            .map(String::as_str)
    }

    /// Values in rank order
    pub fn values(&self) -> &[String] {
        &self.values
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

/// Mappings of every encoded column, keyed by column name
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EncodingMappings {
    columns: BTreeMap<String, ColumnMapping>,
}

impl EncodingMappings {
    pub fn get(&self, column: &str) -> PipelineResult<&ColumnMapping> {
        self.columns
            .get(column)
            .ok_or_else(|| PipelineError::MissingColumn(column.to_string()))
    }

    /// Encode the mapped columns of `table` with this (persisted) mapping
    pub fn apply(&self, table: &Table) -> PipelineResult<EncodedTable> {
        let mut positions = Vec::with_capacity(self.columns.len());
        for (name, mapping) in &self.columns {
            positions.push((table.column_index(name)?, mapping));
        }

        let rows = table
            .rows
            .iter()
            .map(|row| {
                positions
                    .iter()
                    .map(|(idx, mapping)| mapping.encode(row[*idx].as_deref()))
                    .collect()
            })
            .collect();

        Ok(EncodedTable {
            columns: self.columns.keys().cloned().collect(),
            rows,
        })
    }

    /// Original value for a rank; an unknown rank is an error, never a pass-through
    pub fn decode(&self, column: &str, rank: i64) -> PipelineResult<String> {
        self.get(column)?
            .decode(rank)
            .map(str::to_string)
            .ok_or_else(|| PipelineError::UnknownRank {
                column: column.to_string(),
                rank,
            })
    }

    pub fn to_json_bytes(&self) -> PipelineResult<Vec<u8>> {
        Ok(serde_json::to_vec(self)?)
    }

    pub fn from_json_bytes(bytes: &[u8]) -> PipelineResult<Self> {
        Ok(serde_json::from_slice(bytes)?)
    }
}

/// Integer-coded view of the encoded columns, row order preserved
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EncodedTable {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<i64>>,
}

impl EncodedTable {
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn column_index(&self, name: &str) -> PipelineResult<usize> {
        self.columns
            .iter()
            .position(|c| c == name)
            .ok_or_else(|| PipelineError::MissingColumn(name.to_string()))
    }

    /// Codes of one column
    pub fn column(&self, name: &str) -> PipelineResult<Vec<i64>> {
        let idx = self.column_index(name)?;
        Ok(self.rows.iter().map(|r| r[idx]).collect())
    }

    /// Feature matrix of the given columns, optionally restricted to some rows
    pub fn features(&self, columns: &[&str], rows: Option<&[usize]>) -> PipelineResult<Vec<Vec<i64>>> {
        let idx = columns
            .iter()
            .map(|c| self.column_index(c))
            .collect::<PipelineResult<Vec<_>>>()?;

        let project = |row: &Vec<i64>| idx.iter().map(|&i| row[i]).collect::<Vec<_>>();
        Ok(match rows {
            Some(selected) => selected.iter().map(|&r| project(&self.rows[r])).collect(),
            None => self.rows.iter().map(project).collect(),
        })
    }
}

/// Fit a frequency encoding on `columns` of `table` and encode it
pub fn frequency_encode(
    table: &Table,
    columns: &[&str],
) -> PipelineResult<(EncodedTable, EncodingMappings)> {
    let mut mappings = EncodingMappings::default();

    for &name in columns {
        let mut counts: BTreeMap<&str, usize> = BTreeMap::new();
        for value in table.column(name)?.into_iter().flatten() {
            *counts.entry(value).or_insert(0) += 1;
        }

        let mut ranked: Vec<(&str, usize)> = counts.into_iter().collect();
        // Stable sort over value-ordered input: ties keep ascending value order
        ranked.sort_by_key(|&(_, count)| count);

        let values = ranked.into_iter().map(|(v, _)| v.to_string()).collect::<Vec<_>>();
        mappings.columns.insert(name.to_string(), ColumnMapping::from(values));
    }

    let encoded = mappings.apply(table)?;
    Ok((encoded, mappings))
}
