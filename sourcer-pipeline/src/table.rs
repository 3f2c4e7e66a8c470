//! Tabular datasets exchanged between stages
//!
//! Every cell is text or missing. Row order is meaningful: it is the row
//! identity the predictor preserves when reassembling results.

use crate::error::{PipelineError, PipelineResult};
use serde::{Deserialize, Serialize};

/// A single value; `None` is a missing (NULL) cell
pub type Cell = Option<String>;

/// Column-named rows of text cells
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Table {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<Cell>>,
}

impl Table {
    /// Create an empty table with the given columns
    pub fn new<S: Into<String>>(columns: impl IntoIterator<Item = S>) -> Self {
        Self {
            columns: columns.into_iter().map(Into::into).collect(),
            rows: Vec::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Append a row; its width must match the column count
    pub fn push_row(&mut self, row: Vec<Cell>) -> PipelineResult<()> {
        if row.len() != self.columns.len() {
            return Err(PipelineError::Common(sourcer_common::Error::InvalidInput(format!(
                "row has {} cells, table has {} columns",
                row.len(),
                self.columns.len()
            ))));
        }
        self.rows.push(row);
        Ok(())
    }

    /// Position of a column
    pub fn column_index(&self, name: &str) -> PipelineResult<usize> {
        self.columns
            .iter()
            .position(|c| c == name)
            .ok_or_else(|| PipelineError::MissingColumn(name.to_string()))
    }

    /// Values of one column, top to bottom
    pub fn column(&self, name: &str) -> PipelineResult<Vec<Option<&str>>> {
        let idx = self.column_index(name)?;
        Ok(self.rows.iter().map(|r| r[idx].as_deref()).collect())
    }

    /// Split rows by a predicate into (matching, rest), both order-preserving
    pub fn partition<F>(&self, mut predicate: F) -> (Table, Table)
    where
        F: FnMut(&[Cell]) -> bool,
    {
        let (matching, rest): (Vec<_>, Vec<_>) =
            self.rows.iter().cloned().partition(|row| predicate(row));
        (
            Table { columns: self.columns.clone(), rows: matching },
            Table { columns: self.columns.clone(), rows: rest },
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cell(v: &str) -> Cell {
        Some(v.to_string())
    }

    fn sample() -> Table {
        let mut t = Table::new(["id", "label"]);
        t.push_row(vec![cell("1"), cell("A")]).unwrap();
        t.push_row(vec![cell("2"), None]).unwrap();
        t.push_row(vec![cell("3"), cell("B")]).unwrap();
        t
    }

    #[test]
    fn test_push_row_checks_width() {
        let mut t = Table::new(["a", "b"]);
        assert!(t.push_row(vec![cell("x")]).is_err());
        assert!(t.is_empty());
    }

    #[test]
    fn test_partition_preserves_order() {
        let t = sample();
        let label = t.column_index("label").unwrap();
        let (labeled, unlabeled) = t.partition(|row| row[label].is_some());

        assert_eq!(labeled.column("id").unwrap(), vec![Some("1"), Some("3")]);
        assert_eq!(unlabeled.column("id").unwrap(), vec![Some("2")]);
    }

    #[test]
    fn test_missing_column() {
        let t = sample();
        assert!(matches!(
            t.column_index("nope"),
            Err(PipelineError::MissingColumn(name)) if name == "nope"
        ));
    }

    #[test]
    fn test_json_keeps_missing_cells() {
        let t = sample();
        let back: Table = serde_json::from_slice(&serde_json::to_vec(&t).unwrap()).unwrap();
        assert_eq!(back, t);
        assert_eq!(back.rows[1][1], None);
    }
}
