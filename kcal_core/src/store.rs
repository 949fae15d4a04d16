//! Tabular store boundary.
//!
//! The engine reads and writes named collections of string rows. Row 0 of
//! every collection is its header; callers skip it when iterating data.
//! Writes may be buffered until [`TabularStore::commit`].

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};

/// One row of cells
pub type Row = Vec<String>;

/// Address of a single cell
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct CellRef {
    pub collection: String,
    pub row: usize,
    pub column: usize,
}

/// Presentation hint attached to a cell (e.g. a colour name)
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StyleHint(pub String);

/// Tabular store trait for the ledger, profile and summary collections
pub trait TabularStore {
    fn has_collection(&self, collection: &str) -> bool;

    /// Create an empty collection holding only `header`. No-op if it exists.
    fn create_collection(&mut self, collection: &str, header: &[&str]) -> Result<()>;

    /// All rows, header included, in stored order
    fn read_all(&self, collection: &str) -> Result<Vec<Row>>;

    fn write_row(&mut self, collection: &str, row_index: usize, values: Row) -> Result<()>;

    fn append_row(&mut self, collection: &str, values: Row) -> Result<()>;

    fn annotate(&mut self, cell: CellRef, hint: StyleHint) -> Result<()>;

    fn annotation(&self, cell: &CellRef) -> Result<Option<StyleHint>>;

    /// Make buffered writes durable
    fn commit(&mut self) -> Result<()>;

    /// Drop buffered writes that were not committed
    fn discard(&mut self);

    /// Look up values in a two-column `field,value` collection.
    ///
    /// Returns one slot per requested field, `None` when the field is absent
    /// or its value is blank.
    fn read_fields(&self, collection: &str, fields: &[&str]) -> Result<Vec<Option<String>>> {
        let rows = self.read_all(collection)?;
        let values: HashMap<String, String> = rows
            .into_iter()
            .skip(1)
            .filter_map(|row| {
                let mut cells = row.into_iter();
                let field = cells.next()?.trim().to_string();
                let value = cells.next().unwrap_or_default();
                Some((field, value))
            })
            .collect();

        Ok(fields
            .iter()
            .map(|field| {
                values
                    .get(*field)
                    .filter(|value| !value.trim().is_empty())
                    .cloned()
            })
            .collect())
    }
}

/// A collection held in memory: rows plus cell annotations
#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq)]
pub struct Table {
    pub rows: Vec<Row>,
    #[serde(default)]
    pub styles: BTreeMap<String, StyleHint>,
}

impl Table {
    pub fn with_header(header: &[&str]) -> Self {
        Self {
            rows: vec![header.iter().map(|h| h.to_string()).collect()],
            styles: BTreeMap::new(),
        }
    }

    pub(crate) fn style_key(row: usize, column: usize) -> String {
        format!("{}:{}", row, column)
    }

    pub(crate) fn write_row(&mut self, collection: &str, row_index: usize, values: Row) -> Result<()> {
        let len = self.rows.len();
        let slot = self.rows.get_mut(row_index).ok_or_else(|| {
            Error::Other(format!(
                "row {} out of range for collection {} ({} rows)",
                row_index, collection, len
            ))
        })?;
        *slot = values;
        Ok(())
    }
}

/// In-process store, used by tests and by hosts that manage persistence themselves
#[derive(Clone, Debug, Default)]
pub struct MemoryStore {
    tables: HashMap<String, Table>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn table(&self, collection: &str) -> Option<&Table> {
        self.tables.get(collection)
    }

    fn table_mut(&mut self, collection: &str) -> Result<&mut Table> {
        self.tables
            .get_mut(collection)
            .ok_or_else(|| Error::MissingCollection(collection.to_string()))
    }
}

impl TabularStore for MemoryStore {
    fn has_collection(&self, collection: &str) -> bool {
        self.tables.contains_key(collection)
    }

    fn create_collection(&mut self, collection: &str, header: &[&str]) -> Result<()> {
        self.tables
            .entry(collection.to_string())
            .or_insert_with(|| Table::with_header(header));
        Ok(())
    }

    fn read_all(&self, collection: &str) -> Result<Vec<Row>> {
        self.tables
            .get(collection)
            .map(|table| table.rows.clone())
            .ok_or_else(|| Error::MissingCollection(collection.to_string()))
    }

    fn write_row(&mut self, collection: &str, row_index: usize, values: Row) -> Result<()> {
        self.table_mut(collection)?
            .write_row(collection, row_index, values)
    }

    fn append_row(&mut self, collection: &str, values: Row) -> Result<()> {
        self.table_mut(collection)?.rows.push(values);
        Ok(())
    }

    fn annotate(&mut self, cell: CellRef, hint: StyleHint) -> Result<()> {
        let table = self.table_mut(&cell.collection)?;
        table
            .styles
            .insert(Table::style_key(cell.row, cell.column), hint);
        Ok(())
    }

    fn annotation(&self, cell: &CellRef) -> Result<Option<StyleHint>> {
        let table = self
            .tables
            .get(&cell.collection)
            .ok_or_else(|| Error::MissingCollection(cell.collection.clone()))?;
        Ok(table
            .styles
            .get(&Table::style_key(cell.row, cell.column))
            .cloned())
    }

    fn commit(&mut self) -> Result<()> {
        Ok(())
    }

    // Writes land immediately; nothing is buffered
    fn discard(&mut self) {}
}
