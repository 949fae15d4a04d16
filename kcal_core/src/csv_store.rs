//! CSV-backed tabular store.
//!
//! Each collection lives in `<dir>/<collection>.csv`, its cell annotations in
//! `<dir>/<collection>.styles.json`. Writes are buffered in memory and only
//! reach disk on [`TabularStore::commit`], where every touched file is
//! replaced atomically:
//! 1. Write to a temp file in the same directory
//! 2. Sync to disk
//! 3. Rename over the original
//!
//! A pipeline that fails before committing therefore leaves the files as
//! they were.

use crate::store::{CellRef, Row, StyleHint, TabularStore, Table};
use crate::{Error, Result};
use fs2::FileExt;
use std::collections::{BTreeMap, HashMap};
use std::fs::File;
use std::io::{BufReader, Read, Write};
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;

/// Directory of CSV files, one per collection
pub struct CsvStore {
    dir: PathBuf,
    pending: HashMap<String, Table>,
}

impl CsvStore {
    /// Create a store rooted at `dir`; nothing is touched until a read or commit
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            pending: HashMap::new(),
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn collection_path(&self, collection: &str) -> PathBuf {
        self.dir.join(format!("{}.csv", collection))
    }

    pub fn styles_path(&self, collection: &str) -> PathBuf {
        self.dir.join(format!("{}.styles.json", collection))
    }

    /// True if there are buffered writes not yet committed
    pub fn is_dirty(&self) -> bool {
        !self.pending.is_empty()
    }

    fn load_table(&self, collection: &str) -> Result<Table> {
        let path = self.collection_path(collection);
        if !path.exists() {
            return Err(Error::MissingCollection(collection.to_string()));
        }

        let rows = read_rows(&path)?;
        let styles = read_styles(&self.styles_path(collection))?;
        Ok(Table { rows, styles })
    }

    /// Buffered copy of a collection, loaded from disk on first write
    fn staged(&mut self, collection: &str) -> Result<&mut Table> {
        if !self.pending.contains_key(collection) {
            let table = self.load_table(collection)?;
            self.pending.insert(collection.to_string(), table);
        }
        self.pending
            .get_mut(collection)
            .ok_or_else(|| Error::MissingCollection(collection.to_string()))
    }

    fn persist_table(&self, collection: &str, table: &Table) -> Result<()> {
        std::fs::create_dir_all(&self.dir)?;

        // Both files are fully written and synced before either is renamed
        let rows = NamedTempFile::new_in(&self.dir)?;
        // Exclusive lock serializes writers racing on the same directory
        rows.as_file().lock_exclusive()?;
        {
            let mut writer = csv::WriterBuilder::new()
                .flexible(true)
                .from_writer(std::io::BufWriter::new(rows.as_file()));
            for row in &table.rows {
                writer.write_record(row)?;
            }
            writer.flush()?;
        }
        rows.as_file().sync_all()?;

        let styles_path = self.styles_path(collection);
        let styles = if !table.styles.is_empty() || styles_path.exists() {
            let temp = NamedTempFile::new_in(&self.dir)?;
            {
                let mut writer = std::io::BufWriter::new(temp.as_file());
                let contents = serde_json::to_string(&table.styles)?;
                writer.write_all(contents.as_bytes())?;
                writer.flush()?;
            }
            temp.as_file().sync_all()?;
            Some(temp)
        } else {
            None
        };

        rows.as_file().unlock()?;
        rows.persist(self.collection_path(collection))
            .map_err(|e| Error::Io(e.error))?;
        if let Some(temp) = styles {
            temp.persist(&styles_path).map_err(|e| Error::Io(e.error))?;
        }

        tracing::debug!(
            "Saved collection {} ({} rows) to {:?}",
            collection,
            table.rows.len(),
            self.dir
        );
        Ok(())
    }
}

fn read_rows(path: &Path) -> Result<Vec<Row>> {
    let file = File::open(path)?;
    // Acquire shared lock for reading
    file.lock_shared()?;

    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .from_reader(BufReader::new(&file));

    let mut rows = Vec::new();
    for record in reader.records() {
        match record {
            Ok(record) => rows.push(record.iter().map(str::to_string).collect()),
            Err(e) => {
                file.unlock()?;
                return Err(e.into());
            }
        }
    }

    file.unlock()?;
    Ok(rows)
}

fn read_styles(path: &Path) -> Result<BTreeMap<String, StyleHint>> {
    if !path.exists() {
        return Ok(BTreeMap::new());
    }

    let mut contents = String::new();
    File::open(path)?.read_to_string(&mut contents)?;
    match serde_json::from_str(&contents) {
        Ok(styles) => Ok(styles),
        Err(e) => {
            // Annotations are presentation only; they are rebuilt on the next upsert
            tracing::warn!("Failed to parse styles file {:?}: {}. Ignoring.", path, e);
            Ok(BTreeMap::new())
        }
    }
}

impl TabularStore for CsvStore {
    fn has_collection(&self, collection: &str) -> bool {
        self.pending.contains_key(collection) || self.collection_path(collection).exists()
    }

    fn create_collection(&mut self, collection: &str, header: &[&str]) -> Result<()> {
        if self.has_collection(collection) {
            return Ok(());
        }
        self.pending
            .insert(collection.to_string(), Table::with_header(header));
        Ok(())
    }

    fn read_all(&self, collection: &str) -> Result<Vec<Row>> {
        if let Some(table) = self.pending.get(collection) {
            return Ok(table.rows.clone());
        }
        let rows = read_rows(&self.collection_path(collection)).map_err(|e| match e {
            Error::Io(io) if io.kind() == std::io::ErrorKind::NotFound => {
                Error::MissingCollection(collection.to_string())
            }
            other => other,
        })?;
        tracing::debug!("Read {} rows from collection {}", rows.len(), collection);
        Ok(rows)
    }

    fn write_row(&mut self, collection: &str, row_index: usize, values: Row) -> Result<()> {
        self.staged(collection)?
            .write_row(collection, row_index, values)
    }

    fn append_row(&mut self, collection: &str, values: Row) -> Result<()> {
        self.staged(collection)?.rows.push(values);
        Ok(())
    }

    fn annotate(&mut self, cell: CellRef, hint: StyleHint) -> Result<()> {
        let table = self.staged(&cell.collection)?;
        table
            .styles
            .insert(Table::style_key(cell.row, cell.column), hint);
        Ok(())
    }

    fn annotation(&self, cell: &CellRef) -> Result<Option<StyleHint>> {
        let key = Table::style_key(cell.row, cell.column);
        if let Some(table) = self.pending.get(&cell.collection) {
            return Ok(table.styles.get(&key).cloned());
        }
        if !self.collection_path(&cell.collection).exists() {
            return Err(Error::MissingCollection(cell.collection.clone()));
        }
        Ok(read_styles(&self.styles_path(&cell.collection))?.remove(&key))
    }

    fn commit(&mut self) -> Result<()> {
        let mut collections: Vec<_> = self.pending.keys().cloned().collect();
        collections.sort();

        for collection in &collections {
            if let Some(table) = self.pending.get(collection) {
                self.persist_table(collection, table)?;
            }
        }

        if !collections.is_empty() {
            tracing::info!("Committed {} collections", collections.len());
        }
        self.pending.clear();
        Ok(())
    }

    fn discard(&mut self) {
        if !self.pending.is_empty() {
            tracing::debug!("Discarding {} uncommitted collections", self.pending.len());
        }
        self.pending.clear();
    }
}
