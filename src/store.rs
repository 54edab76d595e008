//! On-disk table store
//!
//! All tables live in one JSON document keyed by table name. Historical
//! tables are written once and never replaced; daily runs append to them.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use crate::data::{CollectMode, TimeSeries};
use crate::error::{MarketDataError, Result};

/// What `MarketStore::save` did with a table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SaveOutcome {
    /// Historical table written for the first time
    Created,
    /// Current rows appended to a table
    Appended,
    /// Historical table already present, left untouched
    SkippedExisting,
    /// Current rows dropped because the store has not been initialized
    NotInitialized,
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct StoreDocument {
    tables: BTreeMap<String, TimeSeries>,
}

/// Named-table store backed by a single JSON file.
#[derive(Debug, Clone)]
pub struct MarketStore {
    path: PathBuf,
}

impl MarketStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn exists(&self) -> bool {
        self.path.exists()
    }

    /// Saves one table.
    ///
    /// Historical mode creates the store if needed but never overwrites an
    /// existing table. Current mode appends, and requires a store created by
    /// an earlier historical run.
    ///
    /// # Arguments
    /// * `name`: Store key of the table, e.g. `brent`
    /// * `series`: Rows to write or append
    /// * `mode`: Historical runs create tables, current runs append to them
    ///
    /// # Returns
    /// What was done with the table. A skipped or uninitialized save is not an error.
    ///
    /// # Errors
    /// Returns an error if the existing store cannot be read or parsed, or the
    /// updated document cannot be written
    pub fn save(&self, name: &str, series: &TimeSeries, mode: CollectMode) -> Result<SaveOutcome> {
        match mode {
            CollectMode::Historical => {
                let mut document = if self.exists() {
                    self.read_document()?
                } else {
                    StoreDocument::default()
                };

                if document.tables.contains_key(name) {
                    tracing::warn!(
                        table = name,
                        "table already exists, cannot recreate; collect current data only"
                    );
                    return Ok(SaveOutcome::SkippedExisting);
                }

                document.tables.insert(name.to_string(), series.clone());
                self.write_document(&document)?;
                tracing::info!(table = name, rows = series.len(), "historical table stored");
                Ok(SaveOutcome::Created)
            }
            CollectMode::Current => {
                if !self.exists() {
                    tracing::warn!(
                        path = %self.path.display(),
                        "data file does not exist, initialize it with `collect --hist`"
                    );
                    return Ok(SaveOutcome::NotInitialized);
                }

                let mut document = self.read_document()?;
                let table = document
                    .tables
                    .entry(name.to_string())
                    .or_insert_with(|| TimeSeries::new(series.column.clone(), Vec::new()));

                if table.column != series.column {
                    tracing::warn!(
                        table = name,
                        stored = %table.column,
                        incoming = %series.column,
                        "column name mismatch, appending under stored name"
                    );
                }

                table.observations.extend_from_slice(&series.observations);
                self.write_document(&document)?;
                tracing::info!(table = name, rows = series.len(), "rows appended");
                Ok(SaveOutcome::Appended)
            }
        }
    }

    /// Table names in sorted order.
    ///
    /// # Errors
    /// Returns `StoreMissing` if the store file does not exist, or an I/O or
    /// serialization error if it cannot be read
    pub fn keys(&self) -> Result<Vec<String>> {
        Ok(self.read_document()?.tables.into_keys().collect())
    }

    /// Loads one table, de-duplicated by date.
    ///
    /// # Returns
    /// `None` if the store has no table under `name`
    ///
    /// # Errors
    /// Same as [`MarketStore::keys`]
    pub fn load(&self, name: &str) -> Result<Option<TimeSeries>> {
        let mut document = self.read_document()?;
        Ok(document.tables.remove(name).map(|mut table| {
            table.dedup_dates();
            table
        }))
    }

    /// Loads every table sorted by name, each de-duplicated by date.
    ///
    /// # Errors
    /// Same as [`MarketStore::keys`]
    pub fn load_all(&self) -> Result<Vec<(String, TimeSeries)>> {
        let document = self.read_document()?;
        Ok(document
            .tables
            .into_iter()
            .map(|(name, mut table)| {
                table.dedup_dates();
                (name, table)
            })
            .collect())
    }

    fn read_document(&self) -> Result<StoreDocument> {
        if !self.exists() {
            return Err(MarketDataError::StoreMissing(self.path.clone()));
        }
        let json = fs::read_to_string(&self.path)?;
        Ok(serde_json::from_str(&json)?)
    }

    /// Writes through a sibling temp file so a failed write leaves the old store intact.
    fn write_document(&self, document: &StoreDocument) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }

        let tmp = self.path.with_extension("json.tmp");
        fs::write(&tmp, serde_json::to_string(document)?)?;
        fs::rename(&tmp, &self.path)?;
        Ok(())
    }
}
