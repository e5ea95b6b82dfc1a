//! Vehicle catalog loading and querying.
//!
//! The catalog document maps a category (model family) to a mapping of record
//! key to vehicle record. Categories only group records; queries run over the
//! flattened sequence.

pub mod filter;

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, PoisonError, RwLock};

use serde_json::Value;
use thiserror::Error;
use tracing::{info, warn};

use crate::domain::vehicle::VehicleRecord;

pub use filter::{filter, project, FilterOutcome, Projection, SearchPredicate};

#[derive(Debug, Error)]
pub enum InventoryError {
    #[error("inventory source `{path}` could not be read: {source}")]
    Unavailable { path: PathBuf, source: std::io::Error },
    #[error("inventory source `{path}` is malformed: {reason}")]
    Malformed { path: PathBuf, reason: String },
}

/// Category key → record key → record, in document order.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Catalog {
    categories: Vec<(String, Vec<(String, VehicleRecord)>)>,
}

impl Catalog {
    pub fn load(path: &Path) -> Result<Self, InventoryError> {
        let raw = fs::read_to_string(path)
            .map_err(|source| InventoryError::Unavailable { path: path.to_path_buf(), source })?;
        Self::from_json_str(&raw).map_err(|reason| InventoryError::Malformed {
            path: path.to_path_buf(),
            reason,
        })
    }

    /// Parses a catalog document. Non-mapping categories and records are
    /// skipped; a non-mapping document is an error.
    pub fn from_json_str(raw: &str) -> Result<Self, String> {
        let document: Value = serde_json::from_str(raw).map_err(|error| error.to_string())?;
        let Value::Object(categories) = document else {
            return Err("top-level value must be a mapping of categories".to_string());
        };

        let mut catalog = Self::default();
        for (category, entries) in categories {
            let Value::Object(entries) = entries else {
                warn!(
                    event_name = "inventory.category.skipped",
                    category = %category,
                    "catalog category is not a mapping"
                );
                continue;
            };

            let records = catalog.category_mut(&category);
            for (key, entry) in entries {
                match VehicleRecord::from_value(entry) {
                    Some(record) => upsert(records, key, record),
                    None => warn!(
                        event_name = "inventory.record.skipped",
                        category = %category,
                        record_key = %key,
                        "catalog record is not a mapping"
                    ),
                }
            }
        }

        Ok(catalog)
    }

    /// Files `record` under its name, or its VIN when the name is absent.
    pub fn insert(&mut self, category: impl Into<String>, record: VehicleRecord) {
        let key = record.catalog_key().unwrap_or("unknown").to_string();
        upsert(self.category_mut(&category.into()), key, record);
    }

    pub fn categories(&self) -> impl Iterator<Item = (&str, usize)> {
        self.categories.iter().map(|(name, records)| (name.as_str(), records.len()))
    }

    /// Every record across categories, in document order. A VIN listed under
    /// two categories appears twice.
    pub fn flatten(&self) -> Vec<VehicleRecord> {
        self.categories
            .iter()
            .flat_map(|(_, records)| records.iter().map(|(_, record)| record.clone()))
            .collect()
    }

    fn category_mut(&mut self, name: &str) -> &mut Vec<(String, VehicleRecord)> {
        let index = match self.categories.iter().position(|(existing, _)| existing == name) {
            Some(index) => index,
            None => {
                self.categories.push((name.to_string(), Vec::new()));
                self.categories.len() - 1
            }
        };
        &mut self.categories[index].1
    }
}

fn upsert(records: &mut Vec<(String, VehicleRecord)>, key: String, record: VehicleRecord) {
    match records.iter_mut().find(|(existing, _)| *existing == key) {
        Some((_, slot)) => *slot = record,
        None => records.push((key, record)),
    }
}

/// A loaded catalog together with its flattened records.
#[derive(Clone, Debug, Default)]
pub struct Inventory {
    catalog: Catalog,
    records: Vec<VehicleRecord>,
}

impl Inventory {
    pub fn new(catalog: Catalog) -> Self {
        let records = catalog.flatten();
        Self { catalog, records }
    }

    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    pub fn records(&self) -> &[VehicleRecord] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn filter(&self, predicate: &SearchPredicate) -> FilterOutcome {
        filter::filter(&self.records, predicate)
    }
}

/// Process-wide holder of the current inventory.
///
/// Readers take an `Arc` snapshot at the start of a request, so a reload only
/// affects requests that start after it.
#[derive(Debug)]
pub struct InventoryStore {
    source: Option<PathBuf>,
    current: RwLock<Arc<Inventory>>,
}

impl InventoryStore {
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, InventoryError> {
        let path = path.into();
        let inventory = Inventory::new(Catalog::load(&path)?);
        info!(
            event_name = "inventory.loaded",
            path = %path.display(),
            vehicle_count = inventory.len(),
            "vehicle inventory loaded"
        );
        Ok(Self { source: Some(path), current: RwLock::new(Arc::new(inventory)) })
    }

    /// Store without a backing file; `reload` keeps the given catalog.
    pub fn from_catalog(catalog: Catalog) -> Self {
        Self { source: None, current: RwLock::new(Arc::new(Inventory::new(catalog))) }
    }

    pub fn source(&self) -> Option<&Path> {
        self.source.as_deref()
    }

    pub fn snapshot(&self) -> Arc<Inventory> {
        self.current.read().unwrap_or_else(PoisonError::into_inner).clone()
    }

    /// Re-reads the backing file. On failure the previous inventory stays in place.
    pub fn reload(&self) -> Result<usize, InventoryError> {
        let Some(path) = &self.source else {
            return Ok(self.snapshot().len());
        };

        let inventory = Inventory::new(Catalog::load(path)?);
        let count = inventory.len();
        *self.current.write().unwrap_or_else(PoisonError::into_inner) = Arc::new(inventory);
        info!(
            event_name = "inventory.reloaded",
            path = %path.display(),
            vehicle_count = count,
            "vehicle inventory reloaded"
        );
        Ok(count)
    }
}
