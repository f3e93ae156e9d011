//! Disease catalog: classification label -> plant/disease reference data
//!
//! Loaded once from a CSV table with columns
//! `codename,Plant_Name,Disease,Description,Cure` and shared read-only.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::info;

/// Disease name that never raises an alert (compared case-insensitively)
pub const HEALTHY: &str = "healthy";

#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("Failed to read catalog {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },

    #[error("Duplicate catalog codename '{0}'")]
    DuplicateCodename(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CatalogEntry {
    pub codename: String,
    #[serde(rename = "Plant_Name")]
    pub plant_name: String,
    #[serde(rename = "Disease")]
    pub disease: String,
    #[serde(rename = "Description", default)]
    pub description: String,
    #[serde(rename = "Cure", default)]
    pub cure: String,
}

impl CatalogEntry {
    /// Display entry for labels the catalog does not know
    pub fn unknown(codename: &str) -> Self {
        Self {
            codename: codename.to_string(),
            plant_name: "Unknown".to_string(),
            disease: "Unknown".to_string(),
            description: String::new(),
            cure: String::new(),
        }
    }

    pub fn is_healthy(&self) -> bool {
        self.disease.trim().eq_ignore_ascii_case(HEALTHY)
    }
}

/// Catalog hit or the synthetic unknown entry
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Lookup<'a> {
    Found(&'a CatalogEntry),
    Missing(CatalogEntry),
}

impl Lookup<'_> {
    pub fn entry(&self) -> &CatalogEntry {
        match self {
            Lookup::Found(entry) => entry,
            Lookup::Missing(entry) => entry,
        }
    }

    /// Alert only for a catalog match whose disease is not "healthy"
    pub fn is_alertable(&self) -> bool {
        matches!(self, Lookup::Found(entry) if !entry.is_healthy())
    }
}

#[derive(Debug, Clone, Default)]
pub struct Catalog {
    entries: HashMap<String, CatalogEntry>,
}

impl Catalog {
    pub fn load(path: &Path) -> Result<Self, CatalogError> {
        let read_err = |source| CatalogError::Read {
            path: path.to_path_buf(),
            source,
        };

        let mut reader = csv::ReaderBuilder::new()
            .has_headers(true)
            .trim(csv::Trim::All)
            .from_path(path)
            .map_err(read_err)?;

        let mut entries = Vec::new();
        for record in reader.deserialize::<CatalogEntry>() {
            entries.push(record.map_err(read_err)?);
        }

        let catalog = Self::from_entries(entries)?;
        info!(path = %path.display(), entries = catalog.len(), "Catalog loaded");
        Ok(catalog)
    }

    pub fn from_entries(entries: impl IntoIterator<Item = CatalogEntry>) -> Result<Self, CatalogError> {
        let mut map = HashMap::new();
        for entry in entries {
            if map.contains_key(&entry.codename) {
                return Err(CatalogError::DuplicateCodename(entry.codename));
            }
            map.insert(entry.codename.clone(), entry);
        }
        Ok(Self { entries: map })
    }

    pub fn get(&self, label: &str) -> Option<&CatalogEntry> {
        self.entries.get(label.trim())
    }

    pub fn lookup(&self, label: &str) -> Lookup<'_> {
        match self.get(label) {
            Some(entry) => Lookup::Found(entry),
            None => Lookup::Missing(CatalogEntry::unknown(label)),
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
