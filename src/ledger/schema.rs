/// Versioned header layout of the result log
///
/// The header row doubles as the schema marker:
/// - v1: `timestamp,inference,confidence,image_name`
/// - v2: `timestamp,inference,confidence,image_name,camera`
use std::fs::{self, File};
use std::path::{Path, PathBuf};

use csv::StringRecord;
use tracing::{info, warn};

use super::error::Result;
use crate::pipeline::DEFAULT_CAMERA;

const V1_COLUMNS: &[&str] = &["timestamp", "inference", "confidence", "image_name"];
const V2_COLUMNS: &[&str] = &["timestamp", "inference", "confidence", "image_name", "camera"];

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum SchemaVersion {
    V1,
    V2,
}

impl SchemaVersion {
    pub const CURRENT: SchemaVersion = SchemaVersion::V2;

    pub fn columns(self) -> &'static [&'static str] {
        match self {
            SchemaVersion::V1 => V1_COLUMNS,
            SchemaVersion::V2 => V2_COLUMNS,
        }
    }

    pub fn detect(header: &StringRecord) -> Option<Self> {
        let fields: Vec<&str> = header
            .iter()
            .map(|field| field.trim_start_matches('\u{feff}').trim())
            .collect();

        [SchemaVersion::V1, SchemaVersion::V2]
            .into_iter()
            .find(|version| fields == version.columns())
    }
}

fn migration_path(path: &Path) -> PathBuf {
    let mut name = path.file_name().unwrap_or_default().to_os_string();
    name.push(".migrating");
    path.with_file_name(name)
}

/// Rewrite a v1 log as the current schema, keeping every row.
///
/// The new file is written next to the original and renamed over it, so a crash
/// mid-migration leaves the v1 file untouched. Returns the number of rows carried over.
pub fn migrate_v1(path: &Path) -> Result<usize> {
    let staging = migration_path(path);

    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .from_path(path)?;
    let mut writer = csv::Writer::from_writer(File::create(&staging)?);
    writer.write_record(SchemaVersion::CURRENT.columns())?;

    let mut migrated = 0;
    for (line, row) in reader.records().enumerate() {
        let mut row = row?;
        if row.len() != V1_COLUMNS.len() {
            warn!(line = line + 2, fields = row.len(), "Dropping malformed row during result log migration");
            continue;
        }

        row.push_field(DEFAULT_CAMERA);
        writer.write_record(&row)?;
        migrated += 1;
    }

    writer.flush()?;
    drop(writer);
    fs::rename(&staging, path)?;

    info!(path = %path.display(), rows = migrated, "Result log migrated from v1 to v2");
    Ok(migrated)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_detect_versions() {
        let v1 = StringRecord::from(vec!["timestamp", "inference", "confidence", "image_name"]);
        let v2 = StringRecord::from(vec![
            "\u{feff}timestamp",
            "inference",
            " confidence",
            "image_name",
            "camera",
        ]);
        let other = StringRecord::from(vec!["when", "what"]);

        assert_eq!(SchemaVersion::detect(&v1), Some(SchemaVersion::V1));
        assert_eq!(SchemaVersion::detect(&v2), Some(SchemaVersion::V2));
        assert_eq!(SchemaVersion::detect(&other), None);
    }

    #[test]
    fn test_migrate_v1_keeps_rows() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("results.csv");
        fs::write(
            &path,
            "timestamp,inference,confidence,image_name\n\
             2025-03-01 10:00:00,TomatoBlight,91.20,a.jpg\n\
             2025-03-01 10:05:00,Healthy,88.00,b.jpg\n",
        )
        .unwrap();

        assert_eq!(migrate_v1(&path).unwrap(), 2);

        let contents = fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = contents.lines().collect();
        assert_eq!(lines[0], "timestamp,inference,confidence,image_name,camera");
        assert_eq!(lines[1], "2025-03-01 10:00:00,TomatoBlight,91.20,a.jpg,UnknownCam");
        assert_eq!(lines.len(), 3);
        assert!(!migration_path(&path).exists());
    }
}
