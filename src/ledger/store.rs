use std::fs::{self, File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use super::error::{LedgerError, Result};
use super::schema::{SchemaVersion, migrate_v1};
use crate::inference::ClassificationResult;

/// One classified region as persisted in the result log
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogRecord {
    #[serde(deserialize_with = "deserialize_timestamp")]
    pub timestamp: DateTime<Utc>,
    #[serde(rename = "inference")]
    pub label: String,
    /// Percentage, two decimal places
    #[serde(serialize_with = "serialize_percent")]
    pub confidence: f64,
    pub image_name: String,
    pub camera: String,
}

impl LogRecord {
    pub fn new(
        timestamp: DateTime<Utc>,
        result: &ClassificationResult,
        image_name: impl Into<String>,
        camera: impl Into<String>,
    ) -> Self {
        Self {
            timestamp,
            label: result.label.clone(),
            confidence: (result.confidence * 100.0 * 100.0).round() / 100.0,
            image_name: image_name.into(),
            camera: camera.into(),
        }
    }
}

fn serialize_percent<S: Serializer>(value: &f64, serializer: S) -> std::result::Result<S::Ok, S::Error> {
    serializer.serialize_str(&format!("{value:.2}"))
}

/// RFC 3339, or the space-separated form written by older deployments (taken as UTC)
fn deserialize_timestamp<'de, D>(deserializer: D) -> std::result::Result<DateTime<Utc>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = String::deserialize(deserializer)?;
    let raw = raw.trim();

    if let Ok(ts) = DateTime::parse_from_rfc3339(raw) {
        return Ok(ts.with_timezone(&Utc));
    }

    ["%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%d %H:%M:%S"]
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(raw, fmt).ok())
        .map(|naive| naive.and_utc())
        .ok_or_else(|| serde::de::Error::custom(format!("invalid timestamp '{raw}'")))
}

/// Append-only CSV result log shared by all workers
///
/// Each row is encoded up front and written with a single call under the
/// writer lock, so concurrent jobs never interleave partial rows.
pub struct ResultLog {
    path: PathBuf,
    writer: Mutex<File>,
}

impl ResultLog {
    /// Open the log, creating it or migrating an older header as needed.
    ///
    /// Existing rows are never discarded here; an unrecognized header is an error.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        info!("Opening result log at: {}", path.display());

        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }

        prepare(&path)?;
        let writer = open_append(&path)?;

        Ok(Self {
            path,
            writer: Mutex::new(writer),
        })
    }

    /// Start a fresh log at `path`, discarding whatever the file held
    ///
    /// Unlike [`ResultLog::open`] this also replaces files with an unrecognized header.
    pub fn recreate<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }

        write_header(&path)?;
        warn!(path = %path.display(), "Result log recreated");
        let writer = open_append(&path)?;

        Ok(Self {
            path,
            writer: Mutex::new(writer),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Append one record; on failure nothing of it stays in the file
    pub async fn append(&self, record: &LogRecord) -> Result<()> {
        let row = encode_row(record)?;

        let mut file = self.writer.lock().await;
        let len = file.metadata()?.len();

        if let Err(e) = file.write_all(&row).and_then(|()| file.flush()) {
            if let Err(trunc) = file.set_len(len) {
                warn!(path = %self.path.display(), error = %trunc, "Failed to roll back partial result row");
            }
            return Err(e.into());
        }

        debug!(image_name = %record.image_name, label = %record.label, "Result appended");
        Ok(())
    }

    /// Every well-formed record in append order; malformed rows are skipped
    pub async fn read_all(&self) -> Result<Vec<LogRecord>> {
        // Held so no append lands while the file is read
        let _writer = self.writer.lock().await;

        let path = self.path.clone();
        tokio::task::spawn_blocking(move || read_records(&path))
            .await
            .map_err(|e| LedgerError::Task(e.to_string()))?
    }

    /// Most recent `limit` records, newest first
    pub async fn recent(&self, limit: usize) -> Result<Vec<LogRecord>> {
        let records = self.read_all().await?;
        Ok(records.into_iter().rev().take(limit).collect())
    }

    /// Discard every record and write a fresh header
    pub async fn reset(&self) -> Result<()> {
        let mut writer = self.writer.lock().await;
        write_header(&self.path)?;
        *writer = open_append(&self.path)?;
        warn!(path = %self.path.display(), "Result log reset");
        Ok(())
    }
}

fn write_header(path: &Path) -> Result<()> {
    let mut writer = csv::Writer::from_writer(File::create(path)?);
    writer.write_record(SchemaVersion::CURRENT.columns())?;
    writer.flush()?;
    Ok(())
}

fn open_append(path: &Path) -> Result<File> {
    Ok(OpenOptions::new().append(true).open(path)?)
}

fn encode_row(record: &LogRecord) -> Result<Vec<u8>> {
    let mut writer = csv::WriterBuilder::new()
        .has_headers(false)
        .from_writer(Vec::new());
    writer.serialize(record)?;
    writer
        .into_inner()
        .map_err(|e| LedgerError::Io(e.into_error()))
}

fn read_records(path: &Path) -> Result<Vec<LogRecord>> {
    let mut reader = csv::ReaderBuilder::new().has_headers(true).from_path(path)?;

    let mut records = Vec::new();
    for (line, row) in reader.deserialize::<LogRecord>().enumerate() {
        match row {
            Ok(record) => records.push(record),
            Err(e) => warn!(line = line + 2, error = %e, "Skipping malformed result log row"),
        }
    }

    Ok(records)
}

fn prepare(path: &Path) -> Result<()> {
    let is_empty = match fs::metadata(path) {
        Ok(meta) => meta.len() == 0,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => true,
        Err(e) => return Err(e.into()),
    };

    if is_empty {
        return write_header(path);
    }

    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .from_path(path)?;
    let header = reader.headers()?.clone();
    drop(reader);

    match SchemaVersion::detect(&header) {
        Some(SchemaVersion::V2) => {}
        Some(SchemaVersion::V1) => {
            migrate_v1(path)?;
        }
        None => {
            return Err(LedgerError::SchemaMismatch {
                path: path.to_path_buf(),
                found: header.iter().collect::<Vec<_>>().join(","),
            });
        }
    }

    terminate_last_line(path)
}

/// A crash mid-write can leave the final row without its newline; close it off
/// so the next append starts on a fresh line.
fn terminate_last_line(path: &Path) -> Result<()> {
    let mut file = OpenOptions::new().read(true).append(true).open(path)?;
    if file.metadata()?.len() == 0 {
        return Ok(());
    }

    file.seek(SeekFrom::End(-1))?;
    let mut last = [0u8; 1];
    file.read_exact(&mut last)?;

    if last[0] != b'\n' {
        warn!(path = %path.display(), "Result log ended mid-row, terminating it");
        file.write_all(b"\n")?;
    }

    Ok(())
}
