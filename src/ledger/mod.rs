/// Append-only CSV result log
///
/// One row per classified leaf region with columns
/// `timestamp,inference,confidence,image_name,camera`. The log is shared by
/// every worker; [`ResultLog`] owns the only writer and serializes appends.
///
/// ## Schema handling
///
/// The header row identifies the schema version. Opening a log whose header
/// predates the `camera` column migrates it in place, keeping all rows.
/// Unrecognized headers are refused rather than overwritten, and truncation
/// only happens through [`ResultLog::reset`].
///
/// ## Usage
///
/// ```rust,ignore
/// use leafwatch::ledger::{LogRecord, ResultLog};
///
/// let log = ResultLog::open("data/results.csv")?;
/// log.append(&record).await?;
/// let latest = log.recent(20).await?;
/// ```

pub mod error;
pub mod schema;
pub mod store;

pub use error::{LedgerError, Result};
pub use schema::SchemaVersion;
pub use store::{LogRecord, ResultLog};
