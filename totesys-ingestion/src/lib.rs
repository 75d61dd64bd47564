//! Change-Set Extractor: pulls rows updated since the last run out of the
//! Totesys source database and writes them as timestamped CSV snapshots
//! into the extract area.

use totesys_storage::Storage;
use totesys_types::chrono::NaiveDateTime;
use totesys_types::keys::{watermark_from_keys, SnapshotKey};
use totesys_types::log::{error, info};
use totesys_types::report::ExtractReport;
use totesys_types::thiserror;

pub mod snapshot;
pub mod source;

pub use source::{PostgresSource, SourceDatabase};

#[derive(Debug, thiserror::Error)]
pub enum ExtractError {
    #[error("source database: {0}")]
    Connection(#[from] tokio_postgres::Error),
    #[error("storage: {0}")]
    Storage(#[from] totesys_storage::Error),
    #[error("csv: {0}")]
    Csv(#[from] csv::Error),
    #[error("snapshot encode: {0}")]
    SnapshotEncode(String),
    #[error("numeric value in column {0} does not fit an f64")]
    NumericConversion(String),
}

/// Runs one extraction cycle.
///
/// The watermark is reconstructed from the keys already present in the
/// extract area: their embedded timestamps are parsed and the maximum wins,
/// falling back to the epoch sentinel on a first run. Tables with no rows
/// at or past the watermark are recorded as unchanged and nothing is
/// written for them, which is what makes an idle re-run a no-op.
///
/// Reference tables carry no `last_updated` column to filter on, so they
/// are captured in full exactly once: after their first snapshot exists a
/// re-run records them as unchanged instead of re-uploading.
///
/// A failed snapshot upload is logged and the table is marked failed while
/// its siblings continue; a source query failure aborts the run, since the
/// table list itself came from the same connection.
pub async fn run(
    source: &dyn SourceDatabase,
    storage: &dyn Storage,
    bucket: &str,
    now: NaiveDateTime,
) -> Result<ExtractReport, ExtractError> {
    let existing = storage.list_objects(bucket, None).await?;
    let watermark = watermark_from_keys(existing.iter().map(String::as_str));
    info!("extracting rows updated since {watermark}");

    let mut report = ExtractReport::default();
    for table in source.list_tables().await? {
        let columns = source.columns(&table).await?;
        let prefix = format!("{table}/");
        if !columns.iter().any(|c| c == "last_updated")
            && existing.iter().any(|k| k.starts_with(&prefix))
        {
            report.no_change.push(table);
            continue;
        }
        let rows = source.select_changed(&table, watermark).await?;
        if rows.is_empty() {
            report.no_change.push(table);
            continue;
        }

        let key = SnapshotKey::new(&table, now, "csv").to_key();
        let upload = async {
            let data = snapshot::encode_csv(&columns, &rows)?;
            storage
                .put_object(bucket, &key, data)
                .await
                .map_err(ExtractError::from)
        };
        match upload.await {
            Ok(()) => {
                info!("uploaded {key} ({} rows)", rows.len());
                report.updated.push(table);
            }
            Err(e) => {
                error!("failed to upload {key}: {e}");
                report.failed.push(table);
            }
        }
    }
    Ok(report)
}

#[cfg(test)]
mod tests;
