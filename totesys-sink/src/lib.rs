//! Warehouse Loader: picks up the latest parquet snapshot for each
//! star-schema table in the transform area and appends its rows to the
//! warehouse inside a single transaction, so a load cycle is all or
//! nothing.

use totesys_storage::Storage;
use totesys_types::keys::{latest_snapshot, SnapshotKey};
use totesys_types::log::warn;
use totesys_types::report::UploadReport;
use totesys_types::tables::WarehouseTable;
use totesys_types::thiserror;
use totesys_types::types::TableData;

pub mod warehouse;

pub use warehouse::{PostgresWarehouse, WarehouseSink};

#[derive(Debug, thiserror::Error)]
pub enum LoadError {
    #[error("storage: {0}")]
    Storage(#[from] totesys_storage::Error),
    #[error("snapshot: {0}")]
    Snapshot(#[from] totesys_transform::TransformError),
    #[error("warehouse: {0}")]
    Warehouse(#[from] tokio_postgres::Error),
}

/// Maps a transform-area listing to the snapshot to load per table.
/// Slowly-changing dimensions live under their exact name; mutable tables
/// contribute only their most recent timestamped snapshot. Keys matching
/// neither convention come back separately so the caller can flag them.
pub fn classify_snapshots(keys: &[String]) -> (Vec<(WarehouseTable, String)>, Vec<String>) {
    let mut loads = Vec::new();
    for table in WarehouseTable::IMMUTABLE {
        let name = format!("{table}.parquet");
        if keys.iter().any(|k| k == &name) {
            loads.push((table, name));
        }
    }
    for table in WarehouseTable::MUTABLE {
        if let Some(key) = latest_snapshot(keys.iter().map(String::as_str), table.name()) {
            loads.push((table, key));
        }
    }

    let unknown = keys
        .iter()
        .filter(|key| {
            let immutable = WarehouseTable::IMMUTABLE
                .iter()
                .any(|t| key.as_str() == format!("{t}.parquet"));
            let mutable = SnapshotKey::parse(key).is_some_and(|parsed| {
                parsed
                    .table
                    .parse::<WarehouseTable>()
                    .is_ok_and(|t| t.is_mutable())
            });
            !immutable && !mutable
        })
        .cloned()
        .collect();
    (loads, unknown)
}

/// Runs one load cycle. Any decode or append error aborts the whole run;
/// the transaction inside the sink guarantees no partial load survives.
pub async fn run(
    storage: &dyn Storage,
    bucket: &str,
    sink: &mut dyn WarehouseSink,
    schema: &str,
) -> Result<UploadReport, LoadError> {
    let keys = storage.list_objects(bucket, None).await?;
    let (loads, unknown) = classify_snapshots(&keys);

    let mut report = UploadReport::default();
    for key in unknown {
        warn!("{key} does not correspond to any warehouse table");
        report.not_uploaded.push(key);
    }

    let mut batches: Vec<(WarehouseTable, TableData)> = Vec::new();
    for (table, key) in loads {
        let bytes = storage.get_object(bucket, &key).await?;
        batches.push((table, totesys_transform::parquet::decode(bytes)?));
    }
    sink.append_batches(schema, &batches).await?;
    report
        .uploaded
        .extend(batches.iter().map(|(t, _)| t.name().to_string()));
    Ok(report)
}
