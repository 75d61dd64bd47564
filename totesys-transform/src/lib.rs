//! Dimensional Transformer: accumulates the extract snapshots per source
//! table, derives the star-schema fact and dimension tables, and writes
//! each as a parquet snapshot into the transform area. Slowly-changing
//! dimensions are written once per name; facts and `dim_currency` get a
//! fresh timestamped key every run.

use totesys_storage::Storage;
use totesys_types::chrono::NaiveDateTime;
use totesys_types::errors::TypeError;
use totesys_types::keys::SnapshotKey;
use totesys_types::log::{error, info};
use totesys_types::report::UploadReport;
use totesys_types::tables::{SourceTable, SourceTables, WarehouseTable};
use totesys_types::thiserror;
use totesys_types::types::{Field, TableData};

pub mod currency;
pub mod parquet;
pub mod snapshot;
pub mod star;

pub use currency::{CurrencyNames, StaticCurrencyNames};

#[derive(Debug, thiserror::Error)]
pub enum TransformError {
    #[error("storage: {0}")]
    Storage(#[from] totesys_storage::Error),
    #[error("table: {0}")]
    Table(#[from] TypeError),
    #[error("csv: {0}")]
    Csv(#[from] csv::Error),
    #[error("arrow: {0}")]
    Arrow(#[from] arrow::error::ArrowError),
    #[error("parquet: {0}")]
    Parquet(#[from] ::parquet::errors::ParquetError),
    #[error("no extract snapshots found for table {0}")]
    MissingExtract(String),
    #[error("unsupported parquet column {column} of type {data_type}")]
    UnsupportedColumn { column: String, data_type: String },
}

pub(crate) fn invalid(column: &str, field: &Field) -> TransformError {
    TypeError::InvalidValue {
        column: column.to_string(),
        value: field.to_csv_value(),
    }
    .into()
}

/// Rebuilds each source table by concatenating its extract snapshots in
/// key order. Every source table must have at least one snapshot; a table
/// that was never extracted means the pipeline has not seen a first full
/// run yet, which is fatal. The extractor writes nothing for a table with
/// zero rows, so a source table that is empty on the very first run keeps
/// the transform stage failing until it gains a row; every operational
/// table is expected to be seeded before the pipeline is pointed at it.
pub async fn read_source_tables(
    storage: &dyn Storage,
    bucket: &str,
) -> Result<SourceTables, TransformError> {
    let keys = storage.list_objects(bucket, None).await?;
    let mut tables = SourceTables::new();
    for table in SourceTable::ALL {
        let prefix = format!("{table}/");
        let mut accumulated: Option<TableData> = None;
        for key in keys.iter().filter(|k| k.starts_with(&prefix)) {
            let bytes = storage.get_object(bucket, key).await?;
            let data = snapshot::decode_csv(&bytes)?;
            accumulated = Some(match accumulated {
                Some(t) => t.concat(&data)?,
                None => data,
            });
        }
        let data = accumulated
            .ok_or_else(|| TransformError::MissingExtract(table.name().to_string()))?;
        tables.insert(table, data);
    }
    Ok(tables)
}

/// Runs one transform cycle.
///
/// The facts are derived first because `dim_date` is built from their date
/// columns. A derivation that fails is logged and its table recorded as
/// not uploaded while the rest continue; `dim_date` then covers only the
/// facts that derived cleanly.
pub async fn run(
    storage: &dyn Storage,
    extract_bucket: &str,
    transform_bucket: &str,
    names: &dyn CurrencyNames,
    now: NaiveDateTime,
) -> Result<UploadReport, TransformError> {
    let tables = read_source_tables(storage, extract_bucket).await?;
    let existing = storage.list_objects(transform_bucket, None).await?;

    let mut report = UploadReport::default();
    let skip = |table: WarehouseTable, e: TransformError, report: &mut UploadReport| {
        error!("failed to derive {table}: {e}");
        report.not_uploaded.push(table.name().to_string());
    };

    let mut facts = Vec::new();
    let mut mutable = Vec::new();
    for (table, result) in [
        (
            WarehouseTable::FactSalesOrder,
            star::create_fact_sales_order(&tables),
        ),
        (
            WarehouseTable::FactPurchaseOrder,
            star::create_fact_purchase_order(&tables),
        ),
        (WarehouseTable::FactPayment, star::create_fact_payment(&tables)),
    ] {
        match result {
            Ok(data) => {
                facts.push(data.clone());
                mutable.push((table, data));
            }
            Err(e) => skip(table, e, &mut report),
        }
    }
    match star::create_dim_currency(&tables, names) {
        Ok(data) => mutable.push((WarehouseTable::DimCurrency, data)),
        Err(e) => skip(WarehouseTable::DimCurrency, e, &mut report),
    }

    let mut derived = Vec::new();
    for (table, result) in [
        (
            WarehouseTable::DimCounterparty,
            star::create_dim_counterparty(&tables),
        ),
        (WarehouseTable::DimDate, star::create_dim_date(&facts)),
        (WarehouseTable::DimLocation, star::create_dim_location(&tables)),
        (WarehouseTable::DimStaff, star::create_dim_staff(&tables)),
        (WarehouseTable::DimDesign, star::create_dim_design(&tables)),
        (
            WarehouseTable::DimTransaction,
            star::create_dim_transaction(&tables),
        ),
        (
            WarehouseTable::DimPaymentType,
            star::create_dim_payment_type(&tables),
        ),
    ] {
        match result {
            Ok(data) => derived.push((table, data)),
            Err(e) => skip(table, e, &mut report),
        }
    }
    derived.extend(mutable);

    for (table, data) in derived {
        let key = if table.is_mutable() {
            SnapshotKey::new(table.name(), now, "parquet").to_key()
        } else {
            let name = format!("{table}.parquet");
            if existing.iter().any(|k| k == &name) {
                info!("{name} already present, skipping");
                report.not_uploaded.push(table.name().to_string());
                continue;
            }
            name
        };
        let upload = async {
            let bytes = parquet::encode(&data)?;
            storage
                .put_object(transform_bucket, &key, bytes)
                .await
                .map_err(TransformError::from)
        };
        match upload.await {
            Ok(()) => {
                info!("uploaded {key} ({} rows)", data.num_rows());
                report.uploaded.push(table.name().to_string());
            }
            Err(e) => {
                error!("failed to upload {key}: {e}");
                report.not_uploaded.push(table.name().to_string());
            }
        }
    }
    Ok(report)
}
