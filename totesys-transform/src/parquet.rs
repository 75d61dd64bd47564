//! Columnar snapshot codec. Tables are lowered into a single-batch parquet
//! file; the loader reads them back with the same type mapping.

use std::io::Cursor;
use std::sync::Arc;

use arrow::array::{
    Array, ArrayRef, BooleanArray, Date32Array, Float64Array, Int64Array, StringArray,
    Time64MicrosecondArray, TimestampMicrosecondArray,
};
use arrow::datatypes::{DataType, Field as ArrowField, Schema, TimeUnit};
use arrow::record_batch::RecordBatch;
use bytes::Bytes;
use parquet::arrow::arrow_reader::ParquetRecordBatchReaderBuilder;
use parquet::arrow::ArrowWriter;
use parquet::file::properties::WriterProperties;
use totesys_types::chrono::{DateTime, Datelike, NaiveDate, Timelike};
use totesys_types::types::{Field, FieldKind, TableData};

use crate::{invalid, TransformError};

// Days between 0001-01-01 (day 1 of the common era) and the Unix epoch;
// parquet dates count from the latter.
const EPOCH_DAYS_FROM_CE: i32 = 719_163;

/// Encodes a table as a parquet file with one record batch. Column types
/// come from the inferred `FieldKind`s; every column is nullable.
pub fn encode(table: &TableData) -> Result<Vec<u8>, TransformError> {
    let kinds = table.column_kinds();
    let mut fields = Vec::with_capacity(kinds.len());
    let mut arrays: Vec<ArrayRef> = Vec::with_capacity(kinds.len());
    for (idx, (name, kind)) in table.columns().iter().zip(kinds).enumerate() {
        let (data_type, array) = column_to_array(table, idx, kind, name)?;
        fields.push(ArrowField::new(name, data_type, true));
        arrays.push(array);
    }
    let schema = Arc::new(Schema::new(fields));
    let batch = RecordBatch::try_new(schema.clone(), arrays)?;

    let mut cursor = Cursor::new(Vec::new());
    let props = WriterProperties::builder().build();
    let mut writer = ArrowWriter::try_new(&mut cursor, schema, Some(props))?;
    writer.write(&batch)?;
    writer.close()?;
    Ok(cursor.into_inner())
}

/// Decodes a parquet file produced by [`encode`] back into a table.
pub fn decode(bytes: Vec<u8>) -> Result<TableData, TransformError> {
    let builder = ParquetRecordBatchReaderBuilder::try_new(Bytes::from(bytes))?;
    let schema = builder.schema().clone();
    let reader = builder.build()?;

    let columns: Vec<String> = schema.fields().iter().map(|f| f.name().clone()).collect();
    let mut rows = Vec::new();
    for batch in reader {
        let batch = batch?;
        let mut batch_rows = vec![Vec::with_capacity(columns.len()); batch.num_rows()];
        for (idx, column) in batch.columns().iter().enumerate() {
            push_column(column, schema.field(idx).name(), &mut batch_rows)?;
        }
        rows.extend(batch_rows);
    }
    Ok(TableData::new(columns, rows)?)
}

fn column_to_array(
    table: &TableData,
    idx: usize,
    kind: FieldKind,
    name: &str,
) -> Result<(DataType, ArrayRef), TransformError> {
    let cells = table.rows().iter().map(|row| &row[idx]);
    Ok(match kind {
        FieldKind::Int => {
            let values = cells
                .map(|f| match f {
                    Field::Int(i) => Ok(Some(*i)),
                    Field::Null => Ok(None),
                    other => Err(invalid(name, other)),
                })
                .collect::<Result<Vec<_>, _>>()?;
            (DataType::Int64, Arc::new(Int64Array::from(values)) as _)
        }
        FieldKind::Float => {
            let values = cells
                .map(|f| match f {
                    Field::Float(v) => Ok(Some(*v)),
                    Field::Int(i) => Ok(Some(*i as f64)),
                    Field::Null => Ok(None),
                    other => Err(invalid(name, other)),
                })
                .collect::<Result<Vec<_>, _>>()?;
            (DataType::Float64, Arc::new(Float64Array::from(values)) as _)
        }
        FieldKind::Boolean => {
            let values = cells
                .map(|f| match f {
                    Field::Boolean(b) => Ok(Some(*b)),
                    Field::Null => Ok(None),
                    other => Err(invalid(name, other)),
                })
                .collect::<Result<Vec<_>, _>>()?;
            (DataType::Boolean, Arc::new(BooleanArray::from(values)) as _)
        }
        FieldKind::String => {
            // Mixed columns fall back to their textual form.
            let values: Vec<Option<String>> = cells
                .map(|f| match f {
                    Field::Null => None,
                    other => Some(other.to_csv_value()),
                })
                .collect();
            (DataType::Utf8, Arc::new(StringArray::from(values)) as _)
        }
        FieldKind::Date => {
            let values = cells
                .map(|f| match f {
                    Field::Date(d) => Ok(Some(d.num_days_from_ce() - EPOCH_DAYS_FROM_CE)),
                    Field::Null => Ok(None),
                    other => Err(invalid(name, other)),
                })
                .collect::<Result<Vec<_>, _>>()?;
            (DataType::Date32, Arc::new(Date32Array::from(values)) as _)
        }
        FieldKind::Time => {
            let values = cells
                .map(|f| match f {
                    Field::Time(t) => Ok(Some(
                        i64::from(t.num_seconds_from_midnight()) * 1_000_000
                            + i64::from(t.nanosecond() / 1_000),
                    )),
                    Field::Null => Ok(None),
                    other => Err(invalid(name, other)),
                })
                .collect::<Result<Vec<_>, _>>()?;
            (
                DataType::Time64(TimeUnit::Microsecond),
                Arc::new(Time64MicrosecondArray::from(values)) as _,
            )
        }
        FieldKind::Timestamp => {
            let values = cells
                .map(|f| match f {
                    Field::Timestamp(ts) => Ok(Some(ts.and_utc().timestamp_micros())),
                    Field::Null => Ok(None),
                    other => Err(invalid(name, other)),
                })
                .collect::<Result<Vec<_>, _>>()?;
            (
                DataType::Timestamp(TimeUnit::Microsecond, None),
                Arc::new(TimestampMicrosecondArray::from(values)) as _,
            )
        }
    })
}

fn push_column(
    column: &ArrayRef,
    name: &str,
    rows: &mut [Vec<Field>],
) -> Result<(), TransformError> {
    let unsupported = || TransformError::UnsupportedColumn {
        column: name.to_string(),
        data_type: column.data_type().to_string(),
    };
    match column.data_type() {
        DataType::Int64 => {
            let array = column
                .as_any()
                .downcast_ref::<Int64Array>()
                .ok_or_else(unsupported)?;
            for (i, row) in rows.iter_mut().enumerate() {
                row.push(if array.is_null(i) {
                    Field::Null
                } else {
                    Field::Int(array.value(i))
                });
            }
        }
        DataType::Float64 => {
            let array = column
                .as_any()
                .downcast_ref::<Float64Array>()
                .ok_or_else(unsupported)?;
            for (i, row) in rows.iter_mut().enumerate() {
                row.push(if array.is_null(i) {
                    Field::Null
                } else {
                    Field::Float(array.value(i))
                });
            }
        }
        DataType::Boolean => {
            let array = column
                .as_any()
                .downcast_ref::<BooleanArray>()
                .ok_or_else(unsupported)?;
            for (i, row) in rows.iter_mut().enumerate() {
                row.push(if array.is_null(i) {
                    Field::Null
                } else {
                    Field::Boolean(array.value(i))
                });
            }
        }
        DataType::Utf8 => {
            let array = column
                .as_any()
                .downcast_ref::<StringArray>()
                .ok_or_else(unsupported)?;
            for (i, row) in rows.iter_mut().enumerate() {
                row.push(if array.is_null(i) {
                    Field::Null
                } else {
                    Field::String(array.value(i).to_string())
                });
            }
        }
        DataType::Date32 => {
            let array = column
                .as_any()
                .downcast_ref::<Date32Array>()
                .ok_or_else(unsupported)?;
            for (i, row) in rows.iter_mut().enumerate() {
                if array.is_null(i) {
                    row.push(Field::Null);
                    continue;
                }
                let date =
                    NaiveDate::from_num_days_from_ce_opt(array.value(i) + EPOCH_DAYS_FROM_CE)
                        .ok_or_else(unsupported)?;
                row.push(Field::Date(date));
            }
        }
        DataType::Time64(TimeUnit::Microsecond) => {
            let array = column
                .as_any()
                .downcast_ref::<Time64MicrosecondArray>()
                .ok_or_else(unsupported)?;
            for (i, row) in rows.iter_mut().enumerate() {
                if array.is_null(i) {
                    row.push(Field::Null);
                    continue;
                }
                let micros = array.value(i);
                let time = totesys_types::chrono::NaiveTime::from_num_seconds_from_midnight_opt(
                    (micros / 1_000_000) as u32,
                    (micros % 1_000_000 * 1_000) as u32,
                )
                .ok_or_else(unsupported)?;
                row.push(Field::Time(time));
            }
        }
        DataType::Timestamp(TimeUnit::Microsecond, _) => {
            let array = column
                .as_any()
                .downcast_ref::<TimestampMicrosecondArray>()
                .ok_or_else(unsupported)?;
            for (i, row) in rows.iter_mut().enumerate() {
                if array.is_null(i) {
                    row.push(Field::Null);
                    continue;
                }
                let micros = array.value(i);
                let timestamp = DateTime::from_timestamp(
                    micros.div_euclid(1_000_000),
                    (micros.rem_euclid(1_000_000) * 1_000) as u32,
                )
                .ok_or_else(unsupported)?
                .naive_utc();
                row.push(Field::Timestamp(timestamp));
            }
        }
        _ => return Err(unsupported()),
    }
    Ok(())
}
