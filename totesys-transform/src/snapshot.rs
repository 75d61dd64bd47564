use totesys_types::types::{Field, TableData};

use crate::TransformError;

/// Parses one extract snapshot: a header row of column names followed by
/// data rows. Empty cells come back as nulls.
pub fn decode_csv(data: &[u8]) -> Result<TableData, TransformError> {
    let mut reader = csv::Reader::from_reader(data);
    let columns = reader.headers()?.iter().map(str::to_string).collect();
    let mut rows = Vec::new();
    for record in reader.records() {
        let record = record?;
        rows.push(record.iter().map(Field::from_csv_value).collect());
    }
    Ok(TableData::new(columns, rows)?)
}
