use totesys_types::types::Field;

use crate::ExtractError;

/// Serializes a header row plus data rows into CSV bytes. Nulls become
/// empty cells; the transformer's decoder maps them back.
pub fn encode_csv(columns: &[String], rows: &[Vec<Field>]) -> Result<Vec<u8>, ExtractError> {
    let mut writer = csv::Writer::from_writer(Vec::new());
    writer.write_record(columns)?;
    for row in rows {
        writer.write_record(row.iter().map(Field::to_csv_value))?;
    }
    writer
        .into_inner()
        .map_err(|e| ExtractError::SnapshotEncode(e.to_string()))
}

#[cfg(test)]
mod tests {
    use totesys_types::chrono::NaiveDate;

    use super::*;

    #[test]
    fn encodes_header_and_rows() {
        let columns = vec!["payment_id".to_string(), "paid".to_string()];
        let rows = vec![
            vec![Field::Int(1), Field::Boolean(false)],
            vec![Field::Int(2), Field::Null],
        ];
        let data = encode_csv(&columns, &rows).unwrap();
        assert_eq!(
            String::from_utf8(data).unwrap(),
            "payment_id,paid\n1,false\n2,\n"
        );
    }

    #[test]
    fn dates_and_timestamps_use_iso_layout() {
        let columns = vec!["d".to_string(), "ts".to_string()];
        let date = NaiveDate::from_ymd_opt(2022, 11, 3).unwrap();
        let rows = vec![vec![
            Field::Date(date),
            Field::Timestamp(date.and_hms_milli_opt(14, 20, 52, 186).unwrap()),
        ]];
        let data = encode_csv(&columns, &rows).unwrap();
        assert_eq!(
            String::from_utf8(data).unwrap(),
            "d,ts\n2022-11-03,2022-11-03 14:20:52.186\n"
        );
    }
}
