use std::collections::BTreeMap;

use async_trait::async_trait;
use tempdir::TempDir;
use totesys_storage::{LocalStorage, Storage};
use totesys_types::chrono::{NaiveDate, NaiveDateTime};
use totesys_types::keys::epoch_watermark;
use totesys_types::types::Field;

use super::*;

struct MockTable {
    columns: Vec<String>,
    rows: Vec<Vec<Field>>,
}

#[derive(Default)]
struct MockSource {
    tables: BTreeMap<String, MockTable>,
}

impl MockSource {
    fn insert(&mut self, name: &str, columns: &[&str], rows: Vec<Vec<Field>>) {
        self.tables.insert(
            name.to_string(),
            MockTable {
                columns: columns.iter().map(|c| c.to_string()).collect(),
                rows,
            },
        );
    }
}

#[async_trait]
impl SourceDatabase for MockSource {
    async fn list_tables(&self) -> Result<Vec<String>, ExtractError> {
        Ok(self.tables.keys().cloned().collect())
    }

    async fn columns(&self, table: &str) -> Result<Vec<String>, ExtractError> {
        Ok(self.tables[table].columns.clone())
    }

    async fn select_changed(
        &self,
        table: &str,
        since: NaiveDateTime,
    ) -> Result<Vec<Vec<Field>>, ExtractError> {
        let mock = &self.tables[table];
        let last_updated = mock.columns.iter().position(|c| c == "last_updated");
        Ok(mock
            .rows
            .iter()
            .filter(|row| match last_updated {
                Some(idx) => match &row[idx] {
                    Field::Timestamp(ts) => *ts >= since,
                    _ => true,
                },
                None => true,
            })
            .cloned()
            .collect())
    }
}

fn ts(s: &str) -> NaiveDateTime {
    NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S").unwrap()
}

fn payment_source() -> MockSource {
    let mut source = MockSource::default();
    source.insert(
        "payment",
        &["payment_id", "payment_amount", "last_updated"],
        vec![
            vec![
                Field::Int(1),
                Field::Float(552548.62),
                Field::Timestamp(ts("2023-02-01 12:00:00")),
            ],
            vec![
                Field::Int(2),
                Field::Float(205952.22),
                Field::Timestamp(ts("2023-02-10 09:30:00")),
            ],
        ],
    );
    source
}

fn create_storage() -> (TempDir, LocalStorage) {
    let temp_dir = TempDir::new("totesys-ingestion").unwrap();
    let storage = LocalStorage::new(temp_dir.path());
    storage.create_bucket("extract-bucket").unwrap();
    (temp_dir, storage)
}

#[tokio::test]
async fn first_run_extracts_everything_under_a_timestamped_key() {
    let (_temp_dir, storage) = create_storage();
    let source = payment_source();

    let report = run(&source, &storage, "extract-bucket", ts("2023-02-11 08:00:00"))
        .await
        .unwrap();

    assert_eq!(report.updated, vec!["payment".to_string()]);
    assert!(report.no_change.is_empty());

    let data = storage
        .get_object(
            "extract-bucket",
            "payment/2023/02/11/payment_08:00:00.csv",
        )
        .await
        .unwrap();
    let text = String::from_utf8(data).unwrap();
    assert!(text.starts_with("payment_id,payment_amount,last_updated\n"));
    assert_eq!(text.lines().count(), 3);
}

#[tokio::test]
async fn only_rows_past_the_watermark_are_extracted() {
    let (_temp_dir, storage) = create_storage();
    let source = payment_source();

    // A prior snapshot sets the watermark between the two payment rows.
    storage
        .put_object(
            "extract-bucket",
            "payment/2023/02/05/payment_00:00:00.csv",
            b"payment_id,payment_amount,last_updated\n".to_vec(),
        )
        .await
        .unwrap();

    let report = run(&source, &storage, "extract-bucket", ts("2023-02-11 08:00:00"))
        .await
        .unwrap();
    assert_eq!(report.updated, vec!["payment".to_string()]);

    let data = storage
        .get_object(
            "extract-bucket",
            "payment/2023/02/11/payment_08:00:00.csv",
        )
        .await
        .unwrap();
    let text = String::from_utf8(data).unwrap();
    // Header plus exactly the one row updated after the watermark.
    assert_eq!(text.lines().count(), 2);
    assert!(text.contains("205952.22"));
    assert!(!text.contains("552548.62"));
}

#[tokio::test]
async fn rerun_without_source_changes_is_a_no_op() {
    let (_temp_dir, storage) = create_storage();
    let mut source = payment_source();
    // Reference tables carry no last_updated column.
    source.insert(
        "design",
        &["design_id", "design_name"],
        vec![vec![Field::Int(8), Field::String("Wooden".into())]],
    );
    source.insert(
        "department",
        &["department_id", "department_name"],
        vec![vec![Field::Int(1), Field::String("Sales".into())]],
    );

    let first = run(&source, &storage, "extract-bucket", ts("2023-02-11 08:00:00"))
        .await
        .unwrap();
    assert_eq!(
        first.updated,
        vec![
            "department".to_string(),
            "design".to_string(),
            "payment".to_string(),
        ]
    );
    let after_first = storage.list_objects("extract-bucket", None).await.unwrap();

    let second = run(&source, &storage, "extract-bucket", ts("2023-02-11 09:00:00"))
        .await
        .unwrap();
    assert!(second.updated.is_empty());
    assert_eq!(
        second.no_change,
        vec![
            "department".to_string(),
            "design".to_string(),
            "payment".to_string(),
        ]
    );

    // Second run wrote nothing at all.
    let after_second = storage.list_objects("extract-bucket", None).await.unwrap();
    assert_eq!(after_first, after_second);
}

#[tokio::test]
async fn watermark_never_moves_backwards() {
    let (_temp_dir, storage) = create_storage();
    let source = payment_source();

    run(&source, &storage, "extract-bucket", ts("2023-02-11 08:00:00"))
        .await
        .unwrap();

    let keys = storage.list_objects("extract-bucket", None).await.unwrap();
    let watermark =
        totesys_types::keys::watermark_from_keys(keys.iter().map(String::as_str));
    assert!(watermark >= ts("2023-02-11 08:00:00"));
    assert!(watermark > epoch_watermark());
}

#[tokio::test]
async fn reference_tables_are_extracted_in_full() {
    let (_temp_dir, storage) = create_storage();
    let mut source = MockSource::default();
    source.insert(
        "design",
        &["design_id", "design_name"],
        vec![vec![Field::Int(8), Field::String("Wooden".into())]],
    );

    let report = run(&source, &storage, "extract-bucket", ts("2023-02-11 08:00:00"))
        .await
        .unwrap();
    assert_eq!(report.updated, vec!["design".to_string()]);
}

#[tokio::test]
async fn reference_table_is_not_reextracted_on_rerun() {
    let (_temp_dir, storage) = create_storage();
    let mut source = MockSource::default();
    source.insert(
        "design",
        &["design_id", "design_name"],
        vec![vec![Field::Int(8), Field::String("Wooden".into())]],
    );

    run(&source, &storage, "extract-bucket", ts("2023-02-11 08:00:00"))
        .await
        .unwrap();
    let after_first = storage.list_objects("extract-bucket", None).await.unwrap();
    assert_eq!(after_first.len(), 1);

    // The rows still have no last_updated filter, but the snapshot already
    // captured them; a later run must not write a second full copy.
    let second = run(&source, &storage, "extract-bucket", ts("2023-02-12 08:00:00"))
        .await
        .unwrap();
    assert!(second.updated.is_empty());
    assert_eq!(second.no_change, vec!["design".to_string()]);

    let after_second = storage.list_objects("extract-bucket", None).await.unwrap();
    assert_eq!(after_first, after_second);
}

struct BrokenStorage {
    inner: LocalStorage,
}

#[async_trait]
impl Storage for BrokenStorage {
    async fn put_object(
        &self,
        bucket: &str,
        key: &str,
        data: Vec<u8>,
    ) -> Result<(), totesys_storage::Error> {
        if key.starts_with("payment/") {
            return Err(totesys_storage::Error::GetObjectBody("injected".into()));
        }
        self.inner.put_object(bucket, key, data).await
    }

    async fn get_object(&self, bucket: &str, key: &str) -> Result<Vec<u8>, totesys_storage::Error> {
        self.inner.get_object(bucket, key).await
    }

    async fn list_objects(
        &self,
        bucket: &str,
        prefix: Option<&str>,
    ) -> Result<Vec<String>, totesys_storage::Error> {
        self.inner.list_objects(bucket, prefix).await
    }

    async fn list_buckets(&self) -> Result<Vec<String>, totesys_storage::Error> {
        self.inner.list_buckets().await
    }
}

#[tokio::test]
async fn one_failed_upload_does_not_abort_other_tables() {
    let temp_dir = TempDir::new("totesys-ingestion").unwrap();
    let storage = BrokenStorage {
        inner: LocalStorage::new(temp_dir.path()),
    };
    let mut source = payment_source();
    source.insert(
        "staff",
        &["staff_id", "last_updated"],
        vec![vec![
            Field::Int(1),
            Field::Timestamp(ts("2023-02-10 10:00:00")),
        ]],
    );

    let report = run(&source, &storage, "extract-bucket", ts("2023-02-11 08:00:00"))
        .await
        .unwrap();
    assert_eq!(report.failed, vec!["payment".to_string()]);
    assert_eq!(report.updated, vec!["staff".to_string()]);
}

#[test]
fn numeric_conversion_error_names_the_column() {
    let err = ExtractError::NumericConversion("payment_amount".to_string());
    assert!(err.to_string().contains("payment_amount"));
}

#[test]
fn extraction_date_parsing_helper_matches_calendar() {
    // Guard against key layout drift in the date portion.
    let key = totesys_types::keys::SnapshotKey::new(
        "payment",
        NaiveDate::from_ymd_opt(2023, 2, 11)
            .unwrap()
            .and_hms_opt(8, 0, 0)
            .unwrap(),
        "csv",
    );
    assert_eq!(key.to_key(), "payment/2023/02/11/payment_08:00:00.csv");
}
