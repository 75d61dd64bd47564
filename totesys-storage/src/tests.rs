use tempdir::TempDir;

use super::*;

pub(crate) fn create_storage() -> (TempDir, LocalStorage) {
    let temp_dir = TempDir::new("totesys-storage").unwrap();
    let storage = LocalStorage::new(temp_dir.path());
    (temp_dir, storage)
}

#[tokio::test]
async fn put_then_get_round_trips() {
    let (_temp_dir, storage) = create_storage();
    storage
        .put_object("extract-bucket", "payment/2023/02/07/payment_09:05:03.csv", b"a,b\n1,2\n".to_vec())
        .await
        .unwrap();
    let data = storage
        .get_object("extract-bucket", "payment/2023/02/07/payment_09:05:03.csv")
        .await
        .unwrap();
    assert_eq!(data, b"a,b\n1,2\n".to_vec());
}

#[tokio::test]
async fn list_objects_filters_by_prefix_and_sorts() {
    let (_temp_dir, storage) = create_storage();
    for key in [
        "staff/2023/02/08/staff_10:00:00.csv",
        "payment/2023/02/07/payment_09:05:03.csv",
        "payment/2023/02/08/payment_11:00:00.csv",
    ] {
        storage
            .put_object("extract-bucket", key, vec![0])
            .await
            .unwrap();
    }

    let all = storage.list_objects("extract-bucket", None).await.unwrap();
    assert_eq!(all.len(), 3);
    assert!(all.windows(2).all(|w| w[0] <= w[1]));

    let payments = storage
        .list_objects("extract-bucket", Some("payment/"))
        .await
        .unwrap();
    assert_eq!(
        payments,
        vec![
            "payment/2023/02/07/payment_09:05:03.csv".to_string(),
            "payment/2023/02/08/payment_11:00:00.csv".to_string(),
        ]
    );
}

#[tokio::test]
async fn listing_a_missing_bucket_is_empty_not_an_error() {
    let (_temp_dir, storage) = create_storage();
    let keys = storage.list_objects("nowhere", None).await.unwrap();
    assert!(keys.is_empty());
}

#[tokio::test]
async fn find_bucket_matches_by_substring() {
    let (_temp_dir, storage) = create_storage();
    storage.create_bucket("team-extract-20230207").unwrap();
    storage.create_bucket("team-transform-20230207").unwrap();

    let bucket = find_bucket(&storage, "extract").await.unwrap();
    assert_eq!(bucket, "team-extract-20230207");

    let err = find_bucket(&storage, "load").await.unwrap_err();
    assert!(matches!(err, Error::BucketNotFound(prefix) if prefix == "load"));
}
