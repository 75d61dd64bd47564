use std::path::PathBuf;

use async_trait::async_trait;
use aws_sdk_s3::{
    error::SdkError,
    operation::{
        get_object::GetObjectError, list_buckets::ListBucketsError,
        list_objects_v2::ListObjectsV2Error, put_object::PutObjectError,
    },
};
use totesys_types::thiserror;

/// The object-storage surface the pipeline needs: list keys under a prefix,
/// read a blob, write a blob. Buckets are addressed explicitly so one client
/// serves both the extract and transform areas.
#[async_trait]
pub trait Storage: Send + Sync {
    async fn put_object(&self, bucket: &str, key: &str, data: Vec<u8>) -> Result<(), Error>;

    async fn get_object(&self, bucket: &str, key: &str) -> Result<Vec<u8>, Error>;

    async fn list_objects(&self, bucket: &str, prefix: Option<&str>) -> Result<Vec<String>, Error>;

    async fn list_buckets(&self) -> Result<Vec<String>, Error>;
}

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("put object: {0}")]
    PutObject(#[from] SdkError<PutObjectError>),
    #[error("get object: {0}")]
    GetObject(#[from] SdkError<GetObjectError>),
    #[error("get object body: {0}")]
    GetObjectBody(String),
    #[error("list objects v2: {0}")]
    ListObjectsV2(#[from] SdkError<ListObjectsV2Error>),
    #[error("list buckets: {0}")]
    ListBuckets(#[from] SdkError<ListBucketsError>),
    #[error("no bucket found with prefix: {0}")]
    BucketNotFound(String),
    #[error("file system: {0}: {1}")]
    FileSystem(String, #[source] std::io::Error),
    #[error("non-utf8 path: {0:?}")]
    NonUtf8Path(PathBuf),
}

/// Finds the bucket whose name contains the given prefix. The deployment
/// provisions one extract and one transform bucket with randomised suffixes,
/// so a substring match is how each stage discovers its area.
pub async fn find_bucket(storage: &dyn Storage, prefix: &str) -> Result<String, Error> {
    storage
        .list_buckets()
        .await?
        .into_iter()
        .find(|name| name.contains(prefix))
        .ok_or_else(|| Error::BucketNotFound(prefix.to_string()))
}

mod s3;
pub use s3::S3Storage;

mod local;
pub use local::LocalStorage;

pub mod secrets;

#[cfg(test)]
mod tests;
