use async_trait::async_trait;
use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::Client;

use super::{Error, Storage};

/// S3-backed storage. One client serves every bucket the pipeline touches.
#[derive(Clone, Debug)]
pub struct S3Storage {
    client: Client,
}

impl S3Storage {
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    /// Builds a client from the ambient AWS environment (credentials chain,
    /// region), the way the deployed functions run.
    pub async fn from_env() -> Self {
        let config = aws_config::load_from_env().await;
        Self::new(Client::new(&config))
    }
}

#[async_trait]
impl Storage for S3Storage {
    async fn put_object(&self, bucket: &str, key: &str, data: Vec<u8>) -> Result<(), Error> {
        self.client
            .put_object()
            .bucket(bucket)
            .key(key)
            .body(ByteStream::from(data))
            .send()
            .await?;
        Ok(())
    }

    async fn get_object(&self, bucket: &str, key: &str) -> Result<Vec<u8>, Error> {
        let output = self
            .client
            .get_object()
            .bucket(bucket)
            .key(key)
            .send()
            .await?;
        let data = output
            .body
            .collect()
            .await
            .map_err(|e| Error::GetObjectBody(e.to_string()))?;
        Ok(data.into_bytes().to_vec())
    }

    async fn list_objects(&self, bucket: &str, prefix: Option<&str>) -> Result<Vec<String>, Error> {
        let mut keys = Vec::new();
        let mut continuation_token = None;
        loop {
            let mut request = self.client.list_objects_v2().bucket(bucket);
            if let Some(prefix) = prefix {
                request = request.prefix(prefix);
            }
            if let Some(token) = continuation_token {
                request = request.continuation_token(token);
            }
            let output = request.send().await?;
            keys.extend(
                output
                    .contents()
                    .unwrap_or_default()
                    .iter()
                    .filter_map(|object| object.key().map(ToString::to_string)),
            );
            match output.next_continuation_token() {
                Some(token) => continuation_token = Some(token.to_string()),
                None => break,
            }
        }
        Ok(keys)
    }

    async fn list_buckets(&self) -> Result<Vec<String>, Error> {
        let output = self.client.list_buckets().send().await?;
        Ok(output
            .buckets()
            .unwrap_or_default()
            .iter()
            .filter_map(|bucket| bucket.name().map(ToString::to_string))
            .collect())
    }
}
