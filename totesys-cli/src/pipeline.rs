use totesys_sink::PostgresWarehouse;
use totesys_storage::secrets::{EnvSecretFetcher, SecretFetcher, SecretsManagerFetcher};
use totesys_storage::{find_bucket, LocalStorage, S3Storage, Storage};
use totesys_transform::StaticCurrencyNames;
use totesys_types::chrono::Utc;
use totesys_types::models::Config;
use totesys_types::report::StageResponse;

use crate::errors::OrchestrationError;

/// Holds the resolved collaborators for one invocation. Storage and secret
/// backends are picked once from the config: AWS by default, the local
/// filesystem and environment when `local_root` is set.
pub struct Pipeline {
    config: Config,
    storage: Box<dyn Storage>,
    secrets: Box<dyn SecretFetcher>,
}

impl Pipeline {
    pub async fn new(config: Config) -> Self {
        let (storage, secrets): (Box<dyn Storage>, Box<dyn SecretFetcher>) =
            match &config.local_root {
                Some(root) => (
                    Box::new(LocalStorage::new(root)),
                    Box::new(EnvSecretFetcher),
                ),
                None => (
                    Box::new(S3Storage::from_env().await),
                    Box::new(SecretsManagerFetcher::from_env().await),
                ),
            };
        Self {
            config,
            storage,
            secrets,
        }
    }

    pub async fn extract(&self) -> Result<StageResponse, OrchestrationError> {
        let bucket =
            find_bucket(self.storage.as_ref(), &self.config.extract_bucket_prefix).await?;
        let secret = self.secrets.fetch(&self.config.source_secret).await?;
        let source = totesys_ingestion::PostgresSource::connect(&secret).await?;
        let report = totesys_ingestion::run(
            &source,
            self.storage.as_ref(),
            &bucket,
            Utc::now().naive_utc(),
        )
        .await?;
        Ok(StageResponse::from_extract(&report))
    }

    pub async fn transform(&self) -> Result<StageResponse, OrchestrationError> {
        let extract_bucket =
            find_bucket(self.storage.as_ref(), &self.config.extract_bucket_prefix).await?;
        let transform_bucket =
            find_bucket(self.storage.as_ref(), &self.config.transform_bucket_prefix).await?;
        let report = totesys_transform::run(
            self.storage.as_ref(),
            &extract_bucket,
            &transform_bucket,
            &StaticCurrencyNames,
            Utc::now().naive_utc(),
        )
        .await?;
        Ok(StageResponse::from_upload(&report))
    }

    pub async fn load(&self) -> Result<StageResponse, OrchestrationError> {
        let bucket =
            find_bucket(self.storage.as_ref(), &self.config.transform_bucket_prefix).await?;
        let secret = self.secrets.fetch(&self.config.warehouse_secret).await?;
        let mut sink = PostgresWarehouse::connect(&secret).await?;
        let report = totesys_sink::run(
            self.storage.as_ref(),
            &bucket,
            &mut sink,
            &self.config.warehouse_schema,
        )
        .await?;
        Ok(StageResponse::from_upload(&report))
    }

    /// The three stages back to back, the way the deployed chain runs them.
    pub async fn run_all(&self) -> Result<Vec<StageResponse>, OrchestrationError> {
        Ok(vec![
            self.extract().await?,
            self.transform().await?,
            self.load().await?,
        ])
    }
}
