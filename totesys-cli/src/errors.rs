use totesys_storage::secrets::SecretError;
use totesys_types::models::ConfigError;
use totesys_types::thiserror;

#[derive(Debug, thiserror::Error)]
pub enum OrchestrationError {
    #[error("configuration: {0}")]
    Config(#[from] ConfigError),
    #[error("storage: {0}")]
    Storage(#[from] totesys_storage::Error),
    #[error("secrets: {0}")]
    Secret(#[from] SecretError),
    #[error("extract stage: {0}")]
    Extract(#[from] totesys_ingestion::ExtractError),
    #[error("transform stage: {0}")]
    Transform(#[from] totesys_transform::TransformError),
    #[error("load stage: {0}")]
    Load(#[from] totesys_sink::LoadError),
    #[error("serialization: {0}")]
    Serialization(#[from] totesys_types::serde_json::Error),
}
