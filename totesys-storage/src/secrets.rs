use async_trait::async_trait;
use aws_sdk_secretsmanager::{
    error::SdkError, operation::get_secret_value::GetSecretValueError, Client,
};
use serde::Deserialize;
use totesys_types::thiserror;

/// Connection parameters stored as a JSON secret. Ports sometimes arrive as
/// strings depending on who created the secret, so both forms are accepted.
#[derive(Clone, Debug, Deserialize, PartialEq, Eq)]
pub struct DbSecret {
    pub host: String,
    #[serde(deserialize_with = "port_from_string_or_number")]
    pub port: u16,
    pub user: String,
    pub password: String,
    pub database: String,
}

fn port_from_string_or_number<'de, D>(deserializer: D) -> Result<u16, D::Error>
where
    D: serde::Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Port {
        Number(u16),
        Text(String),
    }
    match Port::deserialize(deserializer)? {
        Port::Number(n) => Ok(n),
        Port::Text(s) => s.parse().map_err(serde::de::Error::custom),
    }
}

#[derive(Debug, thiserror::Error)]
pub enum SecretError {
    #[error("get secret value: {0}")]
    GetSecretValue(#[from] SdkError<GetSecretValueError>),
    #[error("secret {0} does not contain a SecretString")]
    MissingSecretString(String),
    #[error("secret {0} is not valid connection JSON: {1}")]
    InvalidSecret(String, #[source] serde_json::Error),
    #[error("missing environment variable: {0}")]
    MissingEnv(String),
    #[error("invalid value in environment variable {0}")]
    InvalidEnv(String),
}

/// Retrieval of database credentials by secret name.
#[async_trait]
pub trait SecretFetcher: Send + Sync {
    async fn fetch(&self, name: &str) -> Result<DbSecret, SecretError>;
}

/// AWS Secrets Manager implementation.
#[derive(Clone, Debug)]
pub struct SecretsManagerFetcher {
    client: Client,
}

impl SecretsManagerFetcher {
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    pub async fn from_env() -> Self {
        let config = aws_config::load_from_env().await;
        Self::new(Client::new(&config))
    }
}

#[async_trait]
impl SecretFetcher for SecretsManagerFetcher {
    async fn fetch(&self, name: &str) -> Result<DbSecret, SecretError> {
        let output = self
            .client
            .get_secret_value()
            .secret_id(name)
            .send()
            .await?;
        let raw = output
            .secret_string()
            .ok_or_else(|| SecretError::MissingSecretString(name.to_string()))?;
        serde_json::from_str(raw).map_err(|e| SecretError::InvalidSecret(name.to_string(), e))
    }
}

/// Environment-variable implementation for local runs: the secret name is
/// uppercased into a prefix, e.g. `totesys-connection` reads
/// `TOTESYS_CONNECTION_HOST`, `TOTESYS_CONNECTION_PORT` and so on.
#[derive(Clone, Debug, Default)]
pub struct EnvSecretFetcher;

impl EnvSecretFetcher {
    fn var(prefix: &str, suffix: &str) -> Result<String, SecretError> {
        let key = format!("{prefix}_{suffix}");
        std::env::var(&key).map_err(|_| SecretError::MissingEnv(key))
    }
}

#[async_trait]
impl SecretFetcher for EnvSecretFetcher {
    async fn fetch(&self, name: &str) -> Result<DbSecret, SecretError> {
        let prefix: String = name
            .chars()
            .map(|c| {
                if c.is_ascii_alphanumeric() {
                    c.to_ascii_uppercase()
                } else {
                    '_'
                }
            })
            .collect();
        let port = Self::var(&prefix, "PORT")?;
        Ok(DbSecret {
            host: Self::var(&prefix, "HOST")?,
            port: port
                .parse()
                .map_err(|_| SecretError::InvalidEnv(format!("{prefix}_PORT")))?,
            user: Self::var(&prefix, "USER")?,
            password: Self::var(&prefix, "PASSWORD")?,
            database: Self::var(&prefix, "DATABASE")?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn secret_json_accepts_numeric_port() {
        let secret: DbSecret = serde_json::from_str(
            r#"{"host":"db","port":5432,"user":"u","password":"p","database":"totesys"}"#,
        )
        .unwrap();
        assert_eq!(secret.port, 5432);
    }

    #[test]
    fn secret_json_accepts_string_port() {
        let secret: DbSecret = serde_json::from_str(
            r#"{"host":"db","port":"5432","user":"u","password":"p","database":"totesys"}"#,
        )
        .unwrap();
        assert_eq!(secret.port, 5432);
    }

    #[test]
    fn malformed_secret_is_reported_by_name() {
        let err = serde_json::from_str::<DbSecret>(r#"{"host":"db"}"#).unwrap_err();
        let err = SecretError::InvalidSecret("my-secret".to_string(), err);
        assert!(err.to_string().contains("my-secret"));
    }
}
