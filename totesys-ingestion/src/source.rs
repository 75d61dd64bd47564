use async_trait::async_trait;
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use tokio_postgres::types::Type;
use tokio_postgres::{Client, NoTls, Row};
use totesys_storage::secrets::DbSecret;
use totesys_types::chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, Utc};
use totesys_types::log::error;
use totesys_types::types::Field;

use crate::ExtractError;

/// Read access to the operational source database.
#[async_trait]
pub trait SourceDatabase: Send + Sync {
    /// Names of the base tables in the public schema.
    async fn list_tables(&self) -> Result<Vec<String>, ExtractError>;

    /// Column names of a table, in ordinal order.
    async fn columns(&self, table: &str) -> Result<Vec<String>, ExtractError>;

    /// Rows of a table whose `last_updated` is at or past `since`. Tables
    /// without audit columns ignore `since` and return everything.
    async fn select_changed(
        &self,
        table: &str,
        since: NaiveDateTime,
    ) -> Result<Vec<Vec<Field>>, ExtractError>;
}

/// `tokio-postgres` implementation against the live Totesys database.
pub struct PostgresSource {
    client: Client,
}

impl PostgresSource {
    /// Connects and drives the connection on a background task. Dropping
    /// the source closes the connection, so cleanup happens on every exit
    /// path.
    pub async fn connect(secret: &DbSecret) -> Result<Self, ExtractError> {
        let mut config = tokio_postgres::Config::new();
        config
            .host(&secret.host)
            .port(secret.port)
            .user(&secret.user)
            .password(&secret.password)
            .dbname(&secret.database);
        let (client, connection) = config.connect(NoTls).await?;
        tokio::spawn(async move {
            if let Err(e) = connection.await {
                error!("source connection error: {e}");
            }
        });
        Ok(Self { client })
    }

    async fn has_column(&self, table: &str, column: &str) -> Result<bool, ExtractError> {
        let row = self
            .client
            .query_one(
                "SELECT count(*) FROM information_schema.columns \
                 WHERE table_schema = 'public' AND table_name = $1 AND column_name = $2",
                &[&table, &column],
            )
            .await?;
        Ok(row.get::<_, i64>(0) > 0)
    }
}

#[async_trait]
impl SourceDatabase for PostgresSource {
    async fn list_tables(&self) -> Result<Vec<String>, ExtractError> {
        let rows = self
            .client
            .query(
                "SELECT table_name FROM information_schema.tables \
                 WHERE table_schema = 'public' AND table_type = 'BASE TABLE' \
                 ORDER BY table_name",
                &[],
            )
            .await?;
        Ok(rows.iter().map(|row| row.get(0)).collect())
    }

    async fn columns(&self, table: &str) -> Result<Vec<String>, ExtractError> {
        let rows = self
            .client
            .query(
                "SELECT column_name FROM information_schema.columns \
                 WHERE table_schema = 'public' AND table_name = $1 \
                 ORDER BY ordinal_position",
                &[&table],
            )
            .await?;
        Ok(rows.iter().map(|row| row.get(0)).collect())
    }

    async fn select_changed(
        &self,
        table: &str,
        since: NaiveDateTime,
    ) -> Result<Vec<Vec<Field>>, ExtractError> {
        // Table names come straight from information_schema, but quote them
        // anyway; identifiers cannot be bound as parameters.
        let rows = if self.has_column(table, "last_updated").await? {
            let query = format!("SELECT * FROM \"{table}\" WHERE last_updated >= $1");
            self.client.query(&query, &[&since]).await?
        } else {
            let query = format!("SELECT * FROM \"{table}\"");
            self.client.query(&query, &[]).await?
        };
        rows.iter().map(fields_from_row).collect()
    }
}

fn fields_from_row(row: &Row) -> Result<Vec<Field>, ExtractError> {
    (0..row.len()).map(|idx| field_from_row(row, idx)).collect()
}

fn field_from_row(row: &Row, idx: usize) -> Result<Field, ExtractError> {
    let ty = row.columns()[idx].type_();
    let field = if *ty == Type::INT2 {
        row.try_get::<_, Option<i16>>(idx)?
            .map(|v| Field::Int(v.into()))
    } else if *ty == Type::INT4 {
        row.try_get::<_, Option<i32>>(idx)?
            .map(|v| Field::Int(v.into()))
    } else if *ty == Type::INT8 {
        row.try_get::<_, Option<i64>>(idx)?.map(Field::Int)
    } else if *ty == Type::FLOAT4 {
        row.try_get::<_, Option<f32>>(idx)?
            .map(|v| Field::Float(v.into()))
    } else if *ty == Type::FLOAT8 {
        row.try_get::<_, Option<f64>>(idx)?.map(Field::Float)
    } else if *ty == Type::NUMERIC {
        match row.try_get::<_, Option<Decimal>>(idx)? {
            Some(v) => {
                let v = v.to_f64().ok_or_else(|| {
                    ExtractError::NumericConversion(row.columns()[idx].name().to_string())
                })?;
                Some(Field::Float(v))
            }
            None => None,
        }
    } else if *ty == Type::BOOL {
        row.try_get::<_, Option<bool>>(idx)?.map(Field::Boolean)
    } else if *ty == Type::DATE {
        row.try_get::<_, Option<NaiveDate>>(idx)?.map(Field::Date)
    } else if *ty == Type::TIME {
        row.try_get::<_, Option<NaiveTime>>(idx)?.map(Field::Time)
    } else if *ty == Type::TIMESTAMP {
        row.try_get::<_, Option<NaiveDateTime>>(idx)?
            .map(Field::Timestamp)
    } else if *ty == Type::TIMESTAMPTZ {
        row.try_get::<_, Option<DateTime<Utc>>>(idx)?
            .map(|v| Field::Timestamp(v.naive_utc()))
    } else {
        row.try_get::<_, Option<String>>(idx)?.map(Field::String)
    };
    Ok(field.unwrap_or(Field::Null))
}
