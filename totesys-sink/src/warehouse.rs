use async_trait::async_trait;
use tokio_postgres::types::ToSql;
use tokio_postgres::{Client, NoTls};
use totesys_storage::secrets::DbSecret;
use totesys_types::chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use totesys_types::log::{error, info};
use totesys_types::tables::WarehouseTable;
use totesys_types::types::{Field, FieldKind, TableData};

use crate::LoadError;

/// Append access to the analytic warehouse. One call covers the whole load
/// cycle so implementations can make it transactional.
#[async_trait]
pub trait WarehouseSink: Send {
    /// Appends every batch into its table within `schema`, all or nothing.
    async fn append_batches(
        &mut self,
        schema: &str,
        batches: &[(WarehouseTable, TableData)],
    ) -> Result<(), LoadError>;
}

/// `tokio-postgres` implementation against the warehouse database.
pub struct PostgresWarehouse {
    client: Client,
}

impl PostgresWarehouse {
    pub async fn connect(secret: &DbSecret) -> Result<Self, LoadError> {
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
                error!("warehouse connection error: {e}");
            }
        });
        Ok(Self { client })
    }
}

#[async_trait]
impl WarehouseSink for PostgresWarehouse {
    async fn append_batches(
        &mut self,
        schema: &str,
        batches: &[(WarehouseTable, TableData)],
    ) -> Result<(), LoadError> {
        let tx = self.client.transaction().await?;
        for (table, data) in batches {
            let statement = tx
                .prepare(&insert_statement(schema, table.name(), data.columns()))
                .await?;
            let kinds = data.column_kinds();
            for row in data.rows() {
                let params: Vec<Box<dyn ToSql + Sync + Send>> = row
                    .iter()
                    .zip(&kinds)
                    .map(|(field, kind)| sql_param(field, *kind))
                    .collect();
                let refs: Vec<&(dyn ToSql + Sync)> =
                    params.iter().map(|p| p.as_ref() as _).collect();
                tx.execute(&statement, &refs).await?;
            }
            info!("appended {} rows into {schema}.{table}", data.num_rows());
        }
        tx.commit().await?;
        Ok(())
    }
}

/// Builds the per-table insert. Identifiers cannot be bound as parameters,
/// so they are quoted into the statement; values go through placeholders.
pub fn insert_statement(schema: &str, table: &str, columns: &[String]) -> String {
    let names = columns
        .iter()
        .map(|c| format!("\"{c}\""))
        .collect::<Vec<_>>()
        .join(", ");
    let placeholders = (1..=columns.len())
        .map(|i| format!("${i}"))
        .collect::<Vec<_>>()
        .join(", ");
    format!("INSERT INTO \"{schema}\".\"{table}\" ({names}) VALUES ({placeholders})")
}

/// Lowers a cell into a SQL parameter. Nulls need the column's inferred
/// type so the driver can pick a concrete wire type for them.
fn sql_param(field: &Field, kind: FieldKind) -> Box<dyn ToSql + Sync + Send> {
    match field {
        Field::Int(i) => Box::new(*i),
        Field::Float(f) => Box::new(*f),
        Field::Boolean(b) => Box::new(*b),
        Field::String(s) => Box::new(s.clone()),
        Field::Date(d) => Box::new(*d),
        Field::Time(t) => Box::new(*t),
        Field::Timestamp(ts) => Box::new(*ts),
        Field::Null => match kind {
            FieldKind::Int => Box::new(None::<i64>),
            FieldKind::Float => Box::new(None::<f64>),
            FieldKind::Boolean => Box::new(None::<bool>),
            FieldKind::String => Box::new(None::<String>),
            FieldKind::Date => Box::new(None::<NaiveDate>),
            FieldKind::Time => Box::new(None::<NaiveTime>),
            FieldKind::Timestamp => Box::new(None::<NaiveDateTime>),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn insert_statement_quotes_identifiers_and_numbers_placeholders() {
        let sql = insert_statement(
            "project_team",
            "dim_design",
            &[
                "design_id".to_string(),
                "design_name".to_string(),
                "file_name".to_string(),
            ],
        );
        assert_eq!(
            sql,
            "INSERT INTO \"project_team\".\"dim_design\" \
             (\"design_id\", \"design_name\", \"file_name\") VALUES ($1, $2, $3)"
        );
    }
}
