use anyhow::{Context, Result};
use async_trait::async_trait;
use log::{LevelFilter, debug, info};
use sqlx::mysql::{MySqlArguments, MySqlConnectOptions, MySqlPool, MySqlPoolOptions};
use sqlx::query::Query;
use sqlx::{ConnectOptions, Connection, MySql};

use super::TableStore;
use super::sql::{create_database_sql, create_table_sql, upsert_sql};
use crate::config::StoreConfig;
use crate::flatten::FieldValue;
use crate::schema::ColumnSpec;

/// [`TableStore`] writing to a MySQL database over a single connection
pub struct MySqlStore {
    pool: MySqlPool,
}

impl MySqlStore {
    /// Create the target database if needed and connect to it
    pub async fn connect(config: &StoreConfig) -> Result<Self> {
        let mut options = MySqlConnectOptions::new()
            .host(&config.host)
            .port(config.port)
            .username(&config.user)
            .charset("utf8mb4")
            .log_statements(LevelFilter::Debug);
        if let Some(password) = &config.password {
            options = options.password(password);
        }

        debug!("Connecting to MySQL at {}:{}", config.host, config.port);
        let mut conn = options
            .connect()
            .await
            .with_context(|| format!("Failed to connect to MySQL at {}", config.host))?;
        sqlx::raw_sql(&create_database_sql(&config.database))
            .execute(&mut conn)
            .await
            .with_context(|| format!("Failed to create database '{}'", config.database))?;
        conn.close().await?;
        info!("Database '{}' verified in MySQL", config.database);

        let pool = MySqlPoolOptions::new()
            .max_connections(1)
            .connect_with(options.database(&config.database))
            .await
            .with_context(|| format!("Failed to open database '{}'", config.database))?;

        Ok(Self { pool })
    }

    pub fn pool(&self) -> &MySqlPool {
        &self.pool
    }

    pub async fn close(&self) {
        self.pool.close().await;
    }
}

fn bind_value<'q>(
    query: Query<'q, MySql, MySqlArguments>,
    value: &'q FieldValue,
) -> Query<'q, MySql, MySqlArguments> {
    match value {
        FieldValue::Null => query.bind(None::<String>),
        FieldValue::Integer(i) => query.bind(*i),
        FieldValue::Float(f) => query.bind(*f),
        FieldValue::Text(s) | FieldValue::Nested(s) => query.bind(s.as_str()),
    }
}

#[async_trait]
impl TableStore for MySqlStore {
    async fn create_table(&self, table: &str, spec: &ColumnSpec) -> Result<(), sqlx::Error> {
        let statement = create_table_sql(table, spec);
        debug!("{}: {}", table, statement);
        sqlx::raw_sql(&statement).execute(&self.pool).await?;
        Ok(())
    }

    async fn write_batch(
        &self,
        table: &str,
        spec: &ColumnSpec,
        rows: &[Vec<FieldValue>],
    ) -> Result<(), sqlx::Error> {
        let statement = upsert_sql(table, spec);
        let mut tx = self.pool.begin().await?;

        for row in rows {
            let query = row
                .iter()
                .fold(sqlx::query(&statement), |query, value| bind_value(query, value));
            query.execute(&mut *tx).await?;
        }

        tx.commit().await
    }
}
