//! MySQL implementation of the store gateway

use anyhow::{Context, Result};
use async_trait::async_trait;
use futures::TryStreamExt;
use sqlx::mysql::{MySqlConnectOptions, MySqlPool, MySqlPoolOptions, MySqlRow};
use sqlx::{Either, Executor, MySql, Row, Transaction};

use super::{Param, ResultSet, StoreGateway, call_statement, validate_procedure_name};
use crate::config::StoreConfig;

/// Single-connection MySQL store. One transaction is open at a time, started
/// by the first procedure call after a commit or rollback.
pub struct MySqlStore {
    pool: MySqlPool,
    tx: Option<Transaction<'static, MySql>>,
}

impl MySqlStore {
    /// Open the connection described by `config`
    pub async fn connect(config: &StoreConfig) -> Result<Self> {
        let mut options = MySqlConnectOptions::new()
            .host(&config.host)
            .port(config.port)
            .username(&config.username)
            .database(&config.database);
        if let Some(password) = &config.password {
            options = options.password(password);
        }

        let pool = MySqlPoolOptions::new()
            .max_connections(1)
            .connect_with(options)
            .await
            .with_context(|| {
                format!(
                    "Failed to connect to MySQL at {}:{}/{}",
                    config.host, config.port, config.database
                )
            })?;

        log::info!(
            "Connected to store {}:{}/{}",
            config.host,
            config.port,
            config.database
        );

        Ok(MySqlStore { pool, tx: None })
    }
}

#[async_trait]
impl StoreGateway for MySqlStore {
    async fn call_procedure(&mut self, name: &str, params: &[Param]) -> Result<Vec<ResultSet>> {
        validate_procedure_name(name)?;

        if self.tx.is_none() {
            let tx = self
                .pool
                .begin()
                .await
                .context("Failed to start transaction")?;
            self.tx = Some(tx);
        }
        let tx = self.tx.as_mut().context("No open transaction")?;

        let sql = call_statement(name, params.len());
        let mut query = sqlx::query(&sql);
        for param in params {
            query = match param {
                Param::Null => query.bind(None::<String>),
                Param::Text(s) => query.bind(s.clone()),
                Param::Int(i) => query.bind(*i),
            };
        }

        let mut items = Vec::new();
        let mut stream = (&mut **tx).fetch_many(query);
        while let Some(item) = stream
            .try_next()
            .await
            .with_context(|| format!("Failed to call procedure {}", name))?
        {
            items.push(match item {
                Either::Left(_) => Either::Left(()),
                Either::Right(row) => Either::Right(decode_row(&row)),
            });
        }
        let result_sets = group_result_sets(items);

        log::debug!(
            "Procedure {} returned {} result set(s)",
            name,
            result_sets.len()
        );

        Ok(result_sets)
    }

    async fn commit(&mut self) -> Result<()> {
        if let Some(tx) = self.tx.take() {
            tx.commit().await.context("Failed to commit transaction")?;
        }
        Ok(())
    }

    async fn rollback(&mut self) -> Result<()> {
        if let Some(tx) = self.tx.take() {
            tx.rollback().await.context("Failed to roll back transaction")?;
        }
        Ok(())
    }

    async fn close(&mut self) -> Result<()> {
        if self.tx.is_some() {
            log::warn!("Closing store with an open transaction, rolling back");
            if let Err(e) = self.rollback().await {
                log::warn!("{:#}", e);
            }
        }
        self.pool.close().await;
        log::info!("Store connection closed");
        Ok(())
    }
}

/// Split a statement's output into result sets. Each statement result
/// (`Left`) closes the rows before it; result sets without rows are dropped.
fn group_result_sets<I>(items: I) -> Vec<ResultSet>
where
    I: IntoIterator<Item = Either<(), Vec<Option<String>>>>,
{
    let mut result_sets = Vec::new();
    let mut current: ResultSet = Vec::new();
    for item in items {
        match item {
            Either::Left(()) => {
                if !current.is_empty() {
                    result_sets.push(std::mem::take(&mut current));
                }
            }
            Either::Right(row) => current.push(row),
        }
    }
    if !current.is_empty() {
        result_sets.push(current);
    }
    result_sets
}

fn decode_row(row: &MySqlRow) -> Vec<Option<String>> {
    (0..row.len()).map(|idx| decode_cell(row, idx)).collect()
}

/// Render a cell as text, trying the column types procedures commonly return
fn decode_cell(row: &MySqlRow, idx: usize) -> Option<String> {
    if let Ok(v) = row.try_get::<Option<String>, _>(idx) {
        return v;
    }
    if let Ok(v) = row.try_get::<Option<i64>, _>(idx) {
        return v.map(|i| i.to_string());
    }
    if let Ok(v) = row.try_get::<Option<u64>, _>(idx) {
        return v.map(|i| i.to_string());
    }
    if let Ok(v) = row.try_get::<Option<f64>, _>(idx) {
        return v.map(|f| f.to_string());
    }
    if let Ok(v) = row.try_get::<Option<chrono::NaiveDate>, _>(idx) {
        return v.map(|d| d.to_string());
    }
    if let Ok(v) = row.try_get::<Option<chrono::NaiveDateTime>, _>(idx) {
        return v.map(|dt| dt.to_string());
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(cells: &[Option<&str>]) -> Either<(), Vec<Option<String>>> {
        Either::Right(cells.iter().map(|c| c.map(str::to_string)).collect())
    }

    #[test]
    fn test_group_result_sets_splits_on_statement_results() {
        let items = vec![
            row(&[Some("1"), Some("a")]),
            row(&[Some("2"), None]),
            Either::Left(()),
            row(&[Some("ok")]),
            Either::Left(()),
            // Trailing status of the CALL itself
            Either::Left(()),
        ];

        let sets = group_result_sets(items);
        assert_eq!(sets.len(), 2);
        assert_eq!(sets[0].len(), 2);
        assert_eq!(sets[0][1], vec![Some("2".to_string()), None]);
        assert_eq!(sets[1], vec![vec![Some("ok".to_string())]]);
    }

    #[test]
    fn test_group_result_sets_drops_empty_sets() {
        assert!(group_result_sets(vec![Either::Left(()), Either::Left(())]).is_empty());
        assert!(group_result_sets(Vec::new()).is_empty());
    }

    #[test]
    fn test_group_result_sets_keeps_rows_without_trailing_status() {
        let sets = group_result_sets(vec![row(&[Some("x")])]);
        assert_eq!(sets, vec![vec![vec![Some("x".to_string())]]]);
    }
}
