// Netdash is open-source under the Apache License 2.0; see LICENSE for usage and contributions.
// Embedded SQLite store implementing both repository traits over one sqlx pool.

use std::str::FromStr;
use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions, SqliteRow};
use sqlx::{Row, SqlitePool};
use uuid::Uuid;

use crate::domain::instance::Instance;
use crate::domain::metric::Metric;

use super::{InstanceRepository, MetricRepository};

static MIGRATOR: sqlx::migrate::Migrator = sqlx::migrate!("./migrations");

fn parse_id(raw: &str, column: &str) -> Result<Uuid> {
    Uuid::parse_str(raw).with_context(|| format!("invalid uuid in {column}: {raw}"))
}

fn map_instance_row(row: &SqliteRow) -> Result<Instance> {
    let id: String = row.try_get("id")?;
    let name: String = row.try_get("name")?;
    let url: String = row.try_get("url")?;

    Ok(Instance {
        id: parse_id(&id, "instances.id")?,
        name,
        url,
    })
}

fn map_metric_row(row: &SqliteRow) -> Result<Metric> {
    let id: String = row.try_get("id")?;
    let instance_id: String = row.try_get("instance_id")?;
    let name: String = row.try_get("name")?;
    let selected: bool = row.try_get("selected")?;

    Ok(Metric {
        id: parse_id(&id, "metrics.id")?,
        name,
        instance_id: parse_id(&instance_id, "metrics.instance_id")?,
        selected,
    })
}

#[derive(Clone)]
pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    pub async fn connect(database_url: &str) -> Result<Self> {
        let options = SqliteConnectOptions::from_str(database_url)
            .with_context(|| format!("invalid DATABASE_URL {database_url}"))?
            .create_if_missing(true)
            .foreign_keys(true);

        // every connection to :memory: is its own database, so pin a single one
        let pool_options = if database_url.contains(":memory:") {
            SqlitePoolOptions::new()
                .max_connections(1)
                .idle_timeout(None::<Duration>)
                .max_lifetime(None::<Duration>)
        } else {
            SqlitePoolOptions::new().max_connections(5)
        };

        let pool = pool_options
            .connect_with(options)
            .await
            .context("failed to open sqlite database")?;

        MIGRATOR
            .run(&pool)
            .await
            .context("failed to run sqlite migrations")?;

        Ok(Self { pool })
    }
}

#[async_trait]
impl InstanceRepository for SqliteStore {
    async fn list(&self) -> Result<Vec<Instance>> {
        let rows = sqlx::query("SELECT id, name, url FROM instances ORDER BY rowid")
            .fetch_all(&self.pool)
            .await
            .context("failed to list instances")?;

        rows.iter().map(map_instance_row).collect()
    }

    async fn get(&self, id: Uuid) -> Result<Option<Instance>> {
        let row = sqlx::query("SELECT id, name, url FROM instances WHERE id = ?")
            .bind(id.to_string())
            .fetch_optional(&self.pool)
            .await
            .context("failed to fetch instance")?;

        row.as_ref().map(map_instance_row).transpose()
    }

    async fn insert(&self, instance: Instance) -> Result<()> {
        sqlx::query("INSERT INTO instances (id, name, url) VALUES (?, ?, ?)")
            .bind(instance.id.to_string())
            .bind(&instance.name)
            .bind(&instance.url)
            .execute(&self.pool)
            .await
            .context("failed to insert instance")?;
        Ok(())
    }

    async fn update(&self, instance: Instance) -> Result<bool> {
        let result = sqlx::query("UPDATE instances SET name = ?, url = ? WHERE id = ?")
            .bind(&instance.name)
            .bind(&instance.url)
            .bind(instance.id.to_string())
            .execute(&self.pool)
            .await
            .context("failed to update instance")?;
        Ok(result.rows_affected() > 0)
    }

    async fn delete(&self, id: Uuid) -> Result<bool> {
        let result = sqlx::query("DELETE FROM instances WHERE id = ?")
            .bind(id.to_string())
            .execute(&self.pool)
            .await
            .context("failed to delete instance")?;
        Ok(result.rows_affected() > 0)
    }

    async fn health_check(&self) -> Result<()> {
        sqlx::query("SELECT 1")
            .execute(&self.pool)
            .await
            .context("sqlite health check failed")?;
        Ok(())
    }
}

#[async_trait]
impl MetricRepository for SqliteStore {
    async fn list(&self) -> Result<Vec<Metric>> {
        let rows = sqlx::query("SELECT id, instance_id, name, selected FROM metrics ORDER BY rowid")
            .fetch_all(&self.pool)
            .await
            .context("failed to list metrics")?;

        rows.iter().map(map_metric_row).collect()
    }

    async fn list_for_instance(&self, instance_id: Uuid) -> Result<Vec<Metric>> {
        let rows = sqlx::query(
            r#"
            SELECT id, instance_id, name, selected
            FROM metrics
            WHERE instance_id = ?
            ORDER BY rowid
        "#,
        )
        .bind(instance_id.to_string())
        .fetch_all(&self.pool)
        .await
        .context("failed to list instance metrics")?;

        rows.iter().map(map_metric_row).collect()
    }

    async fn get(&self, id: Uuid) -> Result<Option<Metric>> {
        let row = sqlx::query("SELECT id, instance_id, name, selected FROM metrics WHERE id = ?")
            .bind(id.to_string())
            .fetch_optional(&self.pool)
            .await
            .context("failed to fetch metric")?;

        row.as_ref().map(map_metric_row).transpose()
    }

    async fn replace_for_instance(
        &self,
        instance_id: Uuid,
        metrics: Vec<Metric>,
    ) -> Result<bool> {
        let instance_key = instance_id.to_string();
        let mut tx = self.pool.begin().await.context("begin transaction")?;

        // the delete takes the write lock before the instance is checked
        sqlx::query("DELETE FROM metrics WHERE instance_id = ?")
            .bind(&instance_key)
            .execute(&mut *tx)
            .await
            .context("failed to clear instance metrics")?;

        let registered = sqlx::query("SELECT 1 FROM instances WHERE id = ?")
            .bind(&instance_key)
            .fetch_optional(&mut *tx)
            .await
            .context("failed to check instance")?
            .is_some();
        if !registered {
            tx.rollback().await.context("rollback metric replacement")?;
            return Ok(false);
        }

        for metric in &metrics {
            sqlx::query(
                "INSERT INTO metrics (id, instance_id, name, selected) VALUES (?, ?, ?, ?)",
            )
            .bind(metric.id.to_string())
            .bind(&instance_key)
            .bind(&metric.name)
            .bind(metric.selected)
            .execute(&mut *tx)
            .await
            .with_context(|| format!("failed to insert metric {}", metric.name))?;
        }

        tx.commit().await.context("commit metric replacement")?;
        Ok(true)
    }

    async fn toggle_selected(&self, id: Uuid) -> Result<Option<Metric>> {
        let row = sqlx::query(
            r#"
            UPDATE metrics SET selected = NOT selected
            WHERE id = ?
            RETURNING id, instance_id, name, selected
        "#,
        )
        .bind(id.to_string())
        .fetch_optional(&self.pool)
        .await
        .context("failed to toggle metric selection")?;

        row.as_ref().map(map_metric_row).transpose()
    }

    async fn select_only(&self, ids: &[Uuid]) -> Result<()> {
        let mut tx = self.pool.begin().await.context("begin transaction")?;

        sqlx::query("UPDATE metrics SET selected = 0")
            .execute(&mut *tx)
            .await
            .context("failed to clear selections")?;

        for id in ids {
            sqlx::query("UPDATE metrics SET selected = 1 WHERE id = ?")
                .bind(id.to_string())
                .execute(&mut *tx)
                .await
                .context("failed to select metric")?;
        }

        tx.commit().await.context("commit selection")?;
        Ok(())
    }

    async fn delete_for_instance(&self, instance_id: Uuid) -> Result<usize> {
        let result = sqlx::query("DELETE FROM metrics WHERE instance_id = ?")
            .bind(instance_id.to_string())
            .execute(&self.pool)
            .await
            .context("failed to delete instance metrics")?;
        Ok(result.rows_affected() as usize)
    }
}
