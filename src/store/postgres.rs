//! Postgres store implementation via SQLx.
//!
//! Every [`ItemStore`] method is a single SQL statement, so each engine
//! operation is one store round trip. The conditional find-and-modify locks
//! its candidate row inside the statement (`FOR UPDATE SKIP LOCKED`), which
//! gives the at-most-one-claimer guarantee: a row locked by one racing
//! caller is invisible to the others.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::PgPoolOptions;
use sqlx::{PgPool, Postgres, QueryBuilder};
use uuid::Uuid;

use super::{Filter, ItemStore, Patch};
use crate::error::{Error, Result};
use crate::model::{Item, ItemId};

/// Postgres-backed item store. Owns the connection pool and the namespace
/// (table name) all statements run against.
pub struct PgStore {
    pool: PgPool,
    table: String,
}

impl PgStore {
    /// Connect to Postgres and create a connection pool.
    ///
    /// The namespace becomes the table name, so it must be a plain SQL
    /// identifier; anything else is rejected here, before any statement
    /// embeds it.
    pub async fn connect(url: &str, namespace: &str) -> Result<Self> {
        let table = valid_namespace(namespace)?;
        let pool = PgPoolOptions::new()
            .max_connections(10)
            .connect(url)
            .await?;
        Ok(Self { pool, table })
    }

    /// Build a store from an existing pool (shared with other components).
    pub fn with_pool(pool: PgPool, namespace: &str) -> Result<Self> {
        let table = valid_namespace(namespace)?;
        Ok(Self { pool, table })
    }

    /// Create the item table and its composite indexes if absent. Idempotent.
    ///
    /// Setup step, run once at deploy or test start; engine operations assume
    /// the schema exists and never touch it.
    pub async fn ensure_schema(&self) -> Result<()> {
        let t = &self.table;
        sqlx::query(&format!(
            "CREATE TABLE IF NOT EXISTS {t} (
                 id UUID PRIMARY KEY DEFAULT gen_random_uuid(),
                 status TEXT NOT NULL,
                 run_date TIMESTAMPTZ NOT NULL,
                 heartbeat TIMESTAMPTZ,
                 payload JSONB NOT NULL DEFAULT 'null'::jsonb
             )"
        ))
        .execute(&self.pool)
        .await?;

        // Claim scans filter on (status, run_date) and (status, heartbeat).
        sqlx::query(&format!(
            "CREATE INDEX IF NOT EXISTS {t}_status_run_date_idx ON {t} (status, run_date)"
        ))
        .execute(&self.pool)
        .await?;
        sqlx::query(&format!(
            "CREATE INDEX IF NOT EXISTS {t}_status_heartbeat_idx ON {t} (status, heartbeat)"
        ))
        .execute(&self.pool)
        .await?;

        tracing::debug!(table = %t, "schema ensured");
        Ok(())
    }

    /// Simple health check — run a SELECT 1.
    pub async fn health_check(&self) -> Result<()> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

#[async_trait]
impl ItemStore for PgStore {
    async fn insert(&self, item: &Item) -> Result<Item> {
        let row: ItemRow = sqlx::query_as(&format!(
            "INSERT INTO {} (status, run_date, heartbeat, payload)
             VALUES ($1, $2, $3, $4)
             RETURNING id, status, run_date, heartbeat, payload",
            self.table
        ))
        .bind(item.status.as_str())
        .bind(item.run_date)
        .bind(item.heartbeat)
        .bind(&item.payload)
        .fetch_one(&self.pool)
        .await?;

        row.try_into_item()
    }

    async fn find_one_and_update(&self, filter: &Filter, patch: &Patch) -> Result<Option<Item>> {
        let mut qb: QueryBuilder<Postgres> =
            QueryBuilder::new(format!("WITH candidate AS (SELECT id FROM {} WHERE ", self.table));
        push_filter(&mut qb, filter);
        qb.push(" LIMIT 1 FOR UPDATE SKIP LOCKED) UPDATE ");
        qb.push(&self.table);
        qb.push(" AS t SET ");
        push_patch(&mut qb, patch);
        qb.push(
            " FROM candidate WHERE t.id = candidate.id
              RETURNING t.id, t.status, t.run_date, t.heartbeat, t.payload",
        );

        let row: Option<ItemRow> = qb.build_query_as().fetch_optional(&self.pool).await?;
        row.map(ItemRow::try_into_item).transpose()
    }

    async fn delete(&self, id: ItemId) -> Result<bool> {
        let result = sqlx::query(&format!("DELETE FROM {} WHERE id = $1", self.table))
            .bind(id.0)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn count(&self, filter: &Filter) -> Result<u64> {
        let mut qb: QueryBuilder<Postgres> =
            QueryBuilder::new(format!("SELECT count(*) FROM {} WHERE ", self.table));
        push_filter(&mut qb, filter);

        let (count,): (i64,) = qb.build_query_as().fetch_one(&self.pool).await?;
        Ok(count as u64)
    }
}

/// Render a [`Filter`] as a WHERE fragment with bound parameters. Must agree
/// with `Filter::matches`; in particular a NULL heartbeat fails every
/// heartbeat comparison, which SQL three-valued logic already gives us.
fn push_filter(qb: &mut QueryBuilder<'_, Postgres>, filter: &Filter) {
    match filter {
        Filter::Status(status) => {
            qb.push("status = ");
            qb.push_bind(status.as_str());
        }
        Filter::Id(id) => {
            qb.push("id = ");
            qb.push_bind(id.0);
        }
        Filter::RunDateAtOrBefore(t) => {
            qb.push("run_date <= ");
            qb.push_bind(*t);
        }
        Filter::RunDateBefore(t) => {
            qb.push("run_date < ");
            qb.push_bind(*t);
        }
        Filter::HeartbeatEq(t) => {
            qb.push("heartbeat = ");
            qb.push_bind(*t);
        }
        Filter::HeartbeatBefore(t) => {
            qb.push("heartbeat < ");
            qb.push_bind(*t);
        }
        Filter::And(fs) => push_composite(qb, fs, " AND ", "TRUE"),
        Filter::Or(fs) => push_composite(qb, fs, " OR ", "FALSE"),
    }
}

fn push_composite(qb: &mut QueryBuilder<'_, Postgres>, fs: &[Filter], joiner: &str, empty: &str) {
    if fs.is_empty() {
        qb.push(empty);
        return;
    }
    qb.push("(");
    for (i, f) in fs.iter().enumerate() {
        if i > 0 {
            qb.push(joiner);
        }
        push_filter(qb, f);
    }
    qb.push(")");
}

/// Render a [`Patch`] as a SET clause. An empty patch still needs a valid
/// assignment, so it degrades to a self-assignment.
fn push_patch(qb: &mut QueryBuilder<'_, Postgres>, patch: &Patch) {
    let mut sep = qb.separated(", ");
    if let Some(status) = patch.status {
        sep.push("status = ");
        sep.push_bind_unseparated(status.as_str());
    }
    if let Some(run_date) = patch.run_date {
        sep.push("run_date = ");
        sep.push_bind_unseparated(run_date);
    }
    if let Some(heartbeat) = patch.heartbeat {
        sep.push("heartbeat = ");
        sep.push_bind_unseparated(heartbeat);
    }
    if patch.status.is_none() && patch.run_date.is_none() && patch.heartbeat.is_none() {
        sep.push("status = t.status");
    }
}

/// Accept only plain SQL identifiers as the namespace.
fn valid_namespace(namespace: &str) -> Result<String> {
    let mut chars = namespace.chars();
    let head_ok = chars
        .next()
        .is_some_and(|c| c.is_ascii_alphabetic() || c == '_');
    let tail_ok = chars.all(|c| c.is_ascii_alphanumeric() || c == '_');
    if head_ok && tail_ok && namespace.len() <= 63 {
        Ok(namespace.to_string())
    } else {
        Err(Error::Config(format!(
            "namespace must be a plain SQL identifier, got {namespace:?}"
        )))
    }
}

/// Internal row type for sqlx::FromRow.
#[derive(sqlx::FromRow)]
struct ItemRow {
    id: Uuid,
    status: String,
    run_date: DateTime<Utc>,
    heartbeat: Option<DateTime<Utc>>,
    payload: serde_json::Value,
}

impl ItemRow {
    fn try_into_item(self) -> Result<Item> {
        Ok(Item {
            id: Some(ItemId(self.id)),
            run_date: self.run_date,
            heartbeat: self.heartbeat,
            status: self.status.parse()?,
            payload: self.payload,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn namespace_must_be_identifier() {
        assert!(valid_namespace("leaseq_items").is_ok());
        assert!(valid_namespace("_private2").is_ok());
        assert!(valid_namespace("2fast").is_err());
        assert!(valid_namespace("items; DROP TABLE users").is_err());
        assert!(valid_namespace("").is_err());
    }
}
