//! Networked-SQL backend (spec.md §4.7 "Backends: networked SQL"). Same
//! shape as [`crate::backends::sqlite::SqliteStore`], differing only in
//! pool type, JSON column type, and placeholder dialect.

use async_trait::async_trait;
use sqlx::{PgPool, Row};

use deployd_core::{Document, EngineError};

use crate::filter::{Filter, FindOptions, UpdateSpec};
use crate::sql::{render_order_limit, render_where, Dialect};
use crate::store::{DeleteResult, Store, UpdateResult};
use crate::update;

pub struct PostgresStore {
    pool: PgPool,
    table: String,
}

impl PostgresStore {
    pub fn new(pool: PgPool, collection: &str) -> Self {
        PostgresStore {
            pool,
            table: format!("collection_{collection}"),
        }
    }

    pub async fn ensure_table(&self) -> Result<(), EngineError> {
        let sql = format!(
            "CREATE TABLE IF NOT EXISTS {} (id TEXT PRIMARY KEY, seq BIGSERIAL, data JSONB NOT NULL)",
            self.table
        );
        sqlx::query(&sql)
            .execute(&self.pool)
            .await
            .map_err(|e| EngineError::Store(e.to_string()))?;
        Ok(())
    }

    fn decode_row(row: &sqlx::postgres::PgRow) -> Result<Document, EngineError> {
        let json: serde_json::Value = row.try_get("data").map_err(|e| EngineError::Store(e.to_string()))?;
        Document::from_json_object(json).ok_or_else(|| EngineError::Store("stored row is not an object".to_string()))
    }
}

#[async_trait]
impl Store for PostgresStore {
    async fn insert(&self, mut document: Document) -> Result<Document, EngineError> {
        let id = document.id().map(str::to_string).unwrap_or_else(|| self.create_unique_identifier());
        document.insert("id", deployd_core::Value::from(id.clone()));
        let sql = format!("INSERT INTO {} (id, data) VALUES ($1, $2)", self.table);
        sqlx::query(&sql)
            .bind(&id)
            .bind(document.to_json())
            .execute(&self.pool)
            .await
            .map_err(|e| EngineError::Store(e.to_string()))?;
        Ok(document)
    }

    async fn find(&self, filter: &Filter, options: &FindOptions) -> Result<Vec<Document>, EngineError> {
        let (where_sql, params) = render_where(Dialect::Postgres, filter);
        let order_limit_sql = render_order_limit(Dialect::Postgres, options).replace("rowid", "seq");
        let sql = format!("SELECT data FROM {} {where_sql} {order_limit_sql}", self.table);
        let mut query = sqlx::query(&sql);
        for param in &params {
            query = query.bind(param);
        }
        let rows = query.fetch_all(&self.pool).await.map_err(|e| EngineError::Store(e.to_string()))?;
        rows.iter().map(Self::decode_row).collect()
    }

    async fn find_one(&self, filter: &Filter) -> Result<Option<Document>, EngineError> {
        let options = FindOptions {
            limit: Some(1),
            ..Default::default()
        };
        Ok(self.find(filter, &options).await?.into_iter().next())
    }

    async fn update(&self, filter: &Filter, update_spec: &UpdateSpec) -> Result<UpdateResult, EngineError> {
        self.update_matching(filter, update_spec, false).await
    }

    async fn update_one(&self, filter: &Filter, update_spec: &UpdateSpec) -> Result<UpdateResult, EngineError> {
        self.update_matching(filter, update_spec, true).await
    }

    async fn remove(&self, filter: &Filter) -> Result<DeleteResult, EngineError> {
        let (where_sql, params) = render_where(Dialect::Postgres, filter);
        let sql = format!("DELETE FROM {} {where_sql}", self.table);
        let mut query = sqlx::query(&sql);
        for param in &params {
            query = query.bind(param);
        }
        let result = query.execute(&self.pool).await.map_err(|e| EngineError::Store(e.to_string()))?;
        Ok(DeleteResult {
            deleted: result.rows_affected(),
        })
    }

    async fn count(&self, filter: &Filter) -> Result<u64, EngineError> {
        let (where_sql, params) = render_where(Dialect::Postgres, filter);
        let sql = format!("SELECT COUNT(*) AS n FROM {} {where_sql}", self.table);
        let mut query = sqlx::query(&sql);
        for param in &params {
            query = query.bind(param);
        }
        let row = query.fetch_one(&self.pool).await.map_err(|e| EngineError::Store(e.to_string()))?;
        let n: i64 = row.try_get("n").map_err(|e| EngineError::Store(e.to_string()))?;
        Ok(n as u64)
    }
}

impl PostgresStore {
    /// `SELECT ... FOR UPDATE` pins the matched rows for the duration of the
    /// transaction, giving the same single-document atomicity guarantee as
    /// sqlite's whole-database write lock without serializing unrelated
    /// writers.
    async fn update_matching(
        &self,
        filter: &Filter,
        update_spec: &UpdateSpec,
        only_first: bool,
    ) -> Result<UpdateResult, EngineError> {
        let mut tx = self.pool.begin().await.map_err(|e| EngineError::Store(e.to_string()))?;
        let (where_sql, params) = render_where(Dialect::Postgres, filter);
        let sql = format!("SELECT id, data FROM {} {where_sql} FOR UPDATE", self.table);
        let mut query = sqlx::query(&sql);
        for param in &params {
            query = query.bind(param);
        }
        let rows = query.fetch_all(&mut *tx).await.map_err(|e| EngineError::Store(e.to_string()))?;

        let mut matched = 0u64;
        let mut modified = 0u64;
        for row in rows {
            if only_first && matched == 1 {
                break;
            }
            matched += 1;
            let id: String = row.try_get("id").map_err(|e| EngineError::Store(e.to_string()))?;
            let mut document = Self::decode_row(&row)?;
            update::apply(&mut document, update_spec);
            let update_sql = format!("UPDATE {} SET data = $1 WHERE id = $2", self.table);
            sqlx::query(&update_sql)
                .bind(document.to_json())
                .bind(&id)
                .execute(&mut *tx)
                .await
                .map_err(|e| EngineError::Store(e.to_string()))?;
            modified += 1;
        }
        tx.commit().await.map_err(|e| EngineError::Store(e.to_string()))?;
        Ok(UpdateResult { matched, modified })
    }
}
