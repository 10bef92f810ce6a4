use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::Utc;
use rusqlite::{params, OptionalExtension};
use serde_json::Value;

use super::Database;
use crate::error::DetectionResult;
use crate::storage::KeyValueStore;

impl Database {
    pub async fn get_value(&self, key: &str) -> Result<Option<Value>> {
        let key = key.to_string();
        self.execute(move |conn| {
            let raw: Option<String> = conn
                .query_row(
                    "SELECT value FROM kv_store WHERE key = ?1",
                    params![key],
                    |row| row.get(0),
                )
                .optional()
                .with_context(|| format!("failed to read key {key}"))?;

            raw.map(|text| {
                serde_json::from_str(&text)
                    .with_context(|| format!("stored value for {key} is not valid JSON"))
            })
            .transpose()
        })
        .await
    }

    pub async fn set_value(&self, key: &str, value: &Value) -> Result<()> {
        let key = key.to_string();
        let serialized = serde_json::to_string(value)?;
        self.execute(move |conn| {
            conn.execute(
                "INSERT INTO kv_store (key, value, updated_at)
                 VALUES (?1, ?2, ?3)
                 ON CONFLICT(key) DO UPDATE SET value = excluded.value, updated_at = excluded.updated_at",
                params![key, serialized, Utc::now().to_rfc3339()],
            )
            .with_context(|| format!("failed to write key {key}"))?;
            Ok(())
        })
        .await
    }

    pub async fn remove_value(&self, key: &str) -> Result<()> {
        let key = key.to_string();
        self.execute(move |conn| {
            conn.execute("DELETE FROM kv_store WHERE key = ?1", params![key])
                .with_context(|| format!("failed to delete key {key}"))?;
            Ok(())
        })
        .await
    }
}

#[async_trait]
impl KeyValueStore for Database {
    async fn get(&self, key: &str) -> DetectionResult<Option<Value>> {
        Ok(self.get_value(key).await?)
    }

    async fn set(&self, key: &str, value: Value) -> DetectionResult<()> {
        Ok(self.set_value(key, &value).await?)
    }

    async fn remove(&self, key: &str) -> DetectionResult<()> {
        Ok(self.remove_value(key).await?)
    }
}
