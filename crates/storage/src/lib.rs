use anyhow::{anyhow, Context, Result};
use chrono::{DateTime, Utc};
use shared::{
    domain::{HistoryId, Tone},
    protocol::{HistoryEntry, NewHistoryEntry},
};
use sqlx::{
    sqlite::{SqliteConnectOptions, SqlitePoolOptions, SqliteRow},
    Pool, Row, Sqlite,
};
use std::{
    fs,
    path::{Path, PathBuf},
    str::FromStr,
};
use tracing::debug;

/// SQLite-backed store of rephrase history entries.
#[derive(Clone)]
pub struct Storage {
    pool: Pool<Sqlite>,
}

impl Storage {
    pub async fn new(database_url: &str) -> Result<Self> {
        ensure_sqlite_parent_dir_exists(database_url)?;

        let connect_options = SqliteConnectOptions::from_str(database_url)?.create_if_missing(true);
        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect_with(connect_options)
            .await?;
        sqlx::migrate!("./migrations").run(&pool).await?;
        Ok(Self { pool })
    }

    pub async fn health_check(&self) -> Result<()> {
        let _: i64 = sqlx::query_scalar("SELECT 1")
            .fetch_one(&self.pool)
            .await
            .context("sqlite ping failed")?;
        Ok(())
    }

    /// Persists a new entry, assigning its id and timestamp.
    pub async fn insert_history(&self, new_entry: &NewHistoryEntry) -> Result<HistoryEntry> {
        let entry = HistoryEntry {
            id: HistoryId::new_v4(),
            original_text: new_entry.original_text.clone(),
            rephrased_text: new_entry.rephrased_text.clone(),
            tone: new_entry.tone,
            timestamp: Utc::now(),
        };

        sqlx::query(
            "INSERT INTO history (id, original_text, rephrased_text, tone, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5)",
        )
        .bind(entry.id.to_string())
        .bind(&entry.original_text)
        .bind(&entry.rephrased_text)
        .bind(entry.tone.as_str())
        .bind(entry.timestamp)
        .execute(&self.pool)
        .await
        .context("failed to insert history entry")?;

        debug!(history_id = %entry.id, tone = %entry.tone, "history entry stored");
        Ok(entry)
    }

    /// Newest entries first, at most `limit` of them.
    pub async fn list_history(&self, limit: u32) -> Result<Vec<HistoryEntry>> {
        let rows = sqlx::query(
            "SELECT id, original_text, rephrased_text, tone, created_at
             FROM history
             ORDER BY created_at DESC, rowid DESC
             LIMIT ?1",
        )
        .bind(i64::from(limit))
        .fetch_all(&self.pool)
        .await
        .context("failed to list history entries")?;

        rows.iter().map(history_entry_from_row).collect()
    }

    /// Returns `false` when no entry had the given id.
    pub async fn delete_history(&self, id: HistoryId) -> Result<bool> {
        let result = sqlx::query("DELETE FROM history WHERE id = ?1")
            .bind(id.to_string())
            .execute(&self.pool)
            .await
            .context("failed to delete history entry")?;
        Ok(result.rows_affected() > 0)
    }
}

fn history_entry_from_row(row: &SqliteRow) -> Result<HistoryEntry> {
    let raw_id: String = row.try_get("id")?;
    let raw_tone: String = row.try_get("tone")?;
    Ok(HistoryEntry {
        id: raw_id
            .parse()
            .map_err(|e| anyhow!("corrupt history id '{raw_id}': {e}"))?,
        original_text: row.try_get("original_text")?,
        rephrased_text: row.try_get("rephrased_text")?,
        tone: raw_tone.parse::<Tone>()?,
        timestamp: row.try_get::<DateTime<Utc>, _>("created_at")?,
    })
}

fn ensure_sqlite_parent_dir_exists(database_url: &str) -> Result<()> {
    let Some(path) = sqlite_path(database_url) else {
        return Ok(());
    };

    let Some(parent) = path.parent() else {
        return Ok(());
    };

    fs::create_dir_all(parent).with_context(|| {
        format!(
            "failed to create parent directory '{}' for database url '{database_url}'",
            parent.display()
        )
    })?;

    Ok(())
}

fn sqlite_path(database_url: &str) -> Option<PathBuf> {
    if database_url.starts_with("sqlite::memory:") || !database_url.starts_with("sqlite:") {
        return None;
    }

    let path = database_url
        .trim_start_matches("sqlite://")
        .trim_start_matches("sqlite:")
        .split('?')
        .next()
        .unwrap_or_default();

    if path.is_empty() {
        return None;
    }

    Some(Path::new(path).to_path_buf())
}

#[cfg(test)]
#[path = "tests/lib_tests.rs"]
mod tests;
