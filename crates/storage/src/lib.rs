use anyhow::{Context, Result};
use async_trait::async_trait;
use board_core::{random_id, ChangeSink, OrderIndex};
use chrono::{DateTime, Utc};
use shared::{
    domain::{Group, GroupId, Item, NodeKey},
    protocol::{BoardChange, Patch},
};
use sqlx::{
    sqlite::{SqliteConnectOptions, SqlitePoolOptions},
    Pool, Row, Sqlite, Transaction,
};
use std::{
    fs,
    path::{Path, PathBuf},
    str::FromStr,
};
use tracing::debug;

#[derive(Clone)]
pub struct Storage {
    pool: Pool<Sqlite>,
}

#[derive(Debug, Clone)]
pub struct StoredChange {
    pub id: i64,
    pub change: BoardChange,
    pub applied_at: DateTime<Utc>,
}

/// Everything needed to boot a board: groups first, then items and order.
#[derive(Debug, Clone)]
pub struct StoredBoard {
    pub groups: Vec<Group>,
    pub items: Vec<Item>,
    pub order: OrderIndex,
}

impl Storage {
    pub async fn new(database_url: &str) -> Result<Self> {
        ensure_sqlite_parent_dir_exists(database_url)?;

        let connect_options = SqliteConnectOptions::from_str(database_url)?.create_if_missing(true);
        // every connection to an in-memory database is a separate database
        let max_connections = if is_memory_url(database_url) { 1 } else { 5 };
        let pool = SqlitePoolOptions::new()
            .max_connections(max_connections)
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

    /// Adds an empty group at the end of the board. Its order entry is a
    /// self-loop through its own sentinel.
    pub async fn create_group(&self, title: &str) -> Result<Group> {
        let group = Group::new(random_id(), title);
        let mut tx = self.pool.begin().await?;

        let position: i64 =
            sqlx::query_scalar("SELECT COALESCE(MAX(position), -1) + 1 FROM board_groups")
                .fetch_one(&mut *tx)
                .await?;
        sqlx::query("INSERT INTO board_groups (id, title, position) VALUES (?, ?, ?)")
            .bind(group.id.as_str())
            .bind(&group.title)
            .bind(position)
            .execute(&mut *tx)
            .await?;
        sqlx::query("INSERT INTO order_links (node, next) VALUES (?, ?)")
            .bind(group.id.as_str())
            .bind(group.id.as_str())
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        debug!(group_id = %group.id, %title, "created group");
        Ok(group)
    }

    pub async fn list_groups(&self) -> Result<Vec<Group>> {
        let rows = sqlx::query("SELECT id, title FROM board_groups ORDER BY position, id")
            .fetch_all(&self.pool)
            .await?;
        Ok(rows
            .into_iter()
            .map(|r| Group::new(r.get::<String, _>(0), r.get::<String, _>(1)))
            .collect())
    }

    pub async fn find_group_by_title(&self, title: &str) -> Result<Option<GroupId>> {
        let row = sqlx::query("SELECT id FROM board_groups WHERE title = ? ORDER BY position LIMIT 1")
            .bind(title)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.map(|r| GroupId(r.get::<String, _>(0))))
    }

    pub async fn load_items_and_order(&self) -> Result<(Vec<Item>, OrderIndex)> {
        let items = sqlx::query("SELECT id, text FROM board_items ORDER BY id")
            .fetch_all(&self.pool)
            .await?
            .into_iter()
            .map(|r| Item::new(r.get::<String, _>(0), r.get::<String, _>(1)))
            .collect();
        let order = sqlx::query("SELECT node, next FROM order_links")
            .fetch_all(&self.pool)
            .await?
            .into_iter()
            .map(|r| {
                (
                    NodeKey(r.get::<String, _>(0)),
                    NodeKey(r.get::<String, _>(1)),
                )
            })
            .collect();
        Ok((items, order))
    }

    pub async fn load_board(&self) -> Result<StoredBoard> {
        let groups = self.list_groups().await?;
        let (items, order) = self.load_items_and_order().await?;
        Ok(StoredBoard {
            groups,
            items,
            order,
        })
    }

    /// Writes a committed change and its patch in one transaction and
    /// appends it to the change log. Returns the log id.
    pub async fn apply_change(&self, change: &BoardChange) -> Result<i64> {
        let mut tx = self.pool.begin().await?;

        match change {
            BoardChange::Reordered { .. } => {}
            BoardChange::ItemAdded { item, .. } => {
                sqlx::query(
                    "INSERT INTO board_items (id, text) VALUES (?, ?)
                     ON CONFLICT(id) DO UPDATE SET text=excluded.text",
                )
                .bind(item.id.as_str())
                .bind(&item.text)
                .execute(&mut *tx)
                .await?;
            }
            BoardChange::ItemDeleted { item_id, .. } => {
                sqlx::query("DELETE FROM board_items WHERE id = ?")
                    .bind(item_id.as_str())
                    .execute(&mut *tx)
                    .await?;
            }
        }

        write_patch(&mut tx, change.patch()).await?;

        let payload = serde_json::to_string(change).context("failed to encode board change")?;
        let rec = sqlx::query(
            "INSERT INTO change_log (kind, payload, applied_at) VALUES (?, ?, ?) RETURNING id",
        )
        .bind(change.kind())
        .bind(payload)
        .bind(Utc::now())
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(rec.get::<i64, _>(0))
    }

    pub async fn recent_changes(&self, limit: u32) -> Result<Vec<StoredChange>> {
        let rows = sqlx::query(
            "SELECT id, payload, applied_at FROM change_log ORDER BY id DESC LIMIT ?",
        )
        .bind(i64::from(limit))
        .fetch_all(&self.pool)
        .await?;

        let mut changes = Vec::with_capacity(rows.len());
        for row in rows.into_iter().rev() {
            let payload: String = row.get("payload");
            changes.push(StoredChange {
                id: row.get("id"),
                change: serde_json::from_str(&payload)
                    .context("change log holds an unreadable payload")?,
                applied_at: row.get("applied_at"),
            });
        }
        Ok(changes)
    }
}

async fn write_patch(tx: &mut Transaction<'_, Sqlite>, patch: &Patch) -> Result<()> {
    for (node, next) in patch.iter() {
        match next {
            Some(next) => {
                sqlx::query(
                    "INSERT INTO order_links (node, next) VALUES (?, ?)
                     ON CONFLICT(node) DO UPDATE SET next=excluded.next",
                )
                .bind(node.as_str())
                .bind(next.as_str())
                .execute(&mut **tx)
                .await?;
            }
            None => {
                sqlx::query("DELETE FROM order_links WHERE node = ?")
                    .bind(node.as_str())
                    .execute(&mut **tx)
                    .await?;
            }
        }
    }
    Ok(())
}

#[async_trait]
impl ChangeSink for Storage {
    async fn persist(&self, change: &BoardChange) -> Result<()> {
        let log_id = self.apply_change(change).await?;
        debug!(log_id, kind = change.kind(), links = change.patch().len(), "stored board change");
        Ok(())
    }
}

fn is_memory_url(database_url: &str) -> bool {
    database_url.starts_with("sqlite::memory:") || database_url.contains("mode=memory")
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
    if is_memory_url(database_url) || !database_url.starts_with("sqlite:") {
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
