//! Relationship store: deduplicated directed typed edges between entities.

use anyhow::{bail, Result};
use serde_json::Value;
use sqlx::{Row, SqlitePool};
use uuid::Uuid;

use crate::models::{now_rfc3339, Relationship};

/// Find an existing edge with identical `(source, target, type)` or insert a
/// new one. Returns the relationship id. Properties on a duplicate call are
/// discarded, not merged. Self-loops are rejected upstream by callers; a
/// stray one reaching the store is an error, not a silent insert.
pub async fn find_or_create(
    pool: &SqlitePool,
    source_id: &str,
    target_id: &str,
    rel_type: &str,
    properties: Option<&Value>,
) -> Result<String> {
    if source_id == target_id {
        bail!("Self-relationship rejected for entity {}", source_id);
    }

    let existing = sqlx::query(
        "SELECT id FROM relationships WHERE source_id = ? AND target_id = ? AND type = ?",
    )
    .bind(source_id)
    .bind(target_id)
    .bind(rel_type)
    .fetch_optional(pool)
    .await?;

    if let Some(row) = existing {
        return Ok(row.get("id"));
    }

    let id = Uuid::new_v4().to_string();
    let props = properties
        .map(|v| v.to_string())
        .unwrap_or_else(|| "{}".to_string());

    sqlx::query(
        r#"
        INSERT INTO relationships (id, source_id, target_id, type, properties, created_at)
        VALUES (?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(&id)
    .bind(source_id)
    .bind(target_id)
    .bind(rel_type)
    .bind(props)
    .bind(now_rfc3339())
    .execute(pool)
    .await?;

    Ok(id)
}

pub async fn for_entity(pool: &SqlitePool, entity_id: &str) -> Result<Vec<Relationship>> {
    let rows = sqlx::query("SELECT * FROM relationships WHERE source_id = ? OR target_id = ?")
        .bind(entity_id)
        .bind(entity_id)
        .fetch_all(pool)
        .await?;

    Ok(rows
        .iter()
        .map(|row| Relationship {
            id: row.get("id"),
            source_id: row.get("source_id"),
            target_id: row.get("target_id"),
            rel_type: row.get("type"),
            properties: row.get("properties"),
            created_at: row.get("created_at"),
        })
        .collect())
}

pub async fn count(pool: &SqlitePool) -> Result<i64> {
    let count = sqlx::query_scalar("SELECT COUNT(*) FROM relationships")
        .fetch_one(pool)
        .await?;
    Ok(count)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entities::resolve_entity;
    use crate::migrate;
    use serde_json::json;

    async fn test_pool() -> (tempfile::TempDir, SqlitePool) {
        let tmp = tempfile::TempDir::new().unwrap();
        let pool = crate::db::connect_path(&tmp.path().join("index.db"))
            .await
            .unwrap();
        migrate::run_migrations(&pool).await.unwrap();
        (tmp, pool)
    }

    #[tokio::test]
    async fn test_find_or_create_dedups() {
        let (_tmp, pool) = test_pool().await;
        let a = resolve_entity(&pool, "John Doe", "person", &[]).await.unwrap();
        let b = resolve_entity(&pool, "123 Main St", "property", &[]).await.unwrap();

        let first = find_or_create(&pool, &a, &b, "lives_at", None).await.unwrap();
        let second = find_or_create(&pool, &a, &b, "lives_at", Some(&json!({"since": "2023"})))
            .await
            .unwrap();
        assert_eq!(first, second);
        assert_eq!(count(&pool).await.unwrap(), 1);

        // Properties on the duplicate call were discarded
        let edges = for_entity(&pool, &a).await.unwrap();
        assert_eq!(edges[0].properties, "{}");
    }

    #[tokio::test]
    async fn test_distinct_type_creates_second_edge() {
        let (_tmp, pool) = test_pool().await;
        let a = resolve_entity(&pool, "John Doe", "person", &[]).await.unwrap();
        let b = resolve_entity(&pool, "123 Main St", "property", &[]).await.unwrap();

        find_or_create(&pool, &a, &b, "lives_at", None).await.unwrap();
        find_or_create(&pool, &a, &b, "owns", None).await.unwrap();
        assert_eq!(count(&pool).await.unwrap(), 2);
    }

    #[tokio::test]
    async fn test_direction_matters() {
        let (_tmp, pool) = test_pool().await;
        let a = resolve_entity(&pool, "John Doe", "person", &[]).await.unwrap();
        let b = resolve_entity(&pool, "Acme Corp", "organization", &[]).await.unwrap();

        let forward = find_or_create(&pool, &a, &b, "works_at", None).await.unwrap();
        let backward = find_or_create(&pool, &b, &a, "works_at", None).await.unwrap();
        assert_ne!(forward, backward);
    }

    #[tokio::test]
    async fn test_self_loop_rejected() {
        let (_tmp, pool) = test_pool().await;
        let a = resolve_entity(&pool, "John Doe", "person", &[]).await.unwrap();
        assert!(find_or_create(&pool, &a, &a, "related_to", None).await.is_err());
    }
}
