//! Document-entity links: which documents mention which entities.

use anyhow::Result;
use sqlx::SqlitePool;

/// Record that a document mentions an entity. Upserts on the
/// (document, entity) pair: a repeat link refreshes the mention and
/// confidence instead of duplicating.
pub async fn link_document_entity(
    pool: &SqlitePool,
    document_id: &str,
    entity_id: &str,
    mention: Option<&str>,
    confidence: f64,
) -> Result<()> {
    sqlx::query(
        r#"
        INSERT INTO document_entities (document_id, entity_id, mention, confidence)
        VALUES (?, ?, ?, ?)
        ON CONFLICT (document_id, entity_id) DO UPDATE SET
            mention = COALESCE(excluded.mention, document_entities.mention),
            confidence = excluded.confidence
        "#,
    )
    .bind(document_id)
    .bind(entity_id)
    .bind(mention)
    .bind(confidence)
    .execute(pool)
    .await?;
    Ok(())
}

/// Remove every entity link for a document (used before re-extraction).
pub async fn clear_document_entities(pool: &SqlitePool, document_id: &str) -> Result<()> {
    sqlx::query("DELETE FROM document_entities WHERE document_id = ?")
        .bind(document_id)
        .execute(pool)
        .await?;
    Ok(())
}
