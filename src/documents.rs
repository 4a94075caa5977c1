//! Document store: CRUD over file-backed and entry documents, with the
//! document full-text index kept in sync inside the same transaction as
//! every base-table mutation.

use anyhow::Result;
use sqlx::{Row, SqlitePool};
use uuid::Uuid;

use crate::extract_text::ExtractedContent;
use crate::models::{Document, DocumentCounts, ProcessingStatus};
use crate::models::{now_rfc3339, today};

fn row_to_document(row: &sqlx::sqlite::SqliteRow) -> Document {
    Document {
        id: row.get("id"),
        kind: row.get("kind"),
        file_path: row.get("file_path"),
        file_hash: row.get("file_hash"),
        file_type: row.get("file_type"),
        content: row.get("content"),
        title: row.get("title"),
        date: row.get("date"),
        metadata: row.get("metadata"),
        extracted_text: row.get("extracted_text"),
        processed: row.get("processed"),
        error_msg: row.get("error_msg"),
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    }
}

/// Insert a new file-backed document. Returns the document id.
pub async fn create_file_document(
    pool: &SqlitePool,
    file_path: &str,
    file_hash: &str,
    file_type: &str,
    extracted: &ExtractedContent,
) -> Result<String> {
    let id = Uuid::new_v4().to_string();
    let now = now_rfc3339();
    let mut tx = pool.begin().await?;

    sqlx::query(
        r#"
        INSERT INTO documents
            (id, kind, file_path, file_hash, file_type, title, date, metadata,
             extracted_text, processed, created_at, updated_at)
        VALUES (?, 'file', ?, ?, ?, ?, ?, ?, ?, 0, ?, ?)
        "#,
    )
    .bind(&id)
    .bind(file_path)
    .bind(file_hash)
    .bind(file_type)
    .bind(&extracted.title)
    .bind(&extracted.date)
    .bind(extracted.metadata.to_string())
    .bind(&extracted.text)
    .bind(&now)
    .bind(&now)
    .execute(&mut *tx)
    .await?;

    sqlx::query("INSERT INTO documents_fts (document_id, title, body) VALUES (?, ?, ?)")
        .bind(&id)
        .bind(&extracted.title)
        .bind(&extracted.text)
        .execute(&mut *tx)
        .await?;

    tx.commit().await?;
    Ok(id)
}

/// Replace a file document's content after its fingerprint changed.
/// Resets processing status to pending and clears any recorded error.
pub async fn update_file_document(
    pool: &SqlitePool,
    id: &str,
    file_hash: &str,
    extracted: &ExtractedContent,
) -> Result<()> {
    let mut tx = pool.begin().await?;

    sqlx::query(
        r#"
        UPDATE documents SET
            file_hash = ?,
            title = ?,
            date = ?,
            metadata = ?,
            extracted_text = ?,
            processed = 0,
            error_msg = NULL,
            updated_at = ?
        WHERE id = ?
        "#,
    )
    .bind(file_hash)
    .bind(&extracted.title)
    .bind(&extracted.date)
    .bind(extracted.metadata.to_string())
    .bind(&extracted.text)
    .bind(now_rfc3339())
    .bind(id)
    .execute(&mut *tx)
    .await?;

    sqlx::query("DELETE FROM documents_fts WHERE document_id = ?")
        .bind(id)
        .execute(&mut *tx)
        .await?;
    sqlx::query("INSERT INTO documents_fts (document_id, title, body) VALUES (?, ?, ?)")
        .bind(id)
        .bind(&extracted.title)
        .bind(&extracted.text)
        .execute(&mut *tx)
        .await?;

    tx.commit().await?;
    Ok(())
}

/// Create a manually authored entry document. The first line becomes the
/// title (truncated at 100 chars) and the content doubles as extracted text.
pub async fn create_entry(pool: &SqlitePool, content: &str) -> Result<String> {
    let id = Uuid::new_v4().to_string();
    let now = now_rfc3339();

    let first_line = content.lines().next().unwrap_or("").trim();
    let title = if first_line.is_empty() {
        "Untitled".to_string()
    } else if first_line.chars().count() > 100 {
        let truncated: String = first_line.chars().take(100).collect();
        format!("{}...", truncated)
    } else {
        first_line.to_string()
    };

    let mut tx = pool.begin().await?;

    sqlx::query(
        r#"
        INSERT INTO documents
            (id, kind, content, title, date, extracted_text, processed, created_at, updated_at)
        VALUES (?, 'entry', ?, ?, ?, ?, 0, ?, ?)
        "#,
    )
    .bind(&id)
    .bind(content)
    .bind(&title)
    .bind(today())
    .bind(content)
    .bind(&now)
    .bind(&now)
    .execute(&mut *tx)
    .await?;

    sqlx::query("INSERT INTO documents_fts (document_id, title, body) VALUES (?, ?, ?)")
        .bind(&id)
        .bind(&title)
        .bind(content)
        .execute(&mut *tx)
        .await?;

    tx.commit().await?;
    Ok(id)
}

pub async fn get_document(pool: &SqlitePool, id: &str) -> Result<Option<Document>> {
    let row = sqlx::query("SELECT * FROM documents WHERE id = ?")
        .bind(id)
        .fetch_optional(pool)
        .await?;
    Ok(row.as_ref().map(row_to_document))
}

pub async fn get_document_by_path(pool: &SqlitePool, file_path: &str) -> Result<Option<Document>> {
    let row = sqlx::query("SELECT * FROM documents WHERE file_path = ? AND kind = 'file'")
        .bind(file_path)
        .fetch_optional(pool)
        .await?;
    Ok(row.as_ref().map(row_to_document))
}

/// All documents still waiting for extraction, oldest first.
pub async fn pending_documents(pool: &SqlitePool) -> Result<Vec<Document>> {
    let rows = sqlx::query("SELECT * FROM documents WHERE processed = 0 ORDER BY created_at")
        .fetch_all(pool)
        .await?;
    Ok(rows.iter().map(row_to_document).collect())
}

/// All file-backed documents with their paths, for deletion detection.
pub async fn file_documents(pool: &SqlitePool) -> Result<Vec<(String, String)>> {
    let rows = sqlx::query("SELECT id, file_path FROM documents WHERE kind = 'file'")
        .fetch_all(pool)
        .await?;
    Ok(rows
        .iter()
        .map(|row| (row.get("id"), row.get("file_path")))
        .collect())
}

pub async fn mark_processed(
    pool: &SqlitePool,
    id: &str,
    status: ProcessingStatus,
    message: Option<&str>,
) -> Result<()> {
    sqlx::query("UPDATE documents SET processed = ?, error_msg = ?, updated_at = ? WHERE id = ?")
        .bind(status.as_i64())
        .bind(message)
        .bind(now_rfc3339())
        .bind(id)
        .execute(pool)
        .await?;
    Ok(())
}

/// Delete a document. Entity links cascade via foreign keys; the FTS row is
/// removed in the same transaction.
pub async fn delete_document(pool: &SqlitePool, id: &str) -> Result<()> {
    let mut tx = pool.begin().await?;
    sqlx::query("DELETE FROM documents_fts WHERE document_id = ?")
        .bind(id)
        .execute(&mut *tx)
        .await?;
    sqlx::query("DELETE FROM documents WHERE id = ?")
        .bind(id)
        .execute(&mut *tx)
        .await?;
    tx.commit().await?;
    Ok(())
}

pub async fn document_counts(pool: &SqlitePool) -> Result<DocumentCounts> {
    let row = sqlx::query(
        r#"
        SELECT
            COUNT(*) AS total,
            SUM(kind = 'file') AS files,
            SUM(kind = 'entry') AS entries,
            SUM(processed = 1) AS processed,
            SUM(processed = 0) AS pending,
            SUM(processed = 2) AS errored
        FROM documents
        "#,
    )
    .fetch_one(pool)
    .await?;

    Ok(DocumentCounts {
        total: row.get::<i64, _>("total"),
        files: row.get::<Option<i64>, _>("files").unwrap_or(0),
        entries: row.get::<Option<i64>, _>("entries").unwrap_or(0),
        processed: row.get::<Option<i64>, _>("processed").unwrap_or(0),
        pending: row.get::<Option<i64>, _>("pending").unwrap_or(0),
        errored: row.get::<Option<i64>, _>("errored").unwrap_or(0),
    })
}

/// Keyword search over document titles and bodies. FTS syntax errors from
/// user-supplied queries degrade to no results.
pub async fn search_documents(
    pool: &SqlitePool,
    query: &str,
    limit: i64,
) -> Result<Vec<Document>> {
    let Some(fts_query) = crate::entities::fts_escape(query) else {
        return Ok(Vec::new());
    };

    let rows = sqlx::query(
        r#"
        SELECT d.* FROM documents d
        JOIN documents_fts f ON d.id = f.document_id
        WHERE documents_fts MATCH ?
        ORDER BY rank
        LIMIT ?
        "#,
    )
    .bind(fts_query)
    .bind(limit)
    .fetch_all(pool)
    .await?;

    Ok(rows.iter().map(row_to_document).collect())
}

#[cfg(test)]
mod tests {
    use super::*;
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

    fn sample_content(title: &str, text: &str) -> ExtractedContent {
        ExtractedContent {
            title: title.to_string(),
            date: None,
            text: text.to_string(),
            metadata: json!({}),
        }
    }

    #[tokio::test]
    async fn test_create_and_fetch_file_document() {
        let (_tmp, pool) = test_pool().await;
        let content = sample_content("Rent", "Rent is due on the first.");
        let id = create_file_document(&pool, "rent.md", "abc123", "markdown", &content)
            .await
            .unwrap();

        let doc = get_document_by_path(&pool, "rent.md").await.unwrap().unwrap();
        assert_eq!(doc.id, id);
        assert_eq!(doc.kind, "file");
        assert_eq!(doc.status(), ProcessingStatus::Pending);
        assert_eq!(doc.extracted_text.as_deref(), Some("Rent is due on the first."));
    }

    #[tokio::test]
    async fn test_update_resets_status_and_error() {
        let (_tmp, pool) = test_pool().await;
        let content = sample_content("Note", "old text");
        let id = create_file_document(&pool, "note.md", "h1", "markdown", &content)
            .await
            .unwrap();
        mark_processed(&pool, &id, ProcessingStatus::Errored, Some("boom"))
            .await
            .unwrap();

        let updated = sample_content("Note", "new text");
        update_file_document(&pool, &id, "h2", &updated).await.unwrap();

        let doc = get_document(&pool, &id).await.unwrap().unwrap();
        assert_eq!(doc.status(), ProcessingStatus::Pending);
        assert!(doc.error_msg.is_none());
        assert_eq!(doc.file_hash.as_deref(), Some("h2"));
        assert_eq!(doc.extracted_text.as_deref(), Some("new text"));
    }

    #[tokio::test]
    async fn test_entry_title_from_first_line() {
        let (_tmp, pool) = test_pool().await;
        let id = create_entry(&pool, "Paid the water bill today\nIt was $80.")
            .await
            .unwrap();
        let doc = get_document(&pool, &id).await.unwrap().unwrap();
        assert_eq!(doc.kind, "entry");
        assert_eq!(doc.title.as_deref(), Some("Paid the water bill today"));
        assert!(doc.file_path.is_none());
        assert!(doc.date.is_some());
    }

    #[tokio::test]
    async fn test_entry_title_truncated() {
        let (_tmp, pool) = test_pool().await;
        let long_line = "x".repeat(150);
        let id = create_entry(&pool, &long_line).await.unwrap();
        let doc = get_document(&pool, &id).await.unwrap().unwrap();
        let title = doc.title.unwrap();
        assert!(title.ends_with("..."));
        assert_eq!(title.chars().count(), 103);
    }

    #[tokio::test]
    async fn test_counts_by_state() {
        let (_tmp, pool) = test_pool().await;
        let content = sample_content("A", "text a");
        let a = create_file_document(&pool, "a.md", "h", "markdown", &content)
            .await
            .unwrap();
        create_entry(&pool, "an entry").await.unwrap();
        mark_processed(&pool, &a, ProcessingStatus::Processed, None)
            .await
            .unwrap();

        let counts = document_counts(&pool).await.unwrap();
        assert_eq!(counts.total, 2);
        assert_eq!(counts.files, 1);
        assert_eq!(counts.entries, 1);
        assert_eq!(counts.processed, 1);
        assert_eq!(counts.pending, 1);
        assert_eq!(counts.errored, 0);
    }

    #[tokio::test]
    async fn test_delete_removes_fts_row() {
        let (_tmp, pool) = test_pool().await;
        let content = sample_content("Kitchen", "kitchen renovation quotes");
        let id = create_file_document(&pool, "kitchen.md", "h", "markdown", &content)
            .await
            .unwrap();

        assert_eq!(search_documents(&pool, "kitchen", 10).await.unwrap().len(), 1);
        delete_document(&pool, &id).await.unwrap();
        assert!(search_documents(&pool, "kitchen", 10).await.unwrap().is_empty());
        assert!(get_document(&pool, &id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_search_documents_odd_query_is_safe() {
        let (_tmp, pool) = test_pool().await;
        // FTS operators and punctuation must not surface as SQL errors
        let results = search_documents(&pool, "\"unbalanced ( NEAR", 10).await.unwrap();
        assert!(results.is_empty());
    }
}
