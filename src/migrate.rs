use anyhow::Result;
use sqlx::SqlitePool;

/// Create the schema. Idempotent: safe to run on every `note init`.
pub async fn run_migrations(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS documents (
            id             TEXT PRIMARY KEY,
            kind           TEXT NOT NULL CHECK (kind IN ('file', 'entry')),
            file_path      TEXT UNIQUE,
            file_hash      TEXT,
            file_type      TEXT,
            content        TEXT,
            title          TEXT,
            date           TEXT,
            metadata       TEXT,
            extracted_text TEXT,
            processed      INTEGER NOT NULL DEFAULT 0,
            error_msg      TEXT,
            created_at     TEXT NOT NULL,
            updated_at     TEXT NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS entities (
            id         TEXT PRIMARY KEY,
            name       TEXT NOT NULL,
            type       TEXT NOT NULL,
            aliases    TEXT NOT NULL DEFAULT '[]',
            metadata   TEXT NOT NULL DEFAULT '{}',
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS relationships (
            id         TEXT PRIMARY KEY,
            source_id  TEXT NOT NULL REFERENCES entities(id) ON DELETE CASCADE,
            target_id  TEXT NOT NULL REFERENCES entities(id) ON DELETE CASCADE,
            type       TEXT NOT NULL,
            properties TEXT NOT NULL DEFAULT '{}',
            created_at TEXT NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS document_entities (
            document_id TEXT NOT NULL REFERENCES documents(id) ON DELETE CASCADE,
            entity_id   TEXT NOT NULL REFERENCES entities(id) ON DELETE CASCADE,
            mention     TEXT,
            confidence  REAL NOT NULL DEFAULT 1.0,
            PRIMARY KEY (document_id, entity_id)
        )
        "#,
    )
    .execute(pool)
    .await?;

    // FTS5 CREATE is not idempotent natively, so check first
    let fts_exists: bool = sqlx::query_scalar(
        "SELECT COUNT(*) > 0 FROM sqlite_master WHERE type='table' AND name='documents_fts'",
    )
    .fetch_one(pool)
    .await?;

    if !fts_exists {
        sqlx::query(
            r#"
            CREATE VIRTUAL TABLE documents_fts USING fts5(
                document_id UNINDEXED,
                title,
                body
            )
            "#,
        )
        .execute(pool)
        .await?;

        sqlx::query(
            r#"
            CREATE VIRTUAL TABLE entities_fts USING fts5(
                entity_id UNINDEXED,
                name,
                aliases
            )
            "#,
        )
        .execute(pool)
        .await?;
    }

    for statement in [
        "CREATE INDEX IF NOT EXISTS idx_documents_kind ON documents(kind)",
        "CREATE INDEX IF NOT EXISTS idx_documents_file_path ON documents(file_path)",
        "CREATE INDEX IF NOT EXISTS idx_documents_processed ON documents(processed)",
        "CREATE INDEX IF NOT EXISTS idx_documents_date ON documents(date)",
        "CREATE INDEX IF NOT EXISTS idx_entities_type ON entities(type)",
        "CREATE INDEX IF NOT EXISTS idx_entities_name ON entities(name)",
        "CREATE INDEX IF NOT EXISTS idx_relationships_source ON relationships(source_id)",
        "CREATE INDEX IF NOT EXISTS idx_relationships_target ON relationships(target_id)",
        "CREATE INDEX IF NOT EXISTS idx_document_entities_doc ON document_entities(document_id)",
        "CREATE INDEX IF NOT EXISTS idx_document_entities_entity ON document_entities(entity_id)",
    ] {
        sqlx::query(statement).execute(pool).await?;
    }

    Ok(())
}

/// Wipe the derived graph and queue every document for reprocessing.
///
/// Deletes relationships, entities, and document-entity links, clears the
/// entity full-text index, resets all documents to pending, and rebuilds the
/// document full-text index from current document rows. Recovery path for
/// any store or index corruption.
pub async fn reset_graph(pool: &SqlitePool) -> Result<()> {
    let mut tx = pool.begin().await?;

    sqlx::query("DELETE FROM document_entities")
        .execute(&mut *tx)
        .await?;
    sqlx::query("DELETE FROM relationships")
        .execute(&mut *tx)
        .await?;
    sqlx::query("DELETE FROM entities").execute(&mut *tx).await?;
    sqlx::query("DELETE FROM entities_fts")
        .execute(&mut *tx)
        .await?;
    sqlx::query("DELETE FROM documents_fts")
        .execute(&mut *tx)
        .await?;

    sqlx::query("UPDATE documents SET processed = 0, error_msg = NULL")
        .execute(&mut *tx)
        .await?;

    sqlx::query(
        r#"
        INSERT INTO documents_fts (document_id, title, body)
        SELECT id, COALESCE(title, ''), COALESCE(extracted_text, COALESCE(content, ''))
        FROM documents
        "#,
    )
    .execute(&mut *tx)
    .await?;

    tx.commit().await?;
    Ok(())
}
