//! Entity store and resolution engine.
//!
//! Resolution deduplicates model-extracted entities against everything seen
//! before using a three-tier cascade: exact name match, alias match, then
//! approximate string similarity, always partitioned by entity type. The
//! engine owns alias accumulation and keeps the entity full-text index
//! consistent with every name/alias mutation.

use anyhow::Result;
use sqlx::{Row, SqlitePool};
use uuid::Uuid;

use crate::models::{now_rfc3339, Direction, Entity, EntityDocument, RelatedEntity};

/// Minimum normalized similarity for an approximate match during resolution.
/// Tuned so close variants ("John Doe" / "John D.") match while unrelated
/// names of similar length do not.
const FUZZY_RESOLVE_MIN: f64 = 0.7;

/// Looser floor used only for interactive search fallback.
const FUZZY_SEARCH_MIN: f64 = 0.6;

/// Aliases stored per entity, oldest first.
const MAX_ALIASES: usize = 50;

fn row_to_entity(row: &sqlx::sqlite::SqliteRow) -> Entity {
    Entity {
        id: row.get("id"),
        name: row.get("name"),
        entity_type: row.get("type"),
        aliases: row.get("aliases"),
        metadata: row.get("metadata"),
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    }
}

// ============ Approximate string scoring ============

/// Normalized similarity in [0, 1]: 1.0 = identical (case-insensitive),
/// 0.0 = nothing in common. Defined as `1 - levenshtein / max_len`.
pub fn similarity(a: &str, b: &str) -> f64 {
    let a = a.to_lowercase();
    let b = b.to_lowercase();
    if a == b {
        return 1.0;
    }
    let a_chars: Vec<char> = a.chars().collect();
    let b_chars: Vec<char> = b.chars().collect();
    let max_len = a_chars.len().max(b_chars.len());
    if max_len == 0 {
        return 1.0;
    }
    let distance = levenshtein(&a_chars, &b_chars);
    1.0 - distance as f64 / max_len as f64
}

/// Standard two-row dynamic-programming edit distance.
fn levenshtein(a: &[char], b: &[char]) -> usize {
    if a.is_empty() {
        return b.len();
    }
    if b.is_empty() {
        return a.len();
    }

    let n = b.len();
    let mut prev: Vec<usize> = (0..=n).collect();
    let mut curr: Vec<usize> = vec![0; n + 1];

    for (i, &ca) in a.iter().enumerate() {
        curr[0] = i + 1;
        for j in 1..=n {
            let cost = usize::from(ca != b[j - 1]);
            curr[j] = (prev[j] + 1)
                .min(curr[j - 1] + 1)
                .min(prev[j - 1] + cost);
        }
        std::mem::swap(&mut prev, &mut curr);
    }

    prev[n]
}

// ============ FTS query sanitizing ============

/// Reduce arbitrary user/model text to a safe FTS5 query: alphanumeric
/// tokens, each quoted, OR-joined. Returns `None` when nothing searchable
/// remains, so callers can skip the query instead of tripping FTS syntax
/// errors on punctuation.
pub fn fts_escape(query: &str) -> Option<String> {
    let tokens: Vec<String> = query
        .split(|c: char| !c.is_alphanumeric())
        .filter(|t| !t.is_empty())
        .map(|t| format!("\"{}\"", t))
        .collect();
    if tokens.is_empty() {
        None
    } else {
        Some(tokens.join(" OR "))
    }
}

// ============ Resolution engine ============

/// Find an existing entity matching `(name, entity_type)` or create a new
/// one. Returns the entity id. Deterministic given current graph state;
/// matching never crosses entity types.
pub async fn resolve_entity(
    pool: &SqlitePool,
    name: &str,
    entity_type: &str,
    mentions: &[String],
) -> Result<String> {
    // Tier 1: exact name match, case-insensitive
    let exact = sqlx::query("SELECT id FROM entities WHERE LOWER(name) = LOWER(?) AND type = ?")
        .bind(name)
        .bind(entity_type)
        .fetch_optional(pool)
        .await?;

    if let Some(row) = exact {
        let id: String = row.get("id");
        add_aliases(pool, &id, mentions).await?;
        return Ok(id);
    }

    // Tier 2: alias match over same-type entities
    let same_type = sqlx::query("SELECT id, name, aliases FROM entities WHERE type = ?")
        .bind(entity_type)
        .fetch_all(pool)
        .await?;

    let needle = name.to_lowercase();
    for row in &same_type {
        let entity_name: String = row.get("name");
        let aliases: Vec<String> =
            serde_json::from_str(row.get::<String, _>("aliases").as_str()).unwrap_or_default();
        let matches = entity_name.to_lowercase() == needle
            || aliases.iter().any(|a| a.to_lowercase() == needle);
        if matches {
            let id: String = row.get("id");
            let mut merged = vec![name.to_string()];
            merged.extend_from_slice(mentions);
            add_aliases(pool, &id, &merged).await?;
            return Ok(id);
        }
    }

    // Tier 3: approximate match on canonical names
    let mut best: Option<(String, f64)> = None;
    for row in &same_type {
        let entity_name: String = row.get("name");
        let score = similarity(name, &entity_name);
        if score >= FUZZY_RESOLVE_MIN {
            match &best {
                Some((_, best_score)) if *best_score >= score => {}
                _ => best = Some((row.get("id"), score)),
            }
        }
    }

    if let Some((id, _)) = best {
        let mut merged = vec![name.to_string()];
        merged.extend_from_slice(mentions);
        add_aliases(pool, &id, &merged).await?;
        return Ok(id);
    }

    // Tier 4: create
    let id = Uuid::new_v4().to_string();
    let now = now_rfc3339();

    let mut initial: Vec<String> = Vec::new();
    for mention in mentions {
        let lower = mention.to_lowercase();
        if lower == needle || mention.is_empty() {
            continue;
        }
        if !initial.iter().any(|a| a.to_lowercase() == lower) {
            initial.push(mention.clone());
        }
    }
    let aliases_json = serde_json::to_string(&initial)?;

    let mut tx = pool.begin().await?;
    sqlx::query(
        r#"
        INSERT INTO entities (id, name, type, aliases, metadata, created_at, updated_at)
        VALUES (?, ?, ?, ?, '{}', ?, ?)
        "#,
    )
    .bind(&id)
    .bind(name)
    .bind(entity_type)
    .bind(&aliases_json)
    .bind(&now)
    .bind(&now)
    .execute(&mut *tx)
    .await?;

    sqlx::query("INSERT INTO entities_fts (entity_id, name, aliases) VALUES (?, ?, ?)")
        .bind(&id)
        .bind(name)
        .bind(initial.join(" "))
        .execute(&mut *tx)
        .await?;

    tx.commit().await?;
    Ok(id)
}

/// Merge new aliases into an entity: the entity's own canonical name plus
/// each new string, skipped when already present case-insensitively, capped
/// at [`MAX_ALIASES`] with insertion order preserved. Touches `updated_at`
/// and the full-text index only when the stored set actually changed.
pub async fn add_aliases(pool: &SqlitePool, entity_id: &str, new_aliases: &[String]) -> Result<()> {
    let row = sqlx::query("SELECT name, aliases FROM entities WHERE id = ?")
        .bind(entity_id)
        .fetch_one(pool)
        .await?;
    let name: String = row.get("name");
    let mut aliases: Vec<String> =
        serde_json::from_str(row.get::<String, _>("aliases").as_str()).unwrap_or_default();

    let mut seen: Vec<String> = aliases.iter().map(|a| a.to_lowercase()).collect();
    seen.push(name.to_lowercase());

    let mut changed = false;
    for alias in new_aliases {
        if alias.is_empty() {
            continue;
        }
        let lower = alias.to_lowercase();
        if !seen.contains(&lower) {
            aliases.push(alias.clone());
            seen.push(lower);
            changed = true;
        }
    }

    if !changed {
        return Ok(());
    }

    aliases.truncate(MAX_ALIASES);
    let aliases_json = serde_json::to_string(&aliases)?;

    let mut tx = pool.begin().await?;
    sqlx::query("UPDATE entities SET aliases = ?, updated_at = ? WHERE id = ?")
        .bind(&aliases_json)
        .bind(now_rfc3339())
        .bind(entity_id)
        .execute(&mut *tx)
        .await?;

    sqlx::query("DELETE FROM entities_fts WHERE entity_id = ?")
        .bind(entity_id)
        .execute(&mut *tx)
        .await?;
    sqlx::query("INSERT INTO entities_fts (entity_id, name, aliases) VALUES (?, ?, ?)")
        .bind(entity_id)
        .bind(&name)
        .bind(aliases.join(" "))
        .execute(&mut *tx)
        .await?;

    tx.commit().await?;
    Ok(())
}

// ============ Queries ============

/// All `(name, type)` pairs ordered by name, fed to the extraction prompt so
/// the model can reuse canonical names.
pub async fn known_entities(pool: &SqlitePool) -> Result<Vec<(String, String)>> {
    let rows = sqlx::query("SELECT name, type FROM entities ORDER BY name")
        .fetch_all(pool)
        .await?;
    Ok(rows
        .iter()
        .map(|row| (row.get("name"), row.get("type")))
        .collect())
}

pub async fn get_entity(pool: &SqlitePool, id: &str) -> Result<Option<Entity>> {
    let row = sqlx::query("SELECT * FROM entities WHERE id = ?")
        .bind(id)
        .fetch_optional(pool)
        .await?;
    Ok(row.as_ref().map(row_to_entity))
}

/// Look up an entity by exact id, then by exact case-insensitive name.
pub async fn get_by_name_or_id(pool: &SqlitePool, query: &str) -> Result<Option<Entity>> {
    if let Some(entity) = get_entity(pool, query).await? {
        return Ok(Some(entity));
    }
    let row = sqlx::query("SELECT * FROM entities WHERE LOWER(name) = LOWER(?)")
        .bind(query)
        .fetch_optional(pool)
        .await?;
    Ok(row.as_ref().map(row_to_entity))
}

/// Search entity names and aliases: FTS first, falling back to approximate
/// name scoring when the index returns nothing.
pub async fn search_entities(pool: &SqlitePool, query: &str) -> Result<Vec<Entity>> {
    if let Some(fts_query) = fts_escape(query) {
        let rows = sqlx::query(
            r#"
            SELECT e.* FROM entities e
            JOIN entities_fts f ON e.id = f.entity_id
            WHERE entities_fts MATCH ?
            ORDER BY rank
            LIMIT 20
            "#,
        )
        .bind(fts_query)
        .fetch_all(pool)
        .await?;

        if !rows.is_empty() {
            return Ok(rows.iter().map(row_to_entity).collect());
        }
    }

    // Fuzzy fallback over all entity names
    let rows = sqlx::query("SELECT * FROM entities").fetch_all(pool).await?;
    let mut scored: Vec<(f64, Entity)> = rows
        .iter()
        .map(row_to_entity)
        .filter_map(|entity| {
            let score = similarity(query, &entity.name);
            (score >= FUZZY_SEARCH_MIN).then_some((score, entity))
        })
        .collect();
    scored.sort_by(|a, b| b.0.partial_cmp(&a.0).unwrap_or(std::cmp::Ordering::Equal));
    scored.truncate(20);
    Ok(scored.into_iter().map(|(_, e)| e).collect())
}

/// Entities linked to documents whose title/body match the query. FTS
/// errors on hostile input degrade to an empty result.
pub async fn search_document_entities(pool: &SqlitePool, query: &str) -> Result<Vec<Entity>> {
    let Some(fts_query) = fts_escape(query) else {
        return Ok(Vec::new());
    };

    let rows = sqlx::query(
        r#"
        SELECT DISTINCT e.* FROM entities e
        JOIN document_entities de ON e.id = de.entity_id
        JOIN documents_fts f ON f.document_id = de.document_id
        WHERE documents_fts MATCH ?
        LIMIT 20
        "#,
    )
    .bind(fts_query)
    .fetch_all(pool)
    .await;

    match rows {
        Ok(rows) => Ok(rows.iter().map(row_to_entity).collect()),
        Err(_) => Ok(Vec::new()),
    }
}

/// One-hop neighbors in both directions, tagged with edge type and direction.
pub async fn related_entities(pool: &SqlitePool, entity_id: &str) -> Result<Vec<RelatedEntity>> {
    let outgoing = sqlx::query(
        r#"
        SELECT e.*, r.type AS rel_type FROM entities e
        JOIN relationships r ON e.id = r.target_id
        WHERE r.source_id = ?
        "#,
    )
    .bind(entity_id)
    .fetch_all(pool)
    .await?;

    let incoming = sqlx::query(
        r#"
        SELECT e.*, r.type AS rel_type FROM entities e
        JOIN relationships r ON e.id = r.source_id
        WHERE r.target_id = ?
        "#,
    )
    .bind(entity_id)
    .fetch_all(pool)
    .await?;

    let mut related: Vec<RelatedEntity> = Vec::with_capacity(outgoing.len() + incoming.len());
    for row in &outgoing {
        related.push(RelatedEntity {
            entity: row_to_entity(row),
            rel_type: row.get("rel_type"),
            direction: Direction::Outgoing,
        });
    }
    for row in &incoming {
        related.push(RelatedEntity {
            entity: row_to_entity(row),
            rel_type: row.get("rel_type"),
            direction: Direction::Incoming,
        });
    }
    Ok(related)
}

/// Documents mentioning an entity, newest date first, with the recorded
/// mention string and whichever of content/extracted text is present.
pub async fn documents_for_entity(
    pool: &SqlitePool,
    entity_id: &str,
) -> Result<Vec<EntityDocument>> {
    let rows = sqlx::query(
        r#"
        SELECT d.id AS document_id, d.kind, d.file_path, d.title, d.date,
               COALESCE(d.content, d.extracted_text) AS content, de.mention
        FROM documents d
        JOIN document_entities de ON d.id = de.document_id
        WHERE de.entity_id = ?
        ORDER BY d.date DESC
        "#,
    )
    .bind(entity_id)
    .fetch_all(pool)
    .await?;

    Ok(rows
        .iter()
        .map(|row| EntityDocument {
            document_id: row.get("document_id"),
            kind: row.get("kind"),
            file_path: row.get("file_path"),
            title: row.get("title"),
            date: row.get("date"),
            content: row.get("content"),
            mention: row.get("mention"),
        })
        .collect())
}

pub async fn entity_counts(pool: &SqlitePool) -> Result<Vec<(String, i64)>> {
    let rows =
        sqlx::query("SELECT type, COUNT(*) AS count FROM entities GROUP BY type ORDER BY count DESC")
            .fetch_all(pool)
            .await?;
    Ok(rows
        .iter()
        .map(|row| (row.get("type"), row.get("count")))
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::migrate;

    async fn test_pool() -> (tempfile::TempDir, SqlitePool) {
        let tmp = tempfile::TempDir::new().unwrap();
        let pool = crate::db::connect_path(&tmp.path().join("index.db"))
            .await
            .unwrap();
        migrate::run_migrations(&pool).await.unwrap();
        (tmp, pool)
    }

    #[test]
    fn test_similarity_identical_and_case() {
        assert_eq!(similarity("John Doe", "john doe"), 1.0);
        assert_eq!(similarity("", ""), 1.0);
    }

    #[test]
    fn test_similarity_close_variant_passes_threshold() {
        assert!(similarity("John Doe", "John D.") >= FUZZY_RESOLVE_MIN);
        assert!(similarity("123 Main St", "123 Main St.") >= FUZZY_RESOLVE_MIN);
    }

    #[test]
    fn test_similarity_unrelated_below_threshold() {
        assert!(similarity("John Doe", "Jane Roe") < FUZZY_RESOLVE_MIN);
        assert!(similarity("water bill", "insurance") < FUZZY_RESOLVE_MIN);
    }

    #[test]
    fn test_fts_escape() {
        assert_eq!(fts_escape("kitchen renovation").unwrap(), "\"kitchen\" OR \"renovation\"");
        assert_eq!(fts_escape("John's (rent)").unwrap(), "\"John\" OR \"s\" OR \"rent\"");
        assert!(fts_escape("...!?").is_none());
        assert!(fts_escape("").is_none());
    }

    #[tokio::test]
    async fn test_resolve_idempotent() {
        let (_tmp, pool) = test_pool().await;
        let first = resolve_entity(&pool, "John Doe", "person", &[]).await.unwrap();
        let second = resolve_entity(&pool, "John Doe", "person", &[]).await.unwrap();
        assert_eq!(first, second);
    }

    #[tokio::test]
    async fn test_resolve_exact_is_case_insensitive() {
        let (_tmp, pool) = test_pool().await;
        let first = resolve_entity(&pool, "Acme Corp", "organization", &[]).await.unwrap();
        let second = resolve_entity(&pool, "acme corp", "organization", &[]).await.unwrap();
        assert_eq!(first, second);
    }

    #[tokio::test]
    async fn test_resolve_by_alias() {
        let (_tmp, pool) = test_pool().await;
        let mentions = vec!["Johnny".to_string()];
        let first = resolve_entity(&pool, "John Doe", "person", &mentions).await.unwrap();
        let second = resolve_entity(&pool, "Johnny", "person", &[]).await.unwrap();
        assert_eq!(first, second);
    }

    #[tokio::test]
    async fn test_resolve_fuzzy_match() {
        let (_tmp, pool) = test_pool().await;
        let first = resolve_entity(&pool, "John Doe", "person", &[]).await.unwrap();
        let second = resolve_entity(&pool, "John D.", "person", &[]).await.unwrap();
        assert_eq!(first, second);

        // The variant is recorded as an alias of the match
        let entity = get_entity(&pool, &first).await.unwrap().unwrap();
        assert!(entity.alias_list().iter().any(|a| a == "John D."));
    }

    #[tokio::test]
    async fn test_type_is_a_hard_partition() {
        let (_tmp, pool) = test_pool().await;
        let person = resolve_entity(&pool, "Mercury", "person", &[]).await.unwrap();
        let concept = resolve_entity(&pool, "Mercury", "concept", &[]).await.unwrap();
        assert_ne!(person, concept);
    }

    #[tokio::test]
    async fn test_new_entity_aliases_exclude_canonical_name() {
        let (_tmp, pool) = test_pool().await;
        let mentions = vec![
            "john doe".to_string(),
            "Johnny".to_string(),
            "Johnny".to_string(),
        ];
        let id = resolve_entity(&pool, "John Doe", "person", &mentions).await.unwrap();
        let entity = get_entity(&pool, &id).await.unwrap().unwrap();
        assert_eq!(entity.alias_list(), vec!["Johnny".to_string()]);
    }

    #[tokio::test]
    async fn test_alias_cap_and_no_duplicates() {
        let (_tmp, pool) = test_pool().await;
        let id = resolve_entity(&pool, "John Doe", "person", &[]).await.unwrap();

        let many: Vec<String> = (0..80).map(|i| format!("alias-{}", i)).collect();
        add_aliases(&pool, &id, &many).await.unwrap();
        add_aliases(&pool, &id, &many).await.unwrap();

        let entity = get_entity(&pool, &id).await.unwrap().unwrap();
        let aliases = entity.alias_list();
        assert!(aliases.len() <= 50);

        let mut lowered: Vec<String> = aliases.iter().map(|a| a.to_lowercase()).collect();
        lowered.sort();
        lowered.dedup();
        assert_eq!(lowered.len(), aliases.len());
    }

    #[tokio::test]
    async fn test_updated_at_advances_only_on_change() {
        let (_tmp, pool) = test_pool().await;
        let id = resolve_entity(&pool, "John Doe", "person", &[]).await.unwrap();
        let before = get_entity(&pool, &id).await.unwrap().unwrap().updated_at;

        // Re-adding known strings is a no-op
        add_aliases(&pool, &id, &["john doe".to_string()]).await.unwrap();
        let unchanged = get_entity(&pool, &id).await.unwrap().unwrap().updated_at;
        assert_eq!(before, unchanged);
    }

    #[tokio::test]
    async fn test_search_entities_by_alias_via_fts() {
        let (_tmp, pool) = test_pool().await;
        let mentions = vec!["the landlord".to_string()];
        let id = resolve_entity(&pool, "John Doe", "person", &mentions).await.unwrap();

        let hits = search_entities(&pool, "landlord").await.unwrap();
        assert!(hits.iter().any(|e| e.id == id));
    }

    #[tokio::test]
    async fn test_search_entities_fuzzy_fallback() {
        let (_tmp, pool) = test_pool().await;
        let id = resolve_entity(&pool, "Mariana", "person", &[]).await.unwrap();
        // Misspelling finds nothing in FTS, fuzzy fallback catches it
        let hits = search_entities(&pool, "Marianna").await.unwrap();
        assert!(hits.iter().any(|e| e.id == id));
    }

    #[tokio::test]
    async fn test_related_entities_direction_tagged() {
        let (_tmp, pool) = test_pool().await;
        let john = resolve_entity(&pool, "John Doe", "person", &[]).await.unwrap();
        let house = resolve_entity(&pool, "123 Main St", "property", &[]).await.unwrap();
        crate::relationships::find_or_create(&pool, &john, &house, "lives_at", None)
            .await
            .unwrap();

        let from_john = related_entities(&pool, &john).await.unwrap();
        assert_eq!(from_john.len(), 1);
        assert_eq!(from_john[0].direction, Direction::Outgoing);
        assert_eq!(from_john[0].rel_type, "lives_at");

        let from_house = related_entities(&pool, &house).await.unwrap();
        assert_eq!(from_house.len(), 1);
        assert_eq!(from_house[0].direction, Direction::Incoming);
    }
}
