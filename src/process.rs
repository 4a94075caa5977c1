//! Extraction pipeline: turn pending documents into graph entities,
//! relationships, and document-entity links.
//!
//! Documents are processed sequentially so each one sees the entities the
//! previous documents created. One document failing marks that document
//! errored and moves on; it never aborts the run.

use anyhow::Result;
use sqlx::SqlitePool;
use std::time::Instant;

use crate::config::Config;
use crate::documents;
use crate::entities;
use crate::extract::{extract_entities, extract_relationships};
use crate::links;
use crate::llm::ChatClient;
use crate::models::{now_rfc3339, Document, ProcessingStatus};
use crate::relationships;

/// Below this many characters there is nothing worth extracting.
const MIN_TEXT_LEN: usize = 10;

/// Cap on the text handed to the model in one request.
const MAX_TEXT_CHARS: usize = 32_000;

const TRUNCATION_MARKER: &str = "\n\n[TRUNCATED]";

/// Aggregate result of one processing run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ProcessSummary {
    pub processed: usize,
    pub errored: usize,
    pub entities_linked: usize,
    pub relationships_created: usize,
}

/// Extract and store the graph for a single document. Returns
/// `(entities_linked, relationships_created)`.
pub async fn process_document(
    pool: &SqlitePool,
    client: &dyn ChatClient,
    config: &Config,
    doc: &Document,
) -> Result<(usize, usize)> {
    let text = doc.body().trim().to_string();

    if text.chars().count() < MIN_TEXT_LEN {
        documents::mark_processed(
            pool,
            &doc.id,
            ProcessingStatus::Processed,
            Some("Skipped: text too short to extract from"),
        )
        .await?;
        return Ok((0, 0));
    }

    let text = if text.chars().count() > MAX_TEXT_CHARS {
        let truncated: String = text.chars().take(MAX_TEXT_CHARS).collect();
        format!("{}{}", truncated, TRUNCATION_MARKER)
    } else {
        text
    };

    // Reprocessing starts from a clean slate of links
    links::clear_document_entities(pool, &doc.id).await?;

    let known = entities::known_entities(pool).await?;
    let extracted = extract_entities(client, config, &text, &known).await?;

    // (id, name, type) for every entity this document mentions
    let mut resolved: Vec<(String, String, String)> = Vec::with_capacity(extracted.len());
    for entity in &extracted {
        let id = entities::resolve_entity(pool, &entity.name, &entity.entity_type, &entity.mentions)
            .await?;
        let mention = entity.mentions.first().map(|m| m.as_str());
        links::link_document_entity(pool, &doc.id, &id, mention, 1.0).await?;
        if !resolved.iter().any(|(existing, _, _)| existing == &id) {
            resolved.push((id, entity.name.clone(), entity.entity_type.clone()));
        }
    }

    let mut relationship_count = 0;
    if resolved.len() >= 2 {
        let pairs: Vec<(String, String)> = resolved
            .iter()
            .map(|(_, name, entity_type)| (name.clone(), entity_type.clone()))
            .collect();
        let extracted_rels = extract_relationships(client, config, &text, &pairs).await?;

        for rel in &extracted_rels {
            // Map names back through this document's resolutions, never a
            // fresh lookup: a fresh resolve could land on a different entity
            let source = resolved
                .iter()
                .find(|(_, name, _)| name.eq_ignore_ascii_case(&rel.source));
            let target = resolved
                .iter()
                .find(|(_, name, _)| name.eq_ignore_ascii_case(&rel.target));
            if let (Some((source_id, _, _)), Some((target_id, _, _))) = (source, target) {
                if source_id != target_id {
                    relationships::find_or_create(pool, source_id, target_id, &rel.rel_type, None)
                        .await?;
                    relationship_count += 1;
                }
            }
        }
    }

    documents::mark_processed(pool, &doc.id, ProcessingStatus::Processed, None).await?;
    Ok((resolved.len(), relationship_count))
}

/// Process every pending document. With `relink`, every document is first
/// reset to pending and stripped of its entity links, forcing a full
/// re-extraction against the current graph.
pub async fn run_process(
    pool: &SqlitePool,
    client: &dyn ChatClient,
    config: &Config,
    relink: bool,
) -> Result<ProcessSummary> {
    if relink {
        let mut tx = pool.begin().await?;
        sqlx::query("DELETE FROM document_entities")
            .execute(&mut *tx)
            .await?;
        sqlx::query("UPDATE documents SET processed = 0, error_msg = NULL, updated_at = ?")
            .bind(now_rfc3339())
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;
    }

    let pending = documents::pending_documents(pool).await?;
    let total = pending.len();
    let mut summary = ProcessSummary::default();
    let started = Instant::now();

    for (index, doc) in pending.iter().enumerate() {
        let label = doc
            .title
            .as_deref()
            .or(doc.file_path.as_deref())
            .unwrap_or(&doc.id);
        if index > 0 {
            let per_doc = started.elapsed().as_secs_f64() / index as f64;
            let eta = per_doc * (total - index) as f64;
            println!("[{}/{}] {} (eta {:.0}s)", index + 1, total, label, eta);
        } else {
            println!("[{}/{}] {}", index + 1, total, label);
        }

        match process_document(pool, client, config, doc).await {
            Ok((entity_count, relationship_count)) => {
                summary.processed += 1;
                summary.entities_linked += entity_count;
                summary.relationships_created += relationship_count;
            }
            Err(err) => {
                documents::mark_processed(
                    pool,
                    &doc.id,
                    ProcessingStatus::Errored,
                    Some(&err.to_string()),
                )
                .await?;
                summary.errored += 1;
                println!("  error: {:#}", err);
            }
        }
    }

    if total > 0 {
        println!(
            "Processed {} document(s) in {:.1}s ({} errored)",
            summary.processed,
            started.elapsed().as_secs_f64(),
            summary.errored
        );
    }

    Ok(summary)
}
