//! Vault sync: reconcile the document store with the files on disk.
//!
//! Files are matched by relative path; fingerprints decide whether a known
//! file needs re-ingestion. Files that disappeared from disk are deleted
//! from the store at the end of the pass.

use anyhow::Result;
use sqlx::SqlitePool;
use std::collections::HashSet;
use std::path::Path;

use crate::documents;
use crate::extract_text::extract_content;
use crate::fingerprint::fingerprint_file;
use crate::models::ScanSummary;
use crate::walk::walk_vault;

/// Walk the vault and sync every supported file into the document store.
pub async fn run_scan(pool: &SqlitePool, vault_path: &Path) -> Result<ScanSummary> {
    let files = walk_vault(vault_path)?;
    let mut summary = ScanSummary::default();
    let mut seen: HashSet<String> = HashSet::with_capacity(files.len());

    for file in &files {
        seen.insert(file.relative_path.clone());

        let hash = fingerprint_file(&file.absolute_path)?;
        let existing = documents::get_document_by_path(pool, &file.relative_path).await?;

        match existing {
            Some(doc) if doc.file_hash.as_deref() == Some(hash.as_str()) => {
                summary.unchanged += 1;
            }
            Some(doc) => {
                let extracted =
                    extract_content(&file.relative_path, &file.absolute_path, &file.file_type)?;
                documents::update_file_document(pool, &doc.id, &hash, &extracted).await?;
                summary.modified += 1;
            }
            None => {
                let extracted =
                    extract_content(&file.relative_path, &file.absolute_path, &file.file_type)?;
                documents::create_file_document(
                    pool,
                    &file.relative_path,
                    &hash,
                    &file.file_type,
                    &extracted,
                )
                .await?;
                summary.new += 1;
            }
        }
    }

    // Anything indexed but no longer on disk is gone
    for (id, path) in documents::file_documents(pool).await? {
        if !seen.contains(&path) {
            documents::delete_document(pool, &id).await?;
            summary.deleted += 1;
        }
    }

    Ok(summary)
}
