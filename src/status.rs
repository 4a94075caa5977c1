//! Graph status overview.
//!
//! A quick summary of what's indexed: document counts by kind and state,
//! entity counts by type, and relationship totals. Used by `note status` to
//! confirm that scans and processing are keeping up with the vault.

use anyhow::Result;

use crate::config::Config;
use crate::db;
use crate::documents;
use crate::entities;
use crate::relationships;

/// Run the status command: query the database and print a summary.
pub async fn run_status(config: &Config) -> Result<()> {
    let db_path = db::db_path(config);
    let pool = db::connect(config).await?;

    let doc_counts = documents::document_counts(&pool).await?;
    let entity_counts = entities::entity_counts(&pool).await?;
    let relationship_count = relationships::count(&pool).await?;

    let db_size = std::fs::metadata(&db_path).map(|m| m.len()).unwrap_or(0);

    println!("Notegraph — Status");
    println!("==================");
    println!();
    println!("  Vault:         {}", config.vault.path.display());
    println!("  Database:      {}", db_path.display());
    println!("  Size:          {}", format_bytes(db_size));
    println!();
    println!(
        "  Documents:     {} ({} files, {} entries)",
        doc_counts.total, doc_counts.files, doc_counts.entries
    );
    println!(
        "  Processed:     {} / {} ({} pending, {} errored)",
        doc_counts.processed, doc_counts.total, doc_counts.pending, doc_counts.errored
    );
    println!();

    let total_entities: i64 = entity_counts.iter().map(|(_, count)| count).sum();
    println!("  Entities:      {}", total_entities);
    for (entity_type, count) in &entity_counts {
        println!("    {:<12} {}", entity_type, count);
    }
    println!("  Relationships: {}", relationship_count);
    println!();

    pool.close().await;
    Ok(())
}

/// Format a byte count as a human-readable string.
fn format_bytes(bytes: u64) -> String {
    if bytes < 1024 {
        format!("{} B", bytes)
    } else if bytes < 1024 * 1024 {
        format!("{:.1} KB", bytes as f64 / 1024.0)
    } else if bytes < 1024 * 1024 * 1024 {
        format!("{:.1} MB", bytes as f64 / (1024.0 * 1024.0))
    } else {
        format!("{:.2} GB", bytes as f64 / (1024.0 * 1024.0 * 1024.0))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_bytes() {
        assert_eq!(format_bytes(512), "512 B");
        assert_eq!(format_bytes(2048), "2.0 KB");
        assert_eq!(format_bytes(5 * 1024 * 1024), "5.0 MB");
    }
}
