//! Question answering over the knowledge graph.
//!
//! Retrieval is graph-first: model-extracted keywords seed entity matches,
//! each seed pulls in its one-hop neighborhood and the documents that
//! mention it, and the assembled context goes to the model with the
//! question. No answer is attempted without graph evidence.

use anyhow::Result;
use sqlx::SqlitePool;

use crate::config::{resolve_model, Config, ModelPurpose};
use crate::entities;
use crate::llm::{ChatClient, ChatMessage};
use crate::models::{Direction, Entity};
use crate::parse_json::parse_json_array;

/// Characters of document text shown around a mention.
const SNIPPET_WINDOW: usize = 300;

/// Seed entities per question.
const MAX_SEED_ENTITIES: usize = 10;

/// One-hop neighbors shown per seed.
const MAX_RELATED: usize = 10;

/// Documents shown per seed.
const MAX_DOCUMENTS: usize = 5;

/// Total context budget in characters.
const MAX_CONTEXT_CHARS: usize = 16_000;

const CONTEXT_TRUNCATION_MARKER: &str = "\n\n[CONTEXT TRUNCATED]";

pub const NO_ENTITIES_MESSAGE: &str =
    "No relevant entities found in your knowledge graph for this question.";

const KEYWORD_SYSTEM_PROMPT: &str = r#"You extract search keywords from questions about personal notes.
Return a JSON array of 1-5 short keyword strings that would find relevant entities: names, places, bill types, amounts, topics.

Examples:
"How much do I pay for water?" -> ["water", "water bill", "payment"]
"Who lives at the beach house?" -> ["beach house"]
"When did I last talk to John?" -> ["John"]

Rules:
- Prefer specific nouns and names over generic words.
- Do NOT include question words (who, what, when, how much).
- Return ONLY the JSON array, no other text."#;

const ASK_SYSTEM_PROMPT: &str = r#"You are a personal knowledge assistant. Answer the user's question using ONLY the provided context from their knowledge graph.

Rules:
- Base your answer strictly on the context. Do not invent facts.
- If the context does not contain the answer, say so plainly.
- Mention the specific entities, documents, and dates you drew on.
- Be concise and direct."#;

/// The answer plus the entities whose context informed it.
#[derive(Debug, Clone)]
pub struct AskResult {
    pub answer: String,
    pub referenced_entity_ids: Vec<String>,
}

/// A window of `content` around the first occurrence of `needle`
/// (case-insensitive), elided with `...` at cut edges. Falls back to the
/// head of the content when the needle is absent.
pub fn extract_relevant_snippet(content: &str, needle: &str, window: usize) -> String {
    let chars: Vec<char> = content.chars().collect();
    if chars.len() <= window {
        return content.to_string();
    }

    let lower_content = content.to_lowercase();
    let lower_needle = needle.to_lowercase();

    let center = if !lower_needle.is_empty() {
        lower_content
            .find(&lower_needle)
            .map(|byte_pos| lower_content[..byte_pos].chars().count())
            .unwrap_or(0)
    } else {
        0
    };

    let half = window / 2;
    let start = center.saturating_sub(half);
    let end = (start + window).min(chars.len());
    let start = end.saturating_sub(window);

    let mut snippet: String = chars[start..end].iter().collect();
    if start > 0 {
        snippet = format!("...{}", snippet);
    }
    if end < chars.len() {
        snippet = format!("{}...", snippet);
    }
    snippet
}

async fn extract_keywords(
    client: &dyn ChatClient,
    config: &Config,
    question: &str,
) -> Result<Vec<String>> {
    let response = client
        .complete(
            &[
                ChatMessage::system(KEYWORD_SYSTEM_PROMPT),
                ChatMessage::user(format!("Question: {}", question)),
            ],
            resolve_model(config, ModelPurpose::Ask),
        )
        .await?;

    let keywords: Vec<String> = parse_json_array(&response)
        .into_iter()
        .filter_map(|v| v.as_str().map(|s| s.trim().to_string()))
        .filter(|s| !s.is_empty())
        .collect();
    Ok(keywords)
}

/// Keyword matches plus entities reachable through matching documents,
/// deduplicated, capped at [`MAX_SEED_ENTITIES`].
async fn seed_entities(
    pool: &SqlitePool,
    question: &str,
    keywords: &[String],
) -> Result<Vec<Entity>> {
    let mut seeds: Vec<Entity> = Vec::new();

    let push_unique = |batch: Vec<Entity>, seeds: &mut Vec<Entity>| {
        for entity in batch {
            if seeds.len() >= MAX_SEED_ENTITIES {
                break;
            }
            if !seeds.iter().any(|s| s.id == entity.id) {
                seeds.push(entity);
            }
        }
    };

    for keyword in keywords {
        push_unique(entities::search_entities(pool, keyword).await?, &mut seeds);
        push_unique(
            entities::search_document_entities(pool, keyword).await?,
            &mut seeds,
        );
    }

    // Last resort: match on the raw question text
    if seeds.is_empty() {
        push_unique(entities::search_entities(pool, question).await?, &mut seeds);
        push_unique(
            entities::search_document_entities(pool, question).await?,
            &mut seeds,
        );
    }

    Ok(seeds)
}

/// Render one context block per seed. Returns the assembled context plus
/// the ids of every entity that appears in it (seeds and their neighbors).
async fn build_context(
    pool: &SqlitePool,
    seeds: &[Entity],
    keywords: &[String],
) -> Result<(String, Vec<String>)> {
    let mut blocks: Vec<String> = Vec::with_capacity(seeds.len());
    let mut referenced: Vec<String> = seeds.iter().map(|s| s.id.clone()).collect();
    let needle = keywords.first().map(|k| k.as_str()).unwrap_or("");

    for seed in seeds {
        let mut block = format!("## Entity: {} ({})\n", seed.name, seed.entity_type);

        let aliases = seed.alias_list();
        if !aliases.is_empty() {
            block.push_str(&format!("Also known as: {}\n", aliases.join(", ")));
        }

        let related = entities::related_entities(pool, &seed.id).await?;
        if !related.is_empty() {
            block.push_str("Related:\n");
            for rel in related.iter().take(MAX_RELATED) {
                if !referenced.contains(&rel.entity.id) {
                    referenced.push(rel.entity.id.clone());
                }
                let line = match rel.direction {
                    Direction::Outgoing => format!(
                        "- {} -> {} ({})\n",
                        rel.rel_type, rel.entity.name, rel.entity.entity_type
                    ),
                    Direction::Incoming => format!(
                        "- {} <- {} ({})\n",
                        rel.rel_type, rel.entity.name, rel.entity.entity_type
                    ),
                };
                block.push_str(&line);
            }
        }

        let docs = entities::documents_for_entity(pool, &seed.id).await?;
        if !docs.is_empty() {
            block.push_str("Mentioned in:\n");
            for doc in docs.iter().take(MAX_DOCUMENTS) {
                let label = doc
                    .title
                    .as_deref()
                    .or(doc.file_path.as_deref())
                    .unwrap_or("(untitled)");
                let date = doc.date.as_deref().unwrap_or("no date");
                let body = doc.content.as_deref().unwrap_or("");
                let mention = doc.mention.as_deref().unwrap_or(needle);
                let snippet = extract_relevant_snippet(body, mention, SNIPPET_WINDOW);
                block.push_str(&format!("- {} ({}): {}\n", label, date, snippet));
            }
        }

        blocks.push(block);
    }

    let mut context = blocks.join("\n");
    if context.chars().count() > MAX_CONTEXT_CHARS {
        context = context.chars().take(MAX_CONTEXT_CHARS).collect();
        context.push_str(CONTEXT_TRUNCATION_MARKER);
    }
    Ok((context, referenced))
}

/// Answer a question from the graph. Returns [`NO_ENTITIES_MESSAGE`] as the
/// answer, without calling the answering model, when retrieval finds nothing.
pub async fn answer_question(
    pool: &SqlitePool,
    client: &dyn ChatClient,
    config: &Config,
    question: &str,
) -> Result<AskResult> {
    // A failed keyword call is not fatal; retrieval falls back to the raw question
    let keywords = extract_keywords(client, config, question)
        .await
        .unwrap_or_default();
    let seeds = seed_entities(pool, question, &keywords).await?;

    if seeds.is_empty() {
        return Ok(AskResult {
            answer: NO_ENTITIES_MESSAGE.to_string(),
            referenced_entity_ids: Vec::new(),
        });
    }

    let (context, referenced_entity_ids) = build_context(pool, &seeds, &keywords).await?;
    let answer = client
        .complete(
            &[
                ChatMessage::system(ASK_SYSTEM_PROMPT),
                ChatMessage::user(format!("Context:\n{}\n\nQuestion: {}", context, question)),
            ],
            resolve_model(config, ModelPurpose::Ask),
        )
        .await?;

    Ok(AskResult {
        answer,
        referenced_entity_ids,
    })
}
