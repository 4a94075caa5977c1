//! Extraction prompts and record validation.
//!
//! Model-returned records are untyped JSON values; nothing is admitted into
//! the graph without passing the explicit validation here. Malformed records
//! are dropped silently: they are expected noise from a non-deterministic
//! extractor, not errors.

use anyhow::Result;
use serde_json::Value;

use crate::config::{resolve_model, Config, ModelPurpose};
use crate::llm::{ChatClient, ChatMessage};
use crate::parse_json::parse_json_array;

/// Known entity names included in the extraction prompt, capped to avoid
/// blowing the model's context window.
const KNOWN_ENTITY_CAP: usize = 200;

/// Relationship vocabulary under the constrained (default) policy.
pub const ALLOWED_RELATIONSHIP_TYPES: &[&str] = &[
    "payment_for",
    "bill_for",
    "lives_at",
    "tenant_of",
    "works_at",
    "employee_of",
    "located_in",
    "owns",
    "visited",
    "part_of",
    "mentioned_with",
    "related_to",
];

const ENTITY_SYSTEM_PROMPT: &str = r#"You are an entity extraction system. Given a text, extract all notable entities.
Return a JSON array. Each element must have:
- "name": canonical name of the entity (e.g. "123 Main St", not "the house")
- "type": one of: person, property, expense, bill, organization, location, date, concept
- "mentions": array of exact text spans that refer to this entity

Entity type guide:
- person: people's names, nicknames, roles (e.g. "John Doe", "Mom", "Dr. Smith", "the landlord")
- property: physical properties, addresses, real estate (e.g. "123 Main St", "the apartment")
- expense: monetary amounts (e.g. "$150", "$2,500/month")
- bill: types of bills/payments (e.g. "utility bill", "insurance", "mortgage payment")
- organization: companies, agencies, institutions (e.g. "Acme Corp", "City Water Dept")
- location: places, cities, areas (e.g. "San Francisco", "downtown")
- date: specific dates or time references (e.g. "January 15", "Q1 2024")
- concept: projects, events, abstract ideas (e.g. "kitchen renovation", "project launch")

Rules:
- Extract ALL entities, even small ones. Better to over-extract than miss something.
- Use canonical/normalized names (e.g. "John Doe" not "john").
- Monetary amounts: include the $ sign and number (e.g. "$150").
- If the text contains [[wiki-links]], the text inside [[ ]] is almost certainly an entity — extract it.
- Do NOT extract generic words that aren't specific entities (e.g. don't extract "today" unless it refers to a specific date).
- Return ONLY the JSON array, no other text."#;

const RELATIONSHIP_SYSTEM_PROMPT: &str = r#"You are a relationship extraction system. Given a text and a list of entities found in it, extract relationships between those entities.
Return a JSON array. Each element must have:
- "source": name of the source entity (must be from the provided entity list)
- "target": name of the target entity (must be from the provided entity list)
- "type": one of the allowed types listed below

Allowed relationship types (use ONLY these):
- payment_for: an expense/amount is a payment for something
- bill_for: a bill is associated with a property/service
- lives_at: a person lives at a property
- tenant_of: a person rents a property
- works_at: a person works at an organization
- employee_of: a person is employed by an organization
- located_in: something is in a location
- owns: a person owns a property/thing
- visited: a person went to a place or organization
- part_of: something is part of something else
- mentioned_with: two entities appear together in context but no specific relationship
- related_to: generic fallback when nothing else fits

Rules:
- Only use entity names from the provided list - do not invent new entities.
- Only use relationship types from the allowed list above - do not invent new types.
- Each relationship should be directional: source -> target.
- Create only ONE relationship per entity pair. Pick the most specific type.
- Return ONLY the JSON array, no other text.
- If no relationships exist, return an empty array: []"#;

/// A validated entity record from the model.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtractedEntity {
    pub name: String,
    pub entity_type: String,
    pub mentions: Vec<String>,
}

/// A validated relationship record from the model.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtractedRelationship {
    pub source: String,
    pub target: String,
    pub rel_type: String,
}

/// Validate raw records into entities: object shape, non-empty string name
/// and type (type lowercased), mentions filtered to strings and defaulting
/// to the name itself.
pub fn validate_entity_records(records: Vec<Value>) -> Vec<ExtractedEntity> {
    records
        .into_iter()
        .filter_map(|record| {
            let obj = record.as_object()?;
            let name = obj.get("name")?.as_str()?.trim();
            let entity_type = obj.get("type")?.as_str()?.trim();
            if name.is_empty() || entity_type.is_empty() {
                return None;
            }

            let mentions = match obj.get("mentions").and_then(|m| m.as_array()) {
                Some(items) => {
                    let strings: Vec<String> = items
                        .iter()
                        .filter_map(|m| m.as_str())
                        .map(|m| m.to_string())
                        .collect();
                    if strings.is_empty() {
                        vec![name.to_string()]
                    } else {
                        strings
                    }
                }
                None => vec![name.to_string()],
            };

            Some(ExtractedEntity {
                name: name.to_string(),
                entity_type: entity_type.to_lowercase(),
                mentions,
            })
        })
        .collect()
}

/// Validate raw records into relationships against the set of resolved
/// entity names for this document. Drops records whose source or target is
/// not in the set, self-loops, and duplicate ordered pairs (first wins).
/// Types are snake_cased; under the constrained policy unknown types coerce
/// to `related_to`.
pub fn validate_relationship_records(
    records: Vec<Value>,
    entity_names: &[String],
    open_types: bool,
) -> Vec<ExtractedRelationship> {
    let known: Vec<String> = entity_names.iter().map(|n| n.to_lowercase()).collect();
    let mut seen_pairs: Vec<(String, String)> = Vec::new();

    records
        .into_iter()
        .filter_map(|record| {
            let obj = record.as_object()?;
            let source = obj.get("source")?.as_str()?.trim().to_string();
            let target = obj.get("target")?.as_str()?.trim().to_string();
            let raw_type = obj.get("type")?.as_str()?.trim();
            if source.is_empty() || target.is_empty() || raw_type.is_empty() {
                return None;
            }

            let source_lower = source.to_lowercase();
            let target_lower = target.to_lowercase();
            if source_lower == target_lower {
                return None;
            }
            if !known.contains(&source_lower) || !known.contains(&target_lower) {
                return None;
            }

            let pair = (source_lower, target_lower);
            if seen_pairs.contains(&pair) {
                return None;
            }
            seen_pairs.push(pair);

            let normalized: String = raw_type
                .to_lowercase()
                .split_whitespace()
                .collect::<Vec<_>>()
                .join("_");
            let rel_type = if open_types || ALLOWED_RELATIONSHIP_TYPES.contains(&normalized.as_str())
            {
                normalized
            } else {
                "related_to".to_string()
            };

            Some(ExtractedRelationship {
                source,
                target,
                rel_type,
            })
        })
        .collect()
}

/// Ask the model for entities in `text`, seeding it with known entity names
/// so canonical names get reused across documents.
pub async fn extract_entities(
    client: &dyn ChatClient,
    config: &Config,
    text: &str,
    known_entities: &[(String, String)],
) -> Result<Vec<ExtractedEntity>> {
    let mut user_prompt = format!("Extract entities from this text:\n\n{}", text);

    if !known_entities.is_empty() {
        let listing: Vec<String> = known_entities
            .iter()
            .take(KNOWN_ENTITY_CAP)
            .map(|(name, entity_type)| format!("{} ({})", name, entity_type))
            .collect();
        user_prompt.push_str(&format!(
            "\n\nKnown entities (reuse these names if they match):\n{}",
            listing.join(", ")
        ));
    }

    let response = client
        .complete(
            &[
                ChatMessage::system(ENTITY_SYSTEM_PROMPT),
                ChatMessage::user(user_prompt),
            ],
            resolve_model(config, ModelPurpose::Extraction),
        )
        .await?;

    Ok(validate_entity_records(parse_json_array(&response)))
}

/// Ask the model for relationships between the already-resolved entities.
/// Callers skip this when fewer than two entities resolved.
pub async fn extract_relationships(
    client: &dyn ChatClient,
    config: &Config,
    text: &str,
    entities: &[(String, String)],
) -> Result<Vec<ExtractedRelationship>> {
    let listing: Vec<String> = entities
        .iter()
        .map(|(name, entity_type)| format!("{} ({})", name, entity_type))
        .collect();

    let user_prompt = format!(
        "Text:\n{}\n\nEntities found:\n{}\n\nExtract relationships between these entities.",
        text,
        listing.join("\n")
    );

    let response = client
        .complete(
            &[
                ChatMessage::system(RELATIONSHIP_SYSTEM_PROMPT),
                ChatMessage::user(user_prompt),
            ],
            resolve_model(config, ModelPurpose::Extraction),
        )
        .await?;

    let names: Vec<String> = entities.iter().map(|(name, _)| name.clone()).collect();
    Ok(validate_relationship_records(
        parse_json_array(&response),
        &names,
        config.llm.open_relationship_types,
    ))
}
