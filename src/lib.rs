//! # Notegraph
//!
//! A local-first personal knowledge graph built from your notes.
//!
//! Notegraph scans a vault of plain-text notes (markdown, text, CSV),
//! extracts entities and relationships from them with a local LLM, and
//! answers questions by walking the resulting graph. Everything lives in a
//! single SQLite database inside the vault.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────┐   ┌──────────────┐   ┌───────────┐
//! │  Vault   │──▶│   Extraction  │──▶│  SQLite   │
//! │ md/txt/csv│   │  LLM + dedup │   │ graph+FTS │
//! └──────────┘   └──────────────┘   └────┬──────┘
//!                                        │
//!                                        ▼
//!                                   ┌──────────┐
//!                                   │   CLI    │
//!                                   │  (note)  │
//!                                   └──────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```bash
//! note init                     # create database
//! note scan                     # sync vault files
//! note process                  # extract entities and relationships
//! note ask "who is my tenant?"  # answer from the graph
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing |
//! | [`models`] | Core data types |
//! | [`scan`] | Vault file sync |
//! | [`extract`] | Entity/relationship extraction prompts and validation |
//! | [`entities`] | Entity store and deduplicating resolution |
//! | [`process`] | Extraction pipeline driver |
//! | [`ask`] | Graph-backed question answering |
//! | [`db`] | Database connection |
//! | [`migrate`] | Schema migrations |

pub mod ask;
pub mod config;
pub mod db;
pub mod documents;
pub mod entities;
pub mod extract;
pub mod extract_text;
pub mod fingerprint;
pub mod links;
pub mod llm;
pub mod migrate;
pub mod models;
pub mod parse_json;
pub mod process;
pub mod relationships;
pub mod scan;
pub mod status;
pub mod walk;
