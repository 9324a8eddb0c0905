//! # Syllabus
//!
//! Retrieval-augmented curriculum building over a directory of educational
//! resources.
//!
//! Markdown files with YAML front matter are parsed into typed records,
//! embedded, and stored in a SQLite-backed index. Filtered semantic search
//! feeds a curriculum assembler and a prompt-driven generator, both
//! exposed via a CLI and an HTTP API.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────┐   ┌─────────────┐   ┌───────────┐
//! │  Resources  │──▶│ Front matter│──▶│  SQLite    │
//! │   (*.md)    │   │  + Embed    │   │ index      │
//! └─────────────┘   └─────────────┘   └─────┬─────┘
//!                                           │
//!                  ┌────────────────────────┤
//!                  ▼                        ▼
//!            ┌──────────┐  ┌─────────┐  ┌──────────┐
//!            │ Retriever│─▶│Assembler│─▶│ Augmenter│
//!            └──────────┘  └─────────┘  └──────────┘
//!                  │                        │
//!                  └──────────┬─────────────┘
//!                             ▼
//!                   ┌──────────────────┐
//!                   │  CLI  /  HTTP    │
//!                   └──────────────────┘
//! ```
//!
//! Domain types and pure logic live in the `syllabus-core` crate; this
//! crate adds storage, providers, and the outer surfaces.
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing |
//! | [`db`] | Database connection |
//! | [`migrate`] | Schema migrations |
//! | [`sqlite_store`] | SQLite-backed resource index |
//! | [`embedding`] | Embedding providers |
//! | [`generation`] | LLM text generation clients |
//! | [`ingest`] | Directory ingestion |
//! | [`augment`] | Detailed content with retry and fallback |
//! | [`prompt`] | Prompt-driven generation |
//! | [`service`] | The application service |
//! | [`report`] | CLI text output |
//! | [`server`] | HTTP API |

pub mod augment;
pub mod config;
pub mod db;
pub mod embedding;
pub mod generation;
pub mod ingest;
pub mod migrate;
pub mod prompt;
pub mod report;
pub mod server;
pub mod service;
pub mod sqlite_store;

#[cfg(test)]
mod testing;
