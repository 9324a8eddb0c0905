//! # Syllabus Core
//!
//! Runtime-independent logic for Syllabus: resource models, front-matter
//! parsing, the [`store::ResourceIndex`] abstraction with an in-memory
//! backend, filter predicates, retrieval, curriculum assembly, topic
//! extraction, and deterministic content synthesis.
//!
//! This crate contains no tokio, sqlx, HTTP, or filesystem I/O. The
//! `syllabus` app crate supplies the SQLite index, embedding providers,
//! and the generation client.

pub mod assembler;
pub mod content;
pub mod embedding;
pub mod error;
pub mod frontmatter;
pub mod keywords;
pub mod models;
pub mod predicate;
pub mod retriever;
pub mod store;
