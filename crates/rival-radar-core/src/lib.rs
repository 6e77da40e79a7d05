//! # Rival Radar Core
//!
//! Shared, runtime-agnostic logic for Rival Radar: competitor data models,
//! query intent analysis, prompt templates, the query history store, the
//! vector store abstraction, and the embedding trait.
//!
//! This crate contains no tokio, reqwest, filesystem discovery, or other
//! native-only I/O beyond writing history exports. Network-backed
//! embedding and generation live in the `rival-radar` app crate.

pub mod embedding;
pub mod history;
pub mod intent;
pub mod models;
pub mod prompt;
pub mod store;
