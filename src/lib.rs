//! # Rival Radar
//!
//! Retrieval-augmented competitive analysis over a CSV of competitor
//! profiles.
//!
//! Competitor rows are loaded from CSV, embedded through the Cohere API and
//! held in an in-memory vector index. Each question is classified by intent,
//! the most similar competitor records are retrieved, and a grounded answer
//! is generated from an intent-specific prompt template. Every answered
//! question lands in an owned query history that can be listed, summarized,
//! cleared and exported.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────┐   ┌──────────────┐   ┌───────────────┐
//! │   CSV    │──▶│  Retriever   │──▶│ InMemoryStore │
//! │  loader  │   │ embed+index  │   │   (vectors)   │
//! └──────────┘   └──────┬───────┘   └───────────────┘
//!                       │
//!                ┌──────▼───────┐   ┌───────────────┐
//!                │    Agent     │──▶│ HistoryStore  │
//!                │ intent+prompt│   └───────────────┘
//!                └──────┬───────┘
//!              ┌────────┴────────┐
//!              ▼                 ▼
//!         ┌──────────┐     ┌──────────┐
//!         │   CLI    │     │   HTTP   │
//!         │ (rival)  │     │  (axum)  │
//!         └──────────┘     └──────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```bash
//! export COHERE_API_KEY=...
//! rival data --init             # write the demo dataset
//! rival                         # interactive session
//! rival ask "Compare TechCorp and InnovateLabs"
//! rival serve                   # web interface on 127.0.0.1:8501
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML + environment configuration |
//! | [`data`] | Competitor CSV loading and the demo dataset |
//! | [`provider`] | Cohere embedding and chat client |
//! | [`retrieval`] | Indexing and similarity retrieval |
//! | [`agent`] | Query pipeline: validate, classify, retrieve, generate, record |
//! | [`cli`] | Interactive session and one-shot questions |
//! | [`server`] | HTTP interface |
//! | [`telemetry`] | Logging setup |
//!
//! The domain types, traits and pure logic live in `rival-radar-core` and
//! are re-exported here.

pub mod agent;
pub mod cli;
pub mod config;
pub mod data;
pub mod provider;
pub mod retrieval;
pub mod server;
pub mod telemetry;

pub use rival_radar_core::{embedding, history, intent, models, prompt, store};
