//! Query history store.
//!
//! An append-only, owned list of [`QueryHistoryEntry`] values. The store is
//! passed to whoever runs queries rather than living in module state, so
//! tests and independent sessions each get their own.
//!
//! Entries are never mutated once recorded. They leave the store only
//! through [`HistoryStore::clear`], or through eviction of the oldest entry
//! when a capacity was configured with [`HistoryStore::with_capacity`].
//!
//! [`HistoryStore::recent`] returns entries in chronological order (oldest
//! of the selected entries first), matching the export file.

use anyhow::{Context, Result};
use chrono::{DateTime, Local};
use serde::{Serialize, Serializer};
use std::collections::VecDeque;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;
use std::time::Duration;
use uuid::Uuid;

use crate::intent::Intent;

const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

fn serialize_millis<S: Serializer>(d: &Duration, s: S) -> std::result::Result<S::Ok, S::Error> {
    s.serialize_u64(d.as_millis() as u64)
}

/// One answered query.
#[derive(Debug, Clone, Serialize)]
pub struct QueryHistoryEntry {
    pub id: Uuid,
    pub query: String,
    pub response: String,
    pub timestamp: DateTime<Local>,
    #[serde(rename = "duration_ms", serialize_with = "serialize_millis")]
    pub duration: Duration,
    pub intent: Option<Intent>,
}

impl QueryHistoryEntry {
    pub fn timestamp_display(&self) -> String {
        self.timestamp.format(TIMESTAMP_FORMAT).to_string()
    }
}

/// Aggregate numbers over the current history.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HistoryStats {
    pub total_queries: usize,
    pub avg_seconds: f64,
    pub fastest_seconds: f64,
    pub slowest_seconds: f64,
    pub oldest: Option<String>,
    pub newest: Option<String>,
}

/// Owned, append-only query history.
#[derive(Debug, Default)]
pub struct HistoryStore {
    entries: VecDeque<QueryHistoryEntry>,
    capacity: Option<usize>,
}

impl HistoryStore {
    /// An unbounded store.
    pub fn new() -> Self {
        Self::default()
    }

    /// A store that drops its oldest entry once it holds `capacity` entries.
    /// A capacity of zero is treated as unbounded.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            entries: VecDeque::new(),
            capacity: (capacity > 0).then_some(capacity),
        }
    }

    pub fn capacity(&self) -> Option<usize> {
        self.capacity
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Append an entry stamped with the current local time.
    pub fn record(
        &mut self,
        query: impl Into<String>,
        response: impl Into<String>,
        duration: Duration,
        intent: Option<Intent>,
    ) -> &QueryHistoryEntry {
        self.push(QueryHistoryEntry {
            id: Uuid::new_v4(),
            query: query.into(),
            response: response.into(),
            timestamp: Local::now(),
            duration,
            intent,
        })
    }

    fn push(&mut self, entry: QueryHistoryEntry) -> &QueryHistoryEntry {
        if let Some(cap) = self.capacity {
            while self.entries.len() >= cap {
                self.entries.pop_front();
            }
        }
        self.entries.push_back(entry);
        &self.entries[self.entries.len() - 1]
    }

    /// The last `n` entries, oldest first.
    pub fn recent(&self, n: usize) -> Vec<QueryHistoryEntry> {
        let skip = self.entries.len().saturating_sub(n);
        self.entries.iter().skip(skip).cloned().collect()
    }

    /// All entries, oldest first.
    pub fn entries(&self) -> impl Iterator<Item = &QueryHistoryEntry> {
        self.entries.iter()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn stats(&self) -> HistoryStats {
        if self.entries.is_empty() {
            return HistoryStats {
                total_queries: 0,
                avg_seconds: 0.0,
                fastest_seconds: 0.0,
                slowest_seconds: 0.0,
                oldest: None,
                newest: None,
            };
        }
        let secs: Vec<f64> = self
            .entries
            .iter()
            .map(|e| e.duration.as_secs_f64())
            .collect();
        HistoryStats {
            total_queries: secs.len(),
            avg_seconds: secs.iter().sum::<f64>() / secs.len() as f64,
            fastest_seconds: secs.iter().cloned().fold(f64::INFINITY, f64::min),
            slowest_seconds: secs.iter().cloned().fold(0.0, f64::max),
            oldest: self.entries.front().map(|e| e.timestamp_display()),
            newest: self.entries.back().map(|e| e.timestamp_display()),
        }
    }

    /// Write every entry to `path` as human-readable text.
    pub fn export(&self, path: &Path) -> Result<()> {
        let file = File::create(path)
            .with_context(|| format!("Failed to create history export: {}", path.display()))?;
        let mut out = BufWriter::new(file);
        self.write_export(&mut out)
            .with_context(|| format!("Failed to write history export: {}", path.display()))?;
        out.flush()?;
        Ok(())
    }

    fn write_export<W: Write>(&self, out: &mut W) -> std::io::Result<()> {
        writeln!(out, "Rival Radar - Query History Export")?;
        writeln!(out, "Export Date: {}", Local::now().format(TIMESTAMP_FORMAT))?;
        writeln!(out, "{}", "=".repeat(60))?;
        writeln!(out)?;

        if self.entries.is_empty() {
            writeln!(out, "No query history available.")?;
            return Ok(());
        }

        let stats = self.stats();
        writeln!(out, "Statistics:")?;
        writeln!(out, "Total Queries: {}", stats.total_queries)?;
        writeln!(out, "Average Processing Time: {:.2}s", stats.avg_seconds)?;
        writeln!(out, "Oldest Query: {}", stats.oldest.unwrap_or_default())?;
        writeln!(out, "Newest Query: {}", stats.newest.unwrap_or_default())?;
        writeln!(out)?;

        for (i, entry) in self.entries.iter().enumerate() {
            writeln!(
                out,
                "{}. [{}] Processing Time: {:.2}s",
                i + 1,
                entry.timestamp_display(),
                entry.duration.as_secs_f64()
            )?;
            if let Some(intent) = entry.intent {
                writeln!(out, "Intent: {}", intent)?;
            }
            writeln!(out, "Query: {}", entry.query)?;
            writeln!(out, "Response: {}", entry.response)?;
            writeln!(out, "{}", "-".repeat(40))?;
            writeln!(out)?;
        }
        Ok(())
    }
}
