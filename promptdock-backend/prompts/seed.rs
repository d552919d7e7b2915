//! Bundled, read-only system dataset.
//!
//! The seed document maps a system category id to its prompt entries, plus an
//! optional `version` stamp:
//!
//! ```json
//! { "version": 1, "debug": [{ "id": "debug-1", "title": "...", "content": "..." }] }
//! ```
//!
//! System records are rebuilt from this document on every read and are never
//! written to user storage. Their timestamps derive from the seed version so
//! repeated reads return identical records.
use std::collections::BTreeMap;
use std::path::Path;

use anyhow::{Context, Result};
use serde::Deserialize;

use super::{Category, Directory, Prompt, default_category_kind};

const BUNDLED_SEED: &str = include_str!("../../static/system-prompts.json");

/// 2024-01-01T00:00:00Z. Seed version `n` is stamped `n` days after this.
pub const SEED_EPOCH_MS: i64 = 1_704_067_200_000;
const DAY_MS: i64 = 86_400_000;

pub const SYSTEM_AUTHOR: &str = "System";

/// Fixed system categories, in display order: `(id, name)`.
pub const SYSTEM_CATEGORIES: [(&str, &str); 4] = [
    ("requirement", "Requirements & Analysis"),
    ("debug", "Bug Fixing & Debugging"),
    ("deployment", "Git & Deployment"),
    ("summary", "Summaries & Documentation"),
];

/// Fixed system directories: `(id, name)`.
pub const SYSTEM_DIRECTORIES: [(&str, &str); 3] = [
    ("default", "Default"),
    ("code", "Code Snippets"),
    ("text", "Text Templates"),
];

#[derive(Debug, Deserialize)]
struct SeedDocument {
    #[serde(default)]
    version: u32,
    #[serde(flatten)]
    groups: BTreeMap<String, Vec<SeedEntry>>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SeedEntry {
    id: String,
    title: String,
    content: String,
    #[serde(default)]
    category: Option<String>,
    #[serde(default)]
    author: Option<String>,
    #[serde(default)]
    author_url: Option<String>,
}

#[derive(Debug, Clone)]
pub struct SystemSeed {
    version: u32,
    prompts: Vec<Prompt>,
}

impl SystemSeed {
    /// The seed compiled into the binary.
    pub fn bundled() -> Result<Self> {
        Self::from_json(BUNDLED_SEED).context("bundled system seed is invalid")
    }

    pub fn from_path(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read seed file: {}", path.display()))?;
        Self::from_json(&raw).with_context(|| format!("failed to parse seed file: {}", path.display()))
    }

    pub fn from_json(raw: &str) -> Result<Self> {
        let mut doc: SeedDocument = serde_json::from_str(raw)?;
        let stamp = seed_timestamp(doc.version);

        let mut prompts = Vec::new();
        for (category_id, _) in SYSTEM_CATEGORIES {
            let Some(entries) = doc.groups.remove(category_id) else {
                tracing::warn!(category = category_id, "seed has no prompts for system category");
                continue;
            };
            for (index, entry) in entries.into_iter().enumerate() {
                prompts.push(Prompt {
                    id: entry.id,
                    title: entry.title,
                    content: entry.content,
                    category: entry.category.unwrap_or_else(|| category_id.to_string()),
                    directory: None,
                    author: Some(entry.author.unwrap_or_else(|| SYSTEM_AUTHOR.to_string())),
                    author_url: entry.author_url,
                    is_system: true,
                    order: index as i64,
                    create_time: stamp,
                    update_time: stamp,
                });
            }
        }

        for group in doc.groups.keys() {
            tracing::warn!(group = %group, "skipping seed group without a system category");
        }

        tracing::debug!(version = doc.version, count = prompts.len(), "loaded system seed");
        Ok(Self {
            version: doc.version,
            prompts,
        })
    }

    pub fn version(&self) -> u32 {
        self.version
    }

    /// Fresh copies of the system prompts.
    pub fn prompts(&self) -> Vec<Prompt> {
        self.prompts.clone()
    }

    pub fn is_system_prompt(&self, id: &str) -> bool {
        self.prompts.iter().any(|p| p.id == id)
    }

    pub fn categories(&self) -> Vec<Category> {
        SYSTEM_CATEGORIES
            .iter()
            .enumerate()
            .map(|(index, (id, name))| Category {
                id: id.to_string(),
                name: name.to_string(),
                kind: default_category_kind(),
                order: index as i64,
                is_system: true,
            })
            .collect()
    }

    pub fn directories(&self) -> Vec<Directory> {
        SYSTEM_DIRECTORIES
            .iter()
            .enumerate()
            .map(|(index, (id, name))| Directory {
                id: id.to_string(),
                name: name.to_string(),
                icon: None,
                order: index as i64,
                is_system: true,
            })
            .collect()
    }
}

fn seed_timestamp(version: u32) -> i64 {
    SEED_EPOCH_MS + i64::from(version) * DAY_MS
}
