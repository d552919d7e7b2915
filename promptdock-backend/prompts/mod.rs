pub mod kv_repository;
pub mod reorder;
pub mod repository;
pub mod seed;

use chrono::Utc;
use serde::{Deserialize, Serialize};

/// A reusable text snippet. The `content` is what ends up on the clipboard.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Prompt {
    pub id: String,
    pub title: String,
    pub content: String,
    /// Id of the owning [`Category`].
    pub category: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub directory: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub author: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub author_url: Option<String>,
    /// Seeded from the bundled dataset. Never persisted, never edited.
    #[serde(default)]
    pub is_system: bool,
    #[serde(default)]
    pub order: i64,
    /// Epoch milliseconds.
    pub create_time: i64,
    /// Epoch milliseconds, always `>= create_time`.
    pub update_time: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Category {
    pub id: String,
    pub name: String,
    #[serde(rename = "type", default = "default_category_kind")]
    pub kind: String,
    #[serde(default)]
    pub order: i64,
    #[serde(default)]
    pub is_system: bool,
}

/// Finer-grained grouping inside a category. Ids are not globally unique
/// across categories.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Directory {
    pub id: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub icon: Option<String>,
    #[serde(default)]
    pub order: i64,
    #[serde(default)]
    pub is_system: bool,
}

pub(crate) fn default_category_kind() -> String {
    "product".to_string()
}

/// Caller-supplied fields for a new user prompt.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewPrompt {
    pub title: String,
    pub content: String,
    pub category: String,
    #[serde(default)]
    pub directory: Option<String>,
    #[serde(default)]
    pub author: Option<String>,
    #[serde(default)]
    pub author_url: Option<String>,
    /// Accepted so that clients may send whole records back; always overridden to `false`.
    #[serde(default)]
    pub is_system: bool,
}

/// Partial update of a prompt. `None` leaves a field untouched;
/// `Some(None)` clears an optional field.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PromptPatch {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub content: Option<String>,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default)]
    pub directory: Option<Option<String>>,
    #[serde(default)]
    pub author: Option<Option<String>>,
    #[serde(default)]
    pub author_url: Option<Option<String>>,
    #[serde(default)]
    pub order: Option<i64>,
}

impl PromptPatch {
    /// Merge the patch into `prompt` and bump `update_time`.
    pub fn apply(self, prompt: &mut Prompt, now: i64) {
        if let Some(title) = self.title {
            prompt.title = title;
        }
        if let Some(content) = self.content {
            prompt.content = content;
        }
        if let Some(category) = self.category {
            prompt.category = category;
        }
        if let Some(directory) = self.directory {
            prompt.directory = directory;
        }
        if let Some(author) = self.author {
            prompt.author = author;
        }
        if let Some(author_url) = self.author_url {
            prompt.author_url = author_url;
        }
        if let Some(order) = self.order {
            prompt.order = order;
        }
        prompt.update_time = now.max(prompt.create_time);
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct NewCategory {
    /// Honoured only when it carries the `custom-` prefix.
    #[serde(default)]
    pub id: Option<String>,
    pub name: String,
    #[serde(rename = "type", default)]
    pub kind: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct CategoryPatch {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(rename = "type", default)]
    pub kind: Option<String>,
    #[serde(default)]
    pub order: Option<i64>,
}

impl CategoryPatch {
    pub fn apply(self, category: &mut Category) {
        if let Some(name) = self.name {
            category.name = name;
        }
        if let Some(kind) = self.kind {
            category.kind = kind;
        }
        if let Some(order) = self.order {
            category.order = order;
        }
    }
}

pub fn now_millis() -> i64 {
    Utc::now().timestamp_millis()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn prompt() -> Prompt {
        Prompt {
            id: "p1".into(),
            title: "Title".into(),
            content: "Body".into(),
            category: "debug".into(),
            directory: Some("code".into()),
            author: None,
            author_url: None,
            is_system: false,
            order: 3,
            create_time: 1_000,
            update_time: 1_000,
        }
    }

    #[test]
    fn prompt_serializes_camel_case() {
        let value = serde_json::to_value(prompt()).unwrap();
        assert_eq!(value["isSystem"], false);
        assert_eq!(value["createTime"], 1_000);
        assert!(value.get("authorUrl").is_none());
    }

    #[test]
    fn category_reads_type_field() {
        let category: Category =
            serde_json::from_value(json!({ "id": "custom-1", "name": "Work", "type": "team" }))
                .unwrap();
        assert_eq!(category.kind, "team");
        assert_eq!(category.order, 0);
        assert!(!category.is_system);

        let category: Category =
            serde_json::from_value(json!({ "id": "custom-2", "name": "Misc" })).unwrap();
        assert_eq!(category.kind, "product");
    }

    #[test]
    fn patch_clears_optional_fields_and_bumps_update_time() {
        let mut p = prompt();
        let patch: PromptPatch =
            serde_json::from_value(json!({ "title": "New", "directory": null })).unwrap();
        patch.apply(&mut p, 5_000);
        assert_eq!(p.title, "New");
        assert_eq!(p.content, "Body");
        assert_eq!(p.update_time, 5_000);
        // `"directory": null` deserializes to None (absent), not Some(None)
        assert_eq!(p.directory.as_deref(), Some("code"));

        let patch = PromptPatch {
            directory: Some(None),
            ..Default::default()
        };
        patch.apply(&mut p, 6_000);
        assert!(p.directory.is_none());
    }

    #[test]
    fn patch_never_moves_update_time_before_create_time() {
        let mut p = prompt();
        PromptPatch::default().apply(&mut p, 10);
        assert_eq!(p.update_time, p.create_time);
    }
}
