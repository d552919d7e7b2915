use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Broadcast after store activity so every open window can resync.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StoreEvent {
    Changed(ResourceChangeEvent),
    /// State was replaced wholesale from storage.
    Reloaded { timestamp: DateTime<Utc> },
    /// User-visible message (toast).
    Notice {
        level: NoticeLevel,
        message: String,
        timestamp: DateTime<Utc>,
    },
}

impl StoreEvent {
    pub fn changed(resource_type: ResourceType, change_type: ChangeType, resource_id: &str) -> Self {
        StoreEvent::Changed(ResourceChangeEvent {
            resource_type,
            change_type,
            resource_id: resource_id.to_string(),
            timestamp: Utc::now(),
        })
    }

    pub fn notice(level: NoticeLevel, message: impl Into<String>) -> Self {
        StoreEvent::Notice {
            level,
            message: message.into(),
            timestamp: Utc::now(),
        }
    }

    /// SSE event name.
    pub fn as_sse_event(&self) -> &'static str {
        match self {
            StoreEvent::Changed(change) => change.resource_type.as_sse_event(),
            StoreEvent::Reloaded { .. } => "reloaded",
            StoreEvent::Notice { .. } => "notice",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ResourceChangeEvent {
    pub resource_type: ResourceType,
    pub change_type: ChangeType,
    pub resource_id: String,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ResourceType {
    Prompt,
    Category,
    Directory,
    ActiveCategory,
}

impl ResourceType {
    pub fn as_sse_event(self) -> &'static str {
        match self {
            ResourceType::Prompt => "prompt_change",
            ResourceType::Category => "category_change",
            ResourceType::Directory => "directory_change",
            ResourceType::ActiveCategory => "active_category_change",
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ChangeType {
    Created,
    Updated,
    Deleted,
    Reordered,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum NoticeLevel {
    Info,
    Error,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn changed_event_serializes_with_tag() {
        let event = StoreEvent::changed(ResourceType::Category, ChangeType::Reordered, "custom-1");
        let value = serde_json::to_value(&event).unwrap();
        assert_eq!(value["type"], "changed");
        assert_eq!(value["resource_type"], "category");
        assert_eq!(value["change_type"], "reordered");
        assert_eq!(event.as_sse_event(), "category_change");
    }

    #[test]
    fn notice_event_names() {
        let event = StoreEvent::notice(NoticeLevel::Error, "disk full");
        assert_eq!(event.as_sse_event(), "notice");
        let value = serde_json::to_value(&event).unwrap();
        assert_eq!(value["level"], "error");
        assert_eq!(value["message"], "disk full");
    }
}
