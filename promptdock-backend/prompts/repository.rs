use anyhow::Result;
use async_trait::async_trait;

use super::{Category, Directory, Prompt, PromptPatch};

/// Storage adapter between the in-memory store and persistence.
///
/// Reads never fail: unreadable storage yields the system records alone.
/// Writes return an error so the caller can keep memory and disk in step.
#[async_trait]
pub trait PromptRepository: Send + Sync {
    /// System prompts followed by user prompts.
    async fn get_prompts(&self) -> Vec<Prompt>;
    /// System categories followed by user categories, sorted by `order`.
    async fn get_categories(&self) -> Vec<Category>;
    async fn get_directories(&self) -> Vec<Directory>;

    async fn add_prompt(&self, prompt: Prompt) -> Result<()>;
    /// Returns the updated record, or `None` when `id` is unknown or a system prompt.
    async fn update_prompt(&self, id: &str, patch: PromptPatch) -> Result<Option<Prompt>>;
    /// Returns whether a user prompt was removed. System ids are a no-op.
    async fn delete_prompt(&self, id: &str) -> Result<bool>;
    /// Replace all persisted prompts with the user subset of `prompts`.
    async fn reset_prompts(&self, prompts: Vec<Prompt>) -> Result<()>;

    async fn save_categories(&self, categories: Vec<Category>) -> Result<()>;
    async fn save_directories(&self, directories: Vec<Directory>) -> Result<()>;
}
