//! In-memory state shared by the main window and the floating panel.
//!
//! Every mutating action runs under one async lock: it computes the next
//! state from the current one, persists it through the [`PromptRepository`],
//! and only then swaps it into memory. A failed write therefore leaves memory
//! exactly as it was, and the failure is broadcast as a [`StoreEvent::Notice`].
pub mod error;
pub mod events;

use std::sync::Arc;

use chrono::Utc;
use serde::Serialize;
use tokio::sync::{Mutex, RwLock, broadcast};
use uuid::Uuid;

use crate::prompts::reorder::{next_order, reindex, scoped_reindex};
use crate::prompts::repository::PromptRepository;
use crate::prompts::{
    Category, CategoryPatch, Directory, NewCategory, NewPrompt, Prompt, PromptPatch,
    default_category_kind, now_millis,
};
pub use error::StoreError;
use events::{ChangeType, NoticeLevel, ResourceType, StoreEvent};

pub type StoreResult<T> = Result<T, StoreError>;

const CUSTOM_CATEGORY_PREFIX: &str = "custom-";
const DIRECTORY_PREFIX: &str = "dir-";

#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StoreState {
    pub prompts: Vec<Prompt>,
    pub categories: Vec<Category>,
    pub directories: Vec<Directory>,
    /// `None` shows every category.
    pub active_category: Option<String>,
    pub is_loading: bool,
}

pub struct PromptStore {
    repo: Arc<dyn PromptRepository>,
    state: RwLock<StoreState>,
    mutation: Mutex<()>,
    events_tx: broadcast::Sender<StoreEvent>,
    fallback_category: Option<String>,
}

impl PromptStore {
    /// Create an empty store. Call [`PromptStore::initialize`] before use.
    pub fn new(repo: Arc<dyn PromptRepository>, fallback_category: Option<String>) -> Self {
        let (events_tx, _) = broadcast::channel(256);
        Self {
            repo,
            state: RwLock::new(StoreState::default()),
            mutation: Mutex::new(()),
            events_tx,
            fallback_category,
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<StoreEvent> {
        self.events_tx.subscribe()
    }

    pub async fn snapshot(&self) -> StoreState {
        self.state.read().await.clone()
    }

    /// Replace the whole state from storage. Safe to call repeatedly.
    pub async fn initialize(&self) {
        let _guard = self.mutation.lock().await;
        self.load().await;
        self.emit(StoreEvent::Reloaded {
            timestamp: Utc::now(),
        });
    }

    /// Reload from storage, emitting [`StoreEvent::Reloaded`] only when the
    /// stored data differs from memory. Returns whether anything changed.
    pub async fn reload_if_changed(&self) -> bool {
        let _guard = self.mutation.lock().await;
        let (prompts, categories, directories) = tokio::join!(
            self.repo.get_prompts(),
            self.repo.get_categories(),
            self.repo.get_directories(),
        );

        {
            let state = self.state.read().await;
            if state.prompts == prompts
                && state.categories == categories
                && state.directories == directories
            {
                return false;
            }
        }

        self.commit_loaded(prompts, categories, directories).await;
        self.emit(StoreEvent::Reloaded {
            timestamp: Utc::now(),
        });
        self.emit(StoreEvent::notice(
            NoticeLevel::Info,
            "prompt library reloaded after an external change",
        ));
        true
    }

    async fn load(&self) {
        self.state.write().await.is_loading = true;
        let (prompts, categories, directories) = tokio::join!(
            self.repo.get_prompts(),
            self.repo.get_categories(),
            self.repo.get_directories(),
        );
        self.commit_loaded(prompts, categories, directories).await;
    }

    async fn commit_loaded(
        &self,
        prompts: Vec<Prompt>,
        categories: Vec<Category>,
        directories: Vec<Directory>,
    ) {
        let mut state = self.state.write().await;
        state.prompts = prompts;
        state.categories = categories;
        state.directories = directories;
        state.is_loading = false;

        let stale_active = state
            .active_category
            .as_ref()
            .is_some_and(|active| !state.categories.iter().any(|c| &c.id == active));
        if stale_active {
            state.active_category = None;
        }

        tracing::info!(
            prompts = state.prompts.len(),
            categories = state.categories.len(),
            directories = state.directories.len(),
            "store loaded"
        );
    }

    fn emit(&self, event: StoreEvent) {
        // No subscribers is fine.
        let _ = self.events_tx.send(event);
    }

    fn changed(&self, resource: ResourceType, change: ChangeType, id: &str) {
        self.emit(StoreEvent::changed(resource, change, id));
    }

    fn reject<T>(&self, err: StoreError) -> StoreResult<T> {
        if err.is_rejection() {
            tracing::info!(error = %err, "store action rejected");
        } else {
            tracing::error!(error = %err, "store action failed");
        }
        self.emit(StoreEvent::notice(NoticeLevel::Error, err.to_string()));
        Err(err)
    }

    // --- Queries ---

    pub async fn get_prompt(&self, id: &str) -> Option<Prompt> {
        self.state
            .read()
            .await
            .prompts
            .iter()
            .find(|p| p.id == id)
            .cloned()
    }

    /// Prompts in `category` (all when `None`) whose title or content contains
    /// `query` case-insensitively, sorted by `order` then creation time.
    pub async fn filter_prompts(&self, category: Option<&str>, query: Option<&str>) -> Vec<Prompt> {
        let needle = query
            .map(str::trim)
            .filter(|q| !q.is_empty())
            .map(str::to_lowercase);

        let state = self.state.read().await;
        let mut prompts: Vec<Prompt> = state
            .prompts
            .iter()
            .filter(|p| category.is_none_or(|c| p.category == c))
            .filter(|p| {
                needle.as_ref().is_none_or(|n| {
                    p.title.to_lowercase().contains(n) || p.content.to_lowercase().contains(n)
                })
            })
            .cloned()
            .collect();
        prompts.sort_by_key(|p| (p.order, p.create_time));
        prompts
    }

    /// [`PromptStore::filter_prompts`] scoped to the active category.
    pub async fn visible_prompts(&self, query: Option<&str>) -> Vec<Prompt> {
        let active = self.state.read().await.active_category.clone();
        self.filter_prompts(active.as_deref(), query).await
    }

    pub async fn has_category_content(&self, id: &str) -> bool {
        self.state
            .read()
            .await
            .prompts
            .iter()
            .any(|p| p.category == id)
    }

    pub async fn has_directory_content(&self, id: &str) -> bool {
        self.state
            .read()
            .await
            .prompts
            .iter()
            .any(|p| p.directory.as_deref() == Some(id))
    }

    // --- Prompts ---

    pub async fn add_prompt(&self, input: NewPrompt) -> StoreResult<Prompt> {
        let title = input.title.trim().to_string();
        if title.is_empty() {
            return self.reject(StoreError::Validation("title must not be empty".into()));
        }
        if input.content.trim().is_empty() {
            return self.reject(StoreError::Validation("content must not be empty".into()));
        }

        let _guard = self.mutation.lock().await;
        let order = {
            let state = self.state.read().await;
            if !state.categories.iter().any(|c| c.id == input.category) {
                drop(state);
                return self.reject(StoreError::Validation(format!(
                    "unknown category {}",
                    input.category
                )));
            }
            next_order(state.prompts.iter().filter(|p| p.category == input.category))
        };

        let now = now_millis();
        let prompt = Prompt {
            id: Uuid::new_v4().to_string(),
            title,
            content: input.content,
            category: input.category,
            directory: input.directory,
            author: input.author,
            author_url: input.author_url,
            is_system: false,
            order,
            create_time: now,
            update_time: now,
        };

        if let Err(e) = self.repo.add_prompt(prompt.clone()).await {
            return self.reject(e.into());
        }
        self.state.write().await.prompts.push(prompt.clone());

        tracing::info!(prompt_id = %prompt.id, category = %prompt.category, "added prompt");
        self.changed(ResourceType::Prompt, ChangeType::Created, &prompt.id);
        Ok(prompt)
    }

    /// Returns `Ok(None)` when `id` is unknown or names a system prompt.
    pub async fn update_prompt(&self, id: &str, patch: PromptPatch) -> StoreResult<Option<Prompt>> {
        if patch.title.as_deref().is_some_and(|t| t.trim().is_empty()) {
            return self.reject(StoreError::Validation("title must not be empty".into()));
        }
        if patch.content.as_deref().is_some_and(|c| c.trim().is_empty()) {
            return self.reject(StoreError::Validation("content must not be empty".into()));
        }

        let _guard = self.mutation.lock().await;
        {
            let state = self.state.read().await;
            match state.prompts.iter().find(|p| p.id == id) {
                None => return Ok(None),
                Some(p) if p.is_system => {
                    tracing::debug!(prompt_id = %id, "system prompts are read-only");
                    return Ok(None);
                }
                Some(_) => {}
            }
            if let Some(category) = &patch.category {
                if !state.categories.iter().any(|c| &c.id == category) {
                    drop(state);
                    return self.reject(StoreError::Validation(format!(
                        "unknown category {category}"
                    )));
                }
            }
        }

        let updated = match self.repo.update_prompt(id, patch).await {
            Ok(Some(updated)) => updated,
            Ok(None) => {
                tracing::warn!(prompt_id = %id, "prompt missing from storage");
                return Ok(None);
            }
            Err(e) => return self.reject(e.into()),
        };
        self.replace_prompt(updated.clone()).await;

        self.changed(ResourceType::Prompt, ChangeType::Updated, id);
        Ok(Some(updated))
    }

    async fn replace_prompt(&self, updated: Prompt) {
        let mut state = self.state.write().await;
        if let Some(slot) = state.prompts.iter_mut().find(|p| p.id == updated.id) {
            *slot = updated;
        }
    }

    /// Returns whether a prompt was removed. System prompts are never removed.
    pub async fn delete_prompt(&self, id: &str) -> StoreResult<bool> {
        let _guard = self.mutation.lock().await;
        {
            let state = self.state.read().await;
            match state.prompts.iter().find(|p| p.id == id) {
                None => return Ok(false),
                Some(p) if p.is_system => {
                    tracing::debug!(prompt_id = %id, "system prompts cannot be deleted");
                    return Ok(false);
                }
                Some(_) => {}
            }
        }

        if let Err(e) = self.repo.delete_prompt(id).await {
            return self.reject(e.into());
        }
        self.state
            .write()
            .await
            .prompts
            .retain(|p| p.is_system || p.id != id);

        self.changed(ResourceType::Prompt, ChangeType::Deleted, id);
        Ok(true)
    }

    /// Reorder within one category. Prompts of other categories keep their `order`.
    pub async fn reorder_prompt(
        &self,
        active_id: &str,
        over_id: &str,
        category: &str,
    ) -> StoreResult<bool> {
        let _guard = self.mutation.lock().await;
        let current = self.state.read().await.prompts.clone();
        let next = scoped_reindex(&current, |p| p.category == category, active_id, over_id);
        if next == current {
            return Ok(false);
        }

        if let Err(e) = self.repo.reset_prompts(next.clone()).await {
            return self.reject(e.into());
        }
        self.state.write().await.prompts = next;

        self.changed(ResourceType::Prompt, ChangeType::Reordered, active_id);
        Ok(true)
    }

    /// Move a user prompt to the end of another category.
    pub async fn move_prompt_to_category(
        &self,
        prompt_id: &str,
        category_id: &str,
    ) -> StoreResult<Option<Prompt>> {
        let _guard = self.mutation.lock().await;
        let order = {
            let state = self.state.read().await;
            match state.prompts.iter().find(|p| p.id == prompt_id) {
                None => return Ok(None),
                Some(p) if p.is_system => {
                    tracing::debug!(prompt_id = %prompt_id, "system prompts cannot be moved");
                    return Ok(None);
                }
                Some(_) => {}
            }
            if !state.categories.iter().any(|c| c.id == category_id) {
                drop(state);
                return self.reject(StoreError::Validation(format!(
                    "unknown category {category_id}"
                )));
            }
            next_order(
                state
                    .prompts
                    .iter()
                    .filter(|p| p.category == category_id && p.id != prompt_id),
            )
        };

        let patch = PromptPatch {
            category: Some(category_id.to_string()),
            order: Some(order),
            ..Default::default()
        };
        let moved = match self.repo.update_prompt(prompt_id, patch).await {
            Ok(Some(moved)) => moved,
            Ok(None) => {
                tracing::warn!(prompt_id = %prompt_id, "prompt missing from storage");
                return Ok(None);
            }
            Err(e) => return self.reject(e.into()),
        };
        self.replace_prompt(moved.clone()).await;

        tracing::info!(prompt_id = %prompt_id, category = %category_id, order, "moved prompt");
        self.changed(ResourceType::Prompt, ChangeType::Updated, prompt_id);
        Ok(Some(moved))
    }

    // --- Categories ---

    pub async fn set_active_category(&self, id: Option<String>) {
        let resource_id = id.clone().unwrap_or_default();
        self.state.write().await.active_category = id;
        self.changed(ResourceType::ActiveCategory, ChangeType::Updated, &resource_id);
    }

    pub async fn add_category(&self, input: NewCategory) -> StoreResult<Category> {
        let name = input.name.trim().to_string();
        if name.is_empty() {
            return self.reject(StoreError::Validation("category name must not be empty".into()));
        }

        let _guard = self.mutation.lock().await;
        let mut next = self.state.read().await.categories.clone();

        let id = match input.id.filter(|id| id.starts_with(CUSTOM_CATEGORY_PREFIX)) {
            Some(id) if next.iter().any(|c| c.id == id) => {
                return self.reject(StoreError::Validation(format!("category {id} already exists")));
            }
            Some(id) => id,
            None => unique_id(CUSTOM_CATEGORY_PREFIX, |candidate| {
                next.iter().any(|c| c.id == candidate)
            }),
        };

        let category = Category {
            id,
            name,
            kind: input.kind.unwrap_or_else(default_category_kind),
            order: next_order(&next),
            is_system: false,
        };
        next.push(category.clone());

        if let Err(e) = self.repo.save_categories(next.clone()).await {
            return self.reject(e.into());
        }
        self.state.write().await.categories = next;

        tracing::info!(category_id = %category.id, "added category");
        self.changed(ResourceType::Category, ChangeType::Created, &category.id);
        Ok(category)
    }

    /// System categories are rebuilt from the seed on every load, so they
    /// reject edits instead of silently losing them.
    pub async fn update_category(
        &self,
        id: &str,
        patch: CategoryPatch,
    ) -> StoreResult<Option<Category>> {
        if patch.name.as_deref().is_some_and(|n| n.trim().is_empty()) {
            return self.reject(StoreError::Validation("category name must not be empty".into()));
        }

        let _guard = self.mutation.lock().await;
        let mut next = self.state.read().await.categories.clone();
        let Some(index) = next.iter().position(|c| c.id == id) else {
            return Ok(None);
        };
        if next[index].is_system {
            return self.reject(StoreError::SystemCategory(id.to_string()));
        }
        patch.apply(&mut next[index]);
        let updated = next[index].clone();
        next.sort_by_key(|c| c.order);

        if let Err(e) = self.repo.save_categories(next.clone()).await {
            return self.reject(e.into());
        }
        self.state.write().await.categories = next;

        self.changed(ResourceType::Category, ChangeType::Updated, id);
        Ok(Some(updated))
    }

    /// Delete a user category that no prompt references.
    pub async fn delete_category(&self, id: &str) -> StoreResult<bool> {
        let _guard = self.mutation.lock().await;
        let (categories, prompts, active) = {
            let state = self.state.read().await;
            (
                state.categories.clone(),
                state.prompts.clone(),
                state.active_category.clone(),
            )
        };

        let Some(target) = categories.iter().find(|c| c.id == id) else {
            return Ok(false);
        };
        if target.is_system {
            return self.reject(StoreError::SystemCategory(id.to_string()));
        }
        if self.has_category_content(id).await {
            return self.reject(StoreError::HasContent(format!("category {id}")));
        }
        let Some(fallback) = resolve_fallback(&categories, self.fallback_category.as_deref(), id)
        else {
            return self.reject(StoreError::NoFallbackCategory);
        };

        // Finds nothing while the content guard above holds, so a successful
        // delete only rewrites the category list.
        let mut next_prompts = prompts;
        let mut reassigned = 0usize;
        let mut order = next_order(next_prompts.iter().filter(|p| p.category == fallback));
        for prompt in next_prompts.iter_mut().filter(|p| p.category == id) {
            prompt.category = fallback.clone();
            prompt.order = order;
            order += 1;
            reassigned += 1;
        }
        if reassigned > 0 {
            if let Err(e) = self.repo.reset_prompts(next_prompts.clone()).await {
                return self.reject(e.into());
            }
        }

        let next_categories: Vec<Category> =
            categories.into_iter().filter(|c| c.id != id).collect();
        if let Err(e) = self.repo.save_categories(next_categories.clone()).await {
            return self.reject(e.into());
        }

        {
            let mut state = self.state.write().await;
            state.categories = next_categories;
            state.prompts = next_prompts;
            if active.as_deref() == Some(id) {
                state.active_category = None;
            }
        }

        tracing::info!(category_id = %id, fallback = %fallback, reassigned, "deleted category");
        self.changed(ResourceType::Category, ChangeType::Deleted, id);
        Ok(true)
    }

    /// Move the category at `from` to `to`; every category's `order` becomes its index.
    pub async fn reorder_category(&self, from: usize, to: usize) -> StoreResult<bool> {
        let _guard = self.mutation.lock().await;
        let current = self.state.read().await.categories.clone();
        let Some(next) = reindex(&current, from, to) else {
            return Ok(false);
        };
        let moved_id = next[to].id.clone();

        if let Err(e) = self.repo.save_categories(next.clone()).await {
            return self.reject(e.into());
        }
        self.state.write().await.categories = next;

        self.changed(ResourceType::Category, ChangeType::Reordered, &moved_id);
        Ok(true)
    }

    // --- Directories ---

    pub async fn add_directory(&self, name: &str) -> StoreResult<Directory> {
        let name = name.trim();
        if name.is_empty() {
            return self.reject(StoreError::Validation("directory name must not be empty".into()));
        }

        let _guard = self.mutation.lock().await;
        let mut next = self.state.read().await.directories.clone();
        let directory = Directory {
            id: unique_id(DIRECTORY_PREFIX, |candidate| next.iter().any(|d| d.id == candidate)),
            name: name.to_string(),
            icon: None,
            order: next_order(&next),
            is_system: false,
        };
        next.push(directory.clone());

        if let Err(e) = self.repo.save_directories(next.clone()).await {
            return self.reject(e.into());
        }
        self.state.write().await.directories = next;

        self.changed(ResourceType::Directory, ChangeType::Created, &directory.id);
        Ok(directory)
    }

    pub async fn rename_directory(&self, id: &str, name: &str) -> StoreResult<Option<Directory>> {
        let name = name.trim();
        if name.is_empty() {
            return self.reject(StoreError::Validation("directory name must not be empty".into()));
        }

        let _guard = self.mutation.lock().await;
        let mut next = self.state.read().await.directories.clone();
        let Some(directory) = next.iter_mut().find(|d| d.id == id) else {
            return Ok(None);
        };
        if directory.is_system {
            return self.reject(StoreError::SystemDirectory(id.to_string()));
        }
        directory.name = name.to_string();
        let renamed = directory.clone();

        if let Err(e) = self.repo.save_directories(next.clone()).await {
            return self.reject(e.into());
        }
        self.state.write().await.directories = next;

        self.changed(ResourceType::Directory, ChangeType::Updated, id);
        Ok(Some(renamed))
    }

    pub async fn delete_directory(&self, id: &str) -> StoreResult<bool> {
        let _guard = self.mutation.lock().await;
        let directories = self.state.read().await.directories.clone();

        let Some(target) = directories.iter().find(|d| d.id == id) else {
            return Ok(false);
        };
        if target.is_system {
            return self.reject(StoreError::SystemDirectory(id.to_string()));
        }
        if self.has_directory_content(id).await {
            return self.reject(StoreError::HasContent(format!("directory {id}")));
        }

        let next: Vec<Directory> = directories.into_iter().filter(|d| d.id != id).collect();
        if let Err(e) = self.repo.save_directories(next.clone()).await {
            return self.reject(e.into());
        }
        self.state.write().await.directories = next;

        self.changed(ResourceType::Directory, ChangeType::Deleted, id);
        Ok(true)
    }
}

/// Category receiving prompts from a deleted one: the configured fallback when
/// it exists, otherwise the first system category. Never `deleting` itself.
pub fn resolve_fallback(
    categories: &[Category],
    configured: Option<&str>,
    deleting: &str,
) -> Option<String> {
    if let Some(configured) = configured {
        if configured != deleting && categories.iter().any(|c| c.id == configured) {
            return Some(configured.to_string());
        }
        tracing::warn!(fallback = configured, "configured fallback category unavailable");
    }
    categories
        .iter()
        .find(|c| c.is_system && c.id != deleting)
        .map(|c| c.id.clone())
}

/// `<prefix><millis>`, bumped until `taken` rejects it.
fn unique_id(prefix: &str, taken: impl Fn(&str) -> bool) -> String {
    let mut stamp = now_millis();
    loop {
        let candidate = format!("{prefix}{stamp}");
        if !taken(&candidate) {
            return candidate;
        }
        stamp += 1;
    }
}
