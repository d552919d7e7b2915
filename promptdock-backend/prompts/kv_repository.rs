use std::collections::BTreeMap;
use std::sync::Arc;

use anyhow::{Context, Result, bail};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;

use super::reorder::Ordered;
use super::repository::PromptRepository;
use super::seed::SystemSeed;
use super::{Category, Directory, Prompt, PromptPatch, now_millis};
use crate::kv::KeyValueStore;

/// Key of the single document holding all user data.
pub const STORAGE_KEY: &str = "prompts-storage";
pub const STORAGE_VERSION: u32 = 1;

#[derive(Debug, Default, Serialize, Deserialize)]
struct PersistedDocument {
    #[serde(default)]
    state: PersistedState,
    #[serde(default)]
    version: u32,
}

#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PersistedState {
    #[serde(default)]
    prompts: Vec<Prompt>,
    #[serde(default)]
    categories: Vec<Category>,
    #[serde(default)]
    directories: Vec<Directory>,
    // Positions of system records after a reorder. The records themselves are never stored.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    system_prompt_order: BTreeMap<String, i64>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    system_category_order: BTreeMap<String, i64>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    system_directory_order: BTreeMap<String, i64>,
}

/// [`PromptRepository`] over a [`KeyValueStore`], merging the bundled
/// [`SystemSeed`] with user data stored under [`STORAGE_KEY`].
///
/// Every write is a read-modify-write of the whole document performed while
/// holding `write_lock`, so concurrent mutations cannot overwrite each other
/// with stale snapshots.
pub struct KvPromptRepository {
    kv: Arc<dyn KeyValueStore>,
    seed: Arc<SystemSeed>,
    write_lock: Mutex<()>,
}

impl KvPromptRepository {
    pub fn new(kv: Arc<dyn KeyValueStore>, seed: Arc<SystemSeed>) -> Self {
        Self {
            kv,
            seed,
            write_lock: Mutex::new(()),
        }
    }

    /// Load the stored document, falling back to an empty one on any failure.
    async fn read_document(&self) -> PersistedDocument {
        match self.kv.get(STORAGE_KEY).await {
            Ok(Some(value)) => match decode_document(value) {
                Ok(doc) => doc,
                Err(e) => {
                    tracing::warn!(key = STORAGE_KEY, error = %e, "malformed storage document, using defaults");
                    PersistedDocument::default()
                }
            },
            Ok(None) => PersistedDocument::default(),
            Err(e) => {
                tracing::warn!(key = STORAGE_KEY, error = %e, "failed to read storage, using defaults");
                PersistedDocument::default()
            }
        }
    }

    /// Load the stored document as the base of a read-modify-write.
    ///
    /// Unlike [`Self::read_document`] this never silently starts from an empty
    /// document: a read failure aborts the write, and a document that parses as
    /// JSON but not as prompt storage is first copied under a
    /// `prompts-storage-corrupt-<millis>` key.
    async fn read_document_for_write(&self) -> Result<PersistedDocument> {
        let Some(value) = self
            .kv
            .get(STORAGE_KEY)
            .await
            .with_context(|| format!("refusing to overwrite unreadable {STORAGE_KEY}"))?
        else {
            return Ok(PersistedDocument::default());
        };

        match decode_document(value.clone()) {
            Ok(doc) => Ok(doc),
            Err(e) => {
                let backup_key = format!("{STORAGE_KEY}-corrupt-{}", now_millis());
                self.kv
                    .set(&backup_key, value)
                    .await
                    .with_context(|| format!("failed to back up malformed {STORAGE_KEY}"))?;
                tracing::warn!(
                    key = STORAGE_KEY,
                    backup = %backup_key,
                    error = %e,
                    "malformed storage document backed up before overwrite"
                );
                Ok(PersistedDocument::default())
            }
        }
    }

    async fn write_document(&self, mut doc: PersistedDocument) -> Result<()> {
        doc.version = STORAGE_VERSION;
        strip_system(&mut doc.state);
        let value = serde_json::to_value(&doc).context("failed to serialize storage document")?;
        self.kv
            .set(STORAGE_KEY, value)
            .await
            .with_context(|| format!("failed to write {STORAGE_KEY}"))
    }
}

fn decode_document(value: serde_json::Value) -> Result<PersistedDocument> {
    let mut doc: PersistedDocument =
        serde_json::from_value(value).context("malformed storage document")?;
    let stale = doc.state.prompts.iter().filter(|p| p.is_system).count();
    if stale > 0 {
        tracing::debug!(count = stale, "discarding stored system prompts");
    }
    strip_system(&mut doc.state);
    Ok(doc)
}

fn strip_system(state: &mut PersistedState) {
    state.prompts.retain(|p| !p.is_system);
    state.categories.retain(|c| !c.is_system);
    state.directories.retain(|d| !d.is_system);
}

fn apply_order_overlay<T: Ordered>(items: &mut [T], overlay: &BTreeMap<String, i64>) {
    for item in items.iter_mut() {
        if let Some(order) = overlay.get(item.id()) {
            item.set_order(*order);
        }
    }
}

/// Split records into the user subset and an id -> order map of the system ones.
fn split_system<T, F>(items: Vec<T>, is_system: F) -> (Vec<T>, BTreeMap<String, i64>)
where
    T: Ordered,
    F: Fn(&T) -> bool,
{
    let mut overlay = BTreeMap::new();
    let mut user = Vec::with_capacity(items.len());
    for item in items {
        if is_system(&item) {
            overlay.insert(item.id().to_string(), item.order());
        } else {
            user.push(item);
        }
    }
    (user, overlay)
}

#[async_trait]
impl PromptRepository for KvPromptRepository {
    async fn get_prompts(&self) -> Vec<Prompt> {
        let doc = self.read_document().await;
        let mut prompts = self.seed.prompts();
        apply_order_overlay(&mut prompts, &doc.state.system_prompt_order);
        prompts.extend(doc.state.prompts);
        prompts
    }

    async fn get_categories(&self) -> Vec<Category> {
        let doc = self.read_document().await;
        let mut categories = self.seed.categories();
        apply_order_overlay(&mut categories, &doc.state.system_category_order);
        categories.extend(doc.state.categories);
        categories.sort_by_key(|c| c.order);
        categories
    }

    async fn get_directories(&self) -> Vec<Directory> {
        let doc = self.read_document().await;
        let mut directories = self.seed.directories();
        apply_order_overlay(&mut directories, &doc.state.system_directory_order);
        directories.extend(doc.state.directories);
        directories.sort_by_key(|d| d.order);
        directories
    }

    async fn add_prompt(&self, prompt: Prompt) -> Result<()> {
        if prompt.is_system {
            bail!("system prompt {} cannot be stored", prompt.id);
        }

        let _guard = self.write_lock.lock().await;
        let mut doc = self.read_document_for_write().await?;
        let id = prompt.id.clone();
        doc.state.prompts.push(prompt);
        self.write_document(doc).await?;
        tracing::info!(prompt_id = %id, "stored prompt");
        Ok(())
    }

    async fn update_prompt(&self, id: &str, patch: PromptPatch) -> Result<Option<Prompt>> {
        let _guard = self.write_lock.lock().await;
        let mut doc = self.read_document_for_write().await?;

        let Some(prompt) = doc.state.prompts.iter_mut().find(|p| p.id == id) else {
            if self.seed.is_system_prompt(id) {
                tracing::debug!(prompt_id = %id, "ignoring update of system prompt");
            }
            return Ok(None);
        };
        patch.apply(prompt, now_millis());
        let updated = prompt.clone();

        self.write_document(doc).await?;
        Ok(Some(updated))
    }

    async fn delete_prompt(&self, id: &str) -> Result<bool> {
        if self.seed.is_system_prompt(id) {
            tracing::debug!(prompt_id = %id, "ignoring delete of system prompt");
            return Ok(false);
        }

        let _guard = self.write_lock.lock().await;
        let mut doc = self.read_document_for_write().await?;
        let before = doc.state.prompts.len();
        doc.state.prompts.retain(|p| p.id != id);
        if doc.state.prompts.len() == before {
            return Ok(false);
        }

        self.write_document(doc).await?;
        tracing::info!(prompt_id = %id, "deleted prompt");
        Ok(true)
    }

    async fn reset_prompts(&self, prompts: Vec<Prompt>) -> Result<()> {
        let _guard = self.write_lock.lock().await;
        let mut doc = self.read_document_for_write().await?;
        let (user, overlay) = split_system(prompts, |p| p.is_system);
        doc.state.prompts = user;
        doc.state.system_prompt_order = overlay;
        self.write_document(doc).await
    }

    async fn save_categories(&self, categories: Vec<Category>) -> Result<()> {
        let _guard = self.write_lock.lock().await;
        let mut doc = self.read_document_for_write().await?;
        let (user, overlay) = split_system(categories, |c| c.is_system);
        doc.state.categories = user;
        doc.state.system_category_order = overlay;
        self.write_document(doc).await
    }

    async fn save_directories(&self, directories: Vec<Directory>) -> Result<()> {
        let _guard = self.write_lock.lock().await;
        let mut doc = self.read_document_for_write().await?;
        let (user, overlay) = split_system(directories, |d| d.is_system);
        doc.state.directories = user;
        doc.state.system_directory_order = overlay;
        self.write_document(doc).await
    }
}
