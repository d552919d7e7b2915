use std::path::{Path, PathBuf};
use std::sync::Arc;

use notify_debouncer_mini::{DebouncedEventKind, new_debouncer};

use crate::prompts::kv_repository::STORAGE_KEY;
use crate::store::PromptStore;

/// Watches the data directory for edits to the prompt document made outside
/// this process and reloads the store when its contents differ.
pub struct StorageWatcher {
    /// Dropping the debouncer stops the watcher.
    _debouncer: notify_debouncer_mini::Debouncer<notify::RecommendedWatcher>,
}

impl StorageWatcher {
    pub fn start(data_dir: PathBuf, store: Arc<PromptStore>) -> anyhow::Result<Self> {
        std::fs::create_dir_all(&data_dir)?;

        let rt = tokio::runtime::Handle::current();

        let mut debouncer = new_debouncer(
            std::time::Duration::from_millis(500),
            move |events: Result<Vec<notify_debouncer_mini::DebouncedEvent>, notify::Error>| {
                let events = match events {
                    Ok(e) => e,
                    Err(e) => {
                        tracing::warn!(error = %e, "fs watcher error");
                        return;
                    }
                };

                let touched = events
                    .iter()
                    .any(|event| event.kind == DebouncedEventKind::Any && is_storage_file(&event.path));
                if !touched {
                    return;
                }

                let store = store.clone();
                rt.spawn(async move {
                    // Our own writes land here too and compare equal.
                    if store.reload_if_changed().await {
                        tracing::info!("external storage change detected");
                    }
                });
            },
        )?;

        use notify::RecursiveMode;
        debouncer
            .watcher()
            .watch(&data_dir, RecursiveMode::NonRecursive)?;

        tracing::info!(dir = %data_dir.display(), "storage watcher started");

        Ok(Self {
            _debouncer: debouncer,
        })
    }
}

fn is_storage_file(path: &Path) -> bool {
    path.file_name()
        .and_then(|f| f.to_str())
        .is_some_and(|name| name == format!("{STORAGE_KEY}.json"))
}
