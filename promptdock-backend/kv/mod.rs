pub mod file_store;

use anyhow::Result;
use async_trait::async_trait;
use serde_json::Value;

/// Opaque string-keyed JSON document store.
///
/// `get` returns `Ok(None)` for a key that was never written and `Err` when the
/// stored document exists but cannot be read or parsed. Callers decide whether
/// that is fatal.
#[async_trait]
pub trait KeyValueStore: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<Value>>;
    async fn set(&self, key: &str, value: Value) -> Result<()>;
}

#[cfg(test)]
pub(crate) mod testing {
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

    use anyhow::{Result, bail};
    use async_trait::async_trait;
    use serde_json::Value;
    use tokio::sync::RwLock;

    use super::KeyValueStore;

    /// In-memory store whose writes can be made to fail, with a write counter.
    #[derive(Default)]
    pub struct MemoryKeyValueStore {
        values: RwLock<HashMap<String, Value>>,
        fail_writes: AtomicBool,
        writes: AtomicUsize,
    }

    impl MemoryKeyValueStore {
        pub fn set_fail_writes(&self, fail: bool) {
            self.fail_writes.store(fail, Ordering::SeqCst);
        }

        pub fn writes(&self) -> usize {
            self.writes.load(Ordering::SeqCst)
        }

        pub async fn raw(&self, key: &str) -> Option<Value> {
            self.values.read().await.get(key).cloned()
        }

        pub async fn keys_with_prefix(&self, prefix: &str) -> Vec<String> {
            let mut keys: Vec<String> = self
                .values
                .read()
                .await
                .keys()
                .filter(|k| k.starts_with(prefix))
                .cloned()
                .collect();
            keys.sort();
            keys
        }

        pub async fn put_raw(&self, key: &str, value: Value) {
            self.values.write().await.insert(key.to_string(), value);
        }
    }

    #[async_trait]
    impl KeyValueStore for MemoryKeyValueStore {
        async fn get(&self, key: &str) -> Result<Option<Value>> {
            Ok(self.values.read().await.get(key).cloned())
        }

        async fn set(&self, key: &str, value: Value) -> Result<()> {
            if self.fail_writes.load(Ordering::SeqCst) {
                bail!("disk full");
            }
            self.writes.fetch_add(1, Ordering::SeqCst);
            self.values.write().await.insert(key.to_string(), value);
            Ok(())
        }
    }
}
