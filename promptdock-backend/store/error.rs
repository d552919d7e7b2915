/// Failures surfaced by [`PromptStore`](super::PromptStore) actions.
///
/// Unknown ids are not errors: actions report them as `Ok(None)` / `Ok(false)`.
#[derive(thiserror::Error, Debug)]
pub enum StoreError {
    #[error("invalid input: {0}")]
    Validation(String),

    #[error("system category {0} cannot be changed")]
    SystemCategory(String),

    #[error("system directory {0} cannot be changed")]
    SystemDirectory(String),

    #[error("{0} still contains prompts")]
    HasContent(String),

    #[error("no fallback category available")]
    NoFallbackCategory,

    #[error("failed to save changes: {0:#}")]
    Storage(#[from] anyhow::Error),
}

impl StoreError {
    /// Rejected before touching storage.
    pub fn is_rejection(&self) -> bool {
        !matches!(self, StoreError::Storage(_) | StoreError::NoFallbackCategory)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn storage_error_includes_context_chain() {
        let err: StoreError = anyhow::anyhow!("disk full")
            .context("failed to write prompts-storage")
            .into();
        assert_eq!(
            err.to_string(),
            "failed to save changes: failed to write prompts-storage: disk full"
        );
        assert!(!err.is_rejection());
    }

    #[test]
    fn guard_errors_display() {
        assert_eq!(
            StoreError::SystemCategory("debug".into()).to_string(),
            "system category debug cannot be changed"
        );
        assert_eq!(
            StoreError::HasContent("category custom-1".into()).to_string(),
            "category custom-1 still contains prompts"
        );
        assert!(StoreError::Validation("title is empty".into()).is_rejection());
    }

    #[test]
    fn error_is_send_and_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<StoreError>();
    }
}
