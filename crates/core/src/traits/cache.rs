//! Result cache trait.

use async_trait::async_trait;

use crate::error::Result;
use crate::types::Scores;

/// Key/value cache for engine results.
#[async_trait]
pub trait ResultCache: Send + Sync {
    /// `false` for the bypass cache; processors then skip key computation.
    fn is_enabled(&self) -> bool {
        true
    }

    /// Fetch a live entry. Expired entries are absent.
    async fn get(&self, key: &str) -> Result<Option<Scores>>;

    /// Insert or refresh an entry.
    async fn put(&self, key: &str, scores: &Scores) -> Result<()>;
}
