//! Engine capability trait.

use async_trait::async_trait;

use crate::error::{Error, Result};
use crate::types::{BatchOutput, ScoreBatch, SearchBatch};

/// A retrieval or ranking backend.
///
/// Engines are stateless from the broker's point of view: they own whatever
/// resources they need and expose only the batch contract. Output positions
/// must line up with input positions.
#[async_trait]
pub trait Engine: Send + Sync {
    /// Name of the service this engine was built for.
    fn name(&self) -> &str;

    /// Rank documents for every query in the batch.
    async fn search_batch(&self, batch: SearchBatch) -> Result<BatchOutput>;

    /// Whether `score_batch` is implemented.
    fn can_score(&self) -> bool {
        false
    }

    /// Score each query against its own candidate list.
    async fn score_batch(&self, _batch: ScoreBatch) -> Result<BatchOutput> {
        Err(Error::unsupported(format!(
            "engine `{}` does not support pairwise scoring",
            self.name()
        )))
    }
}
