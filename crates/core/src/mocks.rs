//! Mock implementations of core traits for testing.
//!
//! Used by unit and integration tests across the workspace.

use async_trait::async_trait;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use crate::{
    traits::Engine,
    types::{BatchOutput, Scores, ScoreBatch, SearchBatch},
    Error, Result,
};

// =============================================================================
// Mock Engine
// =============================================================================

/// Engine that scores `doc-<query>` and records every batch it sees.
pub struct MockEngine {
    name: String,
    batches: Mutex<Vec<Vec<String>>>,
    calls: AtomicUsize,
    delay: Option<Duration>,
    fail_with: Option<String>,
    reject_query: Option<String>,
    scoring: bool,
}

impl MockEngine {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            batches: Mutex::new(Vec::new()),
            calls: AtomicUsize::new(0),
            delay: None,
            fail_with: None,
            reject_query: None,
            scoring: false,
        }
    }

    /// Sleep before answering each batch.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Fail every batch with this message.
    pub fn failing(mut self, message: &str) -> Self {
        self.fail_with = Some(message.to_string());
        self
    }

    /// Fail only the requests whose query equals `query`.
    pub fn rejecting(mut self, query: &str) -> Self {
        self.reject_query = Some(query.to_string());
        self
    }

    /// Enable `score_batch`.
    pub fn with_scoring(mut self) -> Self {
        self.scoring = true;
        self
    }

    /// Number of engine calls so far.
    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Queries of every batch received, in dispatch order.
    pub fn batches(&self) -> Vec<Vec<String>> {
        self.batches.lock().unwrap().clone()
    }

    async fn record(&self, queries: &[String]) -> Result<()> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.batches.lock().unwrap().push(queries.to_vec());
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        match &self.fail_with {
            Some(message) => Err(Error::internal(message.clone())),
            None => Ok(()),
        }
    }

    fn is_rejected(&self, query: &str) -> bool {
        self.reject_query.as_deref() == Some(query)
    }
}

#[async_trait]
impl Engine for MockEngine {
    fn name(&self) -> &str {
        &self.name
    }

    async fn search_batch(&self, batch: SearchBatch) -> Result<BatchOutput> {
        batch.validate()?;
        self.record(&batch.queries).await?;

        Ok(batch
            .queries
            .iter()
            .enumerate()
            .map(|(i, query)| {
                if self.is_rejected(query) {
                    return Err(Error::invalid_request(format!("rejected `{}`", query)));
                }
                let score = batch.limit(i).map(|l| l as f64).unwrap_or(1.0);
                Ok(Scores::from([(format!("doc-{}", query), score)]))
            })
            .collect())
    }

    fn can_score(&self) -> bool {
        self.scoring
    }

    async fn score_batch(&self, batch: ScoreBatch) -> Result<BatchOutput> {
        if !self.scoring {
            return Err(Error::unsupported("mock engine built without scoring"));
        }
        batch.validate()?;
        self.record(&batch.queries).await?;

        Ok(batch
            .candidates
            .iter()
            .map(|candidates| {
                Ok(candidates
                    .iter()
                    .enumerate()
                    .map(|(rank, doc)| (doc.clone(), 1.0 / (rank as f64 + 1.0)))
                    .collect())
            })
            .collect())
    }
}
