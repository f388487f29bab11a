use serde_json::{Map, Value};
use std::collections::{BTreeMap, BTreeSet};

use super::request::{Request, Scores};
use crate::error::{Error, Result};

/// Per-request outcome of an engine call.
///
/// The outer `Result` of an engine call fails the whole batch; an inner `Err`
/// fails only the request at that position.
pub type BatchOutput = Vec<Result<Scores>>;

/// A batch argument that is either broadcast to every query or given per query.
#[derive(Debug, Clone, PartialEq)]
pub enum BatchArg<T> {
    Shared(T),
    PerQuery(Vec<T>),
}

impl<T> BatchArg<T> {
    /// Check a per-query list against the number of queries.
    pub fn validate(&self, field: &str, expected: usize) -> Result<()> {
        match self {
            BatchArg::PerQuery(values) if values.len() != expected => {
                Err(Error::length_mismatch(field, expected, values.len()))
            }
            _ => Ok(()),
        }
    }

    /// Value for the query at `index`.
    pub fn get(&self, index: usize) -> Option<&T> {
        match self {
            BatchArg::Shared(value) => Some(value),
            BatchArg::PerQuery(values) => values.get(index),
        }
    }

    pub fn map<U>(self, mut f: impl FnMut(T) -> U) -> BatchArg<U> {
        match self {
            BatchArg::Shared(value) => BatchArg::Shared(f(value)),
            BatchArg::PerQuery(values) => BatchArg::PerQuery(values.into_iter().map(f).collect()),
        }
    }
}

/// Queries handed to `Engine::search_batch`, with their parallel arguments.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SearchBatch {
    pub queries: Vec<String>,
    /// `None` entries leave that query's limit to the engine.
    pub limits: Option<BatchArg<Option<usize>>>,
    pub subsets: Option<BatchArg<String>>,
    pub kwargs: BTreeMap<String, BatchArg<Value>>,
}

impl SearchBatch {
    pub fn new(queries: Vec<String>) -> Self {
        Self {
            queries,
            ..Default::default()
        }
    }

    pub fn with_limits(mut self, limits: BatchArg<usize>) -> Self {
        self.limits = Some(limits.map(Some));
        self
    }

    pub fn with_subsets(mut self, subsets: BatchArg<String>) -> Self {
        self.subsets = Some(subsets);
        self
    }

    pub fn with_kwarg(mut self, key: impl Into<String>, value: BatchArg<Value>) -> Self {
        self.kwargs.insert(key.into(), value);
        self
    }

    pub fn len(&self) -> usize {
        self.queries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.queries.is_empty()
    }

    /// Reject parallel lists whose length differs from the query list.
    pub fn validate(&self) -> Result<()> {
        let n = self.queries.len();
        if let Some(limits) = &self.limits {
            limits.validate("limit", n)?;
        }
        if let Some(subsets) = &self.subsets {
            subsets.validate("subset", n)?;
        }
        for (key, arg) in &self.kwargs {
            arg.validate(key, n)?;
        }
        Ok(())
    }

    pub fn limit(&self, index: usize) -> Option<usize> {
        self.limits.as_ref().and_then(|l| l.get(index)).copied().flatten()
    }

    pub fn subset(&self, index: usize) -> Option<&str> {
        self.subsets
            .as_ref()
            .and_then(|s| s.get(index))
            .map(String::as_str)
    }

    /// Keyword arguments for the query at `index`; nulls are skipped.
    pub fn kwargs_at(&self, index: usize) -> Map<String, Value> {
        self.kwargs
            .iter()
            .filter_map(|(k, arg)| match arg.get(index) {
                Some(Value::Null) | None => None,
                Some(v) => Some((k.clone(), v.clone())),
            })
            .collect()
    }

    /// Assemble a batch from independent submissions.
    ///
    /// Limits and subsets become per-query lists when at least one request
    /// carries them. A request without a limit keeps `None`, so its result does
    /// not depend on what it was batched with. Auxiliary fields are unioned,
    /// with nulls where a request lacks a key.
    pub fn from_requests(requests: &[Request]) -> Self {
        let mut batch = Self::new(requests.iter().map(|r| r.query.clone()).collect());

        if requests.iter().any(|r| r.limit.is_some()) {
            batch.limits = Some(BatchArg::PerQuery(
                requests.iter().map(|r| r.limit).collect(),
            ));
        }

        if requests.iter().any(|r| r.subset.is_some()) {
            batch.subsets = Some(BatchArg::PerQuery(
                requests
                    .iter()
                    .map(|r| r.subset.clone().unwrap_or_else(|| super::NO_SUBSET.to_string()))
                    .collect(),
            ));
        }

        let keys: BTreeSet<&String> = requests.iter().flat_map(|r| r.extra.keys()).collect();
        for key in keys {
            let values = requests
                .iter()
                .map(|r| r.extra.get(key).cloned().unwrap_or(Value::Null))
                .collect();
            batch.kwargs.insert(key.clone(), BatchArg::PerQuery(values));
        }

        batch
    }
}

/// Query/candidate pairs handed to `Engine::score_batch`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ScoreBatch {
    pub queries: Vec<String>,
    pub candidates: Vec<Vec<String>>,
}

impl ScoreBatch {
    pub fn len(&self) -> usize {
        self.queries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.queries.is_empty()
    }

    pub fn validate(&self) -> Result<()> {
        if self.candidates.len() != self.queries.len() {
            return Err(Error::length_mismatch(
                "candidates",
                self.queries.len(),
                self.candidates.len(),
            ));
        }
        Ok(())
    }

    /// Assemble a batch from submissions; requests without candidates score nothing.
    pub fn from_requests(requests: &[Request]) -> Self {
        Self {
            queries: requests.iter().map(|r| r.query.clone()).collect(),
            candidates: requests
                .iter()
                .map(|r| r.candidates.clone().unwrap_or_default())
                .collect(),
        }
    }
}
