//! Micro-batching processor.
//!
//! Submissions go through the cache first; misses are queued on a bounded
//! channel and a background worker groups them into batches that close when
//! `batch_size` requests have joined or `max_wait_time` has passed since the
//! first one did. Closed batches are dispatched on their own task so the
//! worker can keep gathering while the engine runs.

use async_trait::async_trait;
use std::sync::{Arc, Mutex};
use tokio::sync::{mpsc, oneshot};
use tokio::task::{JoinHandle, JoinSet};
use tokio::time::Instant;

use routir_core::{
    config::BatchSettings,
    traits::{Engine, Processor, ResultCache},
    types::{Request, Response, Role, ScoreBatch, Scores, SearchBatch},
    Error, Result,
};

/// Queue slots per unit of batch size.
const INTAKE_SLOTS_PER_BATCH: usize = 16;

/// Which engine operation a processor drives.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProcessorKind {
    /// Ranked retrieval through `Engine::search_batch`.
    Query,
    /// Candidate scoring through `Engine::score_batch`.
    PairwiseScore,
}

impl ProcessorKind {
    /// Resolve a configuration tag. Unknown tags are configuration errors.
    pub fn from_tag(tag: &str) -> Result<Self> {
        match tag {
            "QueryProcessor" | "AsyncQueryProcessor" => Ok(Self::Query),
            "PairwiseScoreProcessor" | "BatchPairwiseScoreProcessor" => Ok(Self::PairwiseScore),
            other => Err(Error::config(format!("unknown processor type `{}`", other))),
        }
    }

    pub fn tag(&self) -> &'static str {
        match self {
            Self::Query => "QueryProcessor",
            Self::PairwiseScore => "PairwiseScoreProcessor",
        }
    }

    /// Role this kind of processor is registered under.
    pub fn role(&self) -> Role {
        match self {
            Self::Query => Role::Search,
            Self::PairwiseScore => Role::Score,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LifecycleState {
    Stopped,
    Starting,
    Running,
    Stopping,
}

struct Lifecycle {
    state: LifecycleState,
    intake: Option<mpsc::Sender<PendingRequest>>,
    worker: Option<JoinHandle<()>>,
}

/// A cache miss waiting for its batch.
struct PendingRequest {
    request: Request,
    cache_key: Option<String>,
    reply: oneshot::Sender<Result<Response>>,
}

/// State shared between the processor handle and its worker tasks.
struct Shared {
    name: String,
    kind: ProcessorKind,
    engine: Arc<dyn Engine>,
    cache: Arc<dyn ResultCache>,
}

/// Processor that wraps one engine behind a batching queue and a cache.
pub struct BatchProcessor {
    shared: Arc<Shared>,
    settings: BatchSettings,
    key_fields: Vec<String>,
    lifecycle: Mutex<Lifecycle>,
}

impl BatchProcessor {
    /// Create a stopped processor with caching disabled.
    pub fn new(kind: ProcessorKind, engine: Arc<dyn Engine>, settings: BatchSettings) -> Self {
        Self {
            shared: Arc::new(Shared {
                name: engine.name().to_string(),
                kind,
                engine,
                cache: Arc::new(NoCache),
            }),
            settings,
            key_fields: Vec::new(),
            lifecycle: Mutex::new(Lifecycle {
                state: LifecycleState::Stopped,
                intake: None,
                worker: None,
            }),
        }
    }

    pub fn query(engine: Arc<dyn Engine>, settings: BatchSettings) -> Self {
        Self::new(ProcessorKind::Query, engine, settings)
    }

    pub fn pairwise_score(engine: Arc<dyn Engine>, settings: BatchSettings) -> Self {
        Self::new(ProcessorKind::PairwiseScore, engine, settings)
    }

    /// Attach a cache; keys are built from `key_fields` in order.
    pub fn with_cache(mut self, cache: Arc<dyn ResultCache>, key_fields: Vec<String>) -> Self {
        let shared = Shared {
            name: self.shared.name.clone(),
            kind: self.shared.kind,
            engine: self.shared.engine.clone(),
            cache,
        };
        self.shared = Arc::new(shared);
        self.key_fields = key_fields;
        self
    }

    pub fn kind(&self) -> ProcessorKind {
        self.shared.kind
    }

    pub fn settings(&self) -> BatchSettings {
        self.settings
    }

    fn intake(&self) -> Result<mpsc::Sender<PendingRequest>> {
        let lifecycle = self.lifecycle.lock().unwrap();
        match (&lifecycle.state, &lifecycle.intake) {
            (LifecycleState::Running, Some(intake)) => Ok(intake.clone()),
            _ => Err(Error::ProcessorNotRunning(self.shared.name.clone())),
        }
    }

    fn cache_key(&self, request: &Request) -> Option<String> {
        self.shared
            .cache
            .is_enabled()
            .then(|| request.cache_key(&self.key_fields))
    }
}

#[async_trait]
impl Processor for BatchProcessor {
    fn name(&self) -> &str {
        &self.shared.name
    }

    fn is_running(&self) -> bool {
        self.lifecycle.lock().unwrap().state == LifecycleState::Running
    }

    async fn start(&self) -> Result<()> {
        let mut lifecycle = self.lifecycle.lock().unwrap();
        if lifecycle.state != LifecycleState::Stopped {
            return Err(Error::ProcessorAlreadyRunning(self.shared.name.clone()));
        }
        lifecycle.state = LifecycleState::Starting;

        let capacity = self
            .settings
            .batch_size
            .saturating_mul(INTAKE_SLOTS_PER_BATCH)
            .max(1);
        let (intake, queue) = mpsc::channel(capacity);
        let worker = tokio::spawn(run_worker(self.shared.clone(), self.settings, queue));

        lifecycle.intake = Some(intake);
        lifecycle.worker = Some(worker);
        lifecycle.state = LifecycleState::Running;

        tracing::info!(
            service = %self.shared.name,
            processor = self.shared.kind.tag(),
            batch_size = self.settings.batch_size,
            max_wait_ms = self.settings.max_wait_time.as_millis() as u64,
            "Processor started"
        );
        Ok(())
    }

    async fn stop(&self) -> Result<()> {
        let worker = {
            let mut lifecycle = self.lifecycle.lock().unwrap();
            if lifecycle.state != LifecycleState::Running {
                return Err(Error::ProcessorNotRunning(self.shared.name.clone()));
            }
            lifecycle.state = LifecycleState::Stopping;
            // Dropping the sender lets the worker drain and exit.
            lifecycle.intake = None;
            lifecycle.worker.take()
        };

        if let Some(worker) = worker {
            if let Err(e) = worker.await {
                tracing::error!(service = %self.shared.name, error = %e, "Batch worker panicked");
            }
        }

        self.lifecycle.lock().unwrap().state = LifecycleState::Stopped;
        tracing::info!(service = %self.shared.name, "Processor stopped");
        Ok(())
    }

    async fn submit(&self, request: Request) -> Result<Response> {
        if self.shared.kind == ProcessorKind::PairwiseScore && request.candidates.is_none() {
            return Err(Error::invalid_request("pairwise scoring requires `candidates`"));
        }

        let intake = self.intake()?;
        let cache_key = self.cache_key(&request);

        if let Some(key) = &cache_key {
            match self.shared.cache.get(key).await {
                Ok(Some(scores)) => {
                    metrics::counter!(
                        "routir_cache_lookups_total",
                        "service" => self.shared.name.clone(),
                        "outcome" => "hit"
                    )
                    .increment(1);
                    tracing::debug!(service = %self.shared.name, "Cache hit");
                    return Ok(Response {
                        query: request.query,
                        service: self.shared.name.clone(),
                        scores,
                        cached: true,
                    });
                }
                Ok(None) => {
                    metrics::counter!(
                        "routir_cache_lookups_total",
                        "service" => self.shared.name.clone(),
                        "outcome" => "miss"
                    )
                    .increment(1);
                }
                Err(e) => {
                    tracing::warn!(service = %self.shared.name, error = %e, "Cache lookup failed");
                }
            }
        }

        let (reply, result) = oneshot::channel();
        intake
            .send(PendingRequest {
                request,
                cache_key,
                reply,
            })
            .await
            .map_err(|_| Error::ProcessorNotRunning(self.shared.name.clone()))?;
        drop(intake);

        result
            .await
            .map_err(|_| Error::internal("batch worker dropped the request"))?
    }
}

/// Gather submissions into batches until the intake closes.
async fn run_worker(
    shared: Arc<Shared>,
    settings: BatchSettings,
    mut queue: mpsc::Receiver<PendingRequest>,
) {
    let mut in_flight = JoinSet::new();

    loop {
        while let Some(done) = in_flight.try_join_next() {
            log_dispatch_panic(&shared.name, done);
        }

        let Some(first) = queue.recv().await else {
            break;
        };
        let deadline = Instant::now() + settings.max_wait_time;
        let mut batch = vec![first];
        let mut closed = false;

        while batch.len() < settings.batch_size {
            match tokio::time::timeout_at(deadline, queue.recv()).await {
                Ok(Some(pending)) => batch.push(pending),
                Ok(None) => {
                    closed = true;
                    break;
                }
                Err(_) => break,
            }
        }

        let shared = shared.clone();
        in_flight.spawn(async move { shared.dispatch(batch).await });

        if closed {
            break;
        }
    }

    while let Some(done) = in_flight.join_next().await {
        log_dispatch_panic(&shared.name, done);
    }
    tracing::debug!(service = %shared.name, "Batch worker drained");
}

fn log_dispatch_panic(service: &str, done: std::result::Result<(), tokio::task::JoinError>) {
    if let Err(e) = done {
        tracing::error!(service = %service, error = %e, "Batch dispatch panicked");
    }
}

impl Shared {
    /// Run one batch through the engine and answer every waiting caller.
    async fn dispatch(&self, batch: Vec<PendingRequest>) {
        let size = batch.len();
        metrics::counter!("routir_batches_total", "service" => self.name.clone()).increment(1);
        metrics::histogram!("routir_batch_size", "service" => self.name.clone()).record(size as f64);

        let mut requests = Vec::with_capacity(size);
        let mut waiters = Vec::with_capacity(size);
        for pending in batch {
            requests.push(pending.request);
            waiters.push((pending.cache_key, pending.reply));
        }

        let started = Instant::now();
        let outcome = match self.kind {
            ProcessorKind::Query => {
                self.engine
                    .search_batch(SearchBatch::from_requests(&requests))
                    .await
            }
            ProcessorKind::PairwiseScore => {
                self.engine
                    .score_batch(ScoreBatch::from_requests(&requests))
                    .await
            }
        };
        tracing::debug!(
            service = %self.name,
            batch_size = size,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Batch dispatched"
        );

        let results = match outcome {
            Ok(results) if results.len() == size => results,
            Ok(results) => {
                let message = format!(
                    "engine `{}` returned {} results for {} requests",
                    self.name,
                    results.len(),
                    size
                );
                return self.fail_all(waiters, Error::batch_execution(message));
            }
            Err(e) => return self.fail_all(waiters, e),
        };

        for ((request, (cache_key, reply)), result) in
            requests.into_iter().zip(waiters).zip(results)
        {
            let answer = match result {
                Ok(scores) => {
                    if let Some(key) = &cache_key {
                        if let Err(e) = self.cache.put(key, &scores).await {
                            tracing::warn!(service = %self.name, error = %e, "Cache write failed");
                        }
                    }
                    Ok(Response {
                        query: request.query,
                        service: self.name.clone(),
                        scores,
                        cached: false,
                    })
                }
                Err(e) => Err(e),
            };
            // The caller may have gone away; nothing to do then.
            let _ = reply.send(answer);
        }
    }

    fn fail_all(
        &self,
        waiters: Vec<(Option<String>, oneshot::Sender<Result<Response>>)>,
        error: Error,
    ) {
        tracing::warn!(service = %self.name, error = %error, requests = waiters.len(), "Batch failed");
        for (_, reply) in waiters {
            let _ = reply.send(Err(error.for_batch_caller()));
        }
    }
}

/// Placeholder cache until `with_cache` is called.
struct NoCache;

#[async_trait]
impl ResultCache for NoCache {
    fn is_enabled(&self) -> bool {
        false
    }

    async fn get(&self, _key: &str) -> Result<Option<Scores>> {
        Ok(None)
    }

    async fn put(&self, _key: &str, _scores: &Scores) -> Result<()> {
        Ok(())
    }
}
