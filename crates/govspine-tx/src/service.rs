//! TransactionService - bounded transactions with failure records
//!
//! Operations receive the adapter's transaction handle through a closure
//! returning a boxed future, the same shape `sqlx` uses for its own
//! transaction helpers:
//!
//! ```ignore
//! service.safe_transaction(&ctx, |tx| Box::pin(async move {
//!     sqlx::query("...").execute(&mut **tx).await?;
//!     Ok(())
//! }))
//! ```
//!
//! Nothing here returns `Err`; every outcome is a typed result.

use std::sync::Arc;
use std::time::{Duration, Instant};

use futures::future::BoxFuture;
use serde::Serialize;
use serde_json::{Map, Value};

use govspine_core::config::TransactionsConfig;
use govspine_core::context;
use govspine_core::domain::{Severity, SystemEvent};
use govspine_core::ports::{ISystemEventStore, ITransactionStore};

use crate::error::{is_non_retryable, TransactionError};

/// Event type of failure records
pub const TRANSACTION_FAILED_EVENT: &str = "transaction_failed";

/// Names an operation and attributes its failures
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TransactionContext {
    pub operation_name: String,
    pub entity_type: Option<String>,
    pub entity_id: Option<String>,
    pub metadata: Map<String, Value>,
}

impl TransactionContext {
    pub fn new(operation_name: impl Into<String>) -> Self {
        Self {
            operation_name: operation_name.into(),
            ..Self::default()
        }
    }

    pub fn with_entity(mut self, entity_type: impl Into<String>, entity_id: impl Into<String>) -> Self {
        self.entity_type = Some(entity_type.into());
        self.entity_id = Some(entity_id.into());
        self
    }

    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }
}

/// Outcome of one (possibly retried) transaction
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TransactionResult<T> {
    pub success: bool,
    pub result: Option<T>,
    pub error: Option<String>,
    pub duration_ms: u64,
}

impl<T> TransactionResult<T> {
    fn succeeded(result: T, duration_ms: u64) -> Self {
        Self {
            success: true,
            result: Some(result),
            error: None,
            duration_ms,
        }
    }

    fn failed(error: String, duration_ms: u64) -> Self {
        Self {
            success: false,
            result: None,
            error: Some(error),
            duration_ms,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryOptions {
    /// Total attempts, including the first
    pub max_retries: u32,
    /// Base delay; attempt `n` waits `retry_delay * n` before the next one
    pub retry_delay: Duration,
}

impl From<&TransactionsConfig> for RetryOptions {
    fn from(config: &TransactionsConfig) -> Self {
        Self {
            max_retries: config.max_retries,
            retry_delay: config.retry_delay(),
        }
    }
}

impl Default for RetryOptions {
    fn default() -> Self {
        Self::from(&TransactionsConfig::default())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BatchOptions {
    pub batch_size: usize,
    /// Collect per-item failures instead of aborting at the first one
    pub continue_on_error: bool,
}

impl From<&TransactionsConfig> for BatchOptions {
    fn from(config: &TransactionsConfig) -> Self {
        Self {
            batch_size: config.batch_size,
            continue_on_error: false,
        }
    }
}

impl Default for BatchOptions {
    fn default() -> Self {
        Self::from(&TransactionsConfig::default())
    }
}

/// A failed item (or chunk) of a batch, by global index
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BatchError {
    pub index: usize,
    pub error: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BatchResult<R> {
    pub success: bool,
    pub results: Vec<R>,
    pub errors: Vec<BatchError>,
    pub duration_ms: u64,
}

fn millis(elapsed: Duration) -> u64 {
    u64::try_from(elapsed.as_millis()).unwrap_or(u64::MAX)
}

/// Transaction runner over a store that also records failure events
pub struct TransactionService<S> {
    store: Arc<S>,
    config: TransactionsConfig,
}

impl<S> TransactionService<S>
where
    S: ITransactionStore + ISystemEventStore,
{
    pub fn new(store: Arc<S>) -> Self {
        Self::with_config(store, TransactionsConfig::default())
    }

    pub fn with_config(store: Arc<S>, config: TransactionsConfig) -> Self {
        Self { store, config }
    }

    /// Retry options from the configured defaults
    pub fn retry_options(&self) -> RetryOptions {
        RetryOptions::from(&self.config)
    }

    /// Batch options from the configured defaults
    pub fn batch_options(&self) -> BatchOptions {
        BatchOptions::from(&self.config)
    }

    /// Runs `operations` in one transaction and commits it.
    ///
    /// Any failure rolls back, writes one `transaction_failed` event and is
    /// reported in the result.
    pub async fn safe_transaction<T, F>(
        &self,
        ctx: &TransactionContext,
        operations: F,
    ) -> TransactionResult<T>
    where
        F: for<'t> FnOnce(&'t mut S::Tx) -> BoxFuture<'t, anyhow::Result<T>>,
    {
        let started = Instant::now();
        let outcome = self.execute(operations).await;
        let duration_ms = millis(started.elapsed());

        match outcome {
            Ok(result) => {
                tracing::debug!(
                    operation = %ctx.operation_name,
                    duration_ms,
                    "Transaction committed"
                );
                TransactionResult::succeeded(result, duration_ms)
            }
            Err(e) => {
                let message = e.to_string();
                tracing::error!(
                    operation = %ctx.operation_name,
                    error = %message,
                    request_id = %context::request_id(),
                    user_id = ?context::current_user_id(),
                    entity_type = ?ctx.entity_type,
                    entity_id = ?ctx.entity_id,
                    duration_ms,
                    "Transaction failed"
                );
                self.record_failure(ctx, &e, duration_ms).await;
                TransactionResult::failed(message, duration_ms)
            }
        }
    }

    async fn execute<T, F>(&self, operations: F) -> Result<T, TransactionError>
    where
        F: for<'t> FnOnce(&'t mut S::Tx) -> BoxFuture<'t, anyhow::Result<T>>,
    {
        let max_wait = self.config.max_wait();
        let timeout = self.config.timeout();

        let mut tx = tokio::time::timeout(max_wait, self.store.begin())
            .await
            .map_err(|_| TransactionError::BeginTimeout(max_wait))?
            .map_err(TransactionError::Begin)?;

        let outcome = tokio::time::timeout(timeout, operations(&mut tx)).await;

        match outcome {
            Ok(Ok(value)) => {
                self.store
                    .commit(tx)
                    .await
                    .map_err(TransactionError::Commit)?;
                Ok(value)
            }
            Ok(Err(e)) => {
                self.rollback(tx).await;
                Err(TransactionError::Operation(e))
            }
            Err(_) => {
                self.rollback(tx).await;
                Err(TransactionError::ExecutionTimeout(timeout))
            }
        }
    }

    async fn rollback(&self, tx: S::Tx) {
        if let Err(e) = self.store.rollback(tx).await {
            tracing::warn!(error = %e, "Rollback failed");
        }
    }

    // The transaction is gone by now, so the event write gets its own connection.
    async fn record_failure(&self, ctx: &TransactionContext, error: &TransactionError, duration_ms: u64) {
        let mut metadata = ctx.metadata.clone();
        metadata.insert("duration".into(), Value::from(duration_ms));
        metadata.insert("errorChain".into(), Value::from(error.chain()));

        let event = SystemEvent::new(
            TRANSACTION_FAILED_EVENT,
            "error",
            Severity::Error,
            format!("Transaction failed: {}", ctx.operation_name),
            error.to_string(),
            context::request_id(),
        )
        .with_entity(ctx.entity_type.clone(), ctx.entity_id.clone())
        .with_user_id(context::current_user_id())
        .with_metadata(Value::Object(metadata));

        if let Err(e) = self.store.save_event(&event).await {
            tracing::error!(error = %e, operation = %ctx.operation_name, "Failed to record transaction failure");
        }
    }

    /// Runs [`safe_transaction`](Self::safe_transaction) up to
    /// `max_retries` times with linear backoff.
    ///
    /// Constraint violations and missing records are returned after the
    /// first attempt since repeating them cannot succeed.
    pub async fn safe_transaction_with_retry<T, F>(
        &self,
        ctx: &TransactionContext,
        operations: F,
        options: RetryOptions,
    ) -> TransactionResult<T>
    where
        F: for<'t> Fn(&'t mut S::Tx) -> BoxFuture<'t, anyhow::Result<T>>,
    {
        let started = Instant::now();
        let max_retries = options.max_retries.max(1);
        let mut last_error = String::new();

        for attempt in 1..=max_retries {
            let attempt_ctx = ctx
                .clone()
                .with_metadata("attempt", attempt)
                .with_metadata("maxRetries", max_retries);

            let result = self.safe_transaction(&attempt_ctx, &operations).await;
            if result.success {
                return result;
            }

            last_error = result.error.clone().unwrap_or_default();
            if is_non_retryable(&last_error) {
                tracing::debug!(
                    operation = %ctx.operation_name,
                    attempt,
                    "Non-retryable failure, giving up"
                );
                return result;
            }

            if attempt < max_retries {
                let delay = options.retry_delay * attempt;
                tracing::warn!(
                    operation = %ctx.operation_name,
                    attempt,
                    max_retries,
                    delay_ms = millis(delay),
                    "Transaction failed, retrying"
                );
                tokio::time::sleep(delay).await;
            }
        }

        TransactionResult::failed(
            format!("Failed after {max_retries} attempts: {last_error}"),
            millis(started.elapsed()),
        )
    }

    /// Processes `items` in chunks of `batch_size`, one transaction per chunk.
    ///
    /// Atomicity is per chunk. Without `continue_on_error` the first failing
    /// chunk stops processing and is reported at its start index; earlier
    /// chunks stay committed. With it, failing items are reported by their
    /// global index and the rest of the chunk still runs.
    pub async fn batch_transaction<I, R, F>(
        &self,
        ctx: &TransactionContext,
        items: Vec<I>,
        operation: F,
        options: BatchOptions,
    ) -> BatchResult<R>
    where
        I: Send + Sync + 'static,
        R: Send + 'static,
        F: for<'t> Fn(&'t mut S::Tx, &'t I, usize) -> BoxFuture<'t, anyhow::Result<R>>
            + Send
            + Sync
            + 'static,
    {
        let started = Instant::now();
        let batch_size = options.batch_size.max(1);
        let total_items = items.len();
        let operation = Arc::new(operation);

        let mut results = Vec::with_capacity(total_items);
        let mut errors = Vec::new();
        let mut remaining = items.into_iter();
        let mut start = 0usize;

        loop {
            let chunk: Vec<I> = remaining.by_ref().take(batch_size).collect();
            if chunk.is_empty() {
                break;
            }
            let chunk_len = chunk.len();

            let chunk_ctx = ctx
                .clone()
                .with_metadata("batchStart", start)
                .with_metadata("batchSize", chunk_len)
                .with_metadata("totalItems", total_items);

            let operation = Arc::clone(&operation);
            let continue_on_error = options.continue_on_error;
            let outcome = self
                .safe_transaction(&chunk_ctx, move |tx| {
                    Box::pin(async move {
                        let mut chunk_results = Vec::with_capacity(chunk.len());
                        let mut chunk_errors = Vec::new();
                        for (offset, item) in chunk.iter().enumerate() {
                            let index = start + offset;
                            match (*operation)(&mut *tx, item, index).await {
                                Ok(value) => chunk_results.push(value),
                                Err(e) if continue_on_error => chunk_errors.push(BatchError {
                                    index,
                                    error: format!("{e:#}"),
                                }),
                                Err(e) => return Err(e),
                            }
                        }
                        Ok((chunk_results, chunk_errors))
                    })
                })
                .await;

            match outcome.result {
                Some((chunk_results, chunk_errors)) => {
                    results.extend(chunk_results);
                    errors.extend(chunk_errors);
                }
                None => {
                    let error = BatchError {
                        index: start,
                        error: outcome.error.unwrap_or_else(|| "Batch failed".to_string()),
                    };
                    if !options.continue_on_error {
                        return BatchResult {
                            success: false,
                            results,
                            errors: vec![error],
                            duration_ms: millis(started.elapsed()),
                        };
                    }
                    errors.push(error);
                }
            }

            start += chunk_len;
        }

        BatchResult {
            success: errors.is_empty(),
            results,
            errors,
            duration_ms: millis(started.elapsed()),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Mutex;

    use async_trait::async_trait;

    use super::*;
    use govspine_core::context::run_with_context;
    use govspine_core::domain::{RequestContext, UserId};

    /// Writes staged in a transaction; committed writes move to the store
    #[derive(Debug, Default)]
    struct MockTx {
        writes: Vec<String>,
    }

    #[derive(Default)]
    struct MockStore {
        committed: Mutex<Vec<String>>,
        rollbacks: AtomicU32,
        events: Mutex<Vec<SystemEvent>>,
        begin_delay: Option<Duration>,
        fail_commit: bool,
    }

    #[async_trait]
    impl ITransactionStore for MockStore {
        type Tx = MockTx;

        async fn begin(&self) -> anyhow::Result<MockTx> {
            if let Some(delay) = self.begin_delay {
                tokio::time::sleep(delay).await;
            }
            Ok(MockTx::default())
        }

        async fn commit(&self, tx: MockTx) -> anyhow::Result<()> {
            if self.fail_commit {
                anyhow::bail!("disk I/O error");
            }
            self.committed.lock().unwrap().extend(tx.writes);
            Ok(())
        }

        async fn rollback(&self, _tx: MockTx) -> anyhow::Result<()> {
            self.rollbacks.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    #[async_trait]
    impl ISystemEventStore for MockStore {
        async fn save_event(&self, event: &SystemEvent) -> anyhow::Result<i64> {
            let mut events = self.events.lock().unwrap();
            events.push(event.clone());
            Ok(events.len() as i64)
        }
    }

    fn fast_config() -> TransactionsConfig {
        TransactionsConfig {
            max_wait_ms: 50,
            timeout_ms: 50,
            retry_delay_ms: 1,
            ..TransactionsConfig::default()
        }
    }

    fn service(store: MockStore) -> (Arc<MockStore>, TransactionService<MockStore>) {
        let store = Arc::new(store);
        (store.clone(), TransactionService::with_config(store, fast_config()))
    }

    #[tokio::test]
    async fn test_success_commits() {
        let (store, service) = service(MockStore::default());

        let result = service
            .safe_transaction(&TransactionContext::new("write_two"), |tx| {
                Box::pin(async move {
                    tx.writes.push("a".into());
                    tx.writes.push("b".into());
                    Ok(tx.writes.len())
                })
            })
            .await;

        assert!(result.success);
        assert_eq!(result.result, Some(2));
        assert!(result.error.is_none());
        assert_eq!(*store.committed.lock().unwrap(), vec!["a", "b"]);
        assert!(store.events.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_operation_error_rolls_back_and_records_event() {
        let (store, service) = service(MockStore::default());
        let user = UserId::new();
        let request = RequestContext::new(Some(user));
        let request_id = request.request_id();

        let ctx = TransactionContext::new("import_parts")
            .with_entity("AssemblyPart", "ap-1")
            .with_metadata("file", "parts.csv");

        let result: TransactionResult<()> = run_with_context(request, async {
            service
                .safe_transaction(&ctx, |tx| {
                    Box::pin(async move {
                        tx.writes.push("partial".into());
                        anyhow::bail!("Unique constraint failed")
                    })
                })
                .await
        })
        .await;

        assert!(!result.success);
        assert_eq!(result.error.as_deref(), Some("Unique constraint failed"));
        assert!(store.committed.lock().unwrap().is_empty());
        assert_eq!(store.rollbacks.load(Ordering::SeqCst), 1);

        let events = store.events.lock().unwrap();
        assert_eq!(events.len(), 1);
        let event = &events[0];
        assert_eq!(event.event_type, "transaction_failed");
        assert_eq!(event.category, "error");
        assert_eq!(event.severity, Severity::Error);
        assert_eq!(event.title, "Transaction failed: import_parts");
        assert_eq!(event.description, "Unique constraint failed");
        assert_eq!(event.request_id, request_id);
        assert_eq!(event.user_id, Some(user));
        assert_eq!(event.entity_type.as_deref(), Some("AssemblyPart"));
        assert_eq!(event.metadata["file"], "parts.csv");
        assert!(event.metadata["duration"].is_u64());
        assert_eq!(event.metadata["errorChain"][0], "Unique constraint failed");
    }

    #[tokio::test]
    async fn test_execution_timeout() {
        let (store, service) = service(MockStore::default());

        let result: TransactionResult<()> = service
            .safe_transaction(&TransactionContext::new("slow"), |_tx| {
                Box::pin(async move {
                    tokio::time::sleep(Duration::from_secs(5)).await;
                    Ok(())
                })
            })
            .await;

        assert!(!result.success);
        assert_eq!(result.error.as_deref(), Some("Transaction timed out after 50ms"));
        assert_eq!(store.rollbacks.load(Ordering::SeqCst), 1);
        assert_eq!(store.events.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_begin_timeout() {
        let (store, service) = service(MockStore {
            begin_delay: Some(Duration::from_secs(5)),
            ..MockStore::default()
        });

        let result = service
            .safe_transaction(&TransactionContext::new("blocked"), |_tx| {
                Box::pin(async move { Ok(1) })
            })
            .await;

        assert!(!result.success);
        assert_eq!(
            result.error.as_deref(),
            Some("Transaction could not start within 50ms")
        );
        assert_eq!(store.rollbacks.load(Ordering::SeqCst), 0);
        assert_eq!(store.events.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_commit_failure() {
        let (store, service) = service(MockStore {
            fail_commit: true,
            ..MockStore::default()
        });

        let result = service
            .safe_transaction(&TransactionContext::new("commit"), |_tx| {
                Box::pin(async move { Ok(()) })
            })
            .await;

        assert_eq!(result.error.as_deref(), Some("Commit failed: disk I/O error"));
        assert_eq!(store.events.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_retry_stops_on_unique_constraint() {
        let (store, service) = service(MockStore::default());
        let attempts = Arc::new(AtomicU32::new(0));

        let counter = Arc::clone(&attempts);
        let result: TransactionResult<()> = service
            .safe_transaction_with_retry(
                &TransactionContext::new("insert"),
                move |_tx| {
                    let counter = Arc::clone(&counter);
                    Box::pin(async move {
                        counter.fetch_add(1, Ordering::SeqCst);
                        anyhow::bail!("UNIQUE constraint failed: buildings.id")
                    })
                },
                service.retry_options(),
            )
            .await;

        assert_eq!(attempts.load(Ordering::SeqCst), 1);
        assert_eq!(
            result.error.as_deref(),
            Some("UNIQUE constraint failed: buildings.id")
        );
        let events = store.events.lock().unwrap();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].metadata["attempt"], 1);
        assert_eq!(events[0].metadata["maxRetries"], 3);
    }

    #[tokio::test]
    async fn test_retry_exhausts_transient_failures() {
        let (store, service) = service(MockStore::default());
        let attempts = Arc::new(AtomicU32::new(0));

        let counter = Arc::clone(&attempts);
        let result: TransactionResult<()> = service
            .safe_transaction_with_retry(
                &TransactionContext::new("flaky"),
                move |_tx| {
                    let counter = Arc::clone(&counter);
                    Box::pin(async move {
                        counter.fetch_add(1, Ordering::SeqCst);
                        anyhow::bail!("database is locked")
                    })
                },
                RetryOptions {
                    max_retries: 3,
                    retry_delay: Duration::from_millis(1),
                },
            )
            .await;

        assert_eq!(attempts.load(Ordering::SeqCst), 3);
        assert!(!result.success);
        assert_eq!(
            result.error.as_deref(),
            Some("Failed after 3 attempts: database is locked")
        );
        assert_eq!(store.events.lock().unwrap().len(), 3);
    }

    #[tokio::test]
    async fn test_retry_recovers() {
        let (_, service) = service(MockStore::default());
        let attempts = Arc::new(AtomicU32::new(0));

        let counter = Arc::clone(&attempts);
        let result = service
            .safe_transaction_with_retry(
                &TransactionContext::new("eventually"),
                move |_tx| {
                    let counter = Arc::clone(&counter);
                    Box::pin(async move {
                        let n = counter.fetch_add(1, Ordering::SeqCst) + 1;
                        if n < 2 {
                            anyhow::bail!("database is locked");
                        }
                        Ok(n)
                    })
                },
                service.retry_options(),
            )
            .await;

        assert!(result.success);
        assert_eq!(result.result, Some(2));
    }

    fn reject_multiples_of_five<'t>(
        tx: &'t mut MockTx,
        item: &'t u32,
        _index: usize,
    ) -> BoxFuture<'t, anyhow::Result<u32>> {
        Box::pin(async move {
            if item % 5 == 0 {
                anyhow::bail!("item {item} rejected");
            }
            tx.writes.push(item.to_string());
            Ok(item * 10)
        })
    }

    #[tokio::test]
    async fn test_batch_aborts_at_failing_chunk() {
        let (store, service) = service(MockStore::default());
        let items: Vec<u32> = (1..=12).collect();

        let result = service
            .batch_transaction(
                &TransactionContext::new("batch"),
                items,
                reject_multiples_of_five,
                BatchOptions {
                    batch_size: 4,
                    continue_on_error: false,
                },
            )
            .await;

        // chunk [1..4] commits, chunk [5..8] fails at item 5
        assert!(!result.success);
        assert_eq!(result.results, vec![10, 20, 30, 40]);
        assert_eq!(
            result.errors,
            vec![BatchError {
                index: 4,
                error: "item 5 rejected".into()
            }]
        );
        assert_eq!(store.committed.lock().unwrap().len(), 4);
    }

    #[tokio::test]
    async fn test_batch_continue_on_error_collects_items() {
        let (store, service) = service(MockStore::default());
        let items: Vec<u32> = (1..=12).collect();

        let result = service
            .batch_transaction(
                &TransactionContext::new("batch"),
                items,
                reject_multiples_of_five,
                BatchOptions {
                    batch_size: 4,
                    continue_on_error: true,
                },
            )
            .await;

        assert!(!result.success);
        assert_eq!(result.results.len(), 10);
        let failed: Vec<usize> = result.errors.iter().map(|e| e.index).collect();
        assert_eq!(failed, vec![4, 9]);
        assert_eq!(store.committed.lock().unwrap().len(), 10);
        assert!(store.events.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_batch_chunk_failure_with_continue_on_error() {
        let (store, service) = service(MockStore {
            fail_commit: true,
            ..MockStore::default()
        });

        let result = service
            .batch_transaction(
                &TransactionContext::new("batch"),
                vec![1u32, 2, 3],
                reject_multiples_of_five,
                BatchOptions {
                    batch_size: 2,
                    continue_on_error: true,
                },
            )
            .await;

        assert!(!result.success);
        assert!(result.results.is_empty());
        let failed: Vec<usize> = result.errors.iter().map(|e| e.index).collect();
        assert_eq!(failed, vec![0, 2]);
        assert_eq!(store.events.lock().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_empty_batch_succeeds() {
        let (_, service) = service(MockStore::default());
        let result = service
            .batch_transaction(
                &TransactionContext::new("batch"),
                Vec::<u32>::new(),
                reject_multiples_of_five,
                service.batch_options(),
            )
            .await;

        assert!(result.success);
        assert!(result.results.is_empty());
        assert!(result.errors.is_empty());
    }
}
