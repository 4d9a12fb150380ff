//! Bounded background queue for audit writes
//!
//! Mutations hand their audit work to an [`AuditDispatcher`] so the store
//! round-trip happens off the request path. A single worker task drains a
//! bounded `mpsc` channel in FIFO order.
//!
//! # Overload policy
//!
//! Enqueueing never waits: when the queue is full the job is dropped, a
//! warning is logged and the `dropped` counter goes up.
//!
//! # Context
//!
//! The enqueueing request's [`RequestContext`] is captured into the job and
//! re-established around the service call, so attribution is the same as if
//! the entry had been written inline.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use serde_json::Value;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use govspine_core::context;
use govspine_core::domain::{AuditAction, RequestContext};

use crate::cleaner::RecordCleaner;
use crate::service::{AuditService, BatchLogParams, LogParams};

/// Reason recorded for updates seen by the middleware
pub const UPDATE_REASON: &str = "Updated via API";

/// Reason recorded for deletes seen by the middleware
pub const DELETE_REASON: &str = "Deleted via API";

/// A unit of audit work
#[derive(Debug, Clone, PartialEq)]
pub enum AuditJob {
    /// A created record; cleaned and logged field by field
    Create {
        entity_type: String,
        entity_id: String,
        record: Value,
    },
    Update {
        entity_type: String,
        entity_id: String,
    },
    Delete {
        entity_type: String,
        entity_id: String,
    },
    /// A summary entry for a bulk operation
    Batch(BatchLogParams),
}

/// Snapshot of the dispatcher counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DispatcherStats {
    pub enqueued: u64,
    pub processed: u64,
    pub dropped: u64,
}

#[derive(Debug, Default)]
struct Counters {
    enqueued: AtomicU64,
    processed: AtomicU64,
    dropped: AtomicU64,
}

struct QueuedJob {
    job: AuditJob,
    context: Option<Arc<RequestContext>>,
}

enum Message {
    Job(Box<QueuedJob>),
    Flush(oneshot::Sender<()>),
}

/// Handle to the audit worker
pub struct AuditDispatcher {
    tx: mpsc::Sender<Message>,
    counters: Arc<Counters>,
    shutdown: CancellationToken,
    worker: Mutex<Option<JoinHandle<()>>>,
}

impl AuditDispatcher {
    /// Spawns the worker on the current tokio runtime.
    pub fn spawn(service: Arc<AuditService>, cleaner: RecordCleaner, capacity: usize) -> Self {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        let counters = Arc::new(Counters::default());
        let shutdown = CancellationToken::new();

        let worker = Worker {
            rx,
            service,
            cleaner,
            counters: Arc::clone(&counters),
        };
        let handle = tokio::spawn(worker.run(shutdown.clone()));

        Self {
            tx,
            counters,
            shutdown,
            worker: Mutex::new(Some(handle)),
        }
    }

    /// Queues `job` with the caller's ambient context.
    ///
    /// Returns `false` when the job was dropped.
    pub fn enqueue(&self, job: AuditJob) -> bool {
        let queued = QueuedJob {
            job,
            context: context::current_context(),
        };

        match self.tx.try_send(Message::Job(Box::new(queued))) {
            Ok(()) => {
                self.counters.enqueued.fetch_add(1, Ordering::Relaxed);
                true
            }
            Err(mpsc::error::TrySendError::Full(_)) => {
                self.counters.dropped.fetch_add(1, Ordering::Relaxed);
                tracing::warn!("Audit queue full, dropping audit job");
                false
            }
            Err(mpsc::error::TrySendError::Closed(_)) => {
                self.counters.dropped.fetch_add(1, Ordering::Relaxed);
                tracing::warn!("Audit dispatcher stopped, dropping audit job");
                false
            }
        }
    }

    /// Waits until every job enqueued before this call has been processed.
    ///
    /// Returns immediately if the worker has stopped.
    pub async fn flush(&self) {
        let (reply, done) = oneshot::channel();
        if self.tx.send(Message::Flush(reply)).await.is_err() {
            return;
        }
        let _ = done.await;
    }

    pub fn stats(&self) -> DispatcherStats {
        DispatcherStats {
            enqueued: self.counters.enqueued.load(Ordering::Relaxed),
            processed: self.counters.processed.load(Ordering::Relaxed),
            dropped: self.counters.dropped.load(Ordering::Relaxed),
        }
    }

    /// Stops accepting jobs, processes what is already queued and waits for
    /// the worker to exit.
    pub async fn shutdown(&self) {
        self.shutdown.cancel();

        let handle = match self.worker.lock() {
            Ok(mut guard) => guard.take(),
            Err(poisoned) => poisoned.into_inner().take(),
        };

        if let Some(handle) = handle {
            if let Err(e) = handle.await {
                tracing::error!(error = %e, "Audit worker terminated abnormally");
            }
        }
    }

    pub fn is_shutdown(&self) -> bool {
        self.shutdown.is_cancelled()
    }
}

struct Worker {
    rx: mpsc::Receiver<Message>,
    service: Arc<AuditService>,
    cleaner: RecordCleaner,
    counters: Arc<Counters>,
}

impl Worker {
    async fn run(mut self, shutdown: CancellationToken) {
        tracing::debug!("Audit worker started");

        loop {
            tokio::select! {
                biased;
                _ = shutdown.cancelled() => break,
                message = self.rx.recv() => match message {
                    Some(message) => self.handle(message).await,
                    None => {
                        tracing::debug!("Audit worker stopped (all senders dropped)");
                        return;
                    }
                },
            }
        }

        self.rx.close();
        let mut drained = 0u64;
        while let Some(message) = self.rx.recv().await {
            self.handle(message).await;
            drained += 1;
        }

        tracing::info!(drained, "Audit worker shut down");
    }

    async fn handle(&self, message: Message) {
        match message {
            Message::Job(queued) => {
                let QueuedJob { job, context } = *queued;
                match context {
                    Some(ctx) => context::run_with_shared_context(ctx, self.process(job)).await,
                    None => self.process(job).await,
                }
                self.counters.processed.fetch_add(1, Ordering::Relaxed);
            }
            Message::Flush(reply) => {
                let _ = reply.send(());
            }
        }
    }

    async fn process(&self, job: AuditJob) {
        match job {
            AuditJob::Create {
                entity_type,
                entity_id,
                record,
            } => {
                let cleaned = Value::Object(self.cleaner.clean(&record));
                self.service
                    .log_create(&entity_type, &entity_id, &cleaned, None)
                    .await;
            }
            AuditJob::Update {
                entity_type,
                entity_id,
            } => {
                self.service
                    .log(
                        LogParams::new(entity_type, entity_id, AuditAction::Update)
                            .with_reason(UPDATE_REASON),
                    )
                    .await;
            }
            AuditJob::Delete {
                entity_type,
                entity_id,
            } => {
                self.service
                    .log_delete(&entity_type, &entity_id, Some(DELETE_REASON))
                    .await;
            }
            AuditJob::Batch(params) => self.service.log_batch(params).await,
        }
    }
}
