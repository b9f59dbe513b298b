use crate::config::types::SinkConfig;
use crate::sink::batch::{truncate_message, Batch, BatchLimits, PendingBatch};
use crate::sink::error::{DeliveryError, SinkError};
use crate::sink::report::ErrorReporter;
use crate::source::LogEntry;
use crate::store::{Destination, InputLogEvent, LogStore, SequenceToken, StoreError};
use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tokio::time::Instant;
use tracing::{debug, info, warn};
use uuid::Uuid;

enum SinkEvent {
    Submit(LogEntry),
    Stop,
}

/// Handle to one tenant's batching sink.
///
/// Every sink owns a worker task that serialises submissions, timer expiries
/// and the stop request, so batch accounting and the ordering token are only
/// touched from that task. Cloning the handle is cheap.
#[derive(Clone)]
pub struct Sink {
    tenant: Arc<str>,
    stream: Arc<str>,
    sender: mpsc::Sender<SinkEvent>,
    /// Flips to true once the worker has delivered everything and exited
    stopped: watch::Receiver<bool>,
}

impl Sink {
    /// Start a sink writing to the log group `tenant`, on a fresh stream with a
    /// process-unique name. No remote call is made until the first flush.
    ///
    /// Must be called from within a tokio runtime.
    pub fn spawn(
        tenant: &str,
        store: Arc<dyn LogStore>,
        reporter: Arc<dyn ErrorReporter>,
        config: &SinkConfig,
    ) -> Self {
        let stream = Uuid::new_v4().to_string();
        let (sender, receiver) = mpsc::channel(config.queue_capacity.max(1));
        let (stopped_tx, stopped) = watch::channel(false);

        let worker = SinkWorker {
            tenant: Arc::from(tenant),
            destination: Destination {
                group: tenant.to_string(),
                stream: stream.clone(),
            },
            store,
            reporter,
            batch: Batch::new(BatchLimits::from(config)),
            overflow: VecDeque::new(),
            deadline: None,
            token: None,
            retry_pending: false,
            flush_interval: config.flush_interval,
            retention_days: config.retention_days,
            max_event_bytes: config.max_event_bytes,
        };

        debug!(tenant = %tenant, stream = %stream, "Starting sink");
        tokio::spawn(async move {
            worker.run(receiver).await;
            let _ = stopped_tx.send(true);
        });

        Self {
            tenant: Arc::from(tenant),
            stream: Arc::from(stream.as_str()),
            sender,
            stopped,
        }
    }

    pub fn tenant(&self) -> &str {
        &self.tenant
    }

    pub fn stream_name(&self) -> &str {
        &self.stream
    }

    /// Queue an entry for delivery. Returns once the entry is in the sink's
    /// inbound queue, waiting only if that queue is full.
    pub async fn submit(&self, entry: LogEntry) -> Result<(), SinkError> {
        self.sender
            .send(SinkEvent::Submit(entry))
            .await
            .map_err(|_| SinkError::Stopped(self.tenant.to_string()))
    }

    /// Deliver everything submitted so far, then stop accepting entries.
    /// Every caller returns only once the worker has finished delivering,
    /// including callers that arrive while a drain is already running.
    pub async fn stop(&self) {
        // A closed queue means a drain is already underway
        let _ = self.sender.send(SinkEvent::Stop).await;

        let mut stopped = self.stopped.clone();
        let _ = stopped.wait_for(|done| *done).await;
    }

    /// True once the worker has drained and exited.
    pub fn is_stopped(&self) -> bool {
        *self.stopped.borrow()
    }
}

struct SinkWorker {
    tenant: Arc<str>,
    destination: Destination,
    store: Arc<dyn LogStore>,
    reporter: Arc<dyn ErrorReporter>,
    batch: Batch,
    /// Entries that arrived while the batch was full and could not be flushed
    overflow: VecDeque<LogEntry>,
    /// Flush deadline, armed by the first entry into an empty batch
    deadline: Option<Instant>,
    token: Option<SequenceToken>,
    /// Last flush failed transiently; size-triggered flushes wait for the timer
    retry_pending: bool,
    flush_interval: Duration,
    retention_days: u32,
    max_event_bytes: usize,
}

impl SinkWorker {
    async fn run(mut self, mut receiver: mpsc::Receiver<SinkEvent>) {
        loop {
            tokio::select! {
                event = receiver.recv() => match event {
                    Some(SinkEvent::Submit(entry)) => self.admit(entry).await,
                    Some(SinkEvent::Stop) => {
                        self.drain(&mut receiver).await;
                        return;
                    }
                    None => {
                        // Every handle was dropped without a stop
                        self.drain_pending().await;
                        return;
                    }
                },
                _ = wait_until(self.deadline) => self.flush().await,
            }
        }
    }

    async fn admit(&mut self, mut entry: LogEntry) {
        if truncate_message(&mut entry.message, self.max_event_bytes) {
            warn!(
                tenant = %self.tenant,
                max_bytes = self.max_event_bytes,
                "Truncated oversized log message"
            );
        }

        self.overflow.push_back(entry);
        self.fill_from_overflow();

        while !self.overflow.is_empty() && !self.retry_pending {
            self.flush().await;
        }
    }

    /// Move held entries into the batch for as long as they fit. An empty batch
    /// always takes the next entry.
    fn fill_from_overflow(&mut self) {
        while let Some(entry) = self.overflow.front() {
            if !self.batch.is_empty() && !self.batch.fits(entry) {
                break;
            }
            if let Some(entry) = self.overflow.pop_front() {
                self.push(entry);
            }
        }
    }

    fn push(&mut self, entry: LogEntry) {
        if self.batch.is_empty() && self.deadline.is_none() {
            self.deadline = Some(Instant::now() + self.flush_interval);
        }
        self.batch.push(entry);
    }

    async fn flush(&mut self) {
        self.deadline = None;
        if self.batch.is_empty() {
            return;
        }

        let mut pending = self.batch.take();
        pending.sort();

        let started = Instant::now();
        match self.deliver(&pending.to_events()).await {
            Ok(()) => {
                info!(
                    tenant = %self.tenant,
                    events = pending.len(),
                    bytes = pending.byte_size,
                    elapsed = ?started.elapsed(),
                    "Wrote log events"
                );
                self.retry_pending = false;
            }
            Err(err) => {
                self.reporter.report(&self.tenant, &err);
                if err.is_provisioning() {
                    warn!(
                        tenant = %self.tenant,
                        events = pending.len(),
                        "Dropping batch after provisioning failure"
                    );
                    self.retry_pending = false;
                } else {
                    self.requeue(pending);
                    self.retry_pending = true;
                }
            }
        }

        self.fill_from_overflow();
    }

    /// Put a failed batch back so it goes out with the next flush.
    fn requeue(&mut self, pending: PendingBatch) {
        debug!(tenant = %self.tenant, events = pending.len(), "Re-enqueueing failed batch");
        for entry in pending.entries {
            self.push(entry);
        }
    }

    async fn deliver(&mut self, events: &[InputLogEvent]) -> Result<(), DeliveryError> {
        match self.append(events).await {
            Err(err) if err.is_resource_missing() => {
                self.provision().await?;
                // A new stream has no history to chain from
                self.token = None;
                self.append(events).await.map_err(DeliveryError::Append)
            }
            result => result.map_err(DeliveryError::Append),
        }
    }

    async fn append(&mut self, events: &[InputLogEvent]) -> Result<(), StoreError> {
        match self
            .store
            .put_log_events(&self.destination, self.token.as_ref(), events)
            .await
        {
            Ok(next_token) => {
                self.token = next_token;
                Ok(())
            }
            Err(err) => {
                if let Some(corrected) = err.corrected_token() {
                    self.token = corrected;
                }
                if let StoreError::DataAlreadyAccepted { .. } = err {
                    warn!(
                        tenant = %self.tenant,
                        events = events.len(),
                        "Store had already accepted batch"
                    );
                    return Ok(());
                }
                Err(err)
            }
        }
    }

    async fn provision(&self) -> Result<(), DeliveryError> {
        info!(tenant = %self.tenant, stream = %self.destination.stream, "Creating log stream");
        match self.store.create_log_stream(&self.destination).await {
            Ok(()) => Ok(()),
            Err(err) if err.is_already_exists() => Ok(()),
            Err(err) if err.is_resource_missing() => {
                self.create_group().await?;
                match self.store.create_log_stream(&self.destination).await {
                    Ok(()) => Ok(()),
                    Err(err) if err.is_already_exists() => Ok(()),
                    Err(source) => Err(DeliveryError::Provision {
                        operation: "CreateLogStream",
                        source,
                    }),
                }
            }
            Err(source) => Err(DeliveryError::Provision {
                operation: "CreateLogStream",
                source,
            }),
        }
    }

    async fn create_group(&self) -> Result<(), DeliveryError> {
        info!(tenant = %self.tenant, "Creating log group");
        match self.store.create_log_group(&self.destination.group).await {
            Ok(()) => {}
            // Someone else created it; their retention stands
            Err(err) if err.is_already_exists() => return Ok(()),
            Err(source) => {
                return Err(DeliveryError::Provision {
                    operation: "CreateLogGroup",
                    source,
                })
            }
        }

        if self.retention_days == 0 {
            return Ok(());
        }
        self.store
            .put_retention_policy(&self.destination.group, self.retention_days)
            .await
            .map_err(|source| DeliveryError::Provision {
                operation: "PutRetentionPolicy",
                source,
            })
    }

    /// Handle a stop request: take in everything already queued and deliver
    /// it. Waiters are released by the spawning task once this returns.
    async fn drain(&mut self, receiver: &mut mpsc::Receiver<SinkEvent>) {
        receiver.close();

        while let Some(event) = receiver.recv().await {
            if let SinkEvent::Submit(entry) = event {
                self.admit(entry).await;
            }
        }

        self.drain_pending().await;
        info!(tenant = %self.tenant, "Sink stopped");
    }

    async fn drain_pending(&mut self) {
        while !self.batch.is_empty() || !self.overflow.is_empty() {
            if self.retry_pending {
                tokio::time::sleep(self.flush_interval).await;
            }
            self.flush().await;
        }
    }
}

async fn wait_until(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => tokio::time::sleep_until(deadline).await,
        None => std::future::pending().await,
    }
}
