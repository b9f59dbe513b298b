use crate::config::types::SinkConfig;
use crate::sink::error::SinkError;
use crate::sink::report::ErrorReporter;
use crate::sink::worker::Sink;
use crate::store::LogStore;
use futures::future::join_all;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tracing::{info, warn};

/// Tenant → sink map. Sinks are created on first use and live until
/// [`SinkRegistry::stop_all`].
pub struct SinkRegistry {
    inner: Mutex<RegistryInner>,
    store: Arc<dyn LogStore>,
    reporter: Arc<dyn ErrorReporter>,
    config: SinkConfig,
}

#[derive(Default)]
struct RegistryInner {
    sinks: HashMap<String, Sink>,
    closed: bool,
}

impl SinkRegistry {
    pub fn new(
        store: Arc<dyn LogStore>,
        reporter: Arc<dyn ErrorReporter>,
        config: SinkConfig,
    ) -> Self {
        Self {
            inner: Mutex::new(RegistryInner::default()),
            store,
            reporter,
            config,
        }
    }

    fn inner(&self) -> MutexGuard<'_, RegistryInner> {
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Sink for `tenant`, creating it on first call. The lock covers only the
    /// lookup; it is never held across sink operations.
    pub fn get(&self, tenant: &str) -> Result<Sink, SinkError> {
        let mut inner = self.inner();
        if inner.closed {
            return Err(SinkError::RegistryClosed);
        }

        if let Some(sink) = inner.sinks.get(tenant) {
            return Ok(sink.clone());
        }

        info!(tenant = %tenant, "Creating sink");
        let sink = Sink::spawn(
            tenant,
            Arc::clone(&self.store),
            Arc::clone(&self.reporter),
            &self.config,
        );
        inner.sinks.insert(tenant.to_string(), sink.clone());
        Ok(sink)
    }

    pub fn len(&self) -> usize {
        self.inner().sinks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn tenants(&self) -> Vec<String> {
        let mut tenants: Vec<String> = self.inner().sinks.keys().cloned().collect();
        tenants.sort();
        tenants
    }

    /// Close the registry and stop every sink in parallel, waiting for all of
    /// them to drain.
    pub async fn stop_all(&self) {
        let sinks = self.close();
        join_all(sinks.iter().map(|sink| sink.stop())).await;
    }

    /// Like [`stop_all`](Self::stop_all) but gives each sink at most `timeout`
    /// to drain. `None` waits indefinitely.
    pub async fn stop_all_within(&self, timeout: Option<Duration>) -> Result<(), SinkError> {
        let Some(timeout) = timeout else {
            self.stop_all().await;
            return Ok(());
        };

        let sinks = self.close();
        let results = join_all(sinks.iter().map(|sink| async move {
            tokio::time::timeout(timeout, sink.stop())
                .await
                .map_err(|_| sink.tenant().to_string())
        }))
        .await;

        let mut stuck: Vec<String> = results.into_iter().filter_map(Result::err).collect();
        if stuck.is_empty() {
            return Ok(());
        }

        stuck.sort();
        warn!(tenants = ?stuck, "Sinks did not drain before the timeout");
        Err(SinkError::DrainTimeout { tenants: stuck })
    }

    fn close(&self) -> Vec<Sink> {
        let mut inner = self.inner();
        inner.closed = true;
        info!(sinks = inner.sinks.len(), "Stopping all sinks");
        inner.sinks.values().cloned().collect()
    }
}
