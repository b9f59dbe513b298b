use crate::store::traits::{Destination, InputLogEvent, LogStore, SequenceToken, StoreError};
use async_trait::async_trait;
use std::collections::{HashMap, VecDeque};
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

const MAX_PUT_EVENTS: usize = 10_000;
const MAX_PUT_BYTES: usize = 1_048_576;
const EVENT_OVERHEAD: usize = 26;

/// Remote calls observed by a [`MemoryLogStore`], in order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreCall {
    PutLogEvents {
        group: String,
        stream: String,
        events: usize,
    },
    CreateLogStream {
        group: String,
        stream: String,
    },
    CreateLogGroup {
        group: String,
    },
    PutRetentionPolicy {
        group: String,
        days: u32,
    },
}

/// In-process log store with the same ordering-token, existence and batch-limit
/// rules as the remote service. Used for local runs and tests; failures can be
/// injected ahead of time.
///
/// A store built with [`MemoryLogStore::bounded`] keeps only the newest events
/// of each stream and records no calls, so a long-running process stays within
/// a fixed footprint.
#[derive(Default)]
pub struct MemoryLogStore {
    state: Mutex<MemoryState>,
}

#[derive(Default)]
struct MemoryState {
    groups: HashMap<String, MemoryGroup>,
    calls: Vec<StoreCall>,
    append_faults: VecDeque<StoreError>,
    provision_faults: VecDeque<StoreError>,
    append_delay: Option<Duration>,
    token_counter: u64,
    retain_events: Option<usize>,
}

impl MemoryState {
    fn record(&mut self, call: StoreCall) {
        if self.retain_events.is_none() {
            self.calls.push(call);
        }
    }
}

#[derive(Default)]
struct MemoryGroup {
    retention_days: Option<u32>,
    streams: HashMap<String, MemoryStream>,
}

#[derive(Default)]
struct MemoryStream {
    token: Option<SequenceToken>,
    events: Vec<InputLogEvent>,
}

impl MemoryLogStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store that keeps at most `retain_events` events per stream, dropping the
    /// oldest first.
    pub fn bounded(retain_events: usize) -> Self {
        let store = Self::default();
        store.state().retain_events = Some(retain_events);
        store
    }

    fn state(&self) -> MutexGuard<'_, MemoryState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Fail the next `put_log_events` call with `error` (queued, one per call).
    pub fn fail_next_append(&self, error: StoreError) {
        self.state().append_faults.push_back(error);
    }

    /// Fail the next create-group/create-stream call with `error`.
    pub fn fail_next_provision(&self, error: StoreError) {
        self.state().provision_faults.push_back(error);
    }

    /// Delay every append, simulating a slow network round trip.
    pub fn set_append_delay(&self, delay: Duration) {
        self.state().append_delay = Some(delay);
    }

    pub fn create_group_now(&self, group: &str) {
        self.state().groups.entry(group.to_string()).or_default();
    }

    pub fn delete_group(&self, group: &str) {
        self.state().groups.remove(group);
    }

    pub fn has_group(&self, group: &str) -> bool {
        self.state().groups.contains_key(group)
    }

    pub fn streams(&self, group: &str) -> Vec<String> {
        self.state()
            .groups
            .get(group)
            .map(|g| g.streams.keys().cloned().collect())
            .unwrap_or_default()
    }

    pub fn retention(&self, group: &str) -> Option<u32> {
        self.state().groups.get(group).and_then(|g| g.retention_days)
    }

    /// Every event stored in `group`, across streams.
    pub fn events(&self, group: &str) -> Vec<InputLogEvent> {
        self.state()
            .groups
            .get(group)
            .map(|g| {
                g.streams
                    .values()
                    .flat_map(|s| s.events.iter().cloned())
                    .collect()
            })
            .unwrap_or_default()
    }

    pub fn calls(&self) -> Vec<StoreCall> {
        self.state().calls.clone()
    }

    /// Sizes of the successful and failed appends, in call order.
    pub fn append_sizes(&self) -> Vec<usize> {
        self.state()
            .calls
            .iter()
            .filter_map(|call| match call {
                StoreCall::PutLogEvents { events, .. } => Some(*events),
                _ => None,
            })
            .collect()
    }
}

fn validate_events(events: &[InputLogEvent]) -> Result<(), StoreError> {
    let invalid = |message: String| StoreError::Service {
        code: "InvalidParameterException".to_string(),
        message,
    };

    if events.is_empty() {
        return Err(invalid("no log events".to_string()));
    }
    if events.len() > MAX_PUT_EVENTS {
        return Err(invalid(format!("{} events exceeds batch limit", events.len())));
    }
    let bytes: usize = events.iter().map(|e| e.message.len() + EVENT_OVERHEAD).sum();
    if bytes > MAX_PUT_BYTES {
        return Err(invalid(format!("{} bytes exceeds batch limit", bytes)));
    }
    if events.windows(2).any(|w| w[0].timestamp > w[1].timestamp) {
        return Err(invalid(
            "log events in a single request must be in chronological order".to_string(),
        ));
    }
    Ok(())
}

#[async_trait]
impl LogStore for MemoryLogStore {
    async fn put_log_events(
        &self,
        destination: &Destination,
        token: Option<&SequenceToken>,
        events: &[InputLogEvent],
    ) -> Result<Option<SequenceToken>, StoreError> {
        let delay = {
            let mut state = self.state();
            state.record(StoreCall::PutLogEvents {
                group: destination.group.clone(),
                stream: destination.stream.clone(),
                events: events.len(),
            });
            state.append_delay
        };

        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        let mut state = self.state();
        if let Some(fault) = state.append_faults.pop_front() {
            return Err(fault);
        }

        validate_events(events)?;

        let retain_events = state.retain_events;
        state.token_counter += 1;
        let next_token = SequenceToken::new(state.token_counter.to_string());

        let stream = state
            .groups
            .get_mut(&destination.group)
            .and_then(|g| g.streams.get_mut(&destination.stream))
            .ok_or_else(|| {
                StoreError::ResourceNotFound(format!(
                    "the specified log stream does not exist: {}",
                    destination
                ))
            })?;

        if stream.token.as_ref() != token {
            return Err(StoreError::InvalidSequenceToken {
                message: format!("the given sequence token is invalid for {}", destination),
                expected: stream.token.clone(),
            });
        }

        stream.events.extend_from_slice(events);
        if let Some(limit) = retain_events {
            let excess = stream.events.len().saturating_sub(limit);
            stream.events.drain(..excess);
        }
        stream.token = Some(next_token.clone());
        Ok(Some(next_token))
    }

    async fn create_log_stream(&self, destination: &Destination) -> Result<(), StoreError> {
        let mut state = self.state();
        state.record(StoreCall::CreateLogStream {
            group: destination.group.clone(),
            stream: destination.stream.clone(),
        });
        if let Some(fault) = state.provision_faults.pop_front() {
            return Err(fault);
        }

        let group = state.groups.get_mut(&destination.group).ok_or_else(|| {
            StoreError::ResourceNotFound(format!(
                "the specified log group does not exist: {}",
                destination.group
            ))
        })?;

        if group.streams.contains_key(&destination.stream) {
            return Err(StoreError::ResourceAlreadyExists(destination.to_string()));
        }
        group
            .streams
            .insert(destination.stream.clone(), MemoryStream::default());
        Ok(())
    }

    async fn create_log_group(&self, group: &str) -> Result<(), StoreError> {
        let mut state = self.state();
        state.record(StoreCall::CreateLogGroup {
            group: group.to_string(),
        });
        if let Some(fault) = state.provision_faults.pop_front() {
            return Err(fault);
        }

        if state.groups.contains_key(group) {
            return Err(StoreError::ResourceAlreadyExists(group.to_string()));
        }
        state.groups.insert(group.to_string(), MemoryGroup::default());
        Ok(())
    }

    async fn put_retention_policy(&self, group: &str, days: u32) -> Result<(), StoreError> {
        let mut state = self.state();
        state.record(StoreCall::PutRetentionPolicy {
            group: group.to_string(),
            days,
        });

        let entry = state.groups.get_mut(group).ok_or_else(|| {
            StoreError::ResourceNotFound(format!(
                "the specified log group does not exist: {}",
                group
            ))
        })?;
        entry.retention_days = Some(days);
        Ok(())
    }
}
