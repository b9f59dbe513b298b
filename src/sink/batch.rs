use crate::config::types::SinkConfig;
use crate::source::LogEntry;
use crate::store::InputLogEvent;

/// Size caps a single delivery must respect.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BatchLimits {
    pub max_bytes: usize,
    pub max_events: usize,
    pub event_overhead: usize,
}

impl From<&SinkConfig> for BatchLimits {
    fn from(config: &SinkConfig) -> Self {
        Self {
            max_bytes: config.max_batch_bytes,
            max_events: config.max_batch_events,
            event_overhead: config.event_overhead,
        }
    }
}

impl BatchLimits {
    /// Bytes the store accounts for `entry`.
    pub fn entry_size(&self, entry: &LogEntry) -> usize {
        entry.message.len() + self.event_overhead
    }
}

/// Entries waiting for the next flush, in arrival order.
#[derive(Debug)]
pub struct Batch {
    limits: BatchLimits,
    entries: Vec<LogEntry>,
    byte_size: usize,
}

impl Batch {
    pub fn new(limits: BatchLimits) -> Self {
        Self {
            limits,
            entries: Vec::new(),
            byte_size: 0,
        }
    }

    /// Whether `entry` can join without breaking either cap.
    pub fn fits(&self, entry: &LogEntry) -> bool {
        self.entries.len() < self.limits.max_events
            && self.byte_size + self.limits.entry_size(entry) <= self.limits.max_bytes
    }

    pub fn push(&mut self, entry: LogEntry) {
        self.byte_size += self.limits.entry_size(&entry);
        self.entries.push(entry);
    }

    /// Hand the current entries over and start an empty batch.
    pub fn take(&mut self) -> PendingBatch {
        let byte_size = std::mem::take(&mut self.byte_size);
        PendingBatch {
            entries: std::mem::take(&mut self.entries),
            byte_size,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn byte_size(&self) -> usize {
        self.byte_size
    }
}

/// A batch detached from its sink for one delivery attempt.
#[derive(Debug)]
pub struct PendingBatch {
    pub entries: Vec<LogEntry>,
    pub byte_size: usize,
}

impl PendingBatch {
    /// Order by timestamp; equal timestamps keep arrival order.
    pub fn sort(&mut self) {
        self.entries.sort_by_key(|entry| entry.timestamp);
    }

    pub fn to_events(&self) -> Vec<InputLogEvent> {
        self.entries
            .iter()
            .map(|entry| InputLogEvent {
                timestamp: entry.timestamp.timestamp_millis(),
                message: entry.message.clone(),
            })
            .collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Cut `message` to at most `max_bytes`, backing off to a char boundary.
pub fn truncate_message(message: &mut String, max_bytes: usize) -> bool {
    if message.len() <= max_bytes {
        return false;
    }
    let mut end = max_bytes;
    while !message.is_char_boundary(end) {
        end -= 1;
    }
    message.truncate(end);
    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{DateTime, TimeZone, Utc};

    fn limits(max_bytes: usize, max_events: usize) -> BatchLimits {
        BatchLimits {
            max_bytes,
            max_events,
            event_overhead: 26,
        }
    }

    fn at(secs: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2016, 10, 15, 8, 59, secs).unwrap()
    }

    #[test]
    fn test_byte_accounting_includes_overhead() {
        let mut batch = Batch::new(limits(1000, 10));
        batch.push(LogEntry::new(at(0), "hello"));
        batch.push(LogEntry::new(at(1), "world!"));

        assert_eq!(batch.len(), 2);
        assert_eq!(batch.byte_size(), 5 + 26 + 6 + 26);
    }

    #[test]
    fn test_fits_respects_byte_cap() {
        let mut batch = Batch::new(limits(100, 10));
        batch.push(LogEntry::new(at(0), "x".repeat(40)));

        // 66 used; 34 more would be exactly 100
        assert!(batch.fits(&LogEntry::new(at(1), "y".repeat(8))));
        assert!(!batch.fits(&LogEntry::new(at(1), "y".repeat(9))));
    }

    #[test]
    fn test_fits_respects_event_cap() {
        let mut batch = Batch::new(limits(10_000, 2));
        batch.push(LogEntry::new(at(0), "a"));
        assert!(batch.fits(&LogEntry::new(at(1), "b")));
        batch.push(LogEntry::new(at(1), "b"));
        assert!(!batch.fits(&LogEntry::new(at(2), "c")));
    }

    #[test]
    fn test_take_resets_batch() {
        let mut batch = Batch::new(limits(1000, 10));
        batch.push(LogEntry::new(at(0), "a"));

        let pending = batch.take();
        assert_eq!(pending.len(), 1);
        assert_eq!(pending.byte_size, 27);
        assert!(batch.is_empty());
        assert_eq!(batch.byte_size(), 0);
    }

    #[test]
    fn test_sort_is_by_timestamp_and_stable() {
        let mut batch = Batch::new(limits(1000, 10));
        batch.push(LogEntry::new(at(5), "third"));
        batch.push(LogEntry::new(at(1), "first"));
        batch.push(LogEntry::new(at(5), "fourth"));
        batch.push(LogEntry::new(at(3), "second"));

        let mut pending = batch.take();
        pending.sort();

        let messages: Vec<_> = pending.entries.iter().map(|e| e.message.as_str()).collect();
        assert_eq!(messages, vec!["first", "second", "third", "fourth"]);
    }

    #[test]
    fn test_events_use_millisecond_timestamps() {
        let mut batch = Batch::new(limits(1000, 10));
        let ts = at(8) + chrono::Duration::microseconds(723_822);
        batch.push(LogEntry::new(ts, "m"));

        let events = batch.take().to_events();
        assert_eq!(events[0].timestamp, ts.timestamp_millis());
        assert_eq!(events[0].timestamp % 1000, 723);
    }

    #[test]
    fn test_truncate_message_on_char_boundary() {
        let mut message = "ééé".to_string(); // 6 bytes
        assert!(truncate_message(&mut message, 3));
        assert_eq!(message, "é");

        let mut short = "abc".to_string();
        assert!(!truncate_message(&mut short, 10));
        assert_eq!(short, "abc");
    }
}
