//! Storage sink for classification and event records
//!
//! Persistence is an external collaborator. The engine calls the sink once
//! per accepted reading and once per event transition; a failing sink is
//! logged and counted by the engine but never fails or delays a tick, because
//! the in-memory state is authoritative.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use crate::classifier::ClassificationResult;
use crate::detector::EventTransition;
use crate::errors::SinkError;

/// Destination for classification results and event transitions
///
/// Implementations must return quickly. Anything slow (disk flushes, network
/// writes) belongs behind a queue owned by the implementation.
pub trait StorageSink: Send {
    fn persist_classification(&mut self, result: &ClassificationResult) -> Result<(), SinkError>;

    fn persist_transition(&mut self, transition: &EventTransition) -> Result<(), SinkError>;
}

/// Sink that discards everything
#[derive(Debug, Clone, Copy, Default)]
pub struct NullSink;

impl StorageSink for NullSink {
    fn persist_classification(&mut self, _result: &ClassificationResult) -> Result<(), SinkError> {
        Ok(())
    }

    fn persist_transition(&mut self, _transition: &EventTransition) -> Result<(), SinkError> {
        Ok(())
    }
}

/// Bounded in-memory sink
///
/// Keeps the most recent `capacity` records of each kind. With
/// `reject_when_full` set it returns [`SinkError::Full`] instead of dropping
/// the oldest record, which is how tests exercise the engine's failure path.
#[derive(Debug, Clone)]
pub struct MemorySink {
    capacity: usize,
    reject_when_full: bool,
    classifications: VecDeque<ClassificationResult>,
    transitions: VecDeque<EventTransition>,
}

impl MemorySink {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            reject_when_full: false,
            classifications: VecDeque::with_capacity(capacity.min(1024)),
            transitions: VecDeque::with_capacity(capacity.min(1024)),
        }
    }

    /// Fail with `Full` instead of evicting
    pub fn rejecting(mut self) -> Self {
        self.reject_when_full = true;
        self
    }

    pub fn classifications(&self) -> impl Iterator<Item = &ClassificationResult> {
        self.classifications.iter()
    }

    pub fn transitions(&self) -> impl Iterator<Item = &EventTransition> {
        self.transitions.iter()
    }

    fn store<T>(capacity: usize, reject: bool, queue: &mut VecDeque<T>, item: T) -> Result<(), SinkError> {
        if queue.len() >= capacity {
            if reject || capacity == 0 {
                return Err(SinkError::Full);
            }
            queue.pop_front();
        }
        queue.push_back(item);
        Ok(())
    }
}

impl Default for MemorySink {
    fn default() -> Self {
        Self::new(1024)
    }
}

impl StorageSink for MemorySink {
    fn persist_classification(&mut self, result: &ClassificationResult) -> Result<(), SinkError> {
        Self::store(self.capacity, self.reject_when_full, &mut self.classifications, *result)
    }

    fn persist_transition(&mut self, transition: &EventTransition) -> Result<(), SinkError> {
        Self::store(
            self.capacity,
            self.reject_when_full,
            &mut self.transitions,
            transition.clone(),
        )
    }
}

/// Shared sink, so the embedding process can read what was stored
impl<S: StorageSink> StorageSink for Arc<Mutex<S>> {
    fn persist_classification(&mut self, result: &ClassificationResult) -> Result<(), SinkError> {
        self.lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .persist_classification(result)
    }

    fn persist_transition(&mut self, transition: &EventTransition) -> Result<(), SinkError> {
        self.lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .persist_transition(transition)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classifier::classify;
    use crate::reading::Reading;
    use crate::thresholds::ThresholdTable;

    fn result(t: u64) -> ClassificationResult {
        classify(&Reading::new(t, 7.0, 1.0, 20.0), &ThresholdTable::default())
    }

    #[test]
    fn memory_sink_evicts_oldest() {
        let mut sink = MemorySink::new(2);
        for t in 0..3 {
            sink.persist_classification(&result(t)).unwrap();
        }
        let kept: Vec<u64> = sink.classifications().map(|c| c.timestamp()).collect();
        assert_eq!(kept, vec![1, 2]);
    }

    #[test]
    fn rejecting_sink_reports_full() {
        let mut sink = MemorySink::new(1).rejecting();
        assert!(sink.persist_classification(&result(0)).is_ok());
        assert_eq!(sink.persist_classification(&result(1)), Err(SinkError::Full));
    }
}
