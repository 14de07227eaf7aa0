//! Signal Buffer: recent magnitude samples, strictly increasing timestamps

use std::collections::VecDeque;

use crate::error::SampleError;
use crate::types::Sample;
use crate::SIGNAL_BUFFER_CAPACITY;

/// Bounded history of accepted samples; oldest dropped when full
#[derive(Debug, Clone)]
pub struct SignalBuffer {
    samples: VecDeque<Sample>,
    capacity: usize,
    /// Timestamp of the newest accepted sample
    last_ms: Option<u64>,
}

impl Default for SignalBuffer {
    fn default() -> Self {
        Self::new()
    }
}

impl SignalBuffer {
    /// Create buffer with default capacity
    pub fn new() -> Self {
        Self::with_capacity(SIGNAL_BUFFER_CAPACITY)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            samples: VecDeque::with_capacity(capacity),
            capacity,
            last_ms: None,
        }
    }

    /// Accept a sample. Duplicates, out-of-order and non-finite samples are refused
    /// and leave the buffer untouched.
    pub fn push(&mut self, sample: Sample) -> Result<(), SampleError> {
        if !sample.is_valid() {
            return Err(SampleError::InvalidMagnitude(sample.magnitude));
        }
        if let Some(last_ms) = self.last_ms {
            if sample.timestamp_ms <= last_ms {
                return Err(SampleError::NonMonotonic {
                    last_ms,
                    got_ms: sample.timestamp_ms,
                });
            }
        }

        if self.samples.len() == self.capacity {
            self.samples.pop_front();
        }
        self.samples.push_back(sample);
        self.last_ms = Some(sample.timestamp_ms);
        Ok(())
    }

    /// Most recent sample
    pub fn latest(&self) -> Option<&Sample> {
        self.samples.back()
    }

    pub fn last_timestamp_ms(&self) -> Option<u64> {
        self.last_ms
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn iter(&self) -> impl Iterator<Item = &Sample> {
        self.samples.iter()
    }
}
