//! Bounded sample queue
//!
//! FIFO between the read loop and the write loop. When full, pushing
//! evicts the oldest queued sample; the newest is always kept.
//!
//! ```text
//! [read loop] --push_all--> [ oldest ... newest ] --pop--> [write loop]
//!                              ^ evicted on overflow
//! ```

use std::collections::VecDeque;

use parking_lot::Mutex;
use tokio::sync::Notify;

use meterd_protocol::MetricSample;

/// Bounded FIFO with drop-oldest overflow
#[derive(Debug)]
pub struct MetricQueue {
    items: Mutex<VecDeque<MetricSample>>,
    capacity: usize,
    ready: Notify,
}

impl MetricQueue {
    /// Create a queue; capacity is at least 1
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            items: Mutex::new(VecDeque::new()),
            capacity,
            ready: Notify::new(),
        }
    }

    /// Enqueue one sample, returning the evicted sample if the queue was full
    pub fn push(&self, sample: MetricSample) -> Option<MetricSample> {
        let evicted = {
            let mut items = self.items.lock();
            let evicted = if items.len() >= self.capacity {
                items.pop_front()
            } else {
                None
            };
            items.push_back(sample);
            evicted
        };
        self.ready.notify_one();
        evicted
    }

    /// Enqueue samples in order, returning how many old samples were evicted
    pub fn push_all(&self, samples: Vec<MetricSample>) -> u64 {
        if samples.is_empty() {
            return 0;
        }

        let mut evicted = 0;
        {
            let mut items = self.items.lock();
            for sample in samples {
                if items.len() >= self.capacity {
                    items.pop_front();
                    evicted += 1;
                }
                items.push_back(sample);
            }
        }
        self.ready.notify_one();
        evicted
    }

    /// Dequeue the oldest sample
    #[inline]
    pub fn pop(&self) -> Option<MetricSample> {
        self.items.lock().pop_front()
    }

    /// Wait until a push happens (or one happened since the last wait)
    pub async fn notified(&self) {
        self.ready.notified().await;
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.items.lock().len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.items.lock().is_empty()
    }

    #[inline]
    pub fn capacity(&self) -> usize {
        self.capacity
    }
}
