//! Bounded subscriber queues
//!
//! Each subscriber of a stream gets one bounded FIFO of samples with a
//! single producer (the stream's pull task) and a single consumer. The
//! producer never blocks: when the queue is full the single oldest queued
//! sample is evicted to admit the new one, so a slow consumer sees the
//! most recent window of the stream rather than stalling the producer.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use tokio::sync::Notify;

use crate::source::Sample;

struct Shared {
    queue: Mutex<VecDeque<Sample>>,
    capacity: usize,
    closed: AtomicBool,
    dropped: AtomicU64,
    notify: Notify,
}

/// Create a bounded sample queue; capacity is clamped to at least 1
pub fn channel(capacity: usize) -> (SampleSender, SampleReceiver) {
    let shared = Arc::new(Shared {
        queue: Mutex::new(VecDeque::with_capacity(capacity.max(1))),
        capacity: capacity.max(1),
        closed: AtomicBool::new(false),
        dropped: AtomicU64::new(0),
        notify: Notify::new(),
    });
    (
        SampleSender {
            shared: Arc::clone(&shared),
        },
        SampleReceiver { shared },
    )
}

/// Producer side, held in the inlet manager's subscriber set
pub struct SampleSender {
    shared: Arc<Shared>,
}

impl SampleSender {
    /// Enqueue without blocking, evicting the oldest sample when full
    ///
    /// Returns true if an older sample was evicted to make room.
    pub fn push(&self, sample: Sample) -> bool {
        let evicted = {
            let mut queue = self.shared.queue.lock().unwrap();
            let evicted = if queue.len() >= self.shared.capacity {
                queue.pop_front();
                true
            } else {
                false
            };
            queue.push_back(sample);
            evicted
        };
        if evicted {
            self.shared.dropped.fetch_add(1, Ordering::Relaxed);
        }
        self.shared.notify.notify_one();
        evicted
    }

    /// Close the queue; the consumer drains what remains, then sees `None`
    pub fn close(&self) {
        self.shared.closed.store(true, Ordering::Release);
        self.shared.notify.notify_one();
    }

    /// Samples currently queued
    pub fn len(&self) -> usize {
        self.shared.queue.lock().unwrap().len()
    }

    /// True if nothing is queued
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Queue capacity
    pub fn capacity(&self) -> usize {
        self.shared.capacity
    }

    /// Samples evicted by overflow so far
    pub fn dropped(&self) -> u64 {
        self.shared.dropped.load(Ordering::Relaxed)
    }
}

/// Consumer side, handed to the subscriber
pub struct SampleReceiver {
    shared: Arc<Shared>,
}

impl SampleReceiver {
    /// Await the next sample; `None` once the queue is closed and drained
    pub async fn recv(&mut self) -> Option<Sample> {
        loop {
            let notified = self.shared.notify.notified();
            if let Some(sample) = self.shared.queue.lock().unwrap().pop_front() {
                return Some(sample);
            }
            if self.shared.closed.load(Ordering::Acquire) {
                // One more pop covers a push racing the close flag
                return self.shared.queue.lock().unwrap().pop_front();
            }
            notified.await;
        }
    }

    /// Pop the next sample if one is queued
    pub fn try_recv(&mut self) -> Option<Sample> {
        self.shared.queue.lock().unwrap().pop_front()
    }

    /// Samples currently queued
    pub fn len(&self) -> usize {
        self.shared.queue.lock().unwrap().len()
    }

    /// True if nothing is queued
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
