//! Bounded buffer coordinated by counting semaphores.
//!
//! `empty_slots` counts free cells and `full_slots` counts filled ones, so a
//! producer blocks while the ring is full and a consumer while it is empty.
//! Index advancement is serialized per role by two binary semaphores:
//! `producer_mutex` among producers and `consumer_mutex` among consumers.
//! A producer and a consumer never contend for the same lock.

use std::iter::repeat_with;
use std::num::NonZeroUsize;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use log::{debug, warn};
use parking_lot::Mutex;

use crate::def::Item;
use crate::error::{Result, SyncError};
use crate::sync::Semaphore;
use crate::trace::{BufferKind, TraceEvent, TraceSink};

const SC: Ordering = Ordering::SeqCst;

pub struct SemBuffer {
    cells: Vec<Mutex<Option<Item>>>,
    next_producer: AtomicUsize,
    next_consumer: AtomicUsize,
    empty_slots: Semaphore,
    full_slots: Semaphore,
    producer_mutex: Semaphore,
    consumer_mutex: Semaphore,
    print_lock: Mutex<()>,
    sink: Arc<dyn TraceSink>,
}

impl SemBuffer {
    pub fn new(capacity: NonZeroUsize, sink: Arc<dyn TraceSink>) -> Self {
        let capacity = capacity.get();
        Self {
            cells: repeat_with(|| Mutex::new(None)).take(capacity).collect(),
            next_producer: AtomicUsize::new(0),
            next_consumer: AtomicUsize::new(0),
            empty_slots: Semaphore::new(capacity),
            full_slots: Semaphore::new(0),
            producer_mutex: Semaphore::new(1),
            consumer_mutex: Semaphore::new(1),
            print_lock: Mutex::new(()),
            sink,
        }
    }

    pub fn capacity(&self) -> usize {
        self.cells.len()
    }

    /// Empties the ring and resets all four semaphores.
    ///
    /// Must not be called while a producer or consumer is in flight.
    pub fn init(&self) {
        self.next_producer.store(0, SC);
        self.next_consumer.store(0, SC);
        self.empty_slots.init(self.capacity());
        self.full_slots.init(0);
        self.producer_mutex.init(1);
        self.consumer_mutex.init(1);
        for cell in &self.cells {
            *cell.lock() = None;
        }
        debug!("semaphore buffer reset, capacity {}", self.capacity());
    }

    /// Appends `item`, blocking while the ring is full.
    pub fn produce(&self, item: Item) {
        self.empty_slots.wait();
        self.put(item);
        self.full_slots.post();
    }

    /// Like [`produce`](Self::produce), but gives up if no cell frees up within `timeout`.
    pub fn produce_timeout(&self, item: Item, timeout: Duration) -> Result<()> {
        if !self.empty_slots.wait_until(Instant::now() + timeout) {
            return Err(SyncError::TimedOut);
        }
        self.put(item);
        self.full_slots.post();
        Ok(())
    }

    /// Removes the oldest item, blocking while the ring is empty.
    pub fn consume(&self) -> Item {
        loop {
            self.full_slots.wait();
            if let Some(item) = self.take() {
                self.empty_slots.post();
                self.report(item);
                return item;
            }
        }
    }

    /// Like [`consume`](Self::consume), but gives up if nothing arrives within `timeout`.
    pub fn consume_timeout(&self, timeout: Duration) -> Result<Item> {
        let deadline = Instant::now() + timeout;
        loop {
            if !self.full_slots.wait_until(deadline) {
                return Err(SyncError::TimedOut);
            }
            if let Some(item) = self.take() {
                self.empty_slots.post();
                self.report(item);
                return Ok(item);
            }
        }
    }

    /// Items produced but not yet claimed by a consumer.
    pub fn outstanding(&self) -> usize {
        self.full_slots.available()
    }

    fn put(&self, item: Item) {
        let _permit = self.producer_mutex.acquire();
        let index = self.next_producer.load(SC);
        *self.cells[index].lock() = Some(item);
        self.next_producer.store((index + 1) % self.cells.len(), SC);
    }

    /// Takes the item at the consumer index. A permit from `full_slots` with
    /// no item behind it only happens when `init` raced an in-flight call; the
    /// permit is dropped and the index stays put.
    fn take(&self) -> Option<Item> {
        let _permit = self.consumer_mutex.acquire();
        let index = self.next_consumer.load(SC);
        let item = self.cells[index].lock().take();
        match item {
            Some(_) => self.next_consumer.store((index + 1) % self.cells.len(), SC),
            None => warn!("semaphore buffer: cell {} empty after a full-slot permit", index),
        }
        item
    }

    fn report(&self, item: Item) {
        let _print = self.print_lock.lock();
        self.sink.emit(&TraceEvent::Consumed {
            buffer: BufferKind::Sem,
            item,
        });
    }
}
