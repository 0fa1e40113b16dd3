//! Bounded buffer with one lock and two condition variables per slot.
//!
//! A call first claims a ring index under the lock of its own role (producers
//! advance `tail`, consumers advance `head`), drops that lock, and only then
//! locks the claimed slot. Operations on different slots never wait on each
//! other; a producer only blocks while the slot it claimed is still full and a
//! consumer only while the slot it claimed is still empty.
//!
//! Slot states: `Empty --produce--> Full --consume--> Empty`. A slot holds
//! `Some(item)` exactly while it is full.

use std::iter::repeat_with;
use std::num::NonZeroUsize;
use std::sync::Arc;

use log::debug;
use parking_lot::{Condvar, Mutex};

use crate::def::Item;
use crate::trace::{BufferKind, TraceEvent, TraceSink};

#[derive(Default)]
struct Slot {
    value: Mutex<Option<Item>>,
    /// Signaled when the slot becomes full.
    inserted: Condvar,
    /// Signaled when the slot becomes empty.
    deleted: Condvar,
}

pub struct SlotBuffer {
    slots: Vec<Slot>,
    /// Next index a producer will claim.
    tail: Mutex<usize>,
    /// Next index a consumer will claim.
    head: Mutex<usize>,
    print_lock: Mutex<()>,
    sink: Arc<dyn TraceSink>,
}

impl SlotBuffer {
    pub fn new(capacity: NonZeroUsize, sink: Arc<dyn TraceSink>) -> Self {
        let capacity = capacity.get();
        Self {
            slots: repeat_with(Slot::default).take(capacity).collect(),
            tail: Mutex::new(0),
            head: Mutex::new(0),
            print_lock: Mutex::new(()),
            sink,
        }
    }

    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    /// Empties every slot and rewinds both indices.
    ///
    /// Must not be called while a producer or consumer is in flight.
    pub fn init(&self) {
        *self.tail.lock() = 0;
        *self.head.lock() = 0;
        for slot in &self.slots {
            *slot.value.lock() = None;
        }
        debug!("slot buffer reset, capacity {}", self.capacity());
    }

    /// Stores `item` in the next slot, waiting for that slot to drain first.
    pub fn produce(&self, item: Item) {
        let index = self.claim(&self.tail);
        let slot = &self.slots[index];
        let mut value = slot.value.lock();
        while value.is_some() {
            slot.deleted.wait(&mut value);
        }
        *value = Some(item);
        slot.inserted.notify_one();
    }

    /// Takes the item from the next slot, waiting for it to be filled first.
    pub fn consume(&self) -> Item {
        let index = self.claim(&self.head);
        let slot = &self.slots[index];
        let mut value = slot.value.lock();
        let item = loop {
            if let Some(item) = value.take() {
                break item;
            }
            slot.inserted.wait(&mut value);
        };
        slot.deleted.notify_one();
        drop(value);

        let _print = self.print_lock.lock();
        self.sink.emit(&TraceEvent::Consumed {
            buffer: BufferKind::Slot,
            item,
        });
        item
    }

    /// Number of full slots, read slot by slot; exact only when no call is in flight.
    pub fn occupied(&self) -> usize {
        self.slots
            .iter()
            .filter(|slot| slot.value.lock().is_some())
            .count()
    }

    fn claim(&self, cursor: &Mutex<usize>) -> usize {
        let mut cursor = cursor.lock();
        let index = *cursor;
        *cursor = (index + 1) % self.slots.len();
        index
    }
}
