//! In-process bus for tests.
//!
//! Mirrors the broker's delivery contract without a broker: each queue group
//! on a subject receives every message exactly once, round-robin across the
//! group's subscribers. Delivery is inline — `emit_raw` returns only after
//! the full handler cascade has run — which makes test assertions
//! deterministic. Everything published is recorded for inspection.

use crate::{BusError, EventBus, RawHandler};
use async_trait::async_trait;
use colony_core::Event;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

struct Group {
    handlers: Vec<RawHandler>,
    next: usize,
}

/// In-memory [`EventBus`].
#[derive(Default)]
pub struct InProcessBus {
    // subject -> queue group -> subscribers
    groups: Mutex<HashMap<String, HashMap<String, Group>>>,
    published: Mutex<Vec<(String, Vec<u8>)>>,
    closed: AtomicBool,
}

impl InProcessBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every payload published on `subject`, in publish order.
    pub fn payloads(&self, subject: &str) -> Vec<Vec<u8>> {
        self.published
            .lock()
            .expect("published lock")
            .iter()
            .filter(|(s, _)| s == subject)
            .map(|(_, payload)| payload.clone())
            .collect()
    }

    /// Every event of type `E` published so far, decoded, in publish order.
    pub fn events<E: Event>(&self) -> Vec<E> {
        self.payloads(E::SUBJECT)
            .iter()
            .filter_map(|payload| serde_json::from_slice(payload).ok())
            .collect()
    }

    /// Number of messages published on `subject`.
    pub fn count(&self, subject: &str) -> usize {
        self.payloads(subject).len()
    }
}

#[async_trait]
impl EventBus for InProcessBus {
    async fn emit_raw(&self, subject: &str, payload: Vec<u8>) -> Result<(), BusError> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(BusError::Closed);
        }
        self.published
            .lock()
            .expect("published lock")
            .push((subject.to_string(), payload.clone()));

        // One subscriber per queue group, chosen round-robin. Collect under
        // the lock, deliver after releasing it so handlers can re-enter.
        let selected: Vec<RawHandler> = {
            let mut groups = self.groups.lock().expect("groups lock");
            match groups.get_mut(subject) {
                Some(subject_groups) => subject_groups
                    .values_mut()
                    .map(|group| {
                        let handler = group.handlers[group.next % group.handlers.len()].clone();
                        group.next = group.next.wrapping_add(1);
                        handler
                    })
                    .collect(),
                None => Vec::new(),
            }
        };
        for handler in selected {
            handler(payload.clone()).await;
        }
        Ok(())
    }

    async fn subscribe_raw(
        &self,
        subject: &str,
        queue_group: &str,
        handler: RawHandler,
    ) -> Result<(), BusError> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(BusError::Closed);
        }
        let mut groups = self.groups.lock().expect("groups lock");
        groups
            .entry(subject.to_string())
            .or_default()
            .entry(queue_group.to_string())
            .or_insert_with(|| Group {
                handlers: Vec::new(),
                next: 0,
            })
            .handlers
            .push(handler);
        Ok(())
    }

    async fn close(&self) -> Result<(), BusError> {
        self.closed.store(true, Ordering::SeqCst);
        self.groups.lock().expect("groups lock").clear();
        Ok(())
    }

    fn is_connected(&self) -> bool {
        !self.closed.load(Ordering::SeqCst)
    }
}
