//! One-shot promise slots.
//!
//! A slot belongs to exactly one task (the resource that declared the
//! promise property) and moves through exactly one transition:
//! `Pending → Resolved(value)`, written by the owning task while it runs.
//! Consumers suspend on the slot until it resolves. If the owner reaches a
//! terminal state without writing — or the deploy is cancelled — the slot
//! is sealed and every waiter gets the corresponding error.
//!
//! The deployer is a single-threaded cooperative scheduler, so slot state
//! lives in a `RefCell`; wakeups go through [`tokio::sync::Notify`].

use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

use eiko_compile::Value;
use tokio::sync::Notify;

/// Why a slot was sealed without a value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SealReason {
    /// The owning task finished (or failed, or was skipped) without
    /// resolving the slot.
    Unresolved,
    /// The deploy was cancelled before the owner could resolve it.
    Cancelled,
}

enum SlotState {
    Pending,
    Resolved(Value),
    Sealed(SealReason),
}

pub struct PromiseSlot {
    state: RefCell<SlotState>,
    notify: Notify,
}

impl PromiseSlot {
    fn new() -> Self {
        Self { state: RefCell::new(SlotState::Pending), notify: Notify::new() }
    }

    /// Writes the value. Errors if the slot already holds one — resolution
    /// happens exactly once.
    pub fn resolve(&self, value: Value) -> Result<(), ()> {
        let mut state = self.state.borrow_mut();
        match &*state {
            SlotState::Pending => {
                *state = SlotState::Resolved(value);
                drop(state);
                self.notify.notify_waiters();
                Ok(())
            }
            _ => Err(()),
        }
    }

    fn seal(&self, reason: SealReason) {
        let mut state = self.state.borrow_mut();
        if matches!(&*state, SlotState::Pending) {
            *state = SlotState::Sealed(reason);
            drop(state);
            self.notify.notify_waiters();
        }
    }

    /// Suspends until the slot resolves or is sealed.
    pub async fn wait(&self) -> Result<Value, SealReason> {
        loop {
            // Register interest before the second check so a resolution
            // between check and await cannot be missed.
            let notified = self.notify.notified();
            match &*self.state.borrow() {
                SlotState::Resolved(value) => return Ok(value.clone()),
                SlotState::Sealed(reason) => return Err(*reason),
                SlotState::Pending => {}
            }
            notified.await;
        }
    }

    /// Non-blocking peek used by reports.
    pub fn value(&self) -> Option<Value> {
        match &*self.state.borrow() {
            SlotState::Resolved(value) => Some(value.clone()),
            _ => None,
        }
    }
}

/// All slots of one deploy, keyed by `(owner index, property)`. Slots are
/// created lazily on first touch from either side.
#[derive(Default)]
pub struct PromiseStore {
    slots: RefCell<HashMap<(String, String), Rc<PromiseSlot>>>,
}

impl PromiseStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn slot(&self, owner_index: &str, property: &str) -> Rc<PromiseSlot> {
        self.slots
            .borrow_mut()
            .entry((owner_index.to_string(), property.to_string()))
            .or_insert_with(|| Rc::new(PromiseSlot::new()))
            .clone()
    }

    /// Seals every still-pending slot owned by `owner_index`; called when
    /// the owning task reaches a terminal state.
    pub fn seal_owner(&self, owner_index: &str, reason: SealReason) {
        for ((owner, _), slot) in self.slots.borrow().iter() {
            if owner == owner_index {
                slot.seal(reason);
            }
        }
    }

    /// Seals everything; used on cancellation.
    pub fn seal_all(&self, reason: SealReason) {
        for slot in self.slots.borrow().values() {
            slot.seal(reason);
        }
    }
}
