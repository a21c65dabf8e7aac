//! Reusable payload fixtures.
//!
//! - [`DropCounter`] / [`Counted`]: payloads that record how often they were
//!   dropped, for exactly-once reclamation checks.
//! - [`Node`]: a linked node whose successor is a [`Handle`], for chain
//!   teardown and reference-cycle scenarios.

use std::cell::{Cell, RefCell};
use std::ops::Deref;
use std::rc::Rc;

use tally::{Handle, Ledger};

/// Shared tally of payload drops.
///
/// Clones share the same count.
#[derive(Clone, Debug, Default)]
pub struct DropCounter {
    drops: Rc<Cell<usize>>,
}

impl DropCounter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Wrap `value` so that dropping it bumps this counter.
    pub fn track<T>(&self, value: T) -> Counted<T> {
        Counted {
            value,
            counter: self.clone(),
        }
    }

    /// Number of tracked payloads dropped so far.
    pub fn drops(&self) -> usize {
        self.drops.get()
    }
}

/// A payload that reports its drop to a [`DropCounter`].
#[derive(Debug)]
pub struct Counted<T> {
    value: T,
    counter: DropCounter,
}

impl<T> Counted<T> {
    pub fn value(&self) -> &T {
        &self.value
    }
}

impl<T> Deref for Counted<T> {
    type Target = T;

    fn deref(&self) -> &T {
        &self.value
    }
}

impl<T> Drop for Counted<T> {
    fn drop(&mut self) {
        let drops = &self.counter.drops;
        drops.set(drops.get() + 1);
    }
}

/// Singly linked node. The successor is a shared [`Handle`], so nodes can
/// form chains, shared tails, or cycles.
pub struct Node<'l> {
    label: Counted<&'static str>,
    next: RefCell<Handle<'l, Node<'l>>>,
}

impl<'l> Node<'l> {
    /// Allocate an unlinked node in `ledger`, reporting its drop to `counter`.
    pub fn new_in(
        label: &'static str,
        counter: &DropCounter,
        ledger: &'l Ledger,
    ) -> Handle<'l, Self> {
        Handle::new_in(
            Self {
                label: counter.track(label),
                next: RefCell::new(Handle::null_in(ledger)),
            },
            ledger,
        )
    }

    pub fn label(&self) -> &'static str {
        *self.label.value()
    }

    /// Point this node at `next` (copy-assignment of the successor handle).
    pub fn link(&self, next: &Handle<'l, Node<'l>>) {
        self.next.borrow_mut().clone_from(next);
    }

    /// Drop this node's successor handle.
    pub fn unlink(&self) {
        let old = self.next.borrow_mut().take();
        drop(old);
    }

    /// A new handle to the successor; null if unlinked.
    pub fn next(&self) -> Handle<'l, Node<'l>> {
        self.next.borrow().clone()
    }
}
