//! Reference-counted handles.
//!
//! A [`Handle`] wraps one possibly-null address and a reference to the
//! [`Ledger`] that counts it. The handle never stores a count of its own:
//! construction and cloning acquire the address, dropping releases it, and
//! the ledger reclaims the payload when the last handle goes away.
//!
//! Moves are plain Rust moves and touch nothing. [`Handle::take`] is the
//! explicit form that leaves a null handle behind.
//!
//! # Pointer arithmetic
//!
//! [`offset`](Handle::offset), [`advance`](Handle::advance) and friends move
//! a handle by whole elements of `T` and track the resulting address as a
//! separate entry. The ledger keys on the raw address, so if the count on a
//! shifted address reaches zero, that shifted address is what gets reclaimed
//! as a `Box<T>`. These operations are `unsafe` for that reason.

use std::fmt;
use std::marker::PhantomData;
use std::ops::Deref;
use std::ptr::{self, NonNull};

use crate::ledger::Ledger;
use crate::raw;

/// Shared owner of a heap payload, counted in a [`Ledger`].
///
/// `'l` is the lifetime of the ledger borrow. Handles built with
/// [`Handle::new`] use the calling thread's [`Ledger::global`] and are
/// `Handle<'static, T>`.
pub struct Handle<'l, T> {
    ptr: Option<NonNull<T>>,
    ledger: &'l Ledger,
    _owns: PhantomData<T>,
}

impl<T> Handle<'static, T> {
    /// Box `value` and track it in the default ledger.
    pub fn new(value: T) -> Self {
        Self::new_in(value, Ledger::global())
    }

    /// A null handle on the default ledger.
    pub fn null() -> Self {
        Self::null_in(Ledger::global())
    }

    /// Wrap a raw pointer and track it in the default ledger.
    ///
    /// # Safety
    ///
    /// See [`from_raw_in`](Handle::from_raw_in).
    pub unsafe fn from_raw(ptr: *mut T) -> Self {
        // SAFETY: forwarded to the caller.
        unsafe { Self::from_raw_in(ptr, Ledger::global()) }
    }
}

impl<'l, T> Handle<'l, T> {
    /// Box `value` and track it in `ledger`.
    ///
    /// Every call gets its own address, zero-sized payloads included, so
    /// each payload is dropped when its own last handle goes away.
    pub fn new_in(value: T, ledger: &'l Ledger) -> Self {
        let (ptr, reclaim) = raw::allocate(value);
        // SAFETY: a fresh allocation is untracked and `reclaim` is the
        // routine that frees it.
        unsafe { ledger.acquire_with(ptr, reclaim) };
        Self {
            ptr: NonNull::new(ptr),
            ledger,
            _owns: PhantomData,
        }
    }

    /// A null handle on `ledger`.
    pub fn null_in(ledger: &'l Ledger) -> Self {
        Self {
            ptr: None,
            ledger,
            _owns: PhantomData,
        }
    }

    /// Wrap a raw pointer and acquire it in `ledger`.
    ///
    /// Null is accepted and yields a null handle.
    ///
    /// # Safety
    ///
    /// `ptr` must be null, already tracked by `ledger`, or a pointer that
    /// may be reclaimed as a `Box<T>` once its count returns to zero
    /// (typically from `Box::into_raw`). Dereferencing the handle further
    /// requires `ptr` to address a live `T`.
    ///
    /// `Box::into_raw` returns the same dangling address for every
    /// zero-sized value, so such pointers merge into one entry; use
    /// [`new_in`](Self::new_in) for zero-sized payloads.
    pub unsafe fn from_raw_in(ptr: *mut T, ledger: &'l Ledger) -> Self {
        // SAFETY: forwarded to the caller.
        unsafe { ledger.acquire(ptr) };
        Self {
            ptr: NonNull::new(ptr),
            ledger,
            _owns: PhantomData,
        }
    }

    /// Whether the handle holds no address.
    pub fn is_null(&self) -> bool {
        self.ptr.is_none()
    }

    /// The wrapped address, null for a null handle.
    ///
    /// The pointer does not own a count; it is valid only while some handle
    /// keeps the address tracked.
    pub fn as_ptr(&self) -> *mut T {
        self.ptr.map_or(ptr::null_mut(), NonNull::as_ptr)
    }

    /// Borrow the payload, or `None` for a null handle.
    pub fn get(&self) -> Option<&T> {
        // SAFETY: a non-null handle holds a count on its address, which
        // keeps the payload alive for at least as long as `self`.
        self.ptr.map(|ptr| unsafe { ptr.as_ref() })
    }

    /// Live count on this handle's address; 0 when null.
    pub fn ref_count(&self) -> usize {
        self.ledger.count(self.as_ptr())
    }

    /// The ledger this handle accounts in.
    pub fn ledger(&self) -> &'l Ledger {
        self.ledger
    }

    /// Whether both handles wrap the same address.
    pub fn ptr_eq(&self, other: &Handle<'_, T>) -> bool {
        self.ptr == other.ptr
    }

    /// Move ownership out, leaving a null handle behind.
    ///
    /// The ledger count is unchanged; dropping the emptied handle is a
    /// no-op.
    pub fn take(&mut self) -> Self {
        Self {
            ptr: self.ptr.take(),
            ledger: self.ledger,
            _owns: PhantomData,
        }
    }

    /// Rebind to a freshly boxed `value`, releasing the current address.
    pub fn assign(&mut self, value: T) {
        *self = Self::new_in(value, self.ledger);
    }

    /// Rebind to `ptr`, releasing the current address.
    ///
    /// The new address is acquired before the old one is released, so
    /// rebinding to the address already held leaves its count unchanged.
    ///
    /// # Safety
    ///
    /// Same contract as [`from_raw_in`](Self::from_raw_in).
    pub unsafe fn assign_raw(&mut self, ptr: *mut T) {
        // SAFETY: forwarded to the caller.
        unsafe { self.rebind(ptr) }
    }

    /// New handle `count` elements away, tracked independently.
    ///
    /// If the resulting address is already tracked the counts merge;
    /// otherwise it gets a fresh entry of count 1. No bounds are checked.
    ///
    /// # Safety
    ///
    /// The returned handle must either be forgotten or only ever release
    /// its address to zero when that address is a genuine `Box<T>` base,
    /// and it must only be dereferenced while it addresses a live `T`.
    pub unsafe fn offset(&self, count: isize) -> Self {
        // SAFETY: forwarded to the caller.
        unsafe { Self::from_raw_in(raw::shifted(self.as_ptr(), count), self.ledger) }
    }

    /// `offset(count)` in the forward direction.
    ///
    /// # Safety
    ///
    /// See [`offset`](Self::offset).
    pub unsafe fn add(&self, count: usize) -> Self {
        // SAFETY: forwarded to the caller.
        unsafe { Self::from_raw_in(raw::shifted_up(self.as_ptr(), count), self.ledger) }
    }

    /// `offset(-count)`.
    ///
    /// # Safety
    ///
    /// See [`offset`](Self::offset).
    pub unsafe fn sub(&self, count: usize) -> Self {
        // SAFETY: forwarded to the caller.
        unsafe { Self::from_raw_in(raw::shifted_down(self.as_ptr(), count), self.ledger) }
    }

    /// Move this handle `count` elements forward in place.
    ///
    /// Releases the current address and tracks the new one. If this handle
    /// was the last owner, the original payload is reclaimed.
    ///
    /// # Safety
    ///
    /// The handle must be non-null. After the move, the contract of
    /// [`offset`](Self::offset) applies to this handle.
    pub unsafe fn advance(&mut self, count: usize) -> &mut Self {
        let target = raw::shifted_up(self.as_ptr(), count);
        // SAFETY: forwarded to the caller.
        unsafe { self.move_to(target) }
    }

    /// Move this handle `count` elements backward in place.
    ///
    /// # Safety
    ///
    /// See [`advance`](Self::advance).
    pub unsafe fn retreat(&mut self, count: usize) -> &mut Self {
        let target = raw::shifted_down(self.as_ptr(), count);
        // SAFETY: forwarded to the caller.
        unsafe { self.move_to(target) }
    }

    /// Prefix increment: move one element forward and return `self`.
    ///
    /// # Safety
    ///
    /// See [`advance`](Self::advance).
    pub unsafe fn increment(&mut self) -> &mut Self {
        // SAFETY: forwarded to the caller.
        unsafe { self.advance(1) }
    }

    /// Prefix decrement: move one element backward and return `self`.
    ///
    /// # Safety
    ///
    /// See [`advance`](Self::advance).
    pub unsafe fn decrement(&mut self) -> &mut Self {
        // SAFETY: forwarded to the caller.
        unsafe { self.retreat(1) }
    }

    /// Postfix increment: move one element forward and return a handle to
    /// the address held before the move.
    ///
    /// # Safety
    ///
    /// See [`advance`](Self::advance).
    pub unsafe fn post_increment(&mut self) -> Self {
        let prior = self.clone();
        // SAFETY: forwarded to the caller.
        unsafe { self.advance(1) };
        prior
    }

    /// Postfix decrement: move one element backward and return a handle to
    /// the address held before the move.
    ///
    /// # Safety
    ///
    /// See [`advance`](Self::advance).
    pub unsafe fn post_decrement(&mut self) -> Self {
        let prior = self.clone();
        // SAFETY: forwarded to the caller.
        unsafe { self.retreat(1) };
        prior
    }

    /// Rebind in place to `target`, the result of stepping this handle.
    ///
    /// # Safety
    ///
    /// See [`advance`](Self::advance).
    unsafe fn move_to(&mut self, target: *mut T) -> &mut Self {
        debug_assert!(!self.is_null(), "pointer arithmetic on a null Handle");
        // SAFETY: forwarded to the caller.
        unsafe { self.rebind(target) };
        self
    }

    /// Acquire `ptr`, adopt it, then release the previous address.
    ///
    /// # Safety
    ///
    /// Same contract as [`from_raw_in`](Self::from_raw_in).
    unsafe fn rebind(&mut self, ptr: *mut T) {
        // SAFETY: forwarded to the caller.
        unsafe { self.ledger.acquire(ptr) };
        if let Some(old) = std::mem::replace(&mut self.ptr, NonNull::new(ptr)) {
            // SAFETY: this handle owned one count on `old`.
            unsafe { self.ledger.release_owned(old.as_ptr()) };
        }
    }
}

impl<T> Clone for Handle<'_, T> {
    fn clone(&self) -> Self {
        // SAFETY: `self` keeps its address tracked, so this only bumps the
        // existing count.
        unsafe { Self::from_raw_in(self.as_ptr(), self.ledger) }
    }

    fn clone_from(&mut self, source: &Self) {
        if self.ptr_eq(source) && ptr::eq(self.ledger, source.ledger) {
            return;
        }
        *self = source.clone();
    }
}

impl<T> Drop for Handle<'_, T> {
    fn drop(&mut self) {
        if let Some(ptr) = self.ptr.take() {
            // SAFETY: this handle owned one count on `ptr`.
            unsafe { self.ledger.release_owned(ptr.as_ptr()) };
        }
    }
}

impl<T> Deref for Handle<'_, T> {
    type Target = T;

    /// # Panics
    ///
    /// Panics if the handle is null.
    fn deref(&self) -> &T {
        match self.get() {
            Some(value) => value,
            None => panic!("dereferenced a null Handle"),
        }
    }
}

impl<T> Default for Handle<'static, T> {
    fn default() -> Self {
        Self::null()
    }
}

impl<T> fmt::Debug for Handle<'_, T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Handle")
            .field("addr", &self.as_ptr())
            .field("count", &self.ref_count())
            .finish()
    }
}

impl<T> fmt::Pointer for Handle<'_, T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Pointer::fmt(&self.as_ptr(), f)
    }
}
