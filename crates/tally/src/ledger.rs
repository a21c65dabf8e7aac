//! The ownership ledger: an address-keyed table of live reference counts.
//!
//! A [`Ledger`] maps every tracked address to the number of live handles
//! holding it. All handles of all payload types share one table; an entry is
//! created by the first [`acquire`](Ledger::acquire) of an address and
//! removed, with the payload reclaimed, by the [`release`](Ledger::release)
//! that takes its count from 1 to 0.
//!
//! Ledgers are single-threaded. The interior `RefCell` makes a ledger
//! `!Sync`, so a `&Ledger` (and every handle borrowing one) stays on the
//! thread that created it.

use std::cell::RefCell;
use std::fmt;
use std::ptr::NonNull;

use indexmap::map::Entry;
use indexmap::IndexMap;
use log::{debug, trace, warn};

use crate::config::{LedgerConfig, ReleasePolicy};
use crate::error::LedgerError;
use crate::raw::{self, Reclaim};

thread_local! {
    static DEFAULT_LEDGER: &'static Ledger = Box::leak(Box::new(Ledger::new()));
}

/// One tracked address.
struct Record {
    /// Live handles holding the address. Always at least 1.
    count: usize,
    /// Pointer passed to the acquire that created the entry.
    base: NonNull<u8>,
    /// Destructor for the payload type that created the entry.
    reclaim: Reclaim,
}

/// Running counters for a ledger. Null addresses are never counted.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct LedgerStats {
    /// Successful acquires.
    pub acquires: u64,
    /// Releases of tracked addresses.
    pub releases: u64,
    /// Payloads reclaimed because their count reached zero.
    pub reclaims: u64,
    /// Releases rejected because the address had no entry.
    pub untracked_releases: u64,
    /// Largest number of simultaneous entries seen.
    pub peak_entries: usize,
}

/// Outcome of a successful [`Ledger::release`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Released {
    /// The address was null; nothing happened.
    Null,
    /// The count dropped but other owners remain.
    Shared {
        /// Count left on the address.
        remaining: usize,
    },
    /// The last count went away: the entry is gone and the payload dropped.
    Reclaimed,
}

struct Book {
    entries: IndexMap<usize, Record>,
    stats: LedgerStats,
}

/// Side table of reference counts, keyed by raw address.
pub struct Ledger {
    book: RefCell<Book>,
    config: LedgerConfig,
}

impl Ledger {
    /// Create an empty ledger with the default configuration.
    pub fn new() -> Self {
        Self::with_config(LedgerConfig::new())
    }

    /// Create an empty ledger with the given configuration.
    pub fn with_config(config: LedgerConfig) -> Self {
        Self {
            book: RefCell::new(Book {
                entries: IndexMap::with_capacity(config.initial_capacity),
                stats: LedgerStats::default(),
            }),
            config,
        }
    }

    /// The calling thread's default ledger.
    ///
    /// Created empty on first use and never torn down. Handles built with
    /// [`Handle::new`](crate::Handle::new) and friends account here.
    pub fn global() -> &'static Ledger {
        DEFAULT_LEDGER.with(|ledger| *ledger)
    }

    /// The configuration this ledger was built with.
    pub fn config(&self) -> &LedgerConfig {
        &self.config
    }

    /// Register one more owner of `ptr` and return its new count.
    ///
    /// A null pointer is ignored and yields 0. An untracked address gets a
    /// fresh entry with count 1; a tracked one has its count bumped and
    /// keeps the reclaim routine of whoever created the entry.
    ///
    /// # Safety
    ///
    /// If `ptr` is not already tracked, it must be valid to reclaim as a
    /// `Box<T>` (drop the payload, free the allocation) once its count
    /// returns to zero. Pointers from `Box::into_raw` qualify.
    pub unsafe fn acquire<T>(&self, ptr: *mut T) -> usize {
        // SAFETY: forwarded to the caller.
        unsafe { self.acquire_with(ptr, raw::reclaim_box::<T>) }
    }

    /// [`acquire`](Self::acquire) with an explicit reclaim routine for a
    /// fresh entry.
    ///
    /// # Safety
    ///
    /// If `ptr` is not already tracked, `reclaim` applied to it must be
    /// sound once its count returns to zero.
    pub(crate) unsafe fn acquire_with<T>(&self, ptr: *mut T, reclaim: Reclaim) -> usize {
        let Some(base) = NonNull::new(ptr.cast::<u8>()) else {
            return 0;
        };
        let addr = ptr.addr();

        let mut guard = self.book.borrow_mut();
        let book = &mut *guard;
        book.stats.acquires += 1;
        let count = match book.entries.entry(addr) {
            Entry::Occupied(mut slot) => {
                let record = slot.get_mut();
                record.count += 1;
                record.count
            }
            Entry::Vacant(slot) => {
                slot.insert(Record {
                    count: 1,
                    base,
                    reclaim,
                });
                1
            }
        };
        book.stats.peak_entries = book.stats.peak_entries.max(book.entries.len());
        trace!("acquire {addr:#x} -> {count}");
        count
    }

    /// Drop one owner of `ptr`, reclaiming the payload when none remain.
    ///
    /// The table is unlocked before the payload's destructor runs, so a
    /// payload that owns handles of its own may release them re-entrantly.
    ///
    /// # Errors
    ///
    /// [`LedgerError::Untracked`] if `ptr` is non-null and has no entry.
    /// The ledger and memory are left untouched in that case.
    ///
    /// # Safety
    ///
    /// The caller must own one of the counts on `ptr`. Releasing a count
    /// that another owner still relies on frees the payload under it.
    pub unsafe fn release<T>(&self, ptr: *const T) -> Result<Released, LedgerError> {
        if ptr.is_null() {
            return Ok(Released::Null);
        }
        let addr = ptr.addr();

        let retired = {
            let mut guard = self.book.borrow_mut();
            let book = &mut *guard;
            let Some(record) = book.entries.get_mut(&addr) else {
                book.stats.untracked_releases += 1;
                return Err(LedgerError::Untracked { addr });
            };
            book.stats.releases += 1;
            record.count -= 1;
            if record.count > 0 {
                trace!("release {addr:#x} -> {}", record.count);
                return Ok(Released::Shared {
                    remaining: record.count,
                });
            }
            book.stats.reclaims += 1;
            book.entries.swap_remove(&addr)
        };

        if let Some(record) = retired {
            debug!("reclaim {addr:#x}");
            // SAFETY: the entry was created by `acquire::<U>` with a pointer
            // its caller vouched for as a `Box<U>` base, and the count that
            // kept it alive is gone.
            unsafe { (record.reclaim)(record.base) };
        }
        Ok(Released::Reclaimed)
    }

    /// Release on behalf of a handle, applying the configured
    /// [`ReleasePolicy`] to untracked addresses.
    ///
    /// # Safety
    ///
    /// Same as [`release`](Self::release).
    pub(crate) unsafe fn release_owned<T>(&self, ptr: *const T) {
        // SAFETY: forwarded to the caller.
        if let Err(err) = unsafe { self.release(ptr) } {
            match self.config.release_policy {
                ReleasePolicy::Warn => warn!("{err}"),
                ReleasePolicy::Panic => panic!("{err}"),
            }
        }
    }

    /// Live count on `ptr`, or 0 if it is null or untracked.
    pub fn count<T>(&self, ptr: *const T) -> usize {
        if ptr.is_null() {
            return 0;
        }
        self.book
            .borrow()
            .entries
            .get(&ptr.addr())
            .map_or(0, |record| record.count)
    }

    /// Whether `ptr` currently has an entry.
    pub fn is_tracked<T>(&self, ptr: *const T) -> bool {
        self.count(ptr) > 0
    }

    /// Number of tracked addresses.
    pub fn len(&self) -> usize {
        self.book.borrow().entries.len()
    }

    /// Whether no address is tracked.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Snapshot of `(address, count)` pairs.
    ///
    /// Order follows entry creation, except that removals swap the last
    /// entry into the vacated position.
    pub fn entries(&self) -> Vec<(usize, usize)> {
        self.book
            .borrow()
            .entries
            .iter()
            .map(|(&addr, record)| (addr, record.count))
            .collect()
    }

    /// Current counters.
    pub fn stats(&self) -> LedgerStats {
        self.book.borrow().stats
    }
}

impl Default for Ledger {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Ledger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut out = f.debug_struct("Ledger");
        match self.book.try_borrow() {
            Ok(book) => out
                .field("entries", &book.entries.len())
                .field("stats", &book.stats),
            Err(_) => out.field("entries", &"<borrowed>"),
        };
        out.field("config", &self.config).finish()
    }
}
