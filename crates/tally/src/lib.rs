//! Reference-counted handles backed by an address-keyed ownership ledger.
//!
//! Client code shares ownership of heap payloads through [`Handle`]s. The
//! handles hold no counts themselves: every copy, drop, reassignment and
//! pointer-arithmetic step goes through the two [`Ledger`] primitives,
//! `acquire` and `release`, and the ledger reclaims a payload when the last
//! handle holding its address goes away.
//!
//! # Architecture
//!
//! ```text
//! Handle<'l, T> ──acquire/release──▶ Ledger
//!   (address + &'l Ledger)             └── IndexMap<address, Record>
//!                                            ├── count (live handles)
//!                                            ├── base pointer
//!                                            └── reclaim: unsafe fn (Box<T> drop)
//! ```
//!
//! One ledger serves every payload type. Each thread has a default ledger
//! ([`Ledger::global`]); independent ledgers can be created and passed to
//! the `*_in` constructors.
//!
//! # Limitations
//!
//! - Pure reference counting: payloads that reference each other in a cycle
//!   are never reclaimed. Their entries stay visible in
//!   [`Ledger::entries`].
//! - Single-threaded: neither ledgers nor handles are `Send` or `Sync`.
//! - Pointer arithmetic is unchecked and tracks shifted addresses as
//!   separate entries. See the [`handle`] module docs.

#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]
#![deny(unsafe_op_in_unsafe_fn)]

pub mod config;
pub mod error;
pub mod handle;
pub mod ledger;
mod raw;

// Public re-exports for the primary API surface.
pub use config::{LedgerConfig, ReleasePolicy};
pub use error::LedgerError;
pub use handle::Handle;
pub use ledger::{Ledger, LedgerStats, Released};
