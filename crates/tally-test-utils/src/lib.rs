//! Test utilities and payload fixtures for tally development.
//!
//! Provides drop-counting payloads ([`DropCounter`], [`Counted`]), a
//! singly linked [`Node`] for chain and cycle scenarios, and
//! [`init_logging`] for surfacing ledger traces in test output.

#![forbid(unsafe_code)]
#![allow(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]

pub mod fixtures;

pub use fixtures::{Counted, DropCounter, Node};

/// Route `log` output through the test harness.
///
/// Safe to call from every test; only the first call installs the logger.
/// Set `RUST_LOG=tally=trace` to see every acquire and release.
pub fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}
