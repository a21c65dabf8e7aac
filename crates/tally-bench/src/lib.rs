//! Benchmark workloads for the tally ownership ledger.
//!
//! - [`fan_out`]: few payloads, many handles per payload (count churn).
//! - [`distinct`]: many payloads, one handle each (entry churn).

#![forbid(unsafe_code)]
#![deny(rustdoc::broken_intra_doc_links)]

use tally::{Handle, Ledger};

/// `payloads` boxed words, each shared by `copies` handles.
pub fn fan_out(ledger: &Ledger, payloads: usize, copies: usize) -> Vec<Handle<'_, u64>> {
    let mut handles = Vec::with_capacity(payloads * copies);
    for i in 0..payloads {
        let first = Handle::new_in(i as u64, ledger);
        handles.extend((1..copies).map(|_| first.clone()));
        handles.push(first);
    }
    handles
}

/// `count` boxed words, one handle each.
pub fn distinct(ledger: &Ledger, count: usize) -> Vec<Handle<'_, u64>> {
    (0..count as u64)
        .map(|i| Handle::new_in(i, ledger))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fan_out_shares_counts() {
        let ledger = Ledger::new();
        let handles = fan_out(&ledger, 4, 8);
        assert_eq!(handles.len(), 32);
        assert_eq!(ledger.len(), 4);
        assert!(handles.iter().all(|h| h.ref_count() == 8));
        drop(handles);
        assert!(ledger.is_empty());
    }

    #[test]
    fn distinct_tracks_one_entry_each() {
        let ledger = Ledger::new();
        let handles = distinct(&ledger, 16);
        assert_eq!(ledger.len(), 16);
        drop(handles);
        assert_eq!(ledger.stats().reclaims, 16);
    }
}
