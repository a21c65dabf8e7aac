//! Ledger error types.

use std::error::Error;
use std::fmt;

/// Errors reported by [`Ledger::release`](crate::Ledger::release).
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum LedgerError {
    /// The released address has no entry: it was never acquired, or every
    /// count it was acquired for has already been released.
    Untracked {
        /// The numeric address passed to `release`.
        addr: usize,
    },
}

impl fmt::Display for LedgerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Untracked { addr } => {
                write!(f, "release of untracked address {addr:#x}")
            }
        }
    }
}

impl Error for LedgerError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn untracked_display_is_hex() {
        let err = LedgerError::Untracked { addr: 0x1000 };
        assert_eq!(err.to_string(), "release of untracked address 0x1000");
    }
}
