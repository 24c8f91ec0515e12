//! Argument count checks for script-facing entry points

use crate::error::{BridgeError, Result};
use std::fmt;

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum ArgCount {
    Exact(usize),
    /// Inclusive on both ends.
    Range { from: usize, to: usize },
}

impl ArgCount {
    pub fn accepts(&self, count: usize) -> bool {
        match *self {
            ArgCount::Exact(n) => count == n,
            ArgCount::Range { from, to } => (from..=to).contains(&count),
        }
    }
}

impl fmt::Display for ArgCount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ArgCount::Exact(n) => write!(f, "{n}"),
            ArgCount::Range { from, to } => write!(f, "{from} to {to}"),
        }
    }
}

/// Reject a call whose argument count falls outside `expected`.
pub fn check_arg_count(actual: usize, expected: ArgCount) -> Result<()> {
    if expected.accepts(actual) {
        Ok(())
    } else {
        Err(BridgeError::ArgumentCount { expected, actual })
    }
}
