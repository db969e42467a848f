// src/limit.rs
// =============================================================================
// Caps on how much we collect.
//
// Every cap on the command line uses -1 to mean "no limit". Inside the crawler
// we turn that into an enum so nobody has to remember the magic number:
//
//   -1  -> Cap::Unbounded
//   N   -> Cap::AtMost(N)
//
// Whenever a collected sequence could grow past a finite cap, it is cut down
// to exactly the cap, never below it.
// =============================================================================

use std::fmt;
use std::str::FromStr;

use crate::error::CrawlError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Cap {
    Unbounded,
    AtMost(usize),
}

impl Cap {
    // Converts the raw command-line number into a Cap
    //
    // Returns: Err for anything below -1
    pub fn from_raw(raw: i64) -> Result<Self, CrawlError> {
        match raw {
            -1 => Ok(Cap::Unbounded),
            n if n >= 0 => Ok(Cap::AtMost(n as usize)),
            n => Err(CrawlError::Config(format!(
                "cap must be -1 (unbounded) or a non-negative number, got {}",
                n
            ))),
        }
    }

    /// True once `count` items have used up the whole cap
    pub fn is_reached(&self, count: usize) -> bool {
        match self {
            Cap::Unbounded => false,
            Cap::AtMost(max) => count >= *max,
        }
    }

    /// How many more items fit after `count` (None = unlimited)
    pub fn remaining(&self, count: usize) -> Option<usize> {
        match self {
            Cap::Unbounded => None,
            Cap::AtMost(max) => Some(max.saturating_sub(count)),
        }
    }

    // Cuts `items` down to the cap. A no-op when already within it.
    pub fn truncate<T>(&self, items: &mut Vec<T>) {
        self.truncate_after(0, items);
    }

    // Cuts `items` so that `already + items.len()` stays within the cap.
    //
    // Example:
    //   cap = 10, already = 8, items = [a, b, c]  ->  items = [a, b]
    pub fn truncate_after<T>(&self, already: usize, items: &mut Vec<T>) {
        if let Some(room) = self.remaining(already) {
            items.truncate(room);
        }
    }
}

impl FromStr for Cap {
    type Err = CrawlError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let raw: i64 = s
            .trim()
            .parse()
            .map_err(|_| CrawlError::Config(format!("'{}' is not a number", s)))?;
        Cap::from_raw(raw)
    }
}

impl fmt::Display for Cap {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Cap::Unbounded => write!(f, "unbounded"),
            Cap::AtMost(n) => write!(f, "{}", n),
        }
    }
}
