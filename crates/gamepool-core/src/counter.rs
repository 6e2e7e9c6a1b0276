//! Cursor positions.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Consumption direction of a cursor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    /// Oldest rows first; position only grows.
    Asc,
    /// Newest rows first; position only shrinks and stops at zero.
    Desc,
}

impl Direction {
    /// Pick a direction from the wire `is_desc` flag.
    #[must_use]
    pub const fn from_is_desc(is_desc: bool) -> Self {
        if is_desc {
            Self::Desc
        } else {
            Self::Asc
        }
    }

    /// Short lowercase label used in lock keys and logs.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Asc => "asc",
            Self::Desc => "desc",
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Persisted cursor positions of one game.
///
/// `asc` is the id of the last row served ascending. `desc` is the highest id
/// not yet served descending, `None` until first initialised.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Counter {
    /// Ascending position.
    pub asc: i64,
    /// Descending position, unset until first use.
    pub desc: Option<i64>,
}

impl Counter {
    /// Position for `direction`, if set.
    #[must_use]
    pub const fn position(&self, direction: Direction) -> Option<i64> {
        match direction {
            Direction::Asc => Some(self.asc),
            Direction::Desc => self.desc,
        }
    }
}

/// Whether moving from `old` to `new` crosses a multiple of `every`.
///
/// Used to decide when an in-memory position is written back. A step that
/// jumps over a multiple still counts, which `new % every == 0` would miss.
#[must_use]
pub fn crosses_multiple(old: i64, new: i64, every: i64) -> bool {
    if every <= 1 {
        return old != new;
    }
    old.div_euclid(every) != new.div_euclid(every)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn crossing_detects_jumps() {
        assert!(!crosses_multiple(0, 199, 200));
        assert!(crosses_multiple(199, 200, 200));
        assert!(crosses_multiple(190, 210, 200));
        assert!(crosses_multiple(201, 199, 200));
        assert!(!crosses_multiple(399, 201, 200));
        assert!(!crosses_multiple(250, 210, 200));
    }

    #[test]
    fn every_one_persists_each_step() {
        assert!(crosses_multiple(4, 5, 1));
        assert!(!crosses_multiple(4, 4, 1));
    }

    #[test]
    fn direction_labels() {
        assert_eq!(Direction::from_is_desc(true), Direction::Desc);
        assert_eq!(Direction::Asc.to_string(), "asc");
        assert_eq!(
            Counter { asc: 3, desc: None }.position(Direction::Desc),
            None
        );
    }
}
