//! Source text positions and ranges
//!
//! Positions are 0-indexed line/column pairs. Ranges use inclusive end
//! positions: a one-character token at the start of a file covers
//! `(0,0)..(0,0)`.

use serde::{Deserialize, Serialize};

/// Largest representable line or column index.
///
/// Source files beyond ~32,767 lines or columns are not supported; the
/// scanner saturates rather than wrapping.
pub const MAX_LINE: u32 = 0x7FFF;

/// A 0-indexed line/column position in source text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize, Default)]
pub struct TextPosition {
    pub line: u32,
    pub column: u32,
}

impl TextPosition {
    pub fn new(line: u32, column: u32) -> Self {
        Self {
            line: line.min(MAX_LINE),
            column: column.min(MAX_LINE),
        }
    }
}

/// A source range with inclusive end position.
///
/// Invariant: `start <= end`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct TextRange {
    pub start: TextPosition,
    pub end: TextPosition,
}

impl TextRange {
    pub fn new(start: TextPosition, end: TextPosition) -> Self {
        debug_assert!(start <= end, "range start must not exceed end");
        Self { start, end }
    }

    /// Whether `position` lies within this range (end inclusive).
    pub fn contains(&self, position: TextPosition) -> bool {
        self.start <= position && position <= self.end
    }

    /// The smallest range covering both `self` and `other`.
    pub fn union(&self, other: &TextRange) -> TextRange {
        TextRange {
            start: self.start.min(other.start),
            end: self.end.max(other.end),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn range(l1: u32, c1: u32, l2: u32, c2: u32) -> TextRange {
        TextRange::new(TextPosition::new(l1, c1), TextPosition::new(l2, c2))
    }

    #[test]
    fn contains_is_end_inclusive() {
        let r = range(0, 2, 0, 5);
        assert!(r.contains(TextPosition::new(0, 2)));
        assert!(r.contains(TextPosition::new(0, 5)));
        assert!(!r.contains(TextPosition::new(0, 6)));
        assert!(!r.contains(TextPosition::new(1, 3)));
    }

    #[test]
    fn union_covers_both_ranges() {
        let merged = range(1, 4, 1, 9).union(&range(0, 7, 1, 2));
        assert_eq!(merged, range(0, 7, 1, 9));
    }

    #[test]
    fn positions_saturate_at_the_documented_limit() {
        let p = TextPosition::new(40_000, 40_000);
        assert_eq!(p.line, MAX_LINE);
        assert_eq!(p.column, MAX_LINE);
    }
}
