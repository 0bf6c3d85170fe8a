//! Positions
//!
//! Line/column coordinates shared by original scopes and generated ranges.
//! All coordinates are zero-based.

use std::cmp::Ordering;
use std::fmt;

use serde::{Deserialize, Serialize};

/// A zero-based line/column position.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Position {
    pub line: u32,
    pub column: u32,
}

impl Position {
    pub fn new(line: u32, column: u32) -> Self {
        Position { line, column }
    }
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.line, self.column)
    }
}

/// A position in an authored source, qualified by the source's index into
/// the map's `sources` array.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OriginalPosition {
    pub source_index: u32,
    pub line: u32,
    pub column: u32,
}

impl OriginalPosition {
    pub fn new(source_index: u32, line: u32, column: u32) -> Self {
        OriginalPosition {
            source_index,
            line,
            column,
        }
    }
}

/// Compare two positions, line first, then column.
pub fn compare_positions(a: &Position, b: &Position) -> Ordering {
    match a.line.cmp(&b.line) {
        Ordering::Equal => a.column.cmp(&b.column),
        other => other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn should_order_by_line_first() {
        let a = Position::new(1, 99);
        let b = Position::new(2, 0);
        assert_eq!(compare_positions(&a, &b), Ordering::Less);
        assert_eq!(compare_positions(&b, &a), Ordering::Greater);
    }

    #[test]
    fn should_order_by_column_within_a_line() {
        let a = Position::new(3, 4);
        let b = Position::new(3, 10);
        assert_eq!(compare_positions(&a, &b), Ordering::Less);
        assert_eq!(compare_positions(&a, &a), Ordering::Equal);
    }
}
