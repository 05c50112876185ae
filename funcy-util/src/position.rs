//! Source location tracking.
//!
//! A [`Position`] is a `(module, byte-offset, line, column)` tuple; a
//! [`Span`] is an ordered pair of positions. Both are small value types —
//! copied by every node and token that needs one, never shared by
//! reference — so that spans can be widened, reset, or snapshotted without
//! any aliasing concerns.
//!
//! # Examples
//!
//! ```
//! use funcy_util::Position;
//!
//! let mut pos = Position::new("main");
//! pos.advance("ab\tc");
//! assert_eq!((pos.line, pos.column), (1, 6));
//! ```

use std::fmt;
use std::rc::Rc;

/// Number of columns a tab character advances to the next stop.
pub const TAB_SIZE: u32 = 4;

/// A position in a module's source text.
///
/// `offset` is a byte offset into the module's source, monotonically
/// non-decreasing as [`Position::advance`] is called. `line` and `column`
/// are 1-indexed, matching the convention most editors use for diagnostics.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Position {
    /// The name of the module this position belongs to.
    pub module: Rc<str>,
    /// Byte offset into the module's source. Negative offsets are reserved
    /// for the "unlocated" sentinel used by [`crate::Log`].
    pub offset: i64,
    /// 1-indexed line number.
    pub line: u32,
    /// 1-indexed column number.
    pub column: u32,
}

impl Position {
    /// Create a position at the start of `module`'s source (offset 0, line
    /// 1, column 1).
    pub fn new(module: impl Into<Rc<str>>) -> Self {
        Self {
            module: module.into(),
            offset: 0,
            line: 1,
            column: 1,
        }
    }

    /// Create the "unlocated" sentinel position used by diagnostics that
    /// have no specific span (offset is negative).
    pub fn unlocated(module: impl Into<Rc<str>>) -> Self {
        Self {
            module: module.into(),
            offset: -1,
            line: 1,
            column: 1,
        }
    }

    /// Advance this position by a run of text, applying the tab/newline/
    /// carriage-return rules character by character.
    ///
    /// - `\t` advances the column to the next multiple of [`TAB_SIZE`].
    /// - `\n` resets the column to 1 and increments the line.
    /// - `\r` resets the column to 1 (without touching the line, so that a
    ///   `\r\n` pair ends up on the next line at column 1).
    /// - every other character advances the column by one.
    ///
    /// The offset advances by one for every character regardless of kind.
    pub fn advance(&mut self, text: &str) {
        for ch in text.chars() {
            self.offset += 1;

            match ch {
                '\t' => self.column += TAB_SIZE - (self.column - 1) % TAB_SIZE,
                '\n' => {
                    self.column = 1;
                    self.line += 1;
                }
                '\r' => self.column = 1,
                _ => self.column += 1,
            }
        }
    }
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.line, self.column)
    }
}

/// A span between two [`Position`]s, `start ..= end`, within a single
/// module.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Span {
    pub start: Position,
    pub end: Position,
}

impl Span {
    /// Create a zero-length span at the start of `module`.
    pub fn new(module: impl Into<Rc<str>>) -> Self {
        let module = module.into();
        Self {
            start: Position::new(Rc::clone(&module)),
            end: Position::new(module),
        }
    }

    /// Create the unlocated sentinel span used when a diagnostic has no
    /// specific source location.
    pub fn unlocated(module: impl Into<Rc<str>>) -> Self {
        let module = module.into();
        Self {
            start: Position::unlocated(Rc::clone(&module)),
            end: Position::unlocated(module),
        }
    }

    /// Number of bytes covered by this span.
    pub fn len(&self) -> i64 {
        self.end.offset - self.start.offset
    }

    /// Whether this span covers zero bytes.
    pub fn is_empty(&self) -> bool {
        self.len() <= 0
    }

    /// Move `start` to the current `end`, beginning a fresh span from here.
    /// Used by the parser's span-stack discipline: `begin()` at the top of
    /// a production, `end()` closes it back into a node's span.
    pub fn begin(&mut self) {
        self.start = self.end.clone();
    }

    /// Advance `end` by a run of text (see [`Position::advance`]).
    pub fn advance(&mut self, text: &str) {
        self.end.advance(text);
    }

    /// Widen this span to cover `other` as well, taking the earliest start
    /// and the latest end of the two.
    pub fn include(&self, other: &Span) -> Span {
        let start = if self.start.offset <= other.start.offset {
            self.start.clone()
        } else {
            other.start.clone()
        };
        let end = if self.end.offset >= other.end.offset {
            self.end.clone()
        } else {
            other.end.clone()
        };
        Span { start, end }
    }
}

impl fmt::Display for Span {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.len() <= 1 {
            write!(f, "{}", self.start)
        } else if self.start.line == self.end.line {
            write!(f, "{}-{}", self.start, self.end.column)
        } else {
            write!(f, "{} - {}", self.start, self.end)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tab_advances_to_next_stop() {
        let mut pos = Position::new("m");
        pos.advance("a\tb");
        // 'a' -> col 2; '\t' from col 2 -> col 5; 'b' -> col 6
        assert_eq!(pos.column, 6);
        assert_eq!(pos.offset, 3);
    }

    #[test]
    fn newline_resets_column_and_bumps_line() {
        let mut pos = Position::new("m");
        pos.advance("ab\ncd");
        assert_eq!(pos.line, 2);
        assert_eq!(pos.column, 3);
    }

    #[test]
    fn crlf_ends_up_at_column_one_next_line() {
        let mut pos = Position::new("m");
        pos.advance("a\r\n");
        assert_eq!((pos.line, pos.column), (2, 1));
    }

    #[test]
    fn span_include_widens_to_union() {
        let mut a = Span::new("m");
        a.advance("abc");
        let mut b = Span::new("m");
        b.end.advance("xy");
        b.begin();
        b.end.advance("z");

        let widened = a.include(&b);
        assert_eq!(widened.start.offset, 0);
        assert!(widened.end.offset >= a.end.offset);
    }

    #[test]
    fn begin_moves_start_to_end() {
        let mut span = Span::new("m");
        span.advance("abc");
        span.begin();
        assert_eq!(span.start.offset, span.end.offset);
    }
}
