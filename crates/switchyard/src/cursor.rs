//! Consuming view over the request path.
//!
//! The cursor is a single split position into the raw path: everything before
//! it is `consumed`, everything after it is `remaining`. Because both halves
//! are slices of the same string, `consumed + remaining == raw` holds by
//! construction. Matching primitives only ever move the split forward inside
//! a scope (see [`RequestContext::with_consumed`](crate::RequestContext::with_consumed))
//! that puts it back when the nested block returns.

/// Split position over the raw request path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathCursor {
    raw: String,
    pos: usize,
}

/// Opaque snapshot of a cursor position.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CursorMark(usize);

impl PathCursor {
    pub fn new(raw: impl Into<String>) -> Self {
        PathCursor {
            raw: raw.into(),
            pos: 0,
        }
    }

    pub fn raw(&self) -> &str {
        &self.raw
    }

    /// The part of the path matched by enclosing primitives.
    pub fn consumed(&self) -> &str {
        &self.raw[..self.pos]
    }

    /// The part of the path still available to nested primitives.
    pub fn remaining(&self) -> &str {
        &self.raw[self.pos..]
    }

    pub fn is_exhausted(&self) -> bool {
        self.pos == self.raw.len()
    }

    pub fn mark(&self) -> CursorMark {
        CursorMark(self.pos)
    }

    /// Moves `len` bytes of `remaining` onto `consumed`.
    ///
    /// `len` always comes from a match against `remaining`, so it lands on a
    /// char boundary within bounds.
    pub(crate) fn advance(&mut self, len: usize) {
        debug_assert!(self.remaining().is_char_boundary(len));
        self.pos += len;
    }

    pub(crate) fn restore(&mut self, mark: CursorMark) {
        self.pos = mark.0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cursor_split() {
        let mut cursor = PathCursor::new("/foo/bar");
        assert_eq!(cursor.consumed(), "");
        assert_eq!(cursor.remaining(), "/foo/bar");

        let mark = cursor.mark();
        cursor.advance(4);
        assert_eq!(cursor.consumed(), "/foo");
        assert_eq!(cursor.remaining(), "/bar");
        assert_eq!(format!("{}{}", cursor.consumed(), cursor.remaining()), cursor.raw());

        cursor.restore(mark);
        assert_eq!(cursor.remaining(), "/foo/bar");
    }

    #[test]
    fn test_cursor_exhausted() {
        let mut cursor = PathCursor::new("/a");
        assert!(!cursor.is_exhausted());
        cursor.advance(2);
        assert!(cursor.is_exhausted());
        assert_eq!(cursor.remaining(), "");
    }
}
