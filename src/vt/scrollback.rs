//! Bounded scrollback storage (§3 `ScrollbackBuffer`/`ScrollbackLine`).

use std::collections::VecDeque;
use std::sync::RwLock;

use super::emulator::Glyph;

/// Default capacity (§3: "default 10,000 lines").
pub const DEFAULT_CAPACITY: usize = 10_000;

/// One immutable row that has scrolled out of the live view.
#[derive(Debug, Clone)]
pub struct ScrollbackLine {
    pub cells: Vec<Glyph>,
}

impl ScrollbackLine {
    pub fn new(cells: Vec<Glyph>) -> Self {
        Self { cells }
    }
}

/// A bounded circular buffer of [`ScrollbackLine`]s. `push` evicts the
/// oldest line once `capacity` is reached. Read and write access are
/// serialized against each other via an internal `RwLock` (§3 invariant:
/// "must serialize concurrent push against concurrent get/count").
#[derive(Debug)]
pub struct ScrollbackBuffer {
    capacity: usize,
    lines: RwLock<VecDeque<ScrollbackLine>>,
}

impl ScrollbackBuffer {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            lines: RwLock::new(VecDeque::with_capacity(capacity.min(4096))),
        }
    }

    /// Push a new line, oldest-first order preserved; evicts the oldest
    /// line if this push would exceed `capacity`.
    pub fn push(&self, line: ScrollbackLine) {
        let mut lines = self.lines.write().expect("scrollback lock poisoned");
        if lines.len() >= self.capacity {
            lines.pop_front();
        }
        lines.push_back(line);
    }

    /// Logical index 0 = oldest retained line; `count()-1` = newest.
    pub fn get(&self, index: usize) -> Option<ScrollbackLine> {
        let lines = self.lines.read().expect("scrollback lock poisoned");
        lines.get(index).cloned()
    }

    pub fn count(&self) -> usize {
        self.lines.read().expect("scrollback lock poisoned").len()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn clear(&self) {
        self.lines.write().expect("scrollback lock poisoned").clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn line(c: char) -> ScrollbackLine {
        ScrollbackLine::new(vec![Glyph {
            c,
            fg: alacritty_terminal::vte::ansi::Color::Named(
                alacritty_terminal::vte::ansi::NamedColor::Foreground,
            ),
            bg: alacritty_terminal::vte::ansi::Color::Named(
                alacritty_terminal::vte::ansi::NamedColor::Background,
            ),
            bold: false,
            dim: false,
            underline: false,
            reverse: false,
            blink: false,
        }])
    }

    #[test]
    fn push_and_get_preserve_order() {
        let buf = ScrollbackBuffer::new(10);
        buf.push(line('a'));
        buf.push(line('b'));
        assert_eq!(buf.count(), 2);
        assert_eq!(buf.get(0).unwrap().cells[0].c, 'a');
        assert_eq!(buf.get(1).unwrap().cells[0].c, 'b');
    }

    #[test]
    fn eviction_at_capacity() {
        let buf = ScrollbackBuffer::new(2);
        buf.push(line('a'));
        buf.push(line('b'));
        buf.push(line('c'));
        assert_eq!(buf.count(), 2);
        assert_eq!(buf.get(0).unwrap().cells[0].c, 'b');
        assert_eq!(buf.get(1).unwrap().cells[0].c, 'c');
    }

    #[test]
    fn clear_empties_buffer() {
        let buf = ScrollbackBuffer::new(10);
        buf.push(line('a'));
        buf.clear();
        assert_eq!(buf.count(), 0);
    }

    #[test]
    fn get_out_of_range_is_none() {
        let buf = ScrollbackBuffer::new(10);
        assert!(buf.get(0).is_none());
    }
}
