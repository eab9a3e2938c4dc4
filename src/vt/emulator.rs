//! Thin facade over [`alacritty_terminal`], hiding `Term`/`Processor` behind
//! exactly the surface the VT Panel needs: `write`, `resize`, `cell`,
//! `cursor`, `cursor_visible` (§4.1.10).
//!
//! Grounded directly on the donor's `AlacrittyParser` (`terminal.rs`), which
//! wraps the same two donor types behind a near-identical small API.

use std::io::Write;
use std::sync::{Arc, Mutex};

use alacritty_terminal::event::{Event, EventListener};
use alacritty_terminal::grid::Dimensions;
use alacritty_terminal::index::{Column, Line, Point};
use alacritty_terminal::term::cell::Flags;
use alacritty_terminal::term::{Config, Term, TermMode};
use alacritty_terminal::vte::ansi::{Color, Processor};

/// Minimum rows/cols the emulator will accept; callers clamp to the panel's
/// own content-area minimum (10x5) before construction, this is just a
/// final backstop against a 0-sized grid.
const MIN_ROWS: u16 = 1;
const MIN_COLS: u16 = 1;

#[derive(Debug, Clone, Copy)]
struct TermSize {
    columns: usize,
    screen_lines: usize,
}

impl Dimensions for TermSize {
    fn columns(&self) -> usize {
        self.columns
    }
    fn screen_lines(&self) -> usize {
        self.screen_lines
    }
    fn total_lines(&self) -> usize {
        self.screen_lines
    }
}

/// Routes [`Event::PtyWrite`] back to the inner PTY's writer, so device-status
/// queries the child issues (e.g. `ESC[6n`) get answered the way a real
/// terminal would, instead of hanging.
#[derive(Clone)]
pub struct PtyWriteListener {
    writer: Arc<Mutex<Box<dyn Write + Send>>>,
}

impl PtyWriteListener {
    pub fn new(writer: Arc<Mutex<Box<dyn Write + Send>>>) -> Self {
        Self { writer }
    }
}

impl EventListener for PtyWriteListener {
    fn send_event(&self, event: Event) {
        if let Event::PtyWrite(text) = event {
            let mut writer = self.writer.lock().expect("pty writer lock poisoned");
            let _ = writer.write_all(text.as_bytes());
            let _ = writer.flush();
        }
    }
}

/// One rendered cell: a character plus the style bits the panel needs to
/// map onto host colors (§3 `Glyph`). Cheap to copy.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Glyph {
    pub c: char,
    pub fg: Color,
    pub bg: Color,
    pub bold: bool,
    pub dim: bool,
    pub underline: bool,
    pub reverse: bool,
    pub blink: bool,
}

impl Glyph {
    fn blank() -> Self {
        Self {
            c: ' ',
            fg: Color::Named(alacritty_terminal::vte::ansi::NamedColor::Foreground),
            bg: Color::Named(alacritty_terminal::vte::ansi::NamedColor::Background),
            bold: false,
            dim: false,
            underline: false,
            reverse: false,
            blink: false,
        }
    }
}

/// Cursor position in grid coordinates, 0-indexed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CursorPos {
    pub row: usize,
    pub col: usize,
}

/// VT state machine + grid, bundled behind the panel's narrow contract.
pub struct Emulator {
    term: Term<PtyWriteListener>,
    processor: Processor,
}

impl std::fmt::Debug for Emulator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Emulator")
            .field("rows", &self.term.grid().screen_lines())
            .field("cols", &self.term.grid().columns())
            .field("history", &self.term.grid().history_size())
            .finish_non_exhaustive()
    }
}

impl Emulator {
    /// Construct an emulator whose device-status replies (e.g. `ESC[6n`) are
    /// written back to `pty_writer` (§4.1 construction step 4).
    pub fn new(rows: u16, cols: u16, scrollback: usize, pty_writer: Arc<Mutex<Box<dyn Write + Send>>>) -> Self {
        let rows = rows.max(MIN_ROWS) as usize;
        let cols = cols.max(MIN_COLS) as usize;
        let size = TermSize {
            columns: cols,
            screen_lines: rows,
        };
        let config = Config {
            scrolling_history: scrollback,
            kitty_keyboard: true,
            ..Config::default()
        };
        let term = Term::new(config, &size, PtyWriteListener::new(pty_writer));
        Self {
            term,
            processor: Processor::new(),
        }
    }

    /// Feed PTY output bytes into the grid (§4.1 "pass bytes to VT.write").
    pub fn write(&mut self, bytes: &[u8]) {
        self.processor.advance(&mut self.term, bytes);
    }

    /// Resize the live grid (§4.1.8).
    pub fn resize(&mut self, rows: u16, cols: u16) {
        let rows = rows.max(MIN_ROWS) as usize;
        let cols = cols.max(MIN_COLS) as usize;
        self.term.resize(TermSize {
            columns: cols,
            screen_lines: rows,
        });
    }

    pub fn rows(&self) -> usize {
        self.term.grid().screen_lines()
    }

    pub fn cols(&self) -> usize {
        self.term.grid().columns()
    }

    /// Read one cell of the live (non-scrollback) grid.
    pub fn cell(&self, row: usize, col: usize) -> Glyph {
        if row >= self.rows() || col >= self.cols() {
            return Glyph::blank();
        }
        let cell = &self.term.grid()[Point::new(Line(row as i32), Column(col))];
        Glyph {
            c: cell.c,
            fg: cell.fg,
            bg: cell.bg,
            bold: cell.flags.contains(Flags::BOLD),
            dim: cell.flags.contains(Flags::DIM),
            underline: cell.flags.contains(Flags::UNDERLINE),
            reverse: cell.flags.contains(Flags::INVERSE),
            blink: false,
        }
    }

    pub fn cursor(&self) -> CursorPos {
        let point = self.term.grid().cursor.point;
        CursorPos {
            row: point.line.0.max(0) as usize,
            col: point.column.0,
        }
    }

    pub fn cursor_visible(&self) -> bool {
        self.term.mode().contains(TermMode::SHOW_CURSOR)
    }

    pub fn application_cursor(&self) -> bool {
        self.term.mode().contains(TermMode::APP_CURSOR)
    }

    pub fn bracketed_paste(&self) -> bool {
        self.term.mode().contains(TermMode::BRACKETED_PASTE)
    }

    /// History lines currently retained by alacritty's own grid scrollback.
    /// The panel does not use this for its own `ScrollbackBuffer` (§3
    /// requires an independently bounded buffer), but it is useful for
    /// diagnostics.
    pub fn history_size(&self) -> usize {
        self.term.grid().history_size()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sink() -> Arc<Mutex<Box<dyn Write + Send>>> {
        Arc::new(Mutex::new(Box::new(Vec::new())))
    }

    /// A writer that also exposes what was written, for asserting on
    /// emulator-initiated replies (e.g. DSR).
    struct Collect(Arc<Mutex<Vec<u8>>>);

    impl Write for Collect {
        fn write(&mut self, data: &[u8]) -> std::io::Result<usize> {
            self.0.lock().expect("collect lock").extend_from_slice(data);
            Ok(data.len())
        }
        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    fn collecting_sink() -> (Arc<Mutex<Box<dyn Write + Send>>>, Arc<Mutex<Vec<u8>>>) {
        let buf = Arc::new(Mutex::new(Vec::new()));
        let writer: Arc<Mutex<Box<dyn Write + Send>>> =
            Arc::new(Mutex::new(Box::new(Collect(Arc::clone(&buf)))));
        (writer, buf)
    }

    #[test]
    fn new_creates_grid_at_requested_size() {
        let emu = Emulator::new(24, 80, 100, sink());
        assert_eq!(emu.rows(), 24);
        assert_eq!(emu.cols(), 80);
    }

    #[test]
    fn write_places_characters() {
        let mut emu = Emulator::new(24, 80, 100, sink());
        emu.write(b"Hi");
        assert_eq!(emu.cell(0, 0).c, 'H');
        assert_eq!(emu.cell(0, 1).c, 'i');
    }

    #[test]
    fn resize_updates_dimensions() {
        let mut emu = Emulator::new(24, 80, 100, sink());
        emu.resize(30, 100);
        assert_eq!(emu.rows(), 30);
        assert_eq!(emu.cols(), 100);
    }

    #[test]
    fn cursor_hidden_sequence() {
        let mut emu = Emulator::new(24, 80, 100, sink());
        assert!(emu.cursor_visible());
        emu.write(b"\x1b[?25l");
        assert!(!emu.cursor_visible());
    }

    #[test]
    fn out_of_bounds_cell_is_blank() {
        let emu = Emulator::new(5, 5, 10, sink());
        assert_eq!(emu.cell(100, 100).c, ' ');
    }

    #[test]
    fn zero_size_clamped_to_minimum() {
        let emu = Emulator::new(0, 0, 10, sink());
        assert_eq!(emu.rows(), MIN_ROWS as usize);
        assert_eq!(emu.cols(), MIN_COLS as usize);
    }

    #[test]
    fn device_status_query_is_answered_on_the_pty_writer() {
        let (writer, buf) = collecting_sink();
        let mut emu = Emulator::new(24, 80, 100, writer);
        emu.write(b"\x1b[6n");
        let written = buf.lock().expect("collect lock");
        assert!(!written.is_empty(), "DSR reply should be forwarded to the pty writer");
    }
}
