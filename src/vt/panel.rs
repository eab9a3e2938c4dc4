//! VT Panel (§4.1): a self-contained interactive terminal — PTY-backed
//! child process, scrollback, selection, input translation, and throttled
//! rendering.

use std::io::{Read, Write};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use crossterm::event::{KeyCode, KeyModifiers, MouseEvent};
use portable_pty::{native_pty_system, Child, CommandBuilder, MasterPty, PtySize};
use ratatui::buffer::Buffer;
use ratatui::layout::Rect;

use crate::clipboard::Clipboard;
use super::emulator::{Emulator, Glyph};
use super::foreground::foreground_process_name;
use super::input::{classify_mouse, encode_key, MouseAction, ScrollDirection};
use super::render::{border_glyphs, spinner_frame, style_for_glyph};
use super::scrollback::{ScrollbackBuffer, ScrollbackLine};
use super::selection::{Selection, UnifiedPos};

/// Shell names that get prompt injection instead of auto-respawn (§4.1
/// construction step 1).
const KNOWN_SHELLS: &[&str] = &["bash", "zsh", "sh", "fish", "ksh", "tcsh", "dash"];

const MIN_CONTENT_COLS: u16 = 10;
const MIN_CONTENT_ROWS: u16 = 5;
const REDRAW_COALESCE: Duration = Duration::from_millis(16);
const SPINNER_TICK: Duration = Duration::from_millis(80);
const PROMPT_INJECTION_DELAY: Duration = Duration::from_millis(1000);
const RESPAWN_DELAY: Duration = Duration::from_millis(100);

/// Designated passthrough-mode toggle key and the double-tap window
/// (§4.1.1 "entered by a double-tap of a designated key within a short
/// interval").
const PASSTHROUGH_TOGGLE_KEY: KeyCode = KeyCode::F(12);
const DOUBLE_TAP_WINDOW: Duration = Duration::from_millis(400);

/// A rectangular region on the host screen (§3).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Region {
    pub x: u16,
    pub y: u16,
    pub width: u16,
    pub height: u16,
}

impl Region {
    /// Content dimensions `(cols, rows)`: the region inset by a 1-cell
    /// border, clamped to the panel's minimum (§4.1 construction step 2).
    fn content_dims(&self) -> (u16, u16) {
        let cols = self.width.saturating_sub(2).max(MIN_CONTENT_COLS);
        let rows = self.height.saturating_sub(2).max(MIN_CONTENT_ROWS);
        (cols, rows)
    }
}

/// Marker env var set on the child so its rc files can detect "inside this
/// editor" (§4.1 construction step 3).
const APP_MARKER_ENV: &str = "TERMSESSION_INNER=1";

struct PanelState {
    region: Region,
    emulator: Emulator,
    previous_screen: Vec<Vec<Glyph>>,
    scroll_offset: usize,
    selection: Selection,
    running: bool,
    focus: bool,
    has_received_output: bool,
    auto_respawn: bool,
    mouse_released: bool,
    passthrough_mode: bool,
    quick_command_mode: bool,
    pending_redraw: bool,
    last_redraw_scheduled: Option<Instant>,
    spinner_tick: u64,
    command_args: Vec<String>,
    last_toggle_press: Option<Instant>,
}

/// Callbacks the surrounding application supplies (§4.1.1 "a host-provided
/// message callback", §4.1 "fire `on_session_end` callback").
pub trait PanelHost: Send + Sync {
    /// Request a redraw as soon as is convenient.
    fn request_redraw(&self);
    /// Called when the panel's child exits and auto-respawn is disabled.
    fn on_session_end(&self);
    /// One-line hint shown while quick-command mode is active.
    fn show_hint(&self, _text: &str) {}
    /// Reverse-video banner, e.g. "Session taken over by remote client".
    fn show_banner(&self, _text: &str) {}
}

/// A live, PTY-backed terminal panel.
pub struct VtPanel {
    state: Mutex<PanelState>,
    pty_master: Mutex<Box<dyn MasterPty + Send>>,
    pty_writer: Arc<Mutex<Box<dyn Write + Send>>>,
    child: Mutex<Box<dyn Child + Send + Sync>>,
    scrollback: ScrollbackBuffer,
    stop: AtomicBool,
    generation: AtomicU64,
    host: Arc<dyn PanelHost>,
}

impl std::fmt::Debug for VtPanel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VtPanel").finish_non_exhaustive()
    }
}

impl VtPanel {
    /// Construct and start a panel in `region`, spawning `command_args[0]`
    /// with the remaining elements as arguments; an empty slice spawns the
    /// user's `$SHELL` (or `/bin/sh`) (§4.1 construction).
    pub fn spawn(
        region: Region,
        command_args: Vec<String>,
        scrollback_capacity: usize,
        host: Arc<dyn PanelHost>,
    ) -> Result<Arc<Self>> {
        let auto_respawn = !command_args.is_empty() && !is_known_shell(&command_args[0]);

        let (cols, rows) = region.content_dims();
        let pty_system = native_pty_system();
        let pair = pty_system
            .openpty(PtySize {
                rows,
                cols,
                pixel_width: 0,
                pixel_height: 0,
            })
            .context("failed to open panel pty")?;

        let cmd = build_command(&command_args);
        let child = pair
            .slave
            .spawn_command(cmd)
            .context("failed to spawn panel child")?;
        drop(pair.slave);

        let reader = pair.master.try_clone_reader().context("clone pty reader")?;
        let writer = pair.master.take_writer().context("take pty writer")?;
        let pty_writer: Arc<Mutex<Box<dyn Write + Send>>> = Arc::new(Mutex::new(writer));

        let emulator = Emulator::new(rows, cols, scrollback_capacity.max(1), Arc::clone(&pty_writer));
        let previous_screen = snapshot(&emulator);

        let panel = Arc::new(Self {
            state: Mutex::new(PanelState {
                region,
                emulator,
                previous_screen,
                scroll_offset: 0,
                selection: Selection::default(),
                running: true,
                focus: false,
                has_received_output: false,
                auto_respawn,
                mouse_released: true,
                passthrough_mode: false,
                quick_command_mode: false,
                pending_redraw: false,
                last_redraw_scheduled: None,
                spinner_tick: 0,
                command_args,
                last_toggle_press: None,
            }),
            pty_master: Mutex::new(pair.master),
            pty_writer,
            child: Mutex::new(child),
            scrollback: ScrollbackBuffer::new(scrollback_capacity.max(1)),
            stop: AtomicBool::new(false),
            generation: AtomicU64::new(0),
            host,
        });

        panel.spawn_read_loop(reader);
        panel.spawn_spinner_ticker();
        if !auto_respawn {
            panel.schedule_prompt_injection();
        }

        Ok(panel)
    }

    fn spawn_read_loop(self: &Arc<Self>, mut reader: Box<dyn Read + Send>) {
        let panel = Arc::clone(self);
        let generation = panel.generation.load(Ordering::SeqCst);
        std::thread::spawn(move || {
            crate::crash::guard("panel-read-loop", move || {
                let mut buf = [0u8; 4096];
                loop {
                    if panel.stop.load(Ordering::Relaxed)
                        || panel.generation.load(Ordering::SeqCst) != generation
                    {
                        return;
                    }
                    match reader.read(&mut buf) {
                        Ok(0) | Err(_) => break,
                        Ok(n) => panel.handle_output(&buf[..n]),
                    }
                }
                panel.handle_child_exit(generation);
            });
        });
    }

    fn spawn_spinner_ticker(self: &Arc<Self>) {
        let panel = Arc::clone(self);
        std::thread::spawn(move || {
            crate::crash::guard("panel-spinner-ticker", move || loop {
                if panel.stop.load(Ordering::Relaxed) {
                    return;
                }
                std::thread::sleep(SPINNER_TICK);
                let still_waiting = {
                    let mut state = panel.state.lock().expect("panel lock poisoned");
                    if !state.running {
                        return;
                    }
                    if !state.has_received_output {
                        state.spinner_tick = state.spinner_tick.wrapping_add(1);
                    }
                    !state.has_received_output
                };
                if still_waiting {
                    panel.schedule_redraw();
                }
            });
        });
    }

    /// PTY read loop body (§4.1 "PTY read loop").
    fn handle_output(&self, bytes: &[u8]) {
        let mut state = self.state.lock().expect("panel lock poisoned");
        state.has_received_output = true;
        let previous = std::mem::replace(&mut state.previous_screen, Vec::new());
        state.emulator.write(bytes);
        let new_screen_row = |row: usize, cols: usize| -> Vec<Glyph> {
            (0..cols).map(|c| state.emulator.cell(row, c)).collect()
        };
        let cols = state.emulator.cols();
        let rows = state.emulator.rows();
        detect_and_push_scroll(&previous, &new_screen_row, rows, cols, &self.scrollback);
        state.previous_screen = snapshot(&state.emulator);
        drop(state);
        self.schedule_redraw();
    }

    fn handle_child_exit(self: &Arc<Self>, generation: u64) {
        if self.generation.load(Ordering::SeqCst) != generation {
            return; // already respawned under us
        }
        let auto_respawn = {
            let mut state = self.state.lock().expect("panel lock poisoned");
            state.running = false;
            state.auto_respawn
        };
        if auto_respawn {
            std::thread::sleep(RESPAWN_DELAY);
            if let Err(e) = self.respawn_shell() {
                log::error!("panel respawn failed: {e}");
                self.host.on_session_end();
            }
        } else {
            self.host.on_session_end();
        }
    }

    /// §4.1.6.
    pub fn respawn_shell(self: &Arc<Self>) -> Result<()> {
        let (cols, rows) = {
            let state = self.state.lock().expect("panel lock poisoned");
            state.region.content_dims()
        };

        let pty_system = native_pty_system();
        let pair = pty_system
            .openpty(PtySize {
                rows,
                cols,
                pixel_width: 0,
                pixel_height: 0,
            })
            .context("failed to open pty for respawn")?;
        let cmd = build_command(&[]);
        let new_child = pair
            .slave
            .spawn_command(cmd)
            .context("failed to spawn shell on respawn")?;
        drop(pair.slave);
        let reader = pair.master.try_clone_reader().context("clone pty reader")?;
        let writer = pair.master.take_writer().context("take pty writer")?;

        *self.pty_master.lock().expect("pty_master lock poisoned") = pair.master;
        *self.pty_writer.lock().expect("pty_writer lock poisoned") = writer;
        *self.child.lock().expect("child lock poisoned") = new_child;
        self.scrollback.clear();

        {
            let mut state = self.state.lock().expect("panel lock poisoned");
            state.emulator = Emulator::new(
                rows,
                cols,
                self.scrollback.capacity(),
                Arc::clone(&self.pty_writer),
            );
            state.previous_screen = snapshot(&state.emulator);
            state.scroll_offset = 0;
            state.has_received_output = false;
            state.auto_respawn = false;
            state.running = true;
            state.selection.clear();
        }

        self.generation.fetch_add(1, Ordering::SeqCst);
        self.spawn_read_loop(reader);
        self.schedule_prompt_injection();
        Ok(())
    }

    /// §4.1.7. Writes a fixed, minimal snippet — this crate does not
    /// implement a theming system, just enough for the round trip to be
    /// observable.
    ///
    /// `TERMSESSION_NO_PROMPT_INJECT` disables this entirely (§9 open
    /// question: the inject path has no "shell ready" acknowledgment, so
    /// slow-starting shells can receive it before their prompt is up).
    fn schedule_prompt_injection(self: &Arc<Self>) {
        if std::env::var_os("TERMSESSION_NO_PROMPT_INJECT").is_some() {
            return;
        }
        let panel = Arc::clone(self);
        let generation = self.generation.load(Ordering::SeqCst);
        std::thread::spawn(move || {
            std::thread::sleep(PROMPT_INJECTION_DELAY);
            if panel.generation.load(Ordering::SeqCst) != generation
                || panel.stop.load(Ordering::Relaxed)
            {
                return;
            }
            let snippet_path = std::env::temp_dir().join("termsession_prompt_init.sh");
            if let Err(e) = std::fs::write(&snippet_path, b"PS1='[termsession] $ '\n") {
                log::warn!("failed to write prompt injection snippet: {e}");
                return;
            }
            let command = format!("source {} && clear\n", snippet_path.display());
            if let Err(e) = panel.write_input(command.as_bytes()) {
                log::warn!("failed to inject prompt snippet: {e}");
            }
        });
    }

    /// §4.1.8. Updates region, recomputes content dims, resizes PTY and VT
    /// together under the panel lock.
    pub fn resize(&self, region: Region) -> Result<()> {
        let (cols, rows) = region.content_dims();
        let mut state = self.state.lock().expect("panel lock poisoned");
        state.region = region;
        state.emulator.resize(rows, cols);
        drop(state);

        let master = self.pty_master.lock().expect("pty_master lock poisoned");
        master
            .resize(PtySize {
                rows,
                cols,
                pixel_width: 0,
                pixel_height: 0,
            })
            .context("failed to resize panel pty")
    }

    fn write_input(&self, bytes: &[u8]) -> Result<()> {
        let mut writer = self.pty_writer.lock().expect("pty_writer lock poisoned");
        writer.write_all(bytes)?;
        Ok(())
    }

    /// §4.1.3. Coalesces bursts of output into at most one repaint per
    /// ~16 ms.
    fn schedule_redraw(&self) {
        let should_fire = {
            let mut state = self.state.lock().expect("panel lock poisoned");
            state.pending_redraw = true;
            let now_ready = state
                .last_redraw_scheduled
                .map_or(true, |t| t.elapsed() >= REDRAW_COALESCE);
            if now_ready {
                state.pending_redraw = false;
                state.last_redraw_scheduled = Some(Instant::now());
            }
            now_ready
        };
        if should_fire {
            self.host.request_redraw();
        }
    }

    /// §4.1.1 key handling entry point.
    pub fn handle_key(self: &Arc<Self>, code: KeyCode, modifiers: KeyModifiers) {
        let mut state = self.state.lock().expect("panel lock poisoned");

        if code == PASSTHROUGH_TOGGLE_KEY {
            let now = Instant::now();
            let double_tapped = state
                .last_toggle_press
                .is_some_and(|prev| now.duration_since(prev) <= DOUBLE_TAP_WINDOW);
            state.last_toggle_press = Some(now);
            if double_tapped {
                state.passthrough_mode = !state.passthrough_mode;
                state.last_toggle_press = None;
                drop(state);
                self.host.show_hint(if self.is_passthrough() {
                    "passthrough mode on"
                } else {
                    "passthrough mode off"
                });
                return;
            }
        }

        if state.passthrough_mode {
            drop(state);
            if let Some(bytes) = encode_key(code, modifiers) {
                let _ = self.write_input(&bytes);
            }
            return;
        }

        if state.quick_command_mode {
            state.quick_command_mode = false;
            drop(state);
            self.dispatch_quick_command(code);
            return;
        }

        if let KeyCode::Char('\\') = code {
            if modifiers.contains(KeyModifiers::CONTROL) {
                state.quick_command_mode = true;
                drop(state);
                self.host
                    .show_hint("q: quit  w: next pane  Esc: cancel");
                return;
            }
        }

        // Shift+PageUp/PageDown scroll history; never forwarded (§4.1.1).
        if modifiers.contains(KeyModifiers::SHIFT) {
            match code {
                KeyCode::PageUp => {
                    let page = state.emulator.rows().saturating_sub(1);
                    self.scroll_by(&mut state, -(page as i64));
                    drop(state);
                    self.schedule_redraw();
                    return;
                }
                KeyCode::PageDown => {
                    let page = state.emulator.rows().saturating_sub(1);
                    self.scroll_by(&mut state, page as i64);
                    drop(state);
                    self.schedule_redraw();
                    return;
                }
                _ => {}
            }
        }

        // Any key while scrolled up snaps to bottom first (§4.1.1).
        if state.scroll_offset != 0 {
            state.scroll_offset = 0;
        }

        // Copy-on-Ctrl+C (§4.1.1).
        if code == KeyCode::Char('c') && modifiers.contains(KeyModifiers::CONTROL) {
            if !state.selection.is_empty() {
                let text = self.selection_text_locked(&state);
                state.selection.clear();
                drop(state);
                if let Err(e) = Clipboard::write(&text) {
                    log::warn!("clipboard write failed: {e}");
                }
                self.schedule_redraw();
                return;
            }
        }

        drop(state);

        if let Some(bytes) = encode_key(code, modifiers) {
            let _ = self.write_input(&bytes);
        }
    }

    pub fn is_passthrough(&self) -> bool {
        self.state.lock().expect("panel lock poisoned").passthrough_mode
    }

    fn dispatch_quick_command(&self, code: KeyCode) {
        match code {
            KeyCode::Char('q') => self.host.on_session_end(),
            KeyCode::Char('w') => self.host.show_hint("next pane"),
            KeyCode::Esc => {}
            _ => {}
        }
    }

    /// §4.1.1 mouse handling entry point. `screen_row`/`screen_col` are
    /// content-area-relative (border already subtracted by the caller).
    pub fn handle_mouse(&self, event: &MouseEvent) {
        match classify_mouse(event) {
            MouseAction::Scroll(ScrollDirection::Up) => {
                let mut state = self.state.lock().expect("panel lock poisoned");
                self.scroll_by(&mut state, -3);
                drop(state);
                self.schedule_redraw();
            }
            MouseAction::Scroll(ScrollDirection::Down) => {
                let mut state = self.state.lock().expect("panel lock poisoned");
                self.scroll_by(&mut state, 3);
                drop(state);
                self.schedule_redraw();
            }
            MouseAction::LeftDown { row, col } => {
                let mut state = self.state.lock().expect("panel lock poisoned");
                let pos = self.unified_pos(&state, row, col);
                state.selection = Selection { start: pos, end: pos };
                state.mouse_released = false;
            }
            MouseAction::LeftDrag { row, col } => {
                let mut state = self.state.lock().expect("panel lock poisoned");
                if !state.mouse_released {
                    let pos = self.unified_pos(&state, row, col);
                    state.selection.end = pos;
                    drop(state);
                    self.schedule_redraw();
                }
            }
            MouseAction::LeftUp { row, col } => {
                let mut state = self.state.lock().expect("panel lock poisoned");
                let pos = self.unified_pos(&state, row, col);
                state.selection.end = pos;
                state.mouse_released = true;
            }
            MouseAction::Absorbed => {}
        }
    }

    /// Adjusts `scroll_offset` only; callers are responsible for dropping
    /// the panel lock before requesting a redraw.
    fn scroll_by(&self, state: &mut PanelState, delta: i64) {
        let max_offset = self.scrollback.count();
        let current = state.scroll_offset as i64;
        let next = (current + delta).clamp(0, max_offset as i64);
        state.scroll_offset = next as usize;
    }

    fn unified_pos(&self, state: &PanelState, screen_row: u16, col: u16) -> UnifiedPos {
        let y = self
            .scrollback
            .count()
            .saturating_sub(state.scroll_offset)
            + screen_row as usize;
        UnifiedPos { y, x: col as usize }
    }

    fn selection_text_locked(&self, state: &PanelState) -> String {
        let sel = state.selection;
        let scrollback_count = self.scrollback.count();
        super::selection::selection_text(&sel, |y| {
            if y < scrollback_count {
                self.scrollback.get(y).map(|line| line.cells.iter().map(|g| g.c).collect())
            } else {
                let row = y - scrollback_count;
                if row >= state.emulator.rows() {
                    return None;
                }
                Some((0..state.emulator.cols()).map(|c| state.emulator.cell(row, c).c).collect())
            }
        })
    }

    pub fn set_focus(&self, focus: bool) {
        self.state.lock().expect("panel lock poisoned").focus = focus;
    }

    pub fn foreground_process(&self) -> Option<String> {
        use std::os::unix::io::AsRawFd;
        let master = self.pty_master.lock().expect("pty_master lock poisoned");
        master.as_raw_fd().and_then(foreground_process_name)
    }

    pub fn is_running(&self) -> bool {
        self.state.lock().expect("panel lock poisoned").running
    }

    /// §4.1.2 rendering into a ratatui buffer. Draws the 1-cell border,
    /// either the spinner overlay or the content grid, and positions the
    /// host cursor when focused and visible.
    pub fn render(&self, area: Rect, buf: &mut Buffer) {
        if area.width < 2 || area.height < 2 {
            return;
        }
        let state = self.state.lock().expect("panel lock poisoned");
        self.render_border(&state, area, buf);

        let content = Rect {
            x: area.x + 1,
            y: area.y + 1,
            width: area.width - 2,
            height: area.height - 2,
        };

        if !state.has_received_output {
            let frame = spinner_frame(state.spinner_tick);
            let cx = content.x + content.width / 2;
            let cy = content.y + content.height / 2;
            if let Some(cell) = buf.cell_mut((cx, cy)) {
                cell.set_char(frame);
            }
            return;
        }

        let scrollback_count = self.scrollback.count();
        let unified_top = scrollback_count.saturating_sub(state.scroll_offset);

        for screen_row in 0..content.height {
            let unified_y = unified_top + screen_row as usize;
            for screen_col in 0..content.width {
                let col = screen_col as usize;
                let glyph = if unified_y < scrollback_count {
                    self.scrollback
                        .get(unified_y)
                        .and_then(|line| line.cells.get(col).copied())
                        .unwrap_or_else(blank_glyph)
                } else {
                    let live_row = unified_y - scrollback_count;
                    if live_row < state.emulator.rows() {
                        state.emulator.cell(live_row, col)
                    } else {
                        blank_glyph()
                    }
                };
                let selected = state.selection.contains(unified_y, col);
                let x = content.x + screen_col;
                let y = content.y + screen_row;
                if let Some(cell) = buf.cell_mut((x, y)) {
                    cell.set_char(glyph.c);
                    cell.set_style(style_for_glyph(&glyph, selected));
                }
            }
        }
    }

    fn render_border(&self, state: &PanelState, area: Rect, buf: &mut Buffer) {
        let g = border_glyphs(state.focus);
        for x in area.left()..area.right() {
            if let Some(cell) = buf.cell_mut((x, area.top())) {
                cell.set_char(g.top);
            }
            if let Some(cell) = buf.cell_mut((x, area.bottom() - 1)) {
                cell.set_char(g.bottom);
            }
        }
        for y in area.top()..area.bottom() {
            if let Some(cell) = buf.cell_mut((area.left(), y)) {
                cell.set_char(g.left);
            }
            if let Some(cell) = buf.cell_mut((area.right() - 1, y)) {
                cell.set_char(g.right);
            }
        }
        if let Some(cell) = buf.cell_mut((area.left(), area.top())) {
            cell.set_char(g.top_left);
        }
        if let Some(cell) = buf.cell_mut((area.right() - 1, area.top())) {
            cell.set_char(g.top_right);
        }
        if let Some(cell) = buf.cell_mut((area.left(), area.bottom() - 1)) {
            cell.set_char(g.bottom_left);
        }
        if let Some(cell) = buf.cell_mut((area.right() - 1, area.bottom() - 1)) {
            cell.set_char(g.bottom_right);
        }
    }

    /// Host cursor position for this panel, if it should currently be
    /// shown (focused, visible, and not scrolled into history).
    pub fn cursor_position(&self, area: Rect) -> Option<(u16, u16)> {
        let state = self.state.lock().expect("panel lock poisoned");
        if !state.focus || !state.emulator.cursor_visible() || state.scroll_offset != 0 {
            return None;
        }
        let cursor = state.emulator.cursor();
        if area.width < 2 || area.height < 2 {
            return None;
        }
        Some((area.x + 1 + cursor.col as u16, area.y + 1 + cursor.row as u16))
    }

    pub fn stop(&self) {
        self.stop.store(true, Ordering::SeqCst);
    }
}

fn is_known_shell(program: &str) -> bool {
    let name = std::path::Path::new(program)
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or(program);
    KNOWN_SHELLS.contains(&name)
}

fn build_command(args: &[String]) -> CommandBuilder {
    let mut iter = args.iter();
    let mut cmd = match iter.next() {
        Some(program) => CommandBuilder::new(program),
        None => {
            let shell = std::env::var("SHELL").unwrap_or_else(|_| "/bin/sh".to_string());
            CommandBuilder::new(shell)
        }
    };
    for arg in iter {
        cmd.arg(arg);
    }
    cmd.env("TERM", "xterm-256color");
    let (key, value) = APP_MARKER_ENV.split_once('=').expect("marker has an =");
    cmd.env(key, value);
    cmd
}

fn blank_glyph() -> Glyph {
    Glyph {
        c: ' ',
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
    }
}

fn snapshot(emulator: &Emulator) -> Vec<Vec<Glyph>> {
    let rows = emulator.rows();
    let cols = emulator.cols();
    (0..rows)
        .map(|r| (0..cols).map(|c| emulator.cell(r, c)).collect())
        .collect()
}

/// §4.1.4 scroll detection, implemented exactly as described: compare the
/// previous top row against the new grid, confirm with the second row, and
/// push any rows that scrolled off to the scrollback buffer.
fn detect_and_push_scroll(
    previous: &[Vec<Glyph>],
    new_row: &impl Fn(usize, usize) -> Vec<Glyph>,
    rows: usize,
    cols: usize,
    scrollback: &ScrollbackBuffer,
) {
    if previous.is_empty() || rows == 0 {
        return;
    }
    let prev_row0 = &previous[0];
    let new_row0 = new_row(0, cols);
    if *prev_row0 == new_row0 {
        return; // no scroll
    }

    if rows > 1 {
        let prev_row1 = previous.get(1);
        for k in 1..rows {
            if new_row(k, cols) == *prev_row0 {
                if let Some(prev1) = prev_row1 {
                    if k + 1 < rows && new_row(k + 1, cols) == *prev1 {
                        for r in 0..k {
                            if let Some(row) = previous.get(r) {
                                scrollback.push(ScrollbackLine::new(row.clone()));
                            }
                        }
                        return;
                    }
                }
            }
        }
    }

    for n in 1..previous.len() {
        if previous[n] == new_row0 {
            if n + 1 < previous.len() && rows > 1 && new_row(1, cols) == previous[n + 1] {
                for r in 0..n {
                    scrollback.push(ScrollbackLine::new(previous[r].clone()));
                }
                return;
            }
        }
    }
    // Neither pattern matched: likely a full-screen clear/redraw; skip.
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn content_dims_clamped_to_minimum() {
        let region = Region { x: 0, y: 0, width: 4, height: 4 };
        assert_eq!(region.content_dims(), (MIN_CONTENT_COLS, MIN_CONTENT_ROWS));
    }

    #[test]
    fn content_dims_insets_border() {
        let region = Region { x: 0, y: 0, width: 42, height: 22 };
        assert_eq!(region.content_dims(), (40, 20));
    }

    #[test]
    fn known_shell_names_detected() {
        assert!(is_known_shell("/bin/bash"));
        assert!(is_known_shell("zsh"));
        assert!(!is_known_shell("claude"));
    }

    #[test]
    fn no_scroll_when_top_row_unchanged() {
        let row = vec![blank_glyph(); 4];
        let previous = vec![row.clone(), row.clone()];
        let scrollback = ScrollbackBuffer::new(10);
        detect_and_push_scroll(&previous, &|_, _| row.clone(), 2, 4, &scrollback);
        assert_eq!(scrollback.count(), 0);
    }

    fn blank_glyph() -> Glyph {
        Glyph {
            c: ' ',
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
        }
    }
}
