//! VT Panel (§4.1): PTY-backed terminal emulation, scrollback, selection,
//! input translation, and rendering.

pub mod emulator;
pub mod foreground;
pub mod input;
pub mod panel;
pub mod render;
pub mod scrollback;
pub mod selection;

pub use emulator::{CursorPos, Emulator, Glyph};
pub use foreground::foreground_process_name;
pub use panel::{PanelHost, Region, VtPanel};
pub use scrollback::{ScrollbackBuffer, ScrollbackLine, DEFAULT_CAPACITY};
pub use selection::{Selection, UnifiedPos};
