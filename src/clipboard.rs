//! Clipboard wrapper (§6a). The panel never touches `arboard` types
//! directly — mirrors how `vt::Emulator` hides `alacritty_terminal` behind
//! a narrow contract (§4.1.10).

use anyhow::{Context, Result};

/// A single clipboard handle. `arboard::Clipboard` owns a platform
/// connection internally; callers create one per copy rather than holding
/// it across the panel's lifetime.
pub struct Clipboard;

impl Clipboard {
    /// Copy `text` to the system clipboard (§4.1.1 copy-on-Ctrl+C).
    /// Clipboard failures are non-fatal to the caller (§4.1 "Failure
    /// semantics"): this returns `Err` so the caller can log and continue,
    /// never panics.
    pub fn write(text: &str) -> Result<()> {
        let mut clipboard = arboard::Clipboard::new().context("failed to open clipboard")?;
        clipboard
            .set_text(text.to_string())
            .context("failed to write clipboard text")
    }
}
