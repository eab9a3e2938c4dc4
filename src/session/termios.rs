//! Raw-mode terminal discipline shared by the session server and client (§4.3).
//!
//! Puts the local controlling terminal into raw mode for the duration of a
//! `RawModeGuard`'s lifetime and restores the saved termios on drop — the
//! same "guard restores on drop, including panics" shape as `tui/guard.rs`'s
//! `TerminalGuard` in the donor tree.

use std::mem::MaybeUninit;
use std::os::unix::io::RawFd;

use anyhow::{bail, Result};

/// Restores the terminal's original termios settings when dropped.
#[derive(Debug)]
pub struct RawModeGuard {
    fd: RawFd,
    original: libc::termios,
}

impl RawModeGuard {
    /// Save `fd`'s current termios and switch it into raw mode.
    pub fn enable(fd: RawFd) -> Result<Self> {
        // SAFETY: `termios` is a plain-old-data struct; zero-init then
        // immediately overwritten by `tcgetattr` below.
        let mut original: libc::termios = unsafe { MaybeUninit::zeroed().assume_init() };
        if unsafe { libc::tcgetattr(fd, &mut original) } != 0 {
            bail!("tcgetattr failed: {}", std::io::Error::last_os_error());
        }

        let mut raw = original;
        raw.c_iflag &= !(libc::BRKINT
            | libc::PARMRK
            | libc::ISTRIP
            | libc::INLCR
            | libc::IGNCR
            | libc::ICRNL
            | libc::IXON);
        raw.c_oflag &= !libc::OPOST;
        raw.c_lflag &= !(libc::ECHO | libc::ECHONL | libc::ICANON | libc::ISIG | libc::IEXTEN);
        raw.c_cflag &= !(libc::CSIZE | libc::PARENB);
        raw.c_cflag |= libc::CS8;
        raw.c_cc[libc::VMIN] = 1;
        raw.c_cc[libc::VTIME] = 0;

        if unsafe { libc::tcsetattr(fd, libc::TCSANOW, &raw) } != 0 {
            bail!("tcsetattr failed: {}", std::io::Error::last_os_error());
        }

        Ok(Self { fd, original })
    }
}

impl Drop for RawModeGuard {
    fn drop(&mut self) {
        // Best-effort: nothing useful can be done if restore fails on exit.
        let _ = unsafe { libc::tcsetattr(self.fd, libc::TCSANOW, &self.original) };
    }
}

/// Read the current window size of `fd` via `TIOCGWINSZ`.
pub fn window_size(fd: RawFd) -> Result<(u16, u16)> {
    // SAFETY: `winsize` is POD; zero-init then filled by the ioctl.
    let mut size: libc::winsize = unsafe { MaybeUninit::zeroed().assume_init() };
    if unsafe { libc::ioctl(fd, libc::TIOCGWINSZ, &mut size) } != 0 {
        bail!("TIOCGWINSZ failed: {}", std::io::Error::last_os_error());
    }
    Ok((size.ws_row, size.ws_col))
}
