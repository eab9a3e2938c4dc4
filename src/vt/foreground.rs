//! Foreground-process introspection (§4.1.9): what command is currently
//! running in the PTY's foreground process group.

use std::os::unix::io::RawFd;

/// Return the command name of the foreground process group attached to
/// `pty_fd`, or `None` if it can't be determined (§6: "opaque
/// `pty_fd -> Option<String>`").
pub fn foreground_process_name(pty_fd: RawFd) -> Option<String> {
    let pgrp = foreground_pgrp(pty_fd)?;

    #[cfg(target_os = "linux")]
    {
        linux_comm(pgrp)
    }

    #[cfg(target_os = "macos")]
    {
        macos_ps_comm(pgrp)
    }

    #[cfg(not(any(target_os = "linux", target_os = "macos")))]
    {
        let _ = pgrp;
        None
    }
}

fn foreground_pgrp(pty_fd: RawFd) -> Option<libc::pid_t> {
    let mut pgrp: libc::pid_t = 0;
    let rc = unsafe { libc::ioctl(pty_fd, libc::TIOCGPGRP, &mut pgrp) };
    if rc != 0 {
        return None;
    }
    Some(pgrp)
}

#[cfg(target_os = "linux")]
fn linux_comm(pid: libc::pid_t) -> Option<String> {
    let path = format!("/proc/{pid}/comm");
    std::fs::read_to_string(path).ok().map(|s| s.trim().to_string())
}

#[cfg(target_os = "macos")]
fn macos_ps_comm(pid: libc::pid_t) -> Option<String> {
    let output = std::process::Command::new("ps")
        .args(["-p", &pid.to_string(), "-o", "comm="])
        .output()
        .ok()?;
    if !output.status.success() {
        return None;
    }
    let name = String::from_utf8_lossy(&output.stdout).trim().to_string();
    if name.is_empty() {
        None
    } else {
        Some(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bogus_fd_returns_none() {
        assert_eq!(foreground_process_name(-1), None);
    }
}
