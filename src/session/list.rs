//! Session listing (§4.2.8): enumerate live sessions under a sessions root
//! by probing each `*.sock` file the same way role discovery does.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};

use super::discovery::{discover_role, Role};

/// One entry in a session listing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionEntry {
    pub name: String,
    pub socket_path: PathBuf,
    pub alive: bool,
}

/// List every live session under `sessions_root` (§4.2.8).
///
/// A stale entry's socket file is removed as a side effect of probing it
/// (the same cleanup `discover_role` performs during normal startup), but
/// the stale entry itself is not returned — only the sessions still worth
/// attaching to are.
pub fn list_sessions(sessions_root: &Path) -> Result<Vec<SessionEntry>> {
    if !sessions_root.exists() {
        return Ok(Vec::new());
    }

    let mut entries = Vec::new();
    for dir_entry in std::fs::read_dir(sessions_root)
        .with_context(|| format!("failed to read sessions directory {sessions_root:?}"))?
    {
        let dir_entry = dir_entry?;
        let path = dir_entry.path();
        if path.extension().and_then(|ext| ext.to_str()) != Some("sock") {
            continue;
        }
        let name = path
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or_default()
            .to_string();

        let alive = matches!(discover_role(&path), Role::Client);
        // `discover_role` removes the socket file when stale, so re-check
        // existence rather than trusting the enum alone.
        let alive = alive && path.exists();
        if !alive {
            continue;
        }
        entries.push(SessionEntry {
            name,
            socket_path: path,
            alive,
        });
    }

    entries.sort_by(|a, b| a.name.cmp(&b.name));
    Ok(entries)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::os::unix::net::UnixListener;

    #[test]
    fn empty_root_yields_empty_list() {
        let dir = tempfile::tempdir().expect("tempdir");
        let root = dir.path().join("nonexistent");
        let entries = list_sessions(&root).expect("list");
        assert!(entries.is_empty());
    }

    #[test]
    fn lists_live_and_removes_stale() {
        let dir = tempfile::tempdir().expect("tempdir");
        let root = dir.path();

        let live_path = root.join("live.sock");
        let _listener = UnixListener::bind(&live_path).expect("bind live");

        let stale_path = root.join("stale.sock");
        {
            let listener = UnixListener::bind(&stale_path).expect("bind stale");
            drop(listener);
        }
        assert!(stale_path.exists());

        let entries = list_sessions(root).expect("list");

        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].name, "live");
        assert!(entries[0].alive);
        assert!(!stale_path.exists(), "stale socket should be cleaned up");
    }

    #[test]
    fn ignores_non_socket_files() {
        let dir = tempfile::tempdir().expect("tempdir");
        let root = dir.path();
        std::fs::write(root.join("notes.txt"), b"hello").expect("write");
        let entries = list_sessions(root).expect("list");
        assert!(entries.is_empty());
    }
}
