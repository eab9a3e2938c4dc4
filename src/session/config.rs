//! Session identity: deriving a socket path from a project directory.

use std::path::{Path, PathBuf};

use sha2::{Digest, Sha256};

/// User-facing configuration for one session (§3 `Session Config`).
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Absolute path to the project this session is attached to.
    pub project_root: PathBuf,
    /// Explicit session name, if the caller supplied one.
    pub session_name: Option<String>,
    /// If true, the session layer is bypassed entirely (used by the inner
    /// application when it is itself spawned under a session PTY, so it
    /// does not try to recursively re-enter the session layer).
    pub disabled: bool,
}

impl SessionConfig {
    /// Build a config for a project root, with no explicit name.
    pub fn new(project_root: impl Into<PathBuf>) -> Self {
        Self {
            project_root: project_root.into(),
            session_name: None,
            disabled: false,
        }
    }

    /// The derived session id: the configured name, or the first 16 hex
    /// characters of a SHA-256 digest of the absolute project path.
    pub fn session_id(&self) -> String {
        if let Some(name) = &self.session_name {
            return name.clone();
        }
        let absolute = self
            .project_root
            .canonicalize()
            .unwrap_or_else(|_| self.project_root.clone());
        let mut hasher = Sha256::new();
        hasher.update(absolute.to_string_lossy().as_bytes());
        let digest = hasher.finalize();
        digest.iter().take(8).map(|b| format!("{b:02x}")).collect()
    }

    /// `<sessions_root>/<id>.sock`.
    pub fn socket_path(&self, sessions_root: &Path) -> PathBuf {
        sessions_root.join(format!("{}.sock", self.session_id()))
    }

    /// `<sessions_root>/<id>.sock.lock`, the advisory lock file (§4.2.1).
    pub fn lock_path(&self, sessions_root: &Path) -> PathBuf {
        let mut socket = self.socket_path(sessions_root).into_os_string();
        socket.push(".lock");
        PathBuf::from(socket)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn explicit_name_wins() {
        let cfg = SessionConfig {
            project_root: PathBuf::from("/tmp/whatever"),
            session_name: Some("my-session".to_string()),
            disabled: false,
        };
        assert_eq!(cfg.session_id(), "my-session");
    }

    #[test]
    fn derived_id_is_stable_for_same_path() {
        let cfg = SessionConfig::new("/tmp/project-a");
        assert_eq!(cfg.session_id(), cfg.session_id());
        assert_eq!(cfg.session_id().len(), 16);
    }

    #[test]
    fn derived_id_differs_across_projects() {
        let a = SessionConfig::new("/tmp/project-a");
        let b = SessionConfig::new("/tmp/project-b");
        assert_ne!(a.session_id(), b.session_id());
    }

    #[test]
    fn socket_and_lock_paths() {
        let cfg = SessionConfig {
            project_root: PathBuf::from("/tmp/whatever"),
            session_name: Some("proj".to_string()),
            disabled: false,
        };
        let root = PathBuf::from("/home/user/.termsession/sessions");
        assert_eq!(cfg.socket_path(&root), root.join("proj.sock"));
        assert_eq!(cfg.lock_path(&root), root.join("proj.sock.lock"));
    }
}
