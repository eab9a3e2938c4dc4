//! Role selection: decide whether this process is the session server or a
//! client attaching to an already-running one (§4.2.1).

use std::os::unix::net::UnixStream;
use std::path::Path;

/// The role this process should assume for a given socket path.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    /// No live server was found; this process should become one.
    Server,
    /// A live server answered; this process should attach as a client.
    Client,
}

/// Probe `socket_path` and decide the role (§4.2.1 steps 1-2).
///
/// A stale socket file (present on disk but nothing answers a connect) is
/// removed so that the subsequent `UnixListener::bind` in the server path
/// does not fail with "address in use".
pub fn discover_role(socket_path: &Path) -> Role {
    if !socket_path.exists() {
        return Role::Server;
    }

    match UnixStream::connect(socket_path) {
        Ok(_) => Role::Client,
        Err(_) => {
            let _ = std::fs::remove_file(socket_path);
            Role::Server
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::os::unix::net::UnixListener;

    #[test]
    fn missing_socket_is_server() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("nope.sock");
        assert_eq!(discover_role(&path), Role::Server);
    }

    #[test]
    fn live_listener_is_client() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("live.sock");
        let _listener = UnixListener::bind(&path).expect("bind");
        assert_eq!(discover_role(&path), Role::Client);
    }

    #[test]
    fn stale_socket_file_is_removed_and_becomes_server() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("stale.sock");
        {
            let listener = UnixListener::bind(&path).expect("bind");
            drop(listener);
        }
        // The socket file remains on disk after the listener is dropped,
        // but nothing is listening on it anymore.
        assert!(path.exists());
        assert_eq!(discover_role(&path), Role::Server);
        assert!(!path.exists(), "stale socket file should be removed");
    }
}
