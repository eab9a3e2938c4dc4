//! Session server: owns the inner PTY and arbitrates between the local
//! controlling terminal and at most one attached socket client (§4.2.3-4.2.7).

use std::io::{Read, Write};
use std::os::unix::io::AsRawFd;
use std::os::unix::net::UnixListener as StdUnixListener;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, RwLock};
use std::time::Duration;

use anyhow::{Context, Result};
use portable_pty::{native_pty_system, CommandBuilder, MasterPty, PtySize};
use tokio::net::{UnixListener, UnixStream};
use tokio::sync::mpsc;

use super::config::SessionConfig;
use super::framing::{Frame, FrameDecoder, PROTOCOL_VERSION};
use super::lock::SessionLock;
use super::termios::{window_size, RawModeGuard};

/// DEC private-mode mouse-enable sequences (§6), sent on attach and on
/// re-entering local mode.
const MOUSE_ENABLE_SEQUENCES: &[u8] = b"\x1b[?1000h\x1b[?1002h\x1b[?1003h\x1b[?1006h";

/// Detach keystroke: Ctrl+Q.
const CTRL_Q: u8 = 0x11;

/// Writes `text` to the local controlling terminal as a reverse-video
/// banner (§4.2.4), e.g. on attach takeover.
fn write_local_banner(text: &str) {
    let _ = std::io::stdout().write_all(format!("\x1b[7m{text}\x1b[0m\r\n").as_bytes());
    let _ = std::io::stdout().flush();
}

/// A command sent to a connected client's write half.
enum ClientCommand {
    Send(Frame),
    Kick(String),
}

/// Current arbitration state (§9 "sum types over status flags").
enum ServerMode {
    Local,
    Attached {
        attach_id: u64,
        cmd_tx: mpsc::UnboundedSender<ClientCommand>,
        rows: u16,
        cols: u16,
    },
    Stopping,
}

struct Shared {
    mode: RwLock<ServerMode>,
    next_attach_id: AtomicU64,
    pty_writer: Mutex<Box<dyn Write + Send>>,
    pty_master: Mutex<Box<dyn MasterPty + Send>>,
    session_name: String,
}

impl Shared {
    fn resize_pty(&self, rows: u16, cols: u16) -> Result<()> {
        let master = self.pty_master.lock().expect("pty_master lock poisoned");
        master
            .resize(PtySize {
                rows,
                cols,
                pixel_width: 0,
                pixel_height: 0,
            })
            .context("failed to resize inner pty")
    }

    fn write_pty(&self, bytes: &[u8]) -> Result<()> {
        let mut writer = self.pty_writer.lock().expect("pty_writer lock poisoned");
        writer.write_all(bytes)?;
        Ok(())
    }
}

/// A running session server. Dropping does not itself shut the server down;
/// call [`Server::stop`] for the orderly shutdown sequence (§4.2.7).
pub struct Server {
    socket_path: PathBuf,
    _lock: SessionLock,
    shared: Arc<Shared>,
    stopped: Arc<AtomicBool>,
    _raw_guard: RawModeGuard,
}

impl std::fmt::Debug for Server {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Server")
            .field("socket_path", &self.socket_path)
            .finish_non_exhaustive()
    }
}

impl Server {
    /// Start a session server for `config`, spawning `command` under the
    /// inner PTY (§4.2.3). `command` already carries the `--no-session
    /// --skip-dashboard` argv prefix (§6) — this module does not itself
    /// know the real application's argv conventions.
    pub async fn start(
        config: &SessionConfig,
        sessions_root: &Path,
        command: &[String],
    ) -> Result<Self> {
        std::fs::create_dir_all(sessions_root)?;
        let socket_path = config.socket_path(sessions_root);
        let lock_path = config.lock_path(sessions_root);

        let lock = SessionLock::acquire(&lock_path)?;

        let (local_rows, local_cols) =
            window_size(std::io::stdin().as_raw_fd()).unwrap_or((24, 80));

        let pty_system = native_pty_system();
        let pair = pty_system
            .openpty(PtySize {
                rows: local_rows,
                cols: local_cols,
                pixel_width: 0,
                pixel_height: 0,
            })
            .context("failed to open inner pty")?;

        let mut cmd_parts = command.iter();
        let program = cmd_parts.next().context("empty command")?;
        let mut cmd = CommandBuilder::new(program);
        for arg in cmd_parts {
            cmd.arg(arg);
        }
        let child = pair
            .slave
            .spawn_command(cmd)
            .context("failed to spawn inner application")?;
        drop(pair.slave);

        let pty_reader = pair.master.try_clone_reader().context("clone pty reader")?;
        let pty_writer = pair.master.take_writer().context("take pty writer")?;

        let raw_guard = RawModeGuard::enable(std::io::stdin().as_raw_fd())
            .context("failed to enable raw mode on local terminal")?;

        // Remove any stale socket file before binding (discovery already
        // does this on the probing side, but guard against races).
        let _ = std::fs::remove_file(&socket_path);
        let std_listener = StdUnixListener::bind(&socket_path)
            .with_context(|| format!("failed to bind session socket at {socket_path:?}"))?;
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            std::fs::set_permissions(&socket_path, std::fs::Permissions::from_mode(0o600))?;
        }
        std_listener.set_nonblocking(true)?;
        let listener = UnixListener::from_std(std_listener)?;

        let shared = Arc::new(Shared {
            mode: RwLock::new(ServerMode::Local),
            next_attach_id: AtomicU64::new(1),
            pty_writer: Mutex::new(pty_writer),
            pty_master: Mutex::new(pair.master),
            session_name: config.session_id(),
        });
        let stopped = Arc::new(AtomicBool::new(false));

        spawn_pty_reader(Arc::clone(&shared), pty_reader, Arc::clone(&stopped));
        spawn_local_stdin_loop(Arc::clone(&shared), Arc::clone(&stopped));
        spawn_accept_loop(Arc::clone(&shared), listener, Arc::clone(&stopped));
        spawn_child_monitor(Arc::clone(&shared), child, Arc::clone(&stopped), socket_path.clone());
        spawn_sigwinch_loop(Arc::clone(&shared), Arc::clone(&stopped));

        Ok(Self {
            socket_path,
            _lock: lock,
            shared,
            stopped,
            _raw_guard: raw_guard,
        })
    }

    /// True once the inner application has exited or [`Server::stop`] has
    /// run, i.e. the server has nothing left to do but be dropped.
    pub fn is_stopped(&self) -> bool {
        self.stopped.load(Ordering::SeqCst)
    }

    /// Idempotent orderly shutdown (§4.2.7).
    pub async fn stop(&self) {
        if self.stopped.swap(true, Ordering::SeqCst) {
            return; // already stopped
        }

        let cmd_tx = {
            let mode = self.shared.mode.read().expect("mode lock poisoned");
            match &*mode {
                ServerMode::Attached { cmd_tx, .. } => Some(cmd_tx.clone()),
                _ => None,
            }
        };

        *self.shared.mode.write().expect("mode lock poisoned") = ServerMode::Stopping;

        if let Some(cmd_tx) = cmd_tx {
            let _ = cmd_tx.send(ClientCommand::Kick("process exited".to_string()));
            tokio::time::sleep(Duration::from_millis(50)).await;
        }

        let _ = std::fs::remove_file(&self.socket_path);
        // The advisory lock is released when `_lock` drops with `self`.
    }
}

fn spawn_pty_reader(
    shared: Arc<Shared>,
    mut reader: Box<dyn Read + Send>,
    stopped: Arc<AtomicBool>,
) {
    std::thread::spawn(move || {
        crate::crash::guard("session-pty-reader", move || {
            let mut buf = [0u8; 32 * 1024];
            loop {
                if stopped.load(Ordering::Relaxed) {
                    break;
                }
                let n = match reader.read(&mut buf) {
                    Ok(0) => break,
                    Ok(n) => n,
                    Err(e) => {
                        log::error!("inner pty read error: {e}");
                        break;
                    }
                };
                let chunk = buf[..n].to_vec();
                let mode = shared.mode.read().expect("mode lock poisoned");
                match &*mode {
                    ServerMode::Local => {
                        let _ = std::io::stdout().write_all(&chunk);
                        let _ = std::io::stdout().flush();
                    }
                    ServerMode::Attached { cmd_tx, .. } => {
                        // A single failed send to a departed client does not end
                        // this loop (§4.2.5) — the client read loop will detect
                        // the disconnect and the server falls back to local mode.
                        let _ = cmd_tx.send(ClientCommand::Send(Frame::Data(chunk)));
                    }
                    ServerMode::Stopping => break,
                }
            }
        });
    });
}

fn spawn_local_stdin_loop(shared: Arc<Shared>, stopped: Arc<AtomicBool>) {
    std::thread::spawn(move || {
        crate::crash::guard("session-local-stdin", move || {
            let mut buf = [0u8; 4096];
            loop {
                if stopped.load(Ordering::Relaxed) {
                    break;
                }
                let n = match std::io::stdin().read(&mut buf) {
                    Ok(0) | Err(_) => break,
                    Ok(n) => n,
                };
                let chunk = &buf[..n];

                let is_attached_and_ctrl_c = {
                    let mode = shared.mode.read().expect("mode lock poisoned");
                    matches!(&*mode, ServerMode::Attached { .. }) && chunk.contains(&0x03)
                };

                if is_attached_and_ctrl_c {
                    let mut mode = shared.mode.write().expect("mode lock poisoned");
                    if let ServerMode::Attached { cmd_tx, .. } = &*mode {
                        let _ =
                            cmd_tx.send(ClientCommand::Kick("Local user took over".to_string()));
                    }
                    *mode = ServerMode::Local;
                    continue;
                }

                let mode = shared.mode.read().expect("mode lock poisoned");
                if matches!(&*mode, ServerMode::Local) {
                    let _ = shared.write_pty(chunk);
                }
            }
        });
    });
}

fn spawn_sigwinch_loop(shared: Arc<Shared>, stopped: Arc<AtomicBool>) {
    use signal_hook::consts::signal::SIGWINCH;
    let flag = Arc::new(AtomicBool::new(false));
    if signal_hook::flag::register(SIGWINCH, Arc::clone(&flag)).is_err() {
        log::warn!("failed to install SIGWINCH handler");
        return;
    }
    std::thread::spawn(move || {
        crate::crash::guard("session-sigwinch", move || loop {
            if stopped.load(Ordering::Relaxed) {
                break;
            }
            if flag.swap(false, Ordering::Relaxed) {
                let mode = shared.mode.read().expect("mode lock poisoned");
                if matches!(&*mode, ServerMode::Local) {
                    if let Ok((rows, cols)) = window_size(std::io::stdin().as_raw_fd()) {
                        drop(mode);
                        let _ = shared.resize_pty(rows, cols);
                    }
                }
            }
            std::thread::sleep(Duration::from_millis(50));
        });
    });
}

fn spawn_child_monitor(
    shared: Arc<Shared>,
    mut child: Box<dyn portable_pty::Child + Send + Sync>,
    stopped: Arc<AtomicBool>,
    socket_path: PathBuf,
) {
    std::thread::spawn(move || {
        crate::crash::guard("session-child-monitor", move || {
            let _ = child.wait();
            stopped.store(true, Ordering::SeqCst);

            let cmd_tx = {
                let mode = shared.mode.read().expect("mode lock poisoned");
                match &*mode {
                    ServerMode::Attached { cmd_tx, .. } => Some(cmd_tx.clone()),
                    _ => None,
                }
            };

            *shared.mode.write().expect("mode lock poisoned") = ServerMode::Stopping;

            if let Some(cmd_tx) = cmd_tx {
                let _ = cmd_tx.send(ClientCommand::Kick("process exited".to_string()));
                std::thread::sleep(Duration::from_millis(50));
            }

            let _ = std::fs::remove_file(&socket_path);
            log::info!("inner application exited; session server shutting down");
        });
    });
}

fn spawn_accept_loop(shared: Arc<Shared>, listener: UnixListener, stopped: Arc<AtomicBool>) {
    tokio::spawn(async move {
        loop {
            if stopped.load(Ordering::Relaxed) {
                break;
            }
            let accept =
                tokio::time::timeout(Duration::from_secs(1), listener.accept()).await;
            let stream = match accept {
                Ok(Ok((stream, _addr))) => stream,
                Ok(Err(e)) => {
                    log::error!("accept error: {e}");
                    continue;
                }
                Err(_) => continue, // 1s poll deadline elapsed; re-check stop flag
            };

            let shared = Arc::clone(&shared);
            tokio::spawn(async move {
                if let Err(e) = handle_client(shared, stream).await {
                    log::warn!("client session ended: {e}");
                }
            });
        }
    });
}

async fn handle_client(shared: Arc<Shared>, stream: UnixStream) -> Result<()> {
    let (mut read_half, mut write_half) = stream.into_split();
    let mut decoder = FrameDecoder::new();

    let hello = read_one_frame(&mut read_half, &mut decoder, Duration::from_secs(5)).await?;
    let (rows, cols, client_version) = match hello {
        Frame::Hello { rows, cols, version } => (rows, cols, version),
        _ => {
            write_half
                .write_all(
                    &Frame::Welcome {
                        accepted: false,
                        name: String::new(),
                        version: PROTOCOL_VERSION.to_string(),
                        reason: "expected HELLO".to_string(),
                    }
                    .encode(),
                )
                .await?;
            return Ok(());
        }
    };

    if client_version != PROTOCOL_VERSION {
        let reason = format!(
            "version mismatch: client={client_version} server={PROTOCOL_VERSION}"
        );
        write_half
            .write_all(
                &Frame::Welcome {
                    accepted: false,
                    name: String::new(),
                    version: PROTOCOL_VERSION.to_string(),
                    reason,
                }
                .encode(),
            )
            .await?;
        return Ok(());
    }

    kick_current_client(&shared, "Another client connected").await;
    write_local_banner("Session taken over by remote client; Ctrl+C to take over");

    let attach_id = shared.next_attach_id.fetch_add(1, Ordering::SeqCst);
    let (cmd_tx, mut cmd_rx) = mpsc::unbounded_channel::<ClientCommand>();
    *shared.mode.write().expect("mode lock poisoned") = ServerMode::Attached {
        attach_id,
        cmd_tx: cmd_tx.clone(),
        rows,
        cols,
    };

    write_half
        .write_all(
            &Frame::Welcome {
                accepted: true,
                name: shared.session_name.clone(),
                version: PROTOCOL_VERSION.to_string(),
                reason: String::new(),
            }
            .encode(),
        )
        .await?;
    write_half
        .write_all(&Frame::Data(MOUSE_ENABLE_SEQUENCES.to_vec()).encode())
        .await?;
    let _ = shared.resize_pty(rows, cols);

    let mut buf = [0u8; 32 * 1024];
    let detached_or_closed = loop {
        tokio::select! {
            cmd = cmd_rx.recv() => {
                match cmd {
                    Some(ClientCommand::Send(frame)) => {
                        if write_half.write_all(&frame.encode()).await.is_err() {
                            break true;
                        }
                    }
                    Some(ClientCommand::Kick(reason)) => {
                        let _ = write_half.write_all(&Frame::Close { reason }.encode()).await;
                        break true;
                    }
                    None => break true,
                }
            }
            n = read_half.read(&mut buf) => {
                let n = match n {
                    Ok(0) | Err(_) => break true,
                    Ok(n) => n,
                };
                let frames = match decoder.feed(&buf[..n]) {
                    Ok(frames) => frames,
                    Err(e) => {
                        log::warn!("client sent malformed frame: {e}");
                        break true;
                    }
                };
                let mut should_break = false;
                for frame in frames {
                    match frame {
                        Frame::Data(bytes) => {
                            if bytes.contains(&CTRL_Q) {
                                let _ = write_half
                                    .write_all(
                                        &Frame::Close {
                                            reason: "Detached from session (Ctrl+Q)".to_string(),
                                        }
                                        .encode(),
                                    )
                                    .await;
                                should_break = true;
                            } else {
                                let _ = shared.write_pty(&bytes);
                            }
                        }
                        Frame::Resize { rows, cols } => {
                            if let ServerMode::Attached { attach_id: id, cmd_tx, .. } =
                                &*shared.mode.read().expect("mode lock poisoned")
                            {
                                if *id == attach_id {
                                    let _ = shared.resize_pty(rows, cols);
                                    let _ = cmd_tx; // rows/cols recorded below
                                }
                            }
                            *shared.mode.write().expect("mode lock poisoned") = ServerMode::Attached {
                                attach_id,
                                cmd_tx: cmd_tx.clone(),
                                rows,
                                cols,
                            };
                        }
                        Frame::Close { .. } => should_break = true,
                        Frame::Hello { .. } | Frame::Welcome { .. } => {
                            log::debug!("unexpected handshake frame mid-session; ignoring");
                        }
                    }
                }
                if should_break {
                    break true;
                }
            }
        }
    };
    let _ = detached_or_closed;

    // Only fall back to local mode if nobody superseded this attachment.
    let still_current = matches!(
        &*shared.mode.read().expect("mode lock poisoned"),
        ServerMode::Attached { attach_id: id, .. } if *id == attach_id
    );
    if still_current {
        *shared.mode.write().expect("mode lock poisoned") = ServerMode::Local;
        let _ = std::io::stdout().write_all(MOUSE_ENABLE_SEQUENCES);
        let _ = std::io::stdout().flush();

        // Resize dance to provoke a full redraw via SIGWINCH.
        if let Ok((local_rows, local_cols)) = window_size(std::io::stdin().as_raw_fd()) {
            let _ = shared.resize_pty(local_rows.saturating_sub(1), local_cols);
            tokio::time::sleep(Duration::from_millis(10)).await;
            let _ = shared.resize_pty(local_rows, local_cols);
        }
    }

    Ok(())
}

async fn kick_current_client(shared: &Shared, reason: &str) {
    let cmd_tx = {
        let mode = shared.mode.read().expect("mode lock poisoned");
        match &*mode {
            ServerMode::Attached { cmd_tx, .. } => Some(cmd_tx.clone()),
            _ => None,
        }
    };
    if let Some(cmd_tx) = cmd_tx {
        let _ = cmd_tx.send(ClientCommand::Kick(reason.to_string()));
        tokio::time::sleep(Duration::from_millis(50)).await;
    }
}

async fn read_one_frame(
    read_half: &mut (impl tokio::io::AsyncReadExt + Unpin),
    decoder: &mut FrameDecoder,
    deadline: Duration,
) -> Result<Frame> {
    tokio::time::timeout(deadline, async {
        let mut buf = [0u8; 4096];
        loop {
            let n = read_half.read(&mut buf).await?;
            if n == 0 {
                anyhow::bail!("connection closed before a complete frame arrived");
            }
            let frames = decoder.feed(&buf[..n])?;
            if let Some(frame) = frames.into_iter().next() {
                return Ok(frame);
            }
        }
    })
    .await
    .context("timed out waiting for frame")?
}

use tokio::io::{AsyncReadExt, AsyncWriteExt};
