//! Session client: attaches to a running server's socket and mirrors the
//! local terminal to it until detach, kick, or disconnect (§4.2.6).

use std::io::Write;
use std::os::unix::io::AsRawFd;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::UnixStream;
use tokio::sync::mpsc;

use super::framing::{Frame, FrameDecoder, PROTOCOL_VERSION};
use super::termios::{window_size, RawModeGuard};

/// Detach keystroke the client itself recognizes and turns into a clean
/// local exit (mirrors the byte the server also treats specially, so a
/// detach looks identical whether it's caught client-side or server-side).
const CTRL_Q: u8 = 0x11;

/// Outcome of a client attach session, useful for exit-code/log purposes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClientOutcome {
    /// The user detached (Ctrl+Q); the server keeps running.
    Detached,
    /// The server sent CLOSE, e.g. another client took over or the
    /// inner application exited.
    ServerClosed { reason: String },
    /// The socket dropped without a CLOSE frame.
    Disconnected,
}

/// Connect to `socket_path` and run the attach loop until detach or
/// disconnect. Puts the local terminal into raw mode for the duration.
///
/// `dial_timeout` bounds how long the initial connect may take (§4.2.6/§5) —
/// a hung or stale socket should not wedge the client forever.
pub async fn run(socket_path: &std::path::Path, dial_timeout: Duration) -> Result<ClientOutcome> {
    let stream = tokio::time::timeout(dial_timeout, UnixStream::connect(socket_path))
        .await
        .with_context(|| format!("timed out connecting to session socket {socket_path:?}"))?
        .with_context(|| format!("failed to connect to session socket {socket_path:?}"))?;
    let (mut read_half, mut write_half) = stream.into_split();

    let (rows, cols) = window_size(std::io::stdin().as_raw_fd()).unwrap_or((24, 80));
    write_half
        .write_all(
            &Frame::Hello {
                rows,
                cols,
                version: PROTOCOL_VERSION.to_string(),
            }
            .encode(),
        )
        .await?;

    let mut decoder = FrameDecoder::new();
    let welcome = read_welcome(&mut read_half, &mut decoder).await?;
    let (accepted, reason) = match welcome {
        Frame::Welcome { accepted, reason, .. } => (accepted, reason),
        _ => bail!("expected WELCOME, got a different frame"),
    };
    if !accepted {
        bail!("server rejected attachment: {reason}");
    }

    let _raw_guard = RawModeGuard::enable(std::io::stdin().as_raw_fd())
        .context("failed to enable raw mode on local terminal")?;

    let stopped = Arc::new(AtomicBool::new(false));
    let (outbound_tx, mut outbound_rx) = mpsc::unbounded_channel::<Vec<u8>>();

    spawn_stdin_reader(outbound_tx.clone(), Arc::clone(&stopped));
    spawn_resize_watcher(outbound_tx, Arc::clone(&stopped));

    let mut buf = [0u8; 32 * 1024];
    let outcome = loop {
        tokio::select! {
            outbound = outbound_rx.recv() => {
                match outbound {
                    Some(bytes) => {
                        if write_half.write_all(&bytes).await.is_err() {
                            break ClientOutcome::Disconnected;
                        }
                    }
                    None => break ClientOutcome::Disconnected,
                }
            }
            n = read_half.read(&mut buf) => {
                let n = match n {
                    Ok(0) | Err(_) => break ClientOutcome::Disconnected,
                    Ok(n) => n,
                };
                let frames = match decoder.feed(&buf[..n]) {
                    Ok(frames) => frames,
                    Err(e) => {
                        log::warn!("server sent malformed frame: {e}");
                        break ClientOutcome::Disconnected;
                    }
                };
                let mut outcome = None;
                for frame in frames {
                    match frame {
                        Frame::Data(bytes) => {
                            let _ = std::io::stdout().write_all(&bytes);
                            let _ = std::io::stdout().flush();
                        }
                        Frame::Close { reason } => outcome = Some(ClientOutcome::ServerClosed { reason }),
                        Frame::Resize { .. } | Frame::Hello { .. } | Frame::Welcome { .. } => {
                            log::debug!("unexpected frame mid-session; ignoring");
                        }
                    }
                }
                if let Some(outcome) = outcome {
                    break outcome;
                }
            }
        }
    };

    stopped.store(true, Ordering::SeqCst);
    Ok(outcome)
}

fn spawn_stdin_reader(outbound_tx: mpsc::UnboundedSender<Vec<u8>>, stopped: Arc<AtomicBool>) {
    std::thread::spawn(move || {
        crate::crash::guard("client-stdin-reader", move || {
            let mut buf = [0u8; 4096];
            loop {
                if stopped.load(Ordering::Relaxed) {
                    break;
                }
                let n = match std::io::stdin().read_raw(&mut buf) {
                    Ok(0) | Err(_) => break,
                    Ok(n) => n,
                };
                let chunk = buf[..n].to_vec();
                let detach = chunk == [CTRL_Q];
                if outbound_tx.send(Frame::Data(chunk).encode()).is_err() {
                    break;
                }
                if detach {
                    break;
                }
            }
        });
    });
}

fn spawn_resize_watcher(outbound_tx: mpsc::UnboundedSender<Vec<u8>>, stopped: Arc<AtomicBool>) {
    use signal_hook::consts::signal::SIGWINCH;
    let flag = Arc::new(AtomicBool::new(false));
    if signal_hook::flag::register(SIGWINCH, Arc::clone(&flag)).is_err() {
        log::warn!("failed to install SIGWINCH handler");
        return;
    }
    std::thread::spawn(move || {
        crate::crash::guard("client-resize-watcher", move || {
            let mut last = window_size(std::io::stdin().as_raw_fd()).unwrap_or((24, 80));
            loop {
                if stopped.load(Ordering::Relaxed) {
                    break;
                }
                if flag.swap(false, Ordering::Relaxed) {
                    if let Ok(size) = window_size(std::io::stdin().as_raw_fd()) {
                        if size != last {
                            last = size;
                            let frame = Frame::Resize {
                                rows: size.0,
                                cols: size.1,
                            };
                            if outbound_tx.send(frame.encode()).is_err() {
                                break;
                            }
                        }
                    }
                }
                std::thread::sleep(Duration::from_millis(50));
            }
        });
    });
}

/// `ServerClosed` reasons that mean another party took control of the
/// session, rather than the child exiting or a protocol error (§4.2.4).
const TAKEOVER_REASONS: &[&str] = &["Another client connected", "Local user took over"];

/// Reports an attach session's outcome and blocks for Enter before handing
/// control back to the shell (§4.2.6/§7). A takeover is shown as a
/// reverse-video banner with a reconnect hint; every other outcome is a
/// plain line — but all of them wait, so the message isn't lost the instant
/// the shell prints its next prompt.
pub fn report_outcome(outcome: &ClientOutcome, reconnect_hint: &str) {
    match outcome {
        ClientOutcome::Detached => {
            println!("Detached. Reconnect with: {reconnect_hint}");
        }
        ClientOutcome::ServerClosed { reason } if TAKEOVER_REASONS.contains(&reason.as_str()) => {
            println!("\x1b[7mSession taken over. Reconnect with: {reconnect_hint}\x1b[0m");
        }
        ClientOutcome::ServerClosed { reason } => {
            println!("Session disconnected: {reason}");
        }
        ClientOutcome::Disconnected => {
            println!("Session disconnected.");
        }
    }
    wait_for_enter();
}

fn wait_for_enter() {
    println!("Press Enter to continue...");
    let mut buf = String::new();
    let _ = std::io::stdin().read_line(&mut buf);
}

async fn read_welcome(
    read_half: &mut (impl AsyncReadExt + Unpin),
    decoder: &mut FrameDecoder,
) -> Result<Frame> {
    tokio::time::timeout(Duration::from_secs(5), async {
        let mut buf = [0u8; 4096];
        loop {
            let n = read_half.read(&mut buf).await?;
            if n == 0 {
                bail!("connection closed before WELCOME arrived");
            }
            let frames = decoder.feed(&buf[..n])?;
            if let Some(frame) = frames.into_iter().next() {
                return Ok(frame);
            }
        }
    })
    .await
    .context("timed out waiting for WELCOME")?
}

/// Small helper trait so `spawn_stdin_reader` reads raw bytes without
/// going through `Stdin`'s line-buffering lock, mirroring the donor's
/// `RawInputReader::read_available` rationale for bypassing the standard
/// `BufReader` around fd 0.
trait ReadRaw {
    fn read_raw(&self, buf: &mut [u8]) -> std::io::Result<usize>;
}

impl ReadRaw for std::io::Stdin {
    fn read_raw(&self, buf: &mut [u8]) -> std::io::Result<usize> {
        let fd = self.as_raw_fd();
        let n = unsafe { libc::read(fd, buf.as_mut_ptr() as *mut libc::c_void, buf.len()) };
        if n < 0 {
            return Err(std::io::Error::last_os_error());
        }
        Ok(n as usize)
    }
}
