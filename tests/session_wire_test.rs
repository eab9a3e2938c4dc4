//! Socket-level integration tests for the framing protocol (§8 "Framing
//! round-trip" / "HELLO / WELCOME round-trip") and session discovery/listing
//! (§8 "Single-server invariant"), exercised over real Unix-domain sockets
//! rather than in-memory buffers so partial reads and OS-level chunking are
//! part of what's tested.

use std::path::PathBuf;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{UnixListener, UnixStream};

use termsession::session::{discover_role, Frame, FrameDecoder, Role, SessionConfig};

async fn read_one_frame(stream: &mut UnixStream, decoder: &mut FrameDecoder) -> Frame {
    loop {
        let mut buf = [0u8; 4096];
        let n = stream.read(&mut buf).await.expect("read");
        assert!(n > 0, "peer closed before a full frame arrived");
        let frames = decoder.feed(&buf[..n]).expect("decode");
        if let Some(frame) = frames.into_iter().next() {
            return frame;
        }
    }
}

#[tokio::test]
async fn hello_welcome_roundtrip_over_real_socket() {
    let dir = tempfile::tempdir().expect("tempdir");
    let socket_path = dir.path().join("wire.sock");

    let listener = UnixListener::bind(&socket_path).expect("bind");

    let server = tokio::spawn(async move {
        let (mut stream, _addr) = listener.accept().await.expect("accept");
        let mut decoder = FrameDecoder::new();
        let hello = read_one_frame(&mut stream, &mut decoder).await;
        match hello {
            Frame::Hello { rows, cols, version } => {
                assert_eq!((rows, cols), (24, 80));
                let welcome = Frame::Welcome {
                    accepted: true,
                    name: "proj".to_string(),
                    version,
                    reason: String::new(),
                };
                stream.write_all(&welcome.encode()).await.expect("write welcome");
            }
            other => panic!("expected Hello, got {other:?}"),
        }
    });

    let mut client = UnixStream::connect(&socket_path).await.expect("connect");
    let hello = Frame::Hello {
        rows: 24,
        cols: 80,
        version: "0.1.0".to_string(),
    };
    client.write_all(&hello.encode()).await.expect("write hello");

    let mut decoder = FrameDecoder::new();
    let welcome = read_one_frame(&mut client, &mut decoder).await;
    match welcome {
        Frame::Welcome { accepted, name, reason, .. } => {
            assert!(accepted);
            assert_eq!(name, "proj");
            assert!(reason.is_empty());
        }
        other => panic!("expected Welcome, got {other:?}"),
    }

    server.await.expect("server task panicked");
}

#[tokio::test]
async fn multiple_frames_in_one_read_are_all_decoded() {
    let dir = tempfile::tempdir().expect("tempdir");
    let socket_path = dir.path().join("burst.sock");
    let listener = UnixListener::bind(&socket_path).expect("bind");

    let server = tokio::spawn(async move {
        let (mut stream, _addr) = listener.accept().await.expect("accept");
        let mut batch = Vec::new();
        batch.extend_from_slice(&Frame::Data(b"ls\r".to_vec()).encode());
        batch.extend_from_slice(&Frame::Resize { rows: 40, cols: 120 }.encode());
        batch.extend_from_slice(
            &Frame::Close {
                reason: "exited".to_string(),
            }
            .encode(),
        );
        stream.write_all(&batch).await.expect("write batch");
    });

    let mut client = UnixStream::connect(&socket_path).await.expect("connect");
    let mut decoder = FrameDecoder::new();
    let mut frames = Vec::new();
    while frames.len() < 3 {
        let mut buf = [0u8; 4096];
        let n = client.read(&mut buf).await.expect("read");
        frames.extend(decoder.feed(&buf[..n]).expect("decode"));
    }

    assert_eq!(frames[0], Frame::Data(b"ls\r".to_vec()));
    assert_eq!(frames[1], Frame::Resize { rows: 40, cols: 120 });
    assert_eq!(
        frames[2],
        Frame::Close {
            reason: "exited".to_string()
        }
    );

    server.await.expect("server task panicked");
}

#[test]
fn single_server_invariant_via_discovery_and_listing() {
    let dir = tempfile::tempdir().expect("tempdir");
    let sessions_root: PathBuf = dir.path().to_path_buf();

    let config = SessionConfig::new("/tmp/some-project");
    let socket_path = config.socket_path(&sessions_root);

    // No server yet: this process should become one.
    assert_eq!(discover_role(&socket_path), Role::Server);

    // Simulate a running server by binding the socket ourselves.
    let listener = std::os::unix::net::UnixListener::bind(&socket_path).expect("bind");

    // A second process probing the same path must see Client, not Server.
    assert_eq!(discover_role(&socket_path), Role::Client);

    let sessions = termsession::session::list_sessions(&sessions_root).expect("list");
    assert_eq!(sessions.len(), 1);
    assert!(sessions[0].alive);

    drop(listener);
}
