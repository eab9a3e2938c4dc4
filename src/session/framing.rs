//! Binary framing protocol for the session socket.
//!
//! Wire format: `[type: u8][length: u32 big-endian][payload: length bytes]`.
//! `length` is the payload length only (the 5-byte header is not counted).
//! Maximum payload is [`MAX_FRAME_PAYLOAD`] bytes; larger frames are rejected
//! as malformed rather than silently truncated.

use anyhow::{bail, Result};

/// Largest payload a single frame may carry (§3 `Frame`).
pub const MAX_FRAME_PAYLOAD: u32 = 1024 * 1024;

/// Current protocol/handshake version string, also the crate version.
pub const PROTOCOL_VERSION: &str = env!("CARGO_PKG_VERSION");

mod frame_type {
    pub const DATA: u8 = 1;
    pub const RESIZE: u8 = 2;
    pub const CLOSE: u8 = 3;
    pub const HELLO: u8 = 4;
    pub const WELCOME: u8 = 5;
}

/// One decoded protocol message (§4.2.2).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Frame {
    /// Raw bytes: PTY output server→client, keystrokes/paste client→server.
    Data(Vec<u8>),
    /// Client's observed terminal size changed.
    Resize {
        /// Terminal rows.
        rows: u16,
        /// Terminal columns.
        cols: u16,
    },
    /// Either side is ending the connection; payload is a human-readable reason.
    Close {
        /// UTF-8 reason text shown to the user.
        reason: String,
    },
    /// Client → server handshake opener.
    Hello {
        /// Client's terminal rows at connect time.
        rows: u16,
        /// Client's terminal columns at connect time.
        cols: u16,
        /// Client's protocol version string.
        version: String,
    },
    /// Server → client handshake reply.
    Welcome {
        /// Whether the server accepted the connection.
        accepted: bool,
        /// Session name, populated only when accepted.
        name: String,
        /// Server's protocol version string.
        version: String,
        /// Rejection reason, populated only when not accepted.
        reason: String,
    },
}

impl Frame {
    /// Encode this frame as a single contiguous buffer (one host write).
    pub fn encode(&self) -> Vec<u8> {
        match self {
            Frame::Data(bytes) => encode_raw(frame_type::DATA, bytes.clone()),
            Frame::Resize { rows, cols } => {
                let mut payload = Vec::with_capacity(4);
                payload.extend_from_slice(&rows.to_be_bytes());
                payload.extend_from_slice(&cols.to_be_bytes());
                encode_raw(frame_type::RESIZE, payload)
            }
            Frame::Close { reason } => encode_raw(frame_type::CLOSE, reason.clone().into_bytes()),
            Frame::Hello { rows, cols, version } => {
                encode_raw(frame_type::HELLO, encode_hello(*rows, *cols, version))
            }
            Frame::Welcome {
                accepted,
                name,
                version,
                reason,
            } => encode_raw(
                frame_type::WELCOME,
                encode_welcome(*accepted, name, version, reason),
            ),
        }
    }
}

fn encode_raw(frame_type: u8, payload: Vec<u8>) -> Vec<u8> {
    let mut out = Vec::with_capacity(5 + payload.len());
    out.push(frame_type);
    out.extend_from_slice(&(payload.len() as u32).to_be_bytes());
    out.extend_from_slice(&payload);
    out
}

/// Encode a HELLO payload: `u16 rows, u16 cols, u16 version_len, version bytes`.
pub fn encode_hello(rows: u16, cols: u16, version: &str) -> Vec<u8> {
    let version_bytes = version.as_bytes();
    let mut out = Vec::with_capacity(6 + version_bytes.len());
    out.extend_from_slice(&rows.to_be_bytes());
    out.extend_from_slice(&cols.to_be_bytes());
    out.extend_from_slice(&(version_bytes.len() as u16).to_be_bytes());
    out.extend_from_slice(version_bytes);
    out
}

/// Decode a HELLO payload.
pub fn decode_hello(payload: &[u8]) -> Result<(u16, u16, String)> {
    if payload.len() < 6 {
        bail!("truncated HELLO: need at least 6 bytes, got {}", payload.len());
    }
    let rows = u16::from_be_bytes([payload[0], payload[1]]);
    let cols = u16::from_be_bytes([payload[2], payload[3]]);
    let version_len = u16::from_be_bytes([payload[4], payload[5]]) as usize;
    let rest = &payload[6..];
    if rest.len() < version_len {
        bail!("truncated HELLO: version string cut short");
    }
    let version = String::from_utf8(rest[..version_len].to_vec())?;
    Ok((rows, cols, version))
}

/// Encode a WELCOME payload: `u8 accepted, u16+name, u16+version, u16+reason`.
pub fn encode_welcome(accepted: bool, name: &str, version: &str, reason: &str) -> Vec<u8> {
    let name_bytes = name.as_bytes();
    let version_bytes = version.as_bytes();
    let reason_bytes = reason.as_bytes();
    let mut out = Vec::with_capacity(7 + name_bytes.len() + version_bytes.len() + reason_bytes.len());
    out.push(u8::from(accepted));
    out.extend_from_slice(&(name_bytes.len() as u16).to_be_bytes());
    out.extend_from_slice(name_bytes);
    out.extend_from_slice(&(version_bytes.len() as u16).to_be_bytes());
    out.extend_from_slice(version_bytes);
    out.extend_from_slice(&(reason_bytes.len() as u16).to_be_bytes());
    out.extend_from_slice(reason_bytes);
    out
}

/// Decode a WELCOME payload.
pub fn decode_welcome(payload: &[u8]) -> Result<(bool, String, String, String)> {
    if payload.is_empty() {
        bail!("truncated WELCOME: missing accepted byte");
    }
    let accepted = payload[0] != 0;
    let mut pos = 1;

    let name = read_length_prefixed(payload, &mut pos, "name")?;
    let version = read_length_prefixed(payload, &mut pos, "version")?;
    let reason = read_length_prefixed(payload, &mut pos, "reason")?;

    Ok((accepted, name, version, reason))
}

fn read_length_prefixed(payload: &[u8], pos: &mut usize, field: &str) -> Result<String> {
    if payload.len() < *pos + 2 {
        bail!("truncated WELCOME: missing {field} length");
    }
    let len = u16::from_be_bytes([payload[*pos], payload[*pos + 1]]) as usize;
    *pos += 2;
    if payload.len() < *pos + len {
        bail!("truncated WELCOME: {field} cut short");
    }
    let value = String::from_utf8(payload[*pos..*pos + len].to_vec())?;
    *pos += len;
    Ok(value)
}

fn decode_frame(frame_type: u8, payload: Vec<u8>) -> Result<Frame> {
    match frame_type {
        frame_type::DATA => Ok(Frame::Data(payload)),
        frame_type::RESIZE => {
            if payload.len() < 4 {
                bail!("truncated RESIZE: need 4 bytes, got {}", payload.len());
            }
            let rows = u16::from_be_bytes([payload[0], payload[1]]);
            let cols = u16::from_be_bytes([payload[2], payload[3]]);
            Ok(Frame::Resize { rows, cols })
        }
        frame_type::CLOSE => Ok(Frame::Close {
            reason: String::from_utf8(payload)?,
        }),
        frame_type::HELLO => {
            let (rows, cols, version) = decode_hello(&payload)?;
            Ok(Frame::Hello { rows, cols, version })
        }
        frame_type::WELCOME => {
            let (accepted, name, version, reason) = decode_welcome(&payload)?;
            Ok(Frame::Welcome {
                accepted,
                name,
                version,
                reason,
            })
        }
        other => bail!("unknown frame type {other}"),
    }
}

/// Incremental frame decoder — feed it arbitrary byte chunks as they arrive
/// off the socket and it reassembles complete frames, tolerating partial
/// reads and multiple frames landing in a single read.
#[derive(Debug, Default)]
pub struct FrameDecoder {
    buf: Vec<u8>,
}

impl FrameDecoder {
    /// Create an empty decoder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed newly read bytes in; returns every frame that is now complete.
    pub fn feed(&mut self, bytes: &[u8]) -> Result<Vec<Frame>> {
        self.buf.extend_from_slice(bytes);
        let mut frames = Vec::new();

        loop {
            if self.buf.len() < 5 {
                break;
            }
            let frame_type = self.buf[0];
            let length = u32::from_be_bytes([self.buf[1], self.buf[2], self.buf[3], self.buf[4]]);
            if length > MAX_FRAME_PAYLOAD {
                bail!("frame too large: {length} bytes (max {MAX_FRAME_PAYLOAD})");
            }
            let total = 5 + length as usize;
            if self.buf.len() < total {
                break; // wait for more data
            }
            let payload = self.buf[5..total].to_vec();
            let frame = decode_frame(frame_type, payload)?;
            self.buf.drain(..total);
            frames.push(frame);
        }

        Ok(frames)
    }

    /// True if bytes are buffered that do not yet form a complete frame.
    pub fn has_partial(&self) -> bool {
        !self.buf.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn roundtrip(frame: Frame) {
        let encoded = frame.encode();
        let mut decoder = FrameDecoder::new();
        let decoded = decoder.feed(&encoded).expect("decode failed");
        assert_eq!(decoded, vec![frame]);
        assert!(!decoder.has_partial());
    }

    #[test]
    fn data_roundtrip() {
        roundtrip(Frame::Data(b"hello world".to_vec()));
    }

    #[test]
    fn empty_data_roundtrip() {
        roundtrip(Frame::Data(Vec::new()));
    }

    #[test]
    fn resize_roundtrip() {
        roundtrip(Frame::Resize { rows: 24, cols: 80 });
    }

    #[test]
    fn close_roundtrip() {
        roundtrip(Frame::Close {
            reason: "process exited".to_string(),
        });
    }

    #[test]
    fn hello_roundtrip() {
        roundtrip(Frame::Hello {
            rows: 40,
            cols: 120,
            version: "1.2.3".to_string(),
        });
    }

    #[test]
    fn welcome_accepted_roundtrip() {
        roundtrip(Frame::Welcome {
            accepted: true,
            name: "my-project".to_string(),
            version: "1.2.3".to_string(),
            reason: String::new(),
        });
    }

    #[test]
    fn welcome_rejected_roundtrip() {
        roundtrip(Frame::Welcome {
            accepted: false,
            name: String::new(),
            version: "1.2.3".to_string(),
            reason: "version mismatch: client=1.0.0 server=1.2.3".to_string(),
        });
    }

    #[test]
    fn multiple_frames_in_single_feed() {
        let mut encoded = Frame::Data(b"a".to_vec()).encode();
        encoded.extend(Frame::Data(b"b".to_vec()).encode());
        encoded.extend(Frame::Close {
            reason: "bye".to_string(),
        }.encode());

        let mut decoder = FrameDecoder::new();
        let frames = decoder.feed(&encoded).expect("decode failed");
        assert_eq!(frames.len(), 3);
        assert_eq!(frames[0], Frame::Data(b"a".to_vec()));
        assert_eq!(frames[1], Frame::Data(b"b".to_vec()));
        assert_eq!(
            frames[2],
            Frame::Close {
                reason: "bye".to_string()
            }
        );
    }

    #[test]
    fn partial_frame_reassembly() {
        let encoded = Frame::Data(b"hello world".to_vec()).encode();
        let mut decoder = FrameDecoder::new();

        let first_half = decoder.feed(&encoded[..6]).expect("decode failed");
        assert!(first_half.is_empty());
        assert!(decoder.has_partial());

        let rest = decoder.feed(&encoded[6..]).expect("decode failed");
        assert_eq!(rest, vec![Frame::Data(b"hello world".to_vec())]);
        assert!(!decoder.has_partial());
    }

    #[test]
    fn byte_at_a_time_reassembly() {
        let encoded = Frame::Resize { rows: 10, cols: 20 }.encode();
        let mut decoder = FrameDecoder::new();
        let mut frames = Vec::new();
        for byte in &encoded {
            frames.extend(decoder.feed(&[*byte]).expect("decode failed"));
        }
        assert_eq!(frames, vec![Frame::Resize { rows: 10, cols: 20 }]);
    }

    #[test]
    fn oversized_frame_rejected() {
        let mut header = vec![frame_type::DATA];
        header.extend_from_slice(&(MAX_FRAME_PAYLOAD + 1).to_be_bytes());
        let mut decoder = FrameDecoder::new();
        let err = decoder.feed(&header).expect_err("should reject oversize frame");
        assert!(err.to_string().contains("frame too large"));
    }

    #[test]
    fn unknown_frame_type_rejected() {
        let mut header = vec![0xffu8];
        header.extend_from_slice(&0u32.to_be_bytes());
        let mut decoder = FrameDecoder::new();
        let err = decoder.feed(&header).expect_err("should reject unknown type");
        assert!(err.to_string().contains("unknown frame type"));
    }

    #[test]
    fn hello_truncated_version() {
        let mut payload = Vec::new();
        payload.extend_from_slice(&24u16.to_be_bytes());
        payload.extend_from_slice(&80u16.to_be_bytes());
        payload.extend_from_slice(&10u16.to_be_bytes()); // claims 10 bytes of version
        payload.extend_from_slice(b"abc"); // only 3 present
        let err = decode_hello(&payload).expect_err("should fail on truncation");
        assert!(err.to_string().contains("truncated"));
    }

    #[test]
    fn welcome_truncated_at_every_boundary() {
        let full = encode_welcome(true, "proj", "1.0.0", "");
        for cut in 0..full.len() {
            // Not every cut is guaranteed to fail (some land on an exact field
            // boundary with a following field legitimately empty), but no cut
            // may panic.
            let _ = decode_welcome(&full[..cut]);
        }
        // A cut strictly inside the name length prefix must fail explicitly.
        let err = decode_welcome(&full[..2]).expect_err("should fail, not panic");
        assert!(err.to_string().contains("truncated"));
    }

    #[test]
    fn large_data_frame() {
        let data = vec![0x42u8; 256 * 1024];
        roundtrip(Frame::Data(data));
    }

    #[test]
    fn zero_length_data_is_not_an_error() {
        let encoded = Frame::Data(Vec::new()).encode();
        assert_eq!(encoded.len(), 5);
    }
}
