//! Input translation: host key/mouse events to PTY byte sequences (§4.1.1,
//! §6 key-to-byte table).
//!
//! The panel receives decoded `crossterm::event` values (the host screen
//! dependency, §1/§4.1.10) rather than raw stdin bytes, so — unlike the
//! donor's `RawInputReader`, which classifies already-raw bytes read off
//! fd 0 — this module's job runs in the other direction: turn a decoded key
//! back into the exact byte sequence a real terminal would have produced.
//! The descriptor-classification *shape* (one function per key class, a
//! small named table for function keys) mirrors `tui/raw_input.rs`.

use crossterm::event::{KeyCode, KeyModifiers, MouseButton, MouseEvent, MouseEventKind};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScrollDirection {
    Up,
    Down,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MouseAction {
    Scroll(ScrollDirection),
    LeftDown { row: u16, col: u16 },
    LeftDrag { row: u16, col: u16 },
    LeftUp { row: u16, col: u16 },
    /// Any other button/kind — absorbed rather than forwarded, so stray
    /// mouse events never steal focus from the inner application (§4.1.1).
    Absorbed,
}

/// Encode a decoded key event into the byte sequence a raw terminal would
/// have sent for it (§6 table). Returns `None` for keys with no PTY-level
/// encoding (bare modifier presses, media keys, etc).
pub fn encode_key(code: KeyCode, modifiers: KeyModifiers) -> Option<Vec<u8>> {
    if modifiers.contains(KeyModifiers::CONTROL) {
        if let KeyCode::Char(c) = code {
            if let Some(bytes) = encode_ctrl_char(c) {
                return Some(bytes);
            }
        }
    }

    match code {
        KeyCode::Enter => Some(b"\r".to_vec()),
        KeyCode::Tab => Some(b"\t".to_vec()),
        KeyCode::BackTab => Some(b"\x1b[Z".to_vec()),
        KeyCode::Backspace => Some(vec![0x7f]),
        KeyCode::Esc => Some(vec![0x1b]),
        KeyCode::Up => Some(b"\x1b[A".to_vec()),
        KeyCode::Down => Some(b"\x1b[B".to_vec()),
        KeyCode::Right => Some(b"\x1b[C".to_vec()),
        KeyCode::Left => Some(b"\x1b[D".to_vec()),
        KeyCode::Home => Some(b"\x1b[H".to_vec()),
        KeyCode::End => Some(b"\x1b[F".to_vec()),
        KeyCode::PageUp => Some(b"\x1b[5~".to_vec()),
        KeyCode::PageDown => Some(b"\x1b[6~".to_vec()),
        KeyCode::Insert => Some(b"\x1b[2~".to_vec()),
        KeyCode::Delete => Some(b"\x1b[3~".to_vec()),
        KeyCode::F(n) => encode_function_key(n),
        KeyCode::Char(c) => Some(encode_char(c, modifiers)),
        _ => None,
    }
}

fn encode_ctrl_char(c: char) -> Option<Vec<u8>> {
    let lower = c.to_ascii_lowercase();
    match lower {
        'a'..='z' => Some(vec![(lower as u8) - b'a' + 1]),
        '\\' => Some(vec![0x1c]),
        ']' => Some(vec![0x1d]),
        '^' => Some(vec![0x1e]),
        '_' => Some(vec![0x1f]),
        _ => None,
    }
}

fn encode_function_key(n: u8) -> Option<Vec<u8>> {
    Some(
        match n {
            1 => b"\x1bOP".to_vec(),
            2 => b"\x1bOQ".to_vec(),
            3 => b"\x1bOR".to_vec(),
            4 => b"\x1bOS".to_vec(),
            5 => b"\x1b[15~".to_vec(),
            6 => b"\x1b[17~".to_vec(),
            7 => b"\x1b[18~".to_vec(),
            8 => b"\x1b[19~".to_vec(),
            9 => b"\x1b[20~".to_vec(),
            10 => b"\x1b[21~".to_vec(),
            11 => b"\x1b[23~".to_vec(),
            12 => b"\x1b[24~".to_vec(),
            _ => return None,
        },
    )
}

fn encode_char(c: char, modifiers: KeyModifiers) -> Vec<u8> {
    let mut buf = [0u8; 4];
    let utf8 = c.encode_utf8(&mut buf).as_bytes();
    if modifiers.contains(KeyModifiers::ALT) {
        let mut bytes = vec![0x1b];
        bytes.extend_from_slice(utf8);
        bytes
    } else {
        utf8.to_vec()
    }
}

/// Classify a mouse event for the panel's selection/scroll state machine
/// (§4.1.1). `row`/`col` are screen-relative, not unified coordinates —
/// the panel maps them into unified space using its own scroll offset.
pub fn classify_mouse(event: &MouseEvent) -> MouseAction {
    match event.kind {
        MouseEventKind::ScrollUp => MouseAction::Scroll(ScrollDirection::Up),
        MouseEventKind::ScrollDown => MouseAction::Scroll(ScrollDirection::Down),
        MouseEventKind::Down(MouseButton::Left) => MouseAction::LeftDown {
            row: event.row,
            col: event.column,
        },
        MouseEventKind::Drag(MouseButton::Left) => MouseAction::LeftDrag {
            row: event.row,
            col: event.column,
        },
        MouseEventKind::Up(MouseButton::Left) => MouseAction::LeftUp {
            row: event.row,
            col: event.column,
        },
        _ => MouseAction::Absorbed,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn enter_tab_backspace_escape() {
        assert_eq!(encode_key(KeyCode::Enter, KeyModifiers::NONE), Some(b"\r".to_vec()));
        assert_eq!(encode_key(KeyCode::Tab, KeyModifiers::NONE), Some(b"\t".to_vec()));
        assert_eq!(encode_key(KeyCode::Backspace, KeyModifiers::NONE), Some(vec![0x7f]));
        assert_eq!(encode_key(KeyCode::Esc, KeyModifiers::NONE), Some(vec![0x1b]));
    }

    #[test]
    fn arrow_keys() {
        assert_eq!(encode_key(KeyCode::Up, KeyModifiers::NONE), Some(b"\x1b[A".to_vec()));
        assert_eq!(encode_key(KeyCode::Down, KeyModifiers::NONE), Some(b"\x1b[B".to_vec()));
        assert_eq!(encode_key(KeyCode::Right, KeyModifiers::NONE), Some(b"\x1b[C".to_vec()));
        assert_eq!(encode_key(KeyCode::Left, KeyModifiers::NONE), Some(b"\x1b[D".to_vec()));
    }

    #[test]
    fn home_end_page_insert_delete() {
        assert_eq!(encode_key(KeyCode::Home, KeyModifiers::NONE), Some(b"\x1b[H".to_vec()));
        assert_eq!(encode_key(KeyCode::End, KeyModifiers::NONE), Some(b"\x1b[F".to_vec()));
        assert_eq!(encode_key(KeyCode::PageUp, KeyModifiers::NONE), Some(b"\x1b[5~".to_vec()));
        assert_eq!(encode_key(KeyCode::PageDown, KeyModifiers::NONE), Some(b"\x1b[6~".to_vec()));
        assert_eq!(encode_key(KeyCode::Insert, KeyModifiers::NONE), Some(b"\x1b[2~".to_vec()));
        assert_eq!(encode_key(KeyCode::Delete, KeyModifiers::NONE), Some(b"\x1b[3~".to_vec()));
    }

    #[test]
    fn function_keys_f1_through_f12() {
        assert_eq!(encode_key(KeyCode::F(1), KeyModifiers::NONE), Some(b"\x1bOP".to_vec()));
        assert_eq!(encode_key(KeyCode::F(4), KeyModifiers::NONE), Some(b"\x1bOS".to_vec()));
        assert_eq!(encode_key(KeyCode::F(5), KeyModifiers::NONE), Some(b"\x1b[15~".to_vec()));
        assert_eq!(encode_key(KeyCode::F(12), KeyModifiers::NONE), Some(b"\x1b[24~".to_vec()));
        assert_eq!(encode_key(KeyCode::F(13), KeyModifiers::NONE), None);
    }

    #[test]
    fn ctrl_letters_map_to_control_codes() {
        assert_eq!(
            encode_key(KeyCode::Char('a'), KeyModifiers::CONTROL),
            Some(vec![0x01])
        );
        assert_eq!(
            encode_key(KeyCode::Char('z'), KeyModifiers::CONTROL),
            Some(vec![0x1a])
        );
        assert_eq!(
            encode_key(KeyCode::Char('\\'), KeyModifiers::CONTROL),
            Some(vec![0x1c])
        );
        assert_eq!(
            encode_key(KeyCode::Char(']'), KeyModifiers::CONTROL),
            Some(vec![0x1d])
        );
        assert_eq!(
            encode_key(KeyCode::Char('_'), KeyModifiers::CONTROL),
            Some(vec![0x1f])
        );
    }

    #[test]
    fn printable_and_utf8_runes() {
        assert_eq!(encode_key(KeyCode::Char('x'), KeyModifiers::NONE), Some(b"x".to_vec()));
        assert_eq!(encode_key(KeyCode::Char('€'), KeyModifiers::NONE), Some("€".as_bytes().to_vec()));
    }

    #[test]
    fn alt_char_gets_escape_prefix() {
        assert_eq!(
            encode_key(KeyCode::Char('x'), KeyModifiers::ALT),
            Some(vec![0x1b, b'x'])
        );
    }

    #[test]
    fn mouse_scroll_classified() {
        let event = MouseEvent {
            kind: MouseEventKind::ScrollUp,
            column: 0,
            row: 0,
            modifiers: KeyModifiers::NONE,
        };
        assert_eq!(classify_mouse(&event), MouseAction::Scroll(ScrollDirection::Up));
    }

    #[test]
    fn non_left_mouse_button_absorbed() {
        let event = MouseEvent {
            kind: MouseEventKind::Down(MouseButton::Right),
            column: 3,
            row: 4,
            modifiers: KeyModifiers::NONE,
        };
        assert_eq!(classify_mouse(&event), MouseAction::Absorbed);
    }
}
