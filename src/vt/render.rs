//! Style conversion, border glyphs, and the loading spinner used by
//! `VtPanel::render` (§4.1.2). Grounded on the donor's
//! `terminal.rs::to_ratatui_color` palette mapping and `terminal_widget.rs`'s
//! cell-to-style conversion.

use alacritty_terminal::vte::ansi::{Color, NamedColor};
use ratatui::style::{Color as RColor, Modifier, Style};

use super::emulator::Glyph;

/// Convert an alacritty color to the ratatui equivalent.
pub fn to_ratatui_color(color: Color) -> RColor {
    match color {
        Color::Named(name) => named_to_ratatui(name),
        Color::Indexed(idx) => RColor::Indexed(idx),
        Color::Spec(rgb) => RColor::Rgb(rgb.r, rgb.g, rgb.b),
    }
}

fn named_to_ratatui(color: NamedColor) -> RColor {
    match color {
        NamedColor::Black | NamedColor::DimBlack => RColor::Indexed(0),
        NamedColor::Red | NamedColor::DimRed => RColor::Indexed(1),
        NamedColor::Green | NamedColor::DimGreen => RColor::Indexed(2),
        NamedColor::Yellow | NamedColor::DimYellow => RColor::Indexed(3),
        NamedColor::Blue | NamedColor::DimBlue => RColor::Indexed(4),
        NamedColor::Magenta | NamedColor::DimMagenta => RColor::Indexed(5),
        NamedColor::Cyan | NamedColor::DimCyan => RColor::Indexed(6),
        NamedColor::White | NamedColor::DimWhite => RColor::Indexed(7),
        NamedColor::BrightBlack => RColor::Indexed(8),
        NamedColor::BrightRed => RColor::Indexed(9),
        NamedColor::BrightGreen => RColor::Indexed(10),
        NamedColor::BrightYellow => RColor::Indexed(11),
        NamedColor::BrightBlue => RColor::Indexed(12),
        NamedColor::BrightMagenta => RColor::Indexed(13),
        NamedColor::BrightCyan => RColor::Indexed(14),
        NamedColor::BrightWhite => RColor::Indexed(15),
        NamedColor::Foreground | NamedColor::BrightForeground | NamedColor::DimForeground => {
            RColor::Reset
        }
        NamedColor::Background | NamedColor::Cursor => RColor::Reset,
    }
}

/// Style a glyph for display, with `selected` applying a reverse-video
/// override regardless of the glyph's own attributes (§4.1.5).
pub fn style_for_glyph(glyph: &Glyph, selected: bool) -> Style {
    let mut style = Style::default()
        .fg(to_ratatui_color(glyph.fg))
        .bg(to_ratatui_color(glyph.bg));

    if glyph.bold {
        style = style.add_modifier(Modifier::BOLD);
    }
    if glyph.dim {
        style = style.add_modifier(Modifier::DIM);
    }
    if glyph.underline {
        style = style.add_modifier(Modifier::UNDERLINED);
    }
    if glyph.blink {
        style = style.add_modifier(Modifier::SLOW_BLINK);
    }
    if glyph.reverse != selected {
        // XOR: either the glyph itself is reverse-video, or the selection
        // override flips it, but both at once cancel back out.
        style = style.add_modifier(Modifier::REVERSED);
    }
    style
}

/// Border glyph set: `[top-left, top, top-right, left, right, bottom-left, bottom, bottom-right]`.
pub struct BorderGlyphs {
    pub top_left: char,
    pub top: char,
    pub top_right: char,
    pub left: char,
    pub right: char,
    pub bottom_left: char,
    pub bottom: char,
    pub bottom_right: char,
}

const FOCUSED_BORDER: BorderGlyphs = BorderGlyphs {
    top_left: '╔',
    top: '═',
    top_right: '╗',
    left: '║',
    right: '║',
    bottom_left: '╚',
    bottom: '═',
    bottom_right: '╝',
};

const UNFOCUSED_BORDER: BorderGlyphs = BorderGlyphs {
    top_left: '┌',
    top: '─',
    top_right: '┐',
    left: '│',
    right: '│',
    bottom_left: '└',
    bottom: '─',
    bottom_right: '┘',
};

/// The border glyph set for a panel's current focus state (§4.1.2).
pub fn border_glyphs(focused: bool) -> &'static BorderGlyphs {
    if focused {
        &FOCUSED_BORDER
    } else {
        &UNFOCUSED_BORDER
    }
}

/// Braille spinner frames, advanced roughly every 80 ms while waiting for
/// first output (§4.1.2).
const SPINNER_FRAMES: [char; 10] = ['⠋', '⠙', '⠹', '⠸', '⠼', '⠴', '⠦', '⠧', '⠇', '⠏'];

pub fn spinner_frame(tick: u64) -> char {
    SPINNER_FRAMES[(tick as usize) % SPINNER_FRAMES.len()]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn focused_and_unfocused_borders_differ() {
        assert_ne!(border_glyphs(true).top_left, border_glyphs(false).top_left);
    }

    #[test]
    fn spinner_cycles() {
        let frame0 = spinner_frame(0);
        let frame_wrap = spinner_frame(SPINNER_FRAMES.len() as u64);
        assert_eq!(frame0, frame_wrap);
    }

    #[test]
    fn bold_glyph_gets_bold_modifier() {
        let glyph = Glyph {
            c: 'x',
            fg: Color::Named(NamedColor::Foreground),
            bg: Color::Named(NamedColor::Background),
            bold: true,
            dim: false,
            underline: false,
            reverse: false,
            blink: false,
        };
        let style = style_for_glyph(&glyph, false);
        assert!(style.add_modifier.contains(Modifier::BOLD));
    }

    #[test]
    fn selection_flips_reverse() {
        let glyph = Glyph {
            c: 'x',
            fg: Color::Named(NamedColor::Foreground),
            bg: Color::Named(NamedColor::Background),
            bold: false,
            dim: false,
            underline: false,
            reverse: false,
            blink: false,
        };
        let selected = style_for_glyph(&glyph, true);
        let unselected = style_for_glyph(&glyph, false);
        assert!(selected.add_modifier.contains(Modifier::REVERSED));
        assert!(!unselected.add_modifier.contains(Modifier::REVERSED));
    }
}
