//! Lowering of US-ASCII characters to keystrokes.
//!
//! The mapping encodes the US keyboard layout's shift pairs: `!` is
//! shift+`1`, `{` is shift+`LeftBracket`, and so on. Newline and carriage
//! return both lower to `Enter`. Characters outside the table (including all
//! non-ASCII) have no keystroke form.

use serde::{Deserialize, Serialize};

use crate::Key;

/// A single keystroke: the key to press and whether shift is held for it.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct KeyPress {
    /// The key producing the character.
    pub key: Key,
    /// True when the character requires a held shift.
    pub shifted: bool,
}

impl KeyPress {
    const fn plain(key: Key) -> Self {
        Self { key, shifted: false }
    }

    const fn shift(key: Key) -> Self {
        Self { key, shifted: true }
    }
}

const LETTERS: [Key; 26] = [
    Key::A,
    Key::B,
    Key::C,
    Key::D,
    Key::E,
    Key::F,
    Key::G,
    Key::H,
    Key::I,
    Key::J,
    Key::K,
    Key::L,
    Key::M,
    Key::N,
    Key::O,
    Key::P,
    Key::Q,
    Key::R,
    Key::S,
    Key::T,
    Key::U,
    Key::V,
    Key::W,
    Key::X,
    Key::Y,
    Key::Z,
];

const DIGITS: [Key; 10] = [
    Key::Digit0,
    Key::Digit1,
    Key::Digit2,
    Key::Digit3,
    Key::Digit4,
    Key::Digit5,
    Key::Digit6,
    Key::Digit7,
    Key::Digit8,
    Key::Digit9,
];

/// Returns the keystroke producing `ch` on a US layout, or `None` when the
/// character has no keystroke form.
pub fn from_char(ch: char) -> Option<KeyPress> {
    if ch.is_ascii_lowercase() {
        return Some(KeyPress::plain(LETTERS[(ch as u8 - b'a') as usize]));
    }
    if ch.is_ascii_uppercase() {
        return Some(KeyPress::shift(LETTERS[(ch as u8 - b'A') as usize]));
    }
    if ch.is_ascii_digit() {
        return Some(KeyPress::plain(DIGITS[(ch as u8 - b'0') as usize]));
    }

    let press = match ch {
        ' ' => KeyPress::plain(Key::Space),
        '\n' | '\r' => KeyPress::plain(Key::Enter),
        '\t' => KeyPress::plain(Key::Tab),
        '`' => KeyPress::plain(Key::Grave),
        '~' => KeyPress::shift(Key::Grave),
        '!' => KeyPress::shift(Key::Digit1),
        '@' => KeyPress::shift(Key::Digit2),
        '#' => KeyPress::shift(Key::Digit3),
        '$' => KeyPress::shift(Key::Digit4),
        '%' => KeyPress::shift(Key::Digit5),
        '^' => KeyPress::shift(Key::Digit6),
        '&' => KeyPress::shift(Key::Digit7),
        '*' => KeyPress::shift(Key::Digit8),
        '(' => KeyPress::shift(Key::Digit9),
        ')' => KeyPress::shift(Key::Digit0),
        '-' => KeyPress::plain(Key::Minus),
        '_' => KeyPress::shift(Key::Minus),
        '=' => KeyPress::plain(Key::Equals),
        '+' => KeyPress::shift(Key::Equals),
        '[' => KeyPress::plain(Key::LeftBracket),
        '{' => KeyPress::shift(Key::LeftBracket),
        ']' => KeyPress::plain(Key::RightBracket),
        '}' => KeyPress::shift(Key::RightBracket),
        '\\' => KeyPress::plain(Key::Backslash),
        '|' => KeyPress::shift(Key::Backslash),
        ';' => KeyPress::plain(Key::Semicolon),
        ':' => KeyPress::shift(Key::Semicolon),
        '\'' => KeyPress::plain(Key::Quote),
        '"' => KeyPress::shift(Key::Quote),
        ',' => KeyPress::plain(Key::Comma),
        '<' => KeyPress::shift(Key::Comma),
        '.' => KeyPress::plain(Key::Period),
        '>' => KeyPress::shift(Key::Period),
        '/' => KeyPress::plain(Key::Slash),
        '?' => KeyPress::shift(Key::Slash),
        _ => return None,
    };
    Some(press)
}
