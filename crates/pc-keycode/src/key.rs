use std::fmt;

use serde::{Deserialize, Serialize};

// Central table of every key: variant, XT set-1 make code (extended keys use
// the 0x80-or'd form), canonical name, and parse-only aliases. The consumer
// macros below generate the enum, the name lookup, and the parse tables from
// this single source.
macro_rules! key_table {
    ($m:ident) => {
        $m! {
            Esc => 0x01, "Esc", ["Escape"];
            Digit1 => 0x02, "1", [];
            Digit2 => 0x03, "2", [];
            Digit3 => 0x04, "3", [];
            Digit4 => 0x05, "4", [];
            Digit5 => 0x06, "5", [];
            Digit6 => 0x07, "6", [];
            Digit7 => 0x08, "7", [];
            Digit8 => 0x09, "8", [];
            Digit9 => 0x0A, "9", [];
            Digit0 => 0x0B, "0", [];
            Minus => 0x0C, "Minus", ["Hyphen"];
            Equals => 0x0D, "Equals", ["Plus"];
            Backspace => 0x0E, "Backspace", ["Bksp"];
            Tab => 0x0F, "Tab", [];
            Q => 0x10, "Q", [];
            W => 0x11, "W", [];
            E => 0x12, "E", [];
            R => 0x13, "R", [];
            T => 0x14, "T", [];
            Y => 0x15, "Y", [];
            U => 0x16, "U", [];
            I => 0x17, "I", [];
            O => 0x18, "O", [];
            P => 0x19, "P", [];
            LeftBracket => 0x1A, "LeftBracket", ["LBracket", "OpenBracket"];
            RightBracket => 0x1B, "RightBracket", ["RBracket", "CloseBracket"];
            Enter => 0x1C, "Enter", ["Return"];
            LeftCtrl => 0x1D, "LeftCtrl", ["Ctrl", "Control"];
            A => 0x1E, "A", [];
            S => 0x1F, "S", [];
            D => 0x20, "D", [];
            F => 0x21, "F", [];
            G => 0x22, "G", [];
            H => 0x23, "H", [];
            J => 0x24, "J", [];
            K => 0x25, "K", [];
            L => 0x26, "L", [];
            Semicolon => 0x27, "Semicolon", ["Colon"];
            Quote => 0x28, "Quote", ["Apostrophe"];
            Grave => 0x29, "Grave", ["Backquote", "Backtick"];
            LeftShift => 0x2A, "LeftShift", ["Shift"];
            Backslash => 0x2B, "Backslash", [];
            Z => 0x2C, "Z", [];
            X => 0x2D, "X", [];
            C => 0x2E, "C", [];
            V => 0x2F, "V", [];
            B => 0x30, "B", [];
            N => 0x31, "N", [];
            M => 0x32, "M", [];
            Comma => 0x33, "Comma", [];
            Period => 0x34, "Period", ["Dot"];
            Slash => 0x35, "Slash", ["ForwardSlash"];
            RightShift => 0x36, "RightShift", [];
            NumpadMultiply => 0x37, "NumpadMultiply", [];
            LeftAlt => 0x38, "LeftAlt", ["Alt"];
            Space => 0x39, "Space", ["Spacebar"];
            CapsLock => 0x3A, "CapsLock", [];
            F1 => 0x3B, "F1", [];
            F2 => 0x3C, "F2", [];
            F3 => 0x3D, "F3", [];
            F4 => 0x3E, "F4", [];
            F5 => 0x3F, "F5", [];
            F6 => 0x40, "F6", [];
            F7 => 0x41, "F7", [];
            F8 => 0x42, "F8", [];
            F9 => 0x43, "F9", [];
            F10 => 0x44, "F10", [];
            NumLock => 0x45, "NumLock", [];
            ScrollLock => 0x46, "ScrollLock", [];
            Numpad7 => 0x47, "Numpad7", [];
            Numpad8 => 0x48, "Numpad8", [];
            Numpad9 => 0x49, "Numpad9", [];
            NumpadMinus => 0x4A, "NumpadMinus", [];
            Numpad4 => 0x4B, "Numpad4", [];
            Numpad5 => 0x4C, "Numpad5", [];
            Numpad6 => 0x4D, "Numpad6", [];
            NumpadPlus => 0x4E, "NumpadPlus", [];
            Numpad1 => 0x4F, "Numpad1", [];
            Numpad2 => 0x50, "Numpad2", [];
            Numpad3 => 0x51, "Numpad3", [];
            Numpad0 => 0x52, "Numpad0", [];
            NumpadPeriod => 0x53, "NumpadPeriod", ["NumpadDecimal"];
            Oem102 => 0x56, "Oem102", ["LessGreater"];
            F11 => 0x57, "F11", [];
            F12 => 0x58, "F12", [];
            Abnt1 => 0x73, "Abnt1", [];
            NumpadEnter => 0x9C, "NumpadEnter", [];
            RightCtrl => 0x9D, "RightCtrl", [];
            NumpadDivide => 0xB5, "NumpadDivide", [];
            PrintScreen => 0xB7, "PrintScreen", ["PrtSc", "SysRq"];
            RightAlt => 0xB8, "RightAlt", [];
            Pause => 0xC5, "Pause", ["Break"];
            Home => 0xC7, "Home", [];
            Up => 0xC8, "Up", ["UpArrow"];
            PageUp => 0xC9, "PageUp", ["PgUp"];
            Left => 0xCB, "Left", ["LeftArrow"];
            Right => 0xCD, "Right", ["RightArrow"];
            End => 0xCF, "End", [];
            Down => 0xD0, "Down", ["DownArrow"];
            PageDown => 0xD1, "PageDown", ["PgDn"];
            Insert => 0xD2, "Insert", ["Ins"];
            Delete => 0xD3, "Delete", ["Del"];
            LeftGui => 0xDB, "LeftGui", ["Gui", "Win", "Windows"];
            RightGui => 0xDC, "RightGui", [];
        }
    };
}
pub(crate) use key_table;

macro_rules! define_key_enum {
    ( $( $variant:ident => $code:literal, $name:literal, [ $($alias:literal),* $(,)? ]; )* ) => {
        /// An abstract key on the host keyboard.
        ///
        /// The discriminant is the XT set-1 make code; keys that the wire
        /// protocol sends with an `E0` prefix carry the 0x80-or'd form so
        /// every key fits a single byte.
        #[derive(Copy, Clone, Debug, Eq, PartialEq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[repr(u8)]
        pub enum Key {
            $(
                #[doc = concat!("The `", $name, "` key.")]
                $variant = $code,
            )*
        }

        impl Key {
            /// Returns the canonical wire name for this key.
            pub const fn name(self) -> &'static str {
                match self {
                    $( Key::$variant => $name, )*
                }
            }

            /// Looks up a `Key` from its make code.
            pub fn from_code(code: u8) -> Option<Self> {
                match code {
                    $( $code => Some(Key::$variant), )*
                    _ => None,
                }
            }
        }
    };
}
key_table!(define_key_enum);

impl Key {
    /// Returns the XT set-1 make code for this key.
    pub const fn code(self) -> u8 {
        self as u8
    }
}

impl fmt::Display for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}
