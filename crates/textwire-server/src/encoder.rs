//! Rendering of a [`TextSnapshot`] to the sentinel-framed wire frame.
//!
//! The payload is one line per screen row: CP437 glyphs converted to UTF-8,
//! optionally wrapped in SGR truecolor sequences derived from the classic
//! 16-colour DOS palette. Attribute runs are coalesced; every row starts and
//! ends on a reset so controllers can crop rows independently.

use std::fmt::Write as _;

use textwire_protocol::frame::{meta_line, payload_marker};

use crate::snapshot::TextSnapshot;

/// Options controlling frame rendering.
#[derive(Clone, Debug)]
pub struct EncodingOptions {
    /// Emit SGR colour sequences when true; bare glyphs when false.
    pub show_attributes: bool,
    /// Sentinel prefixing META/PAYLOAD lines.
    pub sentinel: String,
    /// Display names for the `keys_down` metadata line; sorted before
    /// emission.
    pub keys_down: Vec<String>,
}

const DOS_PALETTE: [(u8, u8, u8); 16] = [
    (0x00, 0x00, 0x00), // black
    (0x00, 0x00, 0xAA), // blue
    (0x00, 0xAA, 0x00), // green
    (0x00, 0xAA, 0xAA), // cyan
    (0xAA, 0x00, 0x00), // red
    (0xAA, 0x00, 0xAA), // magenta
    (0xAA, 0x55, 0x00), // brown
    (0xAA, 0xAA, 0xAA), // light grey
    (0x55, 0x55, 0x55), // dark grey
    (0x55, 0x55, 0xFF), // light blue
    (0x55, 0xFF, 0x55), // light green
    (0x55, 0xFF, 0xFF), // light cyan
    (0xFF, 0x55, 0x55), // light red
    (0xFF, 0x55, 0xFF), // light magenta
    (0xFF, 0xFF, 0x55), // yellow
    (0xFF, 0xFF, 0xFF), // white
];

// CP437 to Unicode, control range included (the glyph forms, not the C0
// controls). 0x00 stays NUL so payload consumers can distinguish never
// written cells.
const CP437: [char; 256] = [
    '\u{0000}', '☺', '☻', '♥', '♦', '♣', '♠', '•', '◘', '○', '◙', '♂', '♀', '♪', '♫', '☼', //
    '►', '◄', '↕', '‼', '¶', '§', '▬', '↨', '↑', '↓', '→', '←', '∟', '↔', '▲', '▼', //
    ' ', '!', '"', '#', '$', '%', '&', '\'', '(', ')', '*', '+', ',', '-', '.', '/', //
    '0', '1', '2', '3', '4', '5', '6', '7', '8', '9', ':', ';', '<', '=', '>', '?', //
    '@', 'A', 'B', 'C', 'D', 'E', 'F', 'G', 'H', 'I', 'J', 'K', 'L', 'M', 'N', 'O', //
    'P', 'Q', 'R', 'S', 'T', 'U', 'V', 'W', 'X', 'Y', 'Z', '[', '\\', ']', '^', '_', //
    '`', 'a', 'b', 'c', 'd', 'e', 'f', 'g', 'h', 'i', 'j', 'k', 'l', 'm', 'n', 'o', //
    'p', 'q', 'r', 's', 't', 'u', 'v', 'w', 'x', 'y', 'z', '{', '|', '}', '~', '⌂', //
    'Ç', 'ü', 'é', 'â', 'ä', 'à', 'å', 'ç', 'ê', 'ë', 'è', 'ï', 'î', 'ì', 'Ä', 'Å', //
    'É', 'æ', 'Æ', 'ô', 'ö', 'ò', 'û', 'ù', 'ÿ', 'Ö', 'Ü', '¢', '£', '¥', '₧', 'ƒ', //
    'á', 'í', 'ó', 'ú', 'ñ', 'Ñ', 'ª', 'º', '¿', '⌐', '¬', '½', '¼', '¡', '«', '»', //
    '░', '▒', '▓', '│', '┤', '╡', '╢', '╖', '╕', '╣', '║', '╗', '╝', '╜', '╛', '┐', //
    '└', '┴', '┬', '├', '─', '┼', '╞', '╟', '╚', '╔', '╩', '╦', '╠', '═', '╬', '╧', //
    '╨', '╤', '╥', '╙', '╘', '╒', '╓', '╫', '╪', '┘', '┌', '█', '▄', '▌', '▐', '▀', //
    'α', 'ß', 'Γ', 'π', 'Σ', 'σ', 'µ', 'τ', 'Φ', 'Θ', 'Ω', 'δ', '∞', 'φ', 'ε', '∩', //
    '≡', '±', '≥', '≤', '⌠', '⌡', '÷', '≈', '°', '∙', '·', '√', 'ⁿ', '²', '■', '\u{00A0}',
];

/// Converts one CP437 byte to its Unicode glyph.
pub fn cp437_to_char(byte: u8) -> char {
    CP437[usize::from(byte)]
}

fn build_sgr(attribute: u8) -> String {
    let fg = DOS_PALETTE[usize::from(attribute & 0x0F)];
    let bg = DOS_PALETTE[usize::from((attribute >> 4) & 0x07)];

    let mut sgr = String::from("\x1b[0");
    if attribute & 0x80 != 0 {
        sgr.push_str(";5");
    }
    let _ = write!(
        sgr,
        ";38;2;{};{};{};48;2;{};{};{}m",
        fg.0, fg.1, fg.2, bg.0, bg.1, bg.2
    );
    sgr
}

/// Renders the full wire frame: sentinel-prefixed META lines, the PAYLOAD
/// marker, then one payload line per row.
pub fn build_frame(snapshot: &TextSnapshot, options: &EncodingOptions) -> String {
    let sentinel = options.sentinel.as_str();
    let mut out = String::new();

    out.push_str(&meta_line(sentinel, "cols", snapshot.columns));
    out.push_str(&meta_line(sentinel, "rows", snapshot.rows));
    if snapshot.cursor.enabled {
        out.push_str(&meta_line(
            sentinel,
            "cursor",
            format!(
                "{},{} visible={}",
                snapshot.cursor.row,
                snapshot.cursor.column,
                u8::from(snapshot.cursor.visible)
            ),
        ));
    } else {
        out.push_str(&meta_line(sentinel, "cursor", "disabled"));
    }
    out.push_str(&meta_line(
        sentinel,
        "attributes",
        if options.show_attributes { "show" } else { "hide" },
    ));
    let mut keys_down = options.keys_down.clone();
    keys_down.sort();
    out.push_str(&meta_line(sentinel, "keys_down", keys_down.join(",")));
    out.push_str(&payload_marker(sentinel));

    if options.show_attributes {
        out.push_str("\x1b[0m");
    }

    let mut previous_attribute = None;
    for row in 0..snapshot.rows {
        for col in 0..snapshot.columns {
            let cell = snapshot
                .cell(row, col)
                .copied()
                .unwrap_or_default();
            if options.show_attributes && previous_attribute != Some(cell.attribute) {
                out.push_str(&build_sgr(cell.attribute));
                previous_attribute = Some(cell.attribute);
            }
            out.push(cp437_to_char(cell.glyph));
        }
        if options.show_attributes {
            out.push_str("\x1b[0m");
        }
        out.push('\n');
        if options.show_attributes && row + 1 < snapshot.rows {
            // Start the next row from a clean slate.
            previous_attribute = None;
            out.push_str("\x1b[0m");
        }
    }

    out
}
