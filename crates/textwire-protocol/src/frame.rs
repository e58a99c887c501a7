//! The sentinel-framed frame header contract.
//!
//! A frame begins with metadata lines, each prefixed by the configured
//! sentinel glyph, followed by a `PAYLOAD` marker line and the opaque
//! payload:
//!
//! ```text
//! 🖵META cols=80
//! 🖵META rows=25
//! 🖵META cursor=0,3 visible=1
//! 🖵META attributes=show
//! 🖵META keys_down=Ctrl,Shift
//! 🖵PAYLOAD
//! <payload lines...>
//! ```
//!
//! The sentinel keeps the boundary findable without parsing the payload,
//! which may contain arbitrary ESC sequences. The server never interprets
//! the payload; this module exists so providers can emit the header and
//! controllers can parse it without knowing the host.

use std::collections::BTreeMap;

/// Default sentinel glyph (🖵, U+1F5B5).
pub const DEFAULT_SENTINEL: &str = "\u{1F5B5}";

/// Keyword following the sentinel on metadata lines.
pub const META_KEYWORD: &str = "META";

/// Keyword following the sentinel on the payload marker line.
pub const PAYLOAD_KEYWORD: &str = "PAYLOAD";

/// Formats one metadata line, newline included.
pub fn meta_line(sentinel: &str, key: &str, value: impl std::fmt::Display) -> String {
    format!("{sentinel}{META_KEYWORD} {key}={value}\n")
}

/// Formats the payload marker line, newline included.
pub fn payload_marker(sentinel: &str) -> String {
    format!("{sentinel}{PAYLOAD_KEYWORD}\n")
}

/// A frame split into its metadata map and payload.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ParsedFrame {
    /// Sentinel prefix detected on the header lines.
    pub sentinel: String,
    /// Metadata key/value pairs from the header lines.
    pub metadata: BTreeMap<String, String>,
    /// Raw payload (may contain ESC sequences), lines joined by `\n`.
    pub payload: String,
}

impl ParsedFrame {
    /// Parses a frame, detecting the sentinel from the first header line.
    /// Returns `None` when no `PAYLOAD` marker is present.
    pub fn parse(text: &str) -> Option<Self> {
        let mut sentinel = String::new();
        let mut metadata = BTreeMap::new();
        let mut payload_lines: Vec<&str> = Vec::new();
        let mut in_payload = false;

        for raw_line in text.split('\n') {
            let line = raw_line.strip_suffix('\r').unwrap_or(raw_line);

            if in_payload {
                payload_lines.push(line);
                continue;
            }

            if sentinel.is_empty() {
                let marker_pos = line
                    .find(META_KEYWORD)
                    .or_else(|| line.find(PAYLOAD_KEYWORD));
                if let Some(pos) = marker_pos
                    && pos > 0
                {
                    sentinel = line[..pos].to_string();
                }
            }

            if sentinel.is_empty() {
                continue;
            }

            if let Some(rest) = line.strip_prefix(&sentinel) {
                if rest.starts_with(PAYLOAD_KEYWORD) {
                    in_payload = true;
                } else if let Some(kv) = rest.strip_prefix(META_KEYWORD) {
                    let kv = kv.trim_start_matches(' ');
                    if let Some((key, value)) = kv.split_once('=') {
                        metadata.insert(key.to_string(), value.to_string());
                    }
                }
            }
        }

        if !in_payload {
            return None;
        }

        // A trailing newline in the input leaves one empty trailing element.
        if payload_lines.last() == Some(&"") {
            payload_lines.pop();
        }

        Some(Self {
            sentinel,
            metadata,
            payload: payload_lines.join("\n"),
        })
    }

    /// Cursor position as `(row, col)` when the cursor metadata is present
    /// and enabled.
    pub fn cursor(&self) -> Option<(u16, u16)> {
        let value = self.metadata.get("cursor")?;
        let (row, rest) = value.split_once(',')?;
        let col = rest.split_whitespace().next()?;
        Some((row.parse().ok()?, col.parse().ok()?))
    }

    /// Grid size as `(cols, rows)` when both metadata keys parse.
    pub fn dimensions(&self) -> Option<(u16, u16)> {
        let cols = self.metadata.get("cols")?.parse().ok()?;
        let rows = self.metadata.get("rows")?.parse().ok()?;
        Some((cols, rows))
    }
}

/// Strips ANSI CSI/ESC sequences and carriage returns from payload text and
/// replaces NUL cells with spaces; useful for plain-text inspection.
pub fn strip_ansi(text: &str) -> String {
    let mut result = String::with_capacity(text.len());
    let mut chars = text.chars().peekable();
    while let Some(ch) = chars.next() {
        if ch == '\u{1b}' {
            if chars.peek() == Some(&'[') {
                chars.next();
                for code in chars.by_ref() {
                    if ('@'..='~').contains(&code) {
                        break;
                    }
                }
            } else {
                chars.next();
            }
            continue;
        }
        if ch == '\r' {
            continue;
        }
        result.push(if ch == '\0' { ' ' } else { ch });
    }
    result
}
