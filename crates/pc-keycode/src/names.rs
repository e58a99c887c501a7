use std::collections::HashMap;

use once_cell::sync::Lazy;

use crate::key::{Key, key_table};

macro_rules! name_entries {
    ( $( $variant:ident => $code:expr, $name:expr, [ $($alias:expr),* $(,)? ]; )* ) => {
        &[ $( ($name, Key::$variant), $( ($alias, Key::$variant), )* )* ]
    };
}

// Canonical names first, aliases after, so case-insensitive suggestions
// prefer the canonical spelling.
static ENTRIES: &[(&str, Key)] = key_table!(name_entries);

static NAME_TO_KEY: Lazy<HashMap<&'static str, Key>> =
    Lazy::new(|| ENTRIES.iter().copied().collect());

static FOLDED_NAMES: Lazy<HashMap<String, &'static str>> = Lazy::new(|| {
    let mut map = HashMap::new();
    for (name, _) in ENTRIES {
        map.entry(name.to_ascii_lowercase()).or_insert(*name);
    }
    map
});

static ALL_NAMES: Lazy<Vec<&'static str>> = Lazy::new(|| {
    let mut names: Vec<&'static str> = ENTRIES.iter().map(|(name, _)| *name).collect();
    names.sort_by(|a, b| b.len().cmp(&a.len()).then_with(|| a.cmp(b)));
    names.dedup();
    names
});

impl Key {
    /// Parses a key name, matched case-sensitively against the canonical
    /// vocabulary (names plus aliases). A single literal `\` is accepted as
    /// a synonym for `Backslash`.
    pub fn parse(name: &str) -> Option<Self> {
        if name == "\\" {
            return Some(Key::Backslash);
        }
        NAME_TO_KEY.get(name).copied()
    }
}

/// Every accepted key name and alias, sorted by length descending then
/// lexicographically ascending, so longest-match prefix scans are correct.
pub fn all_names() -> &'static [&'static str] {
    &ALL_NAMES
}

/// Returns the canonical spelling for `token` when it matches a known name
/// case-insensitively but differs from the canonical form. Used to emit
/// precise errors for case mistakes; `None` when the token is already
/// canonical or matches nothing at all.
pub fn suggest(token: &str) -> Option<String> {
    if Key::parse(token).is_some() {
        return None;
    }
    FOLDED_NAMES
        .get(&token.to_ascii_lowercase())
        .map(|canonical| (*canonical).to_string())
}

/// Normalises a user token to the Title-case form shown back in `keys_down`
/// metadata.
pub fn display_name(token: &str) -> String {
    let upper = token.to_ascii_uppercase();
    match upper.as_str() {
        "SHIFT" | "LSHIFT" | "RSHIFT" => return "Shift".to_string(),
        "CTRL" | "LCTRL" | "RCTRL" | "CONTROL" => return "Ctrl".to_string(),
        "ALT" | "LALT" | "RALT" | "LEFTALT" | "RIGHTALT" => return "Alt".to_string(),
        "CAPS" | "CAPSLOCK" => return "CapsLock".to_string(),
        _ => {}
    }
    if let Some(rest) = upper.strip_prefix("NUMPAD") {
        return format!("NumPad{}", rest.to_ascii_lowercase());
    }
    if let Some(rest) = upper.strip_prefix("KP") {
        return format!("NumPad{}", rest.to_ascii_lowercase());
    }
    if upper.len() > 1
        && let Some(rest) = upper.strip_prefix('F')
        && rest.bytes().all(|b| b.is_ascii_digit())
    {
        return format!("F{rest}");
    }
    if upper.len() == 1 {
        return upper;
    }

    // Default: Title-case the token, starting a new word after any
    // non-alphanumeric character or digit.
    let mut result = String::with_capacity(upper.len());
    let mut new_word = true;
    for ch in upper.chars() {
        if !ch.is_ascii_alphanumeric() {
            result.push(ch);
            new_word = true;
            continue;
        }
        if new_word {
            result.push(ch.to_ascii_uppercase());
            new_word = false;
        } else {
            result.push(ch.to_ascii_lowercase());
        }
        if ch.is_ascii_digit() {
            new_word = true;
        }
    }
    result
}
