//! Lowering of `TYPE` arguments into an action plan.
//!
//! The compiler is pure: it never touches the keyboard or the frame
//! provider. Its output is a [`TypeCommandPlan`] plus the warnings produced
//! for dropped tokens; callers decide what to do with the warnings (the
//! dispatcher logs them).

use std::fmt;

use pc_keycode::{Key, keysym, suggest};
use textwire_protocol::{TypeAction, TypeCommandPlan};

/// A token the compiler dropped or partially rejected.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum CompileWarning {
    /// Token matches a known form case-insensitively; the canonical spelling
    /// is suggested. The token is dropped, never guessed.
    CaseMismatch {
        /// Token as written.
        token: String,
        /// Canonical spelling the author probably meant.
        canonical: String,
    },
    /// Token matches nothing.
    UnknownToken {
        /// Token as written.
        token: String,
    },
    /// A character inside a quoted string has no keystroke form.
    UnmappedChar {
        /// The character that was skipped.
        ch: char,
    },
}

impl fmt::Display for CompileWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CompileWarning::CaseMismatch { token, canonical } => {
                write!(f, "token '{token}' dropped; did you mean '{canonical}'?")
            }
            CompileWarning::UnknownToken { token } => {
                write!(f, "unknown token '{token}' dropped")
            }
            CompileWarning::UnmappedChar { ch } => {
                write!(f, "character {:?} has no keystroke form", ch)
            }
        }
    }
}

/// One tokeniser output: a bare word or the contents of a quoted span.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Token {
    /// Whitespace-delimited word outside quotes.
    Bare(String),
    /// Contents of a `"..."` span with backslash escapes resolved.
    Quoted(String),
}

/// Splits a `TYPE` argument on ASCII whitespace outside of double-quoted
/// spans. Inside `"..."` a backslash escapes the next character verbatim; an
/// unterminated span runs to the end of the argument.
pub fn tokenize(argument: &str) -> Vec<Token> {
    let mut tokens = Vec::new();
    let mut bare = String::new();
    let mut chars = argument.chars();

    let flush = |bare: &mut String, tokens: &mut Vec<Token>| {
        if !bare.is_empty() {
            tokens.push(Token::Bare(std::mem::take(bare)));
        }
    };

    while let Some(ch) = chars.next() {
        if ch == '"' {
            flush(&mut bare, &mut tokens);
            let mut quoted = String::new();
            loop {
                match chars.next() {
                    Some('\\') => {
                        if let Some(escaped) = chars.next() {
                            quoted.push(escaped);
                        }
                    }
                    Some('"') | None => break,
                    Some(c) => quoted.push(c),
                }
            }
            tokens.push(Token::Quoted(quoted));
        } else if ch.is_ascii_whitespace() {
            flush(&mut bare, &mut tokens);
        } else {
            bare.push(ch);
        }
    }
    flush(&mut bare, &mut tokens);
    tokens
}

/// Lowers a `TYPE` argument string into an executable plan.
///
/// `macro_interkey_frames` is the number of frames inserted between the
/// characters of one quoted string (never trailing).
pub fn compile(argument: &str, macro_interkey_frames: u32) -> (TypeCommandPlan, Vec<CompileWarning>) {
    let mut plan = TypeCommandPlan::default();
    let mut warnings = Vec::new();

    for token in tokenize(argument) {
        match token {
            Token::Bare(word) => {
                classify_bare(&word, &mut plan, &mut warnings);
            }
            Token::Quoted(text) => {
                compile_string(&text, macro_interkey_frames, &mut plan, &mut warnings);
            }
        }
    }

    // Make sure a requested capture observes the final keystroke: give the
    // host at least one frame to apply it.
    if plan.request_frame
        && plan.actions.last().is_some_and(TypeAction::is_key)
    {
        plan.actions
            .push(TypeAction::DelayFrames(macro_interkey_frames.max(1)));
    }

    (plan, warnings)
}

fn classify_bare(word: &str, plan: &mut TypeCommandPlan, warnings: &mut Vec<CompileWarning>) {
    if word == "GET" || word == "VIEW" {
        plan.request_frame = true;
        return;
    }
    if word.eq_ignore_ascii_case("GET") || word.eq_ignore_ascii_case("VIEW") {
        warnings.push(CompileWarning::CaseMismatch {
            token: word.to_string(),
            canonical: word.to_ascii_uppercase(),
        });
        return;
    }

    if classify_delay(word, plan, warnings) {
        return;
    }
    if classify_key(word, plan, warnings) {
        return;
    }

    warnings.push(CompileWarning::UnknownToken {
        token: word.to_string(),
    });
}

/// Handles `<digits>ms`, `<digits>frames` and `<digits>frame`. Returns true
/// when the token was consumed (including the dropped wrong-case forms).
fn classify_delay(
    word: &str,
    plan: &mut TypeCommandPlan,
    warnings: &mut Vec<CompileWarning>,
) -> bool {
    let digit_count = word.bytes().take_while(u8::is_ascii_digit).count();
    if digit_count == 0 || digit_count == word.len() {
        return false;
    }
    let (digits, suffix) = word.split_at(digit_count);

    let canonical_suffix = match suffix {
        "ms" | "frames" | "frame" => None,
        s if s.eq_ignore_ascii_case("ms") => Some("ms"),
        s if s.eq_ignore_ascii_case("frames") => Some("frames"),
        s if s.eq_ignore_ascii_case("frame") => Some("frame"),
        _ => return false,
    };
    if let Some(canonical) = canonical_suffix {
        warnings.push(CompileWarning::CaseMismatch {
            token: word.to_string(),
            canonical: format!("{digits}{canonical}"),
        });
        return true;
    }

    // Zero-length waits are discarded at plan-build time.
    if suffix == "ms" {
        if let Ok(millis) = digits.parse::<u64>()
            && millis > 0
        {
            plan.actions.push(TypeAction::DelayMs(millis));
        }
    } else if let Ok(frames) = digits.parse::<u32>()
        && frames > 0
    {
        plan.actions.push(TypeAction::DelayFrames(frames));
    }
    true
}

/// Handles key tokens, optionally suffixed with `Down` or `Up`. Returns true
/// when the token was consumed (including dropped wrong-case forms).
fn classify_key(word: &str, plan: &mut TypeCommandPlan, warnings: &mut Vec<CompileWarning>) -> bool {
    // Whole-token names win over suffix splitting so `Down`, `PageDown` and
    // friends stay presses.
    if let Some(key) = Key::parse(word) {
        plan.actions.push(TypeAction::Press(key));
        return true;
    }
    if let Some(residual) = word.strip_suffix("Down")
        && let Some(key) = Key::parse(residual)
    {
        plan.actions.push(TypeAction::Down(key));
        return true;
    }
    if let Some(residual) = word.strip_suffix("Up")
        && let Some(key) = Key::parse(residual)
    {
        plan.actions.push(TypeAction::Up(key));
        return true;
    }

    if let Some(warning) = case_suggestion(word) {
        warnings.push(warning);
        return true;
    }
    false
}

/// Builds a case-mismatch warning when the token (or its residual under a
/// `Down`/`Up` suffix) matches the vocabulary case-insensitively.
fn case_suggestion(word: &str) -> Option<CompileWarning> {
    if let Some(canonical) = suggest(word) {
        return Some(CompileWarning::CaseMismatch {
            token: word.to_string(),
            canonical,
        });
    }

    let lower = word.to_ascii_lowercase();
    for (suffix, canonical_suffix) in [("down", "Down"), ("up", "Up")] {
        if let Some(residual_len) = lower.strip_suffix(suffix).map(str::len) {
            let residual = &word[..residual_len];
            let canonical_residual = if Key::parse(residual).is_some() {
                Some(residual.to_string())
            } else {
                suggest(residual)
            };
            if let Some(residual) = canonical_residual {
                return Some(CompileWarning::CaseMismatch {
                    token: word.to_string(),
                    canonical: format!("{residual}{canonical_suffix}"),
                });
            }
        }
    }
    None
}

fn compile_string(
    text: &str,
    macro_interkey_frames: u32,
    plan: &mut TypeCommandPlan,
    warnings: &mut Vec<CompileWarning>,
) {
    let mut emitted_any = false;
    for ch in text.chars() {
        let Some(press) = keysym::from_char(ch) else {
            warnings.push(CompileWarning::UnmappedChar { ch });
            continue;
        };

        if emitted_any && macro_interkey_frames > 0 {
            plan.actions
                .push(TypeAction::DelayFrames(macro_interkey_frames));
        }
        emitted_any = true;

        if press.shifted {
            plan.actions.push(TypeAction::Down(Key::LeftShift));
            plan.actions.push(TypeAction::Press(press.key));
            plan.actions.push(TypeAction::Up(Key::LeftShift));
        } else {
            plan.actions.push(TypeAction::Press(press.key));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn actions(argument: &str) -> Vec<TypeAction> {
        compile(argument, 0).0.actions
    }

    #[test]
    fn bare_keys_press() {
        assert_eq!(
            actions("A B"),
            vec![TypeAction::Press(Key::A), TypeAction::Press(Key::B)]
        );
    }

    #[test]
    fn down_up_suffixes() {
        assert_eq!(
            actions("ShiftDown P ShiftUp"),
            vec![
                TypeAction::Down(Key::LeftShift),
                TypeAction::Press(Key::P),
                TypeAction::Up(Key::LeftShift),
            ]
        );
    }

    #[test]
    fn whole_names_beat_suffix_splitting() {
        assert_eq!(actions("Down"), vec![TypeAction::Press(Key::Down)]);
        assert_eq!(actions("PageDown"), vec![TypeAction::Press(Key::PageDown)]);
        assert_eq!(
            actions("PageDownDown"),
            vec![TypeAction::Down(Key::PageDown)]
        );
        assert_eq!(actions("UpUp"), vec![TypeAction::Up(Key::Up)]);
    }

    #[test]
    fn delays() {
        assert_eq!(actions("250ms"), vec![TypeAction::DelayMs(250)]);
        assert_eq!(actions("3frames"), vec![TypeAction::DelayFrames(3)]);
        assert_eq!(actions("1frame"), vec![TypeAction::DelayFrames(1)]);
        // Zero-length delays are discarded.
        assert_eq!(actions("0ms 0frames"), vec![]);
    }

    #[test]
    fn wrong_case_delay_suffix_drops_token() {
        let (plan, warnings) = compile("250MS", 0);
        assert!(plan.actions.is_empty());
        assert_eq!(
            warnings,
            vec![CompileWarning::CaseMismatch {
                token: "250MS".to_string(),
                canonical: "250ms".to_string(),
            }]
        );

        let (plan, warnings) = compile("2Frames", 0);
        assert!(plan.actions.is_empty());
        assert_eq!(
            warnings,
            vec![CompileWarning::CaseMismatch {
                token: "2Frames".to_string(),
                canonical: "2frames".to_string(),
            }]
        );
    }

    #[test]
    fn wrong_case_key_drops_token_with_suggestion() {
        let (plan, warnings) = compile("shiftdown esc", 0);
        assert!(plan.actions.is_empty());
        assert_eq!(
            warnings,
            vec![
                CompileWarning::CaseMismatch {
                    token: "shiftdown".to_string(),
                    canonical: "ShiftDown".to_string(),
                },
                CompileWarning::CaseMismatch {
                    token: "esc".to_string(),
                    canonical: "Esc".to_string(),
                },
            ]
        );
    }

    #[test]
    fn unknown_token_warns_and_drops() {
        let (plan, warnings) = compile("A zzz B", 0);
        assert_eq!(plan.actions.len(), 2);
        assert_eq!(
            warnings,
            vec![CompileWarning::UnknownToken {
                token: "zzz".to_string()
            }]
        );
    }

    #[test]
    fn frame_keywords_set_request_frame() {
        let (plan, warnings) = compile("GET", 0);
        assert!(plan.request_frame);
        assert!(plan.actions.is_empty());
        assert!(warnings.is_empty());

        let (plan, _) = compile("VIEW", 0);
        assert!(plan.request_frame);

        let (plan, warnings) = compile("view", 0);
        assert!(!plan.request_frame);
        assert_eq!(warnings.len(), 1);
    }

    #[test]
    fn quoted_string_lowers_characters() {
        // Scenario: TYPE "Peter" with no inter-key spacing.
        assert_eq!(
            actions("\"Peter\""),
            vec![
                TypeAction::Down(Key::LeftShift),
                TypeAction::Press(Key::P),
                TypeAction::Up(Key::LeftShift),
                TypeAction::Press(Key::E),
                TypeAction::Press(Key::T),
                TypeAction::Press(Key::E),
                TypeAction::Press(Key::R),
            ]
        );
    }

    #[test]
    fn interkey_frames_between_characters() {
        let (plan, _) = compile("\"abc\"", 2);
        assert_eq!(
            plan.actions,
            vec![
                TypeAction::Press(Key::A),
                TypeAction::DelayFrames(2),
                TypeAction::Press(Key::B),
                TypeAction::DelayFrames(2),
                TypeAction::Press(Key::C),
            ]
        );
        // n characters, exactly n-1 delays, never trailing.
        let delays = plan.actions.iter().filter(|a| a.is_delay()).count();
        assert_eq!(delays, 2);
    }

    #[test]
    fn escaped_backslash_is_one_keystroke() {
        assert_eq!(
            actions(r#""\\""#),
            vec![TypeAction::Press(Key::Backslash)]
        );
    }

    #[test]
    fn escaped_quote_inside_string() {
        assert_eq!(
            actions(r#""\"""#),
            vec![
                TypeAction::Down(Key::LeftShift),
                TypeAction::Press(Key::Quote),
                TypeAction::Up(Key::LeftShift),
            ]
        );
    }

    #[test]
    fn unmapped_character_warns_and_skips() {
        let (plan, warnings) = compile("\"a\u{e9}b\"", 0);
        assert_eq!(
            plan.actions,
            vec![TypeAction::Press(Key::A), TypeAction::Press(Key::B)]
        );
        assert_eq!(
            warnings,
            vec![CompileWarning::UnmappedChar { ch: '\u{e9}' }]
        );
    }

    #[test]
    fn capture_settles_after_final_keystroke() {
        let (plan, _) = compile("ShiftDown P ShiftUp VIEW", 0);
        assert!(plan.request_frame);
        assert_eq!(plan.actions.last(), Some(&TypeAction::DelayFrames(1)));

        let (plan, _) = compile("A VIEW", 3);
        assert_eq!(plan.actions.last(), Some(&TypeAction::DelayFrames(3)));

        // Explicit trailing delay is not doubled.
        let (plan, _) = compile("A 100ms VIEW", 0);
        assert_eq!(plan.actions.last(), Some(&TypeAction::DelayMs(100)));

        // No keystrokes: nothing to settle.
        let (plan, _) = compile("GET", 5);
        assert!(plan.actions.is_empty());
    }

    #[test]
    fn tokenizer_splits_quotes_and_whitespace() {
        assert_eq!(
            tokenize("A  \"two words\" B"),
            vec![
                Token::Bare("A".to_string()),
                Token::Quoted("two words".to_string()),
                Token::Bare("B".to_string()),
            ]
        );
        // Unterminated quote runs to the end.
        assert_eq!(
            tokenize("\"open"),
            vec![Token::Quoted("open".to_string())]
        );
        assert_eq!(tokenize("   "), vec![]);
    }

    #[test]
    fn retokenized_argument_compiles_to_same_plan() {
        let argument = "ShiftDown \"hi there\" ShiftUp 250ms A VIEW";
        let rendered = tokenize(argument)
            .into_iter()
            .map(|t| match t {
                Token::Bare(w) => w,
                Token::Quoted(q) => {
                    format!("\"{}\"", q.replace('\\', "\\\\").replace('"', "\\\""))
                }
            })
            .collect::<Vec<_>>()
            .join(" ");
        assert_eq!(compile(argument, 1).0, compile(&rendered, 1).0);
    }
}
