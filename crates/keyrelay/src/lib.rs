//! keyrelay: relays keyboard verbs to the host's key injector.
//!
//! `KeyRelay` is a command processor over `PRESS` / `DOWN` / `UP` / `RESET`
//! / `STATS`. It tracks the set of currently-held keys (with the display
//! name the caller used) and forwards key edges to a [`KeyInjector`].
//!
//! Every key held in the set is the image of exactly one `DOWN` not yet
//! matched by an `UP` or a `RESET`. Injector failures are logged and do not
//! fail the verb; `RESET` is the only bulk-release mechanism.
#![warn(missing_docs)]

use std::collections::BTreeMap;

use pc_keycode::{Key, display_name, suggest};
use textwire_protocol::CommandResponse;
use tracing::{trace, warn};

mod error;
pub use error::{InjectError, Result};

/// Host capability accepting key edges.
///
/// Implementations must tolerate arbitrary edge sequences; ordering
/// guarantees are the caller's concern. Tests substitute recording fakes.
pub trait KeyInjector: Send + Sync {
    /// Delivers one key edge to the host. `pressed` is true for make,
    /// false for break.
    fn inject(&self, key: Key, pressed: bool) -> Result<()>;
}

/// Keyboard command processor.
///
/// Owns the held-key set and the per-verb counter triple. One instance per
/// host; mutated only from the tick thread.
pub struct KeyRelay {
    injector: Box<dyn KeyInjector>,
    held: BTreeMap<Key, String>,
    commands: u64,
    success: u64,
    failures: u64,
}

impl KeyRelay {
    /// Creates a processor forwarding edges to `injector`.
    pub fn new(injector: Box<dyn KeyInjector>) -> Self {
        Self {
            injector,
            held: BTreeMap::new(),
            commands: 0,
            success: 0,
            failures: 0,
        }
    }

    /// Handles one keyboard command line and returns its wire response.
    pub fn handle_command(&mut self, raw_command: &str) -> CommandResponse {
        let trimmed = raw_command.trim();
        if trimmed.is_empty() {
            return CommandResponse::err("empty command");
        }

        let (verb, args) = match trimmed.split_once(' ') {
            Some((verb, rest)) => (verb, rest.trim()),
            None => (trimmed, ""),
        };
        let verb_upper = verb.to_ascii_uppercase();
        trace!(verb = %verb_upper, args, "keyboard command");

        self.commands += 1;

        let response = match verb_upper.as_str() {
            "PRESS" => self.handle_press(args),
            "DOWN" => self.handle_down(args),
            "UP" => self.handle_up(args),
            "RESET" => self.handle_reset(),
            "STATS" => self.handle_stats(),
            _ => CommandResponse::err("unknown command"),
        };

        if response.ok {
            self.success += 1;
        } else {
            self.failures += 1;
        }
        response
    }

    /// Releases every held key and empties the held set.
    pub fn reset(&mut self) {
        for (&key, name) in &self.held {
            trace!(%key, name = %name, "reset release");
            self.send_edge(key, false);
        }
        self.held.clear();
    }

    /// Display names of the currently held keys, sorted lexicographically.
    pub fn active_keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = self.held.values().cloned().collect();
        keys.sort();
        keys
    }

    fn handle_press(&mut self, args: &str) -> CommandResponse {
        let key = match self.single_key_argument(args) {
            Ok(key) => key,
            Err(response) => return response,
        };
        if self.held.contains_key(&key) {
            return CommandResponse::err("key already down");
        }
        self.send_edge(key, true);
        self.send_edge(key, false);
        CommandResponse::ok()
    }

    fn handle_down(&mut self, args: &str) -> CommandResponse {
        let token = match self.single_token(args) {
            Ok(token) => token,
            Err(response) => return response,
        };
        let Some(key) = parse_key(token) else {
            return CommandResponse::err("unknown key");
        };
        if self.held.contains_key(&key) {
            return CommandResponse::err("key already down");
        }
        self.send_edge(key, true);
        self.held.insert(key, display_name(token));
        CommandResponse::ok()
    }

    fn handle_up(&mut self, args: &str) -> CommandResponse {
        let key = match self.single_key_argument(args) {
            Ok(key) => key,
            Err(response) => return response,
        };
        if self.held.remove(&key).is_none() {
            return CommandResponse::err("key not down");
        }
        self.send_edge(key, false);
        CommandResponse::ok()
    }

    fn handle_reset(&mut self) -> CommandResponse {
        self.reset();
        CommandResponse::ok()
    }

    fn handle_stats(&self) -> CommandResponse {
        CommandResponse::with_payload(format!(
            "commands={} success={} failures={}\n",
            self.commands, self.success, self.failures
        ))
    }

    fn single_token<'a>(&self, args: &'a str) -> std::result::Result<&'a str, CommandResponse> {
        let trimmed = args.trim();
        if trimmed.is_empty() {
            return Err(CommandResponse::err("missing key"));
        }
        if trimmed.split_ascii_whitespace().nth(1).is_some() {
            return Err(CommandResponse::err("unexpected arguments"));
        }
        Ok(trimmed)
    }

    fn single_key_argument(&self, args: &str) -> std::result::Result<Key, CommandResponse> {
        let token = self.single_token(args)?;
        parse_key(token).ok_or_else(|| CommandResponse::err("unknown key"))
    }

    fn send_edge(&self, key: Key, pressed: bool) {
        if let Err(e) = self.injector.inject(key, pressed) {
            warn!(%key, pressed, error = %e, "key injection failed");
        }
    }
}

fn parse_key(token: &str) -> Option<Key> {
    let key = Key::parse(token);
    if key.is_none()
        && let Some(canonical) = suggest(token)
    {
        warn!(token, canonical = %canonical, "key name differs only in case");
    }
    key
}

#[cfg(any(test, feature = "test-utils"))]
mod recording {
    use parking_lot::Mutex;
    use pc_keycode::Key;

    use crate::{InjectError, KeyInjector, Result};

    /// Test injector recording every edge it receives.
    #[derive(Default)]
    pub struct RecordingInjector {
        events: Mutex<Vec<(Key, bool)>>,
        fail: bool,
    }

    impl RecordingInjector {
        /// A recording injector that accepts every edge.
        pub fn new() -> Self {
            Self::default()
        }

        /// A recording injector that rejects every edge (still records).
        pub fn failing() -> Self {
            Self {
                events: Mutex::new(Vec::new()),
                fail: true,
            }
        }

        /// Edges received so far.
        pub fn events(&self) -> Vec<(Key, bool)> {
            self.events.lock().clone()
        }

        /// Number of edges received so far.
        pub fn len(&self) -> usize {
            self.events.lock().len()
        }

        /// True when no edge was received.
        pub fn is_empty(&self) -> bool {
            self.events.lock().is_empty()
        }
    }

    impl KeyInjector for RecordingInjector {
        fn inject(&self, key: Key, pressed: bool) -> Result<()> {
            self.events.lock().push((key, pressed));
            if self.fail {
                return Err(InjectError::Rejected("fake rejection".to_string()));
            }
            Ok(())
        }
    }

    // Shared form: tests keep one handle for assertions while the relay
    // owns the other.
    impl KeyInjector for std::sync::Arc<RecordingInjector> {
        fn inject(&self, key: Key, pressed: bool) -> Result<()> {
            (**self).inject(key, pressed)
        }
    }
}

#[cfg(any(test, feature = "test-utils"))]
pub use recording::RecordingInjector;
