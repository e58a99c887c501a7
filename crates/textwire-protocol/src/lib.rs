//! Wire types for the textwire control channel.
//!
//! This crate defines the data model shared by the server, the deferred
//! action sink, and controller-side clients: command responses, request
//! origins, the lowered `TYPE` plan, and the sentinel-framed frame header
//! contract.
#![warn(missing_docs)]

use std::fmt;

use pc_keycode::Key;
use serde::{Deserialize, Serialize};

pub mod frame;

/// Stable identifier for a live client connection.
///
/// Handles are opaque and never reused while the owning backend is running;
/// a handle is invalidated when its connection closes.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ClientHandle(u64);

impl ClientHandle {
    /// Wraps a raw backend connection id.
    pub const fn new(raw: u64) -> Self {
        Self(raw)
    }

    /// Returns the raw connection id.
    pub const fn raw(self) -> u64 {
        self.0
    }
}

impl fmt::Display for ClientHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "client#{}", self.0)
    }
}

/// The connection a command arrived on, if any.
///
/// Commands executed outside a network session (host-internal dispatch,
/// tests) carry no client; deferred replies cannot be routed for those.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq, Serialize, Deserialize)]
pub struct CommandOrigin {
    /// Originating connection, when the command came over the wire.
    pub client: Option<ClientHandle>,
}

impl CommandOrigin {
    /// An origin with no connection attached.
    pub const fn none() -> Self {
        Self { client: None }
    }

    /// An origin bound to a live connection.
    pub const fn from_client(client: ClientHandle) -> Self {
        Self {
            client: Some(client),
        }
    }
}

/// Outcome of one command line.
///
/// Exactly one of the following holds: a terminal payload (`deferred` is
/// false), or a deferred marker (`deferred` is true, `payload` empty) whose
/// real reply arrives later through the server's send hook.
#[derive(Clone, Debug, Default, Eq, PartialEq, Serialize, Deserialize)]
pub struct CommandResponse {
    /// Whether the command succeeded (meaningless until the deferred reply
    /// lands when `deferred` is set).
    pub ok: bool,
    /// Reply payload, ending in `\n` for single-line replies.
    pub payload: String,
    /// True when the reply is deferred to a later sink completion.
    pub deferred: bool,
    /// Monotonic id of the deferred request; zero when not deferred.
    pub deferred_id: u64,
}

impl CommandResponse {
    /// A terminal `OK` reply.
    pub fn ok() -> Self {
        Self {
            ok: true,
            payload: "OK\n".to_string(),
            ..Self::default()
        }
    }

    /// A terminal success reply with an arbitrary payload.
    pub fn with_payload(payload: impl Into<String>) -> Self {
        Self {
            ok: true,
            payload: payload.into(),
            ..Self::default()
        }
    }

    /// A terminal `ERR <reason>` reply.
    pub fn err(reason: impl fmt::Display) -> Self {
        Self {
            ok: false,
            payload: format!("ERR {reason}\n"),
            ..Self::default()
        }
    }

    /// A deferred marker carrying the queued request's id.
    pub fn deferred(id: u64) -> Self {
        Self {
            ok: true,
            payload: String::new(),
            deferred: true,
            deferred_id: id,
        }
    }
}

/// One primitive step of a lowered `TYPE` command.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub enum TypeAction {
    /// Press and release a key.
    Press(Key),
    /// Press a key and leave it held.
    Down(Key),
    /// Release a held key.
    Up(Key),
    /// Wait a strictly positive number of wall-clock milliseconds.
    DelayMs(u64),
    /// Wait a strictly positive number of poll ticks.
    DelayFrames(u32),
}

impl TypeAction {
    /// True for the delay variants.
    pub const fn is_delay(&self) -> bool {
        matches!(self, TypeAction::DelayMs(_) | TypeAction::DelayFrames(_))
    }

    /// True for the keyboard-edge variants.
    pub const fn is_key(&self) -> bool {
        !self.is_delay()
    }
}

/// An ordered sequence of primitive actions plus the capture flag, produced
/// by the `TYPE` compiler. Immutable once built; passed by value into the
/// action sink.
#[derive(Clone, Debug, Default, Eq, PartialEq, Serialize, Deserialize)]
pub struct TypeCommandPlan {
    /// Actions in execution order.
    pub actions: Vec<TypeAction>,
    /// Capture a frame after the final action settles.
    pub request_frame: bool,
}

impl TypeCommandPlan {
    /// Number of keyboard-edge actions in the plan.
    pub fn key_action_count(&self) -> usize {
        self.actions.iter().filter(|a| a.is_key()).count()
    }

    /// True when the plan does nothing at all.
    pub fn is_empty(&self) -> bool {
        self.actions.is_empty() && !self.request_frame
    }
}

/// Monotonic per-dispatcher request counters.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq, Serialize, Deserialize)]
pub struct CommandStats {
    /// Commands that entered accounting.
    pub requests: u64,
    /// Commands that completed successfully.
    pub success: u64,
    /// Commands that failed.
    pub failures: u64,
}

impl CommandStats {
    /// Requests neither counted as success nor failure yet.
    pub fn in_flight(&self) -> u64 {
        self.requests.saturating_sub(self.success + self.failures)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn response_constructors() {
        assert_eq!(CommandResponse::ok().payload, "OK\n");
        assert!(CommandResponse::ok().ok);
        let e = CommandResponse::err("unknown command");
        assert!(!e.ok);
        assert_eq!(e.payload, "ERR unknown command\n");
        let d = CommandResponse::deferred(7);
        assert!(d.deferred);
        assert_eq!(d.deferred_id, 7);
        assert!(d.payload.is_empty());
    }

    #[test]
    fn plan_counts_key_actions() {
        let plan = TypeCommandPlan {
            actions: vec![
                TypeAction::Down(Key::LeftShift),
                TypeAction::Press(Key::P),
                TypeAction::Up(Key::LeftShift),
                TypeAction::DelayFrames(1),
                TypeAction::DelayMs(250),
            ],
            request_frame: false,
        };
        assert_eq!(plan.key_action_count(), 3);
        assert!(!plan.is_empty());
        assert!(TypeCommandPlan::default().is_empty());
    }

    #[test]
    fn actions_serialize_by_name() {
        let json = serde_json::to_string(&TypeAction::Press(Key::A)).unwrap();
        assert_eq!(json, r#"{"Press":"A"}"#);
    }
}
