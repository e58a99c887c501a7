//! Command dispatch: one request line in, one response (or deferral) out.
//!
//! Verbs are strictly uppercase; a known verb in the wrong case is reported
//! as a case error rather than an unknown command. The dispatcher owns the
//! request counters and the queued action sink, and never panics outward:
//! every failure is a `(ok=false, payload)` value.

use std::sync::Arc;

use parking_lot::Mutex;
use textwire_protocol::{ClientHandle, CommandOrigin, CommandResponse, CommandStats};
use tracing::warn;

use crate::{
    compile::compile,
    host::{ExitHook, FrameProvider, KeyboardHandle},
    memory::{MemoryAccess, format_hex_bytes, parse_address, parse_hex_bytes, peek_region,
        poke_region},
    sink::{CompletionCallback, InlineActionSink, QueuedActionSink, ReplyTransport},
};

const KNOWN_VERBS: &[&str] = &[
    "GET", "VIEW", "STATS", "EXIT", "TYPE", "PEEK", "POKE", "DEBUG",
];

/// Cloneable handle to the dispatcher's counter triple. Completion callbacks
/// for deferred requests capture only this handle.
#[derive(Clone, Default)]
pub struct SharedStats(Arc<Mutex<CommandStats>>);

impl SharedStats {
    /// Current counter values.
    pub fn snapshot(&self) -> CommandStats {
        *self.0.lock()
    }

    fn add_request(&self) {
        self.0.lock().requests += 1;
    }

    fn add_success(&self) {
        self.0.lock().success += 1;
    }

    fn add_failure(&self) {
        self.0.lock().failures += 1;
    }
}

/// Parses and routes request lines.
pub struct CommandDispatcher {
    frames: Option<Arc<dyn FrameProvider>>,
    keyboard: Option<KeyboardHandle>,
    memory: Option<Arc<dyn MemoryAccess>>,
    on_exit: Option<ExitHook>,
    sink: Option<QueuedActionSink>,
    stats: SharedStats,
    exit_requested: bool,
    macro_interkey_frames: u32,
    type_sink_requires_client: bool,
    queue_non_frame_commands: bool,
    allow_deferred_frames: bool,
    debug_region: Option<(u32, u32)>,
}

impl Default for CommandDispatcher {
    fn default() -> Self {
        Self::new()
    }
}

impl CommandDispatcher {
    /// Creates a dispatcher with no capabilities wired.
    pub fn new() -> Self {
        Self {
            frames: None,
            keyboard: None,
            memory: None,
            on_exit: None,
            sink: None,
            stats: SharedStats::default(),
            exit_requested: false,
            macro_interkey_frames: 0,
            type_sink_requires_client: false,
            queue_non_frame_commands: true,
            allow_deferred_frames: true,
            debug_region: None,
        }
    }

    /// Wires the frame provider used by `GET`/`VIEW` and queued captures.
    pub fn with_frame_provider(mut self, frames: Arc<dyn FrameProvider>) -> Self {
        self.frames = Some(frames);
        self
    }

    /// Wires the keyboard used by `TYPE` and reported by `STATS`.
    pub fn with_keyboard(mut self, keyboard: KeyboardHandle) -> Self {
        self.keyboard = Some(keyboard);
        self
    }

    /// Wires the memory interface behind `PEEK`/`POKE`/`DEBUG`.
    pub fn with_memory(mut self, memory: Arc<dyn MemoryAccess>) -> Self {
        self.memory = Some(memory);
        self
    }

    /// Wires the host exit hook invoked by `EXIT`.
    pub fn with_exit_hook(mut self, on_exit: ExitHook) -> Self {
        self.on_exit = Some(on_exit);
        self
    }

    /// Wires the queued action sink used for deferred `TYPE` execution.
    pub fn with_sink(mut self, sink: QueuedActionSink) -> Self {
        self.sink = Some(sink);
        self
    }

    /// Frames inserted between characters of quoted `TYPE` strings.
    pub fn set_macro_interkey_frames(&mut self, frames: u32) {
        self.macro_interkey_frames = frames;
    }

    /// Queue a `TYPE` only when the request has a real client origin.
    pub fn set_type_sink_requires_client(&mut self, requires_client: bool) {
        self.type_sink_requires_client = requires_client;
    }

    /// Queue `TYPE` commands that do not request a frame.
    pub fn set_queue_non_frame_commands(&mut self, enable: bool) {
        self.queue_non_frame_commands = enable;
    }

    /// Globally enable or disable deferred execution.
    pub fn set_allow_deferred_frames(&mut self, enable: bool) {
        self.allow_deferred_frames = enable;
    }

    /// Region returned by `DEBUG`; a zero length disables it.
    pub fn set_debug_region(&mut self, address: u32, length: u32) {
        self.debug_region = (length > 0).then_some((address, length));
    }

    /// Current counter values.
    pub fn stats(&self) -> CommandStats {
        self.stats.snapshot()
    }

    /// Display names of held keys, sorted; empty without a keyboard.
    pub fn active_keys(&self) -> Vec<String> {
        self.keyboard
            .as_ref()
            .map(KeyboardHandle::active_keys)
            .unwrap_or_default()
    }

    /// Handles one request line.
    pub fn handle_command(&mut self, raw_command: &str, origin: CommandOrigin) -> CommandResponse {
        let trimmed = raw_command.trim();
        if trimmed.is_empty() {
            return CommandResponse::err("empty command");
        }

        let (verb, argument) = match trimmed.split_once(' ') {
            Some((verb, rest)) => (verb, rest.trim()),
            None => (trimmed, ""),
        };

        match verb {
            "GET" | "VIEW" => self.handle_frame(argument),
            "STATS" => self.handle_stats(),
            "EXIT" => self.handle_exit(),
            "TYPE" => self.handle_type(argument, origin),
            "PEEK" => self.handle_peek(argument),
            "POKE" => self.handle_poke(argument),
            "DEBUG" => self.handle_debug(),
            _ => {
                let upper = verb.to_ascii_uppercase();
                if KNOWN_VERBS.contains(&upper.as_str()) {
                    CommandResponse::err("commands are case-sensitive")
                } else {
                    CommandResponse::err("unknown command")
                }
            }
        }
    }

    /// True once after a handled `EXIT`; the server consumes this to drop
    /// the client after replying.
    pub fn consume_exit_request(&mut self) -> bool {
        std::mem::take(&mut self.exit_requested)
    }

    /// Advances the queued sink by one tick.
    pub fn poll_sink(&mut self, transport: &mut dyn ReplyTransport) {
        if let Some(sink) = self.sink.as_mut() {
            sink.poll(transport);
        }
    }

    /// Cancels every queued request from a disconnected client.
    pub fn cancel_client(&mut self, client: ClientHandle, transport: &mut dyn ReplyTransport) {
        if let Some(sink) = self.sink.as_mut() {
            sink.cancel_client(client, transport);
        }
    }

    fn handle_frame(&mut self, argument: &str) -> CommandResponse {
        self.stats.add_request();
        let Some(provider) = &self.frames else {
            self.stats.add_failure();
            return CommandResponse::err("service unavailable");
        };

        let showspc = argument.eq_ignore_ascii_case("SHOWSPC");
        match provider.capture_frame() {
            Ok(frame) => {
                self.stats.add_success();
                CommandResponse::with_payload(if showspc { show_spaces(&frame) } else { frame })
            }
            Err(reason) => {
                self.stats.add_failure();
                CommandResponse::err(reason)
            }
        }
    }

    fn handle_stats(&self) -> CommandResponse {
        let stats = self.stats.snapshot();
        CommandResponse::with_payload(format!(
            "requests={} success={} failures={} keys_down={}\n",
            stats.requests,
            stats.success,
            stats.failures,
            self.active_keys().join(",")
        ))
    }

    fn handle_exit(&mut self) -> CommandResponse {
        self.stats.add_request();
        if let Some(on_exit) = self.on_exit.as_mut() {
            on_exit();
        }
        self.exit_requested = true;
        self.stats.add_success();
        CommandResponse::ok()
    }

    fn handle_type(&mut self, argument: &str, origin: CommandOrigin) -> CommandResponse {
        self.stats.add_request();
        let Some(keyboard) = self.keyboard.clone() else {
            self.stats.add_failure();
            return CommandResponse::err("keyboard unavailable");
        };

        let (plan, warnings) = compile(argument, self.macro_interkey_frames);
        for warning in &warnings {
            warn!(%warning, "TYPE token dropped");
        }

        let queue_allowed = (!self.type_sink_requires_client || origin.client.is_some())
            && (plan.request_frame || self.queue_non_frame_commands)
            && self.allow_deferred_frames;

        let response = if queue_allowed && let Some(sink) = self.sink.as_mut() {
            let stats = self.stats.clone();
            let on_complete: CompletionCallback = Box::new(move |success| {
                if success {
                    stats.add_success();
                } else {
                    stats.add_failure();
                }
            });
            sink.execute(plan, origin, on_complete)
        } else {
            InlineActionSink::new(keyboard, self.frames.clone()).execute(&plan)
        };

        if response.deferred {
            // Success or failure is counted later by the completion callback.
            return response;
        }
        if response.ok {
            self.stats.add_success();
        } else {
            self.stats.add_failure();
        }
        response
    }

    fn handle_peek(&mut self, argument: &str) -> CommandResponse {
        self.stats.add_request();
        let Some(memory) = self.memory.clone() else {
            self.stats.add_failure();
            return CommandResponse::err("memory unavailable");
        };

        let mut parts = argument.split_ascii_whitespace();
        let parsed = match (parts.next(), parts.next(), parts.next()) {
            (Some(addr), Some(len), None) => {
                parse_address(addr).zip(len.parse::<u32>().ok())
            }
            _ => None,
        };
        let Some((address, length)) = parsed else {
            self.stats.add_failure();
            return CommandResponse::err("invalid PEEK arguments");
        };

        match peek_region(&*memory, address, length) {
            Ok(bytes) => {
                self.stats.add_success();
                CommandResponse::with_payload(format_hex_bytes(&bytes))
            }
            Err(e) => {
                self.stats.add_failure();
                CommandResponse::err(e)
            }
        }
    }

    fn handle_poke(&mut self, argument: &str) -> CommandResponse {
        self.stats.add_request();
        let Some(memory) = self.memory.clone() else {
            self.stats.add_failure();
            return CommandResponse::err("memory unavailable");
        };

        let parsed = argument
            .split_once(char::is_whitespace)
            .and_then(|(addr, hex)| parse_address(addr).zip(parse_hex_bytes(hex)));
        let Some((address, data)) = parsed else {
            self.stats.add_failure();
            return CommandResponse::err("invalid POKE arguments");
        };

        match poke_region(&*memory, address, &data) {
            Ok(_written) => {
                self.stats.add_success();
                CommandResponse::ok()
            }
            Err(e) => {
                self.stats.add_failure();
                CommandResponse::err(e)
            }
        }
    }

    fn handle_debug(&mut self) -> CommandResponse {
        self.stats.add_request();
        let Some(memory) = self.memory.clone() else {
            self.stats.add_failure();
            return CommandResponse::err("memory unavailable");
        };
        let Some((address, length)) = self.debug_region else {
            self.stats.add_failure();
            return CommandResponse::err("debug region not configured");
        };

        match peek_region(&*memory, address, length) {
            Ok(bytes) => {
                self.stats.add_success();
                CommandResponse::with_payload(format_hex_bytes(&bytes))
            }
            Err(e) => {
                self.stats.add_failure();
                CommandResponse::err(e)
            }
        }
    }
}

fn show_spaces(frame: &str) -> String {
    frame.replace(' ', "\u{B7}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn show_spaces_uses_middle_dot() {
        assert_eq!(show_spaces("a b"), "a\u{B7}b");
        assert_eq!(show_spaces("a b").as_bytes(), b"a\xC2\xB7b");
    }
}
