//! Host-facing capabilities the service is wired with.
//!
//! The emulator host supplies these at build time; every one is optional,
//! and the dispatcher degrades verb-by-verb when one is missing (`TYPE`
//! without an injector fails with `keyboard unavailable`, and so on).

use std::sync::Arc;

use keyrelay::{KeyRelay, KeyInjector};
use parking_lot::Mutex;
use textwire_protocol::CommandResponse;

use crate::memory::MemoryAccess;
use crate::snapshot::TextSnapshot;

/// Result of a frame capture: the rendered frame, or the reason none is
/// available (service disabled, video not in text mode, ...). The reason is
/// sent verbatim as `ERR <reason>`.
pub type FrameResult = std::result::Result<String, String>;

/// Capability producing the current wire frame.
pub trait FrameProvider: Send + Sync {
    /// Captures and renders the current text screen.
    fn capture_frame(&self) -> FrameResult;
}

/// Capability producing a raw screen snapshot; the service wraps this in a
/// provider that applies the configured sentinel, attribute mode and the
/// live `keys_down` set.
pub trait SnapshotSource: Send + Sync {
    /// Captures the current text screen, or explains why it cannot.
    fn capture(&self) -> std::result::Result<TextSnapshot, String>;
}

/// Hook invoked when a controller issues `EXIT`.
pub type ExitHook = Box<dyn FnMut() + Send>;

/// Shared handle to the keyboard command processor.
///
/// The dispatcher, the action sink and the optional keyboard-port listener
/// all drive the same `KeyRelay` from the tick thread.
#[derive(Clone)]
pub struct KeyboardHandle {
    relay: Arc<Mutex<KeyRelay>>,
}

impl KeyboardHandle {
    /// Wraps a relay built over the host's injector.
    pub fn new(injector: Box<dyn KeyInjector>) -> Self {
        Self {
            relay: Arc::new(Mutex::new(KeyRelay::new(injector))),
        }
    }

    /// Handles one keyboard command line.
    pub fn handle_command(&self, command: &str) -> CommandResponse {
        self.relay.lock().handle_command(command)
    }

    /// Display names of the held keys, sorted.
    pub fn active_keys(&self) -> Vec<String> {
        self.relay.lock().active_keys()
    }

    /// Releases every held key.
    pub fn reset(&self) {
        self.relay.lock().reset();
    }
}

/// Everything the host can wire into a service.
#[derive(Default)]
pub struct HostBindings {
    /// Keyboard injection primitive; enables `TYPE` and the keyboard verbs.
    pub injector: Option<Box<dyn KeyInjector>>,
    /// Raw snapshot capture; the service renders frames from it.
    pub snapshot_source: Option<Arc<dyn SnapshotSource>>,
    /// Pre-rendered frame provider, used when no snapshot source is given.
    pub frame_provider: Option<Arc<dyn FrameProvider>>,
    /// Physical memory access; enables `PEEK`/`POKE`/`DEBUG`.
    pub memory: Option<Arc<dyn MemoryAccess>>,
    /// Host exit hook for `EXIT`.
    pub on_exit: Option<ExitHook>,
}
