//! Assembly root: builds the dispatcher, sink and servers from a
//! [`ServiceConfig`] and the host's capability bindings, with an explicit
//! start/stop/poll lifecycle.

use std::sync::Arc;

use textwire_protocol::{CommandOrigin, CommandResponse};
use tracing::warn;

use crate::{
    backend::{NetworkBackend, TcpBackend},
    config::ServiceConfig,
    dispatch::CommandDispatcher,
    encoder::{EncodingOptions, build_frame},
    host::{FrameProvider, FrameResult, HostBindings, KeyboardHandle, SnapshotSource},
    server::LineProtocolServer,
    sink::QueuedActionSink,
    Result,
};

/// Frame provider composed from a raw snapshot source: applies the
/// configured sentinel and attribute mode, and stamps the live `keys_down`
/// set into the metadata.
struct SnapshotFrameProvider {
    source: Arc<dyn SnapshotSource>,
    keyboard: Option<KeyboardHandle>,
    show_attributes: bool,
    sentinel: String,
    enabled: bool,
}

impl FrameProvider for SnapshotFrameProvider {
    fn capture_frame(&self) -> FrameResult {
        if !self.enabled {
            return Err("text-mode server disabled".to_string());
        }
        let snapshot = self.source.capture()?;
        let options = EncodingOptions {
            show_attributes: self.show_attributes,
            sentinel: self.sentinel.clone(),
            keys_down: self
                .keyboard
                .as_ref()
                .map(KeyboardHandle::active_keys)
                .unwrap_or_default(),
        };
        Ok(build_frame(&snapshot, &options))
    }
}

/// A built control-channel service.
///
/// Owns the session server (and the optional dedicated keyboard listener),
/// the dispatcher, and the shared keyboard state. Drive it with one `poll()`
/// per host tick.
pub struct ControlService<B: NetworkBackend> {
    config: ServiceConfig,
    server: LineProtocolServer<B>,
    keyboard_server: Option<LineProtocolServer<B>>,
    dispatcher: CommandDispatcher,
    keyboard: Option<KeyboardHandle>,
}

impl ControlService<TcpBackend> {
    /// Builds a service over TCP backends.
    pub fn build(config: ServiceConfig, host: HostBindings) -> Result<Self> {
        let keyboard_backend = config.keyboard_enable.then(TcpBackend::new);
        Self::build_with_backends(config, TcpBackend::new(), keyboard_backend, host)
    }
}

impl<B: NetworkBackend> ControlService<B> {
    /// Builds a service over explicit backends; tests pass scripted fakes.
    pub fn build_with_backends(
        config: ServiceConfig,
        backend: B,
        keyboard_backend: Option<B>,
        host: HostBindings,
    ) -> Result<Self> {
        let config = config.resolve()?;

        let keyboard = host.injector.map(KeyboardHandle::new);

        let frames: Option<Arc<dyn FrameProvider>> = match (&host.snapshot_source, &host.frame_provider)
        {
            (Some(source), _) => Some(Arc::new(SnapshotFrameProvider {
                source: source.clone(),
                keyboard: keyboard.clone(),
                show_attributes: config.show_attributes,
                sentinel: config.sentinel.clone(),
                enabled: config.enable,
            })),
            (None, Some(provider)) => Some(provider.clone()),
            (None, None) => None,
        };

        let mut dispatcher = CommandDispatcher::new();
        if let Some(frames) = &frames {
            dispatcher = dispatcher.with_frame_provider(frames.clone());
        }
        if let Some(keyboard) = &keyboard {
            let mut sink = QueuedActionSink::new(keyboard.clone(), frames.clone());
            sink.set_close_after_response(config.close_after_response);
            sink.set_inter_token_frame_delay(config.inter_token_frame_delay);
            dispatcher = dispatcher.with_keyboard(keyboard.clone()).with_sink(sink);
        }
        if let Some(memory) = &host.memory {
            dispatcher = dispatcher.with_memory(memory.clone());
        }
        if let Some(on_exit) = host.on_exit {
            dispatcher = dispatcher.with_exit_hook(on_exit);
        }
        dispatcher.set_macro_interkey_frames(config.macro_interkey_frames);
        dispatcher.set_type_sink_requires_client(true);
        dispatcher.set_queue_non_frame_commands(true);
        dispatcher.set_allow_deferred_frames(true);
        dispatcher.set_debug_region(config.debug_address(), config.debug_length);

        let mut server = LineProtocolServer::new(backend);
        server.set_close_after_response(config.close_after_response);
        server.set_auth_token(&config.auth_token);

        let keyboard_server = match (keyboard_backend, &keyboard) {
            (Some(backend), Some(_)) => Some(LineProtocolServer::new(backend)),
            _ => None,
        };

        Ok(Self {
            config,
            server,
            keyboard_server,
            dispatcher,
            keyboard,
        })
    }

    /// Starts the configured listeners. Disabled services stay stopped.
    pub fn start(&mut self) -> Result<()> {
        if !self.config.enable {
            return Ok(());
        }
        self.server.start(self.config.port)?;
        if self.config.keyboard_enable
            && let Some(keyboard_server) = self.keyboard_server.as_mut()
            && let Err(e) = keyboard_server.start(self.config.keyboard_port)
        {
            warn!(port = self.config.keyboard_port, error = %e, "keyboard listener failed");
        }
        Ok(())
    }

    /// Stops the listeners and releases every held key.
    pub fn stop(&mut self) {
        self.server.stop();
        if let Some(keyboard_server) = self.keyboard_server.as_mut() {
            keyboard_server.stop();
        }
        if let Some(keyboard) = &self.keyboard {
            keyboard.reset();
        }
    }

    /// One host tick: session traffic first, then the deferred sink, then
    /// the keyboard listener.
    pub fn poll(&mut self) {
        self.server.poll(&mut self.dispatcher);
        self.server.poll_deferred(&mut self.dispatcher);
        if let (Some(keyboard_server), Some(keyboard)) =
            (self.keyboard_server.as_mut(), self.keyboard.as_mut())
        {
            keyboard_server.poll(keyboard);
        }
    }

    /// Handles a command outside any session (host-internal dispatch).
    pub fn handle_command(&mut self, command: &str) -> CommandResponse {
        self.dispatcher.handle_command(command, CommandOrigin::none())
    }

    /// True while the main listener is up.
    pub fn is_running(&self) -> bool {
        self.server.is_running()
    }

    /// The effective (validated) configuration.
    pub fn config(&self) -> &ServiceConfig {
        &self.config
    }

    /// The dispatcher, for inspection in tests and host bridges.
    pub fn dispatcher(&self) -> &CommandDispatcher {
        &self.dispatcher
    }
}
