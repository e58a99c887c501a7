//! Session layer: newline framing, reply emission, lifecycle.
//!
//! The server owns the network backend and the per-client receive buffers.
//! The command handler is borrowed per poll, so the host can own dispatcher
//! and server side by side; disconnects fan out to the handler so queued
//! work for that client is cancelled.

use std::collections::HashMap;

use textwire_protocol::{ClientHandle, CommandOrigin, CommandResponse};
use tracing::{debug, trace};

use crate::{
    backend::{BackendEvent, NetworkBackend},
    dispatch::CommandDispatcher,
    host::KeyboardHandle,
    sink::ReplyTransport,
    Result,
};

/// Server-facing command processor interface.
pub trait CommandHandler {
    /// Handles one complete request line.
    fn handle_command(&mut self, line: &str, origin: CommandOrigin) -> CommandResponse;

    /// True once after a handled `EXIT`; the server drops the client.
    fn consume_exit_request(&mut self) -> bool {
        false
    }

    /// A client's connection closed; cancel its queued work.
    fn on_client_closed(&mut self, _client: ClientHandle, _transport: &mut dyn ReplyTransport) {}

    /// One sink tick with a reply path into the session layer.
    fn poll_deferred(&mut self, _transport: &mut dyn ReplyTransport) {}
}

impl CommandHandler for CommandDispatcher {
    fn handle_command(&mut self, line: &str, origin: CommandOrigin) -> CommandResponse {
        self.handle_command(line, origin)
    }

    fn consume_exit_request(&mut self) -> bool {
        self.consume_exit_request()
    }

    fn on_client_closed(&mut self, client: ClientHandle, transport: &mut dyn ReplyTransport) {
        self.cancel_client(client, transport);
    }

    fn poll_deferred(&mut self, transport: &mut dyn ReplyTransport) {
        self.poll_sink(transport);
    }
}

// A bare keyboard processor can serve a listener of its own (the dedicated
// keyboard port).
impl CommandHandler for KeyboardHandle {
    fn handle_command(&mut self, line: &str, _origin: CommandOrigin) -> CommandResponse {
        KeyboardHandle::handle_command(self, line)
    }
}

#[derive(Default)]
struct Session {
    buffer: Vec<u8>,
    authenticated: bool,
}

struct BackendTransport<'a, B: NetworkBackend> {
    backend: &'a mut B,
    sessions: &'a mut HashMap<ClientHandle, Session>,
}

impl<B: NetworkBackend> ReplyTransport for BackendTransport<'_, B> {
    fn send(&mut self, client: ClientHandle, payload: &str) -> bool {
        self.backend.send(client, payload.as_bytes())
    }

    fn close(&mut self, client: ClientHandle) {
        self.sessions.remove(&client);
        self.backend.close(client);
    }
}

/// Line-oriented session server over an abstract backend.
pub struct LineProtocolServer<B: NetworkBackend> {
    backend: B,
    sessions: HashMap<ClientHandle, Session>,
    running: bool,
    port: u16,
    close_after_response: bool,
    auth_token: Option<String>,
}

impl<B: NetworkBackend> LineProtocolServer<B> {
    /// Wraps a backend; the server starts stopped.
    pub fn new(backend: B) -> Self {
        Self {
            backend,
            sessions: HashMap::new(),
            running: false,
            port: 0,
            close_after_response: false,
            auth_token: None,
        }
    }

    /// Close each connection right after its reply is sent.
    pub fn set_close_after_response(&mut self, enable: bool) {
        self.close_after_response = enable;
    }

    /// Require `AUTH <token>` before any other verb; empty disables.
    pub fn set_auth_token(&mut self, token: &str) {
        self.auth_token = (!token.is_empty()).then(|| token.to_string());
    }

    /// Starts listening. Starting again on the same port is a no-op.
    pub fn start(&mut self, port: u16) -> Result<()> {
        if self.running && port == self.port {
            return Ok(());
        }
        self.stop();
        self.backend.start(port)?;
        self.running = true;
        self.port = port;
        Ok(())
    }

    /// Closes every session and stops the listener.
    pub fn stop(&mut self) {
        for (client, _) in self.sessions.drain() {
            self.backend.close(client);
        }
        self.backend.stop();
        self.running = false;
        self.port = 0;
    }

    /// True while the listener is up.
    pub fn is_running(&self) -> bool {
        self.running
    }

    /// Port of the running listener (0 when stopped).
    pub fn port(&self) -> u16 {
        self.port
    }

    /// Sends a raw payload to a client.
    pub fn send(&mut self, client: ClientHandle, payload: &str) -> bool {
        self.backend.send(client, payload.as_bytes())
    }

    /// Drains backend events and feeds complete lines to the handler.
    pub fn poll<H: CommandHandler>(&mut self, handler: &mut H) {
        if !self.running {
            return;
        }

        for event in self.backend.poll() {
            match event {
                BackendEvent::Connected(client) => {
                    self.sessions.insert(client, Session::default());
                }
                BackendEvent::Data(client, data) => {
                    self.handle_data(client, &data, handler);
                }
                BackendEvent::Closed(client) => {
                    self.drop_client(client, handler);
                }
            }
        }
    }

    /// Gives the handler one sink tick with a reply path into this server.
    pub fn poll_deferred<H: CommandHandler>(&mut self, handler: &mut H) {
        if !self.running {
            return;
        }
        let Self {
            backend, sessions, ..
        } = self;
        let mut transport = BackendTransport { backend, sessions };
        handler.poll_deferred(&mut transport);
    }

    fn handle_data<H: CommandHandler>(&mut self, client: ClientHandle, data: &[u8], handler: &mut H) {
        match self.sessions.get_mut(&client) {
            Some(session) => session.buffer.extend_from_slice(data),
            None => return,
        }

        loop {
            let line = {
                let Some(session) = self.sessions.get_mut(&client) else {
                    break;
                };
                let Some(newline) = session.buffer.iter().position(|&b| b == b'\n') else {
                    break;
                };
                let mut line: Vec<u8> = session.buffer.drain(..=newline).collect();
                line.pop();
                if line.last() == Some(&b'\r') {
                    line.pop();
                }
                String::from_utf8_lossy(&line).into_owned()
            };
            trace!(%client, line, "request");

            if self.auth_gate(client, &line, handler) {
                continue;
            }

            let response = handler.handle_command(&line, CommandOrigin::from_client(client));
            if response.deferred {
                trace!(%client, id = response.deferred_id, "reply deferred");
                continue;
            }

            if !self.backend.send(client, response.payload.as_bytes()) {
                self.drop_client(client, handler);
                break;
            }
            if self.close_after_response {
                self.drop_client(client, handler);
                break;
            }
            if handler.consume_exit_request() {
                debug!(%client, "exit requested");
                self.drop_client(client, handler);
                break;
            }
        }
    }

    /// Intercepts lines from unauthenticated sessions. Returns true when the
    /// line was consumed here.
    fn auth_gate<H: CommandHandler>(
        &mut self,
        client: ClientHandle,
        line: &str,
        handler: &mut H,
    ) -> bool {
        let Some(expected) = self.auth_token.clone() else {
            return false;
        };
        if self
            .sessions
            .get(&client)
            .is_none_or(|session| session.authenticated)
        {
            return false;
        }

        let (verb, argument) = match line.trim().split_once(' ') {
            Some((verb, rest)) => (verb, rest.trim()),
            None => (line.trim(), ""),
        };

        let payload = if verb != "AUTH" {
            "ERR auth required\n"
        } else if argument == expected {
            if let Some(session) = self.sessions.get_mut(&client) {
                session.authenticated = true;
            }
            "OK\n"
        } else {
            debug!(%client, "invalid auth token");
            "ERR invalid auth token\n"
        };

        if !self.backend.send(client, payload.as_bytes()) {
            self.drop_client(client, handler);
        }
        true
    }

    fn drop_client<H: CommandHandler>(&mut self, client: ClientHandle, handler: &mut H) {
        self.sessions.remove(&client);
        self.backend.close(client);
        let Self {
            backend, sessions, ..
        } = self;
        let mut transport = BackendTransport { backend, sessions };
        handler.on_client_closed(client, &mut transport);
    }
}
