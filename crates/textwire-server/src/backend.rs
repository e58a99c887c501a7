//! Abstract network backend and the non-blocking TCP implementation.
//!
//! The session layer consumes connect/data/close events from a
//! [`NetworkBackend`] and calls back into it to send and close. Any
//! implementation that preserves per-client message ordering satisfies the
//! contract; tests use scripted fakes.

use std::{
    collections::HashMap,
    io::{ErrorKind, Read, Write},
    net::{Shutdown, TcpListener, TcpStream},
};

use textwire_protocol::ClientHandle;
use tracing::{debug, info, warn};

use crate::{Error, Result};

/// Maximum clients served concurrently; connections beyond the limit are
/// accepted and immediately closed.
pub const MAX_CLIENTS: usize = 8;

const RECEIVE_BUFFER_SIZE: usize = 4096;

/// One observable network event.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum BackendEvent {
    /// A client connected.
    Connected(ClientHandle),
    /// Bytes arrived from a client.
    Data(ClientHandle, Vec<u8>),
    /// A client's connection closed.
    Closed(ClientHandle),
}

/// Poll-driven network transport.
pub trait NetworkBackend {
    /// Starts listening on `port`.
    fn start(&mut self, port: u16) -> Result<()>;
    /// Stops listening and closes every client.
    fn stop(&mut self);
    /// Collects pending events without blocking.
    fn poll(&mut self) -> Vec<BackendEvent>;
    /// Sends a payload to a client; false when the client is gone or the
    /// write failed.
    fn send(&mut self, client: ClientHandle, payload: &[u8]) -> bool;
    /// Closes a client's connection.
    fn close(&mut self, client: ClientHandle);
}

impl NetworkBackend for Box<dyn NetworkBackend> {
    fn start(&mut self, port: u16) -> Result<()> {
        (**self).start(port)
    }
    fn stop(&mut self) {
        (**self).stop();
    }
    fn poll(&mut self) -> Vec<BackendEvent> {
        (**self).poll()
    }
    fn send(&mut self, client: ClientHandle, payload: &[u8]) -> bool {
        (**self).send(client, payload)
    }
    fn close(&mut self, client: ClientHandle) {
        (**self).close(client);
    }
}

/// Non-blocking TCP backend over `std::net`.
#[derive(Default)]
pub struct TcpBackend {
    listener: Option<TcpListener>,
    clients: HashMap<ClientHandle, TcpStream>,
    next_handle: u64,
}

impl TcpBackend {
    /// Creates a stopped backend.
    pub fn new() -> Self {
        Self::default()
    }

    fn accept_pending(&mut self, events: &mut Vec<BackendEvent>) {
        let Some(listener) = &self.listener else {
            return;
        };
        loop {
            match listener.accept() {
                Ok((stream, peer)) => {
                    if self.clients.len() >= MAX_CLIENTS {
                        warn!(%peer, "rejecting client, limit reached");
                        drop(stream);
                        continue;
                    }
                    if let Err(e) = stream.set_nonblocking(true) {
                        warn!(%peer, error = %e, "failed to make client non-blocking");
                        continue;
                    }
                    self.next_handle += 1;
                    let handle = ClientHandle::new(self.next_handle);
                    debug!(%peer, %handle, "client connected");
                    self.clients.insert(handle, stream);
                    events.push(BackendEvent::Connected(handle));
                }
                Err(e) if e.kind() == ErrorKind::WouldBlock => break,
                Err(e) => {
                    warn!(error = %e, "accept failed");
                    break;
                }
            }
        }
    }
}

impl NetworkBackend for TcpBackend {
    fn start(&mut self, port: u16) -> Result<()> {
        self.stop();

        let listener = TcpListener::bind(("0.0.0.0", port))
            .map_err(|e| Error::Listen(format!("bind to port {port} failed: {e}")))?;
        listener
            .set_nonblocking(true)
            .map_err(|e| Error::Listen(format!("non-blocking listener failed: {e}")))?;
        info!(port, "listening");
        self.listener = Some(listener);
        Ok(())
    }

    fn stop(&mut self) {
        for (_, stream) in self.clients.drain() {
            let _ = stream.shutdown(Shutdown::Both);
        }
        self.listener = None;
    }

    fn poll(&mut self) -> Vec<BackendEvent> {
        let mut events = Vec::new();
        self.accept_pending(&mut events);

        let mut closed = Vec::new();
        for (&handle, stream) in &mut self.clients {
            let mut buffer = [0u8; RECEIVE_BUFFER_SIZE];
            match stream.read(&mut buffer) {
                Ok(0) => closed.push(handle),
                Ok(received) => {
                    events.push(BackendEvent::Data(handle, buffer[..received].to_vec()));
                }
                Err(e) if e.kind() == ErrorKind::WouldBlock => {}
                Err(e) => {
                    debug!(%handle, error = %e, "read failed");
                    closed.push(handle);
                }
            }
        }

        for handle in closed {
            self.close(handle);
            events.push(BackendEvent::Closed(handle));
        }

        events
    }

    fn send(&mut self, client: ClientHandle, payload: &[u8]) -> bool {
        let Some(stream) = self.clients.get_mut(&client) else {
            return false;
        };
        // Replies are delivered whole; the stream goes blocking for the
        // write and back to non-blocking for reads.
        if stream.set_nonblocking(false).is_err() {
            return false;
        }
        let sent = stream.write_all(payload).and_then(|_| stream.flush());
        let restored = stream.set_nonblocking(true);
        match (&sent, &restored) {
            (Ok(()), Ok(())) => true,
            _ => {
                if let Err(e) = sent {
                    debug!(%client, error = %e, "send failed");
                }
                false
            }
        }
    }

    fn close(&mut self, client: ClientHandle) {
        if let Some(stream) = self.clients.remove(&client) {
            let _ = stream.shutdown(Shutdown::Both);
        }
    }
}
