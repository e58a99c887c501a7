//! Shared fixtures: recording fakes for the injector, frame provider,
//! reply transport and network backend.

#![allow(dead_code)]

use std::{
    collections::VecDeque,
    sync::{
        Arc,
        atomic::{AtomicUsize, Ordering},
    },
};

use keyrelay::RecordingInjector;
use parking_lot::Mutex;
use textwire_protocol::ClientHandle;
use textwire_server::{
    BackendEvent, FrameProvider, FrameResult, KeyboardHandle, NetworkBackend, ReplyTransport,
    Result, memory::MemoryAccess,
};

/// A keyboard handle plus the recorder behind it.
pub fn recording_keyboard() -> (KeyboardHandle, Arc<RecordingInjector>) {
    let recorder = Arc::new(RecordingInjector::new());
    (KeyboardHandle::new(Box::new(recorder.clone())), recorder)
}

/// Frame provider returning a fixed frame and counting captures.
pub struct CountingFrameProvider {
    frame: String,
    captures: AtomicUsize,
}

impl CountingFrameProvider {
    pub fn new(frame: &str) -> Arc<Self> {
        Arc::new(Self {
            frame: frame.to_string(),
            captures: AtomicUsize::new(0),
        })
    }

    pub fn captures(&self) -> usize {
        self.captures.load(Ordering::SeqCst)
    }
}

impl FrameProvider for CountingFrameProvider {
    fn capture_frame(&self) -> FrameResult {
        self.captures.fetch_add(1, Ordering::SeqCst);
        Ok(self.frame.clone())
    }
}

/// Frame provider that always fails with a fixed reason.
pub struct FailingFrameProvider(pub &'static str);

impl FrameProvider for FailingFrameProvider {
    fn capture_frame(&self) -> FrameResult {
        Err(self.0.to_string())
    }
}

/// Reply transport recording sends and closes.
#[derive(Default)]
pub struct RecordingTransport {
    pub sent: Vec<(ClientHandle, String)>,
    pub closed: Vec<ClientHandle>,
    pub send_result: bool,
}

impl RecordingTransport {
    pub fn new() -> Self {
        Self {
            send_result: true,
            ..Self::default()
        }
    }
}

impl ReplyTransport for RecordingTransport {
    fn send(&mut self, client: ClientHandle, payload: &str) -> bool {
        self.sent.push((client, payload.to_string()));
        self.send_result
    }

    fn close(&mut self, client: ClientHandle) {
        self.closed.push(client);
    }
}

/// In-memory fake for `PEEK`/`POKE`/`DEBUG`.
pub struct FakeMemory {
    bytes: Mutex<Vec<u8>>,
}

impl FakeMemory {
    pub fn new(size: usize) -> Arc<Self> {
        Arc::new(Self {
            bytes: Mutex::new((0..size).map(|i| i as u8).collect()),
        })
    }

    pub fn byte(&self, address: usize) -> u8 {
        self.bytes.lock()[address]
    }
}

impl MemoryAccess for FakeMemory {
    fn total_bytes(&self) -> u64 {
        self.bytes.lock().len() as u64
    }

    fn read_byte(&self, address: u32) -> Option<u8> {
        self.bytes.lock().get(address as usize).copied()
    }

    fn write_byte(&self, address: u32, value: u8) -> bool {
        match self.bytes.lock().get_mut(address as usize) {
            Some(slot) => {
                *slot = value;
                true
            }
            None => false,
        }
    }
}

#[derive(Default)]
struct FakeBackendState {
    started_port: u16,
    start_ok: bool,
    stopped: bool,
    send_result: bool,
    pending: VecDeque<Vec<BackendEvent>>,
    sent: Vec<(ClientHandle, Vec<u8>)>,
    closed: Vec<ClientHandle>,
}

/// Scripted network backend; clones share state so tests can inspect what
/// the server did with it.
#[derive(Clone)]
pub struct FakeBackend {
    state: Arc<Mutex<FakeBackendState>>,
}

impl FakeBackend {
    pub fn new() -> Self {
        Self {
            state: Arc::new(Mutex::new(FakeBackendState {
                start_ok: true,
                send_result: true,
                ..FakeBackendState::default()
            })),
        }
    }

    pub fn queue_events(&self, events: Vec<BackendEvent>) {
        self.state.lock().pending.push_back(events);
    }

    pub fn queue_line(&self, client: ClientHandle, line: &str) {
        self.queue_events(vec![BackendEvent::Data(client, line.as_bytes().to_vec())]);
    }

    pub fn set_send_result(&self, ok: bool) {
        self.state.lock().send_result = ok;
    }

    pub fn started_port(&self) -> u16 {
        self.state.lock().started_port
    }

    pub fn stopped(&self) -> bool {
        self.state.lock().stopped
    }

    pub fn sent(&self) -> Vec<(ClientHandle, String)> {
        self.state
            .lock()
            .sent
            .iter()
            .map(|(client, bytes)| (*client, String::from_utf8_lossy(bytes).into_owned()))
            .collect()
    }

    pub fn sent_payloads(&self) -> Vec<String> {
        self.sent().into_iter().map(|(_, payload)| payload).collect()
    }

    pub fn closed(&self) -> Vec<ClientHandle> {
        self.state.lock().closed.clone()
    }
}

impl NetworkBackend for FakeBackend {
    fn start(&mut self, port: u16) -> Result<()> {
        let mut state = self.state.lock();
        state.started_port = port;
        if state.start_ok {
            Ok(())
        } else {
            Err(textwire_server::Error::Listen("fake refusal".to_string()))
        }
    }

    fn stop(&mut self) {
        self.state.lock().stopped = true;
    }

    fn poll(&mut self) -> Vec<BackendEvent> {
        self.state.lock().pending.pop_front().unwrap_or_default()
    }

    fn send(&mut self, client: ClientHandle, payload: &[u8]) -> bool {
        let mut state = self.state.lock();
        state.sent.push((client, payload.to_vec()));
        state.send_result
    }

    fn close(&mut self, client: ClientHandle) {
        self.state.lock().closed.push(client);
    }
}
