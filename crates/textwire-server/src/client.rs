//! Controller-side connection to a running service.
//!
//! A thin blocking client used by tooling and smoke tests: connect (with
//! retry while the host is still starting), send verb lines, and read
//! single-line replies or whole frames.

use std::{
    io::{ErrorKind, Read, Write},
    net::TcpStream,
    thread,
    time::{Duration, Instant},
};

use textwire_protocol::frame::ParsedFrame;

use crate::{Error, Result};

const CONNECT_RETRY_INTERVAL: Duration = Duration::from_millis(50);
const READ_POLL_INTERVAL: Duration = Duration::from_millis(50);

/// Blocking controller connection.
pub struct Client {
    stream: TcpStream,
}

impl Client {
    /// Connects to `host:port`, retrying until `timeout` elapses (the
    /// service may still be binding its listener).
    pub fn connect(host: &str, port: u16, timeout: Duration) -> Result<Self> {
        let deadline = Instant::now() + timeout;
        loop {
            match TcpStream::connect((host, port)) {
                Ok(stream) => {
                    stream.set_nodelay(true).ok();
                    return Ok(Self { stream });
                }
                Err(e) => {
                    if Instant::now() >= deadline {
                        return Err(Error::Protocol(format!(
                            "connect to {host}:{port} failed: {e}"
                        )));
                    }
                    thread::sleep(CONNECT_RETRY_INTERVAL);
                }
            }
        }
    }

    /// Sends one request line; the newline is appended.
    pub fn send_line(&mut self, line: &str) -> Result<()> {
        self.stream.write_all(line.as_bytes())?;
        self.stream.write_all(b"\n")?;
        self.stream.flush()?;
        Ok(())
    }

    /// Reads a reply, accumulating until the stream goes quiet or `timeout`
    /// elapses. Frames span many reads; single-line replies return after the
    /// first.
    pub fn read_reply(&mut self, timeout: Duration) -> Result<String> {
        self.stream
            .set_read_timeout(Some(READ_POLL_INTERVAL))
            .map_err(Error::Io)?;

        let deadline = Instant::now() + timeout;
        let mut buffer = Vec::new();
        while Instant::now() < deadline {
            let mut chunk = [0u8; 1024];
            match self.stream.read(&mut chunk) {
                Ok(0) => break,
                Ok(received) => {
                    buffer.extend_from_slice(&chunk[..received]);
                    if received < chunk.len() {
                        break;
                    }
                }
                Err(e)
                    if e.kind() == ErrorKind::WouldBlock || e.kind() == ErrorKind::TimedOut =>
                {
                    if !buffer.is_empty() {
                        break;
                    }
                }
                Err(e) => return Err(Error::Io(e)),
            }
        }

        if buffer.is_empty() {
            return Err(Error::Protocol("no reply before timeout".to_string()));
        }
        Ok(String::from_utf8_lossy(&buffer).into_owned())
    }

    /// Sends a line and reads its reply.
    pub fn request(&mut self, line: &str, timeout: Duration) -> Result<String> {
        self.send_line(line)?;
        self.read_reply(timeout)
    }

    /// Requests a frame via `GET` and parses the sentinel header.
    pub fn request_frame(&mut self, timeout: Duration) -> Result<ParsedFrame> {
        let reply = self.request("GET", timeout)?;
        if let Some(reason) = reply.strip_prefix("ERR ") {
            return Err(Error::Protocol(reason.trim_end().to_string()));
        }
        ParsedFrame::parse(&reply)
            .ok_or_else(|| Error::Protocol("reply is not a frame".to_string()))
    }

    /// Authenticates with the pre-shared token.
    pub fn auth(&mut self, token: &str, timeout: Duration) -> Result<()> {
        let reply = self.request(&format!("AUTH {token}"), timeout)?;
        if reply == "OK\n" {
            Ok(())
        } else {
            Err(Error::Protocol(reply.trim_end().to_string()))
        }
    }
}
