//! Line-oriented TCP control channel for text-mode emulator hosts.
//!
//! An external controller inspects the host's text-mode screen and drives
//! its keyboard over a newline-framed ASCII protocol. The crate provides:
//!
//! - [`CommandDispatcher`]: the verb grammar (`GET`/`VIEW`, `STATS`,
//!   `EXIT`, `TYPE`, `PEEK`/`POKE`/`DEBUG`) with a strict case policy.
//! - [`compile`]: the pure `TYPE` compiler lowering tokens and quoted
//!   strings to primitive keyboard and delay actions.
//! - [`QueuedActionSink`]: deferred execution of those plans, time-sliced
//!   across host poll ticks with per-client ordering and cancellation on
//!   disconnect.
//! - [`LineProtocolServer`] over an abstract [`NetworkBackend`] (a
//!   non-blocking TCP implementation is included).
//! - [`ControlService`]: the assembly root tying everything to a
//!   [`ServiceConfig`] and the host's capability bindings.
//! - [`Client`]: the controller-side connection used by tooling.
//!
//! Scheduling is single-threaded and cooperative: the host calls the
//! service's `poll()` once per tick; "frame" delays are counted in those
//! ticks, wall-clock delays against a monotonic clock.

#![warn(missing_docs)]

mod backend;
mod client;
pub mod compile;
mod config;
mod dispatch;
pub mod encoder;
mod error;
pub mod host;
pub mod memory;
mod server;
mod service;
mod sink;
pub mod snapshot;

pub use backend::{BackendEvent, MAX_CLIENTS, NetworkBackend, TcpBackend};
pub use client::Client;
pub use compile::compile;
pub use config::{AUTH_TOKEN_ENV, MAX_FRAME_DELAY, ServiceConfig, combine_segment_offset};
pub use dispatch::{CommandDispatcher, SharedStats};
pub use error::{Error, Result};
pub use host::{FrameProvider, FrameResult, HostBindings, KeyboardHandle, SnapshotSource};
pub use server::{CommandHandler, LineProtocolServer};
pub use service::ControlService;
pub use sink::{
    CompletionCallback, InlineActionSink, NOMINAL_FRAME, QueuedActionSink, ReplyTransport,
};
