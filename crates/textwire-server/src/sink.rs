//! Deferred execution of `TYPE` plans across host poll ticks.
//!
//! The queued sink owns a FIFO of pending requests and is driven solely by
//! `poll()`; it advances at most one primitive key action per tick for the
//! head request, inserts inter-token spacing, honours wall-clock and frame
//! delays, and on completion routes the reply (frame or deferred `OK`) back
//! to the originating client. While the head request is blocked no other
//! request runs, which is what guarantees global submission order.
//!
//! The inline sink executes a plan synchronously, sleeping through delays;
//! the dispatcher uses it when a request cannot be queued.

use std::{
    collections::VecDeque,
    sync::Arc,
    thread,
    time::{Duration, Instant},
};

use textwire_protocol::{
    ClientHandle, CommandOrigin, CommandResponse, TypeAction, TypeCommandPlan,
};
use tracing::{trace, warn};

use crate::host::{FrameProvider, KeyboardHandle};

/// Reply path back to the session layer: send a payload to a client, or
/// close its connection.
pub trait ReplyTransport {
    /// Sends a payload; false when the client is gone or the write failed.
    fn send(&mut self, client: ClientHandle, payload: &str) -> bool;
    /// Closes the client's connection.
    fn close(&mut self, client: ClientHandle);
}

/// Invoked exactly once per deferred request with the final success flag.
pub type CompletionCallback = Box<dyn FnMut(bool) + Send>;

/// Nominal frame duration used when delays must be slept through
/// synchronously (no tick source exists inline).
pub const NOMINAL_FRAME: Duration = Duration::from_micros(16_667);

struct PendingRequest {
    id: u64,
    origin: CommandOrigin,
    plan: TypeCommandPlan,
    on_complete: Option<CompletionCallback>,
    next_action: usize,
    resume_at: Option<Instant>,
    frames_remaining: u32,
    notify_completion: bool,
    send_response: bool,
    response_payload: String,
    saw_key_action: bool,
    final_frame_wait_inserted: bool,
}

/// FIFO sink advancing queued plans one step per host poll tick.
pub struct QueuedActionSink {
    keyboard: KeyboardHandle,
    frames: Option<Arc<dyn FrameProvider>>,
    close_after_response: bool,
    inter_token_frame_delay: u32,
    next_id: u64,
    pending: VecDeque<PendingRequest>,
}

impl QueuedActionSink {
    /// Creates a sink executing key actions against `keyboard` and final
    /// captures against `frames`.
    pub fn new(keyboard: KeyboardHandle, frames: Option<Arc<dyn FrameProvider>>) -> Self {
        Self {
            keyboard,
            frames,
            close_after_response: false,
            inter_token_frame_delay: 0,
            next_id: 1,
            pending: VecDeque::new(),
        }
    }

    /// Close the originating connection after delivering a deferred reply.
    pub fn set_close_after_response(&mut self, enable: bool) {
        self.close_after_response = enable;
    }

    /// Frames to wait after each key action before the next one.
    pub fn set_inter_token_frame_delay(&mut self, frames: u32) {
        self.inter_token_frame_delay = frames;
    }

    /// Number of requests currently queued.
    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }

    /// Accepts a plan for execution.
    ///
    /// Empty plans resolve immediately (including an immediate capture when
    /// a frame is requested). Otherwise the plan is queued; the response is
    /// a deferred marker when the reply must wait for completion
    /// (`request_frame`, or the sink owns the close-after-response), and an
    /// immediate `OK` when it does not. `on_complete` fires exactly once
    /// for deferred requests; terminal responses are the caller's to count.
    pub fn execute(
        &mut self,
        plan: TypeCommandPlan,
        origin: CommandOrigin,
        on_complete: CompletionCallback,
    ) -> CommandResponse {
        if plan.actions.is_empty() {
            if !plan.request_frame {
                return CommandResponse::ok();
            }
            return match &self.frames {
                None => CommandResponse::err("service unavailable"),
                Some(provider) => match provider.capture_frame() {
                    Ok(frame) => CommandResponse::with_payload(frame),
                    Err(reason) => CommandResponse::err(reason),
                },
            };
        }

        let defer_response = plan.request_frame || self.close_after_response;
        let send_response = defer_response && !plan.request_frame;

        let id = self.next_id;
        self.next_id += 1;

        let request = PendingRequest {
            id,
            origin,
            plan,
            on_complete: defer_response.then_some(on_complete),
            next_action: 0,
            resume_at: None,
            frames_remaining: 0,
            notify_completion: defer_response,
            send_response,
            response_payload: if send_response {
                "OK\n".to_string()
            } else {
                String::new()
            },
            saw_key_action: false,
            final_frame_wait_inserted: false,
        };
        trace!(
            id,
            client = ?origin.client,
            deferred = defer_response,
            frame = request.plan.request_frame,
            actions = request.plan.actions.len(),
            "enqueue"
        );
        self.pending.push_back(request);

        if defer_response {
            CommandResponse::deferred(id)
        } else {
            CommandResponse::ok()
        }
    }

    /// Advances the head request by at most one primitive key action.
    pub fn poll(&mut self, transport: &mut dyn ReplyTransport) {
        let keyboard = self.keyboard.clone();
        let frames = self.frames.clone();
        let close_after_response = self.close_after_response;
        let spacing = self.inter_token_frame_delay;

        let now = Instant::now();

        loop {
            let Some(request) = self.pending.front_mut() else {
                break;
            };
            trace!(
                id = request.id,
                next = request.next_action,
                frames = request.frames_remaining,
                waiting = request.resume_at.is_some(),
                "poll"
            );

            if request.frames_remaining > 0 {
                request.frames_remaining -= 1;
                if request.frames_remaining > 0 {
                    break;
                }
            }

            if let Some(deadline) = request.resume_at {
                if now < deadline {
                    break;
                }
                request.resume_at = None;
            }

            while request.next_action < request.plan.actions.len() {
                let action = request.plan.actions[request.next_action];

                // Zero-length waits are no-ops.
                if matches!(action, TypeAction::DelayFrames(0) | TypeAction::DelayMs(0)) {
                    request.next_action += 1;
                    continue;
                }

                match action {
                    TypeAction::Press(_) | TypeAction::Down(_) | TypeAction::Up(_) => {
                        if matches!(action, TypeAction::Press(_)) {
                            request.saw_key_action = true;
                        }
                        send_keyboard_action(&keyboard, action);
                        trace!(id = request.id, ?action, "action");
                        request.next_action += 1;
                        let next_is_delay = request
                            .plan
                            .actions
                            .get(request.next_action)
                            .is_some_and(TypeAction::is_delay);
                        if !next_is_delay && spacing > 0 {
                            request.frames_remaining = spacing;
                        }
                    }
                    TypeAction::DelayMs(millis) => {
                        request.resume_at = Some(now + Duration::from_millis(millis));
                        trace!(id = request.id, millis, "delay");
                        request.next_action += 1;
                    }
                    TypeAction::DelayFrames(count) => {
                        request.frames_remaining = count;
                        trace!(id = request.id, count, "delay");
                        request.next_action += 1;
                    }
                }
                // One primitive action per tick.
                break;
            }

            if request.next_action >= request.plan.actions.len()
                && request.frames_remaining == 0
                && request.resume_at.is_none()
            {
                if request.saw_key_action && !request.final_frame_wait_inserted {
                    // The final capture must observe the last keystroke's
                    // side effect: hold one inter-token interval first.
                    request.frames_remaining = spacing.max(1);
                    request.final_frame_wait_inserted = true;
                    trace!(id = request.id, frames = request.frames_remaining, "final wait");
                    continue;
                }

                let success = complete_request(
                    request,
                    frames.as_deref(),
                    close_after_response,
                    transport,
                );
                if request.notify_completion
                    && let Some(on_complete) = request.on_complete.as_mut()
                {
                    on_complete(success);
                }
                trace!(id = request.id, success, "dequeue");
                self.pending.pop_front();
            }

            break;
        }
    }

    /// Drops every pending request from `client`, reporting failure through
    /// their completion callbacks, then closes the connection. No further
    /// replies or key events are produced for the cancelled requests.
    pub fn cancel_client(&mut self, client: ClientHandle, transport: &mut dyn ReplyTransport) {
        self.pending.retain_mut(|request| {
            if request.origin.client != Some(client) {
                return true;
            }
            trace!(id = request.id, %client, "cancel");
            if request.notify_completion
                && let Some(on_complete) = request.on_complete.as_mut()
            {
                on_complete(false);
            }
            false
        });
        transport.close(client);
    }
}

fn complete_request(
    request: &PendingRequest,
    frames: Option<&dyn FrameProvider>,
    close_after_response: bool,
    transport: &mut dyn ReplyTransport,
) -> bool {
    trace!(
        id = request.id,
        frame = request.plan.request_frame,
        send_response = request.send_response,
        "complete"
    );

    if request.plan.request_frame {
        let mut ok = true;
        let payload = match frames {
            None => {
                ok = false;
                "ERR service unavailable\n".to_string()
            }
            Some(provider) => match provider.capture_frame() {
                Ok(frame) => frame,
                Err(reason) => {
                    ok = false;
                    format!("ERR {reason}\n")
                }
            },
        };
        if let Some(client) = request.origin.client {
            if !transport.send(client, &payload) {
                ok = false;
            }
            if close_after_response {
                transport.close(client);
            }
        }
        return ok;
    }

    let mut ok = true;
    if request.send_response
        && let Some(client) = request.origin.client
    {
        if !transport.send(client, &request.response_payload) {
            ok = false;
        }
        if close_after_response {
            transport.close(client);
        }
    }
    ok
}

fn send_keyboard_action(keyboard: &KeyboardHandle, action: TypeAction) {
    let (verb, key) = match action {
        TypeAction::Press(key) => ("PRESS", key),
        TypeAction::Down(key) => ("DOWN", key),
        TypeAction::Up(key) => ("UP", key),
        TypeAction::DelayMs(_) | TypeAction::DelayFrames(_) => return,
    };
    let command = format!("{verb} {}", key.name());
    let response = keyboard.handle_command(&command);
    if !response.ok {
        warn!(
            command,
            payload = %response.payload.trim_end(),
            "TYPE keyboard action failed"
        );
    }
}

/// Synchronous fallback sink: executes the whole plan inline, sleeping
/// through delays, and captures the frame at the end when requested.
pub struct InlineActionSink {
    keyboard: KeyboardHandle,
    frames: Option<Arc<dyn FrameProvider>>,
}

impl InlineActionSink {
    /// Creates an inline sink over the same capabilities as the queue.
    pub fn new(keyboard: KeyboardHandle, frames: Option<Arc<dyn FrameProvider>>) -> Self {
        Self { keyboard, frames }
    }

    /// Runs the plan to completion and returns the terminal response.
    pub fn execute(&self, plan: &TypeCommandPlan) -> CommandResponse {
        for &action in &plan.actions {
            match action {
                TypeAction::DelayMs(millis) => thread::sleep(Duration::from_millis(millis)),
                TypeAction::DelayFrames(count) => thread::sleep(NOMINAL_FRAME * count),
                _ => send_keyboard_action(&self.keyboard, action),
            }
        }

        if !plan.request_frame {
            return CommandResponse::ok();
        }
        match &self.frames {
            None => CommandResponse::err("service unavailable"),
            Some(provider) => match provider.capture_frame() {
                Ok(frame) => CommandResponse::with_payload(frame),
                Err(reason) => CommandResponse::err(reason),
            },
        }
    }
}
