//! Dispatcher behaviour: verb grammar, case policy, counters, and the
//! optional memory verbs.

mod common;

use std::sync::{
    Arc,
    atomic::{AtomicBool, Ordering},
};

use common::{CountingFrameProvider, FailingFrameProvider, FakeMemory, recording_keyboard};
use pc_keycode::Key;
use textwire_protocol::CommandOrigin;
use textwire_server::CommandDispatcher;

fn origin() -> CommandOrigin {
    CommandOrigin::none()
}

#[test]
fn rejects_when_service_disabled() {
    let mut dispatcher = CommandDispatcher::new()
        .with_frame_provider(Arc::new(FailingFrameProvider("text-mode server disabled")));

    let response = dispatcher.handle_command("GET", origin());
    assert!(!response.ok);
    assert_eq!(response.payload, "ERR text-mode server disabled\n");

    let stats = dispatcher.stats();
    assert_eq!(stats.requests, 1);
    assert_eq!(stats.failures, 1);
}

#[test]
fn returns_frame_for_get() {
    let mut dispatcher =
        CommandDispatcher::new().with_frame_provider(CountingFrameProvider::new("frame-raw\n"));

    let response = dispatcher.handle_command("GET", origin());
    assert!(response.ok);
    assert_eq!(response.payload, "frame-raw\n");
}

#[test]
fn get_without_provider_fails() {
    let mut dispatcher = CommandDispatcher::new();
    let response = dispatcher.handle_command("GET", origin());
    assert!(!response.ok);
    assert_eq!(response.payload, "ERR service unavailable\n");
    assert_eq!(dispatcher.stats().failures, 1);
}

#[test]
fn showspc_replaces_spaces_with_middle_dots() {
    let mut dispatcher =
        CommandDispatcher::new().with_frame_provider(CountingFrameProvider::new("a b\n"));

    let response = dispatcher.handle_command("GET SHOWSPC", origin());
    assert!(response.ok);
    assert_eq!(response.payload, "a\u{B7}b\n");
    assert_eq!(response.payload.as_bytes(), b"a\xC2\xB7b\n");

    // VIEW is an alias for GET.
    let response = dispatcher.handle_command("VIEW SHOWSPC", origin());
    assert_eq!(response.payload, "a\u{B7}b\n");
}

#[test]
fn stats_line_counts_and_keys_down() {
    let (keyboard, _recorder) = recording_keyboard();
    let mut dispatcher = CommandDispatcher::new()
        .with_frame_provider(CountingFrameProvider::new("FRAME\n"))
        .with_keyboard(keyboard.clone());

    assert!(dispatcher.handle_command("GET", origin()).ok);
    keyboard.handle_command("DOWN Ctrl");
    keyboard.handle_command("DOWN Shift");

    let response = dispatcher.handle_command("STATS", origin());
    assert!(response.ok);
    assert_eq!(
        response.payload,
        "requests=1 success=1 failures=0 keys_down=Ctrl,Shift\n"
    );

    // STATS itself does not count as a request.
    assert_eq!(dispatcher.stats().requests, 1);
}

#[test]
fn stats_after_success_and_failure() {
    let provider = CountingFrameProvider::new("FRAME\n");
    let mut dispatcher = CommandDispatcher::new().with_frame_provider(provider);
    assert!(dispatcher.handle_command("GET", origin()).ok);

    let mut dispatcher_failing =
        CommandDispatcher::new().with_frame_provider(Arc::new(FailingFrameProvider("boom")));
    assert!(!dispatcher_failing.handle_command("GET", origin()).ok);
    let response = dispatcher_failing.handle_command("STATS", origin());
    assert_eq!(
        response.payload,
        "requests=1 success=0 failures=1 keys_down=\n"
    );
}

#[test]
fn known_verbs_are_case_sensitive() {
    let (keyboard, recorder) = recording_keyboard();
    let mut dispatcher = CommandDispatcher::new()
        .with_frame_provider(CountingFrameProvider::new("FRAME\n"))
        .with_keyboard(keyboard);

    for line in ["type A", "get", "View", "stats", "exit", "peek 0 1", "Debug"] {
        let response = dispatcher.handle_command(line, origin());
        assert!(!response.ok, "{line:?} should fail");
        assert_eq!(
            response.payload, "ERR commands are case-sensitive\n",
            "for {line:?}"
        );
    }

    assert!(recorder.is_empty());
    // Case errors touch no counter.
    assert_eq!(dispatcher.stats().requests, 0);
}

#[test]
fn unknown_and_empty_commands() {
    let mut dispatcher = CommandDispatcher::new();
    assert_eq!(
        dispatcher.handle_command("FLY", origin()).payload,
        "ERR unknown command\n"
    );
    assert_eq!(
        dispatcher.handle_command("", origin()).payload,
        "ERR empty command\n"
    );
    assert_eq!(
        dispatcher.handle_command("   \t ", origin()).payload,
        "ERR empty command\n"
    );
    assert_eq!(dispatcher.stats().requests, 0);
}

#[test]
fn exit_requests_shutdown_once() {
    let exit_called = Arc::new(AtomicBool::new(false));
    let flag = exit_called.clone();
    let mut dispatcher = CommandDispatcher::new()
        .with_exit_hook(Box::new(move || flag.store(true, Ordering::SeqCst)));

    let response = dispatcher.handle_command("EXIT", origin());
    assert!(response.ok);
    assert_eq!(response.payload, "OK\n");
    assert!(exit_called.load(Ordering::SeqCst));
    assert!(dispatcher.consume_exit_request());
    assert!(!dispatcher.consume_exit_request());

    let stats = dispatcher.stats();
    assert_eq!(stats.requests, 1);
    assert_eq!(stats.success, 1);
    assert_eq!(stats.failures, 0);
}

#[test]
fn type_without_keyboard_fails() {
    let mut dispatcher = CommandDispatcher::new();
    let response = dispatcher.handle_command("TYPE A", origin());
    assert!(!response.ok);
    assert_eq!(response.payload, "ERR keyboard unavailable\n");
    let stats = dispatcher.stats();
    assert_eq!(stats.requests, 1);
    assert_eq!(stats.failures, 1);
}

#[test]
fn type_executes_inline_without_a_sink() {
    let (keyboard, recorder) = recording_keyboard();
    let mut dispatcher = CommandDispatcher::new().with_keyboard(keyboard);

    let response = dispatcher.handle_command("TYPE A B", origin());
    assert!(response.ok);
    assert!(!response.deferred);
    assert_eq!(response.payload, "OK\n");
    assert_eq!(
        recorder.events(),
        vec![
            (Key::A, true),
            (Key::A, false),
            (Key::B, true),
            (Key::B, false),
        ]
    );
    let stats = dispatcher.stats();
    assert_eq!(stats.requests, 1);
    assert_eq!(stats.success, 1);
}

#[test]
fn peek_reads_hex_bytes() {
    let memory = FakeMemory::new(32);
    let mut dispatcher = CommandDispatcher::new().with_memory(memory);

    let response = dispatcher.handle_command("PEEK 0x04 4", origin());
    assert!(response.ok);
    assert_eq!(response.payload, "04 05 06 07\n");

    let response = dispatcher.handle_command("PEEK 0x0:0x10 2", origin());
    assert_eq!(response.payload, "10 11\n");
}

#[test]
fn peek_argument_and_bounds_errors() {
    let memory = FakeMemory::new(16);
    let mut dispatcher = CommandDispatcher::new().with_memory(memory);

    for line in ["PEEK", "PEEK 0x0", "PEEK zz 4", "PEEK 0x0 x", "PEEK 0x0 4 9"] {
        let response = dispatcher.handle_command(line, origin());
        assert_eq!(response.payload, "ERR invalid PEEK arguments\n", "for {line:?}");
    }

    let response = dispatcher.handle_command("PEEK 0x10 1", origin());
    assert_eq!(response.payload, "ERR memory range out of bounds\n");

    let stats = dispatcher.stats();
    assert_eq!(stats.requests, 6);
    assert_eq!(stats.failures, 6);
}

#[test]
fn poke_writes_bytes() {
    let memory = FakeMemory::new(16);
    let mut dispatcher = CommandDispatcher::new().with_memory(memory.clone());

    let response = dispatcher.handle_command("POKE 0x02 aabb", origin());
    assert!(response.ok);
    assert_eq!(response.payload, "OK\n");
    assert_eq!(memory.byte(2), 0xAA);
    assert_eq!(memory.byte(3), 0xBB);

    let response = dispatcher.handle_command("POKE 0x02 abc", origin());
    assert_eq!(response.payload, "ERR invalid POKE arguments\n");
}

#[test]
fn memory_verbs_without_memory() {
    let mut dispatcher = CommandDispatcher::new();
    for line in ["PEEK 0x0 1", "POKE 0x0 aa", "DEBUG"] {
        let response = dispatcher.handle_command(line, origin());
        assert_eq!(response.payload, "ERR memory unavailable\n", "for {line:?}");
    }
}

#[test]
fn debug_returns_configured_region() {
    let memory = FakeMemory::new(64);
    let mut dispatcher = CommandDispatcher::new().with_memory(memory);

    let response = dispatcher.handle_command("DEBUG", origin());
    assert_eq!(response.payload, "ERR debug region not configured\n");

    dispatcher.set_debug_region(0x08, 3);
    let response = dispatcher.handle_command("DEBUG", origin());
    assert!(response.ok);
    assert_eq!(response.payload, "08 09 0a\n");
}
