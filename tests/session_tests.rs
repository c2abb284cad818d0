//! Integration tests for the session layer: the loopback top-level server,
//! per-connection workers, signalling, and supervised cleanup.

mod common;

use plbridge::{BridgeError, HostValue, Supervisor, WorkerKind};
use std::io::{BufRead, BufReader, Read, Write};
use std::net::TcpStream;
use std::sync::mpsc;
use std::time::Duration;

fn read_prompt(reader: &mut impl Read) {
    let mut prompt = [0u8; 3];
    reader.read_exact(&mut prompt).expect("reading prompt");
    assert_eq!(&prompt, b"?- ");
}

fn read_line(reader: &mut impl BufRead) -> String {
    let mut line = String::new();
    reader.read_line(&mut line).expect("reading response line");
    line.trim_end().to_string()
}

fn wait_until(mut condition: impl FnMut() -> bool) -> bool {
    for _ in 0..200 {
        if condition() {
            return true;
        }
        std::thread::sleep(Duration::from_millis(10));
    }
    false
}

#[test]
fn accept_without_a_running_server_is_an_error() {
    let (bridge, _) = common::bridge();
    assert!(matches!(
        bridge.accept_top_level_client("tok"),
        Err(BridgeError::ServerNotStarted)
    ));
}

#[test]
fn session_lifecycle_over_loopback() {
    let _guard = common::supervisor_lock();
    let (bridge, _) = common::bridge();

    let port = bridge.start_top_level_server(0).unwrap();
    assert_ne!(port, 0);
    // Starting again is idempotent and reports the same endpoint
    assert_eq!(bridge.start_top_level_server(0).unwrap(), port);

    // The client connects first (the listener backlog holds it), then the
    // host asks for the accept.
    let client = TcpStream::connect(("127.0.0.1", port)).expect("connecting to server");
    let worker = bridge.accept_top_level_client("tok").unwrap();
    assert_eq!(bridge.session_worker("tok"), Some(worker));
    assert!(Supervisor::global()
        .roster()
        .iter()
        .any(|(id, kind)| *id == worker && *kind == WorkerKind::SessionWorker));

    let mut reader = BufReader::new(client.try_clone().expect("cloning client stream"));
    let mut writer = client;

    read_prompt(&mut reader);
    writer.write_all(b"permute([1,2,3]).\n").unwrap();
    let expected = ["(1 2 3)", "(1 3 2)", "(2 1 3)", "(2 3 1)", "(3 1 2)", "(3 2 1)"];
    for want in expected {
        assert_eq!(read_line(&mut reader), want);
    }

    // Unknown goals report and keep the session alive
    read_prompt(&mut reader);
    writer.write_all(b"no_such(1).\n").unwrap();
    let report = read_line(&mut reader);
    assert!(report.contains("existence_error"), "got: {}", report);

    read_prompt(&mut reader);
    writer.write_all(b"halt.\n").unwrap();
    let mut rest = Vec::new();
    reader.read_to_end(&mut rest).expect("draining session");
    assert!(rest.is_empty(), "unexpected trailing output: {:?}", rest);

    assert!(
        wait_until(|| bridge.session_worker("tok").is_none()),
        "session worker did not deregister after halt"
    );
    assert!(bridge.cleanup());
}

#[test]
fn closing_the_client_deregisters_the_session_worker() {
    let _guard = common::supervisor_lock();
    let (bridge, _) = common::bridge();

    let port = bridge.start_top_level_server(0).unwrap();
    let client = TcpStream::connect(("127.0.0.1", port)).expect("connecting to server");
    let worker = bridge.accept_top_level_client("eof").unwrap();
    assert_eq!(bridge.session_worker("eof"), Some(worker));

    // Dropping the client closes the stream; the worker sees end-of-stream
    drop(client);
    assert!(
        wait_until(|| bridge.session_worker("eof").is_none()),
        "session worker did not deregister after client close"
    );
    assert!(bridge.cleanup());
}

#[test]
fn signalled_halt_ends_a_session_between_turns() {
    let _guard = common::supervisor_lock();
    let (bridge, _) = common::bridge();

    let port = bridge.start_top_level_server(0).unwrap();
    let client = TcpStream::connect(("127.0.0.1", port)).expect("connecting to server");
    let worker = bridge.accept_top_level_client("sig").unwrap();

    let mut reader = BufReader::new(client.try_clone().expect("cloning client stream"));
    let mut writer = client;
    read_prompt(&mut reader);

    bridge.signal_thread(worker, "halt");
    // Signals travel through the supervisor's control channel; a roster
    // round-trip guarantees this one has been delivered before we wake the
    // worker with an empty turn.
    let _ = Supervisor::global().roster();
    writer.write_all(b"\n").unwrap();

    let mut rest = Vec::new();
    reader.read_to_end(&mut rest).expect("draining session");
    assert!(rest.is_empty(), "unexpected trailing output: {:?}", rest);
    assert!(
        wait_until(|| bridge.session_worker("sig").is_none()),
        "session worker did not deregister after halt signal"
    );
    assert!(bridge.cleanup());
}

#[test]
fn cleanup_drains_a_worker_blocked_inside_the_engine() {
    let _guard = common::supervisor_lock();
    let (bridge, engine) = common::bridge();

    let (release_tx, release_rx) = mpsc::channel::<()>();
    common::register_blocking_goal(&engine, release_rx);

    let stop: plbridge::StopHook = Box::new(move || {
        let _ = release_tx.send(());
    });
    let engine_for_worker = engine.clone();
    let id = Supervisor::global().spawn(WorkerKind::AsyncGoal, Some(stop), move || {
        use plbridge::{Engine, QueryCursor};
        let engine: std::sync::Arc<dyn Engine> = engine_for_worker;
        if let Ok(mut cursor) =
            QueryCursor::open(engine, "user", "user", "block", &HostValue::Nil)
        {
            // Blocks until the stop hook releases the goal
            let _ = cursor.next();
        }
    });
    assert!(Supervisor::global().roster().iter().any(|(w, _)| *w == id));

    assert!(bridge.cleanup());
    assert!(
        Supervisor::global().roster().is_empty(),
        "cleanup left workers in the roster"
    );
    assert!(!bridge.is_initialized());
}

#[test]
fn async_goal_runs_to_completion_and_deregisters() {
    let _guard = common::supervisor_lock();
    let (bridge, _) = common::bridge();

    let id = bridge
        .spawn_async_goal("user", "permute", common::int_list(&[1, 2]))
        .unwrap();
    assert!(
        wait_until(|| Supervisor::global().roster().iter().all(|(w, _)| *w != id)),
        "async goal worker never finished"
    );
    assert!(bridge.cleanup());
}

#[test]
fn async_goal_rejects_unencodable_arguments_up_front() {
    let _guard = common::supervisor_lock();
    let (bridge, _) = common::bridge();
    let before = Supervisor::global().roster().len();
    let result = bridge.spawn_async_goal("user", "unify", HostValue::True);
    assert!(matches!(result, Err(BridgeError::Open(_))), "got {:?}", result);
    assert_eq!(Supervisor::global().roster().len(), before);
    assert!(bridge.cleanup());
}
