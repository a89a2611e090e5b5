//! End-to-end rewrite flow against a scripted local completion endpoint.

use std::io::{BufRead, BufReader, Read, Write};
use std::net::{TcpListener, TcpStream};
use std::thread;
use std::time::Duration;

use secrecy::SecretString;

use mermaid_studio::rewrite::RewriteOutcome;
use mermaid_studio::{ProviderConfig, RewriteController, SessionStore};

/// Drain one HTTP request (headers plus `Content-Length` body) so the client
/// never blocks on an unread write buffer.
fn drain_request(stream: &mut TcpStream) {
    let mut reader = BufReader::new(stream.try_clone().expect("clone stream"));
    let mut content_length = 0usize;
    loop {
        let mut line = String::new();
        if reader.read_line(&mut line).unwrap_or(0) == 0 {
            return;
        }
        let line = line.trim_end();
        if line.is_empty() {
            break;
        }
        if let Some(value) = line.to_ascii_lowercase().strip_prefix("content-length:") {
            content_length = value.trim().parse().unwrap_or(0);
        }
    }
    let mut body = vec![0u8; content_length];
    let _ = reader.read_exact(&mut body);
}

const STREAM_HEADER: &str =
    "HTTP/1.1 200 OK\r\nContent-Type: text/event-stream\r\nConnection: close\r\n\r\n";

/// One-shot server that answers the next connection with the given SSE lines.
fn spawn_sse_server(frames: Vec<String>) -> String {
    let listener = TcpListener::bind("127.0.0.1:0").expect("bind");
    let base_url = format!("http://{}/v1", listener.local_addr().expect("addr"));
    thread::spawn(move || {
        let (mut stream, _) = listener.accept().expect("accept");
        drain_request(&mut stream);
        stream.write_all(STREAM_HEADER.as_bytes()).expect("write header");
        for frame in frames {
            stream.write_all(frame.as_bytes()).expect("write frame");
            stream.write_all(b"\n\n").expect("write frame");
        }
    });
    base_url
}

fn delta(content: &str) -> String {
    format!(r#"data: {{"choices":[{{"delta":{{"content":{}}}}}]}}"#, serde_json::to_string(content).unwrap())
}

fn config_for(base_url: &str) -> ProviderConfig {
    ProviderConfig::new(base_url, SecretString::from("sk-test".to_string()), "gpt-4o")
}

#[test]
fn streamed_rewrite_lands_fence_stripped_in_the_buffer() {
    let base_url = spawn_sse_server(vec![
        delta("```mermaid\n"),
        delta("graph TD\n"),
        // Frame with no content delta: skipped, not fatal.
        r#"data: {"choices":[{"delta":{}}]}"#.to_string(),
        // Undecodable frame: logged and skipped.
        "data: {not json".to_string(),
        delta("  A-->B\n"),
        delta("```"),
        "data: [DONE]".to_string(),
    ]);

    let mut store = SessionStore::new();
    store.create_buffer();
    let mut controller = RewriteController::new();

    let rx = controller.start(&store, &config_for(&base_url), "draw A to B").expect("start");
    let outcome = controller.pump(&mut store, &rx);

    assert_eq!(outcome, RewriteOutcome::Completed);
    assert!(!controller.is_active());
    let buffer = store.active_buffer().expect("active buffer");
    assert_eq!(buffer.content, "graph TD\n  A-->B");
    assert!(buffer.dirty);
}

#[test]
fn frame_split_across_reads_is_buffered_until_complete() {
    let listener = TcpListener::bind("127.0.0.1:0").expect("bind");
    let base_url = format!("http://{}/v1", listener.local_addr().expect("addr"));
    thread::spawn(move || {
        let (mut stream, _) = listener.accept().expect("accept");
        drain_request(&mut stream);
        stream.write_all(STREAM_HEADER.as_bytes()).expect("write header");
        // One frame torn in the middle of its JSON payload: the first half
        // must be buffered, not parsed as a complete line.
        let frame = delta("graph TD");
        let (head, tail) = frame.split_at(frame.len() / 2);
        stream.write_all(head.as_bytes()).expect("write head");
        stream.flush().expect("flush head");
        thread::sleep(Duration::from_millis(200));
        stream.write_all(tail.as_bytes()).expect("write tail");
        stream.write_all(b"\n\ndata: [DONE]\n").expect("finish");
    });

    let mut store = SessionStore::new();
    store.create_buffer();
    let mut controller = RewriteController::new();

    let rx = controller.start(&store, &config_for(&base_url), "draw A to B").expect("start");
    let outcome = controller.pump(&mut store, &rx);

    assert_eq!(outcome, RewriteOutcome::Completed);
    assert_eq!(store.active_buffer().expect("active buffer").content, "graph TD");
}

#[test]
fn http_error_surfaces_status_and_body_without_breaking_the_session() {
    let listener = TcpListener::bind("127.0.0.1:0").expect("bind");
    let base_url = format!("http://{}/v1", listener.local_addr().expect("addr"));
    thread::spawn(move || {
        let (mut stream, _) = listener.accept().expect("accept");
        drain_request(&mut stream);
        let body = "invalid api key";
        let response = format!(
            "HTTP/1.1 401 Unauthorized\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
            body.len(),
            body
        );
        stream.write_all(response.as_bytes()).expect("write response");
    });

    let mut store = SessionStore::new();
    store.create_buffer();
    let original = store.active_buffer().expect("active").content.clone();
    let mut controller = RewriteController::new();

    let rx = controller.start(&store, &config_for(&base_url), "anything").expect("start");
    let outcome = controller.pump(&mut store, &rx);

    match outcome {
        RewriteOutcome::Failed(message) => {
            assert!(message.contains("401"), "missing status in: {message}");
            assert!(message.contains("invalid api key"), "missing body in: {message}");
        }
        other => panic!("expected failure, got {other:?}"),
    }
    assert!(!controller.is_active());
    // Nothing was streamed, so the buffer is untouched.
    assert_eq!(store.active_buffer().expect("active").content, original);
    // The controller is immediately reusable.
    assert!(matches!(controller.start(&store, &ProviderConfig::default(), "x"), Err(_)));
}

#[test]
fn mid_stream_cancellation_keeps_partial_output() {
    let listener = TcpListener::bind("127.0.0.1:0").expect("bind");
    let base_url = format!("http://{}/v1", listener.local_addr().expect("addr"));
    thread::spawn(move || {
        let (mut stream, _) = listener.accept().expect("accept");
        drain_request(&mut stream);
        stream.write_all(STREAM_HEADER.as_bytes()).expect("write header");
        stream.write_all(format!("{}\n\n", delta("graph TD\n  A-->B\n")).as_bytes()).expect("first frame");
        // Keep trickling frames until the cancelled client hangs up.
        loop {
            thread::sleep(Duration::from_millis(10));
            let frame = format!("{}\n\n", delta("  B-->C\n"));
            if stream.write_all(frame.as_bytes()).is_err() {
                break;
            }
        }
    });

    let mut store = SessionStore::new();
    store.create_buffer();
    let mut controller = RewriteController::new();

    let rx = controller.start(&store, &config_for(&base_url), "keep going").expect("start");

    // Wait for the first fragment (past the acceptance event), then cancel
    // and drain to the terminal event.
    loop {
        let event = rx.recv_timeout(Duration::from_secs(5)).expect("stream event");
        controller.handle_event(&mut store, event);
        if store.active_buffer().expect("active").content.starts_with("graph TD") {
            break;
        }
    }

    controller.cancel();
    let outcome = controller.pump(&mut store, &rx);

    assert_eq!(outcome, RewriteOutcome::Cancelled);
    assert!(!controller.is_active());
    // No rollback: the content stays at its last pushed value.
    let content = store.active_buffer().expect("active").content.clone();
    assert!(content.starts_with("graph TD"));

    // A fresh rewrite can start right away.
    let base_url = spawn_sse_server(vec![delta("graph LR"), "data: [DONE]".to_string()]);
    let rx = controller.start(&store, &config_for(&base_url), "again").expect("restart");
    assert_eq!(controller.pump(&mut store, &rx), RewriteOutcome::Completed);
    assert_eq!(store.active_buffer().expect("active").content, "graph LR");
}
