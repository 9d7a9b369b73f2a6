use std::io;
use std::sync::Arc;
use std::time::Duration;

use crate::{
    BoxError, Code, FormatError, Headers, Interceptor, Logger, LoggerConfig, MemoryWriter,
    Message, Peer, RpcError, UnaryFunc, UnaryRequest, UnaryResponse, unary_fn,
};

use serde_json::json;

const ECHO: &str = "/echo.v1.EchoService/Echo";

fn logger(config: LoggerConfig) -> (Logger, MemoryWriter) {
    let out = MemoryWriter::new();
    let logger = Logger::new(out.clone(), config).unwrap();
    (logger, out)
}

fn echo_handler() -> UnaryFunc {
    unary_fn(|req: UnaryRequest| async move {
        Ok(UnaryResponse {
            headers: Headers::new().with("x-served-by", "echo-1"),
            message: req.message,
        })
    })
}

fn echo_request(text: &str) -> UnaryRequest {
    UnaryRequest::new(
        ECHO,
        Peer::new("127.0.0.1:5123", "grpc"),
        Some(Message::structured("echo.v1.EchoRequest", json!({ "text": text }))),
    )
}

struct FailingWriter;

impl io::Write for FailingWriter {
    fn write(&mut self, _buf: &[u8]) -> io::Result<usize> {
        Err(io::Error::new(io::ErrorKind::BrokenPipe, "closed"))
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

#[tokio::test]
async fn test_echo_record() {
    let (logger, out) = logger(LoggerConfig::new().without_timestamps());
    let call = logger.wrap_unary(echo_handler());

    let resp = call(echo_request("hi")).await.unwrap();
    assert_eq!(resp.message.unwrap().json(), &json!({"text": "hi"}));

    let text = out.contents();
    let expected_prefix = "/echo.v1.EchoService/Echo unary grpc 127.0.0.1:5123\
                           \n  Request:\
                           \n    text: \"hi\"\
                           \n  Response:\
                           \n    text: \"hi\"\
                           \n  Completed in: ";
    assert!(text.starts_with(expected_prefix), "unexpected record: {text}");
    assert!(text.ends_with('\n'));
    assert!(!text.contains("Error:"));
    assert_eq!(text.matches("Completed in:").count(), 1);
}

#[tokio::test]
async fn test_timestamp_prefix() {
    let (logger, out) = logger(LoggerConfig::new().with_time_format("%Y"));
    let call = logger.wrap_unary(echo_handler());
    call(echo_request("hi")).await.unwrap();

    let text = out.contents();
    assert!(text.starts_with('['));
    assert!(text[1..].starts_with(&chrono::Local::now().format("%Y").to_string()));
    assert!(text.contains("] /echo.v1.EchoService/Echo unary"));
}

#[tokio::test]
async fn test_not_found_error_passes_through() {
    let (logger, out) = logger(LoggerConfig::new().without_timestamps());
    let handler = unary_fn(|_req: UnaryRequest| async move {
        Err::<UnaryResponse, BoxError>(Box::new(
            RpcError::not_found("user 7").with_metadata("reason", "missing"),
        ))
    });
    let call = logger.wrap_unary(handler);

    let err = call(echo_request("hi")).await.unwrap_err();
    let rpc = RpcError::find_in(&*err).expect("structured error");
    assert_eq!(rpc.code, Code::NotFound);
    assert_eq!(rpc.message, "user 7");
    assert_eq!(rpc.metadata.get("reason"), Some("missing"));

    let text = out.contents();
    assert!(text.contains("\n  Error: [NotFound] user 7"));
    assert!(text.contains("\n  Code: NotFound"));
    assert!(text.contains("\n  Metadata:\n    reason: missing"));
    assert!(!text.contains("Response:"));
    assert!(text.contains("Completed in:"));
}

#[tokio::test]
async fn test_plain_error_has_no_code() {
    let (logger, out) = logger(LoggerConfig::new().without_timestamps());
    let handler = unary_fn(|_req: UnaryRequest| async move {
        Err::<UnaryResponse, BoxError>("connection reset".into())
    });
    let call = logger.wrap_unary(handler);

    let err = call(echo_request("hi")).await.unwrap_err();
    assert_eq!(err.to_string(), "connection reset");

    let text = out.contents();
    assert!(text.contains("\n  Error: connection reset"));
    assert!(!text.contains("Code:"));
}

#[tokio::test]
async fn test_headers_sorted_and_redacted() {
    let config = LoggerConfig::new()
        .without_timestamps()
        .with_headers(true)
        .redact_header("authorization");
    let (logger, out) = logger(config);
    let call = logger.wrap_unary(echo_handler());

    let req = echo_request("hi")
        .with_header("X-Trace", "t-1")
        .with_header("Authorization", "Bearer secret")
        .with_header("accept", "application/proto");
    call(req).await.unwrap();

    let text = out.contents();
    assert!(text.contains(
        "\n  Headers:\
         \n    accept: application/proto\
         \n    Authorization: [** REDACTED **]\
         \n    X-Trace: t-1"
    ));
    assert!(text.contains("\n  Response headers:\n    x-served-by: echo-1"));
    assert!(!text.contains("Bearer secret"));
}

#[tokio::test]
async fn test_headers_hidden_by_default() {
    let (logger, out) = logger(LoggerConfig::new().without_timestamps());
    let call = logger.wrap_unary(echo_handler());
    call(echo_request("hi").with_header("x-trace", "t-1")).await.unwrap();

    let text = out.contents();
    assert!(!text.contains("Headers:"));
    assert!(!text.contains("t-1"));
}

#[tokio::test]
async fn test_formatter_failure_keeps_record() {
    let config = LoggerConfig::new()
        .with_time_format("%Y-%m-%d")
        .with_formatter(|_: &Message| -> Result<String, FormatError> {
            Err(FormatError::Custom("descriptor not found".to_string()))
        });
    let (logger, out) = logger(config);
    let call = logger.wrap_unary(echo_handler());

    let resp = call(echo_request("hi")).await.unwrap();
    assert!(resp.message.is_some());

    let text = out.contents();
    assert!(text.starts_with('['));
    assert!(text.contains(ECHO));
    assert_eq!(
        text.matches("[cannot format message: descriptor not found]").count(),
        2
    );
}

#[tokio::test]
async fn test_absent_messages_render_placeholder() {
    let (logger, out) = logger(LoggerConfig::new().without_timestamps());
    let handler = unary_fn(|_req: UnaryRequest| async move { Ok(UnaryResponse::default()) });
    let call = logger.wrap_unary(handler);

    call(UnaryRequest::new(ECHO, Peer::default(), None))
        .await
        .unwrap();

    let text = out.contents();
    assert!(text.starts_with("/echo.v1.EchoService/Echo unary\n"));
    assert!(text.contains("\n  Request:\n    (none)\n  Response:\n    (none)\n"));
}

#[tokio::test]
async fn test_correlation_id_from_header() {
    let config = LoggerConfig::new()
        .without_timestamps()
        .with_correlation_header("x-request-id");
    let (logger, out) = logger(config);
    let call = logger.wrap_unary(echo_handler());

    call(echo_request("hi").with_header("x-request-id", "req-42"))
        .await
        .unwrap();

    assert!(out.contents().contains("127.0.0.1:5123\n  Request-ID: req-42\n  Request:"));
}

#[tokio::test]
async fn test_sink_failure_does_not_affect_call() {
    let logger = Logger::new(FailingWriter, LoggerConfig::new()).unwrap();
    let call = logger.wrap_unary(echo_handler());

    let resp = call(echo_request("still works")).await.unwrap();
    assert_eq!(resp.message.unwrap().json(), &json!({"text": "still works"}));
}

#[tokio::test]
async fn test_buffers_are_recycled() {
    let (logger, _out) = logger(LoggerConfig::new());
    let call = logger.wrap_unary(echo_handler());

    for _ in 0..5 {
        call(echo_request("hi")).await.unwrap();
    }
    assert_eq!(logger.pool().idle_count(), 1);
}

#[tokio::test]
async fn test_oversized_record_buffer_is_dropped() {
    let (logger, out) = logger(LoggerConfig::new().with_max_buffer_capacity(1024));
    let call = logger.wrap_unary(echo_handler());

    call(echo_request(&"x".repeat(8 * 1024))).await.unwrap();
    assert_eq!(logger.pool().discarded_count(), 1);
    assert_eq!(logger.pool().idle_count(), 0);

    call(echo_request("small")).await.unwrap();
    assert_eq!(logger.pool().idle_count(), 1);
    assert!(logger.pool().max_idle_capacity() <= 1024);
    assert!(out.contents().contains("text: \"small\""));
}

#[tokio::test]
async fn test_default_logger_writes_records() {
    let out = MemoryWriter::new();
    let logger = Logger::with_defaults(out.clone());
    let call = logger.wrap_unary(echo_handler());
    call(echo_request("hi")).await.unwrap();
    assert!(out.contents().contains("Completed in:"));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_calls_produce_whole_records() {
    const CALLS: usize = 64;

    let (logger, out) = logger(LoggerConfig::new().without_timestamps());
    let handler = unary_fn(|req: UnaryRequest| async move {
        let n = req.message.as_ref().and_then(|m| m.json().as_u64()).unwrap_or(0);
        tokio::time::sleep(Duration::from_millis(n % 7)).await;
        Ok(UnaryResponse {
            headers: Headers::new(),
            message: req.message,
        })
    });
    let call = Arc::new(logger.wrap_unary(handler));

    let tasks: Vec<_> = (0..CALLS)
        .map(|i| {
            let call = Arc::clone(&call);
            tokio::spawn(async move {
                let req = UnaryRequest::new(
                    format!("/svc.v1.Svc/Call{i}"),
                    Peer::new("10.0.0.1:1", "connect"),
                    Some(Message::from(json!(i))),
                );
                call(req).await.unwrap();
            })
        })
        .collect();
    for task in tasks {
        task.await.unwrap();
    }

    let text = out.contents();
    let lines: Vec<&str> = text.lines().collect();
    assert_eq!(lines.len(), CALLS * 6);

    let mut seen = std::collections::HashSet::new();
    for record in lines.chunks(6) {
        let i: usize = record[0]
            .strip_prefix("/svc.v1.Svc/Call")
            .and_then(|rest| rest.split(' ').next())
            .and_then(|n| n.parse().ok())
            .unwrap_or_else(|| panic!("torn record: {record:?}"));
        assert_eq!(record[1], "  Request:");
        assert_eq!(record[2], format!("    {i}"));
        assert_eq!(record[3], "  Response:");
        assert_eq!(record[4], format!("    {i}"));
        assert!(record[5].starts_with("  Completed in: "));
        assert!(seen.insert(i));
    }
    assert_eq!(seen.len(), CALLS);
}

#[tokio::test]
async fn test_context_data_sorted_after_call_line() {
    let config = LoggerConfig::new()
        .without_timestamps()
        .with_context_extractor(|ctx, headers| {
            vec![
                ("tenant".to_string(), headers.get("x-tenant").unwrap_or("-").to_string()),
                ("protocol".to_string(), ctx.peer.protocol.clone()),
            ]
        });
    let (logger, out) = logger(config);
    let call = logger.wrap_unary(echo_handler());
    call(echo_request("hi").with_header("x-tenant", "acme"))
        .await
        .unwrap();

    let text = out.contents();
    assert!(text.starts_with(
        "/echo.v1.EchoService/Echo unary grpc 127.0.0.1:5123\
         \n  Context:\
         \n    protocol: grpc\
         \n    tenant: acme\
         \n  Request:"
    ));
    assert_eq!(text.matches("Context:").count(), 1);
}

#[tokio::test]
async fn test_redact_fn_replaces_marker() {
    let config = LoggerConfig::new()
        .without_timestamps()
        .with_headers(true)
        .redact_header("authorization")
        .with_redact_fn(|value| format!("{}...", &value[..6]));
    let (logger, out) = logger(config);
    let call = logger.wrap_unary(echo_handler());
    call(echo_request("hi").with_header("authorization", "Bearer secret"))
        .await
        .unwrap();

    let text = out.contents();
    assert!(text.contains("\n    authorization: Bearer..."));
    assert!(!text.contains("secret"));
    assert!(!text.contains("REDACTED"));
}
