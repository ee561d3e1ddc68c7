// Copyright 2026 Muvon Un Limited
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use hybridbot::client::{
    ClientConfig, ClientError, CompletionClient, CompletionResult, ErrorKind, NoopSink,
    RetryConfig, StreamChunk, StreamSink, StreamingClient,
};
use hybridbot::context::{ChatMessage, ContextWindow, Role};
use hybridbot::router::{
    AiBackend, ChatMode, DialogueRouter, NoopObserver, RouterSettings, Source,
};
use hybridbot::KnowledgeBase;
use serde_json::json;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio_util::sync::CancellationToken;
use wiremock::matchers::{body_partial_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const SSE_HELLO: &str = "data: {\"choices\":[{\"delta\":{\"content\":\"Hi\"}}]}\n\n\
data: {\"choices\":[{\"delta\":{\"content\":\" there\"}}]}\n\n\
data: [DONE]\n\n";

#[derive(Default)]
struct CollectingSink {
    deltas: Vec<String>,
    last_accumulated: String,
    completed: Option<CompletionResult>,
    errors: Vec<ErrorKind>,
}

impl StreamSink for CollectingSink {
    fn on_chunk(&mut self, chunk: &StreamChunk) {
        self.deltas.push(chunk.delta_content.clone());
        self.last_accumulated = chunk.accumulated_content.clone();
    }

    fn on_complete(&mut self, result: &CompletionResult) {
        self.completed = Some(result.clone());
    }

    fn on_error(&mut self, error: &ClientError) {
        self.errors.push(error.kind());
    }
}

fn config_for(server: &MockServer) -> ClientConfig {
    ClientConfig::new("test-key")
        .with_base_url(server.uri())
        .with_model("test/model")
        .with_retry(RetryConfig::new(2, Duration::from_millis(1)))
        .with_timeout(Duration::from_secs(5))
}

fn sse(body: &str) -> ResponseTemplate {
    ResponseTemplate::new(200)
        .insert_header("content-type", "text/event-stream")
        .set_body_string(body)
}

fn conversation() -> Vec<ChatMessage> {
    vec![
        ChatMessage::new(Role::System, "You are a helpful assistant."),
        ChatMessage::new(Role::User, "Say hi"),
    ]
}

#[tokio::test]
async fn test_streams_deltas_in_order() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .and(header("authorization", "Bearer test-key"))
        .and(header("x-title", "Hybridbot"))
        .and(body_partial_json(json!({ "model": "test/model", "stream": true })))
        .respond_with(sse(SSE_HELLO))
        .expect(1)
        .mount(&server)
        .await;

    let client = StreamingClient::new(config_for(&server)).unwrap();
    let mut sink = CollectingSink::default();
    let result = client.send_message(&conversation(), &mut sink).await.unwrap();

    assert_eq!(result.content, "Hi there");
    assert_eq!(result.model, "test/model");
    assert!(result.done);
    assert_eq!(sink.deltas, vec!["Hi", " there"]);
    assert_eq!(sink.deltas.concat(), result.content);
    assert_eq!(sink.last_accumulated, "Hi there");
    assert_eq!(sink.completed.as_ref(), Some(&result));
    assert!(sink.errors.is_empty());
}

#[tokio::test]
async fn test_sends_messages_in_order() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(body_partial_json(json!({
            "messages": [
                { "role": "system", "content": "You are a helpful assistant." },
                { "role": "user", "content": "Say hi" }
            ],
            "max_tokens": 500
        })))
        .respond_with(sse(SSE_HELLO))
        .expect(1)
        .mount(&server)
        .await;

    let client = StreamingClient::new(config_for(&server)).unwrap();
    client
        .send_message(&conversation(), &mut NoopSink)
        .await
        .unwrap();
}

#[tokio::test]
async fn test_referer_header_when_site_url_set() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(header("http-referer", "https://example.com"))
        .and(header("x-title", "Support Desk"))
        .respond_with(sse(SSE_HELLO))
        .expect(1)
        .mount(&server)
        .await;

    let config = config_for(&server)
        .with_site("Support Desk", Some("https://example.com".to_string()));
    let client = StreamingClient::new(config).unwrap();
    client
        .send_message(&conversation(), &mut NoopSink)
        .await
        .unwrap();
}

#[tokio::test]
async fn test_malformed_frames_are_skipped() {
    let server = MockServer::start().await;
    let body = "data: {\"choices\":[{\"delta\":{\"content\":\"A\"}}]}\n\
data: {not json\n\
: keep-alive comment\n\
data: {\"choices\":[{\"delta\":{}}]}\n\
data: {\"choices\":[{\"delta\":{\"content\":\"B\"},\"finish_reason\":\"stop\"}]}\n\
data: [DONE]\n";
    Mock::given(method("POST"))
        .respond_with(sse(body))
        .mount(&server)
        .await;

    let client = StreamingClient::new(config_for(&server)).unwrap();
    let mut sink = CollectingSink::default();
    let result = client.send_message(&conversation(), &mut sink).await.unwrap();

    assert_eq!(result.content, "AB");
    assert_eq!(sink.deltas, vec!["A", "B"]);
}

#[tokio::test]
async fn test_unterminated_last_line_is_processed() {
    let server = MockServer::start().await;
    let body = "data: {\"choices\":[{\"delta\":{\"content\":\"one\"}}]}\n\
data: {\"choices\":[{\"delta\":{\"content\":\" two\"}}]}";
    Mock::given(method("POST"))
        .respond_with(sse(body))
        .mount(&server)
        .await;

    let client = StreamingClient::new(config_for(&server)).unwrap();
    let result = client
        .send_message(&conversation(), &mut NoopSink)
        .await
        .unwrap();
    assert_eq!(result.content, "one two");
}

#[tokio::test]
async fn test_non_streaming_reply() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(body_partial_json(json!({ "stream": false })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "choices": [{ "message": { "role": "assistant", "content": "Whole answer" } }]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let client = StreamingClient::new(config_for(&server).with_streaming(false)).unwrap();
    let mut sink = CollectingSink::default();
    let result = client.send_message(&conversation(), &mut sink).await.unwrap();

    assert_eq!(result.content, "Whole answer");
    assert_eq!(sink.deltas, vec!["Whole answer"]);
}

#[tokio::test]
async fn test_server_errors_are_retried_then_reported() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(500))
        .expect(3)
        .mount(&server)
        .await;

    let client = StreamingClient::new(config_for(&server)).unwrap();
    let mut sink = CollectingSink::default();
    let err = client
        .send_message(&conversation(), &mut sink)
        .await
        .unwrap_err();

    assert_eq!(err.kind(), ErrorKind::ServerUnavailable);
    assert_eq!(sink.errors, vec![ErrorKind::ServerUnavailable]);
    assert!(sink.completed.is_none());
}

#[tokio::test]
async fn test_recovers_after_transient_failure() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(503))
        .up_to_n_times(1)
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .respond_with(sse(SSE_HELLO))
        .expect(1)
        .mount(&server)
        .await;

    let client = StreamingClient::new(config_for(&server)).unwrap();
    let mut sink = CollectingSink::default();
    let result = client.send_message(&conversation(), &mut sink).await.unwrap();

    assert_eq!(result.content, "Hi there");
    assert!(sink.errors.is_empty());
}

#[tokio::test]
async fn test_retries_back_off_exponentially() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(500))
        .expect(3)
        .mount(&server)
        .await;

    let config = config_for(&server).with_retry(RetryConfig::new(2, Duration::from_millis(100)));
    let client = StreamingClient::new(config).unwrap();
    let started = Instant::now();
    let err = client
        .send_message(&conversation(), &mut NoopSink)
        .await
        .unwrap_err();

    assert_eq!(err.kind(), ErrorKind::ServerUnavailable);
    // 100ms before the second attempt, 200ms before the third
    assert!(started.elapsed() >= Duration::from_millis(300));
}

/// Read one HTTP request, headers and body, off the socket
async fn read_request(socket: &mut TcpStream) {
    let mut buf = Vec::new();
    let mut chunk = [0u8; 4096];
    loop {
        let n = socket.read(&mut chunk).await.unwrap_or(0);
        if n == 0 {
            return;
        }
        buf.extend_from_slice(&chunk[..n]);

        let Some(end) = buf.windows(4).position(|w| w == b"\r\n\r\n") else {
            continue;
        };
        let head = String::from_utf8_lossy(&buf[..end]).to_lowercase();
        let body_len = head
            .lines()
            .find_map(|line| line.strip_prefix("content-length:"))
            .and_then(|v| v.trim().parse::<usize>().ok())
            .unwrap_or(0);
        if buf.len() >= end + 4 + body_len {
            return;
        }
    }
}

/// Answers every connection with one frame of a body that promises far more
async fn serve_truncated_stream(listener: TcpListener, connections: Arc<AtomicUsize>) {
    while let Ok((mut socket, _)) = listener.accept().await {
        connections.fetch_add(1, Ordering::SeqCst);
        tokio::spawn(async move {
            read_request(&mut socket).await;
            let head = "HTTP/1.1 200 OK\r\n\
content-type: text/event-stream\r\n\
content-length: 10000\r\n\r\n";
            let frame = "data: {\"choices\":[{\"delta\":{\"content\":\"Hi\"}}]}\n\n";
            let _ = socket.write_all(head.as_bytes()).await;
            let _ = socket.write_all(frame.as_bytes()).await;
            let _ = socket.flush().await;
        });
    }
}

#[tokio::test]
async fn test_stream_broken_after_text_is_not_replayed() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let connections = Arc::new(AtomicUsize::new(0));
    tokio::spawn(serve_truncated_stream(listener, connections.clone()));

    let config = ClientConfig::new("test-key")
        .with_base_url(format!("http://{}", addr))
        .with_model("test/model")
        .with_retry(RetryConfig::new(2, Duration::from_millis(1)))
        .with_timeout(Duration::from_secs(5));
    let client = StreamingClient::new(config).unwrap();
    let mut sink = CollectingSink::default();
    let err = client
        .send_message(&conversation(), &mut sink)
        .await
        .unwrap_err();

    assert_eq!(err.kind(), ErrorKind::Interrupted);
    assert!(!err.is_retryable());
    assert_eq!(connections.load(Ordering::SeqCst), 1);
    assert_eq!(sink.deltas, vec!["Hi"]);
    assert_eq!(sink.deltas.concat(), sink.last_accumulated);
    assert_eq!(sink.errors, vec![ErrorKind::Interrupted]);
    assert!(sink.completed.is_none());
}

#[tokio::test]
async fn test_rate_limit_is_retried() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(429).insert_header("retry-after", "7"))
        .expect(3)
        .mount(&server)
        .await;

    let client = StreamingClient::new(config_for(&server)).unwrap();
    let err = client
        .send_message(&conversation(), &mut NoopSink)
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        ClientError::RateLimited {
            retry_after_secs: Some(7)
        }
    ));
}

#[tokio::test]
async fn test_auth_failure_is_not_retried() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(401))
        .expect(1)
        .mount(&server)
        .await;

    let client = StreamingClient::new(config_for(&server)).unwrap();
    let err = client
        .send_message(&conversation(), &mut NoopSink)
        .await
        .unwrap_err();

    assert_eq!(err.kind(), ErrorKind::Auth);
}

#[tokio::test]
async fn test_bad_request_carries_provider_message() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(
            ResponseTemplate::new(400)
                .set_body_json(json!({ "error": { "message": "model not found" } })),
        )
        .expect(1)
        .mount(&server)
        .await;

    let client = StreamingClient::new(config_for(&server)).unwrap();
    let err = client
        .send_message(&conversation(), &mut NoopSink)
        .await
        .unwrap_err();

    assert!(matches!(err, ClientError::BadRequest(ref m) if m == "model not found"));
    assert!(!err.is_retryable());
}

#[tokio::test]
async fn test_slow_provider_times_out() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(sse(SSE_HELLO).set_delay(Duration::from_millis(500)))
        .expect(1)
        .mount(&server)
        .await;

    let config = config_for(&server)
        .with_timeout(Duration::from_millis(50))
        .with_retry(RetryConfig::new(0, Duration::from_millis(1)));
    let client = StreamingClient::new(config).unwrap();
    let err = client
        .send_message(&conversation(), &mut NoopSink)
        .await
        .unwrap_err();

    assert_eq!(err.kind(), ErrorKind::Timeout);
}

#[tokio::test]
async fn test_cancel_aborts_in_flight_request() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(sse(SSE_HELLO).set_delay(Duration::from_secs(5)))
        .mount(&server)
        .await;

    let client = Arc::new(StreamingClient::new(config_for(&server)).unwrap());
    let started = Instant::now();
    let task = {
        let client = Arc::clone(&client);
        tokio::spawn(async move {
            let mut sink = CollectingSink::default();
            let outcome = client.send_message(&conversation(), &mut sink).await;
            (outcome, sink)
        })
    };

    tokio::time::sleep(Duration::from_millis(150)).await;
    client.cancel();

    let (outcome, sink) = task.await.unwrap();
    let err = outcome.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Cancelled);
    assert_eq!(sink.errors, vec![ErrorKind::Cancelled]);
    assert!(started.elapsed() < Duration::from_secs(4));

    let requests = server.received_requests().await.unwrap();
    assert_eq!(requests.len(), 1);
}

#[tokio::test]
async fn test_token_cancelled_before_call_sends_nothing() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(sse(SSE_HELLO))
        .expect(0)
        .mount(&server)
        .await;

    let client = StreamingClient::new(config_for(&server)).unwrap();
    let token = CancellationToken::new();
    token.cancel();

    let mut sink = CollectingSink::default();
    let err = client
        .send_message_with_cancel(&conversation(), &mut sink, token)
        .await
        .unwrap_err();

    assert_eq!(err.kind(), ErrorKind::Cancelled);
    assert_eq!(sink.errors, vec![ErrorKind::Cancelled]);
}

#[tokio::test]
async fn test_cancel_without_request_is_noop() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(sse(SSE_HELLO))
        .mount(&server)
        .await;

    let client = StreamingClient::new(config_for(&server)).unwrap();
    client.cancel();

    let result = client
        .send_message(&conversation(), &mut NoopSink)
        .await
        .unwrap();
    assert_eq!(result.content, "Hi there");
}

#[tokio::test]
async fn test_hybrid_router_falls_through_to_provider() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(body_partial_json(json!({
            "messages": [
                { "role": "system", "content": "Be brief." },
                { "role": "user", "content": "xyzzy plugh" }
            ]
        })))
        .respond_with(sse(SSE_HELLO))
        .expect(1)
        .mount(&server)
        .await;

    let client = StreamingClient::new(config_for(&server)).unwrap();
    let backend = AiBackend::new(Arc::new(client), ContextWindow::new("Be brief.", 10, 2000));
    let settings = RouterSettings {
        mode: ChatMode::Hybrid,
        ..RouterSettings::default()
    };
    let router = DialogueRouter::new(KnowledgeBase::default(), settings, Some(backend));

    let reply = router.handle_input("xyzzy plugh", &mut NoopObserver).await;

    assert_eq!(reply.source, Source::Api);
    assert_eq!(reply.reply, "Hi there");
    assert_eq!(reply.model.as_deref(), Some("test/model"));
    assert!(!router.is_response_in_progress());

    let history = router.history();
    assert_eq!(history.len(), 2);
    assert_eq!(history[1].source, Source::Api);

    let stats = router.get_api_status().context_stats.unwrap();
    assert_eq!(stats.message_count, 2);
}
