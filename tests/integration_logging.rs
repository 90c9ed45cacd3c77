use std::collections::BTreeMap;
use std::fmt;
use std::io::{Read, Write};
use std::net::{TcpListener, TcpStream};
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use outcall::prelude::{Client, RetryPolicy};
use tracing::field::{Field, Visit};
use tracing::subscriber::DefaultGuard;
use tracing::{Event, Level, Subscriber};
use tracing_subscriber::layer::{Context, Layer, SubscriberExt};

#[derive(Clone, Debug)]
struct RecordedEvent {
    level: Level,
    fields: BTreeMap<String, String>,
}

impl RecordedEvent {
    fn field(&self, name: &str) -> &str {
        self.fields.get(name).map(String::as_str).unwrap_or("")
    }

    fn has_field(&self, name: &str) -> bool {
        self.fields.contains_key(name)
    }
}

#[derive(Clone, Default)]
struct RecordingLayer {
    events: Arc<Mutex<Vec<RecordedEvent>>>,
}

impl RecordingLayer {
    fn install() -> (DefaultGuard, RecordingLayer) {
        let layer = RecordingLayer::default();
        let handle = layer.clone();
        let guard = tracing::subscriber::set_default(tracing_subscriber::registry().with(layer));
        (guard, handle)
    }

    fn events(&self) -> Vec<RecordedEvent> {
        self.events.lock().expect("lock recorded events").clone()
    }

    fn events_at(&self, level: Level) -> Vec<RecordedEvent> {
        self.events()
            .into_iter()
            .filter(|event| event.level == level)
            .collect()
    }
}

impl<S: Subscriber> Layer<S> for RecordingLayer {
    fn on_event(&self, event: &Event<'_>, _context: Context<'_, S>) {
        if !event.metadata().target().starts_with("outcall") {
            return;
        }
        let mut recorder = FieldRecorder::default();
        event.record(&mut recorder);
        self.events
            .lock()
            .expect("lock recorded events")
            .push(RecordedEvent {
                level: *event.metadata().level(),
                fields: recorder.fields,
            });
    }
}

#[derive(Default)]
struct FieldRecorder {
    fields: BTreeMap<String, String>,
}

impl Visit for FieldRecorder {
    fn record_debug(&mut self, field: &Field, value: &dyn fmt::Debug) {
        self.fields.insert(field.name().to_owned(), format!("{value:?}"));
    }

    fn record_str(&mut self, field: &Field, value: &str) {
        self.fields.insert(field.name().to_owned(), value.to_owned());
    }

    fn record_u64(&mut self, field: &Field, value: u64) {
        self.fields.insert(field.name().to_owned(), value.to_string());
    }

    fn record_i64(&mut self, field: &Field, value: i64) {
        self.fields.insert(field.name().to_owned(), value.to_string());
    }

    fn record_bool(&mut self, field: &Field, value: bool) {
        self.fields.insert(field.name().to_owned(), value.to_string());
    }
}

#[derive(Clone)]
struct ScriptedResponse {
    status: u16,
    body: Vec<u8>,
    delay: Duration,
}

impl ScriptedResponse {
    fn new(status: u16, body: impl Into<String>, delay: Duration) -> Self {
        Self {
            status,
            body: body.into().into_bytes(),
            delay,
        }
    }
}

struct ScriptedServer {
    base_url: String,
    join: Option<JoinHandle<()>>,
}

impl ScriptedServer {
    fn start(responses: Vec<ScriptedResponse>) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").expect("bind scripted server");
        let address = listener.local_addr().expect("read local address");
        listener
            .set_nonblocking(true)
            .expect("set listener nonblocking");

        let join = thread::spawn(move || {
            let deadline = std::time::Instant::now() + Duration::from_secs(2);
            let mut response_index = 0;

            while response_index < responses.len() && std::time::Instant::now() < deadline {
                match listener.accept() {
                    Ok((mut stream, _)) => {
                        let _ = read_request_headers(&mut stream);

                        let response = &responses[response_index];
                        response_index += 1;

                        if !response.delay.is_zero() {
                            thread::sleep(response.delay);
                        }

                        let _ = write_response(&mut stream, response);
                    }
                    Err(error) if error.kind() == std::io::ErrorKind::WouldBlock => {
                        thread::sleep(Duration::from_millis(5));
                    }
                    Err(_) => break,
                }
            }
        });

        Self {
            base_url: format!("http://{address}"),
            join: Some(join),
        }
    }
}

impl Drop for ScriptedServer {
    fn drop(&mut self) {
        if let Some(join) = self.join.take() {
            let _ = join.join();
        }
    }
}

fn read_request_headers(stream: &mut TcpStream) -> std::io::Result<()> {
    stream.set_read_timeout(Some(Duration::from_secs(1)))?;
    let mut raw = Vec::new();
    loop {
        let mut chunk = [0_u8; 1024];
        let read = stream.read(&mut chunk)?;
        if read == 0 {
            break;
        }
        raw.extend_from_slice(&chunk[..read]);
        if find_header_end(&raw).is_some() {
            break;
        }
    }
    Ok(())
}

fn write_response(stream: &mut TcpStream, response: &ScriptedResponse) -> std::io::Result<()> {
    let head = format!(
        "HTTP/1.1 {} {}\r\nContent-Length: {}\r\nConnection: close\r\n\r\n",
        response.status,
        status_text(response.status),
        response.body.len()
    );
    stream.write_all(head.as_bytes())?;
    stream.write_all(&response.body)?;
    stream.flush()
}

fn find_header_end(raw: &[u8]) -> Option<usize> {
    raw.windows(4).position(|window| window == b"\r\n\r\n")
}

fn status_text(status: u16) -> &'static str {
    match status {
        200 => "OK",
        401 => "Unauthorized",
        503 => "Service Unavailable",
        _ => "Unknown",
    }
}

#[tokio::test(flavor = "current_thread")]
async fn success_emits_single_info_event() {
    let (_guard, recording) = RecordingLayer::install();
    let server = ScriptedServer::start(vec![ScriptedResponse::new(200, "ok", Duration::ZERO)]);

    let client = Client::builder(server.base_url.clone())
        .dependency_name("ratings")
        .timeout(Duration::from_millis(500))
        .retry_policy(RetryPolicy::disabled())
        .build()
        .expect("client should build");

    let response = client
        .get("/menu")
        .send()
        .await
        .expect("request should succeed");

    let events = recording.events();
    assert_eq!(events.len(), 1, "expected one log entry, got {events:?}");

    let event = &events[0];
    assert_eq!(event.level, Level::INFO);
    assert_eq!(event.field("message"), "request completed");
    assert_eq!(event.field("outcome"), "success");
    assert_eq!(event.field("dependency"), "ratings");
    assert_eq!(event.field("method"), "GET");
    assert_eq!(event.field("status"), "200");
    assert_eq!(event.field("attempts"), "1");
    assert_eq!(event.field("source"), "http-client");
    assert_eq!(event.field("correlation_id"), response.correlation_id());
    assert!(event.field("url").contains("/menu"));
    event
        .field("elapsed_ms")
        .parse::<u64>()
        .expect("elapsed_ms should be numeric");
}

#[tokio::test(flavor = "current_thread")]
async fn retried_call_logs_debug_attempts_then_final_info() {
    let (_guard, recording) = RecordingLayer::install();
    let server = ScriptedServer::start(vec![
        ScriptedResponse::new(503, "busy", Duration::ZERO),
        ScriptedResponse::new(200, "ready", Duration::ZERO),
    ]);

    let client = Client::builder(server.base_url.clone())
        .timeout(Duration::from_millis(500))
        .retry_policy(
            RetryPolicy::standard()
                .max_retries(1)
                .base_delay(Duration::from_millis(10)),
        )
        .build()
        .expect("client should build");

    client
        .get("/menu")
        .send()
        .await
        .expect("request should succeed after retry");

    let events = recording.events();
    assert_eq!(events.len(), 2, "expected debug + info entries, got {events:?}");

    let retry_event = &events[0];
    assert_eq!(retry_event.level, Level::DEBUG);
    assert_eq!(
        retry_event.field("message"),
        "retrying request after recoverable failure"
    );
    assert_eq!(retry_event.field("attempt"), "1");
    assert_eq!(retry_event.field("delay_ms"), "10");
    assert!(retry_event.field("error").contains("http status 503"));

    let final_event = &events[1];
    assert_eq!(final_event.level, Level::INFO);
    assert_eq!(final_event.field("outcome"), "success");
    assert_eq!(final_event.field("attempts"), "2");
    assert_eq!(
        final_event.field("correlation_id"),
        retry_event.field("correlation_id")
    );
    assert!(recording.events_at(Level::ERROR).is_empty());
}

#[tokio::test(flavor = "current_thread")]
async fn terminal_failure_logs_error_with_redacted_headers() {
    let (_guard, recording) = RecordingLayer::install();
    let server = ScriptedServer::start(vec![ScriptedResponse::new(401, "denied", Duration::ZERO)]);

    let client = Client::builder(server.base_url.clone())
        .timeout(Duration::from_millis(500))
        .retry_policy(RetryPolicy::disabled())
        .build()
        .expect("client should build");

    client
        .get("/profile")
        .try_header("authorization", "Bearer super-secret-token")
        .expect("set authorization header")
        .send()
        .await
        .expect_err("401 should surface as an error");

    let events = recording.events();
    assert_eq!(events.len(), 1, "expected one log entry, got {events:?}");

    let event = &events[0];
    assert_eq!(event.level, Level::ERROR);
    assert_eq!(event.field("message"), "request failed");
    assert_eq!(event.field("outcome"), "error");
    assert_eq!(event.field("error_class"), "dependency");
    assert_eq!(event.field("is_recoverable"), "false");
    assert_eq!(event.field("status"), "401");
    assert_eq!(event.field("attempts"), "1");
    assert_eq!(event.field("dependency"), "outcall");
    assert_eq!(event.field("source"), "http-client");
    assert!(event.field("error").contains("http status 401"));

    let headers = event.field("headers");
    assert!(headers.contains(r#""authorization": "[REDACTED]""#));
    assert!(headers.contains("x-request-id"));
    assert!(!headers.contains("super-secret-token"));
}

#[tokio::test(flavor = "current_thread")]
async fn exhausted_retries_log_error_as_recoverable() {
    let (_guard, recording) = RecordingLayer::install();
    let server = ScriptedServer::start(vec![
        ScriptedResponse::new(503, "busy", Duration::ZERO),
        ScriptedResponse::new(503, "still busy", Duration::ZERO),
    ]);

    let client = Client::builder(server.base_url.clone())
        .timeout(Duration::from_millis(500))
        .retry_policy(
            RetryPolicy::standard()
                .max_retries(1)
                .base_delay(Duration::from_millis(10)),
        )
        .build()
        .expect("client should build");

    client
        .get("/menu")
        .send()
        .await
        .expect_err("both attempts should fail");

    let events = recording.events();
    assert_eq!(events.len(), 2, "expected debug + error entries, got {events:?}");
    assert_eq!(events[0].level, Level::DEBUG);

    let error_event = &events[1];
    assert_eq!(error_event.level, Level::ERROR);
    assert_eq!(error_event.field("outcome"), "error");
    assert_eq!(error_event.field("status"), "503");
    assert_eq!(error_event.field("is_recoverable"), "true");
    assert_eq!(error_event.field("attempts"), "2");
}

#[tokio::test(flavor = "current_thread")]
async fn sensitive_query_values_are_redacted_in_logged_url() {
    let (_guard, recording) = RecordingLayer::install();
    let server = ScriptedServer::start(vec![ScriptedResponse::new(401, "denied", Duration::ZERO)]);

    let client = Client::builder(server.base_url.clone())
        .timeout(Duration::from_millis(500))
        .retry_policy(RetryPolicy::disabled())
        .build()
        .expect("client should build");

    let error = client
        .get("/search?token=xyz&page=2")
        .send()
        .await
        .expect_err("401 should surface as an error");

    let url = error.url().expect("http status error should carry a url");
    assert!(url.contains("token=[REDACTED]"));
    assert!(url.contains("page=2"));
    assert!(!url.contains("xyz"));

    let events = recording.events_at(Level::ERROR);
    assert_eq!(events.len(), 1);
    let logged_url = events[0].field("url");
    assert!(logged_url.contains("token=[REDACTED]"));
    assert!(logged_url.contains("page=2"));
    assert!(!logged_url.contains("xyz"));
}

#[tokio::test(flavor = "current_thread")]
async fn timeout_error_event_omits_status() {
    let (_guard, recording) = RecordingLayer::install();
    let server = ScriptedServer::start(vec![ScriptedResponse::new(
        200,
        "slow",
        Duration::from_millis(150),
    )]);

    let client = Client::builder(server.base_url.clone())
        .timeout(Duration::from_millis(30))
        .retry_policy(RetryPolicy::disabled())
        .build()
        .expect("client should build");

    client
        .get("/slow")
        .send()
        .await
        .expect_err("slow response should time out");

    let events = recording.events();
    assert_eq!(events.len(), 1, "expected one log entry, got {events:?}");

    let event = &events[0];
    assert_eq!(event.level, Level::ERROR);
    assert_eq!(event.field("outcome"), "error");
    assert_eq!(event.field("is_recoverable"), "true");
    assert!(!event.has_field("status"));
    assert!(event.field("error").contains("request timed out after 30ms"));
}
