use std::sync::{
    atomic::{AtomicUsize, Ordering},
    Arc, Mutex,
};

use task_api::{TaskApiClient, TaskApiConfig, TaskApiError};
use task_backend::{BackendError, ChatBackend, ChatRequest, FailureClass, TaskBackend, TaskDraft};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::task::JoinHandle;
use tokio::time::{timeout, Duration};

fn allow_local_integration() -> bool {
    std::env::var("TASK_API_ALLOW_LOCAL_INTEGRATION")
        .map(|value| matches!(value.as_str(), "1" | "true" | "TRUE" | "yes" | "YES"))
        .unwrap_or(false)
}

#[derive(Clone)]
enum ScriptedResponse {
    Respond { status: u16, body: String },
    Reset,
}

fn response_json(status: u16, body: &str) -> ScriptedResponse {
    ScriptedResponse::Respond {
        status,
        body: body.to_string(),
    }
}

struct ScriptedServer {
    base_url: String,
    request_count: Arc<AtomicUsize>,
    requests: Arc<Mutex<Vec<String>>>,
    handle: JoinHandle<()>,
}

impl ScriptedServer {
    async fn new(scripts: Vec<ScriptedResponse>) -> Self {
        let scripts = Arc::new(scripts);
        let request_count = Arc::new(AtomicUsize::new(0));
        let requests = Arc::new(Mutex::new(Vec::new()));
        let listener = TcpListener::bind("127.0.0.1:0")
            .await
            .expect("local TCP listener should bind");
        let addr = listener
            .local_addr()
            .expect("resolved local listener address");
        let base_url = format!("http://{addr}");

        let handle = tokio::spawn({
            let scripts = Arc::clone(&scripts);
            let request_count = Arc::clone(&request_count);
            let requests = Arc::clone(&requests);

            async move {
                loop {
                    let (socket, _) = match listener.accept().await {
                        Ok(pair) => pair,
                        Err(_) => break,
                    };
                    let scripts = Arc::clone(&scripts);
                    let request_count = Arc::clone(&request_count);
                    let requests = Arc::clone(&requests);
                    tokio::spawn(async move {
                        serve_one(socket, scripts, request_count, requests).await;
                    });
                }
            }
        });

        Self {
            base_url,
            request_count,
            requests,
            handle,
        }
    }

    fn request_count(&self) -> usize {
        self.request_count.load(Ordering::Acquire)
    }

    fn request_head(&self, index: usize) -> String {
        self.requests
            .lock()
            .expect("requests lock")
            .get(index)
            .cloned()
            .unwrap_or_default()
    }

    fn shutdown(&self) {
        self.handle.abort();
    }
}

fn client_for(server: &ScriptedServer) -> TaskApiClient {
    let config = TaskApiConfig::new(&server.base_url).with_timeout(Duration::from_secs(5));
    TaskApiClient::new(config).expect("client")
}

fn chat_request() -> ChatRequest {
    ChatRequest {
        conversation_id: Some("c-1".to_string()),
        message: "add buy milk".to_string(),
        timezone: "Europe/Berlin".to_string(),
    }
}

#[tokio::test]
async fn chat_integration_parses_reply_and_sends_headers() {
    if !allow_local_integration() {
        return;
    }

    let server = ScriptedServer::new(vec![response_json(
        200,
        r##"{"conversationId":"c-1","message":{"id":"m-2","conversationId":"c-1","content":"Added 'buy milk'","role":"assistant","timestamp":"2025-12-20T10:00:00Z"},"operations":[{"type":"create","taskId":3,"task":{"id":3,"title":"buy milk","completed":false},"status":"success"}]}"##,
    )])
    .await;
    let client = client_for(&server);

    let reply = ChatBackend::send_message(&client, "tok", &chat_request())
        .await
        .expect("chat should succeed");

    assert_eq!(reply.conversation_id, "c-1");
    assert_eq!(reply.operations.len(), 1);
    assert_eq!(server.request_count(), 1);

    let head = server.request_head(0).to_ascii_lowercase();
    assert!(head.starts_with("post /chat "));
    assert!(head.contains("authorization: bearer tok"));
    assert!(head.contains("x-timezone: europe/berlin"));

    server.shutdown();
}

#[tokio::test]
async fn chat_integration_unauthorized_is_not_retried() {
    if !allow_local_integration() {
        return;
    }

    let server = ScriptedServer::new(vec![
        response_json(401, r##"{"detail":"Could not validate credentials"}"##),
        response_json(200, "{}"),
    ])
    .await;
    let client = client_for(&server);

    let error = ChatBackend::send_message(&client, "stale", &chat_request())
        .await
        .expect_err("401 must fail");

    assert_eq!(
        error,
        BackendError::Unauthorized {
            message: "Could not validate credentials".to_string()
        }
    );
    assert_eq!(server.request_count(), 1);

    server.shutdown();
}

#[tokio::test]
async fn chat_integration_server_error_is_retryable_single_attempt() {
    if !allow_local_integration() {
        return;
    }

    let server = ScriptedServer::new(vec![
        response_json(503, r##"{"error":{"message":"overloaded"}}"##),
        response_json(200, "{}"),
    ])
    .await;
    let client = client_for(&server);

    let error = ChatBackend::send_message(&client, "tok", &chat_request())
        .await
        .expect_err("503 must fail");

    assert_eq!(error.class(), FailureClass::Retryable);
    assert_eq!(error.status(), Some(503));
    assert_eq!(error.message(), "overloaded");
    assert_eq!(server.request_count(), 1);

    server.shutdown();
}

#[tokio::test]
async fn chat_integration_connection_reset_is_retryable() {
    if !allow_local_integration() {
        return;
    }

    let server = ScriptedServer::new(vec![ScriptedResponse::Reset]).await;
    let client = client_for(&server);

    let error = timeout(
        Duration::from_secs(10),
        ChatBackend::send_message(&client, "tok", &chat_request()),
    )
    .await
    .expect("reset should resolve")
    .expect_err("reset must fail");

    assert_eq!(error.class(), FailureClass::Retryable);

    server.shutdown();
}

#[tokio::test]
async fn history_integration_sends_window_query() {
    if !allow_local_integration() {
        return;
    }

    let server = ScriptedServer::new(vec![response_json(
        200,
        r##"{"messages":[],"total":120,"limit":50,"offset":50,"hasMore":true}"##,
    )])
    .await;
    let client = client_for(&server);

    let page = ChatBackend::fetch_history(&client, "tok", "c-1", 50, 50)
        .await
        .expect("history should succeed");

    assert_eq!(page.total, 120);
    assert!(page.has_more);
    assert!(server
        .request_head(0)
        .starts_with("GET /conversations/c-1/messages?limit=50&offset=50 "));

    server.shutdown();
}

#[tokio::test]
async fn task_integration_validation_failure_surfaces_detail() {
    if !allow_local_integration() {
        return;
    }

    let server = ScriptedServer::new(vec![response_json(
        422,
        r##"{"detail":[{"loc":["body","title"],"msg":"Title cannot be empty"}]}"##,
    )])
    .await;
    let client = client_for(&server);

    let error = TaskBackend::create_task(&client, "tok", &TaskDraft::new(" "))
        .await
        .expect_err("422 must fail");

    assert_eq!(error.class(), FailureClass::Terminal);
    assert_eq!(error.message(), "Title cannot be empty");

    server.shutdown();
}

#[tokio::test]
async fn task_integration_delete_accepts_empty_body() {
    if !allow_local_integration() {
        return;
    }

    let server = ScriptedServer::new(vec![response_json(204, "")]).await;
    let client = client_for(&server);

    client.delete_task("tok", 8).await.expect("delete should succeed");
    assert!(server.request_head(0).starts_with("DELETE /tasks/8 "));

    server.shutdown();
}

#[tokio::test]
async fn transport_rejects_blank_credential_before_sending() {
    if !allow_local_integration() {
        return;
    }

    let server = ScriptedServer::new(vec![response_json(200, "[]")]).await;
    let client = client_for(&server);

    let error = client.list_tasks("  ").await.expect_err("blank credential");
    assert!(matches!(error, TaskApiError::MissingCredential));
    assert_eq!(server.request_count(), 0);

    server.shutdown();
}

fn status_reason(status: u16) -> &'static str {
    match status {
        200 => "OK",
        204 => "No Content",
        401 => "Unauthorized",
        422 => "Unprocessable Entity",
        503 => "Service Unavailable",
        _ => "Error",
    }
}

async fn serve_one(
    mut socket: TcpStream,
    scripts: Arc<Vec<ScriptedResponse>>,
    request_count: Arc<AtomicUsize>,
    requests: Arc<Mutex<Vec<String>>>,
) {
    let Ok(head) = read_request(&mut socket).await else {
        return;
    };

    let index = request_count.fetch_add(1, Ordering::AcqRel);
    if let Ok(mut log) = requests.lock() {
        log.push(head);
    }
    let response = scripts
        .get(index)
        .cloned()
        .unwrap_or_else(|| response_json(500, r##"{"detail":"unexpected request"}"##));

    match response {
        ScriptedResponse::Reset => {}
        ScriptedResponse::Respond { status, body } => {
            let response = if status == 204 {
                format!(
                    "HTTP/1.1 {status} {}\r\nConnection: close\r\n\r\n",
                    status_reason(status)
                )
            } else {
                format!(
                    "HTTP/1.1 {status} {}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{body}",
                    status_reason(status),
                    body.len(),
                )
            };
            let _ = socket.write_all(response.as_bytes()).await;
            let _ = socket.shutdown().await;
        }
    }
}

/// Reads the request head and drains a `Content-Length` body, returning the head.
async fn read_request(socket: &mut TcpStream) -> std::io::Result<String> {
    let mut request = Vec::new();
    let mut buffer = [0_u8; 2048];

    let head_end = loop {
        let n = socket.read(&mut buffer).await?;
        if n == 0 {
            return Ok(String::from_utf8_lossy(&request).into_owned());
        }
        request.extend_from_slice(&buffer[..n]);
        if let Some(position) = request.windows(4).position(|window| window == b"\r\n\r\n") {
            break position + 4;
        }
    };

    let head = String::from_utf8_lossy(&request[..head_end]).into_owned();
    let content_length = head
        .lines()
        .filter_map(|line| line.split_once(':'))
        .find(|(name, _)| name.trim().eq_ignore_ascii_case("content-length"))
        .and_then(|(_, value)| value.trim().parse::<usize>().ok())
        .unwrap_or(0);

    let mut received = request.len() - head_end;
    while received < content_length {
        let n = socket.read(&mut buffer).await?;
        if n == 0 {
            break;
        }
        received += n;
    }

    Ok(head)
}
