//! Engine client tests against a local fake engine
//!
//! The fake speaks just enough HTTP/1.1 for bollard: one request per
//! connection, canned replies per route, every request recorded.

use std::net::SocketAddr;
use std::sync::{Arc, Mutex};

use resin_sync::docker::client::EngineClient;
use resin_sync::docker::progress::ProgressError;
use resin_sync::errors::SyncError;
use serde_json::Value;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};

#[derive(Debug, Clone)]
struct Recorded {
    method: String,
    target: String,
    body: Vec<u8>,
}

impl Recorded {
    fn path(&self) -> &str {
        self.target.split('?').next().unwrap_or_default()
    }

    fn query(&self) -> &str {
        self.target.split_once('?').map(|(_, q)| q).unwrap_or_default()
    }
}

#[derive(Debug, Clone)]
enum Reply {
    Json(u16, String),
    Lines(Vec<String>),
    Raw(String),
}

#[derive(Clone)]
struct Route {
    method: &'static str,
    path_suffix: &'static str,
    reply: Reply,
}

fn route(method: &'static str, path_suffix: &'static str, reply: Reply) -> Route {
    Route {
        method,
        path_suffix,
        reply,
    }
}

struct FakeEngine {
    addr: SocketAddr,
    requests: Arc<Mutex<Vec<Recorded>>>,
}

impl FakeEngine {
    async fn start(routes: Vec<Route>) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let requests = Arc::new(Mutex::new(Vec::new()));

        let recorded = requests.clone();
        tokio::spawn(async move {
            loop {
                let Ok((socket, _)) = listener.accept().await else {
                    return;
                };
                let routes = routes.clone();
                let recorded = recorded.clone();
                tokio::spawn(async move { serve(socket, &routes, &recorded).await });
            }
        });

        Self { addr, requests }
    }

    fn client(&self) -> EngineClient {
        EngineClient::connect(&self.addr.ip().to_string(), self.addr.port()).unwrap()
    }

    fn requests(&self) -> Vec<Recorded> {
        self.requests.lock().unwrap().clone()
    }

    fn find(&self, method: &str, path_suffix: &str) -> Recorded {
        self.requests()
            .into_iter()
            .find(|r| r.method == method && r.path().ends_with(path_suffix))
            .unwrap_or_else(|| panic!("no {} {} in {:?}", method, path_suffix, self.requests()))
    }
}

async fn serve(mut socket: TcpStream, routes: &[Route], recorded: &Mutex<Vec<Recorded>>) {
    let mut buf = Vec::new();
    let mut chunk = [0u8; 4096];

    let header_end = loop {
        if let Some(pos) = buf.windows(4).position(|w| w == b"\r\n\r\n") {
            break pos + 4;
        }
        match socket.read(&mut chunk).await {
            Ok(0) | Err(_) => return,
            Ok(n) => buf.extend_from_slice(&chunk[..n]),
        }
    };

    let head = String::from_utf8_lossy(&buf[..header_end]).into_owned();
    let mut lines = head.lines();
    let mut request_line = lines.next().unwrap_or_default().split_whitespace();
    let method = request_line.next().unwrap_or_default().to_string();
    let target = request_line.next().unwrap_or_default().to_string();
    let content_length = lines
        .filter_map(|line| line.split_once(':'))
        .find(|(name, _)| name.trim().eq_ignore_ascii_case("content-length"))
        .and_then(|(_, value)| value.trim().parse::<usize>().ok())
        .unwrap_or(0);

    while buf.len() < header_end + content_length {
        match socket.read(&mut chunk).await {
            Ok(0) | Err(_) => break,
            Ok(n) => buf.extend_from_slice(&chunk[..n]),
        }
    }
    let body = buf[header_end..].to_vec();

    let request = Recorded { method, target, body };
    let reply = routes
        .iter()
        .find(|r| r.method == request.method && request.path().ends_with(r.path_suffix))
        .map(|r| r.reply.clone())
        .unwrap_or_else(|| Reply::Json(404, r#"{"message":"no such route"}"#.to_string()));
    recorded.lock().unwrap().push(request);

    let response = match reply {
        Reply::Json(code, body) => format!(
            "HTTP/1.1 {} Fake\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
            code,
            body.len(),
            body
        ),
        Reply::Lines(lines) => {
            let body: String = lines.iter().map(|line| format!("{}\n", line)).collect();
            format!(
                "HTTP/1.1 200 OK\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
                body.len(),
                body
            )
        }
        Reply::Raw(output) => format!(
            "HTTP/1.1 101 UPGRADED\r\nContent-Type: application/vnd.docker.raw-stream\r\nConnection: Upgrade\r\nUpgrade: tcp\r\n\r\n{}",
            output
        ),
    };
    let _ = socket.write_all(response.as_bytes()).await;
    let _ = socket.shutdown().await;
}

fn json(body: &str) -> Reply {
    Reply::Json(200, body.to_string())
}

fn created() -> Route {
    route("POST", "/containers/create", Reply::Json(201, r#"{"Id":"c0ffee","Warnings":[]}"#.to_string()))
}

fn build_context() -> tempfile::TempDir {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("Dockerfile"), "FROM scratch\n").unwrap();
    dir
}

#[tokio::test]
async fn test_create_container_uses_image_command() {
    let engine = FakeEngine::start(vec![
        route("GET", "/images/app/json", json(r#"{"Id":"sha256:1","Config":{"Cmd":["node","index.js"]}}"#)),
        created(),
    ])
    .await;

    engine
        .client()
        .create_container("app", &["NODE_ENV=production".to_string()])
        .await
        .unwrap();

    let create = engine.find("POST", "/containers/create");
    assert!(create.query().contains("name=app"), "{}", create.query());
    let body: Value = serde_json::from_slice(&create.body).unwrap();
    assert_eq!(body["Cmd"], serde_json::json!(["node", "index.js"]));
    assert_eq!(body["Env"], serde_json::json!(["NODE_ENV=production"]));
    assert_eq!(body["Image"], "app");
    assert_eq!(body["HostConfig"]["Privileged"], true);
}

#[tokio::test]
async fn test_create_container_falls_back_to_start_script() {
    for image in [
        r#"{"Id":"sha256:1","Config":{}}"#,
        r#"{"Id":"sha256:1","Config":{"Cmd":[]}}"#,
        r#"{"Id":"sha256:1"}"#,
    ] {
        let engine = FakeEngine::start(vec![route("GET", "/images/app/json", json(image)), created()]).await;

        engine.client().create_container("app", &[]).await.unwrap();

        let body: Value = serde_json::from_slice(&engine.find("POST", "/containers/create").body).unwrap();
        assert_eq!(body["Cmd"], serde_json::json!(["/bin/bash", "-c", "/start"]), "{}", image);
    }
}

#[tokio::test]
async fn test_create_container_rejects_bad_env_before_engine_call() {
    let engine = FakeEngine::start(vec![
        route("GET", "/images/app/json", json(r#"{"Id":"sha256:1"}"#)),
        created(),
    ])
    .await;

    let err = engine
        .client()
        .create_container("app", &["GOOD=1".to_string(), "NOT VALID".to_string()])
        .await
        .unwrap_err();

    assert!(matches!(err, SyncError::InvalidEnvVar(ref entry) if entry == "NOT VALID"));
    assert!(engine.requests().is_empty());
}

#[tokio::test]
async fn test_logs_of_stopped_container_are_replayed() {
    let engine = FakeEngine::start(vec![
        route("GET", "/containers/app/json", json(r#"{"Id":"c0ffee","State":{"Running":false}}"#)),
        route("POST", "/containers/app/attach", Reply::Raw("last words\n".to_string())),
    ])
    .await;

    let mut out = Vec::new();
    engine.client().stream_container_logs("app", &mut out).await.unwrap();

    assert_eq!(String::from_utf8(out).unwrap(), "last words\n");
    let attach = engine.find("POST", "/containers/app/attach");
    assert!(attach.query().contains("logs=true"), "{}", attach.query());
    assert!(attach.query().contains("stream=false"), "{}", attach.query());
}

#[tokio::test]
async fn test_logs_of_running_container_are_attached_live() {
    let engine = FakeEngine::start(vec![
        route("GET", "/containers/app/json", json(r#"{"Id":"c0ffee","State":{"Running":true}}"#)),
        route("POST", "/containers/app/attach", Reply::Raw("tick\n".to_string())),
    ])
    .await;

    let mut out = Vec::new();
    engine.client().follow_container_logs("app", &mut out).await.unwrap();

    assert_eq!(String::from_utf8(out).unwrap(), "tick\n");
    let attach = engine.find("POST", "/containers/app/attach");
    assert!(attach.query().contains("logs=false"), "{}", attach.query());
    assert!(attach.query().contains("stream=true"), "{}", attach.query());
}

#[tokio::test]
async fn test_build_renders_progress() {
    let engine = FakeEngine::start(vec![route(
        "POST",
        "/build",
        Reply::Lines(vec![
            r#"{"stream":"Step 1/2 : FROM scratch"}"#.to_string(),
            r#"{"stream":"Successfully tagged app:latest"}"#.to_string(),
        ]),
    )])
    .await;
    let context = build_context();

    let mut out = Vec::new();
    engine.client().build_image(context.path(), "app", &mut out).await.unwrap();

    let out = String::from_utf8(out).unwrap();
    assert!(out.contains("Step 1/2 : FROM scratch"));
    assert!(out.contains("Successfully tagged app:latest"));

    let build = engine.find("POST", "/build");
    assert!(build.query().contains("t=app"), "{}", build.query());
    assert!(!build.body.is_empty());
}

#[tokio::test]
async fn test_build_error_event_surfaces_engine_message() {
    let engine = FakeEngine::start(vec![route(
        "POST",
        "/build",
        Reply::Lines(vec![
            r#"{"stream":"Step 1/2 : FROM scratch"}"#.to_string(),
            r#"{"error":"disk full","errorDetail":{"message":"disk full"}}"#.to_string(),
            r#"{"stream":"Step 2/2 : never shown"}"#.to_string(),
        ]),
    )])
    .await;
    let context = build_context();

    let mut out = Vec::new();
    let err = engine
        .client()
        .build_image(context.path(), "app", &mut out)
        .await
        .unwrap_err();

    assert!(
        matches!(&err, SyncError::Progress(ProgressError::Event(message)) if message == "disk full"),
        "{:?}",
        err
    );
    assert_eq!(err.to_string(), "disk full");

    let out = String::from_utf8(out).unwrap();
    assert!(out.contains("Step 1/2 : FROM scratch"));
    assert!(!out.contains("never shown"));
}

#[tokio::test]
async fn test_build_rejected_by_engine_is_a_stream_failure() {
    let engine = FakeEngine::start(vec![route(
        "POST",
        "/build",
        Reply::Json(500, r#"{"message":"daemon exploded"}"#.to_string()),
    )])
    .await;
    let context = build_context();

    let err = engine
        .client()
        .build_image(context.path(), "app", Vec::new())
        .await
        .unwrap_err();

    assert!(matches!(err, SyncError::Progress(ProgressError::Stream(_))), "{:?}", err);
    assert!(err.to_string().contains("daemon exploded"), "{}", err);
}
