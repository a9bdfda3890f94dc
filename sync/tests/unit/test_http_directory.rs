//! Device directory tests against a local fake API

use std::net::SocketAddr;
use std::sync::{Arc, Mutex};

use resin_sync::device::directory::DeviceDirectory;
use resin_sync::errors::SyncError;
use resin_sync::http::client::HttpClient;
use resin_sync::http::devices::HttpDeviceDirectory;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;

const FULL_ID: &str = "7cf02a687b74206f92cb455969cf8e98";

/// Answers every request with one canned status and body
struct FakeApi {
    addr: SocketAddr,
    requests: Arc<Mutex<Vec<String>>>,
}

impl FakeApi {
    async fn replying(status: &'static str, body: &'static str) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let requests = Arc::new(Mutex::new(Vec::new()));

        let recorded = requests.clone();
        tokio::spawn(async move {
            while let Ok((mut socket, _)) = listener.accept().await {
                let recorded = recorded.clone();
                tokio::spawn(async move {
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
                    let header = |name: &str| {
                        head.lines()
                            .filter_map(|line| line.split_once(':'))
                            .find(|(key, _)| key.trim().eq_ignore_ascii_case(name))
                            .map(|(_, value)| value.trim().to_string())
                            .unwrap_or_default()
                    };
                    let content_length = header("content-length").parse::<usize>().unwrap_or(0);
                    while buf.len() < header_end + content_length {
                        match socket.read(&mut chunk).await {
                            Ok(0) | Err(_) => break,
                            Ok(n) => buf.extend_from_slice(&chunk[..n]),
                        }
                    }

                    let request_line = head.lines().next().unwrap_or_default();
                    recorded
                        .lock()
                        .unwrap()
                        .push(format!("{} [{}]", request_line, header("authorization")));

                    let response = format!(
                        "HTTP/1.1 {}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
                        status,
                        body.len(),
                        body
                    );
                    let _ = socket.write_all(response.as_bytes()).await;
                    let _ = socket.shutdown().await;
                });
            }
        });

        Self { addr, requests }
    }

    fn directory(&self) -> HttpDeviceDirectory {
        let client = HttpClient::new(&format!("http://{}/v1/", self.addr), "t0k3n").unwrap();
        HttpDeviceDirectory::new(client)
    }

    fn requests(&self) -> Vec<String> {
        self.requests.lock().unwrap().clone()
    }
}

#[tokio::test]
async fn test_stop_and_start_accept_empty_replies() {
    for status in ["200 OK", "204 No Content"] {
        let api = FakeApi::replying(status, "").await;
        let directory = api.directory();

        directory.stop_application(FULL_ID).await.unwrap();
        directory.start_application(FULL_ID).await.unwrap();

        let requests = api.requests();
        assert_eq!(requests.len(), 2, "{}", status);
        assert!(requests[0].starts_with(&format!("POST /v1/devices/{}/application/stop ", FULL_ID)));
        assert!(requests[1].starts_with(&format!("POST /v1/devices/{}/application/start ", FULL_ID)));
        assert!(requests[0].ends_with("[Bearer t0k3n]"), "{}", requests[0]);
    }
}

#[tokio::test]
async fn test_api_error_uses_structured_message() {
    let api = FakeApi::replying("409 Conflict", r#"{"error":"busy","message":"Application is updating"}"#).await;

    let err = api.directory().stop_application(FULL_ID).await.unwrap_err();

    assert!(matches!(&err, SyncError::ApiError(msg) if msg == "409 Conflict: Application is updating"), "{:?}", err);
}

#[tokio::test]
async fn test_current_user_is_one_request() {
    let api = FakeApi::replying("200 OK", r#"{"id":"42","username":"gh_me"}"#).await;

    let user = api.directory().current_user().await.unwrap();

    assert_eq!(user.id, "42");
    assert_eq!(user.username, "gh_me");
    assert_eq!(api.requests().len(), 1);
    assert!(api.requests()[0].starts_with("GET /v1/user/whoami "));
}
