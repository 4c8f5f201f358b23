//! Mock exchange hosts shared by the integration suites

#![allow(dead_code)]

use futures::{SinkExt, StreamExt};
use serde_json::json;
use std::future::Future;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tokio_tungstenite::accept_hdr_async;
use tokio_tungstenite::tungstenite::handshake::server::{ErrorResponse, Request, Response};
use tokio_tungstenite::tungstenite::Message;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

pub const LISTEN_KEY: &str = "pqia91ma19a5s61cv6a81va65sdf19v8a65a1a5s61cv6a81va65sdf19v8a65a1";

pub fn init_tracing() {
    let _ = tracing_subscriber::fmt().with_test_writer().try_init();
}

/// Serve create, keepalive and close of a listen key at `listen_key_path`
pub async fn mount_listen_key(server: &MockServer, listen_key_path: &str) {
    Mock::given(method("POST"))
        .and(path(listen_key_path))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "listenKey": LISTEN_KEY })))
        .mount(server)
        .await;
    Mock::given(method("PUT"))
        .and(path(listen_key_path))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({})))
        .mount(server)
        .await;
    Mock::given(method("DELETE"))
        .and(path(listen_key_path))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({})))
        .mount(server)
        .await;
}

/// Number of journaled requests with this method and path
pub async fn count_requests(server: &MockServer, http_method: &str, request_path: &str) -> usize {
    server
        .received_requests()
        .await
        .unwrap_or_default()
        .iter()
        .filter(|request| {
            request.method.as_str() == http_method && request.url.path() == request_path
        })
        .count()
}

/// Poll `condition` every 10ms until it holds or `limit` elapses
pub async fn eventually<F, Fut>(limit: Duration, mut condition: F) -> bool
where
    F: FnMut() -> Fut,
    Fut: Future<Output = bool>,
{
    let deadline = tokio::time::Instant::now() + limit;
    while tokio::time::Instant::now() < deadline {
        if condition().await {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    condition().await
}

#[derive(Debug, Clone)]
enum StreamCommand {
    Push(String),
    Close,
}

/// Local WebSocket host standing in for the exchange stream endpoint
pub struct MockStreamServer {
    url: String,
    paths: Arc<Mutex<Vec<String>>>,
    commands: broadcast::Sender<StreamCommand>,
}

impl MockStreamServer {
    pub async fn start() -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let address = listener.local_addr().unwrap();
        let paths = Arc::new(Mutex::new(Vec::new()));
        let (commands, _) = broadcast::channel(16);

        let accepted_paths = paths.clone();
        let accepted_commands = commands.clone();
        tokio::spawn(async move {
            while let Ok((socket, _)) = listener.accept().await {
                let paths = accepted_paths.clone();
                let mut commands = accepted_commands.subscribe();

                tokio::spawn(async move {
                    let record = |request: &Request, response: Response| -> Result<Response, ErrorResponse> {
                        paths.lock().unwrap().push(request.uri().path().to_string());
                        Ok(response)
                    };
                    let Ok(mut ws) = accept_hdr_async(socket, record).await else {
                        return;
                    };

                    loop {
                        tokio::select! {
                            command = commands.recv() => match command {
                                Ok(StreamCommand::Push(text)) => {
                                    if ws.send(Message::Text(text)).await.is_err() {
                                        break;
                                    }
                                }
                                Ok(StreamCommand::Close) | Err(_) => {
                                    let _ = ws.close(None).await;
                                    break;
                                }
                            },
                            frame = ws.next() => match frame {
                                Some(Ok(Message::Close(_))) | Some(Err(_)) | None => break,
                                Some(Ok(_)) => {}
                            },
                        }
                    }
                });
            }
        });

        Self {
            url: format!("ws://{}", address),
            paths,
            commands,
        }
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    /// Request paths of every accepted connection, in order
    pub fn paths(&self) -> Vec<String> {
        self.paths.lock().unwrap().clone()
    }

    /// Send a text frame to every open connection
    pub fn push(&self, text: &str) {
        let _ = self.commands.send(StreamCommand::Push(text.to_string()));
    }

    /// Close every open connection from the server side
    pub fn close_all(&self) {
        let _ = self.commands.send(StreamCommand::Close);
    }
}
