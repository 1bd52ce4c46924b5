//! Shared utilities for integration tests.

#![allow(dead_code)]

use std::net::SocketAddr;
use std::time::Duration;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;
use tokio::sync::mpsc;

use static_response::config::{RuleConfig, ServerConfig};
use static_response::{HttpServer, RuleSet, SharedRuleSet, Shutdown};

/// Start a mock upstream that answers every request with its request line,
/// e.g. `upstream saw GET /path?q=1 HTTP/1.1`.
pub async fn start_echo_backend() -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        while let Ok((mut socket, _)) = listener.accept().await {
            tokio::spawn(async move {
                let mut buf = vec![0u8; 8192];
                let n = socket.read(&mut buf).await.unwrap_or(0);
                let head = String::from_utf8_lossy(&buf[..n]);
                let request_line = head.lines().next().unwrap_or_default();
                let body = format!("upstream saw {request_line}");

                let response = format!(
                    "HTTP/1.1 200 OK\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
                    body.len(),
                    body
                );
                let _ = socket.write_all(response.as_bytes()).await;
                let _ = socket.shutdown().await;
            });
        }
    });

    addr
}

pub fn content_rule(path: &str, content: &str) -> RuleConfig {
    RuleConfig {
        path: Some(path.to_string()),
        content: Some(content.to_string()),
        ..RuleConfig::default()
    }
}

pub struct RunningServer {
    pub addr: SocketAddr,
    pub rules: SharedRuleSet,
    pub updates: mpsc::UnboundedSender<RuleSet>,
    pub shutdown: Shutdown,
}

/// Run a server on an ephemeral port until `shutdown` is triggered.
pub async fn start_server(config: ServerConfig) -> RunningServer {
    let rules = RuleSet::compile(&config.rules).unwrap();
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    let shutdown = Shutdown::new();
    let (updates, rule_updates) = mpsc::unbounded_channel();
    let server = HttpServer::new(config, rules);
    let shared = server.rules();
    let server_shutdown = shutdown.subscribe();

    tokio::spawn(async move {
        let _ = server.run(listener, rule_updates, server_shutdown).await;
    });
    tokio::time::sleep(Duration::from_millis(50)).await;

    RunningServer {
        addr,
        rules: shared,
        updates,
        shutdown,
    }
}

pub fn client() -> reqwest::Client {
    reqwest::Client::builder()
        .pool_max_idle_per_host(0)
        .no_proxy()
        .build()
        .unwrap()
}
