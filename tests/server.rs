//! End-to-end tests over TCP.

use std::time::Duration;

use static_response::config::{ServerConfig, UpstreamConfig};
use static_response::RuleSet;

mod common;

#[tokio::test]
async fn test_static_and_forwarded() {
    let backend_addr = common::start_echo_backend().await;

    let config = ServerConfig {
        upstream: Some(UpstreamConfig {
            address: backend_addr.to_string(),
        }),
        rules: vec![common::content_rule("/", "Hello World!")],
        ..ServerConfig::default()
    };
    let server = common::start_server(config).await;
    let client = common::client();

    let res = client.get(format!("http://{}/", server.addr)).send().await.unwrap();
    assert_eq!(res.status(), 200);
    assert!(res.headers().contains_key("x-request-id"));
    assert_eq!(res.text().await.unwrap(), "Hello World!\n");

    let res = client
        .get(format!("http://{}/api/items?page=2", server.addr))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), 200);
    assert_eq!(
        res.text().await.unwrap(),
        "upstream saw GET /api/items?page=2 HTTP/1.1"
    );

    server.shutdown.trigger();
}

#[tokio::test]
async fn test_not_found_without_upstream() {
    let config = ServerConfig {
        rules: vec![common::content_rule("/", "Hello World!")],
        ..ServerConfig::default()
    };
    let server = common::start_server(config).await;

    let res = common::client()
        .get(format!("http://{}/missing", server.addr))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), 404);
    assert_eq!(res.text().await.unwrap(), "404 page not found\n");

    server.shutdown.trigger();
}

#[tokio::test]
async fn test_unreachable_upstream_is_502() {
    // Bind and drop to get a port nothing listens on.
    let dead = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let dead_addr = dead.local_addr().unwrap();
    drop(dead);

    let config = ServerConfig {
        upstream: Some(UpstreamConfig {
            address: dead_addr.to_string(),
        }),
        rules: vec![common::content_rule("/", "Hello World!")],
        ..ServerConfig::default()
    };
    let server = common::start_server(config).await;

    let res = common::client()
        .get(format!("http://{}/elsewhere", server.addr))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), 502);

    server.shutdown.trigger();
}

#[tokio::test]
async fn test_template_sees_remote_addr() {
    let config = ServerConfig {
        rules: vec![common::content_rule("/whoami", "{{.Request.RemoteAddr}}")],
        ..ServerConfig::default()
    };
    let server = common::start_server(config).await;

    let body = common::client()
        .get(format!("http://{}/whoami", server.addr))
        .send()
        .await
        .unwrap()
        .text()
        .await
        .unwrap();
    assert!(body.starts_with("127.0.0.1:"), "{body}");

    server.shutdown.trigger();
}

#[tokio::test]
async fn test_rule_updates_are_swapped_in() {
    let config = ServerConfig {
        rules: vec![common::content_rule("/", "before")],
        ..ServerConfig::default()
    };
    let server = common::start_server(config).await;
    let client = common::client();
    let url = format!("http://{}/", server.addr);

    assert_eq!(client.get(&url).send().await.unwrap().text().await.unwrap(), "before\n");

    let next = RuleSet::compile(&[common::content_rule("/", "after")]).unwrap();
    server.updates.send(next).unwrap();
    tokio::time::sleep(Duration::from_millis(50)).await;

    assert_eq!(server.rules.load().len(), 1);
    assert_eq!(client.get(&url).send().await.unwrap().text().await.unwrap(), "after\n");

    server.shutdown.trigger();
}
