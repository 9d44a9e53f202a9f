//! Full server over TCP against a mock OpenAI-compatible upstream.

use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;

use nutri_gateway::llm::OpenAiProvider;
use nutri_gateway::security::SystemClock;
use nutri_gateway::{HttpServer, Shutdown};

mod common;
use common::{payload, start_mock_openai, test_config};

#[tokio::test]
async fn test_chat_through_real_provider() {
    let (base_url, captured) = start_mock_openai(&["Spinach ", "is rich in iron."]).await;

    let mut config = test_config();
    config.provider.base_url = base_url;
    config.provider.api_key = "sk-test".into();
    config.provider.model = "gpt-test".into();

    let provider = OpenAiProvider::new(&config.provider).unwrap();
    let server = HttpServer::with_provider(config, Arc::new(provider), Arc::new(SystemClock)).unwrap();

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let shutdown = Shutdown::new();
    let handle = tokio::spawn(server.run(listener, shutdown.clone()));

    let client = reqwest::Client::new();
    let response = client
        .post(format!("http://{addr}/api/chat"))
        .json(&payload("Which vegetables have iron?"))
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), 200);
    assert_eq!(response.headers()["x-vercel-ai-data-stream"], "v1");
    assert_eq!(response.headers()["x-ratelimit-remaining-chat"], "19");
    assert_eq!(
        response.text().await.unwrap(),
        "0:\"Spinach \"\n0:\"is rich in iron.\"\n"
    );

    let captured = captured.lock().unwrap().clone();
    assert_eq!(captured.authorization.as_deref(), Some("Bearer sk-test"));
    let body = captured.body.unwrap();
    assert_eq!(body["model"], "gpt-test");
    assert_eq!(body["stream"], true);
    assert_eq!(body["messages"][0]["role"], "system");
    assert_eq!(body["messages"][1]["content"], "Which vegetables have iron?");

    drop(client);
    shutdown.trigger();
    tokio::time::timeout(Duration::from_secs(5), handle)
        .await
        .unwrap()
        .unwrap()
        .unwrap();
}

#[tokio::test]
async fn test_peer_address_identifies_client_without_proxy_headers() {
    let mut config = test_config();
    config.rate_limits.chat.max_requests = 1;
    // No upstream is reachable; only the limiter outcome matters here.
    config.provider.base_url = "http://127.0.0.1:9/v1".into();
    config.provider.api_key = "sk-test".into();

    let server = HttpServer::new(config).unwrap();
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let shutdown = Shutdown::new();
    let handle = tokio::spawn(server.run(listener, shutdown.clone()));

    let client = reqwest::Client::new();
    let first = client
        .post(format!("http://{addr}/api/chat"))
        .json(&payload("hi"))
        .send()
        .await
        .unwrap();
    assert_eq!(first.status(), 500);

    let second = client
        .post(format!("http://{addr}/api/chat"))
        .json(&payload("hi"))
        .send()
        .await
        .unwrap();
    assert_eq!(second.status(), 429);
    assert!(second.headers().contains_key("retry-after"));

    drop(client);
    shutdown.trigger();
    tokio::time::timeout(Duration::from_secs(5), handle)
        .await
        .unwrap()
        .unwrap()
        .unwrap();
}
