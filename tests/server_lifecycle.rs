//! Serve over a real socket and shut down cleanly.

mod common;

use std::time::Duration;
use tokio::net::TcpListener;
use tokio::sync::mpsc;

use common::test_server;
use folio_guard::config::GuardConfig;
use folio_guard::Shutdown;

#[tokio::test]
async fn test_serves_until_shutdown_and_applies_reloads() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    let (server, store) = test_server(GuardConfig::default());
    let (updates_tx, updates_rx) = mpsc::unbounded_channel();
    let shutdown = Shutdown::new();
    let handle = tokio::spawn(server.run(listener, updates_rx, shutdown.subscribe()));

    let client = reqwest::Client::builder().no_proxy().build().unwrap();
    let base = format!("http://{addr}");

    let res = client
        .post(format!("{base}/v1/rate-limit/ai-gen"))
        .header("origin", "https://partner.example")
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), reqwest::StatusCode::FORBIDDEN);

    let mut reloaded = GuardConfig::default();
    reloaded.csrf.allowed_origins.push("https://partner.example".to_string());
    updates_tx.send(reloaded).unwrap();

    // The reload is applied by a background task.
    let mut status = reqwest::StatusCode::FORBIDDEN;
    for _ in 0..50 {
        let res = client
            .post(format!("{base}/v1/rate-limit/ai-gen"))
            .header("origin", "https://partner.example")
            .send()
            .await
            .unwrap();
        status = res.status();
        if status == reqwest::StatusCode::OK {
            assert_eq!(res.headers()["x-ratelimit-limit"], "10");
            break;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    assert_eq!(status, reqwest::StatusCode::OK);
    assert_eq!(store.len(), 1);

    shutdown.trigger();
    let result = tokio::time::timeout(Duration::from_secs(5), handle)
        .await
        .expect("server did not stop")
        .unwrap();
    assert!(result.is_ok());
}
