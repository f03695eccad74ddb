//! Integration test: start the status server on a free port, GET / and /stats,
//! assert the health and counter JSON. Does not require Telegram.

use lib::config::StatusConfig;
use lib::stats::RelayStats;
use lib::status;
use std::sync::Arc;
use std::time::Duration;

fn free_port() -> u16 {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").expect("bind free port");
    listener.local_addr().expect("local_addr").port()
}

#[tokio::test]
async fn status_server_reports_health_and_counters() {
    let port = free_port();
    let config = StatusConfig {
        port,
        bind: "127.0.0.1".to_string(),
    };

    let stats = Arc::new(RelayStats::default());
    stats.record_received();
    stats.record_forwarded();

    let server_stats = stats.clone();
    let server_handle = tokio::spawn(async move {
        let _ = status::run_status_server(config, "relay", server_stats).await;
    });

    let base = format!("http://127.0.0.1:{}", port);
    let client = reqwest::Client::new();
    let mut last_err = None;
    for _ in 0..100 {
        match client.get(&base).send().await {
            Ok(resp) if resp.status().is_success() => {
                let json: serde_json::Value = resp.json().await.expect("parse health JSON");
                assert_eq!(json.get("runtime").and_then(|v| v.as_str()), Some("running"));
                assert_eq!(json.get("mode").and_then(|v| v.as_str()), Some("relay"));
                assert_eq!(json.get("port").and_then(|v| v.as_u64()), Some(port as u64));

                let counters: serde_json::Value = client
                    .get(format!("{}/stats", base))
                    .send()
                    .await
                    .expect("GET /stats")
                    .json()
                    .await
                    .expect("parse stats JSON");
                assert_eq!(counters.get("received").and_then(|v| v.as_u64()), Some(1));
                assert_eq!(counters.get("forwarded").and_then(|v| v.as_u64()), Some(1));
                assert_eq!(counters.get("errors").and_then(|v| v.as_u64()), Some(0));
                return;
            }
            Ok(_) => {}
            Err(e) => last_err = Some(e),
        }
        tokio::time::sleep(Duration::from_millis(50)).await;
    }

    server_handle.abort();
    panic!(
        "GET {} did not return 200 with health JSON within 5s; last error: {:?}",
        base, last_err
    );
}
