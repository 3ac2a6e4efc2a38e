//! End-to-end shutdown tests
//!
//! Runs the dispatcher and churn together and checks that a stop request
//! brings both down promptly with the frontier checkpointed and the churn
//! working directory gone.

use noisewake::churn::ChurnExit;
use noisewake::config::{load_config, write_config, Config};
use noisewake::engine::{run_until, work_dir_for};
use std::time::{Duration, Instant};
use wiremock::matchers::method;
use wiremock::{Mock, MockServer, ResponseTemplate};

#[tokio::test]
async fn test_stop_request_shuts_everything_down() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_string(format!("more at {}/found", server.uri())),
        )
        .mount(&server)
        .await;

    let dir = tempfile::tempdir().unwrap();
    let config_path = dir.path().join("config.toml");
    let config = Config {
        urls: vec![format!("{}/seed", server.uri())],
        user_agents: vec!["agent".to_string()],
        rate_limit: Some(3600),
        timeout: Some(5),
        // The tracker is the same mock; a text body is not bencode, so every
        // join fails and churn sits in its backoff when the stop arrives
        max_retries: Some(3),
        torrent_link: Some(format!(
            "magnet:?xt=urn:btih:c9e15763f722f23e98a29decdfae341b98d53056&tr={}",
            url::form_urlencoded::byte_serialize(format!("{}/announce", server.uri()).as_bytes())
                .collect::<String>()
        )),
        // Stay off the public DHT
        dht_bootstrap: Some(Vec::new()),
        ..Config::default()
    };
    write_config(&config_path, &config).unwrap();

    let started = Instant::now();
    let summary = run_until(config, &config_path, tokio::time::sleep(Duration::from_millis(500)))
        .await
        .unwrap();

    assert!(started.elapsed() < Duration::from_secs(4));

    // The one sweep before the long pause discovered /found
    assert_eq!(summary.frontier_len, Some(2));
    let persisted = load_config(&config_path).unwrap();
    assert!(persisted.urls.contains(&format!("{}/found", server.uri())));

    let churn = summary.churn.unwrap();
    assert_eq!(churn.exit, ChurnExit::Cancelled);
    assert!(churn.failures >= 1);

    assert!(!work_dir_for(&config_path).exists());
}

#[tokio::test]
async fn test_run_without_churn_target() {
    let dir = tempfile::tempdir().unwrap();
    let config_path = dir.path().join("config.toml");
    let config = Config {
        user_agents: vec!["agent".to_string()],
        ..Config::default()
    };

    let summary = run_until(config, &config_path, async {}).await.unwrap();

    assert_eq!(summary.frontier_len, Some(0));
    assert_eq!(summary.churn.unwrap().exit, ChurnExit::Disabled);
    assert!(!work_dir_for(&config_path).exists());
}
