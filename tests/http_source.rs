use crawl_monitor::source::{HttpSnapshotSource, SnapshotSource, build_client};
use crawl_monitor::{Error, RetryPolicy, Snapshot};
use serde_json::json;
use std::time::Duration;
use url::Url;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn source_for(server: &MockServer) -> HttpSnapshotSource {
    let client = build_client(Duration::from_secs(2)).unwrap();
    let base = Url::parse(&server.uri()).unwrap();
    HttpSnapshotSource::new(client, &base).unwrap()
}

#[tokio::test]
async fn fetch_decodes_stats_body() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/admin/stats"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "pending": 10,
            "crawled": 100,
            "failed": 3,
            "media": 12,
            "is_running": true,
            "is_paused": false
        })))
        .mount(&server)
        .await;

    let snapshot = source_for(&server).fetch().await.expect("fetch ok");
    assert_eq!(
        snapshot,
        Snapshot {
            pending: 10,
            crawled: 100,
            failed: 3,
            media: 12,
            is_running: true,
            is_paused: false,
        }
    );
}

#[tokio::test]
async fn non_success_status_is_a_transport_error() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/admin/stats"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&server)
        .await;

    let err = source_for(&server).fetch().await.unwrap_err();
    assert!(err.is_transport());
    assert!(matches!(err, Error::Status { status, .. } if status.as_u16() == 503));
}

#[tokio::test]
async fn malformed_body_is_a_transport_error() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/admin/stats"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html>oops</html>"))
        .mount(&server)
        .await;

    let err = source_for(&server).fetch().await.unwrap_err();
    assert!(matches!(err, Error::Transport(_)));
}

#[tokio::test]
async fn retry_policy_recovers_from_a_flaky_backend() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/admin/stats"))
        .respond_with(ResponseTemplate::new(500))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/admin/stats"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"pending": 1, "crawled": 2})))
        .mount(&server)
        .await;

    let source = source_for(&server);
    let policy = RetryPolicy::exponential(2, Duration::from_millis(5), 2.0, Duration::from_millis(20));
    let snapshot = policy.run(|| source.fetch()).await.expect("recovered");
    assert_eq!(snapshot.crawled, 2);
    assert_eq!(server.received_requests().await.unwrap().len(), 2);
}
