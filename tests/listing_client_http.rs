//! ListingClient against a minimal local HTTP server
use chrono::NaiveDate;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;
use tokio::sync::oneshot;

use pagination_sampler::domain::ListingQuery;
use pagination_sampler::infrastructure::config::ApiConfig;
use pagination_sampler::infrastructure::listing_client::ListingClient;
use pagination_sampler::sampling::{FailureKind, FetchError, PageSource};

/// Serves one connection with `status` and `body`; yields the raw request head
async fn serve_once(status: &'static str, body: &'static str) -> (String, oneshot::Receiver<String>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let (tx, rx) = oneshot::channel();

    tokio::spawn(async move {
        let (mut socket, _) = listener.accept().await.unwrap();
        let mut head = Vec::new();
        let mut buf = [0u8; 1024];
        while !head.windows(4).any(|w| w == b"\r\n\r\n") {
            let n = socket.read(&mut buf).await.unwrap();
            if n == 0 {
                break;
            }
            head.extend_from_slice(&buf[..n]);
        }
        let response = format!(
            "HTTP/1.1 {status}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{body}",
            body.len()
        );
        socket.write_all(response.as_bytes()).await.unwrap();
        socket.shutdown().await.ok();
        let _ = tx.send(String::from_utf8_lossy(&head).into_owned());
    });

    (format!("http://{addr}/api"), rx)
}

fn client(url: String) -> ListingClient {
    ListingClient::from_config(&ApiConfig {
        url,
        token: "perm:secret".into(),
        ..ApiConfig::default()
    })
    .unwrap()
}

fn query() -> ListingQuery {
    ListingQuery {
        resource_path: "/workItems".into(),
        top_param: "$top".into(),
        skip_param: "$skip".into(),
        fields: "id,created,date".into(),
        page_size: 400,
        start_date: NaiveDate::from_ymd_opt(2021, 3, 1).unwrap(),
        end_date: NaiveDate::from_ymd_opt(2021, 3, 31).unwrap(),
    }
}

#[tokio::test]
async fn success_returns_items_and_sends_query_and_token() {
    let (url, request) = serve_once(
        "200 OK",
        r#"[{"id":"8-1","created":1614851130000,"date":1614816000000,"duration":{"minutes":30}},{"id":"8-2"}]"#,
    )
    .await;

    let items = client(url).fetch_page(&query().page(800)).await.unwrap();
    assert_eq!(items.len(), 2);
    assert_eq!(items[0].id, "8-1");
    assert_eq!(items[0].duration.minutes, 30);

    let head = request.await.unwrap();
    assert!(head.starts_with(
        "GET /api/workItems?$top=400&$skip=800&fields=id,created,date&startDate=2021-03-01&endDate=2021-03-31 HTTP/1.1"
    ));
    let lower = head.to_lowercase();
    assert!(lower.contains("authorization: bearer perm:secret"));
    assert!(lower.contains("accept: application/json, text/plain, */*"));
}

#[tokio::test]
async fn non_success_status_is_a_server_error() {
    let (url, _request) = serve_once("503 Service Unavailable", r#"{"error":"maintenance"}"#).await;

    let err = client(url).fetch_page(&query().page(0)).await.unwrap_err();
    assert_eq!(err.kind(), FailureKind::ServerError);
    match err {
        FetchError::ServerError { status, body } => {
            assert_eq!(status, 503);
            assert!(body.contains("maintenance"));
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[tokio::test]
async fn undecodable_body_is_a_transport_error() {
    let (url, _request) = serve_once("200 OK", "<html>login</html>").await;
    let err = client(url).fetch_page(&query().page(0)).await.unwrap_err();
    assert_eq!(err.kind(), FailureKind::Transport);
}

#[tokio::test]
async fn refused_connection_is_a_transport_error() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let err = client(format!("http://{addr}/api"))
        .fetch_page(&query().page(0))
        .await
        .unwrap_err();
    assert!(matches!(err, FetchError::Transport(_)));
}
