//! End-to-end tests against a live server instance.

use mock_http_server::{MockServer, ServerConfig};
use tokio::sync::oneshot;

async fn start_server(yaml: &str) -> (String, oneshot::Sender<()>, tokio::task::JoinHandle<()>) {
    let config: ServerConfig = serde_yaml::from_str(yaml).expect("config parses");
    config.validate().expect("config is valid");

    let server = MockServer::new(config, 0);
    let (addr_tx, addr_rx) = oneshot::channel();
    let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();

    let handle = tokio::spawn(async move {
        server
            .start_with_signals(Some(addr_tx), async move {
                let _ = shutdown_rx.await;
            })
            .await
            .expect("server runs");
    });

    let addr = addr_rx.await.expect("server publishes its address");
    (
        format!("http://127.0.0.1:{}", addr.port()),
        shutdown_tx,
        handle,
    )
}

#[tokio::test]
async fn test_serves_scripted_routes_end_to_end() {
    let yaml = r#"
routes:
  - pattern: /hello
    responses:
      - status: 200
        repeat: 1
        body:
          type: literal
          content: Hello
      - status: 202
        body:
          type: literal
          content: second
  - pattern: /json
    responses:
      - status: 201
        is_json: true
        body:
          type: literal
          content: '{"ok":true}'
  - pattern: /echo
    responses:
      - status: 200
        body:
          type: template
          content: "{{method}} {{path}}"
"#;
    let (base, shutdown, handle) = start_server(yaml).await;

    // First answer comes from the repeat-limited entry, the second from
    // the sticky one
    let resp = reqwest::get(format!("{}/hello", base)).await.unwrap();
    assert_eq!(resp.status().as_u16(), 200);
    assert_eq!(resp.text().await.unwrap(), "Hello");

    let resp = reqwest::get(format!("{}/hello", base)).await.unwrap();
    assert_eq!(resp.status().as_u16(), 202);
    assert_eq!(resp.text().await.unwrap(), "second");

    let resp = reqwest::get(format!("{}/json", base)).await.unwrap();
    assert_eq!(resp.status().as_u16(), 201);
    assert_eq!(
        resp.headers().get("content-type").unwrap(),
        "application/json"
    );
    assert_eq!(resp.text().await.unwrap(), r#"{"ok":true}"#);

    let resp = reqwest::get(format!("{}/echo", base)).await.unwrap();
    assert_eq!(resp.text().await.unwrap(), "GET /echo");

    let resp = reqwest::get(format!("{}/nope", base)).await.unwrap();
    assert_eq!(resp.status().as_u16(), 404);
    assert!(resp.text().await.unwrap().is_empty());

    shutdown.send(()).unwrap();
    handle.await.unwrap();
}

#[tokio::test]
async fn test_exhausted_route_answers_like_unknown_route() {
    let yaml = r#"
routes:
  - pattern: /once
    responses:
      - status: 200
        repeat: 1
        body:
          type: literal
          content: only
"#;
    let (base, shutdown, handle) = start_server(yaml).await;

    let resp = reqwest::get(format!("{}/once", base)).await.unwrap();
    assert_eq!(resp.status().as_u16(), 200);
    assert_eq!(resp.text().await.unwrap(), "only");

    let resp = reqwest::get(format!("{}/once", base)).await.unwrap();
    assert_eq!(resp.status().as_u16(), 404);

    shutdown.send(()).unwrap();
    handle.await.unwrap();
}
