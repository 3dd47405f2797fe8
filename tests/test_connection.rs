//! End-to-end request/response cycles over an in-memory duplex stream.

use std::sync::Arc;
use std::time::Duration;

use skiff::config::Config;
use skiff::dispatch::{HandlerGroup, MethodPolicy, Registry, RouteEntry};
use skiff::http::connection::Connection;
use skiff::http::request::Method;
use skiff::http::response::Response;
use skiff::server::ServerContext;
use tokio::io::{AsyncReadExt, AsyncWriteExt, duplex};

fn registry() -> Registry {
    Registry::new()
        .group(HandlerGroup::new("/users").route(
            RouteEntry::new(Method::GET, "", |req, _| {
                Ok(Response::text(format!("id={}", req.parameter("id").unwrap_or("?"))))
            }),
        ))
        .group(
            HandlerGroup::new("/profile").post("", |req, _| {
                let avatar = req.file("avatar").map(|f| f.filename.clone()).unwrap_or_default();
                Ok(Response::text(format!(
                    "{}:{}",
                    req.attribute("name").unwrap_or("-"),
                    avatar
                )))
            }),
        )
        .group(HandlerGroup::new("/echo").post("", |req, _| {
            Ok(Response::json(req.json().unwrap_or("null").to_string()))
        }))
        .group(HandlerGroup::new("/fail").get("", |_, _| anyhow::bail!("nope")))
}

fn context(policy: MethodPolicy) -> Arc<ServerContext> {
    let mut cfg = Config::default();
    cfg.dispatch.method_policy = policy;
    cfg.server.read_timeout_secs = 2;
    cfg.static_files.root = std::env::temp_dir().join("skiff-connection-tests-missing");
    Arc::new(ServerContext::new(&cfg, Arc::new(registry())))
}

/// Sends `request`, half-closes, and returns everything the server wrote.
async fn exchange(ctx: Arc<ServerContext>, request: &[u8]) -> String {
    let (mut client, server) = duplex(64 * 1024);

    let task = tokio::spawn(async move {
        let mut conn = Connection::new(server, ctx);
        let _ = conn.run().await;
    });

    client.write_all(request).await.unwrap();
    client.shutdown().await.unwrap();

    let mut out = Vec::new();
    client.read_to_end(&mut out).await.unwrap();
    task.await.unwrap();

    String::from_utf8_lossy(&out).into_owned()
}

fn status_line(response: &str) -> &str {
    response.lines().next().unwrap_or("")
}

fn body(response: &str) -> &str {
    response.split_once("\r\n\r\n").map(|(_, b)| b).unwrap_or("")
}

#[tokio::test]
async fn test_get_with_query_dispatches() {
    let out = exchange(
        context(MethodPolicy::ReadOnly),
        b"GET /users?id=7 HTTP/1.1\r\nHost: x\r\n\r\n",
    )
    .await;

    assert_eq!(status_line(&out), "HTTP/1.1 200 OK");
    assert!(out.contains("Connection: close\r\n"));
    assert_eq!(body(&out), "id=7");
}

#[tokio::test]
async fn test_head_sends_no_body() {
    let out = exchange(
        context(MethodPolicy::ReadOnly),
        b"HEAD /users?id=7 HTTP/1.1\r\n\r\n",
    )
    .await;

    assert_eq!(status_line(&out), "HTTP/1.1 200 OK");
    assert!(out.contains("Content-Length: 4\r\n"));
    assert_eq!(body(&out), "");
}

#[tokio::test]
async fn test_unknown_path_is_not_found() {
    let out = exchange(context(MethodPolicy::ReadOnly), b"GET /nothing HTTP/1.1\r\n\r\n").await;

    assert_eq!(status_line(&out), "HTTP/1.1 404 Not Found");
}

#[tokio::test]
async fn test_json_request_not_found_closes_silently() {
    let out = exchange(
        context(MethodPolicy::ReadOnly),
        b"GET /nothing HTTP/1.1\r\nContent-Type: application/json\r\nContent-Length: 2\r\n\r\n{}",
    )
    .await;

    assert_eq!(out, "");
}

#[tokio::test]
async fn test_post_rejected_under_read_only_policy() {
    let out = exchange(
        context(MethodPolicy::ReadOnly),
        b"POST /profile HTTP/1.1\r\nContent-Length: 8\r\n\r\nname=bob",
    )
    .await;

    assert_eq!(status_line(&out), "HTTP/1.1 501 Not Implemented");
}

#[tokio::test]
async fn test_unknown_method_not_implemented() {
    let out = exchange(context(MethodPolicy::AllVerbs), b"BREW /pot HTTP/1.1\r\n\r\n").await;

    assert_eq!(status_line(&out), "HTTP/1.1 501 Not Implemented");
}

#[tokio::test]
async fn test_malformed_request_line_is_bad_request() {
    let out = exchange(context(MethodPolicy::ReadOnly), b"GARBAGE\r\n\r\n").await;

    assert_eq!(status_line(&out), "HTTP/1.1 400 Bad Request");
    assert!(out.contains("Connection: close\r\n"));
}

#[tokio::test]
async fn test_rejected_requests_close_connection() {
    let replies = [
        exchange(context(MethodPolicy::AllVerbs), b"BREW /pot HTTP/1.1\r\n\r\n").await,
        exchange(context(MethodPolicy::ReadOnly), b"GET / HTTP/1.1\r\nBroken\r\n\r\n").await,
    ];

    for out in replies {
        assert!(out.contains("Connection: close\r\n"), "missing header in {:?}", out);
    }
}

#[tokio::test]
async fn test_truncated_head_is_bad_request() {
    let out = exchange(context(MethodPolicy::ReadOnly), b"GET / HTTP/1.1\r\nHost: x").await;

    assert_eq!(status_line(&out), "HTTP/1.1 400 Bad Request");
}

#[tokio::test]
async fn test_empty_connection_writes_nothing() {
    let out = exchange(context(MethodPolicy::ReadOnly), b"").await;

    assert_eq!(out, "");
}

#[tokio::test]
async fn test_multipart_post_end_to_end() {
    let form = "--XYZ\r\n\
Content-Disposition: form-data; name=\"name\"\r\n\r\n\
bob\r\n\
--XYZ\r\n\
Content-Disposition: form-data; name=\"avatar\"; filename=\"a.png\"\r\n\
Content-Type: image/png\r\n\r\n\
P\r\n\
--XYZ--\r\n";
    let request = format!(
        "POST /profile HTTP/1.1\r\nContent-Type: multipart/form-data; boundary=XYZ\r\nContent-Length: {}\r\n\r\n{}",
        form.len(),
        form
    );

    let out = exchange(context(MethodPolicy::AllVerbs), request.as_bytes()).await;

    assert_eq!(status_line(&out), "HTTP/1.1 200 OK");
    assert_eq!(body(&out), "bob:a.png");
}

#[tokio::test]
async fn test_json_body_read_until_close() {
    let out = exchange(
        context(MethodPolicy::AllVerbs),
        b"POST /echo HTTP/1.1\r\nContent-Type: application/json\r\n\r\n{\"a\":1}",
    )
    .await;

    assert_eq!(status_line(&out), "HTTP/1.1 200 OK");
    assert_eq!(body(&out), "{\"a\":1}");
}

#[tokio::test]
async fn test_body_over_limit_rejected() {
    let mut cfg = Config::default();
    cfg.dispatch.method_policy = MethodPolicy::AllVerbs;
    cfg.server.max_body_bytes = 4;
    let ctx = Arc::new(ServerContext::new(&cfg, Arc::new(registry())));

    let out = exchange(ctx, b"POST /echo HTTP/1.1\r\nContent-Length: 10\r\n\r\n0123456789").await;

    assert_eq!(status_line(&out), "HTTP/1.1 413 Payload Too Large");
}

#[tokio::test]
async fn test_handler_error_is_internal_error() {
    let out = exchange(context(MethodPolicy::ReadOnly), b"GET /fail HTTP/1.1\r\n\r\n").await;

    assert_eq!(status_line(&out), "HTTP/1.1 500 Internal Server Error");
}

#[tokio::test]
async fn test_static_prefix_bypasses_dispatcher() {
    let root = std::env::temp_dir().join(format!("skiff-static-{}", std::process::id()));
    std::fs::create_dir_all(&root).unwrap();
    std::fs::write(root.join("site.css"), "body{}").unwrap();

    let mut cfg = Config::default();
    cfg.static_files.root = root.clone();
    let ctx = Arc::new(ServerContext::new(&cfg, Arc::new(registry())));

    let out = exchange(Arc::clone(&ctx), b"GET /resources/site.css HTTP/1.1\r\n\r\n").await;
    assert_eq!(status_line(&out), "HTTP/1.1 200 OK");
    assert!(out.contains("Content-Type: text/css\r\n"));
    assert_eq!(body(&out), "body{}");

    let out = exchange(ctx, b"GET /resources/../secret HTTP/1.1\r\n\r\n").await;
    assert_eq!(status_line(&out), "HTTP/1.1 404 Not Found");

    let _ = std::fs::remove_dir_all(&root);
}

#[tokio::test]
async fn test_silent_peer_times_out() {
    let mut cfg = Config::default();
    cfg.server.read_timeout_secs = 1;
    let ctx = Arc::new(ServerContext::new(&cfg, Arc::new(registry())));

    let (mut client, server) = duplex(1024);
    client.write_all(b"GET / HTTP/1.1\r\n").await.unwrap();

    let mut conn = Connection::new(server, ctx);
    let result = tokio::time::timeout(Duration::from_secs(5), conn.run()).await;

    assert!(matches!(result, Ok(Err(_))));
}
