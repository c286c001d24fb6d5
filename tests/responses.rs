//! Streamed, file and attachment responses through the compiled service.

use std::path::PathBuf;
use std::time::Duration;

use axum::http::{header, StatusCode};

use switchyard::{Context, Router};

mod common;

fn fixture(name: &str, contents: &[u8]) -> PathBuf {
    let dir = std::env::temp_dir().join(format!("switchyard-{}", std::process::id()));
    std::fs::create_dir_all(&dir).unwrap();
    let path = dir.join(name);
    std::fs::write(&path, contents).unwrap();
    path
}

#[tokio::test]
async fn test_stream_lines_with_status() {
    let mut router = Router::new(common::test_config());
    router.global_middleware(Vec::new());
    router.get("/stream", |ctx: Context| async move {
        ctx.response().stream(StatusCode::CREATED, |w| async move {
            for line in ["a", "b", "c"] {
                w.write_str(&format!("{}\n", line));
                w.flush().await?;
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
            Ok::<_, switchyard::Error>(())
        })
    });

    let response = router.test(common::get("/stream")).await;
    assert_eq!(response.status(), StatusCode::CREATED);
    let body = common::body_text(response).await;
    assert_eq!(body.lines().collect::<Vec<_>>(), vec!["a", "b", "c"]);
}

#[tokio::test]
async fn test_stream_carries_pending_headers() {
    let mut router = Router::new(common::test_config());
    router.get("/events", |ctx: Context| async move {
        ctx.response().header("Content-Type", "text/event-stream");
        ctx.response().stream(StatusCode::OK, |w| async move {
            w.write_str("data: hi\n\n");
            Ok(())
        })
    });

    let response = router.test(common::get("/events")).await;
    assert_eq!(response.headers()[header::CONTENT_TYPE], "text/event-stream");
    assert_eq!(common::body_text(response).await, "data: hi\n\n");
}

#[tokio::test]
async fn test_file_served_inline() {
    let path = fixture("page.html", b"<b>hi</b>");
    let mut router = Router::new(common::test_config());
    router.get("/page", move |ctx: Context| {
        let path = path.clone();
        async move { ctx.response().file(path).await }
    });

    let response = router.test(common::get("/page")).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers()[header::CONTENT_TYPE], "text/html; charset=utf-8");
    assert!(response.headers().get(header::CONTENT_DISPOSITION).is_none());
    assert_eq!(common::body_text(response).await, "<b>hi</b>");
}

#[tokio::test]
async fn test_download_sets_attachment_name() {
    let path = fixture("report.bin", b"\x00\x01\x02");
    let mut router = Router::new(common::test_config());
    {
        let path = path.clone();
        router.get("/report", move |ctx: Context| {
            let path = path.clone();
            async move { ctx.response().download(path, "q1 \"final\".csv").await }
        });
    }
    router.get("/resume", move |ctx: Context| {
        let path = path.clone();
        async move { ctx.response().download(path, "résumé.pdf").await }
    });

    let response = router.test(common::get("/report")).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers()[header::CONTENT_TYPE], "application/octet-stream");
    assert_eq!(
        response.headers()[header::CONTENT_DISPOSITION],
        r#"attachment; filename="q1 \"final\".csv""#
    );

    let response = router.test(common::get("/resume")).await;
    assert_eq!(
        response.headers()[header::CONTENT_DISPOSITION],
        "attachment; filename*=UTF-8''r%C3%A9sum%C3%A9.pdf"
    );
}

#[tokio::test]
async fn test_missing_file_is_404() {
    let mut router = Router::new(common::test_config());
    router.get("/missing", |ctx: Context| async move {
        ctx.response().file("/definitely/not/here.txt").await
    });

    let response = router.test(common::get("/missing")).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}
