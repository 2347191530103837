use axum::body::{Body, Bytes};
use axum::http::{Request, StatusCode};
use axum::Router;
use blockdex_core::{build_index, BuildConfig, IndexPaths};
use server::ServerOptions;
use http_body_util::BodyExt;
use serde_json::Value;
use std::fs;
use std::path::Path;
use tempfile::tempdir;
use tower::ServiceExt;

fn build_tiny_index(dir: &Path, pages: &[(&str, &str)]) {
    let corpus = dir.join("corpus");
    fs::create_dir_all(&corpus).unwrap();
    for (i, (url, html)) in pages.iter().enumerate() {
        let doc = serde_json::json!({ "url": url, "content": html });
        fs::write(corpus.join(format!("{i:03}.json")), doc.to_string()).unwrap();
    }
    let paths = IndexPaths::new(dir.join("index"));
    build_index(&paths, &corpus, &BuildConfig { block_size: 1, ..Default::default() }).unwrap();
}

async fn call(app: Router, req: Request<Body>) -> (StatusCode, Bytes) {
    let resp = app.oneshot(req).await.unwrap();
    let status = resp.status();
    let body = resp.into_body().collect().await.unwrap().to_bytes();
    (status, body)
}

async fn get(app: Router, uri: &str) -> (StatusCode, Bytes) {
    call(app, Request::get(uri).body(Body::empty()).unwrap()).await
}

const PAGES: &[(&str, &str)] = &[
    ("https://a.example/rust", "<h1>Rust</h1><p>rust systems programming</p>"),
    ("https://a.example/learn", "<p>Learning rust and systems</p>"),
    ("https://a.example/other", "<p>gardening tips</p>"),
];

#[tokio::test]
async fn search_returns_ranked_results_with_urls() {
    let dir = tempdir().unwrap();
    build_tiny_index(dir.path(), PAGES);
    let app = server::build_app(dir.path().join("index")).unwrap();

    let (status, body) = get(app, "/search?q=rust%20systems&k=5").await;
    assert_eq!(status, StatusCode::OK);
    let json: Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(json["total_hits"].as_u64().unwrap(), 2);
    let arr = json["results"].as_array().unwrap();
    assert_eq!(arr.len(), 2);
    let ids: Vec<u64> = arr.iter().map(|r| r["doc_id"].as_u64().unwrap()).collect();
    let mut sorted = ids.clone();
    sorted.sort_unstable();
    assert_eq!(sorted, vec![1, 2]);
    assert!(arr[0]["score"].as_f64().unwrap() >= arr[1]["score"].as_f64().unwrap());
    assert!(arr[0]["url"].as_str().unwrap().starts_with("https://a.example/"));
}

#[tokio::test]
async fn no_match_is_an_empty_ok_response() {
    let dir = tempdir().unwrap();
    build_tiny_index(dir.path(), PAGES);
    let app = server::build_app(dir.path().join("index")).unwrap();

    let (status, body) = get(app, "/search?q=volcano").await;
    assert_eq!(status, StatusCode::OK);
    let json: Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(json["total_hits"].as_u64().unwrap(), 0);
    assert!(json["results"].as_array().unwrap().is_empty());
}

#[tokio::test]
async fn doc_lookup_and_missing_doc() {
    let dir = tempdir().unwrap();
    build_tiny_index(dir.path(), PAGES);
    let app = server::build_app(dir.path().join("index")).unwrap();

    let (status, body) = get(app.clone(), "/doc/3").await;
    assert_eq!(status, StatusCode::OK);
    let json: Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(json["url"], "https://a.example/other");

    let (status, _) = get(app, "/doc/99").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn inconsistent_index_is_not_an_empty_result() {
    let dir = tempdir().unwrap();
    build_tiny_index(dir.path(), PAGES);
    let app = server::build_app(dir.path().join("index")).unwrap();

    // merged index disappears under a running server
    fs::remove_file(IndexPaths::new(dir.path().join("index")).index_file()).unwrap();
    let (status, _) = get(app, "/search?q=rust").await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
}

#[tokio::test]
async fn startup_refuses_missing_index() {
    let dir = tempdir().unwrap();
    assert!(server::build_app(dir.path().join("nothing-here")).is_err());
}

#[tokio::test]
async fn reload_is_disabled_without_a_configured_token() {
    let dir = tempdir().unwrap();
    build_tiny_index(dir.path(), PAGES);
    let app = server::build_app(dir.path().join("index")).unwrap();

    let req = Request::post("/index/reload").header("x-admin-token", "anything").body(Body::empty()).unwrap();
    let (status, _) = call(app, req).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn reload_requires_the_admin_token() {
    let dir = tempdir().unwrap();
    build_tiny_index(dir.path(), PAGES);
    let options = ServerOptions { admin_token: Some("s3cret".into()), ..Default::default() };
    let app = server::build_app_with(dir.path().join("index"), options).unwrap();

    let (status, _) = call(app.clone(), Request::post("/index/reload").body(Body::empty()).unwrap()).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let wrong = Request::post("/index/reload").header("x-admin-token", "nope").body(Body::empty()).unwrap();
    let (status, _) = call(app.clone(), wrong).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let right = Request::post("/index/reload").header("x-admin-token", "s3cret").body(Body::empty()).unwrap();
    let (status, body) = call(app.clone(), right).await;
    assert_eq!(status, StatusCode::OK);
    let json: Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(json["docs"].as_u64().unwrap(), 3);

    // queries still work against the reloaded searcher
    let (status, _) = get(app, "/search?q=rust").await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn restricted_cors_origin_is_echoed() {
    let dir = tempdir().unwrap();
    build_tiny_index(dir.path(), PAGES);
    let options = ServerOptions { allowed_origins: vec!["https://ui.example".into()], ..Default::default() };
    let app = server::build_app_with(dir.path().join("index"), options).unwrap();

    let req = Request::get("/health").header("origin", "https://ui.example").body(Body::empty()).unwrap();
    let resp = app.oneshot(req).await.unwrap();
    assert_eq!(resp.headers()["access-control-allow-origin"], "https://ui.example");
}
