//! HTTP client tests against a local stand-in server
//!
//! Each test binds an axum router on 127.0.0.1:0 that answers like the
//! CoinGecko, alternative.me, Bluesky and Twitter endpoints.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use anyhow::Result;
use axum::extract::{Query, State};
use axum::http::{header, HeaderMap, StatusCode};
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};
use libsatcast::config::{BlueskyConfig, MarketConfig};
use libsatcast::error::{PlatformError, SatcastError};
use libsatcast::images::{HttpImageSource, ImageSource};
use libsatcast::market::{MarketData, MarketDataClient};
use libsatcast::platforms::bluesky::BlueskyPlatform;
use libsatcast::platforms::twitter::TwitterPlatform;
use libsatcast::platforms::Platform;
use libsatcast::types::{ImageMimeType, MediaItem};
use libsatcast::{PostRequest, PostingClient, PostingSettings};
use serde_json::{json, Value};

const TIMEOUT: Duration = Duration::from_secs(5);

async fn serve(router: Router) -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });
    format!("http://{}", addr)
}

fn market_config(base: &str, fear_greed_path: &str) -> MarketConfig {
    MarketConfig {
        coin_id: "bitcoin".into(),
        currency: "usd".into(),
        coingecko_url: format!("{}/api/v3", base),
        fear_greed_url: format!("{}{}", base, fear_greed_path),
    }
}

/// Reliability settings shrunk so retries finish quickly on the real clock
fn fast_settings() -> PostingSettings {
    PostingSettings {
        min_interval: Duration::ZERO,
        base_delay: Duration::from_millis(10),
        rate_limit_delay: Duration::from_millis(10),
        ..PostingSettings::default()
    }
}

async fn market_chart(Query(params): Query<HashMap<String, String>>) -> impl IntoResponse {
    if params.get("vs_currency").map(String::as_str) != Some("usd")
        || params.get("days").map(String::as_str) != Some("1")
        || params.get("precision").map(String::as_str) != Some("2")
    {
        return (StatusCode::BAD_REQUEST, Json(json!({ "error": "bad query" })));
    }
    let prices: Vec<Value> = (0..13)
        .map(|i| json!([1_704_067_200_000i64 + i * 300_000, 40_000.0 + 100.0 * i as f64]))
        .collect();
    (
        StatusCode::OK,
        Json(json!({
            "prices": prices,
            "market_caps": [[1_704_067_200_000i64, 800e9], [1_704_070_800_000i64, 820e9]],
            "total_volumes": [[1_704_067_200_000i64, 20e9], [1_704_070_800_000i64, 15e9]],
        })),
    )
}

fn market_router() -> Router {
    Router::new()
        .route("/api/v3/coins/bitcoin/market_chart", get(market_chart))
        .route(
            "/fng/",
            get(|| async {
                Json(json!({
                    "name": "Fear and Greed Index",
                    "data": [{ "value": "55", "value_classification": "Greed", "timestamp": "1704067200" }]
                }))
            }),
        )
        .route("/fng-empty/", get(|| async { Json(json!({ "data": [] })) }))
        .route(
            "/fng-down/",
            get(|| async { (StatusCode::BAD_GATEWAY, "upstream unavailable") }),
        )
        .route(
            "/image.png",
            get(|| async { ([(header::CONTENT_TYPE, "image/png")], vec![0x89u8, b'P', b'N', b'G']) }),
        )
}

#[tokio::test]
async fn test_market_chart_and_fear_greed() -> Result<()> {
    let base = serve(market_router()).await;
    let client = MarketDataClient::new(&market_config(&base, "/fng/"), TIMEOUT)?;

    let chart = client.market_chart().await?;
    assert_eq!(chart.prices.len(), 13);
    assert_eq!(chart.prices[12][1], 41_200.0);
    assert_eq!(chart.market_caps.len(), 2);

    let reading = client.fear_greed().await?;
    assert_eq!(reading.value, "55");
    assert_eq!(reading.value_classification, "Greed");
    Ok(())
}

#[tokio::test]
async fn test_fear_greed_empty_data_is_validation_error() -> Result<()> {
    let base = serve(market_router()).await;
    let client = MarketDataClient::new(&market_config(&base, "/fng-empty/"), TIMEOUT)?;

    let err = client.fear_greed().await.unwrap_err();
    assert!(matches!(err, SatcastError::Validation(_)));
    assert_eq!(err.status_code(), 400);
    Ok(())
}

#[tokio::test]
async fn test_upstream_failure_is_tagged_with_service() -> Result<()> {
    let base = serve(market_router()).await;
    let client = MarketDataClient::new(&market_config(&base, "/fng-down/"), TIMEOUT)?;

    let err = client.fear_greed().await.unwrap_err();
    match &err {
        SatcastError::Api(api) => {
            assert_eq!(api.service, "Fear & Greed Index");
            assert!(matches!(api.kind, PlatformError::Network(_)));
        }
        other => panic!("Expected ApiError, got {:?}", other),
    }
    assert!(err.to_string().starts_with("Fear & Greed Index API error"));
    Ok(())
}

#[tokio::test]
async fn test_image_source_downloads_with_content_type() -> Result<()> {
    let base = serve(market_router()).await;
    let source = HttpImageSource::new(
        Some(format!("{}/image.png", base)),
        "FEAR_GREED_INDEX_IMAGE_URL",
        TIMEOUT,
    )?;

    let image = source.fetch().await?;
    assert_eq!(image.mime_type, ImageMimeType::Png);
    assert_eq!(image.bytes, vec![0x89, b'P', b'N', b'G']);
    Ok(())
}

/// Stand-in PDS; session `n` gets the access token `jwt-n`
#[derive(Clone, Default)]
struct Xrpc {
    sessions: Arc<AtomicUsize>,
    records: Arc<Mutex<Vec<Value>>>,
    reject_login: bool,
    /// `jwt-1` expires once it has created one record
    expire_first_session: bool,
}

async fn create_session(State(xrpc): State<Xrpc>, Json(body): Json<Value>) -> impl IntoResponse {
    let n = xrpc.sessions.fetch_add(1, Ordering::SeqCst) + 1;
    if xrpc.reject_login || body["password"] != "app-password" {
        return (
            StatusCode::UNAUTHORIZED,
            Json(json!({ "error": "AuthenticationRequired", "message": "Invalid identifier or password" })),
        );
    }
    (
        StatusCode::OK,
        Json(json!({
            "accessJwt": format!("jwt-{}", n),
            "refreshJwt": "refresh-token",
            "handle": body["identifier"],
            "did": "did:plc:satcast",
        })),
    )
}

async fn upload_blob(headers: HeaderMap, body: axum::body::Bytes) -> impl IntoResponse {
    let mime = headers
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
        .to_string();
    Json(json!({
        "blob": {
            "$type": "blob",
            "ref": { "$link": "bafkreiexample" },
            "mimeType": mime,
            "size": body.len(),
        }
    }))
}

async fn create_record(
    State(xrpc): State<Xrpc>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> impl IntoResponse {
    let current = format!("Bearer jwt-{}", xrpc.sessions.load(Ordering::SeqCst));
    let token = headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default();
    let mut records = xrpc.records.lock().unwrap();
    let expired = token != current
        || (xrpc.expire_first_session && token == "Bearer jwt-1" && !records.is_empty());
    if expired {
        return (
            StatusCode::BAD_REQUEST,
            Json(json!({ "error": "ExpiredToken", "message": "Token has expired" })),
        );
    }
    records.push(body);
    (
        StatusCode::OK,
        Json(json!({
            "uri": "at://did:plc:satcast/app.bsky.feed.post/3kxyzabc",
            "cid": "bafyreiexample",
        })),
    )
}

fn xrpc_router(xrpc: Xrpc) -> Router {
    Router::new()
        .route("/xrpc/com.atproto.server.createSession", post(create_session))
        .route("/xrpc/com.atproto.repo.uploadBlob", post(upload_blob))
        .route("/xrpc/com.atproto.repo.createRecord", post(create_record))
        .with_state(xrpc)
}

fn bluesky(base: &str) -> Result<BlueskyPlatform> {
    let config = BlueskyConfig {
        handle: "satcast.bsky.social".into(),
        app_password: "app-password".to_string().into(),
        service_url: base.to_string(),
    };
    Ok(BlueskyPlatform::new(&config, TIMEOUT)?)
}

#[tokio::test]
async fn test_bluesky_post_with_image_and_hashtag() -> Result<()> {
    let xrpc = Xrpc::default();
    let base = serve(xrpc_router(xrpc.clone())).await;
    let client = PostingClient::new(Arc::new(bluesky(&base)?), &fast_settings());

    let request = PostRequest::new("#Bitcoin Fear & Greed Index is 55 - Greed").with_media(
        MediaItem::new(
            vec![0x89, b'P', b'N', b'G'],
            ImageMimeType::Png,
            "Fear & Greed Index is 55 (Greed)",
        ),
    );
    let result = client.post(&request).await;

    assert!(result.success, "post failed: {:?}", result.error);
    let receipt = result.data.unwrap();
    assert_eq!(receipt.id, "3kxyzabc");
    assert_eq!(
        receipt.uri.as_deref(),
        Some("at://did:plc:satcast/app.bsky.feed.post/3kxyzabc")
    );
    assert_eq!(xrpc.sessions.load(Ordering::SeqCst), 1);

    let records = xrpc.records.lock().unwrap();
    assert_eq!(records.len(), 1);
    let body = &records[0];
    assert_eq!(body["repo"], "did:plc:satcast");
    assert_eq!(body["collection"], "app.bsky.feed.post");
    let record = &body["record"];
    assert_eq!(record["text"], "#Bitcoin Fear & Greed Index is 55 - Greed");
    assert_eq!(record["facets"][0]["index"]["byteStart"], 0);
    assert_eq!(record["facets"][0]["index"]["byteEnd"], 8);
    assert_eq!(record["facets"][0]["features"][0]["tag"], "Bitcoin");
    let image = &record["embed"]["images"][0];
    assert_eq!(image["alt"], "Fear & Greed Index is 55 (Greed)");
    assert_eq!(image["image"]["ref"]["$link"], "bafkreiexample");
    assert_eq!(image["image"]["mimeType"], "image/png");
    Ok(())
}

#[tokio::test]
async fn test_bluesky_session_is_reused() -> Result<()> {
    let xrpc = Xrpc::default();
    let base = serve(xrpc_router(xrpc.clone())).await;
    let platform = bluesky(&base)?;

    platform.post("first", &[]).await?;
    platform.post("second", &[]).await?;

    assert_eq!(xrpc.sessions.load(Ordering::SeqCst), 1);
    assert_eq!(xrpc.records.lock().unwrap().len(), 2);
    Ok(())
}

#[tokio::test]
async fn test_bluesky_logs_in_again_after_expired_token() -> Result<()> {
    let xrpc = Xrpc {
        expire_first_session: true,
        ..Xrpc::default()
    };
    let base = serve(xrpc_router(xrpc.clone())).await;
    let client = PostingClient::new(Arc::new(bluesky(&base)?), &fast_settings());

    for text in ["first", "second", "third"] {
        let result = client.post(&PostRequest::new(text)).await;
        assert!(result.success, "{} failed: {:?}", text, result.error);
    }

    assert_eq!(xrpc.sessions.load(Ordering::SeqCst), 2);
    let records = xrpc.records.lock().unwrap();
    let texts: Vec<&str> = records
        .iter()
        .map(|r| r["record"]["text"].as_str().unwrap())
        .collect();
    assert_eq!(texts, ["first", "second", "third"]);
    Ok(())
}

#[tokio::test]
async fn test_bluesky_rejected_login_is_not_retried() -> Result<()> {
    let xrpc = Xrpc {
        reject_login: true,
        ..Xrpc::default()
    };
    let base = serve(xrpc_router(xrpc.clone())).await;
    let client = PostingClient::new(Arc::new(bluesky(&base)?), &fast_settings());

    let result = client.post(&PostRequest::new("#Bitcoin")).await;

    assert!(!result.success);
    assert_eq!(result.is_rate_limited, Some(false));
    assert!(result
        .error
        .as_deref()
        .unwrap()
        .contains("Invalid identifier or password"));
    assert_eq!(xrpc.sessions.load(Ordering::SeqCst), 1);
    Ok(())
}

#[tokio::test]
async fn test_twitter_rate_limits_trip_the_breaker() -> Result<()> {
    let calls = Arc::new(AtomicUsize::new(0));
    let counter = calls.clone();
    let router = Router::new().route(
        "/2/tweets",
        post(move || {
            let counter = counter.clone();
            async move {
                counter.fetch_add(1, Ordering::SeqCst);
                (
                    StatusCode::TOO_MANY_REQUESTS,
                    Json(json!({ "title": "Too Many Requests", "detail": "Too Many Requests" })),
                )
            }
        }),
    );
    let base = serve(router).await;
    let platform = TwitterPlatform::new(&base, "user-token".to_string().into(), TIMEOUT)?;
    let client = PostingClient::new(Arc::new(platform), &fast_settings());

    let first = client.post(&PostRequest::new("#Bitcoin")).await;
    assert!(!first.success);
    assert_eq!(first.is_rate_limited, Some(true));
    assert_eq!(calls.load(Ordering::SeqCst), 3);
    assert!(client.breaker().is_open());

    let second = client.post(&PostRequest::new("#Bitcoin")).await;
    assert!(!second.success);
    assert!(second.error.as_deref().unwrap().contains("Circuit breaker open"));
    assert_eq!(calls.load(Ordering::SeqCst), 3);
    Ok(())
}

#[tokio::test]
async fn test_twitter_post_returns_tweet_id() -> Result<()> {
    let bodies = Arc::new(Mutex::new(Vec::<Value>::new()));
    let seen = bodies.clone();
    let router = Router::new().route(
        "/2/tweets",
        post(move |headers: HeaderMap, Json(body): Json<Value>| {
            let seen = seen.clone();
            async move {
                assert_eq!(
                    headers.get(header::AUTHORIZATION).and_then(|v| v.to_str().ok()),
                    Some("Bearer user-token")
                );
                seen.lock().unwrap().push(body);
                (
                    StatusCode::CREATED,
                    Json(json!({ "data": { "id": "1745000000000000000", "text": "#Bitcoin" } })),
                )
            }
        }),
    );
    let base = serve(router).await;
    let platform = TwitterPlatform::new(&base, "user-token".to_string().into(), TIMEOUT)?;

    let receipt = platform.post("#Bitcoin", &[]).await?;

    assert_eq!(receipt.id, "1745000000000000000");
    assert_eq!(
        receipt.uri.as_deref(),
        Some("https://x.com/i/web/status/1745000000000000000")
    );
    let bodies = bodies.lock().unwrap();
    assert_eq!(bodies[0]["text"], "#Bitcoin");
    assert!(bodies[0].get("media").is_none());
    Ok(())
}
