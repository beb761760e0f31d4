//! Integration tests for POST /api/convert and session lifecycle over HTTP.

mod common;

use std::time::Duration;

use common::{convert, eventually, fingerprint, TestHarness};

#[tokio::test]
async fn convert_returns_urls_and_manifest_is_placeholder() {
    let (h, addr) = TestHarness::with_server().await;
    let fp = "a".repeat(40);

    let resp = convert(addr, &format!("acestream://{fp}")).await;
    assert_eq!(resp.status(), 200);
    let body: serde_json::Value = resp.json().await.unwrap();
    assert_eq!(body["content_id"], fp.as_str());
    assert_eq!(body["manifest_url"], format!("/api/stream/{fp}/index.m3u8"));
    assert_eq!(
        body["mpegts_url"],
        format!("http://127.0.0.1:6878/ace/getstream?id={fp}")
    );
    assert_eq!(body["proxy_base"], "http://127.0.0.1:6878");
    assert_eq!(body["session"]["state"]["state"], "running");

    let resp = reqwest::get(format!("http://{addr}{}", body["manifest_url"].as_str().unwrap()))
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
    assert_eq!(
        resp.headers().get("content-type").unwrap().to_str().unwrap(),
        "application/vnd.apple.mpegurl"
    );
    assert_eq!(
        resp.headers().get("cache-control").unwrap().to_str().unwrap(),
        "no-cache"
    );
    let text = resp.text().await.unwrap();
    assert!(text.starts_with("#EXTM3U"));
    assert!(!text.contains("#EXTINF"));
    assert!(!text.contains("#EXT-X-ENDLIST"));

    h.ctx.registry.shutdown().await;
}

#[tokio::test]
async fn both_link_forms_reach_the_same_session() {
    let (h, addr) = TestHarness::with_server().await;
    let fp = fingerprint('b');

    let first: serde_json::Value = convert(addr, &format!("acestream://{fp}"))
        .await
        .json()
        .await
        .unwrap();
    let second: serde_json::Value = convert(addr, &fp.as_str().to_uppercase())
        .await
        .json()
        .await
        .unwrap();

    assert_eq!(first["content_id"], second["content_id"]);
    assert_eq!(first["session"]["id"], second["session"]["id"]);
    assert_eq!(h.launches(), 1);

    h.ctx.registry.shutdown().await;
}

#[tokio::test]
async fn invalid_links_are_rejected_before_any_session_work() {
    let (h, addr) = TestHarness::with_server().await;

    for link in ["", "   ", "acestream://xyz", &"g".repeat(40), &"a".repeat(41)] {
        let resp = convert(addr, link).await;
        assert_eq!(resp.status(), 400, "{link:?}");
        let body: serde_json::Value = resp.json().await.unwrap();
        assert!(
            body["code"] == "invalid_fingerprint" || body["code"] == "validation_error",
            "{body}"
        );
    }

    assert_eq!(h.launches(), 0);
    assert!(h.ctx.registry.is_empty());
}

#[tokio::test]
async fn concurrent_converts_start_one_transcoder() {
    let (h, addr) = TestHarness::with_server().await;
    let link = format!("acestream://{}", fingerprint('c'));

    let handles: Vec<_> = (0..12)
        .map(|_| {
            let link = link.clone();
            tokio::spawn(async move {
                let body: serde_json::Value = convert(addr, &link).await.json().await.unwrap();
                body["session"]["id"].as_str().unwrap().to_string()
            })
        })
        .collect();

    let mut ids = Vec::new();
    for handle in handles {
        ids.push(handle.await.unwrap());
    }
    ids.dedup();
    assert_eq!(ids.len(), 1);
    assert_eq!(h.launches(), 1);
    assert_eq!(h.ctx.registry.len(), 1);

    h.ctx.registry.shutdown().await;
}

#[tokio::test]
async fn crashed_transcoder_is_reported_and_unregistered() {
    let (h, addr) = TestHarness::with_script("echo 'Invalid data found when processing input' >&2; exit 3")
        .serve()
        .await;
    let fp = fingerprint('d');

    let resp = convert(addr, fp.as_str()).await;
    assert_eq!(resp.status(), 200);

    let url = format!("http://{addr}/api/sessions/{fp}");
    let failed = eventually(Duration::from_secs(5), || {
        let url = url.clone();
        async move {
            let body: serde_json::Value = reqwest::get(&url).await.unwrap().json().await.unwrap();
            body["state"]["state"] == "failed"
        }
    })
    .await;
    assert!(failed);

    let body: serde_json::Value = reqwest::get(&url).await.unwrap().json().await.unwrap();
    assert_eq!(body["state"]["reason"]["kind"], "process_crashed");
    assert_eq!(body["state"]["reason"]["code"], 3);
    assert_eq!(
        body["diagnostics"][0],
        "Invalid data found when processing input"
    );
    assert!(body["ended_at"].is_string());

    assert!(h.ctx.registry.get(&fp).is_none());
    let live: serde_json::Value = reqwest::get(format!("http://{addr}/api/sessions"))
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(live.as_array().unwrap().len(), 0);
}

#[tokio::test]
async fn convert_after_exit_starts_a_new_transcoder() {
    let (h, addr) = TestHarness::with_script("exit 0").serve().await;
    let fp = fingerprint('e');

    let first: serde_json::Value = convert(addr, fp.as_str()).await.json().await.unwrap();
    let ended = eventually(Duration::from_secs(5), || {
        let registry = h.ctx.registry.clone();
        let fp = fp.clone();
        async move { registry.get(&fp).is_none() && registry.last_exit(&fp).is_some() }
    })
    .await;
    assert!(ended);

    let second: serde_json::Value = convert(addr, fp.as_str()).await.json().await.unwrap();
    assert_ne!(first["session"]["id"], second["session"]["id"]);
    assert_eq!(h.launches(), 2);
}

#[tokio::test]
async fn spawn_failure_is_retryable_502() {
    let (h, addr) = TestHarness::with_missing_transcoder().serve().await;
    let fp = fingerprint('f');

    for attempt in 1..=2 {
        let resp = convert(addr, fp.as_str()).await;
        assert_eq!(resp.status(), 502);
        let body: serde_json::Value = resp.json().await.unwrap();
        assert_eq!(body["code"], "tool_error");
        assert_eq!(h.launches(), attempt);
    }
    assert!(h.ctx.registry.is_empty());

    let snapshot: serde_json::Value = reqwest::get(format!("http://{addr}/api/sessions/{fp}"))
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(snapshot["state"]["reason"]["kind"], "spawn_failure");
}

#[tokio::test]
async fn delete_stops_the_session() {
    let (h, addr) = TestHarness::with_server().await;
    let fp = fingerprint('1');
    convert(addr, fp.as_str()).await;
    assert!(h.ctx.registry.get(&fp).is_some());

    let client = reqwest::Client::new();
    let resp = client
        .delete(format!("http://{addr}/api/sessions/{fp}"))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
    let body: serde_json::Value = resp.json().await.unwrap();
    assert_eq!(body["state"]["state"], "exited");
    assert!(h.ctx.registry.get(&fp).is_none());

    let resp = client
        .delete(format!("http://{addr}/api/sessions/{fp}"))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 404);
}

#[tokio::test]
async fn convert_after_shutdown_is_unavailable() {
    let (h, addr) = TestHarness::with_server().await;
    h.ctx.registry.shutdown().await;

    let resp = convert(addr, fingerprint('2').as_str()).await;
    assert_eq!(resp.status(), 503);
}
