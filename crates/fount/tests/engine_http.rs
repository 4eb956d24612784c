//! End-to-end tests: a real listener, real HTTP, directive-driven bodies.

use fount::config::Config;
use fount::registry::Registry;
use fount::server::Server;
use std::time::{Duration, Instant};
use tokio::net::TcpListener;

async fn start_origin() -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let server = Server::new(Config::default(), Registry::builtin()).unwrap();
    tokio::spawn(async move {
        server.serve(listener).await.unwrap();
    });
    format!("http://{addr}")
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn binf_body_is_exact_and_reproducible() {
    let base = start_origin().await;
    let url = format!("{base}/*p.binf*/*sz.4096*/*bs.1024*/*rnd.7*");

    let first = reqwest::get(&url).await.unwrap().bytes().await.unwrap();
    assert_eq!(first.len(), 4096);

    let second = reqwest::get(&url).await.unwrap().bytes().await.unwrap();
    assert_eq!(first, second);

    // A different seed must change the bytes.
    let other = format!("{base}/*p.binf*/*sz.4096*/*bs.1024*/*rnd.8*");
    let third = reqwest::get(&other).await.unwrap().bytes().await.unwrap();
    assert_ne!(first, third);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn range_request_matches_full_body_slice() {
    let base = start_origin().await;
    let url = format!("{base}/*p.binf*/*sz.4096*/*rnd.3*");

    let full = reqwest::get(&url).await.unwrap().bytes().await.unwrap();

    let client = reqwest::Client::new();
    let response = client
        .get(&url)
        .header("Range", "bytes=100-199")
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), reqwest::StatusCode::PARTIAL_CONTENT);
    assert_eq!(
        response.headers()["content-range"].to_str().unwrap(),
        "bytes 100-199/4096"
    );
    let part = response.bytes().await.unwrap();
    assert_eq!(&part[..], &full[100..200]);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn delay_forwarder_throttles_reads_after_the_first() {
    let base = start_origin().await;
    // 256 KiB streams as four 64 KiB frames; with f=delay.100ms the three
    // reads after the first must each wait.
    let url = format!("{base}/*p.binf*/*s.256k*/*f.delay.100ms*");

    let start = Instant::now();
    let body = reqwest::get(&url).await.unwrap().bytes().await.unwrap();
    let elapsed = start.elapsed();

    assert_eq!(body.len(), 256 * 1024);
    assert!(elapsed >= Duration::from_millis(300), "elapsed {elapsed:?}");
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn posevt_close_cuts_stream_at_exact_byte() {
    let base = start_origin().await;
    let url = format!("{base}/*p.binf*/*sz.2000*/*f.posevt.500.close*");

    let mut response = reqwest::get(&url).await.unwrap();
    let mut received = 0usize;
    loop {
        match response.chunk().await {
            Ok(Some(chunk)) => received += chunk.len(),
            // Either a clean end or a cut connection; the byte count is
            // what matters.
            Ok(None) | Err(_) => break,
        }
    }
    assert_eq!(received, 500);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn conditional_get_via_synthesized_etag() {
    let base = start_origin().await;
    let url = format!("{base}/*sz.64*/*lm.1000*/*etag*");

    let response = reqwest::get(&url).await.unwrap();
    let etag = response.headers()["etag"].to_str().unwrap().to_string();
    assert_eq!(response.bytes().await.unwrap().len(), 64);

    let client = reqwest::Client::new();
    let response = client
        .get(&url)
        .header("If-None-Match", &etag)
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), reqwest::StatusCode::NOT_MODIFIED);
    assert!(response.bytes().await.unwrap().is_empty());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn status_code_directive_aborts_early() {
    let base = start_origin().await;
    let url = format!("{base}/*sc.404*/*sz.1024*");
    let response = reqwest::get(&url).await.unwrap();
    assert_eq!(response.status(), reqwest::StatusCode::NOT_FOUND);
    assert!(response.bytes().await.unwrap().is_empty());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn directives_arrive_via_header_and_query() {
    let base = start_origin().await;
    let client = reqwest::Client::new();

    let response = client
        .get(format!("{base}/anything"))
        .header("fount-directive", "*sz.128*, *p.gen3s*")
        .send()
        .await
        .unwrap();
    let body = response.bytes().await.unwrap();
    assert_eq!(body.len(), 128);
    assert!(body.iter().all(|&b| b == b'3'));

    let response = client
        .get(format!("{base}/x?*sz.32*&*p.txt*"))
        .send()
        .await
        .unwrap();
    assert_eq!(response.bytes().await.unwrap().len(), 32);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn raw_direct_handler_owns_the_response() {
    let base = start_origin().await;
    let url = format!("{base}/*h.raw*/*pl.hello*");
    let response = reqwest::get(&url).await.unwrap();
    assert_eq!(response.headers()["connection"], "close");
    assert_eq!(&response.bytes().await.unwrap()[..], b"hello");
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn checksum_request_announces_trailer() {
    let base = start_origin().await;
    let url = format!("{base}/*sz.100*/*cksum_req*");
    let response = reqwest::get(&url).await.unwrap();
    assert_eq!(response.headers()["trailer"], "fount-checksum");
    assert!(response.headers().get("content-length").is_none());
    assert_eq!(response.bytes().await.unwrap().len(), 100);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn text_stamp_is_stable_across_requests() {
    let base = start_origin().await;
    let url = format!("{base}/*sz.96*/*lm.42*");
    let a = reqwest::get(&url).await.unwrap().bytes().await.unwrap();
    let b = reqwest::get(&url).await.unwrap().bytes().await.unwrap();
    assert_eq!(a, b);
    let text = std::str::from_utf8(&a).unwrap();
    assert!(text.starts_with(&format!("{:031}\n", 42)));
}
