//! Per-request pipeline: header pre-pass, generator construction, optional
//! forwarder wrap, hand-off to the serving layer.
//!
//! The dispatch is a straight-line state machine with four terminal states:
//! direct handler, early status abort, forwarder abort, and normal serving.
//! No state repeats; everything lives for exactly one request.

use crate::directive::{DirectiveMap, CC_OVERRIDE_KEY};
use crate::expr;
use crate::forwarders::{ForwardContext, Wrapped};
use crate::generators::GenParams;
use crate::registry::{Registry, DEFAULT_GENERATOR};
use crate::serve::{self, first_range, OriginBody, ServeParams};
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use bytes::Bytes;
use chrono::Utc;
use http_body_util::{BodyExt, Full};
use hyper::header::{HeaderName, HeaderValue, CACHE_CONTROL, ETAG, RANGE};
use hyper::http::HeaderMap;
use hyper::{Method, Response, StatusCode};
use std::time::Duration;
use tracing::debug;

/// Run one request through the engine and produce the response.
pub async fn run(
    method: &Method,
    req_headers: &HeaderMap,
    mut map: DirectiveMap,
    registry: &Registry,
) -> Response<OriginBody> {
    // Terminal state 1: a registered direct handler owns the response.
    if let Some(code) = map.get("h") {
        if let Some(handler) = registry.handler(code) {
            debug!("direct handler {code}");
            return handler(&map);
        }
        // Unknown handler codes fall through to the generator pipeline.
    }

    let now = Utc::now().timestamp();
    let rnd = map.get_i64("rnd").unwrap_or(0);
    let mut headers = HeaderMap::new();

    // --- header pre-pass; step order matters ---

    // Last-modified: explicit, quantized from an update interval, or unset.
    let lm = match (map.get_i64("lm"), map.get_i64("ui")) {
        (Some(lm), _) => lm,
        (None, Some(ui)) if ui > 0 => {
            let lm = now / ui * ui;
            let ma = now - lm;
            if let Ok(value) = HeaderValue::from_str(&format!("max-age={ma}")) {
                headers.insert(CACHE_CONTROL, value);
            }
            map.insert("lm", lm.to_string());
            map.insert("ma", ma.to_string());
            lm
        }
        _ => 0,
    };

    // Object size: the `s` expression (or a literal `sz`), seeded so equal
    // requests with equal timestamps agree.
    let size_expr = map.get("s").or_else(|| map.get("sz")).unwrap_or_default();
    let size = expr::eval(size_expr, rnd ^ lm).max(0) as u64;
    map.insert("sz", size.to_string());

    // ETag: empty directive value means "synthesize one for me".
    if let Some(tag) = map.get("etag") {
        let tag = if tag.is_empty() {
            format!("\"{}\"", lm ^ size as i64)
        } else {
            tag.to_string()
        };
        if let Ok(value) = HeaderValue::from_str(&tag) {
            headers.insert(ETAG, value);
        }
    }
    // The dedicated override header hard-sets Cache-Control.
    if let Some(cc) = map.get(CC_OVERRIDE_KEY) {
        if let Ok(value) = HeaderValue::from_str(cc) {
            headers.insert(CACHE_CONTROL, value);
        }
    }

    // One-shot delay before any bytes are produced.
    if let Some(idelay) = map.get("idelay") {
        if let Some(duration) = crate::forwarders::delay::parse_duration(idelay) {
            tokio::time::sleep(duration).await;
        }
    } else if let Some(dly) = map.get("dly") {
        let nanos = expr::eval(dly, rnd ^ now).max(0) as u64;
        tokio::time::sleep(Duration::from_nanos(nanos)).await;
    }

    // Literal and base64 header pairs override everything above.
    if let Some(pairs) = map.get("hdr") {
        apply_header_pairs(&mut headers, pairs);
    }
    if let Some(encoded) = map.get("hdr64") {
        match BASE64.decode(encoded) {
            Ok(decoded) => match String::from_utf8(decoded) {
                Ok(pairs) => apply_header_pairs(&mut headers, &pairs),
                Err(err) => debug!("hdr64 is not utf-8: {err}"),
            },
            Err(err) => debug!("undecodable hdr64: {err}"),
        }
    }

    // Terminal state 2: early status abort, no generator built.
    if let Some(sc) = map.get("sc") {
        let code = expr::eval(sc, rnd ^ now);
        if code != 0 && code != 200 {
            let status = u16::try_from(code)
                .ok()
                .and_then(|c| StatusCode::from_u16(c).ok())
                .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
            debug!("early status abort {status}");
            return status_response(status, headers);
        }
    }

    // Strip the named inbound headers before range/conditional processing.
    let mut req_headers = req_headers.clone();
    if let Some(names) = map.get("rmhdrs") {
        for name in names.split('.') {
            if let Ok(name) = name.parse::<HeaderName>() {
                req_headers.remove(name);
            }
        }
    }

    let checksum = map.contains("cksum_req");

    // Build the generator; unknown codes fall back to the text stamp.
    let gen_code = map.get("p").unwrap_or(DEFAULT_GENERATOR).to_string();
    let params = GenParams {
        size,
        lm,
        rnd,
        directives: &map,
    };
    let Some(ctor) = registry.generator(&gen_code) else {
        // Only possible with a partial registry missing the default.
        return status_response(StatusCode::NOT_FOUND, headers);
    };
    let mut generator = ctor(&params);

    // At most one forwarder; its argument string is stashed under its own
    // code before construction.
    if let Some(f) = map.get("f").map(str::to_string) {
        let (code, arg) = match f.split_once('.') {
            Some((code, arg)) => (code.to_string(), arg.to_string()),
            None => (f, String::new()),
        };
        if let Some(ctor) = registry.forwarder(&code) {
            map.insert(code.clone(), arg);
            let range = req_headers
                .get(RANGE)
                .and_then(|v| v.to_str().ok())
                .and_then(|v| first_range(v, size));
            let mut ctx = ForwardContext {
                directives: &mut map,
                range,
                rnd,
                response_headers: &mut headers,
            };
            match ctor(generator, &mut ctx) {
                Wrapped::Stream(wrapped) => generator = wrapped,
                // Terminal state 3: the forwarder ended the response itself.
                Wrapped::Abort(status) => {
                    debug!("forwarder {code} aborted with {status}");
                    return status_response(status, headers);
                }
            }
        } else {
            debug!("unknown forwarder {code:?}, serving unwrapped");
        }
    }

    // Terminal state 4: the serving layer's conditional/range logic.
    serve::serve_content(
        method,
        &req_headers,
        generator,
        ServeParams {
            last_modified: lm,
            headers,
            checksum,
        },
    )
}

/// Apply alternating `name.value` pairs from a dot-delimited string.
fn apply_header_pairs(headers: &mut HeaderMap, pairs: &str) {
    let mut parts = pairs.split('.');
    while let Some(name) = parts.next() {
        let Some(value) = parts.next() else {
            debug!("dangling header name {name:?} in hdr directive");
            break;
        };
        match (name.parse::<HeaderName>(), HeaderValue::from_str(value)) {
            (Ok(name), Ok(value)) => {
                headers.insert(name, value);
            }
            _ => debug!("unusable header pair {name:?}={value:?}"),
        }
    }
}

fn status_response(status: StatusCode, headers: HeaderMap) -> Response<OriginBody> {
    let mut response = Response::builder()
        .status(status)
        .body(Full::new(Bytes::new()).boxed())
        .unwrap();
    response.headers_mut().extend(headers);
    response
}
