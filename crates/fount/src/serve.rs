//! Serves an assembled generator over HTTP: conditional GET, single byte
//! ranges, and a streamed body produced by a per-request task.
//!
//! The engine itself never implements HTTP conditional semantics; this layer
//! is the boundary between the content engine and hyper.

use crate::generators::{Generator, Whence};
use bytes::Bytes;
use chrono::{DateTime, TimeZone, Utc};
use http_body_util::combinators::BoxBody;
use http_body_util::{BodyExt, Full};
use hyper::body::{Body, Frame};
use hyper::header::{
    HeaderValue, ACCEPT_RANGES, CONTENT_LENGTH, CONTENT_RANGE, CONTENT_TYPE, ETAG,
    IF_MODIFIED_SINCE, IF_NONE_MATCH, LAST_MODIFIED, RANGE, TRAILER,
};
use hyper::http::HeaderMap;
use hyper::{Method, Response, StatusCode};
use std::convert::Infallible;
use std::pin::Pin;
use std::task::{Context, Poll};
use tokio::sync::mpsc;
use tracing::debug;

/// Unified response body type for the whole server.
pub type OriginBody = BoxBody<Bytes, Infallible>;

/// Bytes sent per streamed frame.
const FRAME_SIZE: usize = 64 * 1024;
/// In-flight frames before the producer task blocks on the connection.
const FRAME_BACKLOG: usize = 4;

/// Trailer carrying the FNV-1a64 checksum of the bytes actually sent.
pub const CHECKSUM_TRAILER: &str = "fount-checksum";

/// A half-open `[begin, end)` byte interval resolved against the total size.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ByteRange {
    pub begin: u64,
    pub end: u64,
}

impl ByteRange {
    pub fn len(&self) -> u64 {
        self.end - self.begin
    }

    pub fn is_empty(&self) -> bool {
        self.end <= self.begin
    }
}

/// Parse the first range of a `Range` header against `size`. Returns `None`
/// for malformed, non-`bytes`, empty, or unsatisfiable ranges; callers
/// degrade to full-object behavior.
pub fn first_range(value: &str, size: u64) -> Option<ByteRange> {
    let spec = value.trim().strip_prefix("bytes=")?;
    let first = spec.split(',').next()?.trim();
    let (start, end) = first.split_once('-')?;
    let range = if start.is_empty() {
        // Suffix form: last n bytes.
        let n: u64 = end.parse().ok()?;
        if n == 0 {
            return None;
        }
        ByteRange {
            begin: size.saturating_sub(n),
            end: size,
        }
    } else {
        let begin: u64 = start.parse().ok()?;
        let end = match end {
            "" => size,
            e => e.parse::<u64>().ok()?.saturating_add(1).min(size),
        };
        ByteRange { begin, end }
    };
    if range.begin >= size || range.is_empty() {
        return None;
    }
    Some(range)
}

fn is_multi_range(value: &str) -> bool {
    value.contains(',')
}

/// Render an epoch-seconds timestamp as an RFC 7231 HTTP date.
pub fn http_date(epoch: i64) -> Option<String> {
    let dt = Utc.timestamp_opt(epoch, 0).single()?;
    Some(dt.format("%a, %d %b %Y %H:%M:%S GMT").to_string())
}

fn parse_http_date(value: &str) -> Option<i64> {
    DateTime::parse_from_rfc2822(value)
        .ok()
        .map(|dt| dt.timestamp())
}

/// Everything the pipeline resolved ahead of body production.
pub struct ServeParams {
    /// Last-modified epoch seconds; 0 means unset.
    pub last_modified: i64,
    /// Pre-pass response headers (ETag, Cache-Control, hdr/hdr64 output).
    pub headers: HeaderMap,
    /// Emit the body checksum as a trailer (`cksum_req`).
    pub checksum: bool,
}

/// Serve a generator with conditional-GET and single-range support.
pub fn serve_content(
    method: &Method,
    req_headers: &HeaderMap,
    mut generator: Box<dyn Generator>,
    params: ServeParams,
) -> Response<OriginBody> {
    let size = generator.size();
    let content_type = generator.content_type().to_string();

    if let Some(status) = not_modified(req_headers, &params) {
        let mut response = Response::builder()
            .status(status)
            .body(Full::new(Bytes::new()).boxed())
            .unwrap();
        response.headers_mut().extend(params.headers.clone());
        response.headers_mut().remove(CONTENT_LENGTH);
        return response;
    }

    // Resolve the requested slice. Multipart ranges are not implemented and
    // fall back to the full object.
    let mut status = StatusCode::OK;
    let mut range = ByteRange {
        begin: 0,
        end: size,
    };
    if let Some(value) = req_headers.get(RANGE).and_then(|v| v.to_str().ok()) {
        if !is_multi_range(value) {
            match first_range(value, size) {
                Some(r) => {
                    status = StatusCode::PARTIAL_CONTENT;
                    range = r;
                }
                None => {
                    return range_not_satisfiable(size, &params);
                }
            }
        }
    }

    if range.begin > 0 {
        // Seeks to in-range offsets cannot fail.
        if let Err(err) = generator.seek(range.begin as i64, Whence::Start) {
            debug!("range seek failed: {err}");
            return range_not_satisfiable(size, &params);
        }
    }

    let mut builder = Response::builder().status(status);
    let headers = builder.headers_mut().unwrap();
    headers.extend(params.headers.clone());
    if let Ok(ct) = HeaderValue::from_str(&content_type) {
        headers.insert(CONTENT_TYPE, ct);
    }
    headers.insert(ACCEPT_RANGES, HeaderValue::from_static("bytes"));
    if params.last_modified > 0 {
        if let Some(date) = http_date(params.last_modified) {
            if let Ok(value) = HeaderValue::from_str(&date) {
                headers.insert(LAST_MODIFIED, value);
            }
        }
    }
    if status == StatusCode::PARTIAL_CONTENT {
        let value = format!("bytes {}-{}/{}", range.begin, range.end - 1, size);
        headers.insert(CONTENT_RANGE, HeaderValue::from_str(&value).unwrap());
    }
    if params.checksum {
        // Trailers need chunked transfer, so no Content-Length here.
        headers.insert(TRAILER, HeaderValue::from_static(CHECKSUM_TRAILER));
    } else {
        headers.insert(CONTENT_LENGTH, HeaderValue::from(range.len()));
    }

    if method == Method::HEAD {
        return builder.body(Full::new(Bytes::new()).boxed()).unwrap();
    }

    let body = stream_body(generator, range.len(), params.checksum);
    builder.body(body).unwrap()
}

/// Conditional-GET check: `If-None-Match` against the prepared ETag wins
/// over `If-Modified-Since` against `lm`.
fn not_modified(req_headers: &HeaderMap, params: &ServeParams) -> Option<StatusCode> {
    if let Some(inm) = req_headers.get(IF_NONE_MATCH).and_then(|v| v.to_str().ok()) {
        let etag = params.headers.get(ETAG).and_then(|v| v.to_str().ok());
        let matched = inm == "*"
            || etag.is_some_and(|tag| {
                inm.split(',')
                    .any(|candidate| candidate.trim().trim_start_matches("W/") == tag)
            });
        return matched.then_some(StatusCode::NOT_MODIFIED);
    }
    if params.last_modified > 0 {
        if let Some(since) = req_headers
            .get(IF_MODIFIED_SINCE)
            .and_then(|v| v.to_str().ok())
            .and_then(parse_http_date)
        {
            if params.last_modified <= since {
                return Some(StatusCode::NOT_MODIFIED);
            }
        }
    }
    None
}

fn range_not_satisfiable(size: u64, params: &ServeParams) -> Response<OriginBody> {
    let mut response = Response::builder()
        .status(StatusCode::RANGE_NOT_SATISFIABLE)
        .body(Full::new(Bytes::new()).boxed())
        .unwrap();
    response.headers_mut().extend(params.headers.clone());
    let value = format!("bytes */{size}");
    response
        .headers_mut()
        .insert(CONTENT_RANGE, HeaderValue::from_str(&value).unwrap());
    response
}

const FNV_OFFSET: u64 = 0xcbf2_9ce4_8422_2325;
const FNV_PRIME: u64 = 0x0000_0100_0000_01b3;

fn fnv1a_update(mut state: u64, bytes: &[u8]) -> u64 {
    for &b in bytes {
        state ^= b as u64;
        state = state.wrapping_mul(FNV_PRIME);
    }
    state
}

/// Spawn the per-request producer task and wrap its channel as a body.
/// The producer owns the generator, so a delay forwarder blocks only this
/// task; a dropped connection closes the channel and ends it.
fn stream_body(mut generator: Box<dyn Generator>, mut remaining: u64, checksum: bool) -> OriginBody {
    let (tx, rx) = mpsc::channel::<Frame<Bytes>>(FRAME_BACKLOG);
    tokio::spawn(async move {
        let mut hash = FNV_OFFSET;
        while remaining > 0 {
            let want = remaining.min(FRAME_SIZE as u64) as usize;
            let mut buf = vec![0u8; want];
            let n = match generator.read(&mut buf).await {
                Ok(n) => n,
                Err(_) => break,
            };
            if n == 0 {
                break;
            }
            buf.truncate(n);
            if checksum {
                hash = fnv1a_update(hash, &buf);
            }
            remaining -= n as u64;
            if tx.send(Frame::data(Bytes::from(buf))).await.is_err() {
                return;
            }
        }
        if checksum {
            let mut trailers = HeaderMap::new();
            trailers.insert(
                CHECKSUM_TRAILER,
                HeaderValue::from_str(&format!("{hash:016x}")).unwrap(),
            );
            let _ = tx.send(Frame::trailers(trailers)).await;
        }
    });
    ChannelBody { rx }.boxed()
}

/// Body implementation over the producer task's frame channel.
struct ChannelBody {
    rx: mpsc::Receiver<Frame<Bytes>>,
}

impl Body for ChannelBody {
    type Data = Bytes;
    type Error = Infallible;

    fn poll_frame(
        mut self: Pin<&mut Self>,
        cx: &mut Context<'_>,
    ) -> Poll<Option<Result<Frame<Bytes>, Infallible>>> {
        self.rx.poll_recv(cx).map(|frame| frame.map(Ok))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_range_forms() {
        assert_eq!(
            first_range("bytes=0-499", 1000),
            Some(ByteRange { begin: 0, end: 500 })
        );
        assert_eq!(
            first_range("bytes=500-", 1000),
            Some(ByteRange {
                begin: 500,
                end: 1000
            })
        );
        assert_eq!(
            first_range("bytes=-200", 1000),
            Some(ByteRange {
                begin: 800,
                end: 1000
            })
        );
        // End past size clamps.
        assert_eq!(
            first_range("bytes=900-5000", 1000),
            Some(ByteRange {
                begin: 900,
                end: 1000
            })
        );
        // First range of a multi-range spec.
        assert_eq!(
            first_range("bytes=0-1,5-9", 100),
            Some(ByteRange { begin: 0, end: 2 })
        );
    }

    #[test]
    fn bad_ranges_are_rejected() {
        assert_eq!(first_range("bytes=1000-", 1000), None);
        assert_eq!(first_range("bytes=-0", 1000), None);
        assert_eq!(first_range("bytes=junk", 1000), None);
        assert_eq!(first_range("items=0-10", 1000), None);
        assert_eq!(first_range("bytes=5-2", 1000), None);
    }

    #[test]
    fn http_date_round_trip() {
        let date = http_date(784111777).unwrap();
        assert_eq!(date, "Sun, 06 Nov 1994 08:49:37 GMT");
        assert_eq!(parse_http_date(&date), Some(784111777));
    }

    #[test]
    fn conditional_if_none_match_wins() {
        let mut prepared = HeaderMap::new();
        prepared.insert(ETAG, HeaderValue::from_static("\"abc\""));
        let params = ServeParams {
            last_modified: 100,
            headers: prepared,
            checksum: false,
        };

        let mut req = HeaderMap::new();
        req.insert(IF_NONE_MATCH, HeaderValue::from_static("\"abc\""));
        assert_eq!(not_modified(&req, &params), Some(StatusCode::NOT_MODIFIED));

        let mut req = HeaderMap::new();
        req.insert(IF_NONE_MATCH, HeaderValue::from_static("\"other\""));
        // A failed INM does not fall through to IMS.
        req.insert(
            IF_MODIFIED_SINCE,
            HeaderValue::from_str(&http_date(200).unwrap()).unwrap(),
        );
        assert_eq!(not_modified(&req, &params), None);
    }

    #[test]
    fn conditional_if_modified_since() {
        let params = ServeParams {
            last_modified: 1000,
            headers: HeaderMap::new(),
            checksum: false,
        };
        let mut req = HeaderMap::new();
        req.insert(
            IF_MODIFIED_SINCE,
            HeaderValue::from_str(&http_date(1000).unwrap()).unwrap(),
        );
        assert_eq!(not_modified(&req, &params), Some(StatusCode::NOT_MODIFIED));

        let mut req = HeaderMap::new();
        req.insert(
            IF_MODIFIED_SINCE,
            HeaderValue::from_str(&http_date(500).unwrap()).unwrap(),
        );
        assert_eq!(not_modified(&req, &params), None);
    }

    #[test]
    fn fnv_matches_known_vector() {
        // FNV-1a64 of "a" is 0xaf63dc4c8601ec8c.
        assert_eq!(fnv1a_update(FNV_OFFSET, b"a"), 0xaf63_dc4c_8601_ec8c);
    }
}
