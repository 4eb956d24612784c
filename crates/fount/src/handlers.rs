//! Direct handlers: terminal responders selected by the `h` directive. A
//! direct handler short-circuits the whole pipeline and owns the response.

use crate::directive::DirectiveMap;
use crate::serve::OriginBody;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use bytes::Bytes;
use http_body_util::{BodyExt, Full};
use hyper::header::{HeaderValue, CONNECTION, CONTENT_LENGTH};
use hyper::Response;
use tracing::debug;

/// `h.raw`: write a fixed payload and close the connection. The payload is
/// the `pl` directive verbatim, or `pl64` base64-decoded; an undecodable
/// `pl64` degrades to an empty body.
pub fn raw_handler(map: &DirectiveMap) -> Response<OriginBody> {
    let payload: Vec<u8> = if let Some(literal) = map.get("pl") {
        literal.as_bytes().to_vec()
    } else if let Some(encoded) = map.get("pl64") {
        BASE64.decode(encoded).unwrap_or_else(|err| {
            debug!("undecodable pl64 payload: {err}");
            Vec::new()
        })
    } else {
        Vec::new()
    };

    let len = payload.len() as u64;
    let mut response = Response::new(Full::new(Bytes::from(payload)).boxed());
    response
        .headers_mut()
        .insert(CONNECTION, HeaderValue::from_static("close"));
    response
        .headers_mut()
        .insert(CONTENT_LENGTH, HeaderValue::from(len));
    response
}
