//! Forwarders: decorators wrapping one inner generator to alter timing or
//! inject a mid-stream fault. Content type and size pass through untouched;
//! at most one forwarder is attached per request.

pub mod delay;
pub mod posevt;

pub use delay::DelayForwarder;
pub use posevt::PosEventForwarder;

use crate::directive::DirectiveMap;
use crate::generators::Generator;
use crate::serve::ByteRange;
use hyper::http::HeaderMap;
use hyper::StatusCode;

/// What a forwarder constructor produced. A constructor may refuse to wrap
/// (pass-through) or terminate the pipeline with an immediate status.
pub enum Wrapped {
    Stream(Box<dyn Generator>),
    Abort(StatusCode),
}

/// Construction context handed to forwarder constructors.
pub struct ForwardContext<'a> {
    pub directives: &'a mut DirectiveMap,
    /// First requested byte range of the inbound request, if any.
    pub range: Option<ByteRange>,
    /// Caller-supplied random seed (`rnd`).
    pub rnd: i64,
    /// Response headers being assembled; `posevt etags` writes here.
    pub response_headers: &'a mut HeaderMap,
}
