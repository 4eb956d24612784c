//! Seekable synthetic byte-stream producers.
//!
//! Every generator owns a cursor and a fixed size decided at construction,
//! reports a content type, and is exclusively owned by one request. Content
//! is a pure function of position and the construction-time seeds, so
//! identical requests reproduce identical bytes.

mod binf;
mod fill;
mod stamp;
mod texture;

pub use binf::BinfGenerator;
pub use fill::FillGenerator;
pub use stamp::{StampGenerator, StampKind};
pub use texture::{decode_tile, TextureGenerator};

use crate::directive::DirectiveMap;
use crate::error::SeekError;
use async_trait::async_trait;

pub use crate::blockio::Whence;

/// The per-request seekable byte stream handed to the HTTP serving layer.
///
/// `read` fills at most `size - pos` bytes and returns 0 at end of stream.
/// `seek` follows [`crate::blockio::resolve_seek`]; seeking before the start
/// is the one surfaced error and must leave the cursor unchanged.
#[async_trait]
pub trait Generator: Send {
    fn content_type(&self) -> &str;
    fn size(&self) -> u64;
    async fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize>;
    fn seek(&mut self, offset: i64, whence: Whence) -> Result<u64, SeekError>;
}

/// Construction parameters resolved by the header pre-pass, shared by every
/// generator constructor.
pub struct GenParams<'a> {
    /// Total object size in bytes (`sz`).
    pub size: u64,
    /// Last-modified epoch seconds (`lm`), the timestamp seed.
    pub lm: i64,
    /// Caller-supplied random seed (`rnd`).
    pub rnd: i64,
    /// The directive map, for generator-specific keys such as `bs`.
    pub directives: &'a DirectiveMap,
}
