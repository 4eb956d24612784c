//! Tiled-texture generator (`tex`): serves repeats of a grayscale tile
//! decoded once at startup from an embedded PNG.
//!
//! The shared cache holds enough whole-tile repeats (plus one spare) to
//! cover the largest request seen; a per-request offset rotates where in the
//! tile each response starts.

use super::{GenParams, Generator, Whence};
use crate::blockio::resolve_seek;
use crate::cache::{GrowCache, TileCache};
use crate::error::SeekError;
use async_trait::async_trait;
use std::sync::Arc;

static TEXTURE_PNG: &[u8] = include_bytes!("../../assets/texture.png");

/// Decode the embedded texture into a flat grayscale tile. Returns `None`
/// (and logs) when the resource fails to decode; the caller then leaves the
/// `tex` generator unregistered instead of failing startup.
pub fn decode_tile() -> Option<Vec<u8>> {
    match image::load_from_memory(TEXTURE_PNG) {
        Ok(img) => Some(img.to_luma8().into_raw()),
        Err(err) => {
            tracing::warn!("embedded texture failed to decode, tex generator disabled: {err}");
            None
        }
    }
}

pub struct TextureGenerator {
    pos: u64,
    size: u64,
    tile_len: u64,
    /// Rotation applied to every read, fixed per request from the random
    /// seed.
    offset: u64,
    cache: Arc<TileCache>,
}

impl TextureGenerator {
    pub fn new(cache: Arc<TileCache>, params: &GenParams) -> Self {
        let tile_len = cache.tile_len() as u64;
        TextureGenerator {
            pos: 0,
            size: params.size,
            tile_len,
            offset: (params.rnd as u64) % tile_len,
            cache,
        }
    }
}

#[async_trait]
impl Generator for TextureGenerator {
    fn content_type(&self) -> &str {
        "application/octet-stream"
    }

    fn size(&self) -> u64 {
        self.size
    }

    async fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        let n = (self.size - self.pos).min(buf.len() as u64) as usize;
        if n == 0 {
            return Ok(0);
        }
        let start = ((self.pos + self.offset) % self.tile_len) as usize;
        let snapshot = self.cache.at_least(n);
        buf[..n].copy_from_slice(&snapshot[start..start + n]);
        self.pos += n as u64;
        Ok(n)
    }

    fn seek(&mut self, offset: i64, whence: Whence) -> Result<u64, SeekError> {
        self.pos = resolve_seek(offset, whence, self.pos, self.size)?;
        Ok(self.pos)
    }
}
