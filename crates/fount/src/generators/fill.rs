//! Constant-fill generator (`gen3s`): every byte of the object is the same
//! character, copied out of a shared grow-only cache instead of being
//! re-filled per read.

use super::{GenParams, Generator, Whence};
use crate::blockio::resolve_seek;
use crate::cache::GrowCache;
use crate::error::SeekError;
use async_trait::async_trait;
use std::sync::Arc;

pub struct FillGenerator {
    pos: u64,
    size: u64,
    cache: Arc<dyn GrowCache>,
}

impl FillGenerator {
    pub fn new(cache: Arc<dyn GrowCache>, params: &GenParams) -> Self {
        // Grow once per request to the full object size; reads then only
        // take snapshots.
        cache.at_least(params.size as usize);
        FillGenerator {
            pos: 0,
            size: params.size,
            cache,
        }
    }
}

#[async_trait]
impl Generator for FillGenerator {
    fn content_type(&self) -> &str {
        "text/plain"
    }

    fn size(&self) -> u64 {
        self.size
    }

    async fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        let n = (self.size - self.pos).min(buf.len() as u64) as usize;
        if n == 0 {
            return Ok(0);
        }
        let snapshot = self.cache.at_least(n);
        buf[..n].copy_from_slice(&snapshot[..n]);
        self.pos += n as u64;
        Ok(n)
    }

    fn seek(&mut self, offset: i64, whence: Whence) -> Result<u64, SeekError> {
        self.pos = resolve_seek(offset, whence, self.pos, self.size)?;
        Ok(self.pos)
    }
}
