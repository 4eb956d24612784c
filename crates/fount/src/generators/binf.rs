//! Fast binary generator: each aligned block is an independent xorshift128+
//! stream reseeded from the block number and the request's random seed, so
//! any byte of the object can be produced without generating its
//! predecessors.

use super::{GenParams, Generator, Whence};
use crate::blockio::resolve_seek;
use crate::error::SeekError;
use async_trait::async_trait;
use tracing::warn;

const DEFAULT_BLOCK: u64 = 1024;
// Injected into a zero seed pair so the generator never sticks at zero.
const ZERO_SEED_FIXUP: u64 = 0x9e37_79b9_7f4a_7c15;

struct Xorshift128 {
    s0: u64,
    s1: u64,
}

impl Xorshift128 {
    fn seed(a: u64, b: u64) -> Self {
        let (s0, mut s1) = (a, b);
        if s0 == 0 && s1 == 0 {
            s1 = ZERO_SEED_FIXUP;
        }
        Xorshift128 { s0, s1 }
    }

    fn next(&mut self) -> u64 {
        let mut x = self.s0;
        let y = self.s1;
        self.s0 = y;
        x ^= x << 23;
        self.s1 = x ^ y ^ (x >> 17) ^ (y >> 26);
        self.s1.wrapping_add(y)
    }
}

pub struct BinfGenerator {
    pos: u64,
    size: u64,
    block_len: u64,
    rnd: i64,
}

impl BinfGenerator {
    pub fn new(params: &GenParams) -> Self {
        let block_len = match params.directives.get_i64("bs") {
            None => DEFAULT_BLOCK,
            Some(v) if v > 0 && v % 8 == 0 => v as u64,
            Some(v) => {
                warn!("bs directive {v} is not a positive multiple of 8, using {DEFAULT_BLOCK}");
                DEFAULT_BLOCK
            }
        };
        BinfGenerator {
            pos: 0,
            size: params.size,
            block_len,
            rnd: params.rnd,
        }
    }

    /// Fill `out` with the bytes of the object starting at absolute `pos`.
    /// For a mid-block start the leading generator outputs, and the leading
    /// bytes of a straddled word, are produced and discarded.
    fn produce(&self, out: &mut [u8], mut pos: u64) -> usize {
        let avail = (self.size.saturating_sub(pos)).min(out.len() as u64) as usize;
        let mut written = 0usize;
        while written < avail {
            let block = pos / self.block_len;
            let in_off = pos % self.block_len;
            let mut rng = Xorshift128::seed(block.wrapping_add(self.rnd as u64), self.block_len);
            for _ in 0..in_off / 8 {
                rng.next();
            }
            let mut word_off = (in_off % 8) as usize;
            let take = ((self.block_len - in_off) as usize).min(avail - written);
            let mut produced = 0usize;
            while produced < take {
                let word = rng.next().to_le_bytes();
                let n = (8 - word_off).min(take - produced);
                out[written + produced..written + produced + n]
                    .copy_from_slice(&word[word_off..word_off + n]);
                produced += n;
                word_off = 0;
            }
            written += take;
            pos += take as u64;
        }
        written
    }
}

#[async_trait]
impl Generator for BinfGenerator {
    fn content_type(&self) -> &str {
        "application/octet-stream"
    }

    fn size(&self) -> u64 {
        self.size
    }

    async fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        let n = self.produce(buf, self.pos);
        self.pos += n as u64;
        Ok(n)
    }

    fn seek(&mut self, offset: i64, whence: Whence) -> Result<u64, SeekError> {
        self.pos = resolve_seek(offset, whence, self.pos, self.size)?;
        Ok(self.pos)
    }
}
