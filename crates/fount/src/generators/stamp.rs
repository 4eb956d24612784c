//! Stamp generators: block content derived from the block index and the
//! request's timestamp/random seeds.
//!
//! With a zero random seed the content is a pure function of
//! `block index + timestamp seed`, stable across process restarts. With a
//! nonzero seed each block value is an order-sensitive 64-bit hash over
//! `(block index, timestamp seed, random seed)`.

use super::{GenParams, Generator, Whence};
use crate::blockio::{fill_blocks, resolve_seek};
use crate::error::SeekError;
use async_trait::async_trait;

/// Text blocks are a zero-padded decimal plus newline; binary blocks are the
/// little-endian bytes of the value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StampKind {
    Text,
    Binary,
}

const TEXT_BLOCK: u64 = 32;
const BINARY_BLOCK: u64 = 8;
// Digits in a text block, leaving one byte for the trailing newline.
const TEXT_DIGITS: usize = 31;
// Keeps the hashed value's decimal rendering inside the digit field.
const TEXT_HASH_MASK: u64 = (1 << 63) - 1;

const FNV_OFFSET: u64 = 0xcbf2_9ce4_8422_2325;
const FNV_PRIME: u64 = 0x0000_0100_0000_01b3;

/// FNV-1a over the little-endian bytes of each field, in order. Order
/// sensitivity is load-bearing: swapping seeds must change the stream.
fn stamp_hash(index: u64, ts_seed: i64, rnd_seed: i64) -> u64 {
    let mut h = FNV_OFFSET;
    for field in [index, ts_seed as u64, rnd_seed as u64] {
        for byte in field.to_le_bytes() {
            h ^= byte as u64;
            h = h.wrapping_mul(FNV_PRIME);
        }
    }
    h
}

pub struct StampGenerator {
    kind: StampKind,
    pos: u64,
    size: u64,
    ts_seed: i64,
    rnd_seed: i64,
}

impl StampGenerator {
    pub fn new(kind: StampKind, params: &GenParams) -> Self {
        StampGenerator {
            kind,
            pos: 0,
            size: params.size,
            ts_seed: params.lm,
            rnd_seed: params.rnd,
        }
    }

    fn block_len(&self) -> u64 {
        match self.kind {
            StampKind::Text => TEXT_BLOCK,
            StampKind::Binary => BINARY_BLOCK,
        }
    }

    fn block_value(kind: StampKind, index: u64, ts: i64, rnd: i64) -> u64 {
        if rnd == 0 {
            index.wrapping_add(ts as u64)
        } else {
            let h = stamp_hash(index, ts, rnd);
            match kind {
                StampKind::Text => h & TEXT_HASH_MASK,
                StampKind::Binary => h,
            }
        }
    }

    fn block_content(kind: StampKind, index: u64, ts: i64, rnd: i64) -> Vec<u8> {
        let value = Self::block_value(kind, index, ts, rnd);
        match kind {
            StampKind::Text => format!("{value:0width$}\n", width = TEXT_DIGITS).into_bytes(),
            StampKind::Binary => value.to_le_bytes().to_vec(),
        }
    }
}

#[async_trait]
impl Generator for StampGenerator {
    fn content_type(&self) -> &str {
        match self.kind {
            StampKind::Text => "text/plain",
            StampKind::Binary => "application/octet-stream",
        }
    }

    fn size(&self) -> u64 {
        self.size
    }

    async fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        let (kind, ts, rnd) = (self.kind, self.ts_seed, self.rnd_seed);
        let n = fill_blocks(buf, self.pos, self.size, self.block_len(), |idx| {
            Self::block_content(kind, idx, ts, rnd)
        });
        self.pos += n as u64;
        Ok(n)
    }

    fn seek(&mut self, offset: i64, whence: Whence) -> Result<u64, SeekError> {
        self.pos = resolve_seek(offset, whence, self.pos, self.size)?;
        Ok(self.pos)
    }
}
