//! Process-wide, grow-only byte caches shared by the `gen3s` and `tex`
//! generators.
//!
//! The lock is held only while growing; published buffers are never mutated
//! in place, so readers take an `Arc` snapshot under the lock and then read
//! lock-free. Tests substitute their own [`GrowCache`] implementations.

use parking_lot::RwLock;
use std::sync::Arc;

/// A capacity-growing byte buffer: `at_least(n)` returns a snapshot holding
/// at least `n` bytes of the cache's content pattern.
pub trait GrowCache: Send + Sync {
    fn at_least(&self, len: usize) -> Arc<Vec<u8>>;
}

/// Grow-only buffer of one repeated byte, sized to the largest single
/// request seen.
pub struct FillCache {
    byte: u8,
    buf: RwLock<Arc<Vec<u8>>>,
}

impl FillCache {
    pub fn new(byte: u8) -> Self {
        FillCache {
            byte,
            buf: RwLock::new(Arc::new(Vec::new())),
        }
    }
}

impl GrowCache for FillCache {
    fn at_least(&self, len: usize) -> Arc<Vec<u8>> {
        {
            let cur = self.buf.read();
            if cur.len() >= len {
                return Arc::clone(&cur);
            }
        }
        let mut cur = self.buf.write();
        if cur.len() < len {
            *cur = Arc::new(vec![self.byte; len]);
        }
        Arc::clone(&cur)
    }
}

/// Grow-only buffer of whole-tile repeats of a fixed pattern, always holding
/// one spare tile so any in-tile start offset can be served contiguously.
pub struct TileCache {
    tile: Vec<u8>,
    buf: RwLock<Arc<Vec<u8>>>,
}

impl TileCache {
    pub fn new(tile: Vec<u8>) -> Self {
        assert!(!tile.is_empty(), "tile must not be empty");
        TileCache {
            tile,
            buf: RwLock::new(Arc::new(Vec::new())),
        }
    }

    pub fn tile_len(&self) -> usize {
        self.tile.len()
    }

    fn tiled(&self, tiles: usize) -> Vec<u8> {
        let mut out = Vec::with_capacity(tiles * self.tile.len());
        for _ in 0..tiles {
            out.extend_from_slice(&self.tile);
        }
        out
    }
}

impl GrowCache for TileCache {
    fn at_least(&self, len: usize) -> Arc<Vec<u8>> {
        let tiles = len.div_ceil(self.tile.len()) + 1;
        let need = tiles * self.tile.len();
        {
            let cur = self.buf.read();
            if cur.len() >= need {
                return Arc::clone(&cur);
            }
        }
        let mut cur = self.buf.write();
        if cur.len() < need {
            *cur = Arc::new(self.tiled(tiles));
        }
        Arc::clone(&cur)
    }
}
