//! Shared seek and block-copy arithmetic used by every generator.
//!
//! Generators own a cursor `pos` and a fixed `size`; the invariant
//! `0 <= pos <= size` must hold at all times. `resolve_seek` computes a new
//! cursor under that invariant, and `fill_blocks` copies fixed-length block
//! content into an output buffer, handling partial first and last blocks.

use crate::error::SeekError;

/// Seek origin for [`resolve_seek`].
///
/// `End` resolves to `size - offset`, so `End { offset: 0 }` is the end of
/// the stream and positive offsets move backwards from it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Whence {
    Start,
    Current,
    End,
}

impl Whence {
    fn name(self) -> &'static str {
        match self {
            Whence::Start => "start",
            Whence::Current => "current",
            Whence::End => "end",
        }
    }
}

/// Resolve a seek request against the current cursor and a fixed size.
///
/// Results past `size` clamp to `size`; a result before 0 is rejected and the
/// caller must leave its cursor unchanged.
pub fn resolve_seek(offset: i64, whence: Whence, cur: u64, size: u64) -> Result<u64, SeekError> {
    let base = match whence {
        Whence::Start => offset,
        Whence::Current => (cur as i64).saturating_add(offset),
        Whence::End => (size as i64).saturating_sub(offset),
    };
    if base < 0 {
        return Err(SeekError::NegativePosition {
            offset,
            whence: whence.name(),
        });
    }
    Ok((base as u64).min(size))
}

/// Copy block-structured content into `out` starting at stream offset `pos`.
///
/// `content` is invoked with a block index and must return that block's
/// bytes; an empty return stops the fill early. Output is clipped to
/// `size - pos` and to `out.len()`. Returns the number of bytes written.
pub fn fill_blocks<F>(out: &mut [u8], pos: u64, size: u64, block_len: u64, mut content: F) -> usize
where
    F: FnMut(u64) -> Vec<u8>,
{
    if block_len == 0 || pos >= size {
        return 0;
    }
    let avail = (size - pos).min(out.len() as u64) as usize;
    let mut written = 0usize;
    let mut cur = pos;
    while written < avail {
        let idx = cur / block_len;
        let block = content(idx);
        if block.is_empty() {
            break;
        }
        let in_off = (cur % block_len) as usize;
        if in_off >= block.len() {
            break;
        }
        let take = (block.len() - in_off).min(avail - written);
        out[written..written + take].copy_from_slice(&block[in_off..in_off + take]);
        written += take;
        cur += take as u64;
    }
    written
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn seek_start_absolute() {
        assert_eq!(resolve_seek(10, Whence::Start, 0, 100), Ok(10));
        assert_eq!(resolve_seek(0, Whence::Start, 50, 100), Ok(0));
    }

    #[test]
    fn seek_end_counts_back_from_size() {
        assert_eq!(resolve_seek(0, Whence::End, 0, 100), Ok(100));
        assert_eq!(resolve_seek(30, Whence::End, 0, 100), Ok(70));
    }

    #[test]
    fn seek_current_clamps_to_size() {
        assert_eq!(resolve_seek(1000, Whence::Current, 50, 100), Ok(100));
        assert_eq!(resolve_seek(-20, Whence::Current, 50, 100), Ok(30));
    }

    #[test]
    fn seek_negative_is_rejected() {
        assert!(resolve_seek(-1, Whence::Start, 0, 100).is_err());
        assert!(resolve_seek(-60, Whence::Current, 50, 100).is_err());
        assert!(resolve_seek(200, Whence::End, 0, 100).is_err());
    }

    #[test]
    fn fill_partial_first_and_last_block() {
        // Blocks of 4: "AAAA" "BBBB" "CCCC" ...
        let content = |idx: u64| vec![b'A' + (idx as u8); 4];
        let mut out = [0u8; 6];
        let n = fill_blocks(&mut out, 2, 100, 4, content);
        assert_eq!(n, 6);
        assert_eq!(&out, b"AABBBB");
    }

    #[test]
    fn fill_clips_to_size() {
        let content = |_| vec![b'x'; 4];
        let mut out = [0u8; 16];
        let n = fill_blocks(&mut out, 7, 10, 4, content);
        assert_eq!(n, 3);
    }

    #[test]
    fn fill_stops_on_empty_block() {
        let content = |idx: u64| if idx < 2 { vec![b'x'; 4] } else { Vec::new() };
        let mut out = [0u8; 32];
        let n = fill_blocks(&mut out, 0, 100, 4, content);
        assert_eq!(n, 8);
    }

    proptest! {
        // Block fill must agree with slicing the concatenation of all blocks.
        #[test]
        fn fill_matches_concatenation(
            offset in 0u64..512,
            want in 1usize..256,
            block_len in 1u64..48,
        ) {
            let size = 512u64;
            prop_assume!(offset < size);
            let content = |idx: u64| {
                (0..block_len).map(|i| (idx.wrapping_mul(31).wrapping_add(i) % 251) as u8).collect::<Vec<u8>>()
            };

            let mut whole = Vec::new();
            let mut idx = 0;
            while (whole.len() as u64) < size + block_len {
                whole.extend_from_slice(&content(idx));
                idx += 1;
            }

            let mut out = vec![0u8; want];
            let n = fill_blocks(&mut out, offset, size, block_len, content);
            let expect_len = (size - offset).min(want as u64) as usize;
            prop_assert_eq!(n, expect_len);
            prop_assert_eq!(&out[..n], &whole[offset as usize..offset as usize + n]);
        }
    }
}
