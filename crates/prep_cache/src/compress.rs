//! Length-prefixed block compression.
//!
//! A compressed block is `[original length: u32 big-endian][zlib stream]`.
//! Both directions fail soft: compression falls back to the raw input and
//! decompression failures are reported as `None`.

use std::borrow::Cow;
use std::io::{Read, Write};

use flate2::read::ZlibDecoder;
use flate2::write::ZlibEncoder;
use flate2::Compression;

/// Size of the big-endian original-length prefix.
pub const LENGTH_PREFIX_LEN: usize = 4;

/// Upper bound on the buffer reserved up front when expanding a block.
const MAX_PREALLOC: usize = 1 << 20;

/// Compresses `data` into a length-prefixed block.
///
/// Returns [`Cow::Owned`] holding the block on success. If the input is too
/// large for the 32-bit prefix or the encoder fails, the input is returned
/// unchanged as [`Cow::Borrowed`]; callers must check which they got.
pub fn compress_block(data: &[u8]) -> Cow<'_, [u8]> {
    let Ok(len) = u32::try_from(data.len()) else {
        return Cow::Borrowed(data);
    };
    match deflate(data) {
        Ok(stream) => {
            let mut block = Vec::with_capacity(LENGTH_PREFIX_LEN + stream.len());
            block.extend_from_slice(&len.to_be_bytes());
            block.extend_from_slice(&stream);
            Cow::Owned(block)
        }
        Err(_) => Cow::Borrowed(data),
    }
}

/// Expands a block produced by [`compress_block`].
///
/// Returns `None` if the block is shorter than the prefix, the stream is
/// corrupt, or the expanded length differs from the recorded length.
pub fn decompress_block(block: &[u8]) -> Option<Vec<u8>> {
    let prefix: [u8; LENGTH_PREFIX_LEN] = block.get(..LENGTH_PREFIX_LEN)?.try_into().ok()?;
    let expected = u32::from_be_bytes(prefix) as usize;

    // The prefix is untrusted until the length check below.
    let mut out = Vec::with_capacity(expected.min(MAX_PREALLOC));
    // Read one byte past the recorded length so an overlong stream is caught.
    let mut decoder = ZlibDecoder::new(&block[LENGTH_PREFIX_LEN..]).take(expected as u64 + 1);
    decoder.read_to_end(&mut out).ok()?;

    (out.len() == expected).then_some(out)
}

fn deflate(data: &[u8]) -> std::io::Result<Vec<u8>> {
    let mut encoder = ZlibEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(data)?;
    encoder.finish()
}
