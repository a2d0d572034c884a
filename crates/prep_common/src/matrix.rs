//! 4×4 homogeneous transform matrices.

use serde::{Deserialize, Serialize};

/// Number of bytes in the canonical big-endian encoding of a [`Matrix4`].
pub const MATRIX_ENCODED_LEN: usize = 16 * 8;

/// A row-major 4×4 transform placing a solid in model space.
///
/// Two placements of identical geometry differ only in their matrix, so the
/// matrix participates in cache naming.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Matrix4(pub [f64; 16]);

impl Matrix4 {
    /// The identity transform.
    pub const IDENTITY: Self = Self([
        1.0, 0.0, 0.0, 0.0, //
        0.0, 1.0, 0.0, 0.0, //
        0.0, 0.0, 1.0, 0.0, //
        0.0, 0.0, 0.0, 1.0,
    ]);

    /// Returns a pure translation by `(x, y, z)`.
    pub fn translation(x: f64, y: f64, z: f64) -> Self {
        let mut m = Self::IDENTITY;
        m.0[3] = x;
        m.0[7] = y;
        m.0[11] = z;
        m
    }

    /// Returns `true` if every element is finite (no NaN or infinity).
    pub fn is_finite(&self) -> bool {
        self.0.iter().all(|v| v.is_finite())
    }

    /// Encodes the matrix as sixteen big-endian IEEE-754 doubles.
    ///
    /// The encoding is independent of host byte order, so the same matrix
    /// produces the same bytes on every platform.
    pub fn to_be_bytes(&self) -> [u8; MATRIX_ENCODED_LEN] {
        let mut out = [0u8; MATRIX_ENCODED_LEN];
        for (chunk, value) in out.chunks_exact_mut(8).zip(self.0.iter()) {
            chunk.copy_from_slice(&value.to_be_bytes());
        }
        out
    }
}

impl Default for Matrix4 {
    fn default() -> Self {
        Self::IDENTITY
    }
}
