//! EBML variable-length integers.
//!
//! The length of an encoded integer is given by the position of the highest set bit
//! of its first byte (the length marker): `1xxx_xxxx` is one byte long, `01xx_xxxx` is two bytes long,
//! and so on up to eight bytes.
use std::fmt;

use crate::{ErrorKind, Result};

/// Maximum encoded length of a variable-length integer.
pub const MAX_LEN: usize = 8;

/// An EBML variable-length integer.
///
/// The same bytes can be read in two ways:
/// [`id`](#method.id) keeps the length marker (element ids are compared this way) and
/// [`number`](#method.number) strips it (element sizes are compared this way).
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct VarInt {
    bytes: [u8; MAX_LEN],
    len: u8,
}
impl VarInt {
    /// Returns the encoded length declared by the first byte of a variable-length integer.
    ///
    /// `None` means that the byte has no length marker.
    pub fn declared_len(first: u8) -> Option<usize> {
        if first == 0 {
            None
        } else {
            Some(first.leading_zeros() as usize + 1)
        }
    }

    /// Reads a variable-length integer from the head of `buf`.
    ///
    /// Bytes following the declared length are ignored.
    pub fn from_bytes(buf: &[u8]) -> Result<Self> {
        track_assert!(!buf.is_empty(), ErrorKind::MalformedVarInt, "Empty buffer");
        let len = track_assert_some!(
            Self::declared_len(buf[0]),
            ErrorKind::MalformedVarInt,
            "No length marker in the first byte"
        );
        track_assert!(
            buf.len() >= len,
            ErrorKind::MalformedVarInt,
            "Too short buffer: declared={}, actual={}",
            len,
            buf.len()
        );

        let mut bytes = [0; MAX_LEN];
        bytes[..len].copy_from_slice(&buf[..len]);
        Ok(VarInt {
            bytes,
            len: len as u8,
        })
    }

    /// Encodes `n` with the minimal length.
    ///
    /// Zero is encoded as the single byte `0x80`.
    pub fn from_u64(n: u64) -> Result<Self> {
        let bits = 64 - n.leading_zeros() as usize;
        let len = ((bits + 6) / 7).max(1);
        track!(Self::with_length(n, len))
    }

    /// Encodes `n` using exactly `len` bytes.
    pub fn with_length(n: u64, len: usize) -> Result<Self> {
        track_assert!(
            (1..=MAX_LEN).contains(&len),
            ErrorKind::InvalidInput,
            "len={}",
            len
        );
        track_assert!(
            n <= Self::max_value(len),
            ErrorKind::InvalidInput,
            "{} does not fit in {} bytes",
            n,
            len
        );

        let mut bytes = [0; MAX_LEN];
        for (i, b) in bytes[..len].iter_mut().enumerate() {
            *b = (n >> (8 * (len - 1 - i))) as u8;
        }
        bytes[0] |= 0x80 >> (len - 1);
        Ok(VarInt {
            bytes,
            len: len as u8,
        })
    }

    /// Returns the largest number that can be encoded in `len` bytes.
    pub fn max_value(len: usize) -> u64 {
        (1u64 << (7 * len)) - 1
    }

    /// Returns the encoded bytes.
    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes[..self.len()]
    }

    /// Returns the encoded length in bytes.
    pub fn len(&self) -> usize {
        usize::from(self.len)
    }

    /// Returns `true` if no byte is encoded.
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Returns `true` if the encoded length equals the length declared by the first byte.
    pub fn is_valid(&self) -> bool {
        Self::declared_len(self.bytes[0]) == Some(self.len())
    }

    /// Returns `true` if all value bits are set, which EBML uses for "unknown size".
    pub fn is_unknown(&self) -> bool {
        self.number() == Self::max_value(self.len())
    }

    /// Returns the raw bytes as a big-endian integer, including the length marker.
    pub fn id(&self) -> u64 {
        self.as_bytes()
            .iter()
            .fold(0, |acc, &b| (acc << 8) | u64::from(b))
    }

    /// Returns the value with the length marker stripped.
    pub fn number(&self) -> u64 {
        let len = self.len();
        let head = u64::from(self.bytes[0] & (0x7F >> (len - 1)));
        self.bytes[1..len]
            .iter()
            .fold(head, |acc, &b| (acc << 8) | u64::from(b))
    }

    /// Returns the value as a machine-word integer.
    pub fn to_usize(&self) -> Result<usize> {
        let n = self.number();
        track_assert!(
            n <= usize::MAX as u64,
            ErrorKind::InvalidInput,
            "{} exceeds the platform word",
            n
        );
        Ok(n as usize)
    }

    /// Returns the value as a signed lace delta (the value re-centered by `2^(7*len-1) - 1`).
    pub fn signed_number(&self) -> i64 {
        let bias = (1i64 << (7 * self.len() - 1)) - 1;
        self.number() as i64 - bias
    }
}
impl fmt::Debug for VarInt {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "VarInt(0x")?;
        for b in self.as_bytes() {
            write!(f, "{:02X}", b)?;
        }
        write!(f, ")")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn id_keeps_marker_and_number_strips_it() {
        let v = track_try_unwrap!(VarInt::from_bytes(&[0x18, 0x53, 0x80, 0x67]));
        assert_eq!(v.len(), 4);
        assert!(!v.is_empty());
        assert_eq!(v.id(), 0x1853_8067);
        assert_eq!(v.number(), 0x0853_8067);
        assert!(v.is_valid());
        assert!(!v.is_unknown());
    }

    #[test]
    fn trailing_bytes_are_ignored() {
        let v = track_try_unwrap!(VarInt::from_bytes(&[0x81, 0xFF, 0xFF]));
        assert_eq!(v.as_bytes(), &[0x81]);
        assert_eq!(v.number(), 1);
    }

    #[test]
    fn malformed_inputs() {
        for buf in &[&[][..], &[0x00, 0x01][..], &[0x40][..], &[0x10, 0, 0][..]] {
            let e = VarInt::from_bytes(buf).err().unwrap();
            assert_eq!(*e.kind(), ErrorKind::MalformedVarInt, "{:?}", buf);
        }
    }

    #[test]
    fn zero_is_a_single_marker_byte() {
        let v = track_try_unwrap!(VarInt::from_u64(0));
        assert_eq!(v.as_bytes(), &[0x80]);
        assert_eq!(v.number(), 0);
    }

    #[test]
    fn minimal_length_encoding() {
        assert_eq!(track_try_unwrap!(VarInt::from_u64(1)).as_bytes(), &[0x81]);
        assert_eq!(track_try_unwrap!(VarInt::from_u64(127)).as_bytes(), &[0xFF]);
        assert_eq!(
            track_try_unwrap!(VarInt::from_u64(128)).as_bytes(),
            &[0x40, 0x80]
        );
        assert_eq!(
            track_try_unwrap!(VarInt::from_u64(0x0853_8067)).as_bytes(),
            &[0x18, 0x53, 0x80, 0x67]
        );
        assert!(VarInt::from_u64(1 << 56).is_err());
    }

    #[test]
    fn round_trip_around_group_boundaries() {
        let mut values = vec![0, 1, 2, 1000, 0x00AB_CDEF];
        for bits in (7..=56).step_by(7) {
            let max = (1u64 << bits) - 1;
            values.extend_from_slice(&[max - 1, max]);
            if bits < 56 {
                values.push(max + 1);
            }
        }
        for x in values {
            let v = track_try_unwrap!(VarInt::from_u64(x));
            assert_eq!(v.number(), x);

            let parsed = track_try_unwrap!(VarInt::from_bytes(v.as_bytes()));
            assert!(parsed.is_valid());
            assert_eq!(parsed, v);
        }
    }

    #[test]
    fn explicit_length_avoids_unknown_pattern() {
        let v = track_try_unwrap!(VarInt::with_length(127, 8));
        assert_eq!(v.as_bytes(), &[0x01, 0, 0, 0, 0, 0, 0, 0x7F]);
        assert_eq!(v.number(), 127);
        assert!(!v.is_unknown());
        assert!(track_try_unwrap!(VarInt::from_bytes(&[0xFF])).is_unknown());
        assert!(VarInt::with_length(128, 1).is_err());
    }

    #[test]
    fn signed_lace_deltas() {
        // 1 byte: bias 63
        assert_eq!(track_try_unwrap!(VarInt::from_bytes(&[0xBF])).signed_number(), 0);
        assert_eq!(track_try_unwrap!(VarInt::from_bytes(&[0x80])).signed_number(), -63);
        // 2 bytes: bias 8191
        assert_eq!(
            track_try_unwrap!(VarInt::from_bytes(&[0x5F, 0xFF])).signed_number(),
            0
        );
        assert_eq!(
            track_try_unwrap!(VarInt::from_bytes(&[0x60, 0x00])).signed_number(),
            1
        );
    }
}
