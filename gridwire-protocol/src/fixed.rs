//! Fixed-size scalar codecs.
//!
//! Scalars are written little-endian at an explicit offset inside a frame's
//! content. Every access is bounds-checked and reports
//! [`ProtocolError::BufferTooShort`] instead of reading past the buffer; that
//! check is what lets a decoder treat trailing fields added by a newer
//! protocol version as optional.

use crate::error::ProtocolError;
use bytes::BytesMut;
use uuid::Uuid;

pub const BYTE_SIZE: usize = 1;
pub const BOOLEAN_SIZE: usize = 1;
pub const SHORT_SIZE: usize = 2;
pub const INT_SIZE: usize = 4;
pub const LONG_SIZE: usize = 8;
/// Two 64-bit halves, most significant first.
pub const UUID_SIZE: usize = 16;

/// A scalar with a fixed wire width.
pub trait FixedSize: Sized + Copy {
    const WIDTH: usize;

    /// Writes `self` into `dst`, which is exactly `WIDTH` bytes long.
    fn write_le(self, dst: &mut [u8]);

    /// Reads a value from `src`, which is exactly `WIDTH` bytes long.
    fn read_le(src: &[u8]) -> Self;
}

macro_rules! impl_fixed_int {
    ($($ty:ty => $width:expr),* $(,)?) => {
        $(
            impl FixedSize for $ty {
                const WIDTH: usize = $width;

                fn write_le(self, dst: &mut [u8]) {
                    dst.copy_from_slice(&self.to_le_bytes());
                }

                fn read_le(src: &[u8]) -> Self {
                    let mut raw = [0u8; $width];
                    raw.copy_from_slice(src);
                    <$ty>::from_le_bytes(raw)
                }
            }
        )*
    };
}

impl_fixed_int! {
    u8 => BYTE_SIZE,
    i8 => BYTE_SIZE,
    i16 => SHORT_SIZE,
    i32 => INT_SIZE,
    i64 => LONG_SIZE,
    u64 => LONG_SIZE,
}

impl FixedSize for bool {
    const WIDTH: usize = BOOLEAN_SIZE;

    fn write_le(self, dst: &mut [u8]) {
        dst[0] = u8::from(self);
    }

    fn read_le(src: &[u8]) -> Self {
        src[0] != 0
    }
}

impl FixedSize for Uuid {
    const WIDTH: usize = UUID_SIZE;

    fn write_le(self, dst: &mut [u8]) {
        let (msb, lsb) = self.as_u64_pair();
        msb.write_le(&mut dst[..LONG_SIZE]);
        lsb.write_le(&mut dst[LONG_SIZE..]);
    }

    fn read_le(src: &[u8]) -> Self {
        let msb = u64::read_le(&src[..LONG_SIZE]);
        let lsb = u64::read_le(&src[LONG_SIZE..]);
        Uuid::from_u64_pair(msb, lsb)
    }
}

fn range(len: usize, offset: usize, width: usize) -> Result<std::ops::Range<usize>, ProtocolError> {
    match offset.checked_add(width) {
        Some(end) if end <= len => Ok(offset..end),
        _ => Err(ProtocolError::BufferTooShort { offset, width, len }),
    }
}

/// Writes `value` at `offset`.
pub fn encode<T: FixedSize>(buf: &mut [u8], offset: usize, value: T) -> Result<(), ProtocolError> {
    let range = range(buf.len(), offset, T::WIDTH)?;
    value.write_le(&mut buf[range]);
    Ok(())
}

/// Reads a value at `offset`.
pub fn decode<T: FixedSize>(buf: &[u8], offset: usize) -> Result<T, ProtocolError> {
    let range = range(buf.len(), offset, T::WIDTH)?;
    Ok(T::read_le(&buf[range]))
}

/// Appends `value` to the end of a growing buffer.
pub fn put<T: FixedSize>(buf: &mut BytesMut, value: T) {
    let start = buf.len();
    buf.resize(start + T::WIDTH, 0);
    value.write_le(&mut buf[start..]);
}

/// Reads a value at `offset` if the buffer is long enough to hold it.
///
/// `None` means the field is absent: the sender predates the field.
pub fn decode_optional<T: FixedSize>(buf: &[u8], offset: usize) -> Option<T> {
    decode(buf, offset).ok()
}

/// Returns whether a field of type `T` at `offset` fits in `buf`.
pub fn fits<T: FixedSize>(buf: &[u8], offset: usize) -> bool {
    range(buf.len(), offset, T::WIDTH).is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_scalar_layout() {
        let mut buf = [0u8; 8];
        encode(&mut buf, 0, 0x1A0300i32).unwrap();
        assert_eq!(&buf[..4], &[0x00, 0x03, 0x1A, 0x00]);

        encode(&mut buf, 4, true).unwrap();
        assert_eq!(buf[4], 1);
        assert!(decode::<bool>(&buf, 4).unwrap());
    }

    #[test]
    fn test_uuid_halves() {
        let id = Uuid::from_u64_pair(0, 42);
        let mut buf = [0u8; UUID_SIZE];
        encode(&mut buf, 0, id).unwrap();

        assert_eq!(&buf[..8], &[0u8; 8]);
        assert_eq!(buf[8], 42);
        assert_eq!(decode::<Uuid>(&buf, 0).unwrap(), id);
    }

    #[test]
    fn test_buffer_too_short() {
        let mut buf = [0u8; 10];
        assert!(matches!(
            encode(&mut buf, 4, 7i64),
            Err(ProtocolError::BufferTooShort {
                offset: 4,
                width: 8,
                len: 10
            })
        ));
        assert!(matches!(
            decode::<i32>(&buf, 7),
            Err(ProtocolError::BufferTooShort { .. })
        ));
        assert!(matches!(
            decode::<u8>(&buf, usize::MAX),
            Err(ProtocolError::BufferTooShort { .. })
        ));
    }

    #[test]
    fn test_put_appends() {
        let mut buf = BytesMut::new();
        put(&mut buf, 7i32);
        put(&mut buf, true);
        assert_eq!(&buf[..], &[7, 0, 0, 0, 1]);
    }

    #[test]
    fn test_decode_optional() {
        let buf = [1u8, 2, 3];
        assert_eq!(decode_optional::<u8>(&buf, 2), Some(3));
        assert_eq!(decode_optional::<u8>(&buf, 3), None);
        assert_eq!(decode_optional::<i16>(&buf, 2), None);
        assert!(fits::<i16>(&buf, 1));
        assert!(!fits::<i32>(&buf, 0));
    }

    proptest! {
        #[test]
        fn prop_long_roundtrip(value: i64, offset in 0usize..16) {
            let mut buf = vec![0u8; offset + LONG_SIZE];
            encode(&mut buf, offset, value).unwrap();
            prop_assert_eq!(decode::<i64>(&buf, offset).unwrap(), value);
        }

        #[test]
        fn prop_uuid_roundtrip(msb: u64, lsb: u64) {
            let id = Uuid::from_u64_pair(msb, lsb);
            let mut buf = [0u8; UUID_SIZE];
            encode(&mut buf, 0, id).unwrap();
            prop_assert_eq!(decode::<Uuid>(&buf, 0).unwrap(), id);
        }
    }
}
