//! The typed codec layer (`C1`).
//!
//! Primitives are encoded as raw, host-byte-order copies of their in-memory
//! representation — see [`crate::config`] and the design notes in
//! `SPEC_FULL.md` for why native order was chosen over a fixed wire order.
//! Strings use a Pascal-style length-prefixed form (one `u8` length byte
//! followed by that many payload bytes); tuples concatenate their members in
//! declaration order with no separators.

use byteorder::{ByteOrder, NativeEndian};

/// The outcome of decoding a value from a byte slice.
#[derive(Debug, PartialEq, Eq)]
pub enum DecodeError {
    /// The slice does not (yet) contain a complete value. Not fatal: the
    /// caller should retain the bytes and retry once more data has arrived.
    Incomplete,
    /// The slice contains a value that is structurally invalid (e.g. a
    /// string length prefix that cannot be satisfied by the remaining
    /// bytes). Fatal for the stream.
    Malformed,
}

/// Serialises a value of type `Self` to its wire representation.
pub trait Encode {
    /// Writes `self` into `buf[..]`, returning the number of bytes written.
    ///
    /// Returns `None`, leaving `buf` in an unspecified state, if `buf` is
    /// too small to hold the encoded value. This is a non-fatal condition —
    /// the caller is expected to retry with a larger buffer.
    fn encode_into(&self, buf: &mut [u8]) -> Option<usize>;

    /// The number of bytes [`Encode::encode_into`] will write for this
    /// value. Buffers of exactly this size are guaranteed to succeed.
    fn encoded_len(&self) -> usize;
}

/// Deserialises a value of type `Self` from its wire representation.
pub trait Decode: Sized {
    /// Reads a `Self` from the front of `buf`, returning the value and the
    /// number of bytes consumed.
    fn decode_from(buf: &[u8]) -> Result<(Self, usize), DecodeError>;
}

macro_rules! impl_primitive {
    ($t:ty, $size:expr, $read:ident, $write:ident) => {
        impl Encode for $t {
            fn encode_into(&self, buf: &mut [u8]) -> Option<usize> {
                if buf.len() < $size {
                    return None;
                }
                NativeEndian::$write(&mut buf[..$size], *self);
                Some($size)
            }

            fn encoded_len(&self) -> usize {
                $size
            }
        }

        impl Decode for $t {
            fn decode_from(buf: &[u8]) -> Result<(Self, usize), DecodeError> {
                if buf.len() < $size {
                    return Err(DecodeError::Incomplete);
                }
                Ok((NativeEndian::$read(&buf[..$size]), $size))
            }
        }
    };
}

impl_primitive!(u16, 2, read_u16, write_u16);
impl_primitive!(i16, 2, read_i16, write_i16);
impl_primitive!(u32, 4, read_u32, write_u32);
impl_primitive!(i32, 4, read_i32, write_i32);
impl_primitive!(u64, 8, read_u64, write_u64);
impl_primitive!(i64, 8, read_i64, write_i64);
impl_primitive!(f32, 4, read_f32, write_f32);
impl_primitive!(f64, 8, read_f64, write_f64);

// Single-byte types have no byte order to speak of; copy them directly.

impl Encode for bool {
    fn encode_into(&self, buf: &mut [u8]) -> Option<usize> {
        if buf.is_empty() {
            return None;
        }
        buf[0] = *self as u8;
        Some(1)
    }

    fn encoded_len(&self) -> usize {
        1
    }
}

impl Decode for bool {
    fn decode_from(buf: &[u8]) -> Result<(Self, usize), DecodeError> {
        match buf.first() {
            None => Err(DecodeError::Incomplete),
            Some(b) => Ok((*b != 0, 1)),
        }
    }
}

impl Encode for u8 {
    fn encode_into(&self, buf: &mut [u8]) -> Option<usize> {
        if buf.is_empty() {
            return None;
        }
        buf[0] = *self;
        Some(1)
    }

    fn encoded_len(&self) -> usize {
        1
    }
}

impl Decode for u8 {
    fn decode_from(buf: &[u8]) -> Result<(Self, usize), DecodeError> {
        match buf.first() {
            None => Err(DecodeError::Incomplete),
            Some(b) => Ok((*b, 1)),
        }
    }
}

impl Encode for i8 {
    fn encode_into(&self, buf: &mut [u8]) -> Option<usize> {
        if buf.is_empty() {
            return None;
        }
        buf[0] = *self as u8;
        Some(1)
    }

    fn encoded_len(&self) -> usize {
        1
    }
}

impl Decode for i8 {
    fn decode_from(buf: &[u8]) -> Result<(Self, usize), DecodeError> {
        match buf.first() {
            None => Err(DecodeError::Incomplete),
            Some(b) => Ok((*b as i8, 1)),
        }
    }
}

/// The unit type encodes to zero bytes, for zero-argument parameter tuples
/// and zero-return handlers.
impl Encode for () {
    fn encode_into(&self, _buf: &mut [u8]) -> Option<usize> {
        Some(0)
    }

    fn encoded_len(&self) -> usize {
        0
    }
}

impl Decode for () {
    fn decode_from(_buf: &[u8]) -> Result<(Self, usize), DecodeError> {
        Ok(((), 0))
    }
}

/// The maximum length of a string representable by this codec — the length
/// prefix is a single unsigned byte.
pub const MAX_STRING_LEN: usize = u8::MAX as usize;

impl Encode for String {
    fn encode_into(&self, buf: &mut [u8]) -> Option<usize> {
        self.as_str().encode_into(buf)
    }

    fn encoded_len(&self) -> usize {
        self.as_str().encoded_len()
    }
}

impl Encode for str {
    fn encode_into(&self, buf: &mut [u8]) -> Option<usize> {
        let bytes = self.as_bytes();
        if bytes.len() > MAX_STRING_LEN {
            // Not representable on the wire; treat identically to an
            // undersized buffer so callers don't need a separate error path.
            return None;
        }
        let total = 1 + bytes.len();
        if buf.len() < total {
            return None;
        }
        buf[0] = bytes.len() as u8;
        buf[1..total].copy_from_slice(bytes);
        Some(total)
    }

    fn encoded_len(&self) -> usize {
        1 + self.as_bytes().len()
    }
}

impl Decode for String {
    fn decode_from(buf: &[u8]) -> Result<(Self, usize), DecodeError> {
        let len = match buf.first() {
            None => return Err(DecodeError::Incomplete),
            Some(b) => *b as usize,
        };
        let total = 1 + len;
        if buf.len() < total {
            return Err(DecodeError::Incomplete);
        }
        let s = std::str::from_utf8(&buf[1..total]).map_err(|_| DecodeError::Malformed)?;
        Ok((s.to_owned(), total))
    }
}

// Composite (tuple) parameters concatenate their members in declaration
// order. Any member reporting `Incomplete` aborts the whole decode without
// partial commit — we only return once every member has succeeded.
macro_rules! impl_tuple {
    ($($name:ident : $idx:tt),+) => {
        impl<$($name),+> Encode for ($($name,)+)
        where
            $($name: Encode),+
        {
            fn encode_into(&self, buf: &mut [u8]) -> Option<usize> {
                let mut offset = 0;
                $(
                    offset += self.$idx.encode_into(&mut buf[offset..])?;
                )+
                Some(offset)
            }

            fn encoded_len(&self) -> usize {
                0 $(+ self.$idx.encoded_len())+
            }
        }

        impl<$($name),+> Decode for ($($name,)+)
        where
            $($name: Decode),+
        {
            #[allow(non_snake_case)]
            fn decode_from(buf: &[u8]) -> Result<(Self, usize), DecodeError> {
                let mut offset = 0;
                $(
                    let ($name, n) = $name::decode_from(&buf[offset..])?;
                    offset += n;
                )+
                Ok((($($name,)+), offset))
            }
        }
    };
}

impl_tuple!(A: 0);
impl_tuple!(A: 0, B: 1);
impl_tuple!(A: 0, B: 1, C: 2);
impl_tuple!(A: 0, B: 1, C: 2, D: 3);

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn encode_zero_capacity_fails() {
        let mut buf = [0u8; 0];
        assert_eq!(42u32.encode_into(&mut buf), None);
    }

    #[test]
    fn encode_minimum_capacity_succeeds() {
        let v = 0x0102_0304u32;
        let mut buf = [0u8; 4];
        assert_eq!(v.encode_into(&mut buf), Some(4));

        let mut short = [0u8; 3];
        assert_eq!(v.encode_into(&mut short), None);
    }

    #[test]
    fn decode_does_not_touch_bytes_past_type_size() {
        let mut arr = [1i16, 2, 3, 4, 5, 6];
        let x: i16 = 7;
        let mut buf = [0u8; 2];
        x.encode_into(&mut buf).unwrap();
        let (y, n) = i16::decode_from(&buf).unwrap();
        arr[2] = y;
        assert_eq!(n, 2);
        assert_eq!(arr, [1, 2, 7, 4, 5, 6]);
    }

    #[test]
    fn empty_string_is_one_byte() {
        let s = String::new();
        let mut buf = [0xffu8; 1];
        assert_eq!(s.encode_into(&mut buf), Some(1));
        assert_eq!(buf[0], 0);
    }

    #[test]
    fn string_at_limit_round_trips() {
        let s = "x".repeat(MAX_STRING_LEN);
        let mut buf = vec![0u8; s.encoded_len()];
        let written = s.encode_into(&mut buf).unwrap();
        assert_eq!(written, buf.len());

        let (got, consumed) = String::decode_from(&buf).unwrap();
        assert_eq!(got, s);
        assert_eq!(consumed, buf.len());
    }

    #[test]
    fn string_over_limit_does_not_encode() {
        let s = "x".repeat(MAX_STRING_LEN + 1);
        let mut buf = vec![0u8; s.len() + 1];
        assert_eq!(Encode::encode_into(s.as_str(), &mut buf), None);
    }

    #[test]
    fn tuple_composes_in_order() {
        let value: (u32, String, bool) = (7, "hi".to_owned(), true);
        let mut buf = vec![0u8; value.encoded_len()];
        let n = value.encode_into(&mut buf).unwrap();
        assert_eq!(n, buf.len());

        let (got, consumed) = <(u32, String, bool)>::decode_from(&buf).unwrap();
        assert_eq!(got, value);
        assert_eq!(consumed, n);
    }

    #[test]
    fn tuple_partial_component_is_incomplete_not_partial_commit() {
        let value: (u32, String) = (1, "hello".to_owned());
        let mut buf = vec![0u8; value.encoded_len()];
        value.encode_into(&mut buf).unwrap();

        // Truncate mid-string: the u32 alone is complete, but the decode
        // must not commit that half of the tuple.
        let truncated = &buf[..5];
        assert_eq!(
            <(u32, String)>::decode_from(truncated),
            Err(DecodeError::Incomplete)
        );
    }

    #[test]
    fn unit_roundtrips_to_zero_bytes() {
        let buf: [u8; 0] = [];
        assert_eq!(().encoded_len(), 0);
        let (v, n) = <()>::decode_from(&buf).unwrap();
        assert_eq!(v, ());
        assert_eq!(n, 0);
    }

    proptest! {
        #[test]
        fn prop_u32_roundtrip(v in any::<u32>()) {
            let mut buf = [0u8; 4];
            let n = v.encode_into(&mut buf).unwrap();
            let (got, consumed) = u32::decode_from(&buf).unwrap();
            prop_assert_eq!(got, v);
            prop_assert_eq!(consumed, n);
        }

        #[test]
        fn prop_string_roundtrip(s in "\\PC{0,255}") {
            if s.len() > MAX_STRING_LEN {
                return Ok(());
            }
            let mut buf = vec![0u8; s.encoded_len()];
            let n = s.encode_into(&mut buf).unwrap();
            let (got, consumed) = String::decode_from(&buf).unwrap();
            prop_assert_eq!(got, s);
            prop_assert_eq!(consumed, n);
        }

        #[test]
        fn prop_unaligned_buffer(offset in 0usize..8, v in any::<u64>()) {
            let mut buf = vec![0u8; offset + 8];
            let n = v.encode_into(&mut buf[offset..]).unwrap();
            let (got, consumed) = u64::decode_from(&buf[offset..]).unwrap();
            prop_assert_eq!(got, v);
            prop_assert_eq!(consumed, n);
        }
    }
}
