// Based on quinn-proto
// https://github.com/quinn-rs/quinn/blob/main/quinn-proto/src/varint.rs
// Licensed via Apache 2.0 and MIT

use std::fmt;

use thiserror::Error;

use super::{Decode, DecodeError, Encode, EncodeError};

#[derive(Debug, Copy, Clone, Eq, PartialEq, Error)]
#[error("value out of range")]
pub struct BoundsExceeded;

/// An integer less than 2^62
///
/// Values of this type are suitable for encoding as QUIC variable-length integer.
/// Fields that must also survive a trip through an IEEE-754 double are limited to [VarInt::MAX_SAFE].
#[derive(Default, Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct VarInt(u64);

impl VarInt {
	/// The largest possible value.
	pub const MAX: Self = Self((1 << 62) - 1);

	/// The largest value of a 53-bit field.
	pub const MAX_SAFE: Self = Self((1 << 53) - 1);

	/// The smallest possible value.
	pub const ZERO: Self = Self(0);

	/// Construct a `VarInt` if the value fits in 62 bits.
	pub const fn from_u64(x: u64) -> Option<Self> {
		match x <= Self::MAX.0 {
			true => Some(Self(x)),
			false => None,
		}
	}

	/// Construct a `VarInt` for a 53-bit field.
	pub const fn from_safe(x: u64) -> Result<Self, BoundsExceeded> {
		match x <= Self::MAX_SAFE.0 {
			true => Ok(Self(x)),
			false => Err(BoundsExceeded),
		}
	}

	/// Extract the integer value, failing if it does not fit in a 53-bit field.
	pub const fn into_safe(self) -> Result<u64, BoundsExceeded> {
		match self.0 <= Self::MAX_SAFE.0 {
			true => Ok(self.0),
			false => Err(BoundsExceeded),
		}
	}

	/// Extract the integer value
	pub const fn into_inner(self) -> u64 {
		self.0
	}

	/// The number of bytes used by the minimal encoding.
	pub const fn size(&self) -> usize {
		if self.0 < (1 << 6) {
			1
		} else if self.0 < (1 << 14) {
			2
		} else if self.0 < (1 << 30) {
			4
		} else {
			8
		}
	}
}

impl From<VarInt> for u64 {
	fn from(x: VarInt) -> Self {
		x.0
	}
}

impl From<u8> for VarInt {
	fn from(x: u8) -> Self {
		Self(x.into())
	}
}

impl From<u16> for VarInt {
	fn from(x: u16) -> Self {
		Self(x.into())
	}
}

impl From<u32> for VarInt {
	fn from(x: u32) -> Self {
		Self(x.into())
	}
}

impl TryFrom<u64> for VarInt {
	type Error = BoundsExceeded;

	/// Succeeds iff `x` < 2^62
	fn try_from(x: u64) -> Result<Self, BoundsExceeded> {
		Self::from_u64(x).ok_or(BoundsExceeded)
	}
}

impl TryFrom<usize> for VarInt {
	type Error = BoundsExceeded;

	/// Succeeds iff `x` < 2^62
	fn try_from(x: usize) -> Result<Self, BoundsExceeded> {
		Self::try_from(x as u64)
	}
}

impl TryFrom<VarInt> for u32 {
	type Error = BoundsExceeded;

	/// Succeeds iff `x` < 2^32
	fn try_from(x: VarInt) -> Result<Self, BoundsExceeded> {
		u32::try_from(x.0).map_err(|_| BoundsExceeded)
	}
}

impl TryFrom<VarInt> for usize {
	type Error = BoundsExceeded;

	fn try_from(x: VarInt) -> Result<Self, BoundsExceeded> {
		usize::try_from(x.0).map_err(|_| BoundsExceeded)
	}
}

impl fmt::Display for VarInt {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		self.0.fmt(f)
	}
}

impl fmt::Debug for VarInt {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		self.0.fmt(f)
	}
}

impl Decode for VarInt {
	/// Decode a varint from the given reader.
	fn decode<R: bytes::Buf>(r: &mut R) -> Result<Self, DecodeError> {
		if !r.has_remaining() {
			return Err(DecodeError::Short);
		}

		// The first chunk may be shorter than the encoded size, so copy instead of indexing.
		let first = r.get_u8();
		let size = 1usize << (first >> 6);

		if r.remaining() < size - 1 {
			return Err(DecodeError::Short);
		}

		let mut buf = [0u8; 8];
		buf[8 - size] = first & 0b0011_1111;
		r.copy_to_slice(&mut buf[9 - size..]);

		Ok(Self(u64::from_be_bytes(buf)))
	}
}

impl Encode for VarInt {
	/// Encode a varint to the given writer, using the smallest representation.
	fn encode<W: bytes::BufMut>(&self, w: &mut W) -> Result<(), EncodeError> {
		match self.size() {
			1 => w.put_u8(self.0 as u8),
			2 => w.put_u16((0b01 << 14) | self.0 as u16),
			4 => w.put_u32((0b10 << 30) | self.0 as u32),
			_ => w.put_u64((0b11 << 62) | self.0),
		}

		Ok(())
	}
}

impl Encode for u64 {
	fn encode<W: bytes::BufMut>(&self, w: &mut W) -> Result<(), EncodeError> {
		VarInt::try_from(*self)?.encode(w)
	}
}

impl Decode for u64 {
	fn decode<R: bytes::Buf>(r: &mut R) -> Result<Self, DecodeError> {
		VarInt::decode(r).map(VarInt::into_inner)
	}
}

impl Encode for usize {
	fn encode<W: bytes::BufMut>(&self, w: &mut W) -> Result<(), EncodeError> {
		VarInt::try_from(*self)?.encode(w)
	}
}

impl Decode for usize {
	fn decode<R: bytes::Buf>(r: &mut R) -> Result<Self, DecodeError> {
		Ok(VarInt::decode(r)?.try_into()?)
	}
}

impl Encode for u32 {
	fn encode<W: bytes::BufMut>(&self, w: &mut W) -> Result<(), EncodeError> {
		VarInt::from(*self).encode(w)
	}
}

impl Decode for u32 {
	fn decode<R: bytes::Buf>(r: &mut R) -> Result<Self, DecodeError> {
		Ok(VarInt::decode(r)?.try_into()?)
	}
}

#[cfg(test)]
mod tests {
	use bytes::{Buf, BytesMut};

	use super::*;

	fn encode(v: u64) -> BytesMut {
		let mut buf = BytesMut::new();
		VarInt::try_from(v).unwrap().encode(&mut buf).unwrap();
		buf
	}

	#[test]
	fn test_minimal_size() {
		let cases = [
			(0, 1),
			(63, 1),
			(64, 2),
			(16383, 2),
			(16384, 4),
			((1 << 30) - 1, 4),
			(1 << 30, 8),
			(VarInt::MAX.into_inner(), 8),
		];

		for (value, size) in cases {
			let mut buf = encode(value);
			assert_eq!(buf.len(), size, "value {value}");

			let decoded = VarInt::decode(&mut buf).unwrap();
			assert_eq!(decoded.into_inner(), value);
			assert!(!buf.has_remaining());
		}
	}

	#[test]
	fn test_known_encoding() {
		// Examples from RFC 9000, Appendix A.1
		assert_eq!(&encode(37)[..], &[0x25]);
		assert_eq!(&encode(15293)[..], &[0x7b, 0xbd]);
		assert_eq!(&encode(494878333)[..], &[0x9d, 0x7f, 0x3e, 0x7d]);
		assert_eq!(
			&encode(151288809941952652)[..],
			&[0xc2, 0x19, 0x7c, 0x5e, 0xff, 0x14, 0xe8, 0x8c]
		);
	}

	#[test]
	fn test_round_trip_powers() {
		for shift in 0..62 {
			for value in [(1u64 << shift) - 1, 1u64 << shift, (1u64 << shift) + 1] {
				if value > VarInt::MAX.into_inner() {
					continue;
				}

				let mut buf = encode(value);
				assert_eq!(buf.len(), VarInt(value).size());
				assert_eq!(u64::decode(&mut buf).unwrap(), value);
			}
		}
	}

	#[test]
	fn test_overflow() {
		let mut buf = BytesMut::new();
		assert!(matches!(
			(1u64 << 62).encode(&mut buf),
			Err(EncodeError::BoundsExceeded)
		));
		assert!(buf.is_empty());

		assert!(VarInt::from_safe(VarInt::MAX_SAFE.into_inner()).is_ok());
		assert_eq!(VarInt::from_safe(1 << 53), Err(BoundsExceeded));
	}

	#[test]
	fn test_short() {
		let mut buf = encode(16384);
		buf.truncate(3);
		assert!(matches!(VarInt::decode(&mut &buf[..]), Err(DecodeError::Short)));
		assert!(matches!(VarInt::decode(&mut &buf[..1]), Err(DecodeError::Short)));
	}

	// Hands out a single byte per chunk.
	struct Fragmented<'a>(&'a [u8]);

	impl Buf for Fragmented<'_> {
		fn remaining(&self) -> usize {
			self.0.len()
		}

		fn chunk(&self) -> &[u8] {
			&self.0[..self.0.len().min(1)]
		}

		fn advance(&mut self, cnt: usize) {
			self.0 = &self.0[cnt..];
		}
	}

	#[test]
	fn test_fragmented() {
		let mut buf = Fragmented(&[0x7b, 0xbd, 0xc2, 0x19, 0x7c, 0x5e, 0xff, 0x14, 0xe8, 0x8c]);
		assert_eq!(u64::decode(&mut buf).unwrap(), 15293);
		assert_eq!(u64::decode(&mut buf).unwrap(), 151288809941952652);
		assert!(matches!(u64::decode(&mut buf), Err(DecodeError::Short)));
	}
}
