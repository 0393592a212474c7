use std::string::FromUtf8Error;
use thiserror::Error;

use super::BoundsExceeded;

/// Read the value from the buffer.
///
/// If [DecodeError::Short] is returned, the caller should try again with more data.
/// Implementations must not be relied upon to leave the buffer untouched on error; callers decode from a cursor.
pub trait Decode: Sized {
	/// Decode the value from the given buffer.
	fn decode<B: bytes::Buf>(buf: &mut B) -> Result<Self, DecodeError>;
}

/// A decode error.
#[derive(Error, Debug, Clone)]
pub enum DecodeError {
	#[error("short buffer")]
	Short,

	#[error("invalid string")]
	InvalidString(#[from] FromUtf8Error),

	#[error("invalid message: {0:?}")]
	InvalidMessage(u64),

	#[error("invalid value")]
	InvalidValue,

	#[error("string too long: {size} > {max}")]
	TooLong { size: usize, max: usize },

	#[error("bounds exceeded")]
	BoundsExceeded,

	#[error("expected end")]
	ExpectedEnd,
}

impl From<BoundsExceeded> for DecodeError {
	fn from(_: BoundsExceeded) -> Self {
		Self::BoundsExceeded
	}
}

impl Decode for u8 {
	fn decode<R: bytes::Buf>(r: &mut R) -> Result<Self, DecodeError> {
		match r.has_remaining() {
			true => Ok(r.get_u8()),
			false => Err(DecodeError::Short),
		}
	}
}

impl Decode for String {
	/// Decode a string with a varint length prefix.
	fn decode<R: bytes::Buf>(r: &mut R) -> Result<Self, DecodeError> {
		decode_string(r, None)
	}
}

/// Decode a string with a varint length prefix, failing if it is longer than `max` bytes.
///
/// The length is checked before the payload, so an oversized string fails without waiting for it to arrive.
pub fn decode_string<R: bytes::Buf>(r: &mut R, max: Option<usize>) -> Result<String, DecodeError> {
	let size = usize::decode(r)?;

	if let Some(max) = max {
		if size > max {
			return Err(DecodeError::TooLong { size, max });
		}
	}

	if r.remaining() < size {
		return Err(DecodeError::Short);
	}

	let mut buf = vec![0; size];
	r.copy_to_slice(&mut buf);

	Ok(String::from_utf8(buf)?)
}

impl Decode for bytes::Bytes {
	fn decode<R: bytes::Buf>(r: &mut R) -> Result<Self, DecodeError> {
		let len = usize::decode(r)?;
		if r.remaining() < len {
			return Err(DecodeError::Short);
		}
		let bytes = r.copy_to_bytes(len);
		Ok(bytes)
	}
}

impl Decode for Option<u64> {
	/// Decode a value where 0 means none, and anything else is the value plus one.
	fn decode<R: bytes::Buf>(r: &mut R) -> Result<Self, DecodeError> {
		Ok(u64::decode(r)?.checked_sub(1))
	}
}

#[cfg(test)]
mod tests {
	use bytes::BytesMut;

	use super::*;
	use crate::coding::Encode;

	#[test]
	fn test_string() {
		let long = "x".repeat(300);

		for s in ["", "a", "hello/world", "ünïcødé 🎥", long.as_str()] {
			let mut buf = BytesMut::new();
			s.encode(&mut buf).unwrap();

			let decoded = String::decode(&mut buf).unwrap();
			assert_eq!(decoded, s);
			assert!(buf.is_empty());
		}
	}

	#[test]
	fn test_string_max() {
		let mut buf = BytesMut::new();
		"hello".encode(&mut buf).unwrap();

		// Only the length prefix is needed to reject it.
		let mut prefix = &buf[..1];
		assert!(matches!(
			decode_string(&mut prefix, Some(4)),
			Err(DecodeError::TooLong { size: 5, max: 4 })
		));

		let mut cursor = &buf[..];
		assert_eq!(decode_string(&mut cursor, Some(5)).unwrap(), "hello");
	}

	#[test]
	fn test_string_invalid_utf8() {
		let mut buf: &[u8] = &[2, 0xc3, 0x28];
		assert!(matches!(String::decode(&mut buf), Err(DecodeError::InvalidString(_))));
	}

	#[test]
	fn test_option() {
		let mut buf = BytesMut::new();
		None::<u64>.encode(&mut buf).unwrap();
		Some(4u64).encode(&mut buf).unwrap();
		assert_eq!(&buf[..], &[0, 5]);

		assert_eq!(Option::<u64>::decode(&mut buf).unwrap(), None);
		assert_eq!(Option::<u64>::decode(&mut buf).unwrap(), Some(4));
	}
}
