use bytes::{Bytes, BytesMut};
use thiserror::Error;

use super::{BoundsExceeded, VarInt};

/// Write the value to the buffer.
pub trait Encode: Sized {
	/// Encode the value to the given writer.
	///
	/// A value outside the range of its wire field is an error, not a truncation.
	fn encode<W: bytes::BufMut>(&self, w: &mut W) -> Result<(), EncodeError>;

	/// Encode the value into a [Bytes] buffer.
	///
	/// NOTE: This will allocate.
	fn encode_bytes(&self) -> Result<Bytes, EncodeError> {
		let mut buf = BytesMut::new();
		self.encode(&mut buf)?;
		Ok(buf.freeze())
	}
}

/// An encode error.
#[derive(Error, Debug, Clone)]
pub enum EncodeError {
	#[error("bounds exceeded")]
	BoundsExceeded,
}

impl From<BoundsExceeded> for EncodeError {
	fn from(_: BoundsExceeded) -> Self {
		Self::BoundsExceeded
	}
}

impl Encode for u8 {
	fn encode<W: bytes::BufMut>(&self, w: &mut W) -> Result<(), EncodeError> {
		w.put_u8(*self);
		Ok(())
	}
}

impl Encode for String {
	fn encode<W: bytes::BufMut>(&self, w: &mut W) -> Result<(), EncodeError> {
		self.as_str().encode(w)
	}
}

impl Encode for &str {
	fn encode<W: bytes::BufMut>(&self, w: &mut W) -> Result<(), EncodeError> {
		self.len().encode(w)?;
		w.put(self.as_bytes());
		Ok(())
	}
}

impl Encode for Bytes {
	fn encode<W: bytes::BufMut>(&self, w: &mut W) -> Result<(), EncodeError> {
		self.len().encode(w)?;
		w.put_slice(self);
		Ok(())
	}
}

impl Encode for Option<u64> {
	/// Encode the value plus one, reserving 0 for none.
	fn encode<W: bytes::BufMut>(&self, w: &mut W) -> Result<(), EncodeError> {
		match self {
			Some(v) => v.checked_add(1).ok_or(EncodeError::BoundsExceeded)?.encode(w),
			None => VarInt::ZERO.encode(w),
		}
	}
}
