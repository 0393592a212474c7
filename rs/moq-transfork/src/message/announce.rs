use num_enum::{IntoPrimitive, TryFromPrimitive};

use super::StreamBi;
use crate::coding::*;

/// Sent by the publisher to announce the availability of a track.
/// The suffix is appended to the prefix of the [AnnounceInterest].
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Announce {
	pub status: AnnounceStatus,
	pub suffix: String,
}

impl Announce {
	pub fn active(suffix: impl Into<String>) -> Self {
		Self {
			status: AnnounceStatus::Active,
			suffix: suffix.into(),
		}
	}

	pub fn closed(suffix: impl Into<String>) -> Self {
		Self {
			status: AnnounceStatus::Closed,
			suffix: suffix.into(),
		}
	}

	/// Decode, rejecting a suffix longer than `max` bytes.
	pub fn decode_bounded<R: bytes::Buf>(r: &mut R, max: Option<usize>) -> Result<Self, DecodeError> {
		let status = AnnounceStatus::decode(r)?;
		let suffix = decode_string(r, max)?;

		Ok(Self { status, suffix })
	}
}

impl Decode for Announce {
	fn decode<R: bytes::Buf>(r: &mut R) -> Result<Self, DecodeError> {
		Self::decode_bounded(r, None)
	}
}

impl Encode for Announce {
	fn encode<W: bytes::BufMut>(&self, w: &mut W) -> Result<(), EncodeError> {
		self.status.encode(w)?;
		self.suffix.encode(w)
	}
}

/// Whether the track is now available.
#[derive(Clone, Copy, Debug, PartialEq, Eq, IntoPrimitive, TryFromPrimitive)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[repr(u8)]
pub enum AnnounceStatus {
	Closed = 0,
	Active = 1,
}

impl Decode for AnnounceStatus {
	fn decode<R: bytes::Buf>(r: &mut R) -> Result<Self, DecodeError> {
		let status = u64::decode(r)?;
		u8::try_from(status)
			.ok()
			.and_then(|status| status.try_into().ok())
			.ok_or(DecodeError::InvalidValue)
	}
}

impl Encode for AnnounceStatus {
	fn encode<W: bytes::BufMut>(&self, w: &mut W) -> Result<(), EncodeError> {
		u64::from(u8::from(*self)).encode(w)
	}
}

/// Sent by the subscriber to request [Announce] records for tracks with the given prefix.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AnnounceInterest {
	pub prefix: String,
}

impl AnnounceInterest {
	pub const STREAM: StreamBi = StreamBi::Announce;

	/// Decode, rejecting a prefix longer than `max` bytes.
	pub fn decode_bounded<R: bytes::Buf>(r: &mut R, max: Option<usize>) -> Result<Self, DecodeError> {
		let prefix = decode_string(r, max)?;
		Ok(Self { prefix })
	}
}

impl Decode for AnnounceInterest {
	fn decode<R: bytes::Buf>(r: &mut R) -> Result<Self, DecodeError> {
		Self::decode_bounded(r, None)
	}
}

impl Encode for AnnounceInterest {
	fn encode<W: bytes::BufMut>(&self, w: &mut W) -> Result<(), EncodeError> {
		self.prefix.encode(w)
	}
}
