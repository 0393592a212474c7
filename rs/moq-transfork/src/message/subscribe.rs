use num_enum::{IntoPrimitive, TryFromPrimitive};

use super::StreamBi;
use crate::coding::*;

/// The order in which the subscriber would like to receive groups.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, IntoPrimitive, TryFromPrimitive)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[repr(u8)]
pub enum GroupOrder {
	#[default]
	Any = 0,
	Ascending = 1,
	Descending = 2,
}

impl Decode for GroupOrder {
	fn decode<R: bytes::Buf>(r: &mut R) -> Result<Self, DecodeError> {
		let order = VarInt::decode(r)?.into_safe()?;
		u8::try_from(order)
			.ok()
			.and_then(|order| order.try_into().ok())
			.ok_or(DecodeError::InvalidValue)
	}
}

impl Encode for GroupOrder {
	fn encode<W: bytes::BufMut>(&self, w: &mut W) -> Result<(), EncodeError> {
		VarInt::from(u8::from(*self)).encode(w)
	}
}

/// Sent by the subscriber to request all future groups for the given track.
///
/// Groups will use the provided ID instead of the full path, to save bytes.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Subscribe {
	pub id: u64,
	pub path: String,
	pub priority: u64,
	pub order: GroupOrder,
}

impl Subscribe {
	pub const STREAM: StreamBi = StreamBi::Subscribe;

	/// Decode, rejecting a path longer than `max` bytes.
	pub fn decode_bounded<R: bytes::Buf>(r: &mut R, max: Option<usize>) -> Result<Self, DecodeError> {
		let id = u64::decode(r)?;
		let path = decode_string(r, max)?;
		let priority = VarInt::decode(r)?.into_safe()?;
		let order = GroupOrder::decode(r)?;

		Ok(Self {
			id,
			path,
			priority,
			order,
		})
	}
}

impl Decode for Subscribe {
	fn decode<R: bytes::Buf>(r: &mut R) -> Result<Self, DecodeError> {
		Self::decode_bounded(r, None)
	}
}

impl Encode for Subscribe {
	fn encode<W: bytes::BufMut>(&self, w: &mut W) -> Result<(), EncodeError> {
		self.id.encode(w)?;
		self.path.encode(w)?;
		VarInt::from_safe(self.priority)?.encode(w)?;
		self.order.encode(w)
	}
}

/// Sent by the subscriber on an existing Subscribe stream to change its preferences.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SubscribeUpdate {
	pub priority: u64,
	pub order: GroupOrder,
}

impl Decode for SubscribeUpdate {
	fn decode<R: bytes::Buf>(r: &mut R) -> Result<Self, DecodeError> {
		let priority = VarInt::decode(r)?.into_safe()?;
		let order = GroupOrder::decode(r)?;

		Ok(Self { priority, order })
	}
}

impl Encode for SubscribeUpdate {
	fn encode<W: bytes::BufMut>(&self, w: &mut W) -> Result<(), EncodeError> {
		VarInt::from_safe(self.priority)?.encode(w)?;
		self.order.encode(w)
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_subscribe() {
		let msg = Subscribe {
			id: 7,
			path: "cam".to_string(),
			priority: 1,
			order: GroupOrder::Descending,
		};

		let mut buf = msg.encode_bytes().unwrap();
		assert_eq!(&buf[..], &[0x07, 0x03, b'c', b'a', b'm', 0x01, 0x02]);
		assert_eq!(Subscribe::decode(&mut buf).unwrap(), msg);
	}

	#[test]
	fn test_invalid_order() {
		let mut buf: &[u8] = &[0x00, 0x01, b'a', 0x00, 0x03];
		assert!(matches!(Subscribe::decode(&mut buf), Err(DecodeError::InvalidValue)));
	}

	#[test]
	fn test_priority_bounds() {
		let msg = SubscribeUpdate {
			priority: 1 << 53,
			order: GroupOrder::Any,
		};
		assert!(matches!(msg.encode_bytes(), Err(EncodeError::BoundsExceeded)));

		// A 62-bit priority on the wire is out of range too.
		let mut buf = bytes::BytesMut::new();
		(1u64 << 60).encode(&mut buf).unwrap();
		0u64.encode(&mut buf).unwrap();
		assert!(matches!(SubscribeUpdate::decode(&mut buf), Err(DecodeError::BoundsExceeded)));
	}
}
