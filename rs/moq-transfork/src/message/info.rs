use super::GroupOrder;
use crate::coding::*;

/// Sent by the publisher in response to a Subscribe, describing the track.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SubscribeInfo {
	pub priority: u64,
	pub order: GroupOrder,

	/// The latest group sequence, or None if there are no groups yet.
	pub latest: Option<u64>,
}

impl Decode for SubscribeInfo {
	fn decode<R: bytes::Buf>(r: &mut R) -> Result<Self, DecodeError> {
		let priority = VarInt::decode(r)?.into_safe()?;
		let order = GroupOrder::decode(r)?;
		let latest = VarInt::decode(r)?.into_safe()?.checked_sub(1);

		Ok(Self {
			priority,
			order,
			latest,
		})
	}
}

impl Encode for SubscribeInfo {
	fn encode<W: bytes::BufMut>(&self, w: &mut W) -> Result<(), EncodeError> {
		VarInt::from_safe(self.priority)?.encode(w)?;
		self.order.encode(w)?;

		// 0 is reserved for no group.
		let latest = match self.latest {
			Some(latest) => latest.checked_add(1).ok_or(EncodeError::BoundsExceeded)?,
			None => 0,
		};
		VarInt::from_safe(latest)?.encode(w)
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_latest() {
		let none = SubscribeInfo {
			priority: 1,
			order: GroupOrder::Any,
			latest: None,
		};

		let mut buf = none.encode_bytes().unwrap();
		assert_eq!(&buf[..], &[0x01, 0x00, 0x00]);
		assert_eq!(SubscribeInfo::decode(&mut buf).unwrap(), none);

		let some = SubscribeInfo {
			latest: Some(4),
			..none
		};

		let mut buf = some.encode_bytes().unwrap();
		assert_eq!(&buf[..], &[0x01, 0x00, 0x05]);
		assert_eq!(SubscribeInfo::decode(&mut buf).unwrap(), some);
	}
}
