use bytes::Bytes;

use super::StreamUni;
use crate::coding::*;

/// The header of a unidirectional stream carrying a single group.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Group {
	// The subscribe ID.
	pub subscribe: u64,

	// The group sequence number
	pub sequence: u64,
}

impl Group {
	pub const STREAM: StreamUni = StreamUni::Group;
}

impl Decode for Group {
	fn decode<R: bytes::Buf>(r: &mut R) -> Result<Self, DecodeError> {
		Ok(Self {
			subscribe: u64::decode(r)?,
			sequence: VarInt::decode(r)?.into_safe()?,
		})
	}
}

impl Encode for Group {
	fn encode<W: bytes::BufMut>(&self, w: &mut W) -> Result<(), EncodeError> {
		self.subscribe.encode(w)?;
		VarInt::from_safe(self.sequence)?.encode(w)
	}
}

/// Sent by the publisher on the Subscribe stream when groups will not be delivered.
///
/// Advisory only; the subscriber may ignore it.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct GroupDrop {
	pub sequence: u64,
	pub count: u64,
	pub error: u64,
}

impl Encode for GroupDrop {
	fn encode<W: bytes::BufMut>(&self, w: &mut W) -> Result<(), EncodeError> {
		VarInt::from_safe(self.sequence)?.encode(w)?;
		VarInt::from_safe(self.count)?.encode(w)?;
		VarInt::from_safe(self.error)?.encode(w)
	}
}

impl Decode for GroupDrop {
	fn decode<R: bytes::Buf>(r: &mut R) -> Result<Self, DecodeError> {
		Ok(Self {
			sequence: VarInt::decode(r)?.into_safe()?,
			count: VarInt::decode(r)?.into_safe()?,
			error: VarInt::decode(r)?.into_safe()?,
		})
	}
}

/// A length-prefixed payload within a group stream.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Frame {
	pub payload: Bytes,
}

impl Frame {
	/// Decode a frame, failing as soon as the size exceeds `max` bytes rather than waiting for the payload.
	pub fn decode_bounded<R: bytes::Buf>(r: &mut R, max: Option<usize>) -> Result<Self, DecodeError> {
		let size = VarInt::decode(r)?.into_safe()?;
		let size = usize::try_from(size).map_err(|_| DecodeError::BoundsExceeded)?;

		if let Some(max) = max {
			if size > max {
				return Err(DecodeError::TooLong { size, max });
			}
		}

		if r.remaining() < size {
			return Err(DecodeError::Short);
		}

		let payload = r.copy_to_bytes(size);
		Ok(Self { payload })
	}
}

impl Decode for Frame {
	fn decode<R: bytes::Buf>(r: &mut R) -> Result<Self, DecodeError> {
		Self::decode_bounded(r, None)
	}
}

impl Encode for Frame {
	fn encode<W: bytes::BufMut>(&self, w: &mut W) -> Result<(), EncodeError> {
		VarInt::from_safe(self.payload.len() as u64)?.encode(w)?;
		w.put_slice(&self.payload);
		Ok(())
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_group_stream() {
		let mut buf = bytes::BytesMut::new();
		Group::STREAM.encode(&mut buf).unwrap();
		Group {
			subscribe: 3,
			sequence: 70,
		}
		.encode(&mut buf)
		.unwrap();
		Frame {
			payload: Bytes::from_static(&[0x01, 0x02]),
		}
		.encode(&mut buf)
		.unwrap();

		assert_eq!(&buf[..], &[0x00, 0x03, 0x40, 0x46, 0x02, 0x01, 0x02]);

		assert_eq!(StreamUni::decode(&mut buf).unwrap(), StreamUni::Group);
		assert_eq!(Group::decode(&mut buf).unwrap().sequence, 70);
		assert_eq!(Frame::decode(&mut buf).unwrap().payload, &[0x01, 0x02][..]);
	}

	#[test]
	fn test_frame_short() {
		let mut buf: &[u8] = &[0x05, 0x01, 0x02];
		assert!(matches!(Frame::decode(&mut buf), Err(DecodeError::Short)));
	}

	#[test]
	fn test_frame_too_long() {
		// Only the size has arrived, which is enough to reject it.
		let mut buf: &[u8] = &[0x44, 0x00];
		assert!(matches!(
			Frame::decode_bounded(&mut buf, Some(1000)),
			Err(DecodeError::TooLong { size: 1024, max: 1000 })
		));

		let mut buf: &[u8] = &[0x02, 0x01, 0x02];
		assert_eq!(Frame::decode_bounded(&mut buf, Some(2)).unwrap().payload, &[0x01, 0x02][..]);
	}

	#[test]
	fn test_drop() {
		let drop = GroupDrop {
			sequence: 9,
			count: 1,
			error: 6,
		};

		let mut buf = drop.encode_bytes().unwrap();
		assert_eq!(&buf[..], &[0x09, 0x01, 0x06]);
		assert_eq!(GroupDrop::decode(&mut buf).unwrap(), drop);
	}
}
