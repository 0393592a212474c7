use num_enum::{IntoPrimitive, TryFromPrimitive};

use crate::coding::*;

/// The first byte of a bidirectional stream, selecting the message that follows.
#[derive(Debug, PartialEq, Eq, Clone, Copy, IntoPrimitive, TryFromPrimitive)]
#[repr(u8)]
pub enum StreamBi {
	/// Only valid as the first stream opened by the client.
	Session = 0,
	Announce = 1,
	Subscribe = 2,
}

/// The first byte of a unidirectional stream.
#[derive(Debug, PartialEq, Eq, Clone, Copy, IntoPrimitive, TryFromPrimitive)]
#[repr(u8)]
pub enum StreamUni {
	Group = 0,
}

impl Decode for StreamBi {
	fn decode<R: bytes::Buf>(r: &mut R) -> Result<Self, DecodeError> {
		let t = u8::decode(r)?;
		t.try_into().map_err(|_| DecodeError::InvalidMessage(t.into()))
	}
}

impl Encode for StreamBi {
	fn encode<W: bytes::BufMut>(&self, w: &mut W) -> Result<(), EncodeError> {
		u8::from(*self).encode(w)
	}
}

impl Decode for StreamUni {
	fn decode<R: bytes::Buf>(r: &mut R) -> Result<Self, DecodeError> {
		let t = u8::decode(r)?;
		t.try_into().map_err(|_| DecodeError::InvalidMessage(t.into()))
	}
}

impl Encode for StreamUni {
	fn encode<W: bytes::BufMut>(&self, w: &mut W) -> Result<(), EncodeError> {
		u8::from(*self).encode(w)
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_tags() {
		assert_eq!(&StreamBi::Announce.encode_bytes().unwrap()[..], &[0x01]);
		assert_eq!(&StreamBi::Subscribe.encode_bytes().unwrap()[..], &[0x02]);
		assert_eq!(&StreamUni::Group.encode_bytes().unwrap()[..], &[0x00]);

		let mut buf: &[u8] = &[0x07];
		assert!(matches!(StreamBi::decode(&mut buf), Err(DecodeError::InvalidMessage(7))));

		let mut buf: &[u8] = &[0x01];
		assert!(matches!(StreamUni::decode(&mut buf), Err(DecodeError::InvalidMessage(1))));
	}
}
