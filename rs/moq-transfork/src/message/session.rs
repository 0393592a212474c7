use super::{Version, Versions};
use crate::coding::*;

/// Sent by the client on the session stream to offer versions.
#[derive(Clone, Debug)]
pub struct SessionClient {
	pub versions: Versions,
}

impl Decode for SessionClient {
	fn decode<R: bytes::Buf>(r: &mut R) -> Result<Self, DecodeError> {
		let versions = Versions::decode(r)?;
		Ok(Self { versions })
	}
}

impl Encode for SessionClient {
	fn encode<W: bytes::BufMut>(&self, w: &mut W) -> Result<(), EncodeError> {
		self.versions.encode(w)
	}
}

/// Sent by the server in response, choosing one of the offered versions.
#[derive(Clone, Debug)]
pub struct SessionServer {
	pub version: Version,
}

impl Decode for SessionServer {
	fn decode<R: bytes::Buf>(r: &mut R) -> Result<Self, DecodeError> {
		let version = Version::decode(r)?;
		Ok(Self { version })
	}
}

impl Encode for SessionServer {
	fn encode<W: bytes::BufMut>(&self, w: &mut W) -> Result<(), EncodeError> {
		self.version.encode(w)
	}
}

/// Sent by either side on the session stream after the handshake, as often as it likes.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct SessionInfo {
	/// The estimated bitrate in bits per second, if known.
	pub bitrate: Option<u64>,
}

impl Decode for SessionInfo {
	fn decode<R: bytes::Buf>(r: &mut R) -> Result<Self, DecodeError> {
		let bitrate = Option::<u64>::decode(r)?;
		Ok(Self { bitrate })
	}
}

impl Encode for SessionInfo {
	fn encode<W: bytes::BufMut>(&self, w: &mut W) -> Result<(), EncodeError> {
		self.bitrate.encode(w)
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_client() {
		let client = SessionClient {
			versions: [Version::CURRENT, Version(1)].into(),
		};

		let mut buf = client.encode_bytes().unwrap();
		assert_eq!(&buf[..], &[0x02, 0xc0, 0, 0, 0, 0xff, 0x0b, 0xad, 0x00, 0x01]);

		let decoded = SessionClient::decode(&mut buf).unwrap();
		assert_eq!(decoded.versions, client.versions);
	}
}
