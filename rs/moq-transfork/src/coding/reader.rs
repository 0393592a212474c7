use std::{cmp, fmt::Debug, io};

use bytes::{Buf, BufMut, Bytes, BytesMut};

use web_transport_trait::RecvStream;

use crate::{coding::*, Error};

/// A reader for decoding messages from a stream.
pub struct Reader<S: RecvStream> {
	stream: S,
	buffer: BytesMut,
}

impl<S: RecvStream> Reader<S> {
	pub fn new(stream: S) -> Self {
		Self {
			stream,
			buffer: Default::default(),
		}
	}

	/// Decode the next message from the stream.
	pub async fn decode<T: Decode + Debug>(&mut self) -> Result<T, Error> {
		self.decode_with(|r| T::decode(r)).await
	}

	/// Decode a length-prefixed string, failing if it is longer than `max` bytes.
	///
	/// Nothing is consumed on failure.
	pub async fn decode_string(&mut self, max: Option<usize>) -> Result<String, Error> {
		self.decode_with(|r| decode_string(r, max)).await
	}

	/// Decode the next value using the given function, reading more data while it reports [DecodeError::Short].
	pub async fn decode_with<T, F>(&mut self, mut f: F) -> Result<T, Error>
	where
		F: FnMut(&mut io::Cursor<&BytesMut>) -> Result<T, DecodeError>,
	{
		loop {
			let mut cursor = io::Cursor::new(&self.buffer);
			match f(&mut cursor) {
				Ok(msg) => {
					self.buffer.advance(cursor.position() as usize);
					return Ok(msg);
				}
				Err(DecodeError::Short) => {
					// Try to read more data
					if self.stream.read_buf(&mut self.buffer).await.map_err(Error::transport)?.is_none() {
						// Stream closed while we still need more data
						return Err(DecodeError::Short.into());
					}
				}
				Err(e) => {
					tracing::trace!(buffer = %hex::encode(&self.buffer), "failed to decode");
					return Err(e.into());
				}
			}
		}
	}

	/// Decode the next message unless the stream is closed.
	pub async fn decode_maybe<T: Decode + Debug>(&mut self) -> Result<Option<T>, Error> {
		match self.done().await? {
			true => Ok(None),
			false => Ok(Some(self.decode().await?)),
		}
	}

	/// Decode the next message from the stream without consuming it.
	pub async fn decode_peek<T: Decode + Debug>(&mut self) -> Result<T, Error> {
		loop {
			let mut cursor = io::Cursor::new(&self.buffer);
			match T::decode(&mut cursor) {
				Ok(msg) => return Ok(msg),
				Err(DecodeError::Short) => {
					if self.stream.read_buf(&mut self.buffer).await.map_err(Error::transport)?.is_none() {
						return Err(DecodeError::Short.into());
					}
				}
				Err(e) => return Err(e.into()),
			}
		}
	}

	/// Returns a non-zero chunk of data, or None if the stream is closed
	pub async fn read(&mut self, max: usize) -> Result<Option<Bytes>, Error> {
		if !self.buffer.is_empty() {
			let size = cmp::min(max, self.buffer.len());
			let data = self.buffer.split_to(size).freeze();
			return Ok(Some(data));
		}

		self.stream.read_chunk(max).await.map_err(Error::transport)
	}

	/// Read exactly the given number of bytes from the stream.
	pub async fn read_exact(&mut self, size: usize) -> Result<Bytes, Error> {
		// An optimization to avoid a copy if we have enough data in the buffer
		if self.buffer.len() >= size {
			return Ok(self.buffer.split_to(size).freeze());
		}

		let data = BytesMut::with_capacity(size.min(u16::MAX as usize));
		let mut buf = data.limit(size);

		let size = cmp::min(buf.remaining_mut(), self.buffer.len());
		let data = self.buffer.split_to(size);
		buf.put(data);

		while buf.has_remaining_mut() {
			if self.stream.read_buf(&mut buf).await.map_err(Error::transport)?.is_none() {
				return Err(DecodeError::Short.into());
			}
		}

		Ok(buf.into_inner().freeze())
	}

	/// Read until the end of the stream.
	pub async fn read_all(&mut self) -> Result<Bytes, Error> {
		while self.stream.read_buf(&mut self.buffer).await.map_err(Error::transport)?.is_some() {}
		Ok(self.buffer.split().freeze())
	}

	/// Return the next `size` bytes without consuming them.
	pub async fn peek(&mut self, size: usize) -> Result<Bytes, Error> {
		while self.buffer.len() < size {
			if self.stream.read_buf(&mut self.buffer).await.map_err(Error::transport)?.is_none() {
				return Err(DecodeError::Short.into());
			}
		}

		Ok(Bytes::copy_from_slice(&self.buffer[..size]))
	}

	/// Returns true if there's no buffered data and the stream has ended.
	pub async fn done(&mut self) -> Result<bool, Error> {
		if !self.buffer.is_empty() {
			return Ok(false);
		}

		Ok(self.stream.read_buf(&mut self.buffer).await.map_err(Error::transport)?.is_none())
	}

	/// Wait until the stream is closed, erroring if there are any additional bytes.
	pub async fn closed(&mut self) -> Result<(), Error> {
		match self.done().await? {
			true => Ok(()),
			false => Err(DecodeError::ExpectedEnd.into()),
		}
	}

	/// Tell the peer to stop sending, using the code for the given error.
	pub fn stop(&mut self, err: &Error) {
		self.stream.stop(err.to_code());
	}

	/// Hand back the underlying stream and anything buffered but not yet consumed.
	pub fn release(self) -> (S, Bytes) {
		(self.stream, self.buffer.freeze())
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use web_transport_trait::{SendStream as _, Session as _};

	use crate::transport::mem;

	async fn stream(data: &'static [u8]) -> Reader<mem::RecvStream> {
		let (a, b) = mem::pair();

		let mut send = a.open_uni().await.unwrap();
		send.write_buf(&mut Bytes::from_static(data)).await.unwrap();
		send.finish().unwrap();

		Reader::new(b.accept_uni().await.unwrap())
	}

	#[tokio::test]
	async fn test_peek_read() {
		let mut reader = stream(b"hello world").await;

		assert_eq!(reader.peek(5).await.unwrap(), "hello");
		assert_eq!(reader.read_exact(6).await.unwrap(), "hello ");
		assert!(!reader.done().await.unwrap());
		assert_eq!(reader.read_all().await.unwrap(), "world");
		assert!(reader.done().await.unwrap());
	}

	#[tokio::test]
	async fn test_read_exact_short() {
		let mut reader = stream(b"abc").await;
		assert!(matches!(
			reader.read_exact(4).await,
			Err(Error::Decode(DecodeError::Short))
		));
	}

	#[tokio::test]
	async fn test_string_max() {
		let mut reader = stream(b"\x05hello\x02hi").await;

		// Rejected without consuming anything.
		assert!(matches!(
			reader.decode_string(Some(3)).await,
			Err(Error::Decode(DecodeError::TooLong { size: 5, max: 3 }))
		));

		assert_eq!(reader.decode_string(Some(5)).await.unwrap(), "hello");
		assert_eq!(reader.decode_string(Some(3)).await.unwrap(), "hi");
		reader.closed().await.unwrap();
	}

	#[tokio::test]
	async fn test_decode_maybe() {
		let mut reader = stream(&[0x01, 0x40, 0x40]).await;

		assert_eq!(reader.decode_maybe::<u64>().await.unwrap(), Some(1));
		assert_eq!(reader.decode_maybe::<u64>().await.unwrap(), Some(64));
		assert_eq!(reader.decode_maybe::<u64>().await.unwrap(), None);
	}

	#[tokio::test]
	async fn test_release() {
		let mut reader = stream(&[0x02, 0xaa, 0xbb]).await;

		let tag: u8 = reader.decode_peek().await.unwrap();
		assert_eq!(tag, 2);

		let tag: u8 = reader.decode().await.unwrap();
		assert_eq!(tag, 2);

		let (_stream, remaining) = reader.release();
		assert_eq!(&remaining[..], &[0xaa, 0xbb]);
	}
}
