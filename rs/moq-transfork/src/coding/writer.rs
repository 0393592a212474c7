use std::fmt::Debug;

use web_transport_trait::SendStream;

use crate::{coding::*, Error};

/// A wrapper around a [SendStream] that will reset on Drop.
pub struct Writer<S: SendStream> {
	stream: Option<S>,
	buffer: bytes::BytesMut,
}

impl<S: SendStream> Writer<S> {
	pub fn new(stream: S) -> Self {
		Self {
			stream: Some(stream),
			buffer: Default::default(),
		}
	}

	// Only None after release(), which consumes the writer.
	fn stream(&mut self) -> &mut S {
		self.stream.as_mut().expect("stream released")
	}

	/// Encode the given message to the stream.
	pub async fn encode<T: Encode + Debug>(&mut self, msg: &T) -> Result<(), Error> {
		self.buffer.clear();
		msg.encode(&mut self.buffer)?;

		let mut buffer = std::mem::take(&mut self.buffer);
		let res = self.write_all(&mut buffer).await;
		self.buffer = buffer;

		res
	}

	/// Write the entire [bytes::Buf] to the stream.
	///
	/// NOTE: This can avoid performing a copy when using [bytes::Bytes].
	pub async fn write_all<B: bytes::Buf + Send>(&mut self, buf: &mut B) -> Result<(), Error> {
		while buf.has_remaining() {
			self.stream().write_buf(buf).await.map_err(Error::transport)?;
		}
		Ok(())
	}

	/// Mark the stream as finished.
	pub fn finish(&mut self) -> Result<(), Error> {
		self.stream().finish().map_err(Error::transport)
	}

	/// Abort the stream, using the code for the given error.
	pub fn reset(&mut self, err: &Error) {
		self.stream().reset(err.to_code());
	}

	/// Wait for the stream to be closed, or the [Self::finish] to be acknowledged by the peer.
	pub async fn closed(&mut self) -> Result<(), Error> {
		self.stream().closed().await.map_err(Error::transport)
	}

	/// Set the priority of the stream; higher values are sent first.
	pub fn set_priority(&mut self, priority: u8) {
		self.stream().set_priority(priority);
	}

	/// Hand back the underlying stream without resetting it.
	pub fn release(mut self) -> S {
		// Drop still runs, but there's nothing left to reset.
		self.stream.take().expect("stream released")
	}
}

impl<S: SendStream> Drop for Writer<S> {
	fn drop(&mut self) {
		if let Some(mut stream) = self.stream.take() {
			// Unlike the QUIC default, we abort the stream on drop.
			stream.reset(Error::Cancel.to_code());
		}
	}
}

#[cfg(test)]
mod tests {
	use bytes::{Bytes, BytesMut};

	use super::*;
	use web_transport_trait::{RecvStream as _, Session as _};

	use crate::transport::mem;

	#[tokio::test]
	async fn test_encode_finish() {
		let (a, b) = mem::pair();

		let mut writer = Writer::new(a.open_uni().await.unwrap());
		writer.encode(&"hi".to_string()).await.unwrap();
		writer.encode(&300u64).await.unwrap();
		writer.finish().unwrap();
		drop(writer);

		let mut recv = b.accept_uni().await.unwrap();
		let mut buf = BytesMut::new();
		while recv.read_buf(&mut buf).await.unwrap().is_some() {}

		assert_eq!(&buf[..], &[0x02, b'h', b'i', 0x41, 0x2c]);
	}

	#[tokio::test]
	async fn test_drop_resets() {
		let (a, b) = mem::pair();

		let mut writer = Writer::new(a.open_uni().await.unwrap());
		writer.write_all(&mut Bytes::from_static(b"partial")).await.unwrap();
		drop(writer);

		let mut recv = b.accept_uni().await.unwrap();
		assert_eq!(recv.read_chunk(100).await.unwrap().unwrap(), "partial");
		assert!(matches!(
			recv.read_chunk(100).await,
			Err(mem::Error::Reset(code)) if code == Error::Cancel.to_code()
		));
	}

	#[tokio::test]
	async fn test_priority() {
		let (a, b) = mem::pair();

		let mut writer = Writer::new(a.open_uni().await.unwrap());
		writer.set_priority(200);

		let recv = b.accept_uni().await.unwrap();
		assert_eq!(recv.priority(), 200);
	}

	#[tokio::test]
	async fn test_peer_stop() {
		let (a, b) = mem::pair();

		let mut writer = Writer::new(a.open_uni().await.unwrap());
		let mut recv = b.accept_uni().await.unwrap();
		recv.stop(Error::NotFound.to_code());

		// The peer's code survives the transport.
		assert!(matches!(writer.closed().await, Err(Error::Closed(6))));
		assert!(matches!(writer.encode(&1u64).await, Err(Error::Closed(6))));
	}

	#[tokio::test]
	async fn test_encode_overflow() {
		let (a, _b) = mem::pair();

		let mut writer = Writer::new(a.open_uni().await.unwrap());
		assert!(matches!(
			writer.encode(&u64::MAX).await,
			Err(Error::Encode(EncodeError::BoundsExceeded))
		));
	}
}
