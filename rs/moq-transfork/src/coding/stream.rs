use web_transport_trait::Session;

use crate::{
	coding::{Reader, Writer},
	message::StreamBi,
	Error,
};

/// A [Writer] and [Reader] pair for a single stream.
pub struct Stream<S: Session> {
	pub writer: Writer<S::SendStream>,
	pub reader: Reader<S::RecvStream>,
}

impl<S: Session> Stream<S> {
	/// Open a new stream, writing the type tag.
	pub async fn open(session: &S, kind: StreamBi) -> Result<Self, Error> {
		let (send, recv) = session.open_bi().await.map_err(Error::transport)?;

		let mut writer = Writer::new(send);
		let reader = Reader::new(recv);
		writer.encode(&kind).await?;

		Ok(Stream { writer, reader })
	}

	/// Accept a new stream; the caller decodes the type tag.
	pub async fn accept(session: &S) -> Result<Self, Error> {
		let (send, recv) = session.accept_bi().await.map_err(Error::transport)?;

		let writer = Writer::new(send);
		let reader = Reader::new(recv);

		Ok(Stream { writer, reader })
	}

	/// Abort both halves of the stream with the given error.
	pub fn abort(&mut self, err: &Error) {
		self.writer.reset(err);
		self.reader.stop(err);
	}
}
