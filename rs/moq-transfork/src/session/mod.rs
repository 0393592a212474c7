//! The background half of a connection: accepting streams and routing them to the publisher or subscriber.
mod priority;
mod publisher;
mod subscriber;

use priority::*;
pub(crate) use publisher::*;
pub(crate) use subscriber::*;

use web_transport_trait::Session;

use crate::{
	coding::{Reader, Stream},
	message, Error,
};

/// Run the connection in the background until the transport closes.
pub(crate) fn start<S: Session>(
	session: S,
	setup: Stream<S>,
	publisher: Publisher<S>,
	subscriber: Subscriber<S>,
	max_path: usize,
) {
	web_async::spawn(async move {
		let res = run(session.clone(), setup, publisher.clone(), subscriber, max_path).await;

		// Finish any announcement streams.
		publisher.close();

		match res {
			Err(Error::Transport(_)) => {
				tracing::info!("session terminated");
				session.close(1, "");
			}
			Err(err) => {
				tracing::warn!(%err, "session error");
				session.close(err.to_code(), err.to_string().as_ref());
			}
			_ => {
				tracing::info!("session closed");
				session.close(0, "");
			}
		}
	});
}

async fn run<S: Session>(
	session: S,
	setup: Stream<S>,
	publisher: Publisher<S>,
	subscriber: Subscriber<S>,
	max_path: usize,
) -> Result<(), Error> {
	tokio::select! {
		res = run_info(setup) => res,
		res = run_bi(session.clone(), publisher, max_path) => res,
		res = run_uni(session, subscriber) => res,
	}
}

async fn run_info<S: Session>(mut setup: Stream<S>) -> Result<(), Error> {
	while let Some(info) = setup.reader.decode_maybe::<message::SessionInfo>().await? {
		tracing::debug!(?info, "received session info");
	}

	// The peer won't send any more info, but the session stays up until the transport closes.
	// Holding the stream keeps our side of it open.
	std::future::pending::<()>().await;

	Ok(())
}

async fn run_bi<S: Session>(session: S, publisher: Publisher<S>, max_path: usize) -> Result<(), Error> {
	loop {
		let mut stream = Stream::accept(&session).await?;
		let publisher = publisher.clone();

		web_async::spawn(async move {
			if let Err(err) = run_bi_stream(&mut stream, publisher, max_path).await {
				tracing::debug!(%err, "bidirectional stream error");
				stream.abort(&err);
			}
		});
	}
}

async fn run_bi_stream<S: Session>(stream: &mut Stream<S>, publisher: Publisher<S>, max_path: usize) -> Result<(), Error> {
	let kind = stream.reader.decode::<message::StreamBi>().await?;
	tracing::trace!(?kind, "accepted stream");

	match kind {
		// Only valid as the first stream, which was consumed by the handshake.
		message::StreamBi::Session => Err(Error::UnexpectedStream),
		message::StreamBi::Announce => {
			let interest = stream
				.reader
				.decode_with(|r| message::AnnounceInterest::decode_bounded(r, Some(max_path)))
				.await?;
			publisher.run_announce(interest, stream).await
		}
		message::StreamBi::Subscribe => {
			let subscribe = stream
				.reader
				.decode_with(|r| message::Subscribe::decode_bounded(r, Some(max_path)))
				.await?;
			publisher.run_subscribe(subscribe, stream).await
		}
	}
}

async fn run_uni<S: Session>(session: S, subscriber: Subscriber<S>) -> Result<(), Error> {
	loop {
		let stream = session.accept_uni().await.map_err(Error::transport)?;
		let subscriber = subscriber.clone();

		web_async::spawn(async move {
			let mut reader = Reader::new(stream);
			if let Err(err) = run_uni_stream(&mut reader, subscriber).await {
				tracing::debug!(%err, "unidirectional stream error");
				reader.stop(&err);
			}
		});
	}
}

async fn run_uni_stream<S: Session>(reader: &mut Reader<S::RecvStream>, subscriber: Subscriber<S>) -> Result<(), Error> {
	let kind = reader.decode::<message::StreamUni>().await?;

	match kind {
		message::StreamUni::Group => {
			let group = reader.decode::<message::Group>().await?;
			subscriber.run_group(group, reader).await
		}
	}
}
