use std::sync::Arc;

use web_transport_trait::Session;

use crate::{
	coding::Stream,
	message::{self, Version},
	model::{Announced, Track, TrackReader},
	session::{self, Publisher, Subscriber},
	util::QueueReader,
	Config, Error, Stats,
};

/// A MoQ connection, wrapping a transport session.
///
/// Created via:
/// - [`Connection::connect`] for clients.
/// - [`Connection::accept`] for servers.
///
/// Both sides can publish and subscribe once connected.
/// Streams opened by the peer are served in the background until the transport closes.
#[derive(Clone)]
pub struct Connection<S: Session> {
	session: S,
	publisher: Publisher<S>,
	subscriber: Subscriber<S>,
	version: Version,
}

impl<S: Session> Connection<S> {
	/// Perform the handshake as a client, offering [Version::CURRENT].
	pub async fn connect(session: S) -> Result<Self, Error> {
		Self::connect_with(session, Config::default()).await
	}

	/// Perform the handshake as a client with the given configuration.
	pub async fn connect_with(session: S, config: Config) -> Result<Self, Error> {
		Self::connect_with_stats(session, config, None).await
	}

	/// Perform the handshake as a client, with optional stats hooks.
	///
	/// The [`crate::Stats`] sink counts frame payload bytes only, ignoring framing and retransmissions.
	pub async fn connect_with_stats(
		session: S,
		config: Config,
		stats: Option<Arc<dyn Stats>>,
	) -> Result<Self, Error> {
		let mut stream = Stream::open(&session, message::StreamBi::Session).await?;

		let client = message::SessionClient {
			versions: config.versions.clone(),
		};

		tracing::trace!(?client, "sending client setup");
		stream.writer.encode(&client).await?;

		let server: message::SessionServer = stream.reader.decode().await?;
		tracing::trace!(?server, "received server setup");

		if !client.versions.contains(&server.version) {
			let err = Error::Version(client.versions, [server.version].into());
			stream.abort(&err);
			return Err(err);
		}

		tracing::debug!(version = ?server.version, "connected");

		Ok(Self::start(session, stream, &config, stats, server.version))
	}

	/// Perform the handshake as a server, accepting [Version::CURRENT].
	pub async fn accept(session: S) -> Result<Self, Error> {
		Self::accept_with(session, Config::default()).await
	}

	/// Perform the handshake as a server with the given configuration.
	pub async fn accept_with(session: S, config: Config) -> Result<Self, Error> {
		Self::accept_with_stats(session, config, None).await
	}

	/// Perform the handshake as a server, with optional stats hooks.
	pub async fn accept_with_stats(
		session: S,
		config: Config,
		stats: Option<Arc<dyn Stats>>,
	) -> Result<Self, Error> {
		let mut stream = Stream::accept(&session).await?;

		let kind: message::StreamBi = stream.reader.decode().await?;
		if kind != message::StreamBi::Session {
			let err = Error::UnexpectedStream;
			stream.abort(&err);
			return Err(err);
		}

		let client: message::SessionClient = stream.reader.decode().await?;
		tracing::trace!(?client, "received client setup");

		// Choose the client's most preferred version that we support.
		let version = client.versions.iter().copied().find(|v| config.versions.contains(v));
		let Some(version) = version else {
			let err = Error::Version(client.versions, config.versions);
			stream.abort(&err);
			return Err(err);
		};

		let server = message::SessionServer { version };
		tracing::trace!(?server, "sending server setup");
		stream.writer.encode(&server).await?;

		tracing::debug!(?version, "connected");

		Ok(Self::start(session, stream, &config, stats, version))
	}

	fn start(session: S, setup: Stream<S>, config: &Config, stats: Option<Arc<dyn Stats>>, version: Version) -> Self {
		let publisher = Publisher::new(session.clone(), stats.clone());
		let subscriber = Subscriber::new(session.clone(), config, stats);

		session::start(
			session.clone(),
			setup,
			publisher.clone(),
			subscriber.clone(),
			config.max_path,
		);

		Self {
			session,
			publisher,
			subscriber,
			version,
		}
	}

	/// The negotiated version.
	pub fn version(&self) -> Version {
		self.version
	}

	/// Make a track available to the peer, until the track is closed.
	///
	/// Fails with [Error::Duplicate] if a track with the same path is already published.
	pub fn publish(&self, track: TrackReader) -> Result<(), Error> {
		self.publisher.publish(track)
	}

	/// Subscribe to a track published by the peer.
	///
	/// Returns once the peer has replied; a missing track is reported as [Error::Closed] with the not-found code.
	pub async fn subscribe(&self, track: Track) -> Result<TrackReader, Error> {
		self.subscriber.subscribe(track).await
	}

	/// Discover tracks published by the peer with the given prefix.
	pub async fn announced<P: Into<String>>(&self, prefix: P) -> Result<QueueReader<Announced>, Error> {
		self.subscriber.announced(prefix.into()).await
	}

	/// Close the underlying transport session.
	pub fn close(&self, err: Error) {
		self.session.close(err.to_code(), err.to_string().as_ref());
	}

	/// Block until the transport session is closed, returning the reason.
	pub async fn closed(&self) -> Error {
		Error::transport(self.session.closed().await)
	}
}
