use std::{
	collections::{HashMap, HashSet},
	sync::{atomic, Arc},
};

use web_async::Lock;
use web_transport_trait::{RecvStream, Session};

use crate::{
	coding::{Reader, Stream},
	message,
	model::{Announced, GroupWriter, Track, TrackReader, TrackWriter},
	util::{queue, QueueReader, QueueWriter},
	Config, Error, Stats,
};

/// Requests tracks from the remote peer.
#[derive(Clone)]
pub(crate) struct Subscriber<S: Session> {
	session: S,

	// The writer for each active subscription, fed by group streams.
	subscribes: Lock<HashMap<u64, TrackWriter>>,
	next_id: Arc<atomic::AtomicU64>,

	announced_capacity: usize,
	max_path: usize,
	max_frame: usize,
	stats: Option<Arc<dyn Stats>>,
}

impl<S: Session> Subscriber<S> {
	pub fn new(session: S, config: &Config, stats: Option<Arc<dyn Stats>>) -> Self {
		Self {
			session,
			subscribes: Default::default(),
			next_id: Default::default(),
			announced_capacity: config.announced_capacity,
			max_path: config.max_path,
			max_frame: config.max_frame,
			stats,
		}
	}

	/// Discover any tracks matching a prefix.
	pub async fn announced(&self, prefix: String) -> Result<QueueReader<Announced>, Error> {
		let mut stream = Stream::open(&self.session, message::AnnounceInterest::STREAM).await?;
		stream
			.writer
			.encode(&message::AnnounceInterest { prefix: prefix.clone() })
			.await?;

		let (writer, reader) = queue(self.announced_capacity);
		let max_path = self.max_path;

		web_async::spawn(async move {
			match run_announced(&mut stream, &prefix, &writer, max_path).await {
				Ok(()) => {
					tracing::debug!(%prefix, "announced done");
					writer.close();
				}
				Err(err) => {
					tracing::debug!(%prefix, %err, "announced error");
					stream.abort(&err);
					writer.abort(err);
				}
			}
		});

		Ok(reader)
	}

	/// Subscribe to a given track, returning once the publisher has accepted it.
	pub async fn subscribe(&self, track: Track) -> Result<TrackReader, Error> {
		let id = self.next_id.fetch_add(1, atomic::Ordering::Relaxed);
		let (writer, reader) = track.produce();

		// Registered first, so group streams that beat the reply aren't dropped.
		self.subscribes.lock().insert(id, writer.clone());

		let mut stream = match Stream::open(&self.session, message::Subscribe::STREAM).await {
			Ok(stream) => stream,
			Err(err) => {
				self.subscribes.lock().remove(&id);
				return Err(err);
			}
		};

		let info = match start_subscribe(id, &writer, &mut stream).await {
			Ok(info) => info,
			Err(err) => {
				tracing::debug!(id, path = %writer.path, %err, "subscribe failed");
				self.subscribes.lock().remove(&id);
				stream.abort(&err);
				writer.abort(err.clone());
				return Err(err);
			}
		};

		tracing::debug!(id, path = %writer.path, ?info, "subscribed");

		let this = self.clone();
		web_async::spawn(async move {
			match run_subscribe(&mut stream, &writer).await {
				Ok(()) => {
					tracing::debug!(id, path = %writer.path, "subscribe done");
					writer.close();
					stream.writer.finish().ok();
				}
				Err(err) => {
					tracing::debug!(id, path = %writer.path, %err, "subscribe closed");
					stream.abort(&err);
					writer.abort(err);
				}
			}

			this.subscribes.lock().remove(&id);
		});

		Ok(reader)
	}

	/// Receive a group stream, after its type has been decoded.
	#[tracing::instrument("group", skip_all, fields(subscribe = group.subscribe, sequence = group.sequence))]
	pub async fn run_group(&self, group: message::Group, stream: &mut Reader<S::RecvStream>) -> Result<(), Error> {
		let track = self.subscribes.lock().get(&group.subscribe).cloned();

		// Late data after the subscription ended.
		let Some(mut track) = track else {
			tracing::debug!("unknown subscription");
			stream.stop(&Error::Cancel);
			return Ok(());
		};

		let mut writer = match track.create_group(group.sequence) {
			Ok(writer) => writer,
			Err(err) => {
				stream.stop(&err);
				return Err(err);
			}
		};

		match read_frames(stream, &mut writer, self.max_frame, self.stats.as_deref()).await {
			Ok(()) => {
				tracing::trace!(frames = writer.frame_count(), "group done");
				writer.close();
				Ok(())
			}
			Err(err) => {
				stream.stop(&err);
				writer.abort(err.clone());
				Err(err)
			}
		}
	}
}

async fn run_announced<S: Session>(
	stream: &mut Stream<S>,
	prefix: &str,
	queue: &QueueWriter<Announced>,
	max_path: usize,
) -> Result<(), Error> {
	// Suffixes that are currently active.
	let mut active = HashSet::new();

	while !stream.reader.done().await? {
		let announce = stream
			.reader
			.decode_with(|r| message::Announce::decode_bounded(r, Some(max_path)))
			.await?;

		let path = format!("{prefix}{}", announce.suffix);

		let announced = match announce.status {
			message::AnnounceStatus::Active => {
				if !active.insert(announce.suffix) {
					return Err(Error::ProtocolViolation("duplicate announce"));
				}
				tracing::debug!(%path, "announced");
				Announced::active(path)
			}
			message::AnnounceStatus::Closed => {
				if !active.remove(&announce.suffix) {
					return Err(Error::ProtocolViolation("unknown unannounce"));
				}
				tracing::debug!(%path, "unannounced");
				Announced::closed(path)
			}
		};

		queue.push(announced).await?;
	}

	Ok(())
}

async fn start_subscribe<S: Session>(
	id: u64,
	track: &TrackWriter,
	stream: &mut Stream<S>,
) -> Result<message::SubscribeInfo, Error> {
	let request = message::Subscribe {
		id,
		path: track.path.clone(),
		priority: track.priority,
		order: track.order,
	};

	tracing::trace!(?request, "sending subscribe");
	stream.writer.encode(&request).await?;

	stream.reader.decode().await
}

async fn run_subscribe<S: Session>(stream: &mut Stream<S>, track: &TrackWriter) -> Result<(), Error> {
	loop {
		tokio::select! {
			res = stream.reader.decode_maybe::<message::GroupDrop>() => match res? {
				// Advisory only.
				Some(drop) => tracing::debug!(?drop, "group dropped"),
				None => return Ok(()),
			},
			// Nobody is reading the track any longer.
			res = track.closed() => {
				res?;
				return Err(Error::Cancel);
			}
		}
	}
}

async fn read_frames<R: RecvStream>(
	stream: &mut Reader<R>,
	group: &mut GroupWriter,
	max_frame: usize,
	stats: Option<&dyn Stats>,
) -> Result<(), Error> {
	while !stream.done().await? {
		let frame = stream
			.decode_with(|r| message::Frame::decode_bounded(r, Some(max_frame)))
			.await?;

		tracing::trace!(size = frame.payload.len(), "read frame");

		if let Some(stats) = stats {
			stats.add_rx_bytes(frame.payload.len() as u64);
		}

		group.write_frame(frame.payload)?;
	}

	Ok(())
}
