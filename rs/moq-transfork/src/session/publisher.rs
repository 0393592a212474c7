use std::{
	collections::{btree_map, BTreeMap, BTreeSet, HashSet},
	sync::Arc,
};

use futures::{stream::FuturesUnordered, FutureExt, StreamExt};
use web_async::Lock;
use web_transport_trait::{SendStream, Session};

use super::{Priorities, PriorityHandle};
use crate::{
	coding::{Stream, Writer},
	message,
	model::{GroupReader, TrackReader},
	util::Watch,
	Error, Stats,
};

/// Serves local tracks to the remote peer.
#[derive(Clone)]
pub(crate) struct Publisher<S: Session> {
	session: S,

	// Tracks available to the peer, keyed by path.
	tracks: Watch<BTreeMap<String, TrackReader>>,

	// The IDs of active subscriptions, used to detect duplicates.
	subscribes: Lock<HashSet<u64>>,

	// Shared by every group stream we send.
	priorities: Priorities,

	stats: Option<Arc<dyn Stats>>,
}

impl<S: Session> Publisher<S> {
	pub fn new(session: S, stats: Option<Arc<dyn Stats>>) -> Self {
		Self {
			session,
			tracks: Default::default(),
			subscribes: Default::default(),
			priorities: Default::default(),
			stats,
		}
	}

	/// Make a track available to the peer until it is closed.
	pub fn publish(&self, track: TrackReader) -> Result<(), Error> {
		let path = track.path.clone();
		let mut duplicate = false;

		self.tracks.update(|tracks| match tracks.entry(path.clone()) {
			btree_map::Entry::Occupied(_) => {
				duplicate = true;
				false
			}
			btree_map::Entry::Vacant(entry) => {
				entry.insert(track.clone());
				true
			}
		})?;

		if duplicate {
			return Err(Error::Duplicate);
		}

		tracing::debug!(%path, "published");

		let tracks = self.tracks.clone();
		web_async::spawn(async move {
			tokio::select! {
				res = track.closed() => tracing::debug!(%path, ?res, "unpublished"),
				// The connection is closing, nothing to clean up.
				_ = tracks.closed() => return,
			}

			// Only remove our own entry, not a track published again under the same path.
			tracks
				.update(|tracks| match tracks.get(&path) {
					Some(existing) if Arc::ptr_eq(&existing.info, &track.info) => tracks.remove(&path).is_some(),
					_ => false,
				})
				.ok();
		});

		Ok(())
	}

	/// Stop serving; announcement streams are finished.
	pub fn close(&self) {
		self.tracks.close(Ok(()));
	}

	#[tracing::instrument("announce", skip_all, fields(prefix = %interest.prefix))]
	pub async fn run_announce(
		&self,
		interest: message::AnnounceInterest,
		stream: &mut Stream<S>,
	) -> Result<(), Error> {
		let prefix = interest.prefix;
		let mut tracks = self.tracks.subscribe();

		// The paths we've told the peer about.
		let mut active = BTreeSet::new();

		loop {
			tokio::select! {
				res = tracks.next_with(|tracks| {
					tracks.keys().filter(|path| path.starts_with(&prefix)).cloned().collect::<BTreeSet<_>>()
				}) => {
					let Some(next) = res? else {
						break;
					};

					for added in next.difference(&active) {
						let suffix = &added[prefix.len()..];
						tracing::debug!(%suffix, "announce");
						stream.writer.encode(&message::Announce::active(suffix)).await?;
					}

					for removed in active.difference(&next) {
						let suffix = &removed[prefix.len()..];
						tracing::debug!(%suffix, "unannounce");
						stream.writer.encode(&message::Announce::closed(suffix)).await?;
					}

					active = next;
				},
				// The peer is no longer interested.
				res = stream.reader.closed() => return res,
			}
		}

		stream.writer.finish()?;
		stream.writer.closed().await
	}

	#[tracing::instrument("subscribe", skip_all, fields(id = subscribe.id, path = %subscribe.path))]
	pub async fn run_subscribe(&self, subscribe: message::Subscribe, stream: &mut Stream<S>) -> Result<(), Error> {
		if !self.subscribes.lock().insert(subscribe.id) {
			return Err(Error::Duplicate);
		}

		let res = self.serve_subscribe(&subscribe, stream).await;
		self.subscribes.lock().remove(&subscribe.id);

		match &res {
			Ok(()) => tracing::debug!("done"),
			Err(err) => tracing::debug!(%err, "failed"),
		}

		res
	}

	async fn serve_subscribe(&self, subscribe: &message::Subscribe, stream: &mut Stream<S>) -> Result<(), Error> {
		let track = self.tracks.with(|tracks| tracks.get(&subscribe.path).cloned());
		let mut track = track.ok_or(Error::NotFound)?;

		let info = message::SubscribeInfo {
			priority: track.priority,
			order: track.order,
			latest: track.latest(),
		};
		tracing::trace!(?info, "sending info");
		stream.writer.encode(&info).await?;

		let mut priority = subscribe.priority;
		let mut order = subscribe.order;
		tracing::debug!(priority, ?order, "active");

		let priorities = &self.priorities;

		let mut tasks = FuturesUnordered::new();
		let mut ended = false;

		while !ended || !tasks.is_empty() {
			tokio::select! {
				res = track.next_group(), if !ended => match res? {
					Some(group) => {
						let sequence = group.sequence;
						let handle = priorities.insert(subscribe.id, priority, order, sequence);
						let task = serve_group(self.session.clone(), self.stats.clone(), subscribe.id, handle, group);
						tasks.push(task.map(move |res| (sequence, res)));
					}
					None => ended = true,
				},
				res = stream.reader.decode_maybe::<message::SubscribeUpdate>() => match res? {
					Some(update) => {
						tracing::debug!(?update, "updated");
						priority = update.priority;
						order = update.order;
						priorities.update(subscribe.id, priority, order);
					}
					// The subscriber is done.
					None => return Ok(()),
				},
				Some((sequence, res)) = tasks.next() => {
					if let Err(err) = res {
						let drop = message::GroupDrop {
							sequence,
							count: 0,
							error: err.to_code().into(),
						};
						tracing::debug!(?drop, %err, "dropped group");
						stream.writer.encode(&drop).await?;
					}
				},
			}
		}

		// Every group has been delivered, so the subscriber won't miss any by seeing the end.
		stream.writer.finish()?;
		stream.writer.closed().await
	}
}

#[tracing::instrument("group", skip_all, fields(sequence = group.sequence))]
async fn serve_group<S: Session>(
	session: S,
	stats: Option<Arc<dyn Stats>>,
	subscribe: u64,
	mut priority: PriorityHandle,
	mut group: GroupReader,
) -> Result<(), Error> {
	let mut stream = Writer::new(session.open_uni().await.map_err(Error::transport)?);
	stream.set_priority(priority.current());

	let res = write_group(&mut stream, stats, subscribe, &mut priority, &mut group).await;
	if let Err(err) = &res {
		stream.reset(err);
	}

	res
}

async fn write_group<W: SendStream>(
	stream: &mut Writer<W>,
	stats: Option<Arc<dyn Stats>>,
	subscribe: u64,
	priority: &mut PriorityHandle,
	group: &mut GroupReader,
) -> Result<(), Error> {
	stream.encode(&message::Group::STREAM).await?;
	stream
		.encode(&message::Group {
			subscribe,
			sequence: group.sequence,
		})
		.await?;

	loop {
		let payload = tokio::select! {
			// Other groups came and went, or the subscriber changed its mind.
			next = priority.next() => {
				tracing::trace!(priority = next, "reprioritized");
				stream.set_priority(next);
				continue;
			}
			res = group.read_frame() => match res? {
				Some(payload) => payload,
				None => break,
			},
		};

		tracing::trace!(size = payload.len(), "writing frame");

		if let Some(stats) = &stats {
			stats.add_tx_bytes(payload.len() as u64);
		}

		stream.encode(&message::Frame { payload }).await?;
	}

	stream.finish()?;
	stream.closed().await
}
