//! A track is a collection of semi-reliable and semi-ordered groups, split into a [TrackWriter] and [TrackReader] handle.
//!
//! A [TrackWriter] creates groups with a sequence number.
//! Only a group newer than the current latest is advertised to readers;
//! older groups are still accepted so late data can be written without error, but nobody reads them.
//!
//! A [TrackReader] may not receive all groups in order or at all.
//! Groups are meant to be transmitted over congested networks and the key to MoQ is to not block on them.
//! A cloned [TrackReader] will receive a copy of all new groups going forward (fanout).
//!
//! The track is closed with [Error::Cancel] when all writers or all readers are dropped.

use std::{
	fmt, ops,
	sync::{
		atomic::{AtomicUsize, Ordering},
		Arc,
	},
};

use super::{Group, GroupReader, GroupWriter};
use crate::{
	message::GroupOrder,
	util::{Watch, WatchReader},
	Error,
};

/// Static information about a track.
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Track {
	pub path: String,
	pub priority: u64,
	pub order: GroupOrder,
}

impl Track {
	pub fn new<T: Into<String>>(path: T) -> Self {
		Self {
			path: path.into(),
			priority: 0,
			order: GroupOrder::default(),
		}
	}

	pub fn with_priority(mut self, priority: u64) -> Self {
		self.priority = priority;
		self
	}

	pub fn with_order(mut self, order: GroupOrder) -> Self {
		self.order = order;
		self
	}

	pub fn produce(self) -> (TrackWriter, TrackReader) {
		let state = Watch::new(TrackState::default());
		let info = Arc::new(self);

		let writer = TrackWriter {
			info: info.clone(),
			state: state.clone(),
			readers: Default::default(),
			_guard: Arc::new(WriterGuard { state }),
		};
		let reader = writer.reader();

		(writer, reader)
	}
}

#[derive(Default)]
struct TrackState {
	latest: Option<GroupReader>,
}

// Closes the track once every writer is gone.
struct WriterGuard {
	state: Watch<TrackState>,
}

impl Drop for WriterGuard {
	fn drop(&mut self) {
		self.state.close(Err(Error::Cancel));
	}
}

/// Creates groups for a track; cloned writers share the same track.
#[derive(Clone)]
pub struct TrackWriter {
	pub info: Arc<Track>,
	state: Watch<TrackState>,
	readers: Arc<AtomicUsize>,
	_guard: Arc<WriterGuard>,
}

impl TrackWriter {
	/// Create a group with the next sequence number: one more than the latest, starting at 0.
	pub fn append_group(&mut self) -> Result<GroupWriter, Error> {
		self.insert(|latest| latest.map(|latest| latest.saturating_add(1)).unwrap_or(0))
	}

	/// Create a group with the given sequence number.
	///
	/// The group only becomes the latest if it is newer; otherwise it is returned but never advertised.
	pub fn create_group(&mut self, sequence: u64) -> Result<GroupWriter, Error> {
		self.insert(|_| sequence)
	}

	fn insert<F: FnOnce(Option<u64>) -> u64>(&mut self, sequence: F) -> Result<GroupWriter, Error> {
		let mut writer = None;

		self.state.update(|state| {
			let latest = state.latest.as_ref().map(|group| group.sequence);
			let (group, reader) = Group::new(sequence(latest)).produce();

			let newer = match latest {
				Some(latest) => group.sequence > latest,
				None => true,
			};

			if newer {
				state.latest = Some(reader);
			}

			writer = Some(group);
			newer
		})?;

		writer.ok_or(Error::Cancel)
	}

	/// The sequence number of the latest group, if any.
	pub fn latest(&self) -> Option<u64> {
		self.state.with(|state| state.latest.as_ref().map(|group| group.sequence))
	}

	/// Gracefully end the track; readers see the end after the latest group.
	pub fn close(&self) {
		self.state.close(Ok(()));
	}

	/// End the track with an error.
	pub fn abort(&self, err: Error) {
		self.state.close(Err(err));
	}

	/// Block until the track is closed, by us or because every reader is gone.
	pub async fn closed(&self) -> Result<(), Error> {
		self.state.closed().await
	}

	pub fn is_closed(&self) -> bool {
		self.state.is_closed()
	}

	/// Create a new reader, starting from the latest group.
	pub fn reader(&self) -> TrackReader {
		self.readers.fetch_add(1, Ordering::AcqRel);

		TrackReader {
			info: self.info.clone(),
			watch: self.state.clone(),
			state: self.state.subscribe(),
			readers: self.readers.clone(),
		}
	}
}

impl ops::Deref for TrackWriter {
	type Target = Track;

	fn deref(&self) -> &Self::Target {
		&self.info
	}
}

impl fmt::Debug for TrackWriter {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("TrackWriter")
			.field("path", &self.info.path)
			.field("latest", &self.latest())
			.finish()
	}
}

/// Receives the groups of a track.
pub struct TrackReader {
	pub info: Arc<Track>,
	watch: Watch<TrackState>,
	state: WatchReader<TrackState>,
	readers: Arc<AtomicUsize>,
}

impl TrackReader {
	/// Return the next group newer than anything returned so far.
	///
	/// Returns `Ok(None)` when the track ended gracefully, or the error it was aborted with.
	/// Groups superseded before this is called are skipped.
	pub async fn next_group(&mut self) -> Result<Option<GroupReader>, Error> {
		loop {
			match self.state.next_with(|state| state.latest.clone()).await? {
				Some(Some(group)) => return Ok(Some(group)),
				// No groups yet.
				Some(None) => continue,
				None => return Ok(None),
			}
		}
	}

	/// The sequence number of the latest group, if any.
	pub fn latest(&self) -> Option<u64> {
		self.state.with(|state| state.latest.as_ref().map(|group| group.sequence))
	}

	/// Block until the track is closed.
	pub async fn closed(&self) -> Result<(), Error> {
		self.watch.closed().await
	}

	pub fn is_closed(&self) -> bool {
		self.watch.is_closed()
	}

	/// Release this reader; the track is cancelled when the last one is gone.
	pub fn close(self) {}
}

impl Clone for TrackReader {
	fn clone(&self) -> Self {
		self.readers.fetch_add(1, Ordering::AcqRel);

		Self {
			info: self.info.clone(),
			watch: self.watch.clone(),
			state: self.state.clone(),
			readers: self.readers.clone(),
		}
	}
}

impl Drop for TrackReader {
	fn drop(&mut self) {
		if self.readers.fetch_sub(1, Ordering::AcqRel) == 1 {
			tracing::trace!(path = %self.info.path, "no more readers");
			self.watch.close(Err(Error::Cancel));
		}
	}
}

impl ops::Deref for TrackReader {
	type Target = Track;

	fn deref(&self) -> &Self::Target {
		&self.info
	}
}

impl fmt::Debug for TrackReader {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("TrackReader")
			.field("path", &self.info.path)
			.field("latest", &self.latest())
			.finish()
	}
}

#[cfg(test)]
mod tests {
	use bytes::Bytes;

	use super::*;

	#[tokio::test]
	async fn test_append() {
		let (mut writer, mut reader) = Track::new("cam").with_priority(1).produce();
		assert_eq!(reader.priority, 1);
		assert_eq!(writer.latest(), None);

		let mut group = writer.append_group().unwrap();
		assert_eq!(group.sequence, 0);
		group.write_frame(Bytes::from_static(&[0x01])).unwrap();
		group.close();

		assert_eq!(writer.append_group().unwrap().sequence, 1);
		assert_eq!(writer.latest(), Some(1));

		// Only the latest group is returned.
		let group = reader.next_group().await.unwrap().unwrap();
		assert_eq!(group.sequence, 1);
	}

	#[tokio::test]
	async fn test_latest_monotonic() {
		let (mut writer, mut reader) = Track::new("cam").produce();

		writer.create_group(5).unwrap();
		assert_eq!(reader.next_group().await.unwrap().unwrap().sequence, 5);

		// An older group is accepted but never becomes the latest.
		let old = writer.create_group(3).unwrap();
		assert_eq!(old.sequence, 3);
		assert_eq!(writer.latest(), Some(5));
		assert_eq!(reader.latest(), Some(5));

		writer.create_group(7).unwrap();
		assert_eq!(writer.latest(), Some(7));
		assert_eq!(reader.next_group().await.unwrap().unwrap().sequence, 7);

		assert_eq!(writer.append_group().unwrap().sequence, 8);
	}

	#[tokio::test]
	async fn test_end_of_track() {
		let (mut writer, mut reader) = Track::new("cam").produce();

		let mut group = writer.append_group().unwrap();
		group.write_frame(Bytes::from_static(&[0x01])).unwrap();
		group.close();
		writer.close();

		// The last group is delivered before the end.
		let mut group = reader.next_group().await.unwrap().unwrap();
		assert_eq!(group.read_frame().await.unwrap().unwrap(), &[0x01][..]);
		assert_eq!(group.read_frame().await.unwrap(), None);
		assert!(reader.next_group().await.unwrap().is_none());

		// Closing is idempotent.
		writer.abort(Error::NotFound);
		assert!(reader.closed().await.is_ok());
		assert!(matches!(writer.append_group(), Err(Error::Cancel)));
	}

	#[tokio::test]
	async fn test_abort() {
		let (writer, mut reader) = Track::new("cam").produce();

		let waiter = tokio::spawn(async move { reader.next_group().await });
		tokio::task::yield_now().await;

		writer.abort(Error::Closed(9));
		assert!(matches!(waiter.await.unwrap(), Err(Error::Closed(9))));
	}

	#[tokio::test]
	async fn test_readers_dropped() {
		let (writer, reader) = Track::new("cam").produce();

		let clone = reader.clone();
		let another = writer.reader();

		drop(reader);
		another.close();
		assert!(!writer.is_closed());

		drop(clone);
		assert!(writer.is_closed());
		assert!(matches!(writer.closed().await, Err(Error::Cancel)));

		// Already closed, so a later reader coming and going changes nothing.
		let late = writer.reader();
		writer.abort(Error::NotFound);
		drop(late);
		assert!(matches!(writer.closed().await, Err(Error::Cancel)));
	}

	#[tokio::test]
	async fn test_writers_dropped() {
		let (writer, mut reader) = Track::new("cam").produce();

		let clone = writer.clone();
		drop(writer);
		assert!(!reader.is_closed());

		drop(clone);
		assert!(matches!(reader.next_group().await, Err(Error::Cancel)));
	}
}
