//! A group is an ordered stream of frames, split into a [GroupWriter] and [GroupReader] handle.
//!
//! A [GroupWriter] appends frames until the group is closed or aborted.
//! A [GroupReader] can be cloned, in which case each reader receives a copy of each frame (fanout)
//! starting from the clone's current position.
use std::{fmt, ops};

use bytes::Bytes;
use tokio::sync::watch;

use crate::Error;

/// An independent group of frames within a track.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Group {
	// The sequence number of the group within the track.
	// NOTE: These may be received out of order
	pub sequence: u64,
}

impl Group {
	pub fn new(sequence: u64) -> Self {
		Self { sequence }
	}

	pub fn produce(self) -> (GroupWriter, GroupReader) {
		let (send, recv) = watch::channel(GroupState::default());

		let writer = GroupWriter { state: send, info: self };
		let reader = GroupReader {
			state: recv,
			info: self,
			index: 0,
		};

		(writer, reader)
	}
}

#[derive(Default)]
struct GroupState {
	// The frames that have been written thus far.
	frames: Vec<Bytes>,

	// Set when the writer closes or aborts the group.
	closed: Option<Result<(), Error>>,
}

/// Create a group, frame-by-frame.
///
/// Dropping the writer without calling [GroupWriter::close] aborts the group with [Error::Cancel].
pub struct GroupWriter {
	state: watch::Sender<GroupState>,
	pub info: Group,
}

impl GroupWriter {
	/// Append a frame to the group.
	pub fn write_frame<B: Into<Bytes>>(&mut self, frame: B) -> Result<(), Error> {
		let frame = frame.into();
		let mut res = Ok(());

		self.state.send_if_modified(|state| {
			if let Some(closed) = &state.closed {
				res = Err(closed.clone().err().unwrap_or(Error::Cancel));
				return false;
			}

			state.frames.push(frame);
			true
		});

		res
	}

	/// The number of frames written so far.
	pub fn frame_count(&self) -> usize {
		self.state.borrow().frames.len()
	}

	/// Mark the group as complete; readers get `None` after the last frame.
	pub fn close(self) {
		self.finish(Ok(()));
	}

	/// Close the group with an error.
	pub fn abort(self, err: Error) {
		self.finish(Err(err));
	}

	fn finish(&self, result: Result<(), Error>) {
		self.state.send_if_modified(|state| match state.closed {
			Some(_) => false,
			None => {
				state.closed = Some(result);
				true
			}
		});
	}
}

impl Drop for GroupWriter {
	fn drop(&mut self) {
		self.finish(Err(Error::Cancel));
	}
}

impl ops::Deref for GroupWriter {
	type Target = Group;

	fn deref(&self) -> &Self::Target {
		&self.info
	}
}

impl fmt::Debug for GroupWriter {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("GroupWriter").field("sequence", &self.info.sequence).finish()
	}
}

/// Consume a group, frame-by-frame.
#[derive(Clone)]
pub struct GroupReader {
	state: watch::Receiver<GroupState>,
	pub info: Group,

	// The number of frames we've read.
	// NOTE: Cloned readers inherit this offset, but then run in parallel.
	index: usize,
}

impl GroupReader {
	/// Read the next frame, returning `None` once the group is closed and fully read.
	///
	/// Frames written before an abort are still returned, then the error.
	pub async fn read_frame(&mut self) -> Result<Option<Bytes>, Error> {
		loop {
			{
				let state = self.state.borrow_and_update();

				if let Some(frame) = state.frames.get(self.index).cloned() {
					self.index += 1;
					return Ok(Some(frame));
				}

				if let Some(closed) = &state.closed {
					closed.clone()?;
					return Ok(None);
				}
			}

			// The writer always records a result before it is dropped.
			if self.state.changed().await.is_err() {
				return Err(Error::Cancel);
			}
		}
	}

	/// Block until the writer closes or aborts the group.
	pub async fn closed(&self) -> Result<(), Error> {
		match self.state.clone().wait_for(|state| state.closed.is_some()).await {
			Ok(state) => state.closed.clone().unwrap_or(Ok(())),
			Err(_) => Err(Error::Cancel),
		}
	}
}

impl ops::Deref for GroupReader {
	type Target = Group;

	fn deref(&self) -> &Self::Target {
		&self.info
	}
}

impl fmt::Debug for GroupReader {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("GroupReader")
			.field("sequence", &self.info.sequence)
			.field("index", &self.index)
			.finish()
	}
}
