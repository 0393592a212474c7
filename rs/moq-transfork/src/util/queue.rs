use web_async::Lock;

use crate::Error;

/// Create a bounded, ordered queue with a single consumer.
///
/// Unlike a [super::Watch], every item is delivered exactly once.
pub fn queue<T>(capacity: usize) -> (QueueWriter<T>, QueueReader<T>) {
	let (send, recv) = async_channel::bounded(capacity.max(1));
	let aborted = Lock::new(None);

	let writer = QueueWriter {
		send,
		aborted: aborted.clone(),
	};

	let reader = QueueReader { recv, aborted };

	(writer, reader)
}

pub struct QueueWriter<T> {
	send: async_channel::Sender<T>,
	aborted: Lock<Option<Error>>,
}

impl<T> QueueWriter<T> {
	/// Push an item, waiting while the queue is full.
	///
	/// Fails once the queue is closed or the reader is gone.
	pub async fn push(&self, item: T) -> Result<(), Error> {
		self.send.send(item).await.map_err(|_| Error::Cancel)
	}

	/// No more items will be pushed; the reader drains what is queued and then ends.
	pub fn close(&self) {
		self.send.close();
	}

	/// Fail the queue; the reader's next pop returns the error, discarding anything queued.
	pub fn abort(&self, err: Error) {
		{
			let mut aborted = self.aborted.lock();
			if aborted.is_none() {
				*aborted = Some(err);
			}
		}

		self.send.close();
	}

	/// True once the queue is closed, aborted or the reader is gone.
	pub fn is_closed(&self) -> bool {
		self.send.is_closed()
	}
}

impl<T> Clone for QueueWriter<T> {
	fn clone(&self) -> Self {
		Self {
			send: self.send.clone(),
			aborted: self.aborted.clone(),
		}
	}
}

pub struct QueueReader<T> {
	recv: async_channel::Receiver<T>,
	aborted: Lock<Option<Error>>,
}

impl<T> QueueReader<T> {
	/// Returns the next item, `Ok(None)` once closed and drained, or the abort error.
	pub async fn pop(&mut self) -> Result<Option<T>, Error> {
		self.check()?;

		match self.recv.recv().await {
			Ok(item) => {
				// Aborted while we were waiting, the item is discarded.
				self.check()?;
				Ok(Some(item))
			}
			Err(_) => {
				self.check()?;
				Ok(None)
			}
		}
	}

	fn check(&self) -> Result<(), Error> {
		match self.aborted.lock().as_ref() {
			Some(err) => Err(err.clone()),
			None => Ok(()),
		}
	}

	/// The number of items waiting to be popped.
	pub fn len(&self) -> usize {
		self.recv.len()
	}

	pub fn is_empty(&self) -> bool {
		self.recv.is_empty()
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[tokio::test]
	async fn test_close_drains() {
		let (writer, mut reader) = queue(4);

		writer.push(1).await.unwrap();
		writer.push(2).await.unwrap();
		writer.close();

		assert!(matches!(writer.push(3).await, Err(Error::Cancel)));

		assert_eq!(reader.pop().await.unwrap(), Some(1));
		assert_eq!(reader.pop().await.unwrap(), Some(2));
		assert_eq!(reader.pop().await.unwrap(), None);
	}

	#[tokio::test]
	async fn test_abort() {
		let (writer, mut reader) = queue(4);

		writer.push(1).await.unwrap();
		writer.abort(Error::ProtocolViolation("test"));

		// Queued items are discarded.
		assert!(matches!(reader.pop().await, Err(Error::ProtocolViolation("test"))));
		assert!(matches!(reader.pop().await, Err(Error::ProtocolViolation(_))));
	}

	#[tokio::test]
	async fn test_abort_wakes() {
		let (writer, mut reader) = queue::<u64>(1);

		let waiter = tokio::spawn(async move { reader.pop().await });
		tokio::task::yield_now().await;

		writer.abort(Error::NotFound);
		assert!(matches!(waiter.await.unwrap(), Err(Error::NotFound)));
	}

	#[tokio::test]
	async fn test_reader_dropped() {
		let (writer, reader) = queue(1);
		drop(reader);

		assert!(writer.is_closed());
		assert!(matches!(writer.push(1).await, Err(Error::Cancel)));
	}
}
