use std::{fmt, sync::Arc};

use tokio::sync::watch;

use crate::Error;

struct State<T> {
	value: T,

	// Incremented on every change to the value, but not when closed.
	epoch: u64,

	// Set once, never reopened.
	closed: Option<Result<(), Error>>,
}

/// A single-writer, many-reader cell holding the latest value.
///
/// Readers are woken on each change but may miss values that are superseded before they look.
/// Once closed, updates fail and readers drain the final value before seeing the close.
pub struct Watch<T> {
	state: Arc<watch::Sender<State<T>>>,
}

impl<T> Watch<T> {
	pub fn new(value: T) -> Self {
		let state = State {
			value,
			epoch: 0,
			closed: None,
		};

		Self {
			state: Arc::new(watch::Sender::new(state)),
		}
	}

	/// Modify the value in place, notifying readers if `f` returns true.
	pub fn update<F: FnOnce(&mut T) -> bool>(&self, f: F) -> Result<(), Error> {
		let mut res = Ok(());

		self.state.send_if_modified(|state| {
			if let Some(closed) = &state.closed {
				res = Err(closed.clone().err().unwrap_or(Error::Cancel));
				return false;
			}

			let modified = f(&mut state.value);
			if modified {
				state.epoch += 1;
			}

			modified
		});

		res
	}

	/// Replace the value, always notifying readers.
	pub fn set(&self, value: T) -> Result<(), Error> {
		self.update(|state| {
			*state = value;
			true
		})
	}

	/// Run `f` against the current value.
	pub fn with<R, F: FnOnce(&T) -> R>(&self, f: F) -> R {
		f(&self.state.borrow().value)
	}

	/// Close the cell with a graceful or error result.
	///
	/// Returns false if it was already closed, in which case nothing changes.
	pub fn close(&self, result: Result<(), Error>) -> bool {
		self.state.send_if_modified(|state| match state.closed {
			Some(_) => false,
			None => {
				state.closed = Some(result);
				true
			}
		})
	}

	pub fn is_closed(&self) -> bool {
		self.state.borrow().closed.is_some()
	}

	/// Block until the cell is closed, returning the close result.
	pub async fn closed(&self) -> Result<(), Error> {
		let mut state = self.state.subscribe();
		let closed = match state.wait_for(|state| state.closed.is_some()).await {
			Ok(state) => state.closed.clone(),
			Err(_) => None,
		};
		closed.unwrap_or(Ok(()))
	}

	/// Observe the value, starting with the current one.
	pub fn subscribe(&self) -> WatchReader<T> {
		WatchReader {
			state: self.state.subscribe(),
			epoch: None,
		}
	}
}

impl<T> Clone for Watch<T> {
	fn clone(&self) -> Self {
		Self {
			state: self.state.clone(),
		}
	}
}

impl<T: Default> Default for Watch<T> {
	fn default() -> Self {
		Self::new(T::default())
	}
}

impl<T: fmt::Debug> fmt::Debug for Watch<T> {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		let state = self.state.borrow();
		f.debug_struct("Watch")
			.field("value", &state.value)
			.field("closed", &state.closed)
			.finish()
	}
}

/// Observes each change of a [Watch], skipping superseded values.
pub struct WatchReader<T> {
	state: watch::Receiver<State<T>>,

	// The epoch of the last value returned, None if nothing was returned yet.
	epoch: Option<u64>,
}

impl<T> WatchReader<T> {
	/// Wait for a value we haven't seen yet and map it with `f`.
	///
	/// Returns `Ok(None)` once the cell is closed gracefully and the final value has been returned.
	pub async fn next_with<R, F: FnMut(&T) -> R>(&mut self, mut f: F) -> Result<Option<R>, Error> {
		loop {
			{
				let state = self.state.borrow_and_update();

				if self.epoch != Some(state.epoch) {
					self.epoch = Some(state.epoch);
					return Ok(Some(f(&state.value)));
				}

				if let Some(closed) = &state.closed {
					closed.clone()?;
					return Ok(None);
				}
			}

			if self.state.changed().await.is_err() {
				return Ok(None);
			}
		}
	}

	/// Run `f` against the current value without marking it as seen.
	pub fn with<R, F: FnOnce(&T) -> R>(&self, f: F) -> R {
		f(&self.state.borrow().value)
	}
}

impl<T: Clone> WatchReader<T> {
	pub async fn next(&mut self) -> Result<Option<T>, Error> {
		self.next_with(T::clone).await
	}
}

impl<T> Clone for WatchReader<T> {
	fn clone(&self) -> Self {
		Self {
			state: self.state.clone(),
			epoch: self.epoch,
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[tokio::test]
	async fn test_broadcast() {
		let watch = Watch::new(1);
		let mut a = watch.subscribe();
		let mut b = watch.subscribe();

		assert_eq!(a.next().await.unwrap(), Some(1));

		watch.set(2).unwrap();
		watch.set(3).unwrap();

		// Both readers see the latest value, skipping the superseded one.
		assert_eq!(a.next().await.unwrap(), Some(3));
		assert_eq!(b.next().await.unwrap(), Some(3));

		// A no-op update doesn't wake anybody.
		watch.update(|_| false).unwrap();
		watch.set(4).unwrap();
		assert_eq!(a.next().await.unwrap(), Some(4));
	}

	#[tokio::test]
	async fn test_close() {
		let watch = Watch::new("a");
		let mut reader = watch.subscribe();

		watch.set("b").unwrap();
		assert!(watch.close(Ok(())));
		assert!(!watch.close(Err(Error::Cancel)));

		// The final value is still delivered before the close.
		assert_eq!(reader.next().await.unwrap(), Some("b"));
		assert_eq!(reader.next().await.unwrap(), None);

		assert!(matches!(watch.set("c"), Err(Error::Cancel)));
		watch.closed().await.unwrap();
	}

	#[tokio::test]
	async fn test_abort() {
		let watch = Watch::new(0u64);
		let mut reader = watch.subscribe();
		assert_eq!(reader.next().await.unwrap(), Some(0));

		let waiter = tokio::spawn(async move { reader.next().await });
		tokio::task::yield_now().await;

		watch.close(Err(Error::NotFound));
		assert!(matches!(waiter.await.unwrap(), Err(Error::NotFound)));
		assert!(matches!(watch.closed().await, Err(Error::NotFound)));
		assert!(matches!(watch.update(|_| true), Err(Error::NotFound)));
	}
}
