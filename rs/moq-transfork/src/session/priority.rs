use std::{
	cmp::Ordering,
	sync::{Arc, Mutex},
};

use tokio::sync::watch;

use crate::message::GroupOrder;

// Ranks every group stream of a connection against each other.
//
// A lower subscription priority value is more important. Within one subscription the group order
// decides: Descending sends newer groups first, Ascending sends older groups first, and Any keeps
// the order the groups were opened in.
//
// The rank is converted into a stream priority where higher values are sent first.
// Anything ranked past 255 shares the lowest priority.
#[derive(Debug, Clone)]
struct PriorityItem {
	id: usize,
	subscribe: u64,
	priority: u64,
	order: GroupOrder,
	sequence: u64,
}

impl PriorityItem {
	fn cmp(&self, other: &Self) -> Ordering {
		let group = match self.order {
			GroupOrder::Descending => other.sequence.cmp(&self.sequence),
			GroupOrder::Ascending => self.sequence.cmp(&other.sequence),
			GroupOrder::Any => Ordering::Equal,
		};

		self.priority
			.cmp(&other.priority)
			.then(self.subscribe.cmp(&other.subscribe))
			.then(group)
			.then(self.id.cmp(&other.id))
	}
}

#[derive(Clone, Default)]
pub(crate) struct Priorities {
	state: Arc<Mutex<PriorityState>>,
}

impl Priorities {
	/// Rank a new group stream for the given subscription.
	pub fn insert(&self, subscribe: u64, priority: u64, order: GroupOrder, sequence: u64) -> PriorityHandle {
		let mut state = self.lock();

		let id = state.next_id;
		state.next_id += 1;

		let (tx, rx) = watch::channel(0);
		state.items.push((
			PriorityItem {
				id,
				subscribe,
				priority,
				order,
				sequence,
			},
			tx,
		));
		state.rank();

		PriorityHandle {
			id,
			rx,
			queue: self.clone(),
		}
	}

	/// Change the priority and order of every group stream of a subscription.
	pub fn update(&self, subscribe: u64, priority: u64, order: GroupOrder) {
		let mut state = self.lock();

		for (item, _) in state.items.iter_mut().filter(|(item, _)| item.subscribe == subscribe) {
			item.priority = priority;
			item.order = order;
		}

		state.rank();
	}

	fn lock(&self) -> std::sync::MutexGuard<'_, PriorityState> {
		// Ranking leaves the state consistent even if a holder panicked.
		self.state.lock().unwrap_or_else(|err| err.into_inner())
	}
}

#[derive(Default)]
struct PriorityState {
	items: Vec<(PriorityItem, watch::Sender<u8>)>,
	next_id: usize,
}

impl PriorityState {
	fn rank(&mut self) {
		self.items.sort_by(|(a, _), (b, _)| a.cmp(b));

		for (index, (_, tx)) in self.items.iter().enumerate() {
			let priority = u8::MAX.saturating_sub(index.try_into().unwrap_or(u8::MAX));

			tx.send_if_modified(|current| {
				if *current != priority {
					*current = priority;
					true
				} else {
					false
				}
			});
		}
	}

	fn remove(&mut self, id: usize) {
		self.items.retain(|(item, _)| item.id != id);
		self.rank();
	}
}

/// The stream priority of a single group, kept up to date as other groups come and go.
pub(crate) struct PriorityHandle {
	id: usize,
	rx: watch::Receiver<u8>,
	queue: Priorities,
}

impl Drop for PriorityHandle {
	fn drop(&mut self) {
		self.queue.lock().remove(self.id);
	}
}

impl PriorityHandle {
	pub fn current(&mut self) -> u8 {
		*self.rx.borrow_and_update()
	}

	/// Wait until the priority changes.
	pub async fn next(&mut self) -> u8 {
		// The sender lives as long as this handle.
		let _ = self.rx.changed().await;
		*self.rx.borrow_and_update()
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_subscription_priority() {
		let queue = Priorities::default();

		let mut low = queue.insert(0, 10, GroupOrder::Any, 0);
		let mut high = queue.insert(1, 1, GroupOrder::Any, 0);

		assert_eq!(high.current(), 255);
		assert_eq!(low.current(), 254);
	}

	#[test]
	fn test_group_order() {
		let queue = Priorities::default();

		let mut old = queue.insert(0, 0, GroupOrder::Descending, 1);
		let mut new = queue.insert(0, 0, GroupOrder::Descending, 2);
		assert_eq!(new.current(), 255);
		assert_eq!(old.current(), 254);

		queue.update(0, 0, GroupOrder::Ascending);
		assert_eq!(old.current(), 255);
		assert_eq!(new.current(), 254);

		// Any keeps the order the streams were opened in.
		queue.update(0, 0, GroupOrder::Any);
		assert_eq!(old.current(), 255);
		assert_eq!(new.current(), 254);
	}

	#[test]
	fn test_update_other_subscription() {
		let queue = Priorities::default();

		let mut a = queue.insert(0, 5, GroupOrder::Any, 0);
		let mut b = queue.insert(1, 5, GroupOrder::Any, 0);
		assert_eq!(a.current(), 255);

		// Only subscription 1 becomes more important.
		queue.update(1, 0, GroupOrder::Any);
		assert_eq!(b.current(), 255);
		assert_eq!(a.current(), 254);
	}

	#[test]
	fn test_removal_on_drop() {
		let queue = Priorities::default();

		let first = queue.insert(0, 0, GroupOrder::Any, 0);
		let mut second = queue.insert(0, 1, GroupOrder::Any, 0);
		assert_eq!(second.current(), 254);

		drop(first);
		assert_eq!(second.current(), 255);
	}

	#[test]
	fn test_saturate() {
		let queue = Priorities::default();

		let mut handles: Vec<_> = (0..300).map(|i| queue.insert(0, i, GroupOrder::Any, 0)).collect();
		assert_eq!(handles[0].current(), 255);
		assert_eq!(handles[255].current(), 0);
		assert_eq!(handles[299].current(), 0);
	}

	#[tokio::test]
	async fn test_notify() {
		let queue = Priorities::default();

		let mut low = queue.insert(0, 10, GroupOrder::Any, 0);
		assert_eq!(low.current(), 255);

		let _high = queue.insert(1, 0, GroupOrder::Any, 0);
		assert_eq!(low.next().await, 254);
	}
}
